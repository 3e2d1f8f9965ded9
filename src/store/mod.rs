//! Flat-file dataset storage
//!
//! Datasets live as plain files directly under one data directory. Names are
//! bare file names; anything that could escape the directory is rejected.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::core::error::{Error, Result};

/// What `save` does when the target name is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictMode {
    /// Fail with `Error::FileConflict`
    #[default]
    Error,
    /// Replace the existing file
    Overwrite,
    /// Store under the next free `stem (n).ext` name
    Increment,
}

/// Reject payloads larger than `max_mb` megabytes
pub fn check_upload_size(bytes: &[u8], max_mb: u64) -> Result<()> {
    let limit = max_mb.saturating_mul(1024 * 1024);
    if bytes.len() as u64 > limit {
        log::warn!(
            "rejected upload of {} bytes (limit {} MB)",
            bytes.len(),
            max_mb
        );
        return Err(Error::PayloadTooLarge {
            size: bytes.len(),
            limit_mb: max_mb,
        });
    }
    Ok(())
}

/// Dataset files under a single directory
#[derive(Debug, Clone)]
pub struct DatasetStore {
    root: PathBuf,
}

impl DatasetStore {
    /// Open the store, creating `data_dir` when missing
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let root = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        log::debug!("dataset store at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of a stored dataset
    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.path_of(name)?.is_file())
    }

    /// Write `bytes` under `name`, resolving a clash according to `mode`.
    ///
    /// Returns the path actually written.
    pub fn save(&self, name: &str, bytes: &[u8], mode: ConflictMode) -> Result<PathBuf> {
        let target = match mode {
            ConflictMode::Increment => self.increment_filename(name)?,
            _ => name.to_string(),
        };
        let path = self.path_of(&target)?;

        match mode {
            ConflictMode::Overwrite => fs::write(&path, bytes)?,
            ConflictMode::Error | ConflictMode::Increment => {
                let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                    Ok(file) => file,
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                        log::warn!("refusing to overwrite existing dataset {}", target);
                        return Err(Error::FileConflict(target));
                    }
                    Err(e) => return Err(e.into()),
                };
                file.write_all(bytes)?;
            }
        }

        log::info!("saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// `name` when unused, else `stem (n).ext` with the smallest free `n >= 1`
    pub fn increment_filename(&self, name: &str) -> Result<String> {
        validate_name(name)?;
        if !self.root.join(name).exists() {
            return Ok(name.to_string());
        }

        let path = Path::new(name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut counter = 1;
        loop {
            let candidate = format!("{} ({}){}", stem, counter, ext);
            if !self.root.join(&candidate).exists() {
                return Ok(candidate);
            }
            counter += 1;
        }
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_of(name)?;
        if !path.is_file() {
            return Err(Error::FileMissing(name.to_string()));
        }
        fs::remove_file(&path)?;
        log::info!("deleted {}", path.display());
        Ok(())
    }

    /// Rename a dataset; the source is left alone when this fails
    pub fn rename(&self, old: &str, new: &str) -> Result<PathBuf> {
        let from = self.path_of(old)?;
        let to = self.path_of(new)?;
        if !from.is_file() {
            return Err(Error::FileMissing(old.to_string()));
        }
        if to.exists() {
            log::warn!("cannot rename {} to existing {}", old, new);
            return Err(Error::FileConflict(new.to_string()));
        }
        fs::rename(&from, &to)?;
        log::info!("renamed {} to {}", old, new);
        Ok(to)
    }

    /// Sorted names of the `.csv` files in the store
    pub fn list_datasets(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let is_csv = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("csv"))
                .unwrap_or(false);
            if is_csv {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(Error::InvalidInput(format!("Invalid file name: '{}'", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_new_creates_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nested").join("data");
        let store = DatasetStore::new(&root).unwrap();
        assert!(store.root().is_dir());
    }

    #[test]
    fn test_save_modes() {
        let dir = tempdir().unwrap();
        let store = DatasetStore::new(dir.path()).unwrap();

        store.save("a.csv", b"x\n1\n", ConflictMode::Error).unwrap();
        assert!(matches!(
            store.save("a.csv", b"x\n2\n", ConflictMode::Error),
            Err(Error::FileConflict(_))
        ));
        assert_eq!(fs::read(dir.path().join("a.csv")).unwrap(), b"x\n1\n");

        store.save("a.csv", b"x\n3\n", ConflictMode::Overwrite).unwrap();
        assert_eq!(fs::read(dir.path().join("a.csv")).unwrap(), b"x\n3\n");

        let path = store.save("a.csv", b"x\n4\n", ConflictMode::Increment).unwrap();
        assert_eq!(path.file_name().unwrap(), "a (1).csv");
    }

    #[test]
    fn test_increment_without_extension() {
        let dir = tempdir().unwrap();
        let store = DatasetStore::new(dir.path()).unwrap();
        assert_eq!(store.increment_filename("notes").unwrap(), "notes");
        store.save("notes", b"", ConflictMode::Error).unwrap();
        assert_eq!(store.increment_filename("notes").unwrap(), "notes (1)");
    }

    #[test]
    fn test_rejects_unsafe_names() {
        let dir = tempdir().unwrap();
        let store = DatasetStore::new(dir.path()).unwrap();
        for name in ["../a.csv", "x/y.csv", "", "..", "a\\b.csv"] {
            assert!(matches!(store.path_of(name), Err(Error::InvalidInput(_))));
        }
    }

    #[test]
    fn test_delete_and_list() {
        let dir = tempdir().unwrap();
        let store = DatasetStore::new(dir.path()).unwrap();
        store.save("b.csv", b"", ConflictMode::Error).unwrap();
        store.save("a.csv", b"", ConflictMode::Error).unwrap();
        store.save("readme.txt", b"", ConflictMode::Error).unwrap();
        fs::create_dir(dir.path().join("sub.csv")).unwrap();

        assert_eq!(store.list_datasets().unwrap(), vec!["a.csv", "b.csv"]);

        store.delete("a.csv").unwrap();
        assert!(!store.exists("a.csv").unwrap());
        assert!(matches!(store.delete("a.csv"), Err(Error::FileMissing(_))));
    }

    #[test]
    fn test_check_upload_size() {
        let payload = vec![0u8; 1024 * 1024];
        assert!(check_upload_size(&payload, 1).is_ok());

        let payload = vec![0u8; 1024 * 1024 + 1];
        match check_upload_size(&payload, 1) {
            Err(Error::PayloadTooLarge { size, limit_mb }) => {
                assert_eq!(size, 1024 * 1024 + 1);
                assert_eq!(limit_mb, 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
