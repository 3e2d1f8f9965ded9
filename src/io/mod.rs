//! Reading and writing delimited text payloads

pub mod csv;

// Re-export commonly used functions
pub use self::csv::{
    decode_lossy, detect_separator, read_csv_bytes, write_csv_bytes, CANDIDATE_SEPARATORS,
};
