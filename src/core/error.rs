use thiserror::Error;

/// Error type definitions
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[source] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[source] serde_json::Error),

    /// Malformed or undecodable input payload
    #[error("Could not read file: {0}")]
    Parse(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("{0}")]
    FrequencyInference(String),

    #[error("Invalid frequency: {0}")]
    InvalidFrequency(String),

    #[error("data type '{0}' not understood")]
    UnsupportedType(String),

    #[error("Cast error: {0}")]
    Cast(String),

    #[error("Type error: {0}")]
    Type(String),

    #[error("Insufficient data error: {0}")]
    InsufficientData(String),

    #[error("Index is already set to column '{current}', cannot re-index on '{requested}'")]
    IndexAlreadySet { current: String, requested: String },

    #[error("Visualization error: {0}")]
    Visualization(String),

    #[error("File '{0}' already exists.")]
    FileConflict(String),

    #[error("File '{0}' not found.")]
    FileMissing(String),

    #[error("File size of {size} bytes exceeds {limit_mb} MB limit.")]
    PayloadTooLarge { size: usize, limit_mb: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Csv(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Visualization(format!("PNG encoding error: {}", err))
    }
}

// Conversion for Plotters errors
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for Error
{
    fn from(err: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        Error::Visualization(format!("Plot drawing error: {}", err))
    }
}

impl Error {
    /// Whether the error was caused by the caller's input rather than the environment.
    ///
    /// The CLI logs the full error chain for the other kind.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Error::Io(_) | Error::Json(_) | Error::Visualization(_) | Error::ConfigurationError(_)
        )
    }
}
