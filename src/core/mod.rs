// Core data structures and error types for tseda
pub mod error;
pub mod value;

// Re-exports for convenience
pub use error::{Error, Result};
pub use value::{CellValue, DType};
