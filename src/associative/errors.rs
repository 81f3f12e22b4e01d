use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AssociativeError {
    #[error("Invalid associative table definition: {0}")]
    InvalidDefinition(String),

    /// Raised by the driver executing the statements
    #[error("Database error: {0}")]
    Database(String),
}
