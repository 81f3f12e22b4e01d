use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryObjectError {
    #[error("Query object must be a JSON object, got {0}")]
    NotAnObject(String),

    #[error("Operator of `{field}` requires a collection operand")]
    NotACollection { field: String },

    #[error("Invalid operand for `{field}`: expected {expected}")]
    InvalidOperand { field: String, expected: String },

    #[error("Invalid paging value for `{key}`: {value}")]
    InvalidPaging { key: String, value: String },

    #[error("Invalid sort expression: {0}")]
    InvalidSort(String),

    #[error("OR-group `{field}` must be an object or an array")]
    InvalidOrGroup { field: String },

    #[error("`{field}` must be an object or `true` to load a relation")]
    InvalidInclude { field: String },
}
