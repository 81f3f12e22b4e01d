use thiserror::Error;

use crate::query_object::QueryObjectError;
use crate::schema_catalog::SchemaError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineGeneratorError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    QueryObject(#[from] QueryObjectError),

    #[error("`{field}` is not a relation of `{entity}`")]
    UnknownRelation { entity: String, field: String },

    #[error("Raw sort expression `{expression}` is not supported by the pipeline backend")]
    UnsupportedSort { expression: String },

    #[error("Invalid geo operand for `{field}`: {reason}")]
    GeoOperand { field: String, reason: String },

    #[error("Operator {operator} of `{field}` cannot take this operand")]
    UnsupportedOperand { field: String, operator: String },
}
