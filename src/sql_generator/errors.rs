use thiserror::Error;

use crate::query_object::QueryObjectError;
use crate::schema_catalog::SchemaError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SqlGeneratorError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    QueryObject(#[from] QueryObjectError),

    #[error("Operator {operator} of `{field}` is not supported by the SQL backend")]
    UnsupportedOperator { field: String, operator: String },

    #[error("Structured operand of `{field}` cannot be bound as a SQL parameter")]
    DocumentOperand { field: String },

    #[error("`{field}` is not a relation of `{entity}`")]
    UnknownRelation { entity: String, field: String },

    #[error("Join parameter #{{{name}}} has no scalar value in the query")]
    MissingJoinParameter { name: String },

    #[error("Join view `{entity}` cannot be the target of a sub-domain batch")]
    JoinViewBatchTarget { entity: String },

    #[error("Field `{field}` of `{entity}` has no SQL form")]
    UnsupportedColumn { entity: String, field: String },
}
