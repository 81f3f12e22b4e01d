pub mod config;
pub mod entity_schema;
pub mod errors;
pub mod registry;
pub mod relationship;

pub use config::{
    EntityDefinition, ExpressionDefinition, FieldDefinition, RelationDefinition, SchemaConfig,
};
pub use entity_schema::{Accumulator, AggregatePrefix, ColumnMeta, EntitySchema};
pub use errors::SchemaError;
pub use registry::SchemaRegistry;
pub use relationship::{Direction, RelationshipEdge};
