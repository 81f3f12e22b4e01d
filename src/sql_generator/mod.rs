pub mod common;
pub mod dialect;
pub mod errors;
pub mod filter_builder;
pub mod order_by;
pub mod select_builder;
pub mod sub_domain;

pub use common::{SqlPlan, KEY_COLUMN};
pub use dialect::{dialect_for, Dialect, FetchFirstDialect, LimitOffsetDialect};
pub use errors::SqlGeneratorError;
pub use select_builder::SqlPlanBuilder;
