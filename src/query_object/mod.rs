pub mod errors;
pub mod parser;
pub mod query_node;
pub mod sort;
pub mod value;

pub use errors::QueryObjectError;
pub use query_node::{Condition, FilterField, Include, Pagination, QueryNode};
pub use sort::{SortDirection, SortItem, SortSpec};
pub use value::{FilterValue, Scalar};
