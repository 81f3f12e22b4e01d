//! Document-store aggregation pipelines.
//!
//! Stage order of a query: relation lookups used by filters, `$match`,
//! `$unset` of those lookups, sub-domain lookups, `$group`, having `$match`,
//! `$sort`, `$skip`/`$limit`, `$project`. A count shares everything up to the
//! having stage and ends with `$count`.

pub mod aggregation_builder;
pub mod errors;
pub mod filter_builder;
pub mod geo_filters;
pub mod group_builder;
pub mod lookup_builder;
pub mod stage;

pub use aggregation_builder::AggregationPlanBuilder;
pub use errors::PipelineGeneratorError;
pub use stage::{Lookup, Pipeline, SortOrder, Stage, COUNT_KEY, MONGO_ID};
