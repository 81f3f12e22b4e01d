//! Join-table management between two domains.
//!
//! [`AssociativeSqlBuilder`] renders the statements; [`AssociativeService`]
//! sequences them against a [`DatabaseOperations`] driver.

pub mod errors;
pub mod service;
pub mod sql_builder;

pub use errors::AssociativeError;
pub use service::{AssociativeService, DatabaseOperations, UserIdProvider};
pub use sql_builder::AssociativeSqlBuilder;
