//! DomainQL - query-object compiler
//!
//! Compiles flat, suffix-named query objects into executable query plans:
//! - Parameterized SQL (`SELECT`, `COUNT`, sub-domain `UNION ALL` batches)
//! - Document-store aggregation pipelines
//! - Join-table maintenance statements for many-to-many relations
//!
//! Entities, views and their relationships are declared once in a schema
//! catalog; the compilers never touch a database.

pub mod associative;
pub mod config;
pub mod operator;
pub mod pipeline_generator;
pub mod query_object;
pub mod relation_path;
pub mod schema_catalog;
pub mod sql_generator;
