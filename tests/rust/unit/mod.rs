//! End-to-end compilation tests over the shared fixture schema.
//!
//! Run with `cargo test --test unit`.

mod common;

mod associative_tests;
mod config_tests;
mod pipeline_compile_tests;
mod sql_compile_tests;
