//! # Schema Catalog Error Types
//!
//! Errors raised while loading schema definitions and building entity metadata.
//! All of them are configuration errors: fatal for the entity being built and
//! never retried.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("No entity schema found for `{name}`")]
    UnknownEntity { name: String },
    #[error("Entity `{name}` is declared more than once")]
    DuplicateEntity { name: String },
    #[error("Entity `{entity}` declares `{name}` more than once (fields and relations share one namespace)")]
    DuplicateField { entity: String, name: String },
    #[error("Relation `{entity}.{relation}` has an empty domain path")]
    EmptyRelationPath { entity: String, relation: String },
    #[error("Relation `{entity}.{relation}` visits domain `{domain}` twice")]
    CyclicRelationPath {
        entity: String,
        relation: String,
        domain: String,
    },
    #[error("Relation `{entity}.{relation}` has a misplaced reverse marker `~` (expected `[a, ~, b, ...]`)")]
    InvalidReverseMarker { entity: String, relation: String },
    #[error("Relation `{entity}.{relation}` targets unknown entity `{target}`")]
    UnknownRelationTarget {
        entity: String,
        relation: String,
        target: String,
    },
    #[error("Failed to read schema file: {error}")]
    ConfigReadError { error: String },
    #[error("Failed to parse schema: {error}")]
    ConfigParseError { error: String },
}
