use domainql::config::CompilerConfig;
use domainql::query_object::QueryNode;
use domainql::schema_catalog::{SchemaConfig, SchemaRegistry};
use serde_json::Value;

pub const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/rust/unit/fixtures/schema.yaml");

pub fn registry_with(config: &CompilerConfig) -> SchemaRegistry {
    let schema = SchemaConfig::from_yaml_file(FIXTURE).expect("fixture schema loads");
    SchemaRegistry::new(schema, config).expect("fixture schema registers")
}

pub fn registry() -> SchemaRegistry {
    registry_with(&CompilerConfig::default())
}

pub fn query(value: Value) -> QueryNode {
    QueryNode::from_json(&value, &CompilerConfig::default()).expect("query object parses")
}
