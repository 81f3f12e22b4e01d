use crate::common::FIXTURE;
use domainql::config::{CliConfig, CompilerConfig, DialectKind};
use domainql::schema_catalog::{SchemaConfig, SchemaError, SchemaRegistry};
use domainql::sql_generator::SqlPlanBuilder;
use serde_json::json;
use std::io::Write;

#[test]
fn test_custom_naming_templates_rename_everything() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "table_format: \"tbl_%s\"\njoin_table_format: \"rel_%s_%s\"\ndialect: fetch_first"
    )
    .unwrap();
    let config = CompilerConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(config.dialect, DialectKind::FetchFirst);

    let registry = SchemaRegistry::new(SchemaConfig::from_yaml_file(FIXTURE).unwrap(), &config).unwrap();
    let query = domainql::query_object::QueryNode::from_json(&json!({"roles": {"valid": true}}), &config).unwrap();
    let plan = SqlPlanBuilder::new(&registry, &config)
        .build_count(&query, "user")
        .unwrap();
    assert_eq!(
        plan.sql,
        "SELECT COUNT(DISTINCT tbl_user.id) FROM tbl_user \
         INNER JOIN rel_user_role j0ur ON j0ur.user_id = tbl_user.id \
         INNER JOIN tbl_role r ON r.id = j0ur.role_id WHERE r.valid = ?"
    );
}

#[test]
fn test_cli_overrides_are_validated() {
    let cli = CliConfig {
        join_table_format: Some("j_%s".to_string()),
        ..Default::default()
    };
    assert!(CompilerConfig::from_cli(cli).is_err());
}

#[test]
fn test_schema_rejects_cyclic_paths() {
    let yaml = r#"
entities:
  - name: user
    fields: [id]
    relations:
      - name: loops
        path: [user, role, user]
  - name: role
    fields: [id]
"#;
    assert!(matches!(
        SchemaConfig::from_yaml_str(yaml),
        Err(SchemaError::CyclicRelationPath { .. })
    ));
}
