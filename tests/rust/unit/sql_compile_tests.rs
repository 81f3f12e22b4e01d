use crate::common::{query, registry, registry_with};
use domainql::config::{CompilerConfig, DialectKind};
use domainql::query_object::Scalar;
use domainql::sql_generator::{SqlGeneratorError, SqlPlanBuilder};
use serde_json::json;

const USER_COLUMNS: &str = "u.id, u.username, u.email, u.mobile, u.userLevel, u.valid, u.createUserId";

#[test]
fn test_select_plain_filters_and_page() {
    let registry = registry();
    let builder = SqlPlanBuilder::new(&registry, &CompilerConfig::default());
    let plan = builder
        .build_select(
            &query(json!({"usernameLike": "f0", "userLevelNot": "VIP", "pageNumber": 0, "pageSize": 10})),
            "user",
        )
        .unwrap();

    assert_eq!(
        plan.sql,
        "SELECT id, username, email, mobile, userLevel, valid, createUserId FROM t_user \
         WHERE username LIKE ? AND userLevel != ? LIMIT 10 OFFSET 0"
    );
    assert_eq!(
        plan.args,
        vec![Scalar::Text("%f0%".into()), Scalar::Text("VIP".into())]
    );
    assert_eq!(plan.placeholder_count(), plan.args.len());
}

#[test]
fn test_or_group_and_in_list() {
    let registry = registry();
    let builder = SqlPlanBuilder::new(&registry, &CompilerConfig::default());
    let plan = builder
        .build_select(
            &query(json!({
                "idIn": [1, 2],
                "accountOr": {"username": "f0rb", "email": "f0rb@163.com"}
            })),
            "user",
        )
        .unwrap();

    assert!(plan
        .sql
        .ends_with("WHERE id IN (?, ?) AND (username = ? OR email = ?)"));
    assert_eq!(plan.args.len(), 4);
}

#[test]
fn test_empty_in_is_always_false() {
    let registry = registry();
    let builder = SqlPlanBuilder::new(&registry, &CompilerConfig::default());
    let plan = builder.build_select(&query(json!({"idIn": []})), "user").unwrap();
    assert!(plan.sql.ends_with("WHERE id IN (null)"));
    assert!(plan.args.is_empty());
}

#[test]
fn test_relation_filter_joins_and_counts_distinct() {
    let registry = registry();
    let builder = SqlPlanBuilder::new(&registry, &CompilerConfig::default());
    let q = query(json!({"roles": {"roleName": "admin"}}));

    let select = builder.build_select(&q, "user").unwrap();
    assert!(select.sql.starts_with("SELECT DISTINCT t_user.id, t_user.username"));
    assert!(select.sql.contains(
        "INNER JOIN j_user_and_role j0ur ON j0ur.user_id = t_user.id \
         INNER JOIN t_role r ON r.id = j0ur.role_id WHERE r.roleName = ?"
    ));

    let count = builder.build_count(&q, "user").unwrap();
    assert!(count.sql.starts_with("SELECT COUNT(DISTINCT t_user.id) FROM t_user"));
    assert_eq!(count.args, vec![Scalar::Text("admin".into())]);
}

#[test]
fn test_declared_join_view() {
    let registry = registry();
    let builder = SqlPlanBuilder::new(&registry, &CompilerConfig::default());
    let plan = builder
        .build_select(
            &query(json!({"usernameLike": "f0", "roleName": "vip", "pageSize": 1})),
            "user_role_view",
        )
        .unwrap();

    assert_eq!(
        plan.sql,
        "SELECT username, r.role_name AS roleName FROM t_user u \
         left join j_user_and_role ur on ur.user_id = u.id \
         inner join t_role r on r.id = ur.role_id and r.role_name = ? \
         WHERE username LIKE ? LIMIT 1 OFFSET 0"
    );
    assert_eq!(
        plan.args,
        vec![Scalar::Text("vip".into()), Scalar::Text("%f0%".into())]
    );
}

#[test]
fn test_declared_join_view_with_text_match_on_join_field() {
    let registry = registry();
    let builder = SqlPlanBuilder::new(&registry, &CompilerConfig::default());
    let plan = builder
        .build_select(&query(json!({"roleNameLike": "adm", "pageSize": 1})), "user_role_view")
        .unwrap();

    assert_eq!(
        plan.sql,
        "SELECT username, r.role_name AS roleName FROM t_user u \
         left join j_user_and_role ur on ur.user_id = u.id \
         inner join t_role r on r.id = ur.role_id and r.role_name = ? \
         LIMIT 1 OFFSET 0"
    );
    assert_eq!(plan.args, vec![Scalar::Text("%adm%".into())]);
    assert_eq!(plan.placeholder_count(), plan.args.len());
}

#[test]
fn test_sub_domain_batch_through_reverse_marker() {
    let registry = registry();
    let builder = SqlPlanBuilder::new(&registry, &CompilerConfig::default());
    let plan = builder
        .build_sub_domain_batch("role", "users", &[Scalar::Int(1), Scalar::Int(2)], None)
        .unwrap()
        .unwrap();

    let branch = format!(
        "SELECT ? AS PK_FOR_JOIN, {} FROM t_user u \
         INNER JOIN j_user_and_role j0ur ON j0ur.user_id = u.id WHERE j0ur.role_id = ?",
        USER_COLUMNS
    );
    assert_eq!(plan.sql, format!("{} UNION ALL {}", branch, branch));
    assert_eq!(
        plan.args,
        vec![Scalar::Int(1), Scalar::Int(1), Scalar::Int(2), Scalar::Int(2)]
    );
}

#[test]
fn test_sub_domain_batch_four_domain_reverse() {
    let registry = registry();
    let builder = SqlPlanBuilder::new(&registry, &CompilerConfig::default());
    let plan = builder
        .build_sub_domain_batch("menu", "users", &[Scalar::Int(5)], None)
        .unwrap()
        .unwrap();

    assert_eq!(plan.sql.matches("INNER JOIN").count(), 3);
    assert!(plan.sql.ends_with("WHERE j2pm.menu_id = ?"));
    assert!(!plan.sql.contains(" UNION ALL "));
}

#[test]
fn test_sub_domain_batch_without_parents() {
    let registry = registry();
    let builder = SqlPlanBuilder::new(&registry, &CompilerConfig::default());
    assert_eq!(builder.build_sub_domain_batch("user", "roles", &[], None), Ok(None));
}

#[test]
fn test_fetch_first_dialect_paging() {
    let config = CompilerConfig {
        dialect: DialectKind::FetchFirst,
        start_page_number_from_one: true,
        ..Default::default()
    };
    let registry = registry_with(&config);
    let q = domainql::query_object::QueryNode::from_json(&json!({"pageNumber": 3, "pageSize": 20}), &config).unwrap();
    let plan = SqlPlanBuilder::new(&registry, &config).build_select(&q, "perm").unwrap();
    assert_eq!(
        plan.sql,
        "SELECT id, permName, valid FROM t_perm OFFSET 40 ROWS FETCH NEXT 20 ROWS ONLY"
    );
}

#[test]
fn test_configuration_errors() {
    let registry = registry();
    let builder = SqlPlanBuilder::new(&registry, &CompilerConfig::default());

    assert_eq!(
        builder.build_select(&query(json!({})), "user_role_view"),
        Err(SqlGeneratorError::MissingJoinParameter {
            name: "roleName".to_string()
        })
    );
    assert!(builder.build_select(&query(json!({})), "department").is_err());
    assert!(builder
        .build_sub_domain_batch("user", "friends", &[Scalar::Int(1)], None)
        .is_err());
}
