use crate::common::{query, registry};
use domainql::config::CompilerConfig;
use domainql::pipeline_generator::{AggregationPlanBuilder, PipelineGeneratorError};
use serde_json::json;

#[test]
fn test_query_pipeline_shape() {
    let registry = registry();
    let builder = AggregationPlanBuilder::new(&registry, &CompilerConfig::default());
    let pipeline = builder
        .build_query(
            &query(json!({"itemLike": "pa", "qtyGe": 10, "sort": "qty,desc", "pageNumber": 1, "pageSize": 3})),
            "inventory",
        )
        .unwrap();

    assert_eq!(
        pipeline.to_json(),
        json!([
            {"$match": {"$and": [{"item": {"$regex": "pa"}}, {"qty": {"$gte": 10}}]}},
            {"$sort": {"qty": -1}},
            {"$skip": 3},
            {"$limit": 3},
            {"$project": {"id": "$id", "item": "$item", "qty": "$qty", "status": "$status"}}
        ])
    );
}

#[test]
fn test_grouped_sort_and_having() {
    let registry = registry();
    let builder = AggregationPlanBuilder::new(&registry, &CompilerConfig::default());
    let pipeline = builder
        .build_query(
            &query(json!({"sort": "status", "having": {"sumQtyGt": 50}})),
            "quantity_by_status",
        )
        .unwrap();
    let stages = pipeline.to_json();

    let group_at = pipeline.position("$group").unwrap();
    assert_eq!(stages[group_at]["$group"]["_id"], json!({"status": "$status"}));
    assert_eq!(stages[group_at + 1], json!({"$match": {"sumQty": {"$gt": 50}}}));
    assert_eq!(stages[group_at + 2], json!({"$sort": {"_id.status": 1}}));
}

#[test]
fn test_count_pipeline_shares_prefix() {
    let registry = registry();
    let builder = AggregationPlanBuilder::new(&registry, &CompilerConfig::default());
    let q = query(json!({"status": "A", "pageSize": 5}));

    let items = builder.build_query(&q, "inventory").unwrap().to_json();
    let count = builder.build_count(&q, "inventory").unwrap().to_json();
    assert_eq!(items[0], count[0]);
    assert_eq!(count, json!([{"$match": {"status": "A"}}, {"$count": "count"}]));
}

#[test]
fn test_many_to_many_include() {
    let registry = registry();
    let builder = AggregationPlanBuilder::new(&registry, &CompilerConfig::default());
    let pipeline = builder
        .build_query(&query(json!({"withPerms": {"valid": true}})), "user")
        .unwrap();
    let lookup = &pipeline.to_json()[0]["$lookup"];

    assert_eq!(lookup["from"], json!("j_user_and_role"));
    assert_eq!(lookup["localField"], json!("_id"));
    let inner = &lookup["pipeline"][0]["$lookup"];
    assert_eq!(inner["from"], json!("j_role_and_perm"));
    assert_eq!(
        inner["pipeline"][3],
        json!({"$match": {"valid": true}})
    );
}

#[test]
fn test_geo_and_sort_errors() {
    let registry = registry();
    let builder = AggregationPlanBuilder::new(&registry, &CompilerConfig::default());
    assert!(matches!(
        builder.build_query(&query(json!({"sort": "field(status,'A','D')"})), "inventory"),
        Err(PipelineGeneratorError::UnsupportedSort { .. })
    ));
    assert!(matches!(
        builder.build_query(&query(json!({"locPy": [[0, 0], [1, 1]]})), "inventory"),
        Err(PipelineGeneratorError::GeoOperand { .. })
    ));
}
