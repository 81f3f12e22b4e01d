use super::errors::PipelineGeneratorError;
use super::filter_builder::build_filter;
use super::group_builder::{build_group, build_project};
use super::lookup_builder::{build_nested_lookup, build_sub_domain_lookup};
use super::stage::{Pipeline, SortOrder, Stage, COUNT_KEY, MONGO_ID};
use crate::config::CompilerConfig;
use crate::query_object::{Condition, QueryNode, SortDirection, SortItem};
use crate::schema_catalog::{EntitySchema, SchemaRegistry};

/// Builds aggregation pipelines for entities and views of one registry.
#[derive(Debug)]
pub struct AggregationPlanBuilder<'a> {
    registry: &'a SchemaRegistry,
    config: CompilerConfig,
}

/// Stages shared by query and count, plus what the tail needs to know.
struct Prefix {
    pipeline: Pipeline,
    grouped: bool,
    /// Requested relation fields and whether each holds many documents
    includes: Vec<(String, bool)>,
}

impl<'a> AggregationPlanBuilder<'a> {
    pub fn new(registry: &'a SchemaRegistry, config: &CompilerConfig) -> Self {
        AggregationPlanBuilder {
            registry,
            config: config.clone(),
        }
    }

    pub fn build_query(&self, query: &QueryNode, entity: &str) -> Result<Pipeline, PipelineGeneratorError> {
        let schema = self.registry.get(entity)?;
        let Prefix {
            mut pipeline,
            grouped,
            includes,
        } = self.build_prefix(query, &schema)?;

        pipeline.push(build_sort(query, &schema)?);
        if let Some(page) = query.page {
            let offset = self.config.calc_offset(page.page_number, page.page_size);
            pipeline.push(Stage::Skip(offset));
            pipeline.push(Stage::Limit(page.page_size));
        }
        pipeline.push(build_project(&schema, grouped, &includes));

        log::debug!("Pipeline for '{}' has {} stages", entity, pipeline.len());
        Ok(pipeline)
    }

    pub fn build_count(&self, query: &QueryNode, entity: &str) -> Result<Pipeline, PipelineGeneratorError> {
        let schema = self.registry.get(entity)?;
        let mut pipeline = self.build_prefix(query, &schema)?.pipeline;
        pipeline.push(Stage::Count(COUNT_KEY.to_string()));

        log::debug!("Count pipeline for '{}' has {} stages", entity, pipeline.len());
        Ok(pipeline)
    }

    fn build_prefix(&self, query: &QueryNode, schema: &EntitySchema) -> Result<Prefix, PipelineGeneratorError> {
        let naming = self.registry.naming();
        let mut pipeline = Pipeline::default();

        // Relations filtered on are looked up first so $match can reach them.
        let mut unset = Vec::new();
        filtered_relations(query, schema, &mut unset);
        for field in &unset {
            if let Some(edge) = schema.relation(field) {
                pipeline.push(build_nested_lookup(edge, naming));
            }
        }

        if let Some(filter) = build_filter(query, "")? {
            pipeline.push(Stage::Match(filter));
        }
        if !unset.is_empty() {
            pipeline.push(Stage::Unset(unset));
        }

        let mut includes = Vec::with_capacity(query.includes.len());
        for include in &query.includes {
            let edge = schema.relation(&include.relation).ok_or_else(|| {
                PipelineGeneratorError::UnknownRelation {
                    entity: schema.name.clone(),
                    field: include.relation.clone(),
                }
            })?;
            let target = self.registry.get(&edge.target_entity)?;
            pipeline.push(build_sub_domain_lookup(edge, naming, &target, &include.query)?);
            includes.push((edge.field.clone(), edge.many));
        }

        let group = build_group(schema);
        let grouped = group.is_some();
        if let Some(group) = group {
            pipeline.push(group);
        }

        // Having reads the grouped output, so it always follows $group.
        if let Some(having) = query.having.as_deref() {
            if let Some(filter) = build_filter(having, "")? {
                pipeline.push(Stage::Match(filter));
            }
        }

        Ok(Prefix {
            pipeline,
            grouped,
            includes,
        })
    }
}

/// Relation fields filtered on by `node` or any of its OR alternatives, first use first.
fn filtered_relations(node: &QueryNode, schema: &EntitySchema, fields: &mut Vec<String>) {
    for condition in &node.conditions {
        match condition {
            Condition::Nested { field, node } => {
                if !node.has_no_conditions()
                    && schema.relation(field).is_some()
                    && !fields.contains(field)
                {
                    fields.push(field.clone());
                }
            }
            Condition::Or(group) => {
                for alternative in group {
                    filtered_relations(alternative, schema, fields);
                }
            }
            Condition::Filter(_) => {}
        }
    }
}

/// Explicit sort, or `_id` ascending for stable paging. Group fields sort by `_id.<field>`.
fn build_sort(query: &QueryNode, schema: &EntitySchema) -> Result<Stage, PipelineGeneratorError> {
    let spec = match &query.sort {
        Some(spec) => spec,
        None => return Ok(Stage::Sort(vec![(MONGO_ID.to_string(), SortOrder::Asc)])),
    };

    let mut keys = Vec::with_capacity(spec.items.len());
    for item in &spec.items {
        match item {
            SortItem::Field { field, direction } => {
                let key = if schema.is_group_field(field) {
                    format!("{}.{}", MONGO_ID, field)
                } else {
                    field.clone()
                };
                let order = match direction {
                    Some(SortDirection::Desc) => SortOrder::Desc,
                    _ => SortOrder::Asc,
                };
                keys.push((key, order));
            }
            SortItem::Raw { expression, .. } => {
                return Err(PipelineGeneratorError::UnsupportedSort {
                    expression: expression.clone(),
                })
            }
        }
    }
    Ok(Stage::Sort(keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    const SCHEMA: &str = r#"
entities:
  - name: inventory
    table: c_inventory
    fields: [id, item, qty, status]
  - name: quantity_by_status
    table: c_inventory
    fields:
      - name: status
        group_by: true
      - sumQty
      - count
  - name: user
    fields: [id, username, valid]
    relations:
      - name: roles
        path: [user, role]
      - name: createUser
        path: [user]
        local_field: createUserId
        many: false
  - name: role
    fields: [id, roleName, valid]
"#;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new(
            crate::schema_catalog::SchemaConfig::from_yaml_str(SCHEMA).unwrap(),
            &CompilerConfig::default(),
        )
        .unwrap()
    }

    fn query(value: Value) -> QueryNode {
        QueryNode::from_json(&value, &CompilerConfig::default()).unwrap()
    }

    #[test]
    fn test_plain_query_sorts_by_id_and_pages() {
        let registry = registry();
        let builder = AggregationPlanBuilder::new(&registry, &CompilerConfig::default());
        let pipeline = builder
            .build_query(&query(json!({"qtyGt": 15, "pageNumber": 1, "pageSize": 2})), "inventory")
            .unwrap();
        assert_eq!(
            pipeline.to_json(),
            json!([
                {"$match": {"qty": {"$gt": 15}}},
                {"$sort": {"_id": 1}},
                {"$skip": 2},
                {"$limit": 2},
                {"$project": {"id": "$id", "item": "$item", "qty": "$qty", "status": "$status"}}
            ])
        );
    }

    #[test]
    fn test_grouped_sort_reads_group_key() {
        let registry = registry();
        let builder = AggregationPlanBuilder::new(&registry, &CompilerConfig::default());
        let pipeline = builder
            .build_query(&query(json!({"sort": "status,desc;sumQty"})), "quantity_by_status")
            .unwrap();
        let stages = pipeline.to_json();
        assert_eq!(
            stages[0],
            json!({"$group": {"_id": {"status": "$status"}, "sumQty": {"$sum": "$qty"}, "count": {"$sum": 1}}})
        );
        assert_eq!(stages[1], json!({"$sort": {"_id.status": -1, "sumQty": 1}}));
        assert_eq!(
            stages[2],
            json!({"$project": {"_id": 0, "status": "$_id.status", "sumQty": "$sumQty", "count": "$count"}})
        );
    }

    #[test]
    fn test_having_follows_group() {
        let registry = registry();
        let builder = AggregationPlanBuilder::new(&registry, &CompilerConfig::default());
        let pipeline = builder
            .build_query(
                &query(json!({"status": "A", "having": {"status": "A", "sumQtyGt": 100}})),
                "quantity_by_status",
            )
            .unwrap();

        let match_at = pipeline.position("$match").unwrap();
        let group_at = pipeline.position("$group").unwrap();
        assert!(match_at < group_at);
        assert_eq!(
            pipeline.to_json()[group_at + 1],
            json!({"$match": {"$and": [{"status": "A"}, {"sumQty": {"$gt": 100}}]}})
        );
    }

    #[test]
    fn test_relation_filter_is_looked_up_then_unset() {
        let registry = registry();
        let builder = AggregationPlanBuilder::new(&registry, &CompilerConfig::default());
        let pipeline = builder
            .build_count(&query(json!({"roles": {"roleName": "admin"}, "valid": true})), "user")
            .unwrap();
        let stages = pipeline.to_json();
        assert_eq!(stages[0]["$lookup"]["as"], json!("roles"));
        assert_eq!(
            stages[1],
            json!({"$match": {"$and": [{"roles.roleName": "admin"}, {"valid": true}]}})
        );
        assert_eq!(stages[2], json!({"$unset": ["roles"]}));
        assert_eq!(stages[3], json!({"$count": "count"}));
        assert_eq!(pipeline.len(), 4);
    }

    #[test]
    fn test_relation_inside_or_group_is_looked_up() {
        let registry = registry();
        let builder = AggregationPlanBuilder::new(&registry, &CompilerConfig::default());
        let pipeline = builder
            .build_query(
                &query(json!({
                    "anyOr": {"roles": {"roleName": "admin"}, "valid": true},
                    "roles": {"valid": true}
                })),
                "user",
            )
            .unwrap();
        let stages = pipeline.to_json();
        assert_eq!(stages[0]["$lookup"]["as"], json!("roles"));
        assert_eq!(
            stages[1],
            json!({"$match": {"$and": [
                {"$or": [{"roles.roleName": "admin"}, {"valid": true}]},
                {"roles.valid": true}
            ]}})
        );
        assert_eq!(stages[2], json!({"$unset": ["roles"]}));

        let pipeline = builder
            .build_count(&query(json!({"anyOr": {"roles": {"roleName": "admin"}, "valid": true}})), "user")
            .unwrap();
        let stages = pipeline.to_json();
        assert_eq!(stages[0]["$lookup"]["as"], json!("roles"));
        assert_eq!(
            stages[1],
            json!({"$match": {"$or": [{"roles.roleName": "admin"}, {"valid": true}]}})
        );
        assert_eq!(stages[2], json!({"$unset": ["roles"]}));
        assert_eq!(pipeline.len(), 4);
    }

    #[test]
    fn test_sub_domain_include_projects_relation() {
        let registry = registry();
        let builder = AggregationPlanBuilder::new(&registry, &CompilerConfig::default());
        let pipeline = builder
            .build_query(&query(json!({"withRoles": {"valid": true}, "withCreateUser": true})), "user")
            .unwrap();
        let stages = pipeline.to_json();
        assert_eq!(stages[0]["$lookup"]["as"], json!("roles"));
        assert_eq!(stages[1]["$lookup"]["from"], json!("t_user"));
        let project = &stages[pipeline.len() - 1]["$project"];
        assert_eq!(project["roles"], json!("$roles"));
        assert_eq!(project["createUser"], json!({"$arrayElemAt": ["$createUser", 0]}));
    }

    #[test]
    fn test_configuration_errors() {
        let registry = registry();
        let builder = AggregationPlanBuilder::new(&registry, &CompilerConfig::default());
        assert!(matches!(
            builder.build_query(&query(json!({"sort": "field(status,'A','D')"})), "inventory"),
            Err(PipelineGeneratorError::UnsupportedSort { .. })
        ));
        assert!(matches!(
            builder.build_query(&query(json!({"withFriends": true})), "user"),
            Err(PipelineGeneratorError::UnknownRelation { .. })
        ));
        assert!(matches!(
            builder.build_query(&QueryNode::new(), "nobody"),
            Err(PipelineGeneratorError::Schema(_))
        ));
    }
}
