use super::stage::{field_ref, Stage, MONGO_ID};
use crate::schema_catalog::{AggregatePrefix, ColumnMeta, EntitySchema};
use serde_json::{json, Map, Value};

/// `$group` of an aggregated view, `None` when it neither groups nor accumulates.
///
/// Group fields form the `_id` document; accumulators come from field-name
/// prefixes (`sumQty` → `{$sum: "$qty"}`), `count` counts documents and
/// `push` collects a sub-document of the declared push fields.
pub fn build_group(schema: &EntitySchema) -> Option<Stage> {
    let mut group_id = Map::new();
    for meta in schema.group_by_metas() {
        group_id.insert(meta.field.clone(), json!(field_ref(&meta.field)));
    }

    let mut accumulators = Map::new();
    for meta in schema.columns.iter().chain(schema.aggregate_expressions.iter()) {
        if let Some(expression) = accumulator_expression(meta) {
            accumulators.insert(meta.field.clone(), expression);
        }
    }

    if group_id.is_empty() && accumulators.is_empty() {
        return None;
    }
    let id = if group_id.is_empty() {
        Value::Null
    } else {
        Value::Object(group_id)
    };
    Some(Stage::Group { id, accumulators })
}

fn accumulator_expression(meta: &ColumnMeta) -> Option<Value> {
    let accumulator = meta.accumulator.as_ref()?;
    let operator = accumulator.prefix.mongo_operator();
    let operand = match accumulator.prefix {
        AggregatePrefix::Count => json!(1),
        AggregatePrefix::Push => match &meta.push_fields {
            Some(fields) => {
                let doc: Map<String, Value> = fields
                    .iter()
                    .map(|f| (f.clone(), json!(field_ref(f))))
                    .collect();
                Value::Object(doc)
            }
            None => json!(field_ref(&accumulator.source_field)),
        },
        _ => json!(field_ref(&accumulator.source_field)),
    };
    Some(json!({ operator: operand }))
}

/// Output shape of the view.
///
/// `many_to_one` names the requested relations holding a single document; their
/// lookup arrays are unwrapped with `$arrayElemAt`. `relations` lists every
/// requested relation field, projected as-is otherwise.
pub fn build_project(schema: &EntitySchema, grouped: bool, relations: &[(String, bool)]) -> Stage {
    let mut columns = Map::new();
    if grouped {
        columns.insert(MONGO_ID.to_string(), json!(0));
    }
    for meta in &schema.columns {
        if meta.generated {
            continue;
        }
        let value = if meta.group_by {
            json!(format!("$_id.{}", meta.field))
        } else if let Some(expression) = &meta.expression {
            json!({ expression.operator.as_str(): expression.args })
        } else {
            json!(field_ref(&meta.field))
        };
        columns.insert(meta.field.clone(), value);
    }
    for (field, many) in relations {
        let value = if *many {
            json!(field_ref(field))
        } else {
            json!({ "$arrayElemAt": [field_ref(field), 0] })
        };
        columns.insert(field.clone(), value);
    }
    Stage::Project(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::schema_catalog::{SchemaConfig, SchemaRegistry};

    fn registry() -> SchemaRegistry {
        let yaml = r#"
entities:
  - name: quantity_by_status
    table: c_inventory
    fields:
      - name: status
        group_by: true
      - sumQty
      - count
      - addToSetSize
      - name: pushItems
        push_fields: [item, qty]
  - name: quantity
    table: c_inventory
    aggregate_fields: [maxQty]
    fields: [sumQty, avgQty]
  - name: inventory
    table: c_inventory
    fields:
      - name: id
        generated: true
      - item
      - name: fullName
        expression:
          operator: $concat
          args: ["$item", " ", "$status"]
"#;
        SchemaRegistry::new(SchemaConfig::from_yaml_str(yaml).unwrap(), &CompilerConfig::default())
            .unwrap()
    }

    #[test]
    fn test_group_by_status() {
        let schema = registry().get("quantity_by_status").unwrap();
        let group = build_group(&schema).unwrap();
        assert_eq!(
            group.to_document(),
            json!({"$group": {
                "_id": {"status": "$status"},
                "sumQty": {"$sum": "$qty"},
                "count": {"$sum": 1},
                "addToSetSize": {"$addToSet": "$size"},
                "pushItems": {"$push": {"item": "$item", "qty": "$qty"}}
            }})
        );
    }

    #[test]
    fn test_group_without_group_fields() {
        let schema = registry().get("quantity").unwrap();
        let group = build_group(&schema).unwrap();
        assert_eq!(
            group.to_document(),
            json!({"$group": {
                "_id": null,
                "sumQty": {"$sum": "$qty"},
                "avgQty": {"$avg": "$qty"},
                "maxQty": {"$max": "$qty"}
            }})
        );
    }

    #[test]
    fn test_plain_view_has_no_group() {
        let schema = registry().get("inventory").unwrap();
        assert!(build_group(&schema).is_none());
    }

    #[test]
    fn test_project_shapes() {
        let registry = registry();

        let grouped = registry.get("quantity_by_status").unwrap();
        let project = build_project(&grouped, true, &[]).to_document();
        assert_eq!(project["$project"]["_id"], json!(0));
        assert_eq!(project["$project"]["status"], json!("$_id.status"));
        assert_eq!(project["$project"]["sumQty"], json!("$sumQty"));

        let inventory = registry.get("inventory").unwrap();
        let project = build_project(
            &inventory,
            false,
            &[("createUser".to_string(), false), ("tags".to_string(), true)],
        )
        .to_document();
        assert_eq!(
            project,
            json!({"$project": {
                "item": "$item",
                "fullName": {"$concat": ["$item", " ", "$status"]},
                "createUser": {"$arrayElemAt": ["$createUser", 0]},
                "tags": "$tags"
            }})
        );
    }
}
