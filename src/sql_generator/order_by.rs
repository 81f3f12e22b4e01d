use super::common::qualify;
use crate::query_object::{SortItem, SortSpec};
use crate::schema_catalog::EntitySchema;

/// ` ORDER BY ...` for a sort spec, empty when there is nothing to sort by.
///
/// Declared fields whose column is an expression are ordered by their select
/// alias; raw function expressions are emitted verbatim.
pub fn build_order_by(sort: Option<&SortSpec>, schema: &EntitySchema, qualifier: Option<&str>) -> String {
    let items: Vec<String> = match sort {
        Some(spec) => spec.items.iter().map(|item| render_item(item, schema, qualifier)).collect(),
        None => return String::new(),
    };
    if items.is_empty() {
        return String::new();
    }
    format!(" ORDER BY {}", items.join(", "))
}

fn render_item(item: &SortItem, schema: &EntitySchema, qualifier: Option<&str>) -> String {
    let (expression, direction) = match item {
        SortItem::Field { field, direction } => {
            let expression = match schema.column(field) {
                Some(meta) if meta.is_bare() => qualify(qualifier, &meta.column),
                Some(meta) => meta.field.clone(),
                None => qualify(qualifier, &schema.column_name_of(field)),
            };
            (expression, direction)
        }
        SortItem::Raw {
            expression,
            direction,
        } => (expression.clone(), direction),
    };
    match direction {
        Some(d) => format!("{} {}", expression, d.as_sql()),
        None => expression,
    }
}
