//! [`QueryNode`] → `$match` filter documents.

use super::errors::PipelineGeneratorError;
use super::geo_filters::build_geo_filter;
use crate::operator::escape::regex_pattern;
use crate::operator::OperatorKind;
use crate::query_object::{Condition, FilterField, FilterValue, QueryNode, Scalar};
use serde_json::{json, Value};

/// Compile a node into one filter document, `None` when nothing constrains it.
pub fn build_filter(node: &QueryNode, prefix: &str) -> Result<Option<Value>, PipelineGeneratorError> {
    let mut filters = build_filters(node, prefix)?;
    Ok(match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(json!({ "$and": filters })),
    })
}

/// Conditions of a node, one document each. Nested nodes extend the dotted prefix.
fn build_filters(node: &QueryNode, prefix: &str) -> Result<Vec<Value>, PipelineGeneratorError> {
    let mut filters = Vec::new();
    for condition in &node.conditions {
        match condition {
            Condition::Filter(field) => filters.push(build_field_filter(field, prefix)?),
            Condition::Or(group) => {
                let mut alternatives = Vec::new();
                for alternative in group {
                    if let Some(filter) = build_filter(alternative, prefix)? {
                        alternatives.push(filter);
                    }
                }
                match alternatives.len() {
                    0 => {}
                    1 => filters.extend(alternatives.pop()),
                    _ => filters.push(json!({ "$or": alternatives })),
                }
            }
            Condition::Nested { field, node } => {
                filters.extend(build_filters(node, &join_path(prefix, field))?);
            }
        }
    }
    Ok(filters)
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}

fn build_field_filter(field: &FilterField, prefix: &str) -> Result<Value, PipelineGeneratorError> {
    let column = join_path(prefix, &field.column_name);
    let operator = field.operator;
    let operand = field.value.to_json();

    if operator.is_geo() {
        return build_geo_filter(&field.raw_name, &column, operator, &operand);
    }

    if operator.is_unary() {
        let switch = field
            .value
            .as_scalar()
            .and_then(Scalar::as_bool)
            .unwrap_or(true);
        return Ok(match operator {
            OperatorKind::Exists => json!({ column: { "$exists": switch } }),
            OperatorKind::IsNull if switch => json!({ column: Value::Null }),
            OperatorKind::IsNotNull if !switch => json!({ column: Value::Null }),
            _ => json!({ column: { "$ne": Value::Null } }),
        });
    }

    if let Some(pattern) = text_pattern(field)? {
        let regex = json!({ "$regex": pattern });
        return Ok(if operator.is_negated() {
            json!({ column: { "$not": regex } })
        } else {
            json!({ column: regex })
        });
    }

    match operator {
        OperatorKind::Equal => Ok(json!({ column: operand })),
        other => {
            let comparison = other.mongo_comparison().ok_or_else(|| {
                PipelineGeneratorError::UnsupportedOperand {
                    field: field.raw_name.clone(),
                    operator: other.to_string(),
                }
            })?;
            Ok(json!({ column: { comparison: operand } }))
        }
    }
}

/// Regex of the text-match family and `Rx`
fn text_pattern(field: &FilterField) -> Result<Option<String>, PipelineGeneratorError> {
    let operator = field.operator;
    if !operator.is_text_match() && operator != OperatorKind::RegexMatch {
        return Ok(None);
    }
    match &field.value {
        FilterValue::Scalar(value) => {
            let text = value.as_text().unwrap_or_default();
            Ok(regex_pattern(operator, &text))
        }
        _ => Err(PipelineGeneratorError::UnsupportedOperand {
            field: field.raw_name.clone(),
            operator: operator.to_string(),
        }),
    }
}
