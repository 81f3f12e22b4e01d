//! Depth-first compilation of a [`QueryNode`] into SQL predicates.
//!
//! Arguments are pushed in the exact order their placeholders are emitted.

use super::common::{placeholders, qualify, RelationJoins, AND, OR, PLACEHOLDER};
use super::errors::SqlGeneratorError;
use crate::operator::escape::like_pattern;
use crate::operator::OperatorKind;
use crate::query_object::{Condition, FilterField, FilterValue, QueryNode, Scalar};
use crate::schema_catalog::{EntitySchema, SchemaRegistry};
use std::collections::HashSet;

/// Compiles the conditions of query nodes against one statement's joins and arguments.
pub struct SqlFilterBuilder<'a> {
    registry: &'a SchemaRegistry,
    pub joins: RelationJoins,
    pub args: Vec<Scalar>,
}

impl<'a> SqlFilterBuilder<'a> {
    pub fn new(registry: &'a SchemaRegistry, joins: RelationJoins) -> Self {
        SqlFilterBuilder {
            registry,
            joins,
            args: Vec::new(),
        }
    }

    /// Compile `node` into AND-ed predicates. Top-level filters named in `skip`
    /// have already been bound elsewhere (declared join parameters).
    pub fn build_conditions(
        &mut self,
        node: &QueryNode,
        schema: &EntitySchema,
        qualifier: Option<&str>,
        skip: &HashSet<String>,
    ) -> Result<Vec<String>, SqlGeneratorError> {
        let mut parts = Vec::new();
        for condition in &node.conditions {
            match condition {
                Condition::Filter(field) => {
                    if skip.contains(&field.raw_name) {
                        continue;
                    }
                    if let Some(sql) = self.build_filter(field, schema, qualifier)? {
                        parts.push(sql);
                    }
                }
                Condition::Or(group) => {
                    if let Some(sql) = self.build_or_group(group, schema, qualifier)? {
                        parts.push(sql);
                    }
                }
                Condition::Nested { field, node } => {
                    let edge = schema.relation(field).ok_or_else(|| {
                        SqlGeneratorError::UnknownRelation {
                            entity: schema.name.clone(),
                            field: field.clone(),
                        }
                    })?;
                    let target = self.registry.get(&edge.target_entity)?;
                    let anchor = qualifier.unwrap_or_else(|| schema.qualifier());
                    let alias = self.joins.join(anchor, edge, self.registry.naming());
                    let nested =
                        self.build_conditions(node, &target, Some(&alias), &HashSet::new())?;
                    parts.extend(nested);
                }
            }
        }
        Ok(parts)
    }

    /// `WHERE`-less predicate text of a node, empty when it has no conditions
    pub fn build_predicate(
        &mut self,
        node: &QueryNode,
        schema: &EntitySchema,
        qualifier: Option<&str>,
        skip: &HashSet<String>,
    ) -> Result<String, SqlGeneratorError> {
        Ok(self.build_conditions(node, schema, qualifier, skip)?.join(AND))
    }

    fn build_or_group(
        &mut self,
        group: &[QueryNode],
        schema: &EntitySchema,
        qualifier: Option<&str>,
    ) -> Result<Option<String>, SqlGeneratorError> {
        let mut alternatives = Vec::new();
        for alternative in group {
            let mut parts = self.build_conditions(alternative, schema, qualifier, &HashSet::new())?;
            match parts.len() {
                0 => {}
                1 => alternatives.push(parts.remove(0)),
                _ => alternatives.push(format!("({})", parts.join(AND))),
            }
        }
        Ok(match alternatives.len() {
            0 => None,
            1 => alternatives.pop(),
            _ => Some(format!("({})", alternatives.join(OR))),
        })
    }

    fn build_filter(
        &mut self,
        field: &FilterField,
        schema: &EntitySchema,
        qualifier: Option<&str>,
    ) -> Result<Option<String>, SqlGeneratorError> {
        let column = qualify(qualifier, &schema.column_name_of(&field.column_name));
        let operator = field.operator;

        if operator.is_geo() {
            return Err(SqlGeneratorError::UnsupportedOperator {
                field: field.raw_name.clone(),
                operator: operator.to_string(),
            });
        }

        match (&field.value, operator) {
            (FilterValue::Document(_), _) => Err(SqlGeneratorError::DocumentOperand {
                field: field.raw_name.clone(),
            }),
            (FilterValue::Collection(items), OperatorKind::In) => {
                if items.is_empty() {
                    return Ok(Some(format!("{} IN (null)", column)));
                }
                self.args.extend(items.iter().cloned());
                Ok(Some(format!("{} IN {}", column, placeholders(items.len()))))
            }
            (FilterValue::Collection(items), OperatorKind::NotIn) => {
                if items.is_empty() {
                    return Ok(None);
                }
                self.args.extend(items.iter().cloned());
                Ok(Some(format!("{} NOT IN {}", column, placeholders(items.len()))))
            }
            (FilterValue::Collection(_), _) => Err(SqlGeneratorError::UnsupportedOperator {
                field: field.raw_name.clone(),
                operator: format!("{} with a collection operand", operator),
            }),
            (FilterValue::Scalar(value), _) => self.build_scalar(field, column, value),
        }
    }

    fn build_scalar(
        &mut self,
        field: &FilterField,
        column: String,
        value: &Scalar,
    ) -> Result<Option<String>, SqlGeneratorError> {
        let operator = field.operator;

        if operator.is_unary() {
            let switch = value.as_bool().unwrap_or(true);
            let is_null = match operator {
                OperatorKind::IsNull => switch,
                OperatorKind::IsNotNull | OperatorKind::Exists => !switch,
                _ => switch,
            };
            let test = if is_null { "IS NULL" } else { "IS NOT NULL" };
            return Ok(Some(format!("{} {}", column, test)));
        }

        if *value == Scalar::Null {
            return Ok(match operator {
                OperatorKind::Equal => Some(format!("{} IS NULL", column)),
                OperatorKind::NotEqual => Some(format!("{} IS NOT NULL", column)),
                _ => None,
            });
        }

        let comparison = operator.sql_comparison().ok_or_else(|| {
            SqlGeneratorError::UnsupportedOperator {
                field: field.raw_name.clone(),
                operator: operator.to_string(),
            }
        })?;

        let arg = if operator.is_text_match() {
            let text = value.as_text().unwrap_or_default();
            Scalar::Text(like_pattern(operator, &text).unwrap_or(text))
        } else {
            value.clone()
        };
        self.args.push(arg);
        Ok(Some(format!("{} {} {}", column, comparison, PLACEHOLDER)))
    }
}

/// The node (or any OR alternative) filters through a declared relation of `schema`.
pub fn uses_relations(node: &QueryNode, schema: &EntitySchema) -> bool {
    node.conditions.iter().any(|c| match c {
        Condition::Nested { field, .. } => schema.relation(field).is_some(),
        Condition::Or(group) => group.iter().any(|alt| uses_relations(alt, schema)),
        Condition::Filter(_) => false,
    })
}
