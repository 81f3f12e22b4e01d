//! JSON query object → [`QueryNode`].
//!
//! Keys are read in document order. `pageNumber`, `pageSize`, `sort` and
//! `having` are reserved; `<name>Or` keys are OR-groups; `with<Relation>`
//! keys request sub-domain loading; `null` values are skipped.

use super::errors::QueryObjectError;
use super::query_node::{Condition, FilterField, Include, Pagination, QueryNode};
use super::sort::SortSpec;
use super::value::FilterValue;
use crate::config::CompilerConfig;
use crate::operator::{self, OperatorKind, OR_SUFFIX};
use crate::relation_path::naming::uncapitalize;
use serde_json::{Map, Value};

pub const PAGE_NUMBER: &str = "pageNumber";
pub const PAGE_SIZE: &str = "pageSize";
pub const SORT: &str = "sort";
pub const HAVING: &str = "having";
const INCLUDE_PREFIX: &str = "with";

impl QueryNode {
    pub fn from_json(value: &Value, config: &CompilerConfig) -> Result<QueryNode, QueryObjectError> {
        match value {
            Value::Object(map) => parse_object(map, config),
            other => Err(QueryObjectError::NotAnObject(type_name(other).to_string())),
        }
    }

    pub fn from_json_str(text: &str, config: &CompilerConfig) -> Result<QueryNode, QueryObjectError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| QueryObjectError::NotAnObject(e.to_string()))?;
        Self::from_json(&value, config)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_object(map: &Map<String, Value>, config: &CompilerConfig) -> Result<QueryNode, QueryObjectError> {
    let mut node = QueryNode::new();
    let mut page_number = None;
    let mut page_size = None;

    for (key, value) in map {
        if value.is_null() {
            continue;
        }
        match key.as_str() {
            PAGE_NUMBER => page_number = Some(parse_paging(key, value)?),
            PAGE_SIZE => page_size = Some(parse_paging(key, value)?),
            SORT => {
                let text = value.as_str().ok_or_else(|| {
                    QueryObjectError::InvalidSort(value.to_string())
                })?;
                let spec = SortSpec::parse(text)?;
                if !spec.is_empty() {
                    node.sort = Some(spec);
                }
            }
            HAVING => node.having = Some(Box::new(QueryNode::from_json(value, config)?)),
            _ if operator::is_or_group(key) => {
                let base = &key[..key.len() - OR_SUFFIX.len()];
                node.conditions
                    .push(Condition::Or(parse_or_group(key, base, value, config)?));
            }
            _ => {
                if let Some(relation) = include_relation(key) {
                    node.includes.push(parse_include(key, relation, value, config)?);
                    continue;
                }
                if let Some(condition) = parse_condition(key, value, config)? {
                    node.conditions.push(condition);
                }
            }
        }
    }

    if page_number.is_some() || page_size.is_some() {
        node.page = Some(Pagination {
            page_number: page_number.unwrap_or(0),
            page_size: page_size.unwrap_or(u64::from(config.default_page_size)),
        });
    }
    Ok(node)
}

fn parse_paging(key: &str, value: &Value) -> Result<u64, QueryObjectError> {
    value.as_u64().ok_or_else(|| QueryObjectError::InvalidPaging {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// `withRoles` → `roles`
fn include_relation(key: &str) -> Option<String> {
    let rest = key.strip_prefix(INCLUDE_PREFIX)?;
    match rest.chars().next() {
        Some(c) if c.is_ascii_uppercase() => Some(uncapitalize(rest)),
        _ => None,
    }
}

fn parse_include(
    key: &str,
    relation: String,
    value: &Value,
    config: &CompilerConfig,
) -> Result<Include, QueryObjectError> {
    let query = match value {
        Value::Bool(true) => QueryNode::new(),
        Value::Object(map) => parse_object(map, config)?,
        _ => {
            return Err(QueryObjectError::InvalidInclude {
                field: key.to_string(),
            })
        }
    };
    Ok(Include { relation, query })
}

/// A single key/value pair. Object values under a plain (equality) name are
/// nested sub-queries; everything else is a filter.
fn parse_condition(
    key: &str,
    value: &Value,
    config: &CompilerConfig,
) -> Result<Option<Condition>, QueryObjectError> {
    if value.is_null() {
        return Ok(None);
    }
    if let Value::Object(map) = value {
        let (kind, _) = operator::resolve(key);
        if kind == OperatorKind::Equal && !map.keys().any(|k| k.starts_with('$')) {
            return Ok(Some(Condition::Nested {
                field: key.to_string(),
                node: parse_object(map, config)?,
            }));
        }
    }
    let field = FilterField::new(key, FilterValue::from_json(value))?;
    Ok(Some(Condition::Filter(field)))
}

fn parse_or_group(
    key: &str,
    base: &str,
    value: &Value,
    config: &CompilerConfig,
) -> Result<Vec<QueryNode>, QueryObjectError> {
    match value {
        // each member is one alternative
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| single_condition_node(k, v, config))
            .collect(),
        Value::Array(items) if items.iter().all(Value::is_object) => items
            .iter()
            .map(|item| QueryNode::from_json(item, config))
            .collect(),
        // each scalar is an alternative value for the base name
        Value::Array(items) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| single_condition_node(base, v, config))
            .collect(),
        _ => Err(QueryObjectError::InvalidOrGroup {
            field: key.to_string(),
        }),
    }
}

fn single_condition_node(
    key: &str,
    value: &Value,
    config: &CompilerConfig,
) -> Result<QueryNode, QueryObjectError> {
    let mut node = QueryNode::new();
    if operator::is_or_group(key) {
        let base = &key[..key.len() - OR_SUFFIX.len()];
        node.conditions
            .push(Condition::Or(parse_or_group(key, base, value, config)?));
    } else if let Some(condition) = parse_condition(key, value, config)? {
        node.conditions.push(condition);
    }
    Ok(node)
}
