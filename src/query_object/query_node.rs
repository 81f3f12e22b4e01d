use super::errors::QueryObjectError;
use super::sort::SortSpec;
use super::value::{FilterValue, Scalar};
use crate::operator::{self, OperatorKind};
use serde::Serialize;

/// One parsed filter: raw name, resolved operator and column, operand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterField {
    pub raw_name: String,
    pub operator: OperatorKind,
    pub column_name: String,
    pub value: FilterValue,
}

impl FilterField {
    /// Resolve `raw_name` and check the operand shape against the operator.
    pub fn new(raw_name: &str, value: FilterValue) -> Result<FilterField, QueryObjectError> {
        let (operator, column_name) = operator::resolve(raw_name);

        if operator.requires_collection() && !matches!(value, FilterValue::Collection(_)) {
            return Err(QueryObjectError::NotACollection {
                field: raw_name.to_string(),
            });
        }
        if operator.is_unary() && !matches!(value, FilterValue::Scalar(Scalar::Bool(_))) {
            return Err(QueryObjectError::InvalidOperand {
                field: raw_name.to_string(),
                expected: "a boolean".to_string(),
            });
        }
        if operator.is_text_match()
            && value.as_scalar().and_then(Scalar::as_text).is_none()
        {
            return Err(QueryObjectError::InvalidOperand {
                field: raw_name.to_string(),
                expected: "a text value".to_string(),
            });
        }

        Ok(FilterField {
            raw_name: raw_name.to_string(),
            operator,
            column_name: column_name.to_string(),
            value,
        })
    }
}

/// Element of a query node, kept in encounter order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Condition {
    Filter(FilterField),
    /// Alternatives combined with OR; the group is AND-ed with its siblings
    Or(Vec<QueryNode>),
    /// Sub-query scoped to a declared relation, or to a nested document
    /// path when the field is not a relation
    Nested { field: String, node: QueryNode },
}

/// Request to load a relation's rows alongside the result (`withRoles`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Include {
    pub relation: String,
    pub query: QueryNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page_number: u64,
    pub page_size: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QueryNode {
    pub conditions: Vec<Condition>,
    pub includes: Vec<Include>,
    pub page: Option<Pagination>,
    pub sort: Option<SortSpec>,
    pub having: Option<Box<QueryNode>>,
}

impl QueryNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter. The operator is resolved from `raw_name`.
    pub fn filter(
        mut self,
        raw_name: &str,
        value: impl Into<FilterValue>,
    ) -> Result<Self, QueryObjectError> {
        let field = FilterField::new(raw_name, value.into())?;
        self.conditions.push(Condition::Filter(field));
        Ok(self)
    }

    pub fn or(mut self, alternatives: Vec<QueryNode>) -> Self {
        self.conditions.push(Condition::Or(alternatives));
        self
    }

    pub fn nested(mut self, field: impl Into<String>, node: QueryNode) -> Self {
        self.conditions.push(Condition::Nested {
            field: field.into(),
            node,
        });
        self
    }

    pub fn include(mut self, relation: impl Into<String>, query: QueryNode) -> Self {
        self.includes.push(Include {
            relation: relation.into(),
            query,
        });
        self
    }

    pub fn page(mut self, page_number: u64, page_size: u64) -> Self {
        self.page = Some(Pagination {
            page_number,
            page_size,
        });
        self
    }

    pub fn sort(mut self, sort: &str) -> Result<Self, QueryObjectError> {
        let spec = SortSpec::parse(sort)?;
        self.sort = if spec.is_empty() { None } else { Some(spec) };
        Ok(self)
    }

    pub fn having(mut self, having: QueryNode) -> Self {
        self.having = Some(Box::new(having));
        self
    }

    pub fn filters(&self) -> impl Iterator<Item = &FilterField> {
        self.conditions.iter().filter_map(|c| match c {
            Condition::Filter(f) => Some(f),
            _ => None,
        })
    }

    pub fn or_groups(&self) -> impl Iterator<Item = &[QueryNode]> {
        self.conditions.iter().filter_map(|c| match c {
            Condition::Or(group) => Some(group.as_slice()),
            _ => None,
        })
    }

    pub fn nested_queries(&self) -> impl Iterator<Item = (&str, &QueryNode)> {
        self.conditions.iter().filter_map(|c| match c {
            Condition::Nested { field, node } => Some((field.as_str(), node)),
            _ => None,
        })
    }

    pub fn find_filter(&self, raw_name: &str) -> Option<&FilterField> {
        self.filters().find(|f| f.raw_name == raw_name)
    }

    /// No filter, OR-group or nested condition at all
    pub fn has_no_conditions(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn is_sorted(&self) -> bool {
        self.sort.as_ref().is_some_and(|s| !s.is_empty())
    }
}
