use super::common::{qualify, RelationJoins, SqlPlan, FROM, PLACEHOLDER, SELECT, WHERE};
use super::dialect::{dialect_for, Dialect};
use super::errors::SqlGeneratorError;
use super::filter_builder::{uses_relations, SqlFilterBuilder};
use super::order_by::build_order_by;
use crate::config::CompilerConfig;
use crate::operator::escape::like_pattern;
use crate::query_object::{FilterField, FilterValue, Pagination, QueryNode, Scalar};
use crate::schema_catalog::{EntitySchema, SchemaRegistry};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashSet;

lazy_static! {
    static ref JOIN_PARAMETER: Regex = Regex::new(r"#\{(\w+)\}").expect("valid join parameter pattern");
}

/// Builds parameterized SQL plans for entities and views of one registry.
#[derive(Debug)]
pub struct SqlPlanBuilder<'a> {
    pub(super) registry: &'a SchemaRegistry,
    pub(super) config: CompilerConfig,
    pub(super) dialect: Box<dyn Dialect>,
}

/// FROM/JOIN/WHERE shared by select and count.
struct Statement {
    from: String,
    where_sql: String,
    having_sql: String,
    args: Vec<Scalar>,
    qualifier: Option<String>,
    relation_joined: bool,
}

impl<'a> SqlPlanBuilder<'a> {
    pub fn new(registry: &'a SchemaRegistry, config: &CompilerConfig) -> Self {
        SqlPlanBuilder {
            registry,
            config: config.clone(),
            dialect: dialect_for(config.dialect),
        }
    }

    /// Replace the paging dialect chosen by the configuration
    pub fn with_dialect(mut self, dialect: Box<dyn Dialect>) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn build_select(&self, query: &QueryNode, entity: &str) -> Result<SqlPlan, SqlGeneratorError> {
        let schema = self.registry.get(entity)?;
        let statement = self.build_statement(query, &schema)?;
        let sql = self.render_select(query, &schema, &statement)?;
        let sql = self.build_paging(sql, query.page);

        log::debug!("SQL select for '{}': {}", entity, sql);
        Ok(SqlPlan::new(sql, statement.args))
    }

    pub fn build_count(&self, query: &QueryNode, entity: &str) -> Result<SqlPlan, SqlGeneratorError> {
        let schema = self.registry.get(entity)?;
        let statement = self.build_statement(query, &schema)?;

        let sql = if query.having.is_some() {
            let inner = self.render_select(query, &schema, &statement)?;
            format!("SELECT COUNT(*) FROM ({}) t_count", strip_order_by(&inner))
        } else {
            let count = if schema.is_grouped() {
                let columns: Vec<String> = schema
                    .group_by_metas()
                    .map(|c| qualify(statement.qualifier.as_deref(), &c.column))
                    .collect();
                format!("COUNT(DISTINCT({}))", columns.join(", "))
            } else if statement.relation_joined {
                format!(
                    "COUNT(DISTINCT {})",
                    qualify(statement.qualifier.as_deref(), &schema.primary_key_column)
                )
            } else {
                "COUNT(*)".to_string()
            };
            format!("{}{}{}{}", SELECT, count, statement.from, statement.where_sql)
        };

        log::debug!("SQL count for '{}': {}", entity, sql);
        Ok(SqlPlan::new(sql, statement.args))
    }

    fn build_statement(&self, query: &QueryNode, schema: &EntitySchema) -> Result<Statement, SqlGeneratorError> {
        let mut args = Vec::new();
        let (declared_joins, consumed) = bind_join_clauses(schema, query, &mut args)?;

        let relation_joined = uses_relations(query, schema)
            || query
                .having
                .as_deref()
                .is_some_and(|having| uses_relations(having, schema));
        let qualifier = relation_joined.then(|| schema.qualifier().to_string());

        let mut filters = SqlFilterBuilder::new(self.registry, RelationJoins::new(&schema.table_aliases()));
        let where_clause =
            filters.build_predicate(query, schema, qualifier.as_deref(), &consumed)?;
        let having_clause = match query.having.as_deref() {
            Some(having) => {
                filters.build_predicate(having, schema, qualifier.as_deref(), &HashSet::new())?
            }
            None => String::new(),
        };
        args.append(&mut filters.args);

        Ok(Statement {
            from: format!(
                "{}{}{}{}",
                FROM,
                schema.from_clause(),
                declared_joins,
                filters.joins.to_sql()
            ),
            where_sql: if where_clause.is_empty() {
                String::new()
            } else {
                format!("{}{}", WHERE, where_clause)
            },
            having_sql: if having_clause.is_empty() {
                String::new()
            } else {
                format!(" HAVING {}", having_clause)
            },
            args,
            qualifier,
            relation_joined,
        })
    }

    fn render_select(
        &self,
        query: &QueryNode,
        schema: &EntitySchema,
        statement: &Statement,
    ) -> Result<String, SqlGeneratorError> {
        let qualifier = statement.qualifier.as_deref();
        let distinct = if statement.relation_joined && !schema.aggregated {
            "DISTINCT "
        } else {
            ""
        };

        let group_by = if schema.is_grouped() {
            let columns: Vec<String> = schema
                .group_by_metas()
                .map(|c| qualify(qualifier, &c.column))
                .collect();
            format!(" GROUP BY {}", columns.join(", "))
        } else {
            String::new()
        };

        Ok(format!(
            "{}{}{}{}{}{}{}{}",
            SELECT,
            distinct,
            select_columns(schema, qualifier)?,
            statement.from,
            statement.where_sql,
            group_by,
            statement.having_sql,
            build_order_by(query.sort.as_ref(), schema, qualifier)
        ))
    }

    pub(super) fn build_paging(&self, sql: String, page: Option<Pagination>) -> String {
        match page {
            Some(page) => {
                let offset = self.config.calc_offset(page.page_number, page.page_size);
                self.dialect.build_page_sql(&sql, page.page_size, offset)
            }
            None => sql,
        }
    }
}

/// Select list of an entity: `col`, `col AS field`, `max(id) AS maxId`.
pub(super) fn select_columns(schema: &EntitySchema, qualifier: Option<&str>) -> Result<String, SqlGeneratorError> {
    let mut columns = Vec::with_capacity(schema.columns.len());
    for meta in &schema.columns {
        let unsupported_accumulator = meta
            .accumulator
            .as_ref()
            .is_some_and(|acc| acc.prefix.sql_function().is_none());
        if meta.expression.is_some() || unsupported_accumulator {
            return Err(SqlGeneratorError::UnsupportedColumn {
                entity: schema.name.clone(),
                field: meta.field.clone(),
            });
        }

        let column = qualify(qualifier, &meta.column);
        if meta.is_bare() && meta.column == meta.field {
            columns.push(column);
        } else {
            columns.push(format!("{} AS {}", column, meta.field));
        }
    }
    Ok(columns.join(", "))
}

/// Bind `#{field}` parameters of declared join clauses from top-level filters.
///
/// The filter named exactly `field` wins; otherwise a suffixed filter on the same
/// field (`roleNameLike` for `#{roleName}`) supplies its operand, as a LIKE pattern
/// for the text-match operators. Returns the rendered joins and the raw names of
/// the filters consumed by them.
fn bind_join_clauses(
    schema: &EntitySchema,
    query: &QueryNode,
    args: &mut Vec<Scalar>,
) -> Result<(String, HashSet<String>), SqlGeneratorError> {
    let mut consumed = HashSet::new();
    let mut rendered = String::new();

    for clause in &schema.join_clauses {
        let mut missing = None;
        let sql = JOIN_PARAMETER.replace_all(clause, |caps: &Captures| {
            let name = &caps[1];
            let filter = query
                .find_filter(name)
                .or_else(|| query.filters().find(|f| f.column_name == name));
            match filter.and_then(|f| join_operand(f).map(|value| (f, value))) {
                Some((field, value)) => {
                    args.push(value);
                    consumed.insert(field.raw_name.clone());
                }
                None => {
                    missing.get_or_insert_with(|| name.to_string());
                }
            }
            PLACEHOLDER
        });
        if let Some(name) = missing {
            return Err(SqlGeneratorError::MissingJoinParameter { name });
        }
        rendered.push(' ');
        rendered.push_str(&sql);
    }
    Ok((rendered, consumed))
}

fn join_operand(field: &FilterField) -> Option<Scalar> {
    match &field.value {
        FilterValue::Scalar(_) if field.operator.is_unary() => None,
        FilterValue::Scalar(value) if field.operator.is_text_match() => {
            let text = value.as_text()?;
            Some(Scalar::Text(like_pattern(field.operator, &text).unwrap_or(text)))
        }
        FilterValue::Scalar(value) => Some(value.clone()),
        _ => None,
    }
}

/// Ordering of a counted sub-select is irrelevant.
fn strip_order_by(sql: &str) -> &str {
    match sql.rfind(" ORDER BY ") {
        Some(pos) => &sql[..pos],
        None => sql,
    }
}
