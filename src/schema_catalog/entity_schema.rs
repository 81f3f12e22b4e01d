use super::config::ExpressionDefinition;
use super::relationship::RelationshipEdge;
use crate::relation_path::naming::{camel_to_underscore, uncapitalize};
use serde::{Deserialize, Serialize};

/// Group accumulator selected by a field-name prefix (`sumQty`, `maxId`) or the literal `count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregatePrefix {
    Sum,
    Max,
    Min,
    Avg,
    First,
    Last,
    StdDevPop,
    StdDevSamp,
    AddToSet,
    Push,
    Count,
}

/// Longer prefixes first so that `stdDevPop` is never read as a shorter one.
const PREFIXES: &[(&str, AggregatePrefix)] = &[
    ("stdDevSamp", AggregatePrefix::StdDevSamp),
    ("stdDevPop", AggregatePrefix::StdDevPop),
    ("addToSet", AggregatePrefix::AddToSet),
    ("first", AggregatePrefix::First),
    ("last", AggregatePrefix::Last),
    ("push", AggregatePrefix::Push),
    ("sum", AggregatePrefix::Sum),
    ("max", AggregatePrefix::Max),
    ("min", AggregatePrefix::Min),
    ("avg", AggregatePrefix::Avg),
];

impl AggregatePrefix {
    /// Split a field name into its accumulator and the accumulated field.
    ///
    /// `sumQty` → `(Sum, "qty")`, `count` → `(Count, "")`. The prefix must be
    /// followed by an upper-case letter, so `summary` is not an accumulator.
    pub fn resolve(field: &str) -> Option<(AggregatePrefix, String)> {
        if field == "count" {
            return Some((AggregatePrefix::Count, String::new()));
        }
        PREFIXES.iter().find_map(|(prefix, kind)| {
            let rest = field.strip_prefix(prefix)?;
            match rest.chars().next() {
                Some(c) if c.is_ascii_uppercase() => Some((*kind, uncapitalize(rest))),
                _ => None,
            }
        })
    }

    /// Document-store accumulator operator
    pub fn mongo_operator(&self) -> &'static str {
        match self {
            AggregatePrefix::Sum | AggregatePrefix::Count => "$sum",
            AggregatePrefix::Max => "$max",
            AggregatePrefix::Min => "$min",
            AggregatePrefix::Avg => "$avg",
            AggregatePrefix::First => "$first",
            AggregatePrefix::Last => "$last",
            AggregatePrefix::StdDevPop => "$stdDevPop",
            AggregatePrefix::StdDevSamp => "$stdDevSamp",
            AggregatePrefix::AddToSet => "$addToSet",
            AggregatePrefix::Push => "$push",
        }
    }

    /// SQL aggregate function, `None` for accumulators without a portable SQL form
    pub fn sql_function(&self) -> Option<&'static str> {
        match self {
            AggregatePrefix::Sum => Some("sum"),
            AggregatePrefix::Max => Some("max"),
            AggregatePrefix::Min => Some("min"),
            AggregatePrefix::Avg => Some("avg"),
            AggregatePrefix::Count => Some("count"),
            AggregatePrefix::StdDevPop => Some("stddev_pop"),
            AggregatePrefix::StdDevSamp => Some("stddev_samp"),
            AggregatePrefix::First
            | AggregatePrefix::Last
            | AggregatePrefix::AddToSet
            | AggregatePrefix::Push => None,
        }
    }
}

/// Accumulator bound to a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accumulator {
    pub prefix: AggregatePrefix,
    /// Accumulated field name (`qty` for `sumQty`), empty for `count`
    pub source_field: String,
    /// Physical column of the accumulated field
    pub source_column: String,
}

/// Per-field metadata of an entity or view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub field: String,
    /// Column name or SQL expression (`r.role_name`)
    pub column: String,
    pub group_by: bool,
    pub generated: bool,
    pub expression: Option<ExpressionDefinition>,
    pub push_fields: Option<Vec<String>>,
    pub accumulator: Option<Accumulator>,
}

impl ColumnMeta {
    /// Plain column whose name equals its field name
    pub fn simple(field: impl Into<String>) -> Self {
        let field = field.into();
        ColumnMeta {
            column: field.clone(),
            field,
            group_by: false,
            generated: false,
            expression: None,
            push_fields: None,
            accumulator: None,
        }
    }

    /// Column is a bare identifier (not an expression or qualified name)
    pub fn is_bare(&self) -> bool {
        is_bare_identifier(&self.column)
    }
}

pub fn is_bare_identifier(column: &str) -> bool {
    !column.is_empty() && column.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Immutable metadata of one entity or view, built once and shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub name: String,
    /// Table or collection
    pub physical_name: String,
    /// SQL alias declared with the table (`t_user u`)
    pub alias: Option<String>,
    pub primary_key_field: String,
    pub primary_key_column: String,
    pub columns: Vec<ColumnMeta>,
    pub generated_columns: Vec<String>,
    pub join_clauses: Vec<String>,
    pub group_by_columns: Vec<String>,
    /// Accumulators computed by grouping but not projected
    pub aggregate_expressions: Vec<ColumnMeta>,
    pub aggregated: bool,
    pub relations: Vec<RelationshipEdge>,
    /// Undeclared fields map to snake_case columns
    pub map_camel_case_to_underscore: bool,
}

impl EntitySchema {
    /// Name used to qualify columns: the declared alias, else the table itself
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.physical_name)
    }

    /// Qualifier of the base table followed by the aliases introduced by the
    /// declared join clauses.
    pub fn table_aliases(&self) -> Vec<&str> {
        let mut aliases = vec![self.qualifier()];
        for clause in &self.join_clauses {
            aliases.extend(join_clause_aliases(clause));
        }
        aliases
    }

    /// `FROM` target, `t_user u` or `t_user`
    pub fn from_clause(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} {}", self.physical_name, alias),
            None => self.physical_name.clone(),
        }
    }

    pub fn column(&self, field: &str) -> Option<&ColumnMeta> {
        self.columns
            .iter()
            .chain(self.aggregate_expressions.iter())
            .find(|c| c.field == field)
    }

    pub fn relation(&self, field: &str) -> Option<&RelationshipEdge> {
        self.relations.iter().find(|r| r.field == field)
    }

    pub fn is_grouped(&self) -> bool {
        !self.group_by_columns.is_empty()
    }

    pub fn group_by_metas(&self) -> impl Iterator<Item = &ColumnMeta> {
        self.columns.iter().filter(|c| c.group_by)
    }

    pub fn is_group_field(&self, field: &str) -> bool {
        self.group_by_columns.iter().any(|f| f == field)
    }

    /// Physical column for a field; undeclared fields follow the case mapping
    pub fn column_name_of(&self, field: &str) -> String {
        match self.column(field) {
            Some(meta) => meta.column.clone(),
            None if self.map_camel_case_to_underscore => camel_to_underscore(field),
            None => field.to_string(),
        }
    }
}

/// Alias of every table joined by `clause`; an unaliased table is referred to by its name.
pub fn join_clause_aliases(clause: &str) -> Vec<&str> {
    let mut aliases = Vec::new();
    let mut tokens = clause.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        if !token.eq_ignore_ascii_case("join") {
            continue;
        }
        let Some(table) = tokens.next() else { break };
        let alias = match tokens.peek().copied() {
            Some(next) if next.eq_ignore_ascii_case("as") => {
                tokens.next();
                tokens.next().unwrap_or(table)
            }
            Some(next) if !next.eq_ignore_ascii_case("on") && !next.eq_ignore_ascii_case("using") => {
                next
            }
            _ => table,
        };
        aliases.push(alias);
    }
    aliases
}
