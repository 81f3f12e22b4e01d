use crate::query_object::Scalar;
use crate::relation_path::{self, NamingTemplates};
use crate::schema_catalog::RelationshipEdge;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub const SELECT: &str = "SELECT ";
pub const FROM: &str = " FROM ";
pub const WHERE: &str = " WHERE ";
pub const AND: &str = " AND ";
pub const OR: &str = " OR ";
pub const INNER_JOIN: &str = " INNER JOIN ";
pub const UNION_ALL: &str = " UNION ALL ";
pub const PLACEHOLDER: &str = "?";

/// Key column of a sub-domain batch row, holding the parent id it belongs to.
pub const KEY_COLUMN: &str = "PK_FOR_JOIN";

/// Parameterized SQL; `args[i]` binds the i-th `?` of `sql`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlPlan {
    pub sql: String,
    pub args: Vec<Scalar>,
}

impl SqlPlan {
    pub fn new(sql: String, args: Vec<Scalar>) -> Self {
        SqlPlan { sql, args }
    }

    pub fn placeholder_count(&self) -> usize {
        self.sql.matches(PLACEHOLDER).count()
    }
}

/// `alias.column` for bare columns, expressions are left untouched.
pub fn qualify(qualifier: Option<&str>, column: &str) -> String {
    match qualifier {
        Some(q) if crate::schema_catalog::entity_schema::is_bare_identifier(column) => {
            format!("{}.{}", q, column)
        }
        _ => column.to_string(),
    }
}

/// `(?, ?, ?)`
pub fn placeholders(count: usize) -> String {
    let holders = vec![PLACEHOLDER; count];
    format!("({})", holders.join(", "))
}

/// Relation joins accumulated while compiling filters of one statement.
///
/// Aliases are claimed from one scope, so two relations reaching tables with
/// the same default alias get distinct ones (`r`, `r1`).
#[derive(Debug, Default)]
pub struct RelationJoins {
    used_aliases: HashSet<String>,
    resolved: HashMap<(String, String), String>,
    clauses: Vec<String>,
}

impl RelationJoins {
    pub fn new(reserved: &[&str]) -> Self {
        RelationJoins {
            used_aliases: reserved.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    fn claim(&mut self, alias: &str) -> String {
        let mut candidate = alias.to_string();
        let mut n = 1;
        while !self.used_aliases.insert(candidate.clone()) {
            candidate = format!("{}{}", alias, n);
            n += 1;
        }
        candidate
    }

    /// Join `edge` from `anchor` and return the alias of its target table.
    /// Joining the same relation from the same anchor twice reuses the first join.
    pub fn join(&mut self, anchor: &str, edge: &RelationshipEdge, naming: &NamingTemplates) -> String {
        let key = (anchor.to_string(), edge.field.clone());
        if let Some(alias) = self.resolved.get(&key) {
            return alias.clone();
        }

        let path = relation_path::resolve(edge, naming);
        let mut prev_alias = anchor.to_string();
        let mut prev_key = path.anchor_key.clone();
        for step in &path.steps {
            let alias = self.claim(&step.alias);
            self.clauses.push(format!(
                "{}{} {} ON {}.{} = {}.{}",
                INNER_JOIN, step.table, alias, alias, step.join_key, prev_alias, prev_key
            ));
            prev_alias = alias;
            prev_key = step.link_key.clone();
        }

        self.resolved.insert(key, prev_alias.clone());
        prev_alias
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn to_sql(&self) -> String {
        self.clauses.concat()
    }
}
