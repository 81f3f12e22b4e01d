//! Relationship chain → ordered join steps.
//!
//! A chain `[d0, d1, .., dn]` has one associative table per hop
//! (`join_table(d_i, d_i+1)`, keys `join_id(d_i)` / `join_id(d_i+1)`) and the
//! target domain's own table at the far end. Every name is derived from the
//! declared (un-reversed) chain, so both directions agree on physical names.
//!
//! Two walks are produced:
//! - [`resolve`]: anchored at the declaring row, ending at the target table.
//!   Used for relation filters (SQL joins, pipeline lookup chains).
//! - [`resolve_batch`]: starting at the target table, walking back to the
//!   column holding the parent id. Used for sub-domain batch loading.

use super::naming::NamingTemplates;
use crate::schema_catalog::{Direction, RelationshipEdge};
use serde::Serialize;

/// Alias of the parent table joined by a many-to-one batch load
pub const SOURCE_ALIAS: &str = "src";

/// One joined table. Joined on `<alias>.<join_key> = <previous>.<link_key>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinStep {
    pub table: String,
    pub alias: String,
    /// Column matched against the previous step
    pub join_key: String,
    /// Column the next step is matched against
    pub link_key: String,
}

/// Join steps anchored at the declaring row; the last step is the target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinPath {
    /// Column of the declaring row the first step joins on
    pub anchor_key: String,
    pub steps: Vec<JoinStep>,
}

impl JoinPath {
    pub fn target(&self) -> Option<&JoinStep> {
        self.steps.last()
    }

    /// Associative tables only (everything before the target table)
    pub fn join_tables(&self) -> &[JoinStep] {
        match self.steps.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }
}

/// Join steps starting from the target table, ending at the parent-id column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchPath {
    pub target: JoinStep,
    pub steps: Vec<JoinStep>,
    /// `(alias, column)` compared with each parent id
    pub root_alias: String,
    pub root_key: String,
}

impl BatchPath {
    pub fn root_column(&self) -> String {
        format!("{}.{}", self.root_alias, self.root_key)
    }
}

fn target_step(naming: &NamingTemplates, edge: &RelationshipEdge) -> JoinStep {
    JoinStep {
        table: naming.table_name(&edge.target_domain),
        alias: naming.table_alias(&edge.target_domain),
        join_key: edge.foreign_key.clone(),
        link_key: edge.foreign_key.clone(),
    }
}

/// Associative tables of `domains`, walked toward the last domain or toward the first.
fn walk(naming: &NamingTemplates, domains: &[String], toward_first: bool) -> Vec<JoinStep> {
    let hops = domains.len().saturating_sub(1);
    let step = |i: usize| {
        let (left, right) = (&domains[i], &domains[i + 1]);
        let (join_key, link_key) = if toward_first {
            (naming.join_id(right), naming.join_id(left))
        } else {
            (naming.join_id(left), naming.join_id(right))
        };
        JoinStep {
            table: naming.join_table_name(left, right),
            alias: naming.join_alias(i, left, right),
            join_key,
            link_key,
        }
    };
    if toward_first {
        (0..hops).rev().map(step).collect()
    } else {
        (0..hops).map(step).collect()
    }
}

/// Resolve the join steps from the declaring row to the related rows.
pub fn resolve(edge: &RelationshipEdge, naming: &NamingTemplates) -> JoinPath {
    let mut steps = if edge.is_direct() {
        Vec::new()
    } else {
        walk(naming, &edge.domains, edge.direction == Direction::Reverse)
    };
    steps.push(target_step(naming, edge));

    log::debug!(
        "Resolved relation '{}' ({}) into {} join steps",
        edge.field,
        edge.direction,
        steps.len()
    );
    JoinPath {
        anchor_key: edge.local_key.clone(),
        steps,
    }
}

/// Resolve the steps loading related rows for a set of parent ids.
///
/// `source_key` is the parent's primary key column. A direct relation whose
/// local key is not the primary key (many-to-one) joins the parent table back
/// under [`SOURCE_ALIAS`].
pub fn resolve_batch(
    edge: &RelationshipEdge,
    naming: &NamingTemplates,
    source_key: &str,
) -> BatchPath {
    let target = target_step(naming, edge);

    if edge.is_direct() {
        if edge.local_key == source_key {
            return BatchPath {
                root_alias: target.alias.clone(),
                root_key: edge.foreign_key.clone(),
                target,
                steps: Vec::new(),
            };
        }
        let parent = JoinStep {
            table: naming.table_name(&edge.source_domain),
            alias: SOURCE_ALIAS.to_string(),
            join_key: edge.local_key.clone(),
            link_key: source_key.to_string(),
        };
        return BatchPath {
            root_alias: parent.alias.clone(),
            root_key: parent.link_key.clone(),
            target,
            steps: vec![parent],
        };
    }

    let steps = walk(naming, &edge.domains, edge.direction == Direction::Forward);
    let (root_alias, root_key) = match steps.last() {
        Some(last) => (last.alias.clone(), last.link_key.clone()),
        None => (target.alias.clone(), target.link_key.clone()),
    };
    BatchPath {
        target,
        steps,
        root_alias,
        root_key,
    }
}
