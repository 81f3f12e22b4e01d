//! Batched loading of related rows for many parent ids in one statement.
//!
//! Each parent id gets its own `SELECT ? AS PK_FOR_JOIN, ...` branch and the
//! branches are chained with `UNION ALL` in the order the ids were given.

use super::common::{RelationJoins, SqlPlan, AND, FROM, INNER_JOIN, KEY_COLUMN, PLACEHOLDER, SELECT, UNION_ALL, WHERE};
use super::errors::SqlGeneratorError;
use super::order_by::build_order_by;
use super::select_builder::{select_columns, SqlPlanBuilder};
use super::filter_builder::SqlFilterBuilder;
use crate::query_object::{QueryNode, Scalar};
use crate::relation_path::resolve_batch;
use std::collections::HashSet;

impl<'a> SqlPlanBuilder<'a> {
    /// Load the `relation` rows of every id in `parent_ids` of `entity`.
    ///
    /// Returns `None` when there are no parent ids.
    pub fn build_sub_domain_batch(
        &self,
        entity: &str,
        relation: &str,
        parent_ids: &[Scalar],
        child_query: Option<&QueryNode>,
    ) -> Result<Option<SqlPlan>, SqlGeneratorError> {
        if parent_ids.is_empty() {
            return Ok(None);
        }

        let schema = self.registry.get(entity)?;
        let edge = schema
            .relation(relation)
            .ok_or_else(|| SqlGeneratorError::UnknownRelation {
                entity: entity.to_string(),
                field: relation.to_string(),
            })?;
        let target = self.registry.get(&edge.target_entity)?;
        if !target.join_clauses.is_empty() {
            return Err(SqlGeneratorError::JoinViewBatchTarget {
                entity: target.name.clone(),
            });
        }
        let batch = resolve_batch(edge, self.registry.naming(), &schema.primary_key_column);

        let alias = target.alias.clone().unwrap_or_else(|| batch.target.alias.clone());
        let root_alias = if batch.root_alias == batch.target.alias {
            alias.clone()
        } else {
            batch.root_alias.clone()
        };

        let mut from = format!("{}{} {}", FROM, target.physical_name, alias);
        let mut prev_alias = alias.clone();
        let mut prev_key = batch.target.link_key.clone();
        let mut reserved = vec![alias.as_str()];
        for step in &batch.steps {
            from.push_str(&format!(
                "{}{} {} ON {}.{} = {}.{}",
                INNER_JOIN, step.table, step.alias, step.alias, step.join_key, prev_alias, prev_key
            ));
            prev_alias = step.alias.clone();
            prev_key = step.link_key.clone();
            reserved.push(step.alias.as_str());
        }

        // Child filters are compiled once; every branch binds the same arguments.
        let child = child_query.cloned().unwrap_or_default();
        let mut filters = SqlFilterBuilder::new(self.registry, RelationJoins::new(&reserved));
        let child_where = filters.build_predicate(&child, &target, Some(&alias), &HashSet::new())?;
        from.push_str(&filters.joins.to_sql());

        let columns = select_columns(&target, Some(&alias))?;
        let mut where_sql = format!("{}{}.{} = {}", WHERE, root_alias, batch.root_key, PLACEHOLDER);
        if !child_where.is_empty() {
            where_sql.push_str(AND);
            where_sql.push_str(&child_where);
        }
        let order_by = build_order_by(child.sort.as_ref(), &target, Some(&alias));
        let wrap = !order_by.is_empty() || child.page.is_some();

        let mut branches = Vec::with_capacity(parent_ids.len());
        let mut args = Vec::with_capacity(parent_ids.len() * (2 + filters.args.len()));
        for id in parent_ids {
            let branch = format!(
                "{}{} AS {}, {}{}{}{}",
                SELECT, PLACEHOLDER, KEY_COLUMN, columns, from, where_sql, order_by
            );
            let branch = self.build_paging(branch, child.page);
            branches.push(if wrap { format!("({})", branch) } else { branch });

            args.push(id.clone());
            args.push(id.clone());
            args.extend(filters.args.iter().cloned());
        }

        let sql = branches.join(UNION_ALL);
        log::debug!(
            "Sub-domain batch {}.{} for {} parent ids: {}",
            entity,
            relation,
            parent_ids.len(),
            sql
        );
        Ok(Some(SqlPlan::new(sql, args)))
    }
}
