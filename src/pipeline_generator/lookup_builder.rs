//! Relationship chains → nested `$lookup` stages.
//!
//! The chain is built from the innermost (target) collection outward: every
//! hop's lookup carries the inner hops as its sub-pipeline, and the outermost
//! lookup is keyed on the declaring document's local field.

use super::errors::PipelineGeneratorError;
use super::filter_builder::build_filter;
use super::stage::{field_ref, Stage};
use crate::query_object::QueryNode;
use crate::relation_path::{self, JoinStep, NamingTemplates};
use crate::schema_catalog::{EntitySchema, RelationshipEdge};
use serde_json::{json, Map, Value};

/// Local field each step is looked up by: the anchor for the first, the previous link after.
fn local_fields<'p>(anchor_key: &'p str, steps: &'p [JoinStep]) -> Vec<&'p str> {
    std::iter::once(anchor_key)
        .chain(steps.iter().map(|s| s.link_key.as_str()))
        .take(steps.len())
        .collect()
}

/// Wrap `inner` in the lookups of `steps[..last]`, innermost first.
fn wrap_outward(
    steps: &[JoinStep],
    locals: &[&str],
    mut inner: Vec<Stage>,
    as_field: &str,
    flatten: impl Fn() -> Vec<Stage>,
) -> Stage {
    let last = steps.len() - 1;
    for i in (1..last).rev() {
        let mut wrapped = vec![Stage::lookup(
            steps[i].table.clone(),
            locals[i],
            &steps[i].join_key,
            inner,
            as_field,
        )];
        wrapped.extend(flatten());
        inner = wrapped;
    }
    Stage::lookup(steps[0].table.clone(), locals[0], &steps[0].join_key, inner, as_field)
}

/// Lookup correlating a relation filter; `as` is the relation field so that
/// `$match` can address `<field>.<column>`.
pub fn build_nested_lookup(edge: &RelationshipEdge, naming: &NamingTemplates) -> Stage {
    let path = relation_path::resolve(edge, naming);
    let steps = &path.steps;
    let locals = local_fields(&path.anchor_key, steps);
    let as_field = edge.field.as_str();

    if steps.len() == 1 {
        return Stage::lookup(steps[0].table.clone(), locals[0], &steps[0].join_key, vec![], as_field);
    }

    let first_element = || vec![Stage::ReplaceRoot(json!({ "$arrayElemAt": [field_ref(as_field), 0] }))];
    let last = steps.len() - 1;
    let mut inner = vec![Stage::lookup(
        steps[last].table.clone(),
        locals[last],
        &steps[last].join_key,
        vec![],
        as_field,
    )];
    inner.extend(first_element());
    wrap_outward(steps, &locals, inner, as_field, first_element)
}

/// Lookup loading the related documents of a `with<Relation>` request.
///
/// The child query filters and shapes the target documents at the innermost level.
pub fn build_sub_domain_lookup(
    edge: &RelationshipEdge,
    naming: &NamingTemplates,
    target: &EntitySchema,
    child_query: &QueryNode,
) -> Result<Stage, PipelineGeneratorError> {
    let path = relation_path::resolve(edge, naming);
    let steps = &path.steps;
    let locals = local_fields(&path.anchor_key, steps);
    let as_field = edge.field.as_str();

    let projection: Map<String, Value> = target
        .columns
        .iter()
        .map(|c| (c.field.clone(), json!(1)))
        .collect();
    let mut shaping = Vec::new();
    if let Some(filter) = build_filter(child_query, "")? {
        shaping.push(Stage::Match(filter));
    }
    shaping.push(Stage::Project(projection));

    if steps.len() == 1 {
        return Ok(Stage::lookup(
            steps[0].table.clone(),
            locals[0],
            &steps[0].join_key,
            shaping,
            as_field,
        ));
    }

    let unwind = || {
        vec![
            Stage::Unwind(as_field.to_string()),
            Stage::ReplaceRoot(json!(field_ref(as_field))),
        ]
    };
    let last = steps.len() - 1;
    let mut inner = vec![Stage::lookup(
        steps[last].table.clone(),
        locals[last],
        &steps[last].join_key,
        vec![],
        as_field,
    )];
    inner.extend(unwind());
    inner.extend(shaping);
    Ok(wrap_outward(steps, &locals, inner, as_field, unwind))
}
