//! Memoized entity schema registry.
//!
//! Definitions are validated once at construction. `EntitySchema` values are
//! built lazily on first access and published as `Arc`s; a racing first access
//! may build twice but only the first inserted value is ever handed out.

use super::config::{EntityDefinition, FieldDefinition, RelationDefinition, SchemaConfig};
use super::entity_schema::{Accumulator, AggregatePrefix, ColumnMeta, EntitySchema};
use super::errors::SchemaError;
use super::relationship::{Direction, RelationshipEdge};
use crate::config::CompilerConfig;
use crate::relation_path::naming::{camel_to_underscore, NamingTemplates};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug)]
pub struct SchemaRegistry {
    definitions: HashMap<String, EntityDefinition>,
    naming: NamingTemplates,
    map_camel_case_to_underscore: bool,
    cache: RwLock<HashMap<String, Arc<EntitySchema>>>,
}

impl SchemaRegistry {
    pub fn new(config: SchemaConfig, compiler: &CompilerConfig) -> Result<Self, SchemaError> {
        config.validate()?;
        let definitions = config
            .entities
            .into_iter()
            .map(|def| (def.name.clone(), def))
            .collect::<HashMap<_, _>>();
        log::debug!(
            "Schema registry created with {} entity definitions",
            definitions.len()
        );
        Ok(SchemaRegistry {
            definitions,
            naming: compiler.naming(),
            map_camel_case_to_underscore: compiler.map_camel_case_to_underscore,
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn naming(&self) -> &NamingTemplates {
        &self.naming
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of schemas built so far
    pub fn cached_len(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Get the schema of `name`, building and caching it on first access.
    pub fn get(&self, name: &str) -> Result<Arc<EntitySchema>, SchemaError> {
        if let Some(schema) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Arc::clone(schema));
        }

        let definition = self
            .definitions
            .get(name)
            .ok_or_else(|| SchemaError::UnknownEntity {
                name: name.to_string(),
            })?;
        log::debug!("Building entity schema for '{}'", name);
        let built = Arc::new(self.build(definition)?);

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let published = cache.entry(name.to_string()).or_insert(built);
        Ok(Arc::clone(published))
    }

    fn column_for(&self, field: &str) -> String {
        if self.map_camel_case_to_underscore {
            camel_to_underscore(field)
        } else {
            field.to_string()
        }
    }

    fn field_column(&self, definition: &EntityDefinition, field: &str) -> String {
        definition
            .fields
            .iter()
            .find(|f| f.name == field)
            .and_then(|f| f.column.clone())
            .unwrap_or_else(|| self.column_for(field))
    }

    fn build(&self, definition: &EntityDefinition) -> Result<EntitySchema, SchemaError> {
        let table = definition
            .table
            .clone()
            .unwrap_or_else(|| self.naming.table_name(&definition.name));
        let (physical_name, alias) = split_table_alias(&table);

        let aggregated = definition.aggregate
            || !definition.aggregate_fields.is_empty()
            || definition.fields.iter().any(|f| f.group_by);

        let columns: Vec<ColumnMeta> = definition
            .fields
            .iter()
            .map(|f| self.column_meta(definition, f, aggregated))
            .collect();

        let aggregate_expressions = definition
            .aggregate_fields
            .iter()
            .map(|name| self.column_meta(definition, &FieldDefinition::named(name), true))
            .collect();

        let relations = definition
            .relations
            .iter()
            .map(|r| self.relationship_edge(definition, r))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(EntitySchema {
            name: definition.name.clone(),
            physical_name,
            alias,
            primary_key_field: definition.id.clone(),
            primary_key_column: self.field_column(definition, &definition.id),
            generated_columns: definition
                .fields
                .iter()
                .filter(|f| f.generated)
                .map(|f| f.name.clone())
                .collect(),
            join_clauses: definition.joins.clone(),
            group_by_columns: definition
                .fields
                .iter()
                .filter(|f| f.group_by)
                .map(|f| f.name.clone())
                .collect(),
            columns,
            aggregate_expressions,
            aggregated,
            relations,
            map_camel_case_to_underscore: self.map_camel_case_to_underscore,
        })
    }

    fn column_meta(
        &self,
        definition: &EntityDefinition,
        field: &FieldDefinition,
        aggregated: bool,
    ) -> ColumnMeta {
        let accumulator = if aggregated && !field.group_by && field.expression.is_none() {
            AggregatePrefix::resolve(&field.name).map(|(prefix, source_field)| {
                let source_column = field
                    .column
                    .clone()
                    .unwrap_or_else(|| self.field_column(definition, &source_field));
                Accumulator {
                    prefix,
                    source_field,
                    source_column,
                }
            })
        } else {
            None
        };

        let column = match &accumulator {
            Some(acc) => match (acc.prefix, acc.prefix.sql_function()) {
                (AggregatePrefix::Count, _) => "count(*)".to_string(),
                (_, Some(function)) => format!("{}({})", function, acc.source_column),
                (_, None) => field.name.clone(),
            },
            None => field
                .column
                .clone()
                .unwrap_or_else(|| self.column_for(&field.name)),
        };

        ColumnMeta {
            field: field.name.clone(),
            column,
            group_by: field.group_by,
            generated: field.generated,
            expression: field.expression.clone(),
            push_fields: field.push_fields.clone(),
            accumulator,
        }
    }

    fn relationship_edge(
        &self,
        definition: &EntityDefinition,
        relation: &RelationDefinition,
    ) -> Result<RelationshipEdge, SchemaError> {
        let (domains, marked) = relation.declared_domains(&definition.name)?;
        let direction = relation.resolve_direction(&domains, marked);
        let target_entity = relation.target_name(&domains, marked, &definition.name)?;
        let target = self.definitions.get(&target_entity).ok_or_else(|| {
            SchemaError::UnknownRelationTarget {
                entity: definition.name.clone(),
                relation: relation.name.clone(),
                target: target_entity.clone(),
            }
        })?;

        let (source_domain, target_domain) = match (domains.len(), direction) {
            (1, _) => (definition.name.clone(), domains[0].clone()),
            (_, Direction::Forward) => (domains[0].clone(), domains[domains.len() - 1].clone()),
            (_, Direction::Reverse) => (domains[domains.len() - 1].clone(), domains[0].clone()),
        };

        let local_key = match &relation.local_field {
            Some(field) => self.field_column(definition, field),
            None => self.field_column(definition, &definition.id),
        };
        let foreign_key = match &relation.foreign_field {
            Some(field) => self.field_column(target, field),
            None => self.field_column(target, &target.id),
        };

        log::debug!(
            "Relation {}.{}: {:?} {} ({} hops)",
            definition.name,
            relation.name,
            domains,
            direction,
            domains.len().saturating_sub(1)
        );

        Ok(RelationshipEdge {
            field: relation.name.clone(),
            source_domain,
            target_domain,
            domains,
            target_entity,
            local_key,
            foreign_key,
            direction,
            many: relation.many,
        })
    }
}

/// `t_user u` → (`t_user`, `u`); `t_user AS u` is accepted too.
fn split_table_alias(table: &str) -> (String, Option<String>) {
    let tokens: Vec<&str> = table.split_whitespace().collect();
    match tokens.as_slice() {
        [name, as_kw, alias] if as_kw.eq_ignore_ascii_case("as") => {
            (name.to_string(), Some(alias.to_string()))
        }
        [name, alias] => (name.to_string(), Some(alias.to_string())),
        [name, ..] => (name.to_string(), None),
        [] => (table.to_string(), None),
    }
}
