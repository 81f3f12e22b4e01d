use super::errors::SchemaError;
use super::relationship::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Entity schemas are declared in YAML with the following structure:
///
/// ```yaml
/// entities:
///   - name: user                 # domain name, also the registry key
///     table: t_user              # optional, defaults to table_format % name
///     id: id                     # primary key field, defaults to `id`
///     fields: [id, username, email, createUserId]
///     relations:
///       - name: roles            # consuming field
///         path: [user, role]     # declared domain chain
///         target: role           # entity describing the related rows
///       - name: createUser
///         path: [user]
///         local_field: createUserId
///         many: false
///   - name: role_count
///     table: t_role r
///     joins:
///       - "inner join j_user_and_role ur on ur.role_id = r.id"
///     fields:
///       - name: roleName
///         column: r.role_name
///         group_by: true
///       - count
/// ```
///
/// # Usage
///
/// ```ignore
/// let config = SchemaConfig::from_yaml_file("schema.yaml")?;
/// let registry = SchemaRegistry::new(config, &CompilerConfig::default())?;
/// let user = registry.get("user")?;
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub entities: Vec<EntityDefinition>,
}

/// Entity (or view) definition in schema config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    /// Domain name
    pub name: String,
    /// Physical table or collection, optionally followed by an alias (`t_user u`)
    #[serde(default)]
    pub table: Option<String>,
    /// Primary key field
    #[serde(default = "default_id")]
    pub id: String,
    /// Selected / projected fields in declaration order
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    /// Verbatim SQL join clauses for multi-table views
    #[serde(default)]
    pub joins: Vec<String>,
    /// Extra accumulator fields computed by `$group` but not projected
    #[serde(default)]
    pub aggregate_fields: Vec<String>,
    /// Treat prefixed fields (`sumQty`, `maxId`) as aggregates even without group keys
    #[serde(default)]
    pub aggregate: bool,
    /// Declared relationships
    #[serde(default)]
    pub relations: Vec<RelationDefinition>,
}

fn default_id() -> String {
    "id".to_string()
}

/// Field definition, either a bare name or a full mapping
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(from = "FieldEntry")]
pub struct FieldDefinition {
    pub name: String,
    /// Column expression, defaults to the (optionally snake_cased) field name
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub group_by: bool,
    /// Value produced by the store (excluded from document projections)
    #[serde(default)]
    pub generated: bool,
    #[serde(default)]
    pub expression: Option<ExpressionDefinition>,
    /// Sub-document shape of a `push` accumulator
    #[serde(default)]
    pub push_fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FieldEntry {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        column: Option<String>,
        #[serde(default)]
        group_by: bool,
        #[serde(default)]
        generated: bool,
        #[serde(default)]
        expression: Option<ExpressionDefinition>,
        #[serde(default)]
        push_fields: Option<Vec<String>>,
    },
}

impl From<FieldEntry> for FieldDefinition {
    fn from(entry: FieldEntry) -> Self {
        match entry {
            FieldEntry::Name(name) => FieldDefinition {
                name,
                ..Default::default()
            },
            FieldEntry::Full {
                name,
                column,
                group_by,
                generated,
                expression,
                push_fields,
            } => FieldDefinition {
                name,
                column,
                group_by,
                generated,
                expression,
                push_fields,
            },
        }
    }
}

impl FieldDefinition {
    pub fn named(name: impl Into<String>) -> Self {
        FieldDefinition {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Computed projection, e.g. `{operator: "$subtract", args: ["$maxQty", "$minQty"]}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpressionDefinition {
    pub operator: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
}

/// Relationship definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationDefinition {
    /// Consuming field name
    pub name: String,
    /// Declared domain chain; `~` after the first domain marks a reverse path
    pub path: Vec<String>,
    /// Entity describing related rows, defaults to the far end of the chain
    #[serde(default)]
    pub target: Option<String>,
    /// Collection (one/many-to-many) or single value (many-to-one)
    #[serde(default = "default_many")]
    pub many: bool,
    /// Key on the declaring side, defaults to its primary key
    #[serde(default)]
    pub local_field: Option<String>,
    /// Key on the related side, defaults to the target's primary key
    #[serde(default)]
    pub foreign_field: Option<String>,
    /// Explicit traversal direction; inferred from the field name when absent
    #[serde(default)]
    pub direction: Option<Direction>,
}

fn default_many() -> bool {
    true
}

pub const REVERSE_MARKER: &str = "~";

impl SchemaConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SchemaError> {
        let config: SchemaConfig =
            serde_yaml::from_str(yaml).map_err(|e| SchemaError::ConfigParseError {
                error: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let content = fs::read_to_string(path).map_err(|e| SchemaError::ConfigReadError {
            error: e.to_string(),
        })?;
        Self::from_yaml_str(&content)
    }

    /// Structural validation. Relationship chains are checked here so that a
    /// broken chain fails at load time instead of during query compilation.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut names = HashSet::new();
        for entity in &self.entities {
            if !names.insert(entity.name.as_str()) {
                return Err(SchemaError::DuplicateEntity {
                    name: entity.name.clone(),
                });
            }
        }

        for entity in &self.entities {
            let mut members = HashSet::new();
            let member_names = entity
                .fields
                .iter()
                .map(|f| f.name.as_str())
                .chain(entity.relations.iter().map(|r| r.name.as_str()));
            for member in member_names {
                if !members.insert(member) {
                    return Err(SchemaError::DuplicateField {
                        entity: entity.name.clone(),
                        name: member.to_string(),
                    });
                }
            }

            for relation in &entity.relations {
                let (domains, marked) = relation.declared_domains(&entity.name)?;
                let target = relation.target_name(&domains, marked, &entity.name)?;
                if !names.contains(target.as_str()) {
                    return Err(SchemaError::UnknownRelationTarget {
                        entity: entity.name.clone(),
                        relation: relation.name.clone(),
                        target,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDefinition> {
        self.entities.iter().find(|e| e.name == name)
    }
}

impl RelationDefinition {
    /// Declared (un-reversed) domain chain and whether the `~` marker was present.
    ///
    /// `[role, ~, user]` is the reverse reading of `[user, role]`.
    pub fn declared_domains(&self, entity: &str) -> Result<(Vec<String>, bool), SchemaError> {
        if self.path.is_empty() {
            return Err(SchemaError::EmptyRelationPath {
                entity: entity.to_string(),
                relation: self.name.clone(),
            });
        }

        let marker_positions: Vec<usize> = self
            .path
            .iter()
            .enumerate()
            .filter(|(_, d)| d.as_str() == REVERSE_MARKER)
            .map(|(i, _)| i)
            .collect();

        let (domains, marked) = match marker_positions.as_slice() {
            [] => (self.path.clone(), false),
            [1] if self.path.len() >= 3 => {
                let mut domains: Vec<String> = self
                    .path
                    .iter()
                    .filter(|d| d.as_str() != REVERSE_MARKER)
                    .cloned()
                    .collect();
                domains.reverse();
                (domains, true)
            }
            _ => {
                return Err(SchemaError::InvalidReverseMarker {
                    entity: entity.to_string(),
                    relation: self.name.clone(),
                })
            }
        };

        let mut seen = HashSet::new();
        for domain in &domains {
            if !seen.insert(domain.as_str()) {
                return Err(SchemaError::CyclicRelationPath {
                    entity: entity.to_string(),
                    relation: self.name.clone(),
                    domain: domain.clone(),
                });
            }
        }
        Ok((domains, marked))
    }

    /// Target entity name: explicit `target`, otherwise the far end of the chain.
    pub fn target_name(
        &self,
        domains: &[String],
        marked: bool,
        entity: &str,
    ) -> Result<String, SchemaError> {
        if let Some(target) = &self.target {
            return Ok(target.clone());
        }
        let reverse = self.resolve_direction(domains, marked) == Direction::Reverse;
        let far_end = if reverse { domains.first() } else { domains.last() };
        far_end.cloned().ok_or_else(|| SchemaError::EmptyRelationPath {
            entity: entity.to_string(),
            relation: self.name.clone(),
        })
    }

    /// Explicit direction wins, then the `~` marker, then the naming heuristic:
    /// a multi-domain chain whose first domain appears in the field name is
    /// traversed in reverse.
    pub fn resolve_direction(&self, domains: &[String], marked: bool) -> Direction {
        if let Some(direction) = self.direction {
            return direction;
        }
        if marked {
            return Direction::Reverse;
        }
        match domains.first() {
            Some(first) if domains.len() > 1 && self.name.contains(first.as_str()) => {
                Direction::Reverse
            }
            _ => Direction::Forward,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relation(name: &str, path: &[&str]) -> RelationDefinition {
        RelationDefinition {
            name: name.to_string(),
            path: path.iter().map(|s| s.to_string()).collect(),
            many: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_yaml_with_shorthand_fields() {
        let yaml = r#"
entities:
  - name: user
    fields:
      - id
      - username
      - name: createUserId
        column: create_user_id
    relations:
      - name: roles
        path: [user, role]
  - name: role
    fields: [id, roleName]
"#;
        let config = SchemaConfig::from_yaml_str(yaml).unwrap();
        let user = config.entity("user").unwrap();
        assert_eq!(user.id, "id");
        assert_eq!(user.fields[0], FieldDefinition::named("id"));
        assert_eq!(user.fields[2].column.as_deref(), Some("create_user_id"));
        assert!(user.relations[0].many);
    }

    #[test]
    fn test_reverse_marker_unreverses_path() {
        let rel = relation("userViewQuery", &["role", "~", "user"]);
        let (domains, marked) = rel.declared_domains("role").unwrap();
        assert_eq!(domains, vec!["user", "role"]);
        assert!(marked);
        assert_eq!(rel.resolve_direction(&domains, marked), Direction::Reverse);
    }

    #[test]
    fn test_misplaced_reverse_marker() {
        let rel = relation("users", &["~", "user", "role"]);
        assert!(matches!(
            rel.declared_domains("role"),
            Err(SchemaError::InvalidReverseMarker { .. })
        ));
        let rel = relation("users", &["role", "~"]);
        assert!(rel.declared_domains("role").is_err());
    }

    #[test]
    fn test_cyclic_path_rejected() {
        let rel = relation("loop", &["user", "role", "user"]);
        assert_eq!(
            rel.declared_domains("user"),
            Err(SchemaError::CyclicRelationPath {
                entity: "user".to_string(),
                relation: "loop".to_string(),
                domain: "user".to_string(),
            })
        );
    }

    #[test]
    fn test_direction_heuristic() {
        let forward = relation("perms", &["user", "role", "perm"]);
        let domains = forward.declared_domains("user").unwrap().0;
        assert_eq!(forward.resolve_direction(&domains, false), Direction::Forward);
        assert_eq!(forward.target_name(&domains, false, "user").unwrap(), "perm");

        let reverse = relation("users", &["user", "role", "perm"]);
        let domains = reverse.declared_domains("perm").unwrap().0;
        assert_eq!(reverse.resolve_direction(&domains, false), Direction::Reverse);
        assert_eq!(reverse.target_name(&domains, false, "perm").unwrap(), "user");

        // single-domain paths are never reversed
        let direct = relation("user", &["user"]);
        let domains = direct.declared_domains("role").unwrap().0;
        assert_eq!(direct.resolve_direction(&domains, false), Direction::Forward);
    }

    #[test]
    fn test_explicit_direction_overrides_heuristic() {
        let mut rel = relation("users", &["user", "role"]);
        rel.direction = Some(Direction::Forward);
        let domains = rel.declared_domains("user").unwrap().0;
        assert_eq!(rel.resolve_direction(&domains, false), Direction::Forward);
    }

    #[test]
    fn test_validate_unknown_target() {
        let yaml = r#"
entities:
  - name: user
    relations:
      - name: roles
        path: [user, role]
"#;
        assert!(matches!(
            SchemaConfig::from_yaml_str(yaml),
            Err(SchemaError::UnknownRelationTarget { .. })
        ));
    }

    #[test]
    fn test_validate_duplicate_names() {
        let yaml = r#"
entities:
  - name: user
    fields: [id, roles]
    relations:
      - name: roles
        path: [user]
"#;
        assert!(matches!(
            SchemaConfig::from_yaml_str(yaml),
            Err(SchemaError::DuplicateField { .. })
        ));

        let yaml = "entities:\n  - name: user\n  - name: user\n";
        assert!(matches!(
            SchemaConfig::from_yaml_str(yaml),
            Err(SchemaError::DuplicateEntity { .. })
        ));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            SchemaConfig::from_yaml_str("entities: 12"),
            Err(SchemaError::ConfigParseError { .. })
        ));
    }
}
