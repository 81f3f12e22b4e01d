use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::fmt;

/// Document-store primary key field
pub const MONGO_ID: &str = "_id";
/// Output key of the `$count` stage
pub const COUNT_KEY: &str = "count";

/// `id` is stored as `_id`
pub fn map_id_field(field: &str) -> String {
    if field == "id" {
        MONGO_ID.to_string()
    } else {
        field.to_string()
    }
}

/// `"$field"`
pub fn field_ref(field: &str) -> String {
    format!("${}", field)
}

#[derive(Debug, PartialEq, Clone)]
pub struct Lookup {
    pub from: String,
    pub local_field: String,
    pub foreign_field: String,
    pub pipeline: Vec<Stage>,
    pub as_field: String,
}

#[derive(Debug, PartialEq, Clone)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Stage {
    Lookup(Lookup),
    Unwind(String),
    ReplaceRoot(Value),
    Match(Value),
    Unset(Vec<String>),
    Group { id: Value, accumulators: Map<String, Value> },
    Sort(Vec<(String, SortOrder)>),
    Skip(u64),
    Limit(u64),
    Project(Map<String, Value>),
    Count(String),
}

impl Stage {
    pub fn lookup(
        from: impl Into<String>,
        local_field: &str,
        foreign_field: &str,
        pipeline: Vec<Stage>,
        as_field: impl Into<String>,
    ) -> Stage {
        Stage::Lookup(Lookup {
            from: from.into(),
            local_field: map_id_field(local_field),
            foreign_field: map_id_field(foreign_field),
            pipeline,
            as_field: as_field.into(),
        })
    }

    /// Native stage document
    pub fn to_document(&self) -> Value {
        match self {
            Stage::Lookup(lookup) => {
                let mut doc = Map::new();
                doc.insert("from".into(), json!(lookup.from));
                doc.insert("localField".into(), json!(lookup.local_field));
                doc.insert("foreignField".into(), json!(lookup.foreign_field));
                if !lookup.pipeline.is_empty() {
                    doc.insert("pipeline".into(), stages_to_json(&lookup.pipeline));
                }
                doc.insert("as".into(), json!(lookup.as_field));
                json!({ "$lookup": doc })
            }
            Stage::Unwind(path) => json!({ "$unwind": field_ref(path) }),
            Stage::ReplaceRoot(new_root) => json!({ "$replaceRoot": { "newRoot": new_root } }),
            Stage::Match(filter) => json!({ "$match": filter }),
            Stage::Unset(fields) => json!({ "$unset": fields }),
            Stage::Group { id, accumulators } => {
                let mut doc = Map::new();
                doc.insert(MONGO_ID.into(), id.clone());
                doc.extend(accumulators.clone());
                json!({ "$group": doc })
            }
            Stage::Sort(keys) => {
                let doc: Map<String, Value> = keys
                    .iter()
                    .map(|(field, order)| {
                        let direction = match order {
                            SortOrder::Asc => 1,
                            SortOrder::Desc => -1,
                        };
                        (field.clone(), json!(direction))
                    })
                    .collect();
                json!({ "$sort": doc })
            }
            Stage::Skip(n) => json!({ "$skip": n }),
            Stage::Limit(n) => json!({ "$limit": n }),
            Stage::Project(fields) => json!({ "$project": fields }),
            Stage::Count(key) => json!({ "$count": key }),
        }
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

fn stages_to_json(stages: &[Stage]) -> Value {
    Value::Array(stages.iter().map(Stage::to_document).collect())
}

/// Ordered stages handed to a driver's `aggregate` call.
#[derive(Debug, PartialEq, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Pipeline(pub Vec<Stage>);

impl Pipeline {
    pub fn push(&mut self, stage: Stage) {
        self.0.push(stage);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Value {
        stages_to_json(&self.0)
    }

    /// Position of the first stage whose document has the given operator key
    pub fn position(&self, operator: &str) -> Option<usize> {
        self.0
            .iter()
            .position(|stage| stage.to_document().get(operator).is_some())
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(&self.to_json()) {
            Ok(text) => write!(f, "{}", text),
            Err(_) => Err(fmt::Error),
        }
    }
}
