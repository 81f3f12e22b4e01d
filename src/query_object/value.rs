use serde::{Deserialize, Serialize};
use std::fmt;

/// Bound argument / scalar operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Convert a JSON scalar; arrays and objects yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Scalar> {
        match value {
            serde_json::Value::Null => Some(Scalar::Null),
            serde_json::Value::Bool(b) => Some(Scalar::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Scalar::Int(i)),
                None => n.as_f64().map(Scalar::Float),
            },
            serde_json::Value::String(s) => Some(Scalar::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Null => serde_json::Value::Null,
            Scalar::Bool(b) => serde_json::Value::Bool(*b),
            Scalar::Int(i) => serde_json::Value::from(*i),
            Scalar::Float(f) => serde_json::Value::from(*f),
            Scalar::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Text operand of a text-match filter; numbers are matched by their decimal form.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Scalar::Text(s) => Some(s.clone()),
            Scalar::Int(i) => Some(i.to_string()),
            Scalar::Float(f) => Some(f.to_string()),
            Scalar::Bool(_) | Scalar::Null => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<i32> for Scalar {
    fn from(i: i32) -> Self {
        Scalar::Int(i64::from(i))
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Scalar::Float(f)
    }
}

/// Operand of a filter field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FilterValue {
    Scalar(Scalar),
    Collection(Vec<Scalar>),
    /// Structured operand: geo shapes, raw store operators
    Document(serde_json::Value),
}

impl FilterValue {
    pub fn from_json(value: &serde_json::Value) -> FilterValue {
        if let Some(scalar) = Scalar::from_json(value) {
            return FilterValue::Scalar(scalar);
        }
        if let serde_json::Value::Array(items) = value {
            let scalars: Option<Vec<Scalar>> = items.iter().map(Scalar::from_json).collect();
            if let Some(scalars) = scalars {
                return FilterValue::Collection(scalars);
            }
        }
        FilterValue::Document(value.clone())
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FilterValue::Scalar(s) => s.to_json(),
            FilterValue::Collection(items) => {
                serde_json::Value::Array(items.iter().map(Scalar::to_json).collect())
            }
            FilterValue::Document(doc) => doc.clone(),
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            FilterValue::Scalar(s) => Some(s),
            _ => None,
        }
    }
}

macro_rules! filter_value_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FilterValue {
                fn from(value: $ty) -> Self {
                    FilterValue::Scalar(value.into())
                }
            }

            impl From<Vec<$ty>> for FilterValue {
                fn from(values: Vec<$ty>) -> Self {
                    FilterValue::Collection(values.into_iter().map(Into::into).collect())
                }
            }
        )*
    };
}

filter_value_from!(&str, String, i64, i32, bool, f64);

impl From<Scalar> for FilterValue {
    fn from(value: Scalar) -> Self {
        FilterValue::Scalar(value)
    }
}

impl From<Vec<Scalar>> for FilterValue {
    fn from(values: Vec<Scalar>) -> Self {
        FilterValue::Collection(values)
    }
}
