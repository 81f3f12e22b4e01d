//! Suffix-based operator resolution.
//!
//! A filter field name encodes its comparison in a trailing suffix:
//! `usernameLike`, `idIn`, `ageGe`, `locNear`. [`resolve`] is total: a name
//! matching no suffix is an equality filter on the whole name.

pub mod escape;

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorKind {
    Equal,
    NotEqual,
    Contain,
    NotContain,
    Start,
    NotStart,
    End,
    NotEnd,
    RegexMatch,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Exists,
    Near,
    NearSphere,
    WithinCircle,
    WithinSphere,
    WithinBox,
    WithinPolygon,
    GeoWithin,
    Intersects,
}

/// Recognized suffixes. Matching picks the longest one, so `NotIn` beats `In`.
pub const SUFFIXES: &[(&str, OperatorKind)] = &[
    ("Not", OperatorKind::NotEqual),
    ("Eq", OperatorKind::Equal),
    ("Like", OperatorKind::Contain),
    ("Contain", OperatorKind::Contain),
    ("NotLike", OperatorKind::NotContain),
    ("NotContain", OperatorKind::NotContain),
    ("Start", OperatorKind::Start),
    ("NotStart", OperatorKind::NotStart),
    ("End", OperatorKind::End),
    ("NotEnd", OperatorKind::NotEnd),
    ("Rx", OperatorKind::RegexMatch),
    ("Lt", OperatorKind::LessThan),
    ("Le", OperatorKind::LessOrEqual),
    ("Gt", OperatorKind::GreaterThan),
    ("Ge", OperatorKind::GreaterOrEqual),
    ("In", OperatorKind::In),
    ("NotIn", OperatorKind::NotIn),
    ("Null", OperatorKind::IsNull),
    ("NotNull", OperatorKind::IsNotNull),
    ("Exists", OperatorKind::Exists),
    ("Near", OperatorKind::Near),
    ("NearSphere", OperatorKind::NearSphere),
    ("Center", OperatorKind::WithinCircle),
    ("CenterSphere", OperatorKind::WithinSphere),
    ("Box", OperatorKind::WithinBox),
    ("Py", OperatorKind::WithinPolygon),
    ("Within", OperatorKind::GeoWithin),
    ("IntX", OperatorKind::Intersects),
];

/// Suffix marking an OR-group key; handled by the query object builder.
pub const OR_SUFFIX: &str = "Or";

/// Resolve a raw filter name into its operator and column name.
///
/// # Examples
/// ```
/// use domainql::operator::{resolve, OperatorKind};
/// assert_eq!(resolve("idNotIn"), (OperatorKind::NotIn, "id"));
/// assert_eq!(resolve("username"), (OperatorKind::Equal, "username"));
/// ```
pub fn resolve(raw_name: &str) -> (OperatorKind, &str) {
    SUFFIXES
        .iter()
        .filter(|(suffix, _)| raw_name.len() > suffix.len() && raw_name.ends_with(suffix))
        .max_by_key(|(suffix, _)| suffix.len())
        .map(|(suffix, kind)| (*kind, &raw_name[..raw_name.len() - suffix.len()]))
        .unwrap_or((OperatorKind::Equal, raw_name))
}

/// Key names like `usernameOr` / `idOr` denote OR-groups.
pub fn is_or_group(raw_name: &str) -> bool {
    raw_name.len() > OR_SUFFIX.len() && raw_name.ends_with(OR_SUFFIX)
}

impl OperatorKind {
    /// Operand must be a collection (`In`, `NotIn`)
    pub fn requires_collection(&self) -> bool {
        matches!(self, OperatorKind::In | OperatorKind::NotIn)
    }

    pub fn is_geo(&self) -> bool {
        matches!(
            self,
            OperatorKind::Near
                | OperatorKind::NearSphere
                | OperatorKind::WithinCircle
                | OperatorKind::WithinSphere
                | OperatorKind::WithinBox
                | OperatorKind::WithinPolygon
                | OperatorKind::GeoWithin
                | OperatorKind::Intersects
        )
    }

    /// Like-family operators whose operand is escaped and wrapped
    pub fn is_text_match(&self) -> bool {
        matches!(
            self,
            OperatorKind::Contain
                | OperatorKind::NotContain
                | OperatorKind::Start
                | OperatorKind::NotStart
                | OperatorKind::End
                | OperatorKind::NotEnd
        )
    }

    pub fn is_negated(&self) -> bool {
        matches!(
            self,
            OperatorKind::NotEqual
                | OperatorKind::NotContain
                | OperatorKind::NotStart
                | OperatorKind::NotEnd
                | OperatorKind::NotIn
                | OperatorKind::IsNotNull
        )
    }

    /// Operators taking a boolean switch instead of a compared value
    pub fn is_unary(&self) -> bool {
        matches!(
            self,
            OperatorKind::IsNull | OperatorKind::IsNotNull | OperatorKind::Exists
        )
    }

    /// Plain binary SQL comparison operator, if this is one
    pub fn sql_comparison(&self) -> Option<&'static str> {
        match self {
            OperatorKind::Equal => Some("="),
            OperatorKind::NotEqual => Some("!="),
            OperatorKind::LessThan => Some("<"),
            OperatorKind::LessOrEqual => Some("<="),
            OperatorKind::GreaterThan => Some(">"),
            OperatorKind::GreaterOrEqual => Some(">="),
            OperatorKind::RegexMatch => Some("REGEXP"),
            OperatorKind::Contain | OperatorKind::Start | OperatorKind::End => Some("LIKE"),
            OperatorKind::NotContain | OperatorKind::NotStart | OperatorKind::NotEnd => {
                Some("NOT LIKE")
            }
            _ => None,
        }
    }

    /// Document-store comparison operator for scalar operands
    pub fn mongo_comparison(&self) -> Option<&'static str> {
        match self {
            OperatorKind::Equal => Some("$eq"),
            OperatorKind::NotEqual => Some("$ne"),
            OperatorKind::LessThan => Some("$lt"),
            OperatorKind::LessOrEqual => Some("$lte"),
            OperatorKind::GreaterThan => Some("$gt"),
            OperatorKind::GreaterOrEqual => Some("$gte"),
            OperatorKind::In => Some("$in"),
            OperatorKind::NotIn => Some("$nin"),
            _ => None,
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
