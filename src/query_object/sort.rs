//! ORDER BY grammar.
//!
//! `sort` is a `;`-separated list of items, each either
//! `field[,asc|desc]` or a function expression over a column and literal
//! values (`field(status,'A','C')`, optionally followed by `,desc`).
//! Anything else is rejected, which keeps sort text out of injection reach.

use super::errors::QueryObjectError;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref FIELD_ITEM: Regex = Regex::new(
        r"(?i)^\s*([a-z_][a-z0-9_]*(?:\.[a-z_][a-z0-9_]*)*)\s*(?:,\s*(asc|desc))?\s*$"
    )
    .expect("valid sort field pattern");
    static ref RAW_ITEM: Regex = Regex::new(
        r"(?i)^\s*([a-z_][a-z0-9_]*\(\s*[a-z0-9_.]+(?:\s*,\s*(?:'[^']*'|[a-z0-9_.]+))*\s*\))\s*(?:,\s*(asc|desc))?\s*$"
    )
    .expect("valid sort expression pattern");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn parse(text: &str) -> SortDirection {
        if text.eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// `1` / `-1` in a document-store sort
    pub fn as_mongo(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SortItem {
    Field {
        field: String,
        direction: Option<SortDirection>,
    },
    /// Function expression, passed through verbatim
    Raw {
        expression: String,
        direction: Option<SortDirection>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SortSpec {
    pub items: Vec<SortItem>,
}

impl SortSpec {
    pub fn parse(text: &str) -> Result<SortSpec, QueryObjectError> {
        let items = text
            .split(';')
            .filter(|part| !part.trim().is_empty())
            .map(parse_item)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SortSpec { items })
    }

    pub fn by(field: impl Into<String>, direction: SortDirection) -> SortSpec {
        SortSpec {
            items: vec![SortItem::Field {
                field: field.into(),
                direction: Some(direction),
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn parse_item(part: &str) -> Result<SortItem, QueryObjectError> {
    if let Some(caps) = FIELD_ITEM.captures(part) {
        return Ok(SortItem::Field {
            field: caps[1].to_string(),
            direction: caps.get(2).map(|m| SortDirection::parse(m.as_str())),
        });
    }
    if let Some(caps) = RAW_ITEM.captures(part) {
        return Ok(SortItem::Raw {
            expression: caps[1].to_string(),
            direction: caps.get(2).map(|m| SortDirection::parse(m.as_str())),
        });
    }
    Err(QueryObjectError::InvalidSort(part.to_string()))
}
