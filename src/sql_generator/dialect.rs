use crate::config::DialectKind;
use std::fmt::Debug;

/// Paging syntax of a relational backend.
pub trait Dialect: Debug + Send + Sync {
    fn build_page_sql(&self, sql: &str, limit: u64, offset: u64) -> String;
}

/// `LIMIT n OFFSET m`. The offset is only appended to `SELECT` statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct LimitOffsetDialect;

impl Dialect for LimitOffsetDialect {
    fn build_page_sql(&self, sql: &str, limit: u64, offset: u64) -> String {
        let is_select = sql
            .trim_start()
            .get(..6)
            .is_some_and(|head| head.eq_ignore_ascii_case("SELECT"));
        if is_select {
            format!("{} LIMIT {} OFFSET {}", sql, limit, offset)
        } else {
            format!("{} LIMIT {}", sql, limit)
        }
    }
}

/// `OFFSET m ROWS FETCH NEXT n ROWS ONLY`
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchFirstDialect;

impl Dialect for FetchFirstDialect {
    fn build_page_sql(&self, sql: &str, limit: u64, offset: u64) -> String {
        format!(
            "{} OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
            sql, offset, limit
        )
    }
}

pub fn dialect_for(kind: DialectKind) -> Box<dyn Dialect> {
    match kind {
        DialectKind::LimitOffset => Box::new(LimitOffsetDialect),
        DialectKind::FetchFirst => Box::new(FetchFirstDialect),
    }
}
