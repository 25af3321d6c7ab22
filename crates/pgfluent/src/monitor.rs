//! Statement observation hooks.
//!
//! A [`StatementMonitor`] is told about every executed statement: kind,
//! rendered SQL, parameter count, duration, and outcome. Monitors are purely
//! side-effecting and never influence control flow. Parameter values are not
//! exposed.

use std::fmt;
use std::time::Duration;

/// The kind of SQL statement being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// SELECT query
    Select,
    /// INSERT statement
    Insert,
    /// UPDATE statement
    Update,
    /// DELETE statement
    Delete,
    /// Anything else
    Other,
}

impl StatementKind {
    /// Detect the statement kind from SQL text.
    pub fn from_sql(sql: &str) -> Self {
        fn starts_with_keyword(s: &str, keyword: &str) -> bool {
            match s.get(0..keyword.len()) {
                Some(prefix) => prefix.eq_ignore_ascii_case(keyword),
                None => false,
            }
        }

        let trimmed = sql.trim_start();
        if starts_with_keyword(trimmed, "SELECT") || starts_with_keyword(trimmed, "WITH") {
            StatementKind::Select
        } else if starts_with_keyword(trimmed, "INSERT") {
            StatementKind::Insert
        } else if starts_with_keyword(trimmed, "UPDATE") {
            StatementKind::Update
        } else if starts_with_keyword(trimmed, "DELETE") {
            StatementKind::Delete
        } else {
            StatementKind::Other
        }
    }

    /// Uppercase keyword for log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
            StatementKind::Other => "OTHER",
        }
    }
}

/// Context describing the statement handed to a monitor.
#[derive(Debug, Clone)]
pub struct StatementContext {
    /// Detected statement kind.
    pub kind: StatementKind,
    /// The rendered SQL text (placeholders only, no values).
    pub sql: String,
    /// Number of bound parameters.
    pub param_count: usize,
}

impl StatementContext {
    /// Create a context for a statement about to run.
    pub fn new(sql: &str, param_count: usize) -> Self {
        Self {
            kind: StatementKind::from_sql(sql),
            sql: sql.to_string(),
            param_count,
        }
    }
}

/// Outcome of a statement execution, as reported to monitors.
#[derive(Debug, Clone)]
pub enum StatementOutcome {
    /// Query returned rows.
    Rows(usize),
    /// Statement affected rows.
    Affected(u64),
    /// Execution failed.
    Error(String),
}

impl fmt::Display for StatementOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementOutcome::Rows(n) => write!(f, "{n} rows"),
            StatementOutcome::Affected(n) => write!(f, "{n} affected"),
            StatementOutcome::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Observer invoked after every executed statement.
pub trait StatementMonitor: Send + Sync {
    /// Called once per statement, success or failure.
    fn on_complete(&self, ctx: &StatementContext, duration: Duration, outcome: &StatementOutcome);
}

/// A monitor that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl StatementMonitor for NoopMonitor {
    fn on_complete(&self, _ctx: &StatementContext, _duration: Duration, _outcome: &StatementOutcome) {}
}

/// The default monitor: one `tracing` event per statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMonitor;

impl StatementMonitor for LoggingMonitor {
    fn on_complete(&self, ctx: &StatementContext, duration: Duration, outcome: &StatementOutcome) {
        match outcome {
            StatementOutcome::Error(_) => tracing::warn!(
                operation = ctx.kind.as_str(),
                sql = %ctx.sql,
                params = ctx.param_count,
                elapsed_ms = duration.as_millis() as u64,
                outcome = %outcome,
                "statement failed"
            ),
            _ => tracing::debug!(
                operation = ctx.kind.as_str(),
                sql = %ctx.sql,
                params = ctx.param_count,
                elapsed_ms = duration.as_millis() as u64,
                outcome = %outcome,
                "statement executed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_detection() {
        assert_eq!(StatementKind::from_sql("SELECT 1"), StatementKind::Select);
        assert_eq!(StatementKind::from_sql("  with t as (select 1) select * from t"), StatementKind::Select);
        assert_eq!(StatementKind::from_sql("insert into t values ($1)"), StatementKind::Insert);
        assert_eq!(StatementKind::from_sql("UPDATE t SET a = $1"), StatementKind::Update);
        assert_eq!(StatementKind::from_sql("DELETE FROM t"), StatementKind::Delete);
        assert_eq!(StatementKind::from_sql("TRUNCATE t"), StatementKind::Other);
    }
}
