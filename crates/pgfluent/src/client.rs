//! Connection boundary: a trait unifying clients and transactions.
//!
//! The crate never opens or closes connections; every terminal builder method
//! takes a [`GenericClient`] and awaits the driver round trip directly.

use crate::error::{SqlError, SqlResult};
use crate::monitor::{StatementContext, StatementMonitor, StatementOutcome};
use crate::value::Value;
use std::time::Instant;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Row, Statement};

/// A trait that unifies database clients and transactions.
///
/// Builder methods accept either a direct connection or a transaction, so
/// operations compose inside transactions without any extra plumbing.
pub trait GenericClient: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = SqlResult<Vec<Row>>> + Send;

    /// Execute a query and return the first row, if any.
    fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = SqlResult<Option<Row>>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = SqlResult<u64>> + Send;

    /// Prepare a statement on this connection.
    ///
    /// Prepared statements are per-connection and must not be used across
    /// connections.
    fn prepare_statement(
        &self,
        sql: &str,
    ) -> impl std::future::Future<Output = SqlResult<Statement>> + Send;

    /// Execute a prepared statement and return the number of affected rows.
    fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = SqlResult<u64>> + Send;

    /// Execute a query and require that it returns exactly one row.
    ///
    /// Semantics:
    /// - 0 rows: [`SqlError::NotFound`]
    /// - 1 row: that row
    /// - more: [`SqlError::TooManyRows`]
    fn query_one_strict(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = SqlResult<Row>> + Send {
        async move {
            let mut rows = self.query(sql, params).await?;
            match rows.len() {
                0 => Err(SqlError::not_found("expected 1 row, got 0")),
                1 => Ok(rows.remove(0)),
                got => Err(SqlError::too_many_rows(got, "expected 1 row")),
            }
        }
    }
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SqlResult<Vec<Row>> {
        tokio_postgres::Client::query(self, sql, params)
            .await
            .map_err(SqlError::from)
    }

    async fn query_opt(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SqlResult<Option<Row>> {
        tokio_postgres::Client::query_opt(self, sql, params)
            .await
            .map_err(SqlError::from)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SqlResult<u64> {
        tokio_postgres::Client::execute(self, sql, params)
            .await
            .map_err(SqlError::from)
    }

    async fn prepare_statement(&self, sql: &str) -> SqlResult<Statement> {
        tokio_postgres::Client::prepare(self, sql)
            .await
            .map_err(SqlError::from)
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> SqlResult<u64> {
        tokio_postgres::Client::execute(self, stmt, params)
            .await
            .map_err(SqlError::from)
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SqlResult<Vec<Row>> {
        tokio_postgres::Transaction::query(self, sql, params)
            .await
            .map_err(SqlError::from)
    }

    async fn query_opt(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SqlResult<Option<Row>> {
        tokio_postgres::Transaction::query_opt(self, sql, params)
            .await
            .map_err(SqlError::from)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SqlResult<u64> {
        tokio_postgres::Transaction::execute(self, sql, params)
            .await
            .map_err(SqlError::from)
    }

    async fn prepare_statement(&self, sql: &str) -> SqlResult<Statement> {
        tokio_postgres::Transaction::prepare(self, sql)
            .await
            .map_err(SqlError::from)
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> SqlResult<u64> {
        tokio_postgres::Transaction::execute(self, stmt, params)
            .await
            .map_err(SqlError::from)
    }
}

/// Verify that the rendered text and the bound parameters agree.
///
/// Counts `$n` placeholders and checks both the count and the highest index
/// against the parameter list. A divergence is a composer bug and always
/// fatal.
pub(crate) fn check_placeholders(sql: &str, parameters: usize) -> SqlResult<()> {
    let mut count = 0usize;
    let mut max_index = 0usize;
    let mut chars = sql.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '$' {
            continue;
        }
        let mut digits = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_digit() {
                digits.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if let Ok(idx) = digits.parse::<usize>() {
            count += 1;
            max_index = max_index.max(idx);
        }
    }
    if count != parameters || max_index != parameters {
        return Err(SqlError::ParameterMismatch {
            placeholders: count,
            parameters,
            statement: sql.to_string(),
        });
    }
    Ok(())
}

/// Borrow bound values in the form the driver expects.
pub(crate) fn as_sql_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

/// Run a query through the monitor, enforcing the placeholder invariant.
pub(crate) async fn run_query(
    conn: &impl GenericClient,
    monitor: &dyn StatementMonitor,
    sql: &str,
    params: &[Value],
) -> SqlResult<Vec<Row>> {
    check_placeholders(sql, params.len())?;
    let ctx = StatementContext::new(sql, params.len());
    let start = Instant::now();
    let result = conn.query(sql, &as_sql_refs(params)).await;
    let outcome = match &result {
        Ok(rows) => StatementOutcome::Rows(rows.len()),
        Err(e) => StatementOutcome::Error(e.to_string()),
    };
    monitor.on_complete(&ctx, start.elapsed(), &outcome);
    result
}

/// Run a mutation through the monitor, enforcing the placeholder invariant.
pub(crate) async fn run_execute(
    conn: &impl GenericClient,
    monitor: &dyn StatementMonitor,
    sql: &str,
    params: &[Value],
) -> SqlResult<u64> {
    check_placeholders(sql, params.len())?;
    let ctx = StatementContext::new(sql, params.len());
    let start = Instant::now();
    let result = conn.execute(sql, &as_sql_refs(params)).await;
    let outcome = match &result {
        Ok(n) => StatementOutcome::Affected(*n),
        Err(e) => StatementOutcome::Error(e.to_string()),
    };
    monitor.on_complete(&ctx, start.elapsed(), &outcome);
    result
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Records every SQL text it is handed; queries return no rows and
    /// mutations report one affected row.
    pub(crate) struct RecordingClient {
        statements: Mutex<Vec<String>>,
    }

    impl RecordingClient {
        pub(crate) fn new() -> Self {
            Self {
                statements: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn executed(&self) -> Vec<String> {
            self.statements.lock().unwrap().clone()
        }

        fn record(&self, sql: &str) {
            self.statements.lock().unwrap().push(sql.to_string());
        }
    }

    impl GenericClient for RecordingClient {
        async fn query(&self, sql: &str, _params: &[&(dyn ToSql + Sync)]) -> SqlResult<Vec<Row>> {
            self.record(sql);
            Ok(Vec::new())
        }

        async fn query_opt(
            &self,
            sql: &str,
            _params: &[&(dyn ToSql + Sync)],
        ) -> SqlResult<Option<Row>> {
            self.record(sql);
            Ok(None)
        }

        async fn execute(&self, sql: &str, _params: &[&(dyn ToSql + Sync)]) -> SqlResult<u64> {
            self.record(sql);
            Ok(1)
        }

        async fn prepare_statement(&self, _sql: &str) -> SqlResult<Statement> {
            Err(SqlError::validation(
                "prepared statements are not available here",
            ))
        }

        async fn execute_prepared(
            &self,
            _stmt: &Statement,
            _params: &[&(dyn ToSql + Sync)],
        ) -> SqlResult<u64> {
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_counts_match() {
        assert!(check_placeholders("SELECT * FROM t WHERE a = $1 AND b = $2", 2).is_ok());
        assert!(check_placeholders("SELECT * FROM t", 0).is_ok());
    }

    #[test]
    fn placeholder_count_too_low() {
        let err = check_placeholders("SELECT * FROM t WHERE a = $1", 2).unwrap_err();
        assert!(matches!(err, SqlError::ParameterMismatch { placeholders: 1, parameters: 2, .. }));
    }

    #[test]
    fn placeholder_index_gap_detected() {
        // $3 referenced with only 2 bound parameters
        let err = check_placeholders("SELECT * FROM t WHERE a = $1 AND b = $3", 2).unwrap_err();
        assert!(matches!(err, SqlError::ParameterMismatch { .. }));
    }

    #[test]
    fn in_list_placeholders_count() {
        assert!(check_placeholders("SELECT * FROM t WHERE id IN ($1, $2, $3)", 3).is_ok());
    }
}
