//! SELECT builders and typed row extraction.
//!
//! [`SelectBuilder`] queries a single table; [`JoinedSelectBuilder`] composes
//! aliased tables with explicit join predicates. Both enforce the singleton
//! contract on `single_*` methods: zero rows is [`SqlError::NotFound`], more
//! than one is [`SqlError::TooManyRows`], never a silent first-row pick.

use crate::client::{GenericClient, run_query};
use crate::error::{SqlError, SqlResult};
use crate::predicate::WhereClause;
use crate::table::{ColumnRef, Table, TableAlias};
use crate::value::Value;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use uuid::Uuid;

/// Query builder for a single table.
///
/// Result order is unspecified unless [`SelectBuilder::order_by`] was called;
/// start from [`Table::unordered`] to make that explicit at the call site.
#[derive(Clone)]
pub struct SelectBuilder {
    table: Table,
    columns: Vec<String>,
    where_clause: WhereClause,
    order_clauses: Vec<String>,
}

impl SelectBuilder {
    pub(crate) fn new(table: &Table) -> Self {
        Self {
            table: table.clone(),
            columns: Vec::new(),
            where_clause: WhereClause::new(),
            order_clauses: Vec::new(),
        }
    }

    /// Restrict the selected columns.
    pub fn select_columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Add a NULL-safe WHERE condition.
    ///
    /// A non-null value renders `column = $n`; a NULL (including a `None`
    /// option) renders `column IS NULL`.
    pub fn where_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.where_clause.eq(column, value);
        self
    }

    /// Add a WHERE condition only if the value is present.
    pub fn where_eq_opt<T: Into<Value>>(mut self, column: &str, value: Option<T>) -> Self {
        self.where_clause.eq_opt(column, value);
        self
    }

    /// Add a WHERE fragment with `?` markers.
    pub fn where_expression<T: Into<Value>>(mut self, sql: &str, values: Vec<T>) -> Self {
        self.where_clause.expression(sql, values);
        self
    }

    /// Add a WHERE condition: `column IN (values...)`
    pub fn where_in<T: Into<Value>>(mut self, column: &str, values: Vec<T>) -> Self {
        self.where_clause.in_list(column, values);
        self
    }

    /// Add an ORDER BY clause; required for predictable list order.
    pub fn order_by(mut self, clause: &str) -> Self {
        self.order_clauses.push(clause.to_string());
        self
    }

    fn build(&self, columns: &[String]) -> (String, Vec<Value>) {
        let mut params = Vec::new();

        let select_part = if columns.is_empty() {
            "*".to_string()
        } else {
            columns.join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", select_part, self.table.name());

        if !self.where_clause.is_empty() {
            sql.push_str(" WHERE ");
            self.where_clause.render(&mut sql, &mut params);
        }

        if !self.order_clauses.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_clauses.join(", "));
        }

        (sql, params)
    }

    /// The rendered SQL (for inspection).
    pub fn to_sql(&self) -> String {
        self.build(&self.columns).0
    }

    async fn fetch(self, conn: &impl GenericClient, columns: &[String]) -> SqlResult<Vec<Row>> {
        let (sql, params) = self.build(columns);
        run_query(conn, self.table.monitor_ref().as_ref(), &sql, &params).await
    }

    /// Execute with the accumulated column list and return raw rows.
    pub(crate) async fn fetch_raw(self, conn: &impl GenericClient) -> SqlResult<Vec<Row>> {
        let columns = self.columns.clone();
        self.fetch(conn, &columns).await
    }

    // ==================== Singleton results ====================

    /// Execute and map the single matching row with `mapper`.
    pub async fn single<T>(
        self,
        conn: &impl GenericClient,
        mapper: impl Fn(&Row) -> SqlResult<T>,
    ) -> SqlResult<T> {
        let context = self.table.name().to_string();
        let columns = self.columns.clone();
        let rows = self.fetch(conn, &columns).await?;
        let row = expect_single(rows, &context)?;
        mapper(&row)
    }

    /// Execute and return the named text column of the single matching row.
    pub async fn single_string(self, conn: &impl GenericClient, column: &str) -> SqlResult<String> {
        let row = self.single_column_row(conn, column).await?;
        scalar_required(&row, column)
    }

    /// Execute and return the named BIGINT column of the single matching row.
    pub async fn single_i64(self, conn: &impl GenericClient, column: &str) -> SqlResult<i64> {
        let row = self.single_column_row(conn, column).await?;
        scalar_required(&row, column)
    }

    /// Execute and return the named timestamp column of the single matching row.
    pub async fn single_timestamp(
        self,
        conn: &impl GenericClient,
        column: &str,
    ) -> SqlResult<DateTime<Utc>> {
        let row = self.single_column_row(conn, column).await?;
        scalar_required(&row, column)
    }

    /// Execute and return the named UUID column of the single matching row.
    pub async fn single_uuid(self, conn: &impl GenericClient, column: &str) -> SqlResult<Uuid> {
        let row = self.single_column_row(conn, column).await?;
        scalar_required(&row, column)
    }

    /// Like [`SelectBuilder::single_string`] but a NULL column maps to `None`.
    pub async fn opt_string(self, conn: &impl GenericClient, column: &str) -> SqlResult<Option<String>> {
        let row = self.single_column_row(conn, column).await?;
        scalar_optional(&row, column)
    }

    /// Like [`SelectBuilder::single_i64`] but a NULL column maps to `None`.
    pub async fn opt_i64(self, conn: &impl GenericClient, column: &str) -> SqlResult<Option<i64>> {
        let row = self.single_column_row(conn, column).await?;
        scalar_optional(&row, column)
    }

    /// Like [`SelectBuilder::single_timestamp`] but a NULL column maps to `None`.
    pub async fn opt_timestamp(
        self,
        conn: &impl GenericClient,
        column: &str,
    ) -> SqlResult<Option<DateTime<Utc>>> {
        let row = self.single_column_row(conn, column).await?;
        scalar_optional(&row, column)
    }

    async fn single_column_row(self, conn: &impl GenericClient, column: &str) -> SqlResult<Row> {
        let context = format!("{}.{}", self.table.name(), column);
        let rows = self.fetch(conn, &[column.to_string()]).await?;
        expect_single(rows, &context)
    }

    // ==================== List results ====================

    /// Execute and map every row with `mapper`.
    ///
    /// The driver result is fully drained before mapping, so the cursor is
    /// released even when the mapper fails.
    pub async fn list<T>(
        self,
        conn: &impl GenericClient,
        mapper: impl Fn(&Row) -> SqlResult<T>,
    ) -> SqlResult<Vec<T>> {
        let columns = self.columns.clone();
        let rows = self.fetch(conn, &columns).await?;
        rows.iter().map(mapper).collect()
    }

    /// Execute and collect the named text column of every row.
    pub async fn list_strings(self, conn: &impl GenericClient, column: &str) -> SqlResult<Vec<String>> {
        let rows = self.fetch(conn, &[column.to_string()]).await?;
        rows.iter().map(|row| scalar_required(row, column)).collect()
    }

    /// Execute and collect the named BIGINT column of every row.
    pub async fn list_i64s(self, conn: &impl GenericClient, column: &str) -> SqlResult<Vec<i64>> {
        let rows = self.fetch(conn, &[column.to_string()]).await?;
        rows.iter().map(|row| scalar_required(row, column)).collect()
    }

    /// Execute and collect the named timestamp column of every row.
    pub async fn list_timestamps(
        self,
        conn: &impl GenericClient,
        column: &str,
    ) -> SqlResult<Vec<DateTime<Utc>>> {
        let rows = self.fetch(conn, &[column.to_string()]).await?;
        rows.iter().map(|row| scalar_required(row, column)).collect()
    }

    /// Execute `SELECT COUNT(*)` with the accumulated conditions.
    pub async fn count(self, conn: &impl GenericClient) -> SqlResult<i64> {
        let context = self.table.name().to_string();
        let rows = self.fetch(conn, &["COUNT(*)".to_string()]).await?;
        let row = expect_single(rows, &context)?;
        row.try_get(0)
            .map_err(|e| SqlError::decode("COUNT(*)", e.to_string()))
    }
}

/// Join flavor for [`JoinedSelectBuilder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum JoinKind {
    Inner,
    Left,
}

#[derive(Clone)]
struct Join {
    kind: JoinKind,
    table: String,
    alias: String,
    left: ColumnRef,
    right: ColumnRef,
}

/// Query builder over several aliased tables.
///
/// Join predicates are pairs of [`ColumnRef`]s, so identical column names on
/// different tables cannot collide. The joined table and alias are taken
/// from the right-hand reference of each pair.
#[derive(Clone)]
pub struct JoinedSelectBuilder {
    base: TableAlias,
    joins: Vec<Join>,
    columns: Vec<String>,
    where_clause: WhereClause,
    order_clauses: Vec<String>,
}

impl JoinedSelectBuilder {
    pub(crate) fn new(base: &TableAlias) -> Self {
        Self {
            base: base.clone(),
            joins: Vec::new(),
            columns: Vec::new(),
            where_clause: WhereClause::new(),
            order_clauses: Vec::new(),
        }
    }

    /// Inner-join the right reference's table on `left = right`.
    pub fn join(mut self, left: ColumnRef, right: ColumnRef) -> Self {
        self.joins.push(Join {
            kind: JoinKind::Inner,
            table: right.table().to_string(),
            alias: right.alias().to_string(),
            left,
            right,
        });
        self
    }

    /// Left-join the right reference's table on `left = right`.
    pub fn left_join(mut self, left: ColumnRef, right: ColumnRef) -> Self {
        self.joins.push(Join {
            kind: JoinKind::Left,
            table: right.table().to_string(),
            alias: right.alias().to_string(),
            left,
            right,
        });
        self
    }

    /// Select an alias-qualified column.
    pub fn select_column(mut self, column: ColumnRef) -> Self {
        self.columns.push(column.qualified());
        self
    }

    /// Select several alias-qualified columns.
    pub fn select_columns(mut self, columns: &[ColumnRef]) -> Self {
        for column in columns {
            self.columns.push(column.qualified());
        }
        self
    }

    /// Add an alias-qualified WHERE equality.
    pub fn where_column_eq(mut self, column: ColumnRef, value: impl Into<Value>) -> Self {
        self.where_clause
            .expression(&format!("{} = ?", column.qualified()), vec![value.into()]);
        self
    }

    /// Add a WHERE fragment with `?` markers.
    pub fn where_expression<T: Into<Value>>(mut self, sql: &str, values: Vec<T>) -> Self {
        self.where_clause.expression(sql, values);
        self
    }

    /// Add an ORDER BY clause on an alias-qualified column.
    pub fn order_by(mut self, column: ColumnRef) -> Self {
        self.order_clauses.push(column.qualified());
        self
    }

    fn build(&self) -> (String, Vec<Value>) {
        let mut params = Vec::new();

        let select_part = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };

        let mut sql = format!(
            "SELECT {} FROM {} {}",
            select_part,
            self.base.table().name(),
            self.base.alias()
        );

        for join in &self.joins {
            let keyword = match join.kind {
                JoinKind::Inner => "INNER JOIN",
                JoinKind::Left => "LEFT JOIN",
            };
            sql.push_str(&format!(
                " {} {} {} ON {} = {}",
                keyword,
                join.table,
                join.alias,
                join.left.qualified(),
                join.right.qualified()
            ));
        }

        if !self.where_clause.is_empty() {
            sql.push_str(" WHERE ");
            self.where_clause.render(&mut sql, &mut params);
        }

        if !self.order_clauses.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_clauses.join(", "));
        }

        (sql, params)
    }

    /// The rendered SQL (for inspection).
    pub fn to_sql(&self) -> String {
        self.build().0
    }

    async fn fetch(self, conn: &impl GenericClient) -> SqlResult<Vec<Row>> {
        let monitor = self.base.table().monitor_ref().clone();
        let (sql, params) = self.build();
        run_query(conn, monitor.as_ref(), &sql, &params).await
    }

    /// Execute and map the single matching row with `mapper`.
    pub async fn single<T>(
        self,
        conn: &impl GenericClient,
        mapper: impl Fn(&Row) -> SqlResult<T>,
    ) -> SqlResult<T> {
        let context = self.base.table().name().to_string();
        let rows = self.fetch(conn).await?;
        let row = expect_single(rows, &context)?;
        mapper(&row)
    }

    /// Execute and map every row with `mapper`.
    pub async fn list<T>(
        self,
        conn: &impl GenericClient,
        mapper: impl Fn(&Row) -> SqlResult<T>,
    ) -> SqlResult<Vec<T>> {
        let rows = self.fetch(conn).await?;
        rows.iter().map(mapper).collect()
    }
}

/// Enforce the singleton result contract.
fn expect_single(mut rows: Vec<Row>, context: &str) -> SqlResult<Row> {
    match rows.len() {
        0 => Err(SqlError::not_found(format!("{context}: expected 1 row, got 0"))),
        1 => Ok(rows.remove(0)),
        got => Err(SqlError::too_many_rows(got, format!("{context}: expected 1 row"))),
    }
}

fn scalar_required<'a, T>(row: &'a Row, column: &str) -> SqlResult<T>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    let value: Option<T> = row
        .try_get(0)
        .map_err(|e| SqlError::decode(column, e.to_string()))?;
    value.ok_or_else(|| SqlError::decode(column, "unexpected NULL"))
}

fn scalar_optional<'a, T>(row: &'a Row, column: &str) -> SqlResult<Option<T>>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get(0)
        .map_err(|e| SqlError::decode(column, e.to_string()))
}
