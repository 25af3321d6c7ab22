//! Bulk insert, update, and delete over collections of domain objects.
//!
//! Each builder is given the objects up front plus one extractor function per
//! column, called once per object. Extractor invocation order is fixed
//! (fields in registration order, then keys in registration order), so the
//! positional parameter layout matches the statement template for every row.
//!
//! ```ignore
//! tag_types_table
//!     .bulk_update(tag_types)
//!     .field("name", |t: &TagType| t.name.clone())
//!     .key("id", |t: &TagType| t.id)
//!     .execute(&client)
//!     .await?;
//! ```

use crate::client::{GenericClient, as_sql_refs, check_placeholders, run_execute};
use crate::error::{SqlError, SqlResult};
use crate::monitor::{StatementContext, StatementMonitor, StatementOutcome};
use crate::table::Table;
use crate::value::Value;
use std::time::Instant;

type Extractor<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;

fn extractor<T, V, F>(extract: F) -> Extractor<T>
where
    V: Into<Value>,
    F: Fn(&T) -> V + Send + Sync + 'static,
{
    Box::new(move |obj| extract(obj).into())
}

/// Inserts a collection of objects with one multi-row statement.
pub struct BulkInsertBuilder<T> {
    table: Table,
    objects: Vec<T>,
    fields: Vec<(String, Extractor<T>)>,
}

impl<T> BulkInsertBuilder<T> {
    pub(crate) fn new(table: &Table, objects: Vec<T>) -> Self {
        Self {
            table: table.clone(),
            objects,
            fields: Vec::new(),
        }
    }

    /// Register a column and the function extracting its value per object.
    pub fn field<V, F>(mut self, name: &str, extract: F) -> Self
    where
        V: Into<Value>,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.fields.push((name.to_string(), extractor(extract)));
        self
    }

    fn build(&self) -> SqlResult<(String, Vec<Value>)> {
        if self.fields.is_empty() {
            return Err(SqlError::validation(format!(
                "bulk insert into {}: no fields registered",
                self.table.name()
            )));
        }

        let names: Vec<&str> = self.fields.iter().map(|(n, _)| n.as_str()).collect();
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ",
            self.table.name(),
            names.join(", ")
        );
        let mut params = Vec::with_capacity(self.objects.len() * self.fields.len());

        for (i, obj) in self.objects.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            for (j, (_, extract)) in self.fields.iter().enumerate() {
                if j > 0 {
                    sql.push_str(", ");
                }
                params.push(extract(obj));
                sql.push('$');
                sql.push_str(&params.len().to_string());
            }
            sql.push(')');
        }

        Ok((sql, params))
    }

    /// The rendered SQL (for inspection).
    pub fn to_sql(&self) -> SqlResult<String> {
        Ok(self.build()?.0)
    }

    /// Insert every object in one round trip; returns the row count.
    pub async fn execute(self, conn: &impl GenericClient) -> SqlResult<u64> {
        if self.objects.is_empty() {
            return Ok(0);
        }
        let (sql, params) = self.build()?;
        run_execute(conn, self.table.monitor_ref().as_ref(), &sql, &params).await
    }
}

/// Updates a collection of objects by re-executing one prepared statement.
pub struct BulkUpdateBuilder<T> {
    table: Table,
    objects: Vec<T>,
    fields: Vec<(String, Extractor<T>)>,
    keys: Vec<(String, Extractor<T>)>,
}

impl<T> BulkUpdateBuilder<T> {
    pub(crate) fn new(table: &Table, objects: Vec<T>) -> Self {
        Self {
            table: table.clone(),
            objects,
            fields: Vec::new(),
            keys: Vec::new(),
        }
    }

    /// Register a SET column and its per-object extractor.
    pub fn field<V, F>(mut self, name: &str, extract: F) -> Self
    where
        V: Into<Value>,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.fields.push((name.to_string(), extractor(extract)));
        self
    }

    /// Register a WHERE column and its per-object extractor.
    pub fn key<V, F>(mut self, name: &str, extract: F) -> Self
    where
        V: Into<Value>,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.keys.push((name.to_string(), extractor(extract)));
        self
    }

    fn template(&self) -> SqlResult<String> {
        if self.fields.is_empty() {
            return Err(SqlError::validation(format!(
                "bulk update of {}: no fields registered",
                self.table.name()
            )));
        }
        if self.keys.is_empty() {
            return Err(SqlError::validation(format!(
                "bulk update of {}: no keys registered",
                self.table.name()
            )));
        }

        let mut sql = format!("UPDATE {} SET ", self.table.name());
        let mut idx = 0usize;
        for (i, (name, _)) in self.fields.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            idx += 1;
            sql.push_str(name);
            sql.push_str(" = $");
            sql.push_str(&idx.to_string());
        }
        sql.push_str(" WHERE ");
        for (i, (name, _)) in self.keys.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            idx += 1;
            sql.push_str(name);
            sql.push_str(" = $");
            sql.push_str(&idx.to_string());
        }
        Ok(sql)
    }

    /// The rendered statement template (for inspection).
    pub fn to_sql(&self) -> SqlResult<String> {
        self.template()
    }

    fn row_params(&self, obj: &T) -> Vec<Value> {
        self.fields
            .iter()
            .chain(self.keys.iter())
            .map(|(_, extract)| extract(obj))
            .collect()
    }

    /// Update every object over one prepared statement; returns the sum of
    /// per-row affected counts. The first driver error aborts the batch.
    pub async fn execute(self, conn: &impl GenericClient) -> SqlResult<u64> {
        let sql = self.template()?;
        if self.objects.is_empty() {
            return Ok(0);
        }
        let per_row = self.fields.len() + self.keys.len();
        run_batch(
            conn,
            &self.table,
            &sql,
            per_row,
            self.objects.iter().map(|obj| self.row_params(obj)),
        )
        .await
    }
}

/// Deletes a collection of objects by re-executing one prepared statement.
pub struct BulkDeleteBuilder<T> {
    table: Table,
    objects: Vec<T>,
    keys: Vec<(String, Extractor<T>)>,
}

impl<T> BulkDeleteBuilder<T> {
    pub(crate) fn new(table: &Table, objects: Vec<T>) -> Self {
        Self {
            table: table.clone(),
            objects,
            keys: Vec::new(),
        }
    }

    /// Register a WHERE column and its per-object extractor.
    pub fn key<V, F>(mut self, name: &str, extract: F) -> Self
    where
        V: Into<Value>,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.keys.push((name.to_string(), extractor(extract)));
        self
    }

    fn template(&self) -> SqlResult<String> {
        if self.keys.is_empty() {
            return Err(SqlError::validation(format!(
                "bulk delete from {}: no keys registered",
                self.table.name()
            )));
        }

        let mut sql = format!("DELETE FROM {} WHERE ", self.table.name());
        for (i, (name, _)) in self.keys.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            sql.push_str(name);
            sql.push_str(" = $");
            sql.push_str(&(i + 1).to_string());
        }
        Ok(sql)
    }

    /// The rendered statement template (for inspection).
    pub fn to_sql(&self) -> SqlResult<String> {
        self.template()
    }

    /// Delete every object over one prepared statement; returns the sum of
    /// per-row affected counts. The first driver error aborts the batch.
    pub async fn execute(self, conn: &impl GenericClient) -> SqlResult<u64> {
        let sql = self.template()?;
        if self.objects.is_empty() {
            return Ok(0);
        }
        let per_row = self.keys.len();
        run_batch(
            conn,
            &self.table,
            &sql,
            per_row,
            self.objects.iter().map(|obj| {
                self.keys
                    .iter()
                    .map(|(_, extract)| extract(obj))
                    .collect::<Vec<Value>>()
            }),
        )
        .await
    }
}

/// Prepare `sql` once and execute it per parameter tuple, summing affected
/// counts. The whole batch is reported to the monitor as one statement.
async fn run_batch(
    conn: &impl GenericClient,
    table: &Table,
    sql: &str,
    per_row: usize,
    rows: impl Iterator<Item = Vec<Value>>,
) -> SqlResult<u64> {
    check_placeholders(sql, per_row)?;
    let ctx = StatementContext::new(sql, per_row);
    let start = Instant::now();
    let result: SqlResult<u64> = async {
        let stmt = conn.prepare_statement(sql).await?;
        let mut affected = 0u64;
        for values in rows {
            affected += conn.execute_prepared(&stmt, &as_sql_refs(&values)).await?;
        }
        Ok(affected)
    }
    .await;
    let outcome = match &result {
        Ok(n) => StatementOutcome::Affected(*n),
        Err(e) => StatementOutcome::Error(e.to_string()),
    };
    table.monitor_ref().on_complete(&ctx, start.elapsed(), &outcome);
    result
}
