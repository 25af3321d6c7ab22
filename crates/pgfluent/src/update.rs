//! UPDATE statement builder.

use crate::client::{GenericClient, run_execute};
use crate::error::{SqlError, SqlResult};
use crate::predicate::WhereClause;
use crate::table::Table;
use crate::value::Value;

/// Collects SET fields and WHERE conditions for one `UPDATE` statement.
///
/// SET parameters are bound first, WHERE parameters after, in call order
/// within each group.
#[derive(Clone)]
pub struct UpdateBuilder {
    table: Table,
    sets: Vec<(String, Value)>,
    where_clause: WhereClause,
}

impl UpdateBuilder {
    pub(crate) fn new(table: &Table) -> Self {
        Self {
            table: table.clone(),
            sets: Vec::new(),
            where_clause: WhereClause::new(),
        }
    }

    /// Add `column = value` to the SET clause.
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.sets.push((column.to_string(), value.into()));
        self
    }

    /// Add to the SET clause only if the value is present.
    pub fn set_opt<T: Into<Value>>(self, column: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Add a serializable value as a JSON column.
    pub fn set_json<T: serde::Serialize>(self, column: &str, value: &T) -> SqlResult<Self> {
        let json = serde_json::to_value(value)
            .map_err(|e| SqlError::validation(format!("cannot serialize column '{column}': {e}")))?;
        Ok(self.set(column, json))
    }

    /// Add each `(name, value)` pair from two parallel collections.
    pub fn set_fields<I, V>(mut self, columns: I, values: V) -> Self
    where
        I: IntoIterator<Item = String>,
        V: IntoIterator<Item = Value>,
    {
        for (column, value) in columns.into_iter().zip(values) {
            self.sets.push((column, value));
        }
        self
    }

    /// Add a NULL-safe WHERE condition (`Value::Null` renders `IS NULL`).
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

    fn build(&self) -> SqlResult<(String, Vec<Value>)> {
        if self.sets.is_empty() {
            return Err(SqlError::validation(format!(
                "UPDATE {}: SET clause cannot be empty",
                self.table.name()
            )));
        }

        let mut params = Vec::with_capacity(self.sets.len());
        let mut sql = format!("UPDATE {} SET ", self.table.name());
        for (i, (column, value)) in self.sets.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            params.push(value.clone());
            sql.push_str(column);
            sql.push_str(" = $");
            sql.push_str(&params.len().to_string());
        }

        if !self.where_clause.is_empty() {
            sql.push_str(" WHERE ");
            self.where_clause.render(&mut sql, &mut params);
        }

        Ok((sql, params))
    }

    /// The rendered SQL (for inspection).
    pub fn to_sql(&self) -> SqlResult<String> {
        Ok(self.build()?.0)
    }

    /// Execute the update and return the number of rows updated.
    pub async fn execute(self, conn: &impl GenericClient) -> SqlResult<u64> {
        let (sql, params) = self.build()?;
        run_execute(conn, self.table.monitor_ref().as_ref(), &sql, &params).await
    }
}
