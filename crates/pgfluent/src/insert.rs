//! INSERT statement builder.

use crate::client::{GenericClient, run_execute, run_query};
use crate::error::{SqlError, SqlResult};
use crate::row::value_at;
use crate::table::Table;
use crate::value::Value;

/// Collects field names and parameters for one `INSERT` statement.
///
/// ```ignore
/// table("person")
///     .insert()
///     .set("name", "somebody")
///     .set("code", 102i64)
///     .execute(&client)
///     .await?;
/// ```
#[derive(Clone)]
pub struct InsertBuilder {
    table: Table,
    columns: Vec<String>,
    values: Vec<Value>,
    returning: Option<String>,
}

impl InsertBuilder {
    pub(crate) fn new(table: &Table) -> Self {
        Self {
            table: table.clone(),
            columns: Vec::new(),
            values: Vec::new(),
            returning: None,
        }
    }

    /// Add a column to the statement and bind its value.
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.columns.push(column.to_string());
        self.values.push(value.into());
        self
    }

    /// Add a column only if the value is present.
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
            self.columns.push(column);
            self.values.push(value);
        }
        self
    }

    /// Request that the given column of the inserted row be returned.
    pub fn returning(mut self, column: &str) -> Self {
        self.returning = Some(column.to_string());
        self
    }

    fn build(&self) -> (String, Vec<Value>) {
        let mut params = Vec::with_capacity(self.values.len());

        let mut sql = if self.columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.table.name())
        } else {
            let mut placeholders = Vec::with_capacity(self.values.len());
            for value in &self.values {
                params.push(value.clone());
                placeholders.push(format!("${}", params.len()));
            }
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table.name(),
                self.columns.join(", "),
                placeholders.join(", ")
            )
        };

        if let Some(ref column) = self.returning {
            sql.push_str(" RETURNING ");
            sql.push_str(column);
        }

        (sql, params)
    }

    /// The rendered SQL (for inspection).
    pub fn to_sql(&self) -> String {
        self.build().0
    }

    /// Execute the insert and return the number of rows inserted.
    pub async fn execute(self, conn: &impl GenericClient) -> SqlResult<u64> {
        let (sql, params) = self.build();
        run_execute(conn, self.table.monitor_ref().as_ref(), &sql, &params).await
    }

    /// Execute the insert and read back the requested RETURNING column as a
    /// runtime [`Value`].
    ///
    /// Requires [`InsertBuilder::returning`] to have been called; this is how
    /// a table-generated primary key is captured.
    pub async fn execute_returning(self, conn: &impl GenericClient) -> SqlResult<Value> {
        let table = self.table.name().to_string();
        if self.returning.is_none() {
            return Err(SqlError::validation(format!(
                "INSERT INTO {table}: no RETURNING column requested"
            )));
        }
        let (sql, params) = self.build();
        let rows = run_query(conn, self.table.monitor_ref().as_ref(), &sql, &params).await?;
        let row = rows
            .first()
            .ok_or_else(|| SqlError::not_found(format!("{table}: insert returned no row")))?;
        value_at(row, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::table;

    #[test]
    fn simple_insert() {
        let builder = table("person").insert().set("name", "alice").set("code", 7i64);
        assert_eq!(
            builder.to_sql(),
            "INSERT INTO person (name, code) VALUES ($1, $2)"
        );
    }

    #[test]
    fn insert_with_returning() {
        let builder = table("person").insert().set("name", "alice").returning("id");
        assert_eq!(
            builder.to_sql(),
            "INSERT INTO person (name) VALUES ($1) RETURNING id"
        );
    }

    #[test]
    fn insert_default_values() {
        let builder = table("audit_log").insert();
        assert_eq!(builder.to_sql(), "INSERT INTO audit_log DEFAULT VALUES");
    }

    #[test]
    fn set_opt_skips_absent_values() {
        let builder = table("person")
            .insert()
            .set("name", "alice")
            .set_opt("nickname", Option::<String>::None);
        assert_eq!(builder.to_sql(), "INSERT INTO person (name) VALUES ($1)");
    }

    #[test]
    fn set_fields_pairs_names_and_values() {
        let builder = table("person").insert().set_fields(
            vec!["name".to_string(), "code".to_string()],
            vec![Value::from("alice"), Value::I64(7)],
        );
        assert_eq!(
            builder.to_sql(),
            "INSERT INTO person (name, code) VALUES ($1, $2)"
        );
    }

    #[test]
    fn placeholder_count_matches_params() {
        let builder = table("person")
            .insert()
            .set("a", 1i64)
            .set("b", 2i64)
            .set("c", 3i64);
        let (sql, params) = builder.build();
        assert!(crate::client::check_placeholders(&sql, params.len()).is_ok());
    }
}
