//! DELETE statement builder.

use crate::client::{GenericClient, run_execute};
use crate::error::SqlResult;
use crate::predicate::WhereClause;
use crate::table::Table;
use crate::value::Value;

/// Collects WHERE conditions for one `DELETE` statement.
///
/// A DELETE with no conditions renders `WHERE 1=0` unless
/// [`DeleteBuilder::allow_delete_all`] was called, so a forgotten filter
/// cannot empty a table.
#[derive(Clone)]
pub struct DeleteBuilder {
    table: Table,
    where_clause: WhereClause,
    allow_delete_all: bool,
}

impl DeleteBuilder {
    pub(crate) fn new(table: &Table) -> Self {
        Self {
            table: table.clone(),
            where_clause: WhereClause::new(),
            allow_delete_all: false,
        }
    }

    /// Allow a DELETE without WHERE conditions to touch every row.
    pub fn allow_delete_all(mut self) -> Self {
        self.allow_delete_all = true;
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

    fn build(&self) -> (String, Vec<Value>) {
        let mut params = Vec::new();

        if self.where_clause.is_empty() && !self.allow_delete_all {
            return (
                format!("DELETE FROM {} WHERE 1=0", self.table.name()),
                params,
            );
        }

        let mut sql = format!("DELETE FROM {}", self.table.name());
        if !self.where_clause.is_empty() {
            sql.push_str(" WHERE ");
            self.where_clause.render(&mut sql, &mut params);
        }

        (sql, params)
    }

    /// The rendered SQL (for inspection).
    pub fn to_sql(&self) -> String {
        self.build().0
    }

    /// Execute the delete and return the number of rows deleted.
    pub async fn execute(self, conn: &impl GenericClient) -> SqlResult<u64> {
        let (sql, params) = self.build();
        run_execute(conn, self.table.monitor_ref().as_ref(), &sql, &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::table;

    #[test]
    fn simple_delete() {
        let builder = table("person").delete().where_eq("id", 1i64);
        assert_eq!(builder.to_sql(), "DELETE FROM person WHERE id = $1");
    }

    #[test]
    fn delete_without_where_is_inert() {
        let builder = table("person").delete();
        assert_eq!(builder.to_sql(), "DELETE FROM person WHERE 1=0");
    }

    #[test]
    fn delete_all_requires_explicit_unlock() {
        let builder = table("person").delete().allow_delete_all();
        assert_eq!(builder.to_sql(), "DELETE FROM person");
    }

    #[test]
    fn delete_with_in_list() {
        let builder = table("person").delete().where_in("id", vec![1i64, 2]);
        assert_eq!(builder.to_sql(), "DELETE FROM person WHERE id IN ($1, $2)");
    }

    #[test]
    fn empty_in_list_deletes_nothing() {
        let builder = table("person").delete().where_in::<i64>("id", vec![]);
        assert_eq!(builder.to_sql(), "DELETE FROM person WHERE 1=0");
    }
}
