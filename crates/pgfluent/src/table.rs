//! Table entry points for the fluent builders.
//!
//! A [`Table`] is the starting point for every statement:
//!
//! ```ignore
//! let people = table("person");
//! let id = people
//!     .save("id", None)
//!     .unique_key("code", 1002i64)
//!     .set_field("name", "somebody")
//!     .execute(&client)
//!     .await?
//!     .key;
//!
//! let name = people.where_eq("id", 42i64).single_string(&client, "name").await?;
//! ```

use crate::bulk::{BulkDeleteBuilder, BulkInsertBuilder, BulkUpdateBuilder};
use crate::delete::DeleteBuilder;
use crate::insert::InsertBuilder;
use crate::monitor::{LoggingMonitor, StatementMonitor};
use crate::save::{KeyStrategy, SaveBuilder};
use crate::select::{JoinedSelectBuilder, SelectBuilder};
use crate::update::UpdateBuilder;
use crate::value::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Create a [`Table`] with the default logging monitor.
pub fn table(name: &str) -> Table {
    Table::new(name)
}

/// A named table and the monitor its statements report to.
///
/// Cheap to clone; every builder carries its own copy.
#[derive(Clone)]
pub struct Table {
    name: String,
    monitor: Arc<dyn StatementMonitor>,
    timestamped: bool,
    generated_keys: bool,
}

impl Table {
    /// Create a table handle reporting to the default [`LoggingMonitor`].
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            monitor: Arc::new(LoggingMonitor),
            timestamped: false,
            generated_keys: true,
        }
    }

    /// Create a table handle whose saves maintain `created_at`/`updated_at`
    /// audit columns.
    ///
    /// `created_at` and `updated_at` are set on insert; `updated_at` alone is
    /// bumped when a save actually changes a row. A save that changes nothing
    /// leaves both untouched.
    pub fn with_timestamps(name: &str) -> Self {
        Self {
            timestamped: true,
            ..Self::new(name)
        }
    }

    /// Replace the statement monitor.
    pub fn monitor(mut self, monitor: Arc<dyn StatementMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Mark this table's connection as unable to report generated keys.
    ///
    /// Saves using the generated-key strategy with an absent id will fail
    /// with [`crate::SqlError::UnsupportedGeneration`] instead of asking the
    /// driver to generate one.
    pub fn no_generated_keys(mut self) -> Self {
        self.generated_keys = false;
        self
    }

    /// The table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn monitor_ref(&self) -> &Arc<dyn StatementMonitor> {
        &self.monitor
    }

    pub(crate) fn is_timestamped(&self) -> bool {
        self.timestamped
    }

    pub(crate) fn supports_generated_keys(&self) -> bool {
        self.generated_keys
    }

    // ==================== Queries ====================

    /// Start a SELECT without an ordering clause.
    ///
    /// Without `order_by` the order of listed results is unpredictable; this
    /// entry point is the explicit opt-in for that.
    pub fn unordered(&self) -> SelectBuilder {
        SelectBuilder::new(self)
    }

    /// Start a SELECT ordered by the given clause.
    pub fn order_by(&self, clause: &str) -> SelectBuilder {
        SelectBuilder::new(self).order_by(clause)
    }

    /// Start a SELECT filtered on `column = value`.
    pub fn where_eq(&self, column: &str, value: impl Into<Value>) -> SelectBuilder {
        SelectBuilder::new(self).where_eq(column, value)
    }

    /// Start a SELECT with no conditions yet.
    pub fn query(&self) -> SelectBuilder {
        SelectBuilder::new(self)
    }

    /// Alias this table for a joined SELECT.
    pub fn alias(&self, alias: &str) -> TableAlias {
        TableAlias {
            table: self.clone(),
            alias: alias.to_string(),
        }
    }

    // ==================== Mutations ====================

    /// Start an INSERT statement.
    pub fn insert(&self) -> InsertBuilder {
        InsertBuilder::new(self)
    }

    /// Start an UPDATE statement.
    pub fn update(&self) -> UpdateBuilder {
        UpdateBuilder::new(self)
    }

    /// Start a DELETE statement.
    pub fn delete(&self) -> DeleteBuilder {
        DeleteBuilder::new(self)
    }

    // ==================== Save (insert-or-update) ====================

    /// Start a save that relies on the table's key autogeneration when `id`
    /// is absent and no matching row exists.
    pub fn save(&self, id_field: &str, id: Option<i64>) -> SaveBuilder {
        SaveBuilder::new(self, id_field, id.map(Value::I64), KeyStrategy::Generated)
    }

    /// Start a save that requires the caller to supply the key; fails with
    /// [`crate::SqlError::MissingKey`] if the id is absent on insert.
    pub fn save_explicit(&self, id_field: &str, id: Option<Value>) -> SaveBuilder {
        SaveBuilder::new(self, id_field, id, KeyStrategy::Explicit)
    }

    /// Start a save that generates a UUID key when `id` is absent and no
    /// matching row exists.
    pub fn save_uuid(&self, id_field: &str, id: Option<Uuid>) -> SaveBuilder {
        SaveBuilder::new(self, id_field, id.map(Value::Uuid), KeyStrategy::Uuid)
    }

    // ==================== Bulk ====================

    /// Start a bulk INSERT over a collection of domain objects.
    pub fn bulk_insert<T>(&self, objects: Vec<T>) -> BulkInsertBuilder<T> {
        BulkInsertBuilder::new(self, objects)
    }

    /// Start a bulk UPDATE over a collection of domain objects.
    pub fn bulk_update<T>(&self, objects: Vec<T>) -> BulkUpdateBuilder<T> {
        BulkUpdateBuilder::new(self, objects)
    }

    /// Start a bulk DELETE over a collection of domain objects.
    pub fn bulk_delete<T>(&self, objects: Vec<T>) -> BulkDeleteBuilder<T> {
        BulkDeleteBuilder::new(self, objects)
    }
}

/// A table under an alias, for joined SELECTs.
///
/// The same table can appear several times in one query under different
/// aliases.
#[derive(Clone)]
pub struct TableAlias {
    table: Table,
    alias: String,
}

impl TableAlias {
    /// The aliased table.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// The alias text.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Reference a column of this aliased table.
    pub fn column(&self, name: &str) -> ColumnRef {
        ColumnRef {
            table: self.table.name().to_string(),
            alias: self.alias.clone(),
            column: name.to_string(),
        }
    }

    /// Start a joined SELECT with this alias as the base table.
    pub fn select(&self) -> JoinedSelectBuilder {
        JoinedSelectBuilder::new(self)
    }

    /// Start a joined SELECT by inner-joining on the given column pair.
    ///
    /// The joined table is taken from the right-hand reference.
    pub fn join(&self, left: ColumnRef, right: ColumnRef) -> JoinedSelectBuilder {
        self.select().join(left, right)
    }

    /// Start a joined SELECT by left-joining on the given column pair.
    pub fn left_join(&self, left: ColumnRef, right: ColumnRef) -> JoinedSelectBuilder {
        self.select().left_join(left, right)
    }

    /// Start a joined SELECT filtered on an alias-qualified equality.
    pub fn where_eq(&self, column: &str, value: impl Into<Value>) -> JoinedSelectBuilder {
        self.select().where_column_eq(self.column(column), value)
    }
}

/// An alias-qualified column reference, used for join predicates and joined
/// column lists so identical column names on different tables cannot collide.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnRef {
    table: String,
    alias: String,
    column: String,
}

impl ColumnRef {
    /// The underlying table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The table alias.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The column name.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Render as `alias.column`.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.alias, self.column)
    }
}
