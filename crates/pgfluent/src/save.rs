//! Insert-or-update reconciliation.
//!
//! A [`SaveBuilder`] probes for an existing row by primary key or unique key,
//! then issues exactly one `INSERT` or `UPDATE`, or nothing at all when the
//! row already holds the requested values. Skipping the no-op `UPDATE` is
//! what keeps audit columns honest: `updated_at` only moves when a row
//! actually changed.

use crate::client::GenericClient;
use crate::error::{SqlError, SqlResult};
use crate::insert::InsertBuilder;
use crate::row::value_at;
use crate::select::SelectBuilder;
use crate::table::Table;
use crate::update::UpdateBuilder;
use crate::value::Value;
use chrono::{DateTime, Utc};
use uuid::Uuid;

const CREATED_AT: &str = "created_at";
const UPDATED_AT: &str = "updated_at";

/// How the primary key is obtained when a save inserts a new row.
///
/// Fixed by the [`Table`] entry point used; one strategy governs one save.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Omit the key and read back the value generated by the table
    /// (`RETURNING <id>`); an explicitly supplied key is used as-is.
    Generated,
    /// The caller must supply the key; an absent key is an error.
    Explicit,
    /// Generate a v4 UUID when the key is absent.
    Uuid,
}

/// What a save actually did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveAction {
    /// A new row was inserted.
    Inserted,
    /// An existing row was updated.
    Updated,
    /// An existing row already held the requested values; no statement ran.
    Unchanged,
}

/// The key of the affected row and what happened to it.
#[derive(Clone, Debug, PartialEq)]
pub struct SaveResult {
    /// Primary key of the inserted or matched row.
    pub key: Value,
    /// Which path the save took.
    pub action: SaveAction,
}

/// Builds one insert-or-update operation.
///
/// ```ignore
/// let result = table("demo_table")
///     .save("id", None)
///     .unique_key("code", 123i64)
///     .set_field("name", "demo row")
///     .execute(&client)
///     .await?;
/// ```
pub struct SaveBuilder {
    table: Table,
    id_field: String,
    id: Option<Value>,
    strategy: KeyStrategy,
    unique_keys: Vec<(String, Value)>,
    fields: Vec<(String, Value)>,
}

impl SaveBuilder {
    pub(crate) fn new(table: &Table, id_field: &str, id: Option<Value>, strategy: KeyStrategy) -> Self {
        Self {
            table: table.clone(),
            id_field: id_field.to_string(),
            id,
            strategy,
            unique_keys: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Add a unique-key field.
    ///
    /// Unique keys locate the existing row when no id was supplied, and are
    /// written like ordinary fields on both the insert and update paths.
    pub fn unique_key(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.unique_keys.push((field.to_string(), value.into()));
        self
    }

    /// Add a field to be written.
    pub fn set_field(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.push((field.to_string(), value.into()));
        self
    }

    /// Run the save: probe, then insert, update, or do nothing.
    pub async fn execute(self, conn: &impl GenericClient) -> SqlResult<SaveResult> {
        match self.probe(conn).await? {
            None => self.insert_row(conn).await,
            Some(existing) => {
                if fields_unchanged(&existing.fields, &self.written_fields()) {
                    Ok(SaveResult {
                        key: existing.id,
                        action: SaveAction::Unchanged,
                    })
                } else {
                    self.update_row(conn, existing.id).await
                }
            }
        }
    }

    /// The id value, with an explicit NULL treated as absent.
    fn id_value(&self) -> Option<&Value> {
        self.id.as_ref().filter(|v| !v.is_null())
    }

    /// Unique keys followed by plain fields, in registration order. This is
    /// the column set written on insert and update and compared on probe.
    fn written_fields(&self) -> Vec<(String, Value)> {
        self.unique_keys
            .iter()
            .chain(self.fields.iter())
            .cloned()
            .collect()
    }

    /// The SELECT locating the existing row, or `None` when neither an id
    /// nor unique keys were given (a plain insert).
    fn probe_builder(&self) -> Option<SelectBuilder> {
        let written = self.written_fields();
        let mut columns: Vec<&str> = vec![self.id_field.as_str()];
        columns.extend(written.iter().map(|(name, _)| name.as_str()));

        if let Some(id) = self.id_value() {
            let builder = self
                .table
                .unordered()
                .select_columns(&columns)
                .where_eq(&self.id_field, id.clone());
            Some(builder)
        } else if !self.unique_keys.is_empty() {
            let mut builder = self.table.unordered().select_columns(&columns);
            for (field, value) in &self.unique_keys {
                builder = builder.where_eq(field, value.clone());
            }
            Some(builder)
        } else {
            None
        }
    }

    async fn probe(&self, conn: &impl GenericClient) -> SqlResult<Option<ExistingRow>> {
        let Some(builder) = self.probe_builder() else {
            return Ok(None);
        };
        let rows = builder.fetch_raw(conn).await?;
        match rows.len() {
            0 => Ok(None),
            1 => {
                let row = &rows[0];
                let id = value_at(row, 0)?;
                let written = self.written_fields();
                let mut fields = Vec::with_capacity(written.len());
                for (i, (name, _)) in written.into_iter().enumerate() {
                    fields.push((name, value_at(row, i + 1)?));
                }
                Ok(Some(ExistingRow { id, fields }))
            }
            got => Err(SqlError::AmbiguousMatch(format!(
                "{}: {} rows match the same key",
                self.table.name(),
                got
            ))),
        }
    }

    /// Resolve the key to write on insert.
    ///
    /// `Some` means the key is included in the column list; `None` means the
    /// table generates it and the insert reads it back.
    fn insert_key(&self) -> SqlResult<Option<Value>> {
        match (self.strategy, self.id_value()) {
            (_, Some(id)) => Ok(Some(id.clone())),
            (KeyStrategy::Generated, None) => {
                if self.table.supports_generated_keys() {
                    Ok(None)
                } else {
                    Err(SqlError::UnsupportedGeneration(format!(
                        "{}.{}: connection cannot report generated keys",
                        self.table.name(),
                        self.id_field
                    )))
                }
            }
            (KeyStrategy::Explicit, None) => Err(SqlError::MissingKey(format!(
                "{}.{}: id value is required",
                self.table.name(),
                self.id_field
            ))),
            (KeyStrategy::Uuid, None) => Ok(Some(Value::Uuid(Uuid::new_v4()))),
        }
    }

    fn insert_statement(&self, key: Option<&Value>, now: DateTime<Utc>) -> InsertBuilder {
        let mut builder = self.table.insert();
        if let Some(key) = key {
            builder = builder.set(&self.id_field, key.clone());
        }
        for (name, value) in self.written_fields() {
            builder = builder.set(&name, value);
        }
        if self.table.is_timestamped() {
            builder = builder
                .set(CREATED_AT, Value::Timestamp(now))
                .set(UPDATED_AT, Value::Timestamp(now));
        }
        builder
    }

    fn update_statement(&self, found_id: &Value, now: DateTime<Utc>) -> UpdateBuilder {
        let mut builder = self.table.update();
        for (name, value) in self.written_fields() {
            builder = builder.set(&name, value);
        }
        if self.table.is_timestamped() {
            builder = builder.set(UPDATED_AT, Value::Timestamp(now));
        }
        builder.where_eq(&self.id_field, found_id.clone())
    }

    async fn insert_row(self, conn: &impl GenericClient) -> SqlResult<SaveResult> {
        let key = self.insert_key()?;
        let builder = self.insert_statement(key.as_ref(), Utc::now());
        match key {
            Some(key) => {
                builder.execute(conn).await?;
                Ok(SaveResult {
                    key,
                    action: SaveAction::Inserted,
                })
            }
            None => {
                let key = builder
                    .returning(&self.id_field)
                    .execute_returning(conn)
                    .await?;
                Ok(SaveResult {
                    key,
                    action: SaveAction::Inserted,
                })
            }
        }
    }

    async fn update_row(self, conn: &impl GenericClient, found_id: Value) -> SqlResult<SaveResult> {
        self.update_statement(&found_id, Utc::now())
            .execute(conn)
            .await?;
        Ok(SaveResult {
            key: found_id,
            action: SaveAction::Updated,
        })
    }
}

/// The probed row: its key and the current values of the written columns.
struct ExistingRow {
    id: Value,
    fields: Vec<(String, Value)>,
}

/// True when every updated field already holds its requested value.
///
/// Comparison is [`Value`] equality: NULL matches NULL, and numeric widths
/// compare by value, so a probe snapshot read from an INTEGER column matches
/// the same number supplied as an `i64`. A column missing from the probe
/// snapshot counts as changed.
fn fields_unchanged(current: &[(String, Value)], updated: &[(String, Value)]) -> bool {
    updated.iter().all(|(name, value)| {
        current
            .iter()
            .find(|(n, _)| n == name)
            .is_some_and(|(_, v)| v == value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Table, table};

    fn builder(id: Option<i64>) -> SaveBuilder {
        table("demo_table")
            .save("id", id)
            .unique_key("code", 123i64)
            .set_field("name", "demo row")
    }

    #[test]
    fn probe_by_id_when_present() {
        let probe = builder(Some(42)).probe_builder().unwrap();
        assert_eq!(
            probe.to_sql(),
            "SELECT id, code, name FROM demo_table WHERE id = $1"
        );
    }

    #[test]
    fn probe_by_unique_keys_when_id_absent() {
        let probe = builder(None).probe_builder().unwrap();
        assert_eq!(
            probe.to_sql(),
            "SELECT id, code, name FROM demo_table WHERE code = $1"
        );
    }

    #[test]
    fn no_probe_without_id_or_unique_keys() {
        let save = table("demo_table").save("id", None).set_field("name", "x");
        assert!(save.probe_builder().is_none());
    }

    #[test]
    fn generated_key_absent_is_driver_generated() {
        assert_eq!(builder(None).insert_key().unwrap(), None);
    }

    #[test]
    fn generated_key_present_is_used_as_is() {
        assert_eq!(
            builder(Some(7)).insert_key().unwrap(),
            Some(Value::I64(7))
        );
    }

    #[test]
    fn generated_key_fails_without_driver_support() {
        let save = table("demo_table")
            .no_generated_keys()
            .save("id", None)
            .set_field("name", "x");
        assert!(matches!(
            save.insert_key(),
            Err(SqlError::UnsupportedGeneration(_))
        ));
    }

    #[test]
    fn explicit_key_must_be_present() {
        let save = table("demo_table").save_explicit("id", None);
        assert!(matches!(save.insert_key(), Err(SqlError::MissingKey(_))));

        let save = table("demo_table").save_explicit("id", Some(Value::Text("k1".into())));
        assert_eq!(save.insert_key().unwrap(), Some(Value::Text("k1".into())));
    }

    #[test]
    fn uuid_key_generated_when_absent() {
        let save = table("demo_table").save_uuid("id", None);
        let key = save.insert_key().unwrap().unwrap();
        assert!(matches!(key, Value::Uuid(_)));
    }

    #[test]
    fn uuid_key_kept_when_present() {
        let id = Uuid::new_v4();
        let save = table("demo_table").save_uuid("id", Some(id));
        assert_eq!(save.insert_key().unwrap(), Some(Value::Uuid(id)));
    }

    #[test]
    fn insert_statement_includes_unique_keys_and_fields() {
        let save = builder(None);
        let insert = save.insert_statement(None, Utc::now());
        assert_eq!(
            insert.returning("id").to_sql(),
            "INSERT INTO demo_table (code, name) VALUES ($1, $2) RETURNING id"
        );
    }

    #[test]
    fn insert_statement_with_explicit_id_lists_id_first() {
        let save = builder(Some(9));
        let key = Value::I64(9);
        let insert = save.insert_statement(Some(&key), Utc::now());
        assert_eq!(
            insert.to_sql(),
            "INSERT INTO demo_table (id, code, name) VALUES ($1, $2, $3)"
        );
    }

    #[test]
    fn timestamped_insert_sets_both_audit_columns() {
        let save = Table::with_timestamps("demo_table")
            .save("id", None)
            .unique_key("code", 1i64)
            .set_field("name", "x");
        let insert = save.insert_statement(None, Utc::now());
        assert_eq!(
            insert.to_sql(),
            "INSERT INTO demo_table (code, name, created_at, updated_at) VALUES ($1, $2, $3, $4)"
        );
    }

    #[test]
    fn update_statement_sets_all_written_fields() {
        let save = builder(None);
        let update = save.update_statement(&Value::I64(5), Utc::now());
        assert_eq!(
            update.to_sql().unwrap(),
            "UPDATE demo_table SET code = $1, name = $2 WHERE id = $3"
        );
    }

    #[test]
    fn timestamped_update_bumps_updated_at_only() {
        let save = Table::with_timestamps("demo_table")
            .save("id", Some(5))
            .set_field("name", "x");
        let update = save.update_statement(&Value::I64(5), Utc::now());
        assert_eq!(
            update.to_sql().unwrap(),
            "UPDATE demo_table SET name = $1, updated_at = $2 WHERE id = $3"
        );
    }

    #[test]
    fn unchanged_when_all_values_match() {
        let current = vec![
            ("code".to_string(), Value::I64(100)),
            ("name".to_string(), Value::Text("a".into())),
        ];
        let updated = current.clone();
        assert!(fields_unchanged(&current, &updated));
    }

    #[test]
    fn changed_when_any_value_differs() {
        let current = vec![
            ("code".to_string(), Value::I64(100)),
            ("name".to_string(), Value::Text("a".into())),
        ];
        let updated = vec![
            ("code".to_string(), Value::I64(100)),
            ("name".to_string(), Value::Text("b".into())),
        ];
        assert!(!fields_unchanged(&current, &updated));
    }

    #[test]
    fn unchanged_across_integer_widths() {
        // an INTEGER column probes as I32 while callers usually supply i64
        let current = vec![("code".to_string(), Value::I32(100))];
        let updated = vec![("code".to_string(), Value::I64(100))];
        assert!(fields_unchanged(&current, &updated));
    }

    #[test]
    fn null_matches_null() {
        let current = vec![("name".to_string(), Value::Null)];
        let updated = vec![("name".to_string(), Value::Null)];
        assert!(fields_unchanged(&current, &updated));
    }

    #[test]
    fn null_differs_from_value() {
        let current = vec![("name".to_string(), Value::Null)];
        let updated = vec![("name".to_string(), Value::Text("x".into()))];
        assert!(!fields_unchanged(&current, &updated));
    }

    #[test]
    fn missing_probe_column_counts_as_changed() {
        let current: Vec<(String, Value)> = vec![];
        let updated = vec![("name".to_string(), Value::Text("x".into()))];
        assert!(!fields_unchanged(&current, &updated));
    }

    #[test]
    fn explicit_null_id_is_treated_as_absent() {
        let save = table("demo_table").save_explicit("id", Some(Value::Null));
        assert!(matches!(save.insert_key(), Err(SqlError::MissingKey(_))));
    }

    #[tokio::test]
    async fn explicit_save_probes_then_inserts() {
        let conn = crate::client::test_support::RecordingClient::new();
        let result = table("demo_table")
            .save_explicit("id", Some(Value::I64(7)))
            .set_field("name", "x")
            .execute(&conn)
            .await
            .unwrap();
        assert_eq!(result.action, SaveAction::Inserted);
        assert_eq!(result.key, Value::I64(7));
        assert_eq!(
            conn.executed(),
            vec![
                "SELECT id, name FROM demo_table WHERE id = $1",
                "INSERT INTO demo_table (id, name) VALUES ($1, $2)",
            ]
        );
    }

    #[tokio::test]
    async fn uuid_save_without_keys_skips_the_probe() {
        let conn = crate::client::test_support::RecordingClient::new();
        let result = table("demo_table")
            .save_uuid("id", None)
            .set_field("name", "x")
            .execute(&conn)
            .await
            .unwrap();
        assert_eq!(result.action, SaveAction::Inserted);
        assert!(matches!(result.key, Value::Uuid(_)));
        assert_eq!(
            conn.executed(),
            vec!["INSERT INTO demo_table (id, name) VALUES ($1, $2)"]
        );
    }

    #[tokio::test]
    async fn generated_save_asks_the_driver_for_the_key() {
        let conn = crate::client::test_support::RecordingClient::new();
        let err = table("demo_table")
            .save("id", None)
            .set_field("name", "x")
            .execute(&conn)
            .await
            .unwrap_err();
        // the stub returns no row for RETURNING, which surfaces as not-found
        assert!(err.is_not_found());
        assert_eq!(
            conn.executed(),
            vec!["INSERT INTO demo_table (name) VALUES ($1) RETURNING id"]
        );
    }

    // The demo scenario: t(id, code, name). First save inserts, second save
    // with a different name updates, an identical third save does nothing.
    #[test]
    fn save_scenario_decisions() {
        let requested = vec![
            ("code".to_string(), Value::I64(100)),
            ("name".to_string(), Value::Text("b".into())),
        ];

        // no existing row: insert path, probe found nothing
        let save = table("t")
            .save("id", None)
            .unique_key("code", 100i64)
            .set_field("name", "a");
        assert!(save.probe_builder().is_some());
        assert_eq!(save.insert_key().unwrap(), None);

        // row holds name = "a": differs, update fires
        let current = vec![
            ("code".to_string(), Value::I64(100)),
            ("name".to_string(), Value::Text("a".into())),
        ];
        assert!(!fields_unchanged(&current, &requested));

        // row holds name = "b": identical, nothing to do
        let current = vec![
            ("code".to_string(), Value::I64(100)),
            ("name".to_string(), Value::Text("b".into())),
        ];
        assert!(fields_unchanged(&current, &requested));
    }
}
