//! # pgfluent
//!
//! A fluent, statement-building SQL layer for PostgreSQL.
//!
//! ## Features
//!
//! - **Fluent statements**: collect fields and conditions, then call one
//!   terminal `execute`/`single_*`/`list` method
//! - **Insert-or-update saves**: probe by primary or unique key, then issue
//!   exactly one `INSERT` or `UPDATE`, or nothing when the row is unchanged
//! - **Three key strategies**: table-generated, caller-supplied, or UUID
//! - **Typed extraction**: singleton results enforce exactly-one-row
//!   semantics; lists map rows through plain functions
//! - **Bulk operations**: per-field extractor functions turn a collection of
//!   objects into one batched statement
//! - **Transaction-friendly**: pass a transaction anywhere a
//!   [`GenericClient`] is expected
//!
//! ## Example
//!
//! ```ignore
//! use pgfluent::table;
//!
//! let people = table("person");
//!
//! // Insert or update, keyed by a unique column
//! let saved = people
//!     .save("id", None)
//!     .unique_key("code", 1002i64)
//!     .set_field("name", "somebody")
//!     .execute(&client)
//!     .await?;
//!
//! // Look the row back up
//! let name = people
//!     .where_eq("id", saved.key)
//!     .single_string(&client, "name")
//!     .await?;
//!
//! // Predictably ordered listing
//! let codes = people
//!     .order_by("code")
//!     .list_i64s(&client, "code")
//!     .await?;
//! ```

pub mod bulk;
pub mod client;
pub mod delete;
pub mod error;
pub mod insert;
pub mod monitor;
pub mod predicate;
pub mod row;
pub mod save;
pub mod select;
pub mod table;
pub mod update;
pub mod value;

pub use bulk::{BulkDeleteBuilder, BulkInsertBuilder, BulkUpdateBuilder};
pub use client::GenericClient;
pub use delete::DeleteBuilder;
pub use error::{SqlError, SqlResult};
pub use insert::InsertBuilder;
pub use monitor::{
    LoggingMonitor, NoopMonitor, StatementContext, StatementKind, StatementMonitor,
    StatementOutcome,
};
pub use predicate::WhereClause;
pub use row::{FromRow, RowExt};
pub use save::{KeyStrategy, SaveAction, SaveBuilder, SaveResult};
pub use select::{JoinedSelectBuilder, SelectBuilder};
pub use table::{ColumnRef, Table, TableAlias, table};
pub use update::UpdateBuilder;
pub use value::Value;
