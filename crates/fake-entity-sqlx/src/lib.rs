//! SQLite backend for fake-entity factories, built on `sqlx`.
//!
//! [`SqliteDatabase`] wraps a connection pool. Repositories read their
//! primary key from the table definition, so factories over them detect
//! composite keys without extra configuration. Has-many associations are
//! declared per repository with [`SqliteRepository::with_association`] and
//! attached by updating the child's foreign key column.
//!
//! Transactions started with [`SqliteDatabase::begin`] keep one connection
//! checked out until they are committed or rolled back. Bulk inserts run in
//! their own transaction (or a savepoint inside a caller's transaction), so
//! they either insert every row or none.

mod database;
mod error;
mod repository;
mod row;
pub mod settings;
mod transaction;

pub use database::SqliteDatabase;
pub use repository::{SqliteAssociation, SqliteRepository};
pub use settings::SqliteSettings;
pub use transaction::SqliteTransaction;
