//! In-memory backend for fake-entity factories.
//!
//! [`MemoryDatabase`] holds any number of tables described by [`TableSchema`]
//! and enforces primary key, unique, not-null and foreign key constraints on
//! insert. Each table is exposed through a [`MemoryRepository`], which also
//! attaches has-many associations declared with [`TableSchema::has_many`].
//!
//! Transactions started with [`MemoryDatabase::begin`] work on a snapshot,
//! replay their writes onto the committed tables at commit and count their
//! rollbacks, which makes rollback guarantees easy to assert.
//!
//! ```
//! use fake_entity_memory::{MemoryDatabase, TableSchema};
//!
//! let db = MemoryDatabase::new();
//! db.define_table(TableSchema::with_serial_id("roles"))
//!     .define_table(TableSchema::with_serial_id("users").foreign_key("roleId", "roles", "id"));
//! let users = db.repository("users").unwrap();
//! assert_eq!(users.schema().primary_key, vec!["id".to_string()]);
//! ```

mod database;
mod repository;
pub mod schema;
mod tables;
mod transaction;

pub use database::MemoryDatabase;
pub use repository::MemoryRepository;
pub use schema::{Association, ForeignKey, TableSchema};
pub use transaction::MemoryTransaction;
