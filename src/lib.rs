//! # fake-entity
//!
//! Test-data factories for ORM-managed entities.
//!
//! A factory generates plausible records for one entity type, persists them
//! through a repository, and keeps track of what it created so a test can
//! clean up afterwards. Factories compose: a post factory can create the user
//! each post belongs to, a user factory can create three posts per user, and
//! the whole graph is written inside one transaction that is rolled back
//! exactly once if any step fails.
//!
//! ## Feature Flags
//!
//! - `memory` (default) - in-memory transactional backend ([`memory`])
//! - `sqlite` - SQLite backend on `sqlx` ([`sqlite`])
//! - `full` - all backends
//!
//! ## Quick Example
//!
//! ```rust
//! use fake_entity::memory::{MemoryDatabase, TableSchema};
//! use fake_entity::prelude::*;
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let db = MemoryDatabase::new();
//! db.define_table(TableSchema::with_serial_id("users"));
//!
//! let users = FakeEntityFactory::<User>::new(db.repository("users").unwrap(), || {
//!     field_map(json!({"name": "Ada"}))
//! })
//! .unwrap();
//!
//! let created = users
//!     .add_field_sequence("name", ["Ada", "Grace"])
//!     .create_many(3, None, None)
//!     .await
//!     .unwrap();
//! assert_eq!(created[2].name, "Ada");
//!
//! assert_eq!(users.cleanup(None).await.unwrap(), 3);
//! # });
//! ```

pub use fake_entity_core::*;

/// In-memory backend.
#[cfg(feature = "memory")]
pub mod memory {
	pub use fake_entity_memory::*;
}

/// SQLite backend.
#[cfg(feature = "sqlite")]
pub mod sqlite {
	pub use fake_entity_sqlx::*;
}

/// Convenience re-exports for common usage.
pub mod prelude {
	pub use fake_entity_core::prelude::*;

	// External
	pub use async_trait::async_trait;

	#[cfg(feature = "memory")]
	pub use fake_entity_memory::{MemoryDatabase, MemoryRepository, MemoryTransaction, TableSchema};

	#[cfg(feature = "sqlite")]
	pub use fake_entity_sqlx::{SqliteDatabase, SqliteRepository, SqliteSettings, SqliteTransaction};
}
