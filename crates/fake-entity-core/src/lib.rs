//! Entity-graph construction engine for test-data factories.
//!
//! A [`FakeEntityFactory`] generates records for one entity type, persists
//! them through an injected [`Repository`], and remembers their identities so
//! a test can delete them afterwards.
//!
//! # Features
//!
//! - **State**: merged field overrides and round-robin sequences applied to the
//!   next batch ([`FakeEntityFactory::add_states`],
//!   [`FakeEntityFactory::add_field_sequence`])
//! - **Parents**: upstream records created first, shared by the batch or one per
//!   child ([`FakeEntityFactory::with_parent`], [`Cardinality`])
//! - **Nested children**: downstream records created per parent, linked by foreign
//!   key or through an association ([`FakeEntityFactory::with_nested`], [`Relation`])
//! - **Composite keys**: identities are scalars or field maps ([`EntityId`])
//! - **Transactions**: a supplied [`Transaction`] is threaded through the whole
//!   call chain and rolled back exactly once on failure
//!
//! # Quick Start
//!
//! ```ignore
//! use fake_entity_core::prelude::*;
//! use serde_json::json;
//!
//! let users = FakeEntityFactory::<User>::builder(db.repository("users")?)
//!     .fake_fields(|| field_map(json!({"email": SafeEmail().fake::<String>()})))
//!     .build()?;
//!
//! let admins = users
//!     .add_field_sequence("role", ["admin", "editor"])
//!     .create_many(3, None, None)
//!     .await?;
//!
//! users.cleanup(None).await?;
//! ```
//!
//! # Architecture
//!
//! - [`state`] - pending merged state and [`RoundRobin`](state::RoundRobin) cursors
//! - [`fields`] - default field generation and override precedence
//! - [`identity`] - primary key extraction and key filters
//! - [`relation`] - parent/child field mappings
//! - [`repository`] - persistence, transaction and association contracts
//! - [`factory`] - the factory handle and its configuration
//!
//! Creation and lifecycle operations are implemented on [`FakeEntityFactory`]
//! in separate modules.

pub mod config;
mod engine;
pub mod error;
pub mod factory;
pub mod fields;
pub mod identity;
mod lifecycle;
pub mod prelude;
pub mod relation;
pub mod repository;
pub mod state;
mod transaction;
pub mod value;

// Re-export commonly used types at crate root
pub use config::FactoryConfig;
pub use error::{BoxError, FactoryError, FactoryResult, IdentityError};
pub use factory::{FactoryBuilder, FakeEntityFactory, PostprocessHook, PreprocessHook};
pub use fields::{FieldFaker, NoDefaults};
pub use identity::KeyResolver;
pub use relation::{Cardinality, KeyPair, Relation};
pub use repository::{
	PersistenceError, PersistenceResult, RelationAttacher, Repository, Transaction,
	TransactionStatus,
};
pub use state::{RoundRobin, StateAccumulator, StateInput};
pub use value::{Entity, EntityId, FieldMap, KeyFilter, field_map};
