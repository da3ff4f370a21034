//! Convenience re-exports for common usage.
//!
//! ```ignore
//! use fake_entity_core::prelude::*;
//! ```

// Error types
pub use crate::error::{FactoryError, FactoryResult, IdentityError};

// Factory types
pub use crate::config::FactoryConfig;
pub use crate::factory::{FactoryBuilder, FakeEntityFactory};
pub use crate::fields::{FieldFaker, NoDefaults};
pub use crate::relation::{Cardinality, Relation};
pub use crate::state::StateInput;

// Values
pub use crate::value::{Entity, EntityId, FieldMap, KeyFilter, field_map};

// Persistence contracts
pub use crate::repository::{
	PersistenceError, PersistenceResult, RelationAttacher, Repository, Transaction,
	TransactionStatus,
};
