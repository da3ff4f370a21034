//! Error types for the factory engine.
//!
//! [`FactoryError`] is what every public factory operation returns. Errors
//! raised by the persistence layer are carried unchanged inside
//! [`FactoryError::Persistence`], and errors raised by user hooks inside
//! [`FactoryError::Hook`].

use thiserror::Error;

use crate::repository::PersistenceError;

/// Boxed error type accepted from user code (hooks, backends).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while extracting or validating primary keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
	/// A declared key component is missing or null on the record.
	#[error("Primary key field \"{field}\" is empty or null in entity {entity}")]
	MissingKeyField {
		/// Entity the record belongs to.
		entity: String,
		/// Key component that was absent.
		field: String,
	},

	/// A key filter named a field that is not part of the primary key.
	#[error("Invalid primary key field \"{field}\" for entity {entity}")]
	InvalidKeyField {
		/// Entity the filter was built for.
		entity: String,
		/// Field that is not a key component.
		field: String,
	},

	/// A scalar id was supplied for an entity with a composite key.
	#[error("Entity {entity} has a composite primary key, a scalar id cannot identify it")]
	ScalarForCompositeKey {
		/// Entity with the composite key.
		entity: String,
	},
}

/// Errors that can occur during factory operations.
#[derive(Debug, Error)]
pub enum FactoryError {
	/// The factory could not be configured (no primary key, unsupported relation, ...).
	#[error("Configuration error: {0}")]
	Configuration(String),

	/// Primary key extraction or validation failed.
	#[error(transparent)]
	Identity(#[from] IdentityError),

	/// The repository or transaction layer failed.
	#[error(transparent)]
	Persistence(#[from] PersistenceError),

	/// A user preprocessing or postprocessing hook failed.
	#[error("Hook error: {0}")]
	Hook(#[source] BoxError),

	/// A relation mapping referenced a field the related record does not have.
	#[error("Relation field \"{field}\" is missing on {entity} record")]
	Relation {
		/// Entity whose record lacked the field.
		entity: String,
		/// Field named by the relation mapping.
		field: String,
	},

	/// A record could not be converted between its field map and the entity type.
	#[error("Serialization error for entity {entity}: {source}")]
	Serialization {
		/// Entity being converted.
		entity: String,
		/// Underlying serde error.
		#[source]
		source: serde_json::Error,
	},
}

impl FactoryError {
	/// Wraps an arbitrary error raised inside a user hook.
	pub fn hook<E>(error: E) -> Self
	where
		E: Into<BoxError>,
	{
		Self::Hook(error.into())
	}

	/// Returns true when the error originated from the persistence layer.
	pub fn is_persistence(&self) -> bool {
		matches!(self, Self::Persistence(_))
	}
}

/// Result type alias for factory operations.
pub type FactoryResult<T> = Result<T, FactoryError>;
