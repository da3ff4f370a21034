//! Persistence contracts consumed by the factory engine.
//!
//! A backend implements [`Repository`] once per table or entity type, and
//! [`Transaction`] for its transaction handle. Association attach (has-many
//! through an ORM relation property) is an optional capability exposed via
//! [`Repository::relation_attacher`].

use std::any::Any;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::BoxError;
use crate::value::{FieldMap, KeyFilter};

/// Errors raised by repositories and transactions.
#[derive(Debug, Error)]
pub enum PersistenceError {
	/// A unique constraint (including the primary key) was violated.
	#[error("Unique constraint violated on {table}.{columns}")]
	UniqueViolation {
		/// Table the insert targeted.
		table: String,
		/// Comma separated column list of the constraint.
		columns: String,
	},

	/// A foreign key referenced a row that does not exist.
	#[error("Foreign key violation on {table}: {detail}")]
	ForeignKeyViolation {
		/// Table the write targeted.
		table: String,
		/// Backend description of the failed reference.
		detail: String,
	},

	/// A required column was missing or null.
	#[error("Not null constraint violated on {table}.{column}")]
	NotNullViolation {
		/// Table the insert targeted.
		table: String,
		/// Required column.
		column: String,
	},

	/// An update addressed a row that does not exist.
	#[error("No row in {table} matches {key}")]
	RowNotFound {
		/// Table the update targeted.
		table: String,
		/// The key conditions that matched nothing.
		key: String,
	},

	/// The table is not known to the backend.
	#[error("Unknown table: {0}")]
	UnknownTable(String),

	/// The transaction was already committed or rolled back.
	#[error("Transaction already finished")]
	TransactionFinished,

	/// A transaction handle created by a different backend was supplied.
	#[error("Transaction handle does not belong to this backend")]
	ForeignTransaction,

	/// The association is not declared for the entity.
	#[error("Unsupported association {association} on {entity}")]
	UnsupportedAssociation {
		/// Entity owning the association.
		entity: String,
		/// Association name.
		association: String,
	},

	/// Any other backend failure (driver, connection, ...).
	#[error("Backend error: {0}")]
	Backend(#[source] BoxError),
}

impl PersistenceError {
	/// Wraps a backend specific error.
	pub fn backend<E>(error: E) -> Self
	where
		E: Into<BoxError>,
	{
		Self::Backend(error.into())
	}
}

/// Result type alias for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Lifecycle state of a transaction handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
	/// Transaction is open.
	Active,
	/// Transaction has been committed.
	Committed,
	/// Transaction has been rolled back.
	RolledBack,
}

impl TransactionStatus {
	/// Returns true once the transaction was committed or rolled back.
	pub fn is_finished(self) -> bool {
		!matches!(self, Self::Active)
	}
}

/// Opaque transaction handle threaded through a whole creation chain.
#[async_trait]
pub trait Transaction: Send + Sync {
	/// Current lifecycle state.
	fn status(&self) -> TransactionStatus;

	/// Returns true once the transaction was committed or rolled back.
	fn is_finished(&self) -> bool {
		self.status().is_finished()
	}

	/// Rolls the transaction back.
	async fn rollback(&self) -> PersistenceResult<()>;

	/// Downcasting hook so a backend can recover its own handle type.
	fn as_any(&self) -> &dyn Any;
}

/// Storage operations for one entity type.
#[async_trait]
pub trait Repository: Send + Sync {
	/// Name used in logs and error messages.
	fn entity_name(&self) -> &str;

	/// Primary key columns in declaration order. Empty when unknown.
	fn primary_key_field_names(&self) -> Vec<String>;

	/// Inserts one row and returns it as stored (generated values included).
	async fn create(
		&self,
		fields: FieldMap,
		txn: Option<&dyn Transaction>,
	) -> PersistenceResult<FieldMap>;

	/// Inserts all rows in one atomic operation, returning them in order.
	async fn bulk_create(
		&self,
		rows: Vec<FieldMap>,
		txn: Option<&dyn Transaction>,
	) -> PersistenceResult<Vec<FieldMap>>;

	/// Deletes every row matching any of the filters. Returns the affected count.
	async fn destroy(
		&self,
		filters: &[KeyFilter],
		txn: Option<&dyn Transaction>,
	) -> PersistenceResult<u64>;

	/// Fetches the row matching the key filter.
	async fn find_by_primary_key(
		&self,
		filter: &KeyFilter,
		txn: Option<&dyn Transaction>,
	) -> PersistenceResult<Option<FieldMap>>;

	/// Association attach capability, when the backend supports it.
	fn relation_attacher(&self) -> Option<&dyn RelationAttacher> {
		None
	}
}

/// Attaches already persisted children to a parent through a named association.
#[async_trait]
pub trait RelationAttacher: Send + Sync {
	/// Links every child to `parent` through `association`.
	async fn attach_many(
		&self,
		parent: &FieldMap,
		association: &str,
		children: &[FieldMap],
		txn: Option<&dyn Transaction>,
	) -> PersistenceResult<()>;
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(TransactionStatus::Active, false)]
	#[case(TransactionStatus::Committed, true)]
	#[case(TransactionStatus::RolledBack, true)]
	fn test_transaction_status_is_finished(
		#[case] status: TransactionStatus,
		#[case] finished: bool,
	) {
		assert_eq!(status.is_finished(), finished);
	}

	#[rstest]
	fn test_unique_violation_display() {
		let error = PersistenceError::UniqueViolation {
			table: "users".to_string(),
			columns: "email".to_string(),
		};
		assert_eq!(error.to_string(), "Unique constraint violated on users.email");
	}

	#[rstest]
	fn test_row_not_found_display() {
		let error = PersistenceError::RowNotFound {
			table: "posts".to_string(),
			key: KeyFilter::new().and("id", 9).to_string(),
		};
		assert_eq!(error.to_string(), "No row in posts matches id = 9");
	}

	#[rstest]
	fn test_backend_error_keeps_source() {
		let error = PersistenceError::backend("connection reset");
		assert_eq!(error.to_string(), "Backend error: connection reset");
		assert!(std::error::Error::source(&error).is_some());
	}
}
