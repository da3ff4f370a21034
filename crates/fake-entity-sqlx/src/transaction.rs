//! SQLite transaction handle.

use std::any::Any;

use async_trait::async_trait;
use fake_entity_core::{PersistenceError, PersistenceResult, Transaction, TransactionStatus};
use parking_lot::Mutex;
use sqlx::Sqlite;
use tokio::sync::MutexGuard;

pub(crate) type SqlxTransaction = sqlx::Transaction<'static, Sqlite>;

/// A database transaction shared by every repository call of a creation chain.
///
/// The underlying connection stays checked out of the pool until the
/// transaction is committed or rolled back. Dropping an active handle rolls
/// it back.
pub struct SqliteTransaction {
	pool_id: usize,
	tx: tokio::sync::Mutex<Option<SqlxTransaction>>,
	status: Mutex<TransactionStatus>,
}

impl std::fmt::Debug for SqliteTransaction {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SqliteTransaction")
			.field("status", &self.status())
			.finish_non_exhaustive()
	}
}

impl SqliteTransaction {
	pub(crate) fn new(pool_id: usize, tx: SqlxTransaction) -> Self {
		Self {
			pool_id,
			tx: tokio::sync::Mutex::new(Some(tx)),
			status: Mutex::new(TransactionStatus::Active),
		}
	}

	pub(crate) fn pool_id(&self) -> usize {
		self.pool_id
	}

	/// Locks the live transaction for one statement batch.
	pub(crate) async fn lock(&self) -> MutexGuard<'_, Option<SqlxTransaction>> {
		self.tx.lock().await
	}

	/// Commits every write made through this handle.
	pub async fn commit(&self) -> PersistenceResult<()> {
		let tx = self
			.tx
			.lock()
			.await
			.take()
			.ok_or(PersistenceError::TransactionFinished)?;
		if let Err(error) = tx.commit().await {
			// sqlx rolls the connection back when a commit fails
			*self.status.lock() = TransactionStatus::RolledBack;
			return Err(PersistenceError::backend(error));
		}
		*self.status.lock() = TransactionStatus::Committed;
		tracing::debug!("SQLite transaction committed");
		Ok(())
	}
}

#[async_trait]
impl Transaction for SqliteTransaction {
	fn status(&self) -> TransactionStatus {
		*self.status.lock()
	}

	async fn rollback(&self) -> PersistenceResult<()> {
		let tx = self
			.tx
			.lock()
			.await
			.take()
			.ok_or(PersistenceError::TransactionFinished)?;
		*self.status.lock() = TransactionStatus::RolledBack;
		tx.rollback().await.map_err(PersistenceError::backend)?;
		tracing::debug!("SQLite transaction rolled back");
		Ok(())
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}
