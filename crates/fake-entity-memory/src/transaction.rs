//! Snapshot transactions.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use fake_entity_core::{PersistenceError, PersistenceResult, Transaction, TransactionStatus};
use parking_lot::Mutex;

use crate::database::MemoryDatabase;
use crate::tables::Tables;

#[derive(Debug)]
struct TransactionState {
	status: TransactionStatus,
	workspace: Tables,
}

/// Transaction over a [`MemoryDatabase`].
///
/// Writes go to a private copy of the tables taken at [`MemoryDatabase::begin`],
/// which also records them. Commit replays the recorded writes onto the
/// committed tables as they are at that point, so writes made outside the
/// transaction in the meantime are kept. Rollback drops the copy.
#[derive(Debug)]
pub struct MemoryTransaction {
	database: MemoryDatabase,
	state: Mutex<TransactionState>,
	rollbacks: AtomicUsize,
}

impl MemoryTransaction {
	pub(crate) fn new(database: MemoryDatabase, snapshot: Tables) -> Self {
		Self {
			database,
			state: Mutex::new(TransactionState {
				status: TransactionStatus::Active,
				workspace: snapshot.journaled(),
			}),
			rollbacks: AtomicUsize::new(0),
		}
	}

	pub(crate) fn database(&self) -> &MemoryDatabase {
		&self.database
	}

	/// Replays the transaction's writes onto the committed tables.
	///
	/// When a replayed write violates a constraint against rows committed
	/// since [`MemoryDatabase::begin`], nothing is published and the
	/// transaction ends rolled back.
	pub async fn commit(&self) -> PersistenceResult<()> {
		let mut state = self.state.lock();
		if state.status.is_finished() {
			return Err(PersistenceError::TransactionFinished);
		}
		let changes = state.workspace.take_journal();
		state.workspace = Tables::default();
		let writes = changes.len();
		if let Err(error) = self.database.publish(changes) {
			state.status = TransactionStatus::RolledBack;
			tracing::warn!(%error, "Memory transaction conflicts with committed rows");
			return Err(error);
		}
		state.status = TransactionStatus::Committed;
		tracing::debug!(writes, "Committed memory transaction");
		Ok(())
	}

	/// How many times [`Transaction::rollback`] was called.
	pub fn rollback_count(&self) -> usize {
		self.rollbacks.load(Ordering::SeqCst)
	}

	/// Runs a write on a copy of the workspace, defining `tables` created
	/// after the transaction began.
	pub(crate) fn apply<T, F>(&self, tables: &[String], op: F) -> PersistenceResult<T>
	where
		F: FnOnce(&mut Tables) -> PersistenceResult<T>,
	{
		let mut state = self.state.lock();
		if state.status.is_finished() {
			return Err(PersistenceError::TransactionFinished);
		}
		let mut working = state.workspace.clone();
		for table in tables {
			working.define(table);
		}
		let value = op(&mut working)?;
		state.workspace = working;
		Ok(value)
	}

	pub(crate) fn view<T, F>(&self, tables: &[String], op: F) -> PersistenceResult<T>
	where
		F: FnOnce(&Tables) -> PersistenceResult<T>,
	{
		let mut state = self.state.lock();
		if state.status.is_finished() {
			return Err(PersistenceError::TransactionFinished);
		}
		for table in tables {
			state.workspace.define(table);
		}
		op(&state.workspace)
	}
}

#[async_trait]
impl Transaction for MemoryTransaction {
	fn status(&self) -> TransactionStatus {
		self.state.lock().status
	}

	async fn rollback(&self) -> PersistenceResult<()> {
		self.rollbacks.fetch_add(1, Ordering::SeqCst);
		let mut state = self.state.lock();
		if state.status.is_finished() {
			return Err(PersistenceError::TransactionFinished);
		}
		state.status = TransactionStatus::RolledBack;
		state.workspace = Tables::default();
		tracing::debug!("Rolled back memory transaction");
		Ok(())
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}
