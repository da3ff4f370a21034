//! Shared in-memory database handle.

use std::collections::HashMap;
use std::sync::Arc;

use fake_entity_core::{FieldMap, PersistenceError, PersistenceResult, Transaction};
use parking_lot::RwLock;

use crate::repository::MemoryRepository;
use crate::schema::TableSchema;
use crate::tables::{Change, Tables};
use crate::transaction::MemoryTransaction;

#[derive(Debug, Default)]
struct DatabaseInner {
	committed: RwLock<Tables>,
	schemas: RwLock<HashMap<String, TableSchema>>,
}

/// In-memory database with multi-table constraints and snapshot transactions.
///
/// Cloning the handle shares the underlying tables.
///
/// Every write is atomic: it runs against a copy of the tables and the copy
/// replaces the original only when the whole operation succeeded. Outside a
/// transaction the copy is the committed state, inside one it is the
/// transaction's workspace.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
	inner: Arc<DatabaseInner>,
}

impl MemoryDatabase {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a table, replacing any previous schema with the same name.
	/// Existing rows are kept.
	pub fn define_table(&self, schema: TableSchema) -> &Self {
		tracing::debug!(table = %schema.table, primary_key = ?schema.primary_key, "Defining memory table");
		self.inner.committed.write().define(&schema.table);
		self.inner
			.schemas
			.write()
			.insert(schema.table.clone(), schema);
		self
	}

	/// Repository over one defined table.
	pub fn repository(&self, table: &str) -> PersistenceResult<MemoryRepository> {
		Ok(MemoryRepository::new(self.clone(), self.schema(table)?))
	}

	/// Starts a transaction working on a snapshot of the committed tables.
	pub fn begin(&self) -> MemoryTransaction {
		MemoryTransaction::new(self.clone(), self.inner.committed.read().clone())
	}

	/// Committed rows of a table.
	pub fn rows(&self, table: &str) -> PersistenceResult<Vec<FieldMap>> {
		Ok(self.inner.committed.read().rows(table)?.to_vec())
	}

	/// Number of committed rows, zero for unknown tables.
	pub fn count_rows(&self, table: &str) -> usize {
		self.inner
			.committed
			.read()
			.rows(table)
			.map(<[FieldMap]>::len)
			.unwrap_or(0)
	}

	pub(crate) fn schema(&self, table: &str) -> PersistenceResult<TableSchema> {
		self.inner
			.schemas
			.read()
			.get(table)
			.cloned()
			.ok_or_else(|| PersistenceError::UnknownTable(table.to_string()))
	}

	pub(crate) fn same_database(&self, other: &MemoryDatabase) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	/// Replays a transaction's writes onto the committed tables, all or nothing.
	pub(crate) fn publish(&self, changes: Vec<Change>) -> PersistenceResult<()> {
		let mut committed = self.inner.committed.write();
		let mut working = committed.clone();
		working.replay(changes)?;
		*committed = working;
		Ok(())
	}

	fn table_names(&self) -> Vec<String> {
		self.inner.schemas.read().keys().cloned().collect()
	}

	/// Recovers this backend's transaction from an opaque handle.
	fn resolve<'a>(
		&self,
		txn: Option<&'a dyn Transaction>,
	) -> PersistenceResult<Option<&'a MemoryTransaction>> {
		let Some(txn) = txn else {
			return Ok(None);
		};
		let txn = txn
			.as_any()
			.downcast_ref::<MemoryTransaction>()
			.ok_or(PersistenceError::ForeignTransaction)?;
		if !txn.database().same_database(self) {
			return Err(PersistenceError::ForeignTransaction);
		}
		Ok(Some(txn))
	}

	/// Runs a write atomically, in `txn` when given.
	pub(crate) fn write<T, F>(&self, txn: Option<&dyn Transaction>, op: F) -> PersistenceResult<T>
	where
		F: FnOnce(&mut Tables) -> PersistenceResult<T>,
	{
		if let Some(txn) = self.resolve(txn)? {
			return txn.apply(&self.table_names(), op);
		}
		let mut committed = self.inner.committed.write();
		let mut working = committed.clone();
		let value = op(&mut working)?;
		*committed = working;
		Ok(value)
	}

	/// Runs a read, seeing `txn`'s uncommitted writes when given.
	pub(crate) fn read<T, F>(&self, txn: Option<&dyn Transaction>, op: F) -> PersistenceResult<T>
	where
		F: FnOnce(&Tables) -> PersistenceResult<T>,
	{
		if let Some(txn) = self.resolve(txn)? {
			return txn.view(&self.table_names(), op);
		}
		op(&self.inner.committed.read())
	}
}
