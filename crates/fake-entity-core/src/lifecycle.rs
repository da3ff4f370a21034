//! Tracking, lookup and deletion of created entities.

use crate::error::{FactoryError, FactoryResult};
use crate::factory::FakeEntityFactory;
use crate::repository::Transaction;
use crate::transaction::with_transaction;
use crate::value::{Entity, EntityId, FieldMap, KeyFilter};

impl<E: Entity> FakeEntityFactory<E> {
	/// Identities of the entities created and not yet deleted, oldest first.
	pub fn entity_ids(&self) -> Vec<EntityId> {
		self.inner.state.lock().entity_ids.clone()
	}

	pub fn entity_count(&self) -> usize {
		self.inner.state.lock().entity_ids.len()
	}

	/// Identity of a record, scalar or composite.
	pub fn get_id_of(&self, record: &FieldMap) -> FactoryResult<EntityId> {
		Ok(self.inner.keys.get_id(record)?)
	}

	/// Identity of an entity, read from its serialized form.
	pub fn get_id(&self, entity: &E) -> FactoryResult<EntityId> {
		let record = self.encode(entity)?;
		self.get_id_of(&record)
	}

	/// Key fields of `record` only.
	pub fn pick_keys(&self, record: &FieldMap) -> FactoryResult<FieldMap> {
		Ok(self.inner.keys.pick_keys(record)?)
	}

	/// Validates `key_values` against the key fields and builds a filter.
	pub fn build_key_where(&self, key_values: &FieldMap) -> FactoryResult<KeyFilter> {
		Ok(self.inner.keys.build_key_where(key_values)?)
	}

	/// Deletes every tracked entity. Returns the number of deleted rows.
	///
	/// Does not touch the repository when nothing is tracked.
	pub async fn cleanup(&self, txn: Option<&dyn Transaction>) -> FactoryResult<u64> {
		let ids = self.entity_ids();
		if ids.is_empty() {
			return Ok(0);
		}
		self.delete(&ids, txn).await
	}

	/// Deletes exactly the given entities in one repository call.
	///
	/// Deleted ids stop being tracked. The returned count comes from the
	/// repository and is lower than `ids.len()` when some rows did not exist.
	pub async fn delete(
		&self,
		ids: &[EntityId],
		txn: Option<&dyn Transaction>,
	) -> FactoryResult<u64> {
		if ids.is_empty() {
			return Ok(0);
		}
		let affected = with_transaction(txn, self.entity_name(), async {
			let filters = ids
				.iter()
				.map(|id| self.inner.keys.filter_for(id))
				.collect::<Result<Vec<_>, _>>()?;
			Ok::<_, FactoryError>(self.inner.repository.destroy(&filters, txn).await?)
		})
		.await?;

		let keys = &self.inner.keys;
		self.inner
			.state
			.lock()
			.entity_ids
			.retain(|tracked| !ids.iter().any(|id| keys.same_identity(tracked, id)));

		tracing::debug!(
			entity = self.entity_name(),
			requested = ids.len(),
			affected,
			"Deleted entities"
		);
		Ok(affected)
	}

	/// Re-fetches the entity tracked at `index`. `None` when out of range or
	/// no longer stored.
	pub async fn get_entity_at(
		&self,
		index: usize,
		txn: Option<&dyn Transaction>,
	) -> FactoryResult<Option<E>> {
		let id = self.inner.state.lock().entity_ids.get(index).cloned();
		match id {
			Some(id) => self.find_by_id(&id, txn).await,
			None => Ok(None),
		}
	}

	/// Fetches an entity by identity.
	pub async fn find_by_id(
		&self,
		id: &EntityId,
		txn: Option<&dyn Transaction>,
	) -> FactoryResult<Option<E>> {
		let filter = self.inner.keys.filter_for(id)?;
		self.find_by_filter(filter, txn).await
	}

	/// Fetches an entity by key values, e.g. `{"leaderId": 1, "followerId": 2}`.
	///
	/// Every field must be a key field.
	pub async fn find_by_key_values(
		&self,
		key_values: &FieldMap,
		txn: Option<&dyn Transaction>,
	) -> FactoryResult<Option<E>> {
		let filter = self.build_key_where(key_values)?;
		self.find_by_filter(filter, txn).await
	}

	async fn find_by_filter(
		&self,
		filter: KeyFilter,
		txn: Option<&dyn Transaction>,
	) -> FactoryResult<Option<E>> {
		let record = with_transaction(txn, self.entity_name(), async {
			Ok::<_, FactoryError>(self.inner.repository.find_by_primary_key(&filter, txn).await?)
		})
		.await?;
		record.map(|record| self.decode(record)).transpose()
	}
}
