//! Repository over one in-memory table.

use async_trait::async_trait;
use fake_entity_core::{
	FieldMap, KeyFilter, PersistenceError, PersistenceResult, RelationAttacher, Repository,
	Transaction,
};

use crate::database::MemoryDatabase;
use crate::schema::TableSchema;

/// [`Repository`] and [`RelationAttacher`] for one table of a [`MemoryDatabase`].
#[derive(Debug, Clone)]
pub struct MemoryRepository {
	database: MemoryDatabase,
	schema: TableSchema,
}

impl MemoryRepository {
	pub(crate) fn new(database: MemoryDatabase, schema: TableSchema) -> Self {
		Self { database, schema }
	}

	pub fn schema(&self) -> &TableSchema {
		&self.schema
	}
}

#[async_trait]
impl Repository for MemoryRepository {
	fn entity_name(&self) -> &str {
		&self.schema.table
	}

	fn primary_key_field_names(&self) -> Vec<String> {
		self.schema.primary_key.clone()
	}

	async fn create(
		&self,
		fields: FieldMap,
		txn: Option<&dyn Transaction>,
	) -> PersistenceResult<FieldMap> {
		self.database
			.write(txn, |tables| tables.insert(&self.schema, fields))
	}

	async fn bulk_create(
		&self,
		rows: Vec<FieldMap>,
		txn: Option<&dyn Transaction>,
	) -> PersistenceResult<Vec<FieldMap>> {
		tracing::trace!(table = %self.schema.table, rows = rows.len(), "Bulk insert");
		self.database.write(txn, |tables| {
			rows.into_iter()
				.map(|row| tables.insert(&self.schema, row))
				.collect()
		})
	}

	async fn destroy(
		&self,
		filters: &[KeyFilter],
		txn: Option<&dyn Transaction>,
	) -> PersistenceResult<u64> {
		self.database
			.write(txn, |tables| tables.delete(&self.schema.table, filters))
	}

	async fn find_by_primary_key(
		&self,
		filter: &KeyFilter,
		txn: Option<&dyn Transaction>,
	) -> PersistenceResult<Option<FieldMap>> {
		self.database
			.read(txn, |tables| tables.find(&self.schema.table, filter))
	}

	fn relation_attacher(&self) -> Option<&dyn RelationAttacher> {
		Some(self)
	}
}

#[async_trait]
impl RelationAttacher for MemoryRepository {
	async fn attach_many(
		&self,
		parent: &FieldMap,
		association: &str,
		children: &[FieldMap],
		txn: Option<&dyn Transaction>,
	) -> PersistenceResult<()> {
		let declared = self.schema.association(association).ok_or_else(|| {
			PersistenceError::UnsupportedAssociation {
				entity: self.schema.table.clone(),
				association: association.to_string(),
			}
		})?;
		let parent_key = parent.get(&declared.parent_key).ok_or_else(|| {
			PersistenceError::NotNullViolation {
				table: self.schema.table.clone(),
				column: declared.parent_key.clone(),
			}
		})?;
		let target = self.database.schema(&declared.target_table)?;

		let mut filters = Vec::with_capacity(children.len());
		for child in children {
			let mut filter = KeyFilter::new();
			for column in &target.primary_key {
				let value = child.get(column).ok_or_else(|| PersistenceError::NotNullViolation {
					table: target.table.clone(),
					column: column.clone(),
				})?;
				filter = filter.and(column.clone(), value.clone());
			}
			filters.push(filter);
		}

		self.database.write(txn, |tables| {
			for filter in &filters {
				let updated =
					tables.update(&target.table, filter, &declared.foreign_key, parent_key)?;
				if updated == 0 {
					return Err(PersistenceError::RowNotFound {
						table: target.table.clone(),
						key: filter.to_string(),
					});
				}
			}
			Ok(())
		})
	}
}
