//! Row storage and constraint checks.

use std::collections::HashMap;

use fake_entity_core::{FieldMap, KeyFilter, PersistenceError, PersistenceResult};
use serde_json::Value;

use crate::schema::TableSchema;

#[derive(Debug, Clone)]
pub(crate) struct TableData {
	pub(crate) rows: Vec<FieldMap>,
	next_id: i64,
}

impl Default for TableData {
	fn default() -> Self {
		Self {
			rows: Vec::new(),
			next_id: 1,
		}
	}
}

/// A successful write, as recorded by a transaction workspace.
#[derive(Debug, Clone)]
pub(crate) enum Change {
	/// The stored row, generated values included.
	Insert { schema: TableSchema, row: FieldMap },
	Delete { table: String, filters: Vec<KeyFilter> },
	Update {
		table: String,
		filter: KeyFilter,
		column: String,
		value: Value,
	},
}

/// Every table of a database, or of a transaction workspace.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
	data: HashMap<String, TableData>,
	journal: Option<Vec<Change>>,
}

impl Tables {
	/// Starts recording every successful write.
	pub(crate) fn journaled(mut self) -> Self {
		self.journal = Some(Vec::new());
		self
	}

	pub(crate) fn take_journal(&mut self) -> Vec<Change> {
		self.journal.take().unwrap_or_default()
	}

	fn record(&mut self, change: Change) {
		if let Some(journal) = &mut self.journal {
			journal.push(change);
		}
	}

	/// Applies recorded writes in order, checking constraints again.
	pub(crate) fn replay(&mut self, changes: Vec<Change>) -> PersistenceResult<()> {
		for change in changes {
			match change {
				Change::Insert { schema, row } => {
					self.insert(&schema, row)?;
				}
				Change::Delete { table, filters } => {
					self.delete(&table, &filters)?;
				}
				Change::Update {
					table,
					filter,
					column,
					value,
				} => {
					self.update(&table, &filter, &column, &value)?;
				}
			}
		}
		Ok(())
	}

	pub(crate) fn define(&mut self, table: &str) {
		self.data.entry(table.to_string()).or_default();
	}

	pub(crate) fn rows(&self, table: &str) -> PersistenceResult<&[FieldMap]> {
		self.data
			.get(table)
			.map(|data| data.rows.as_slice())
			.ok_or_else(|| PersistenceError::UnknownTable(table.to_string()))
	}

	fn table_mut(&mut self, table: &str) -> PersistenceResult<&mut TableData> {
		self.data
			.get_mut(table)
			.ok_or_else(|| PersistenceError::UnknownTable(table.to_string()))
	}

	/// Validates and stores one row, returning it with generated values.
	pub(crate) fn insert(&mut self, schema: &TableSchema, mut row: FieldMap) -> PersistenceResult<FieldMap> {
		let table = self.table_mut(&schema.table)?;
		if schema.generates_id() {
			let column = &schema.primary_key[0];
			match row.get(column) {
				None | Some(Value::Null) => {
					row.insert(column.clone(), Value::from(table.next_id));
					table.next_id += 1;
				}
				Some(value) => {
					if let Some(id) = value.as_i64() {
						table.next_id = table.next_id.max(id + 1);
					}
				}
			}
		}

		for column in schema.primary_key.iter().chain(&schema.required) {
			if matches!(row.get(column), None | Some(Value::Null)) {
				return Err(PersistenceError::NotNullViolation {
					table: schema.table.clone(),
					column: column.clone(),
				});
			}
		}

		let existing = self.rows(&schema.table)?;
		for columns in std::iter::once(&schema.primary_key).chain(&schema.unique) {
			let values: Option<Vec<&Value>> = columns
				.iter()
				.map(|column| row.get(column).filter(|value| !value.is_null()))
				.collect();
			let Some(values) = values else {
				continue;
			};
			let taken = existing.iter().any(|other| {
				columns
					.iter()
					.zip(&values)
					.all(|(column, value)| other.get(column) == Some(*value))
			});
			if taken {
				return Err(PersistenceError::UniqueViolation {
					table: schema.table.clone(),
					columns: columns.join(","),
				});
			}
		}

		for foreign_key in &schema.foreign_keys {
			let Some(value) = row.get(&foreign_key.column).filter(|value| !value.is_null()) else {
				continue;
			};
			let referenced = self.rows(&foreign_key.references_table)?;
			if !referenced
				.iter()
				.any(|other| other.get(&foreign_key.references_column) == Some(value))
			{
				return Err(PersistenceError::ForeignKeyViolation {
					table: schema.table.clone(),
					detail: format!(
						"{} references missing {} row",
						foreign_key.column, foreign_key.references_table
					),
				});
			}
		}

		self.table_mut(&schema.table)?.rows.push(row.clone());
		self.record(Change::Insert {
			schema: schema.clone(),
			row: row.clone(),
		});
		Ok(row)
	}

	/// Removes rows matching any filter, returning how many were removed.
	pub(crate) fn delete(&mut self, table: &str, filters: &[KeyFilter]) -> PersistenceResult<u64> {
		let data = self.table_mut(table)?;
		let before = data.rows.len();
		data.rows
			.retain(|row| !filters.iter().any(|filter| filter.matches(row)));
		let removed = (before - data.rows.len()) as u64;
		self.record(Change::Delete {
			table: table.to_string(),
			filters: filters.to_vec(),
		});
		Ok(removed)
	}

	pub(crate) fn find(&self, table: &str, filter: &KeyFilter) -> PersistenceResult<Option<FieldMap>> {
		Ok(self
			.rows(table)?
			.iter()
			.find(|row| filter.matches(row))
			.cloned())
	}

	/// Sets `column` to `value` on rows matching `filter`.
	pub(crate) fn update(
		&mut self,
		table: &str,
		filter: &KeyFilter,
		column: &str,
		value: &Value,
	) -> PersistenceResult<u64> {
		let mut updated = 0;
		for row in self.table_mut(table)?.rows.iter_mut() {
			if filter.matches(row) {
				row.insert(column.to_string(), value.clone());
				updated += 1;
			}
		}
		self.record(Change::Update {
			table: table.to_string(),
			filter: filter.clone(),
			column: column.to_string(),
			value: value.clone(),
		});
		Ok(updated)
	}
}
