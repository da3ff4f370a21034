//! Repository over one SQLite table.

use async_trait::async_trait;
use fake_entity_core::{
	FieldMap, KeyFilter, PersistenceError, PersistenceResult, RelationAttacher, Repository,
	Transaction,
};
use sqlx::{Connection, SqliteConnection};

use crate::database::{SqliteDatabase, primary_key_columns};
use crate::error::map_sqlx_error;
use crate::row::{bind_filter, bind_value, convert_row, quote, where_clause};

/// A has-many association resolved by updating the child's foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteAssociation {
	pub name: String,
	pub target_table: String,
	pub foreign_key: String,
	pub parent_key: String,
}

/// [`Repository`] and [`RelationAttacher`] for one table of a [`SqliteDatabase`].
#[derive(Debug, Clone)]
pub struct SqliteRepository {
	database: SqliteDatabase,
	table: String,
	primary_key: Vec<String>,
	associations: Vec<SqliteAssociation>,
}

impl SqliteRepository {
	pub(crate) fn new(database: SqliteDatabase, table: String, primary_key: Vec<String>) -> Self {
		Self {
			database,
			table,
			primary_key,
			associations: Vec::new(),
		}
	}

	/// Declares that `target_table.foreign_key` points at `parent_key` of
	/// this table, reachable as association `name`.
	pub fn with_association(
		mut self,
		name: impl Into<String>,
		target_table: impl Into<String>,
		foreign_key: impl Into<String>,
		parent_key: impl Into<String>,
	) -> Self {
		self.associations.push(SqliteAssociation {
			name: name.into(),
			target_table: target_table.into(),
			foreign_key: foreign_key.into(),
			parent_key: parent_key.into(),
		});
		self
	}

	pub fn table(&self) -> &str {
		&self.table
	}

	pub fn associations(&self) -> &[SqliteAssociation] {
		&self.associations
	}

	async fn insert(
		&self,
		conn: &mut SqliteConnection,
		fields: &FieldMap,
	) -> PersistenceResult<FieldMap> {
		let sql = if fields.is_empty() {
			format!("INSERT INTO {} DEFAULT VALUES RETURNING *", quote(&self.table))
		} else {
			let columns: Vec<_> = fields.keys().map(|column| quote(column)).collect();
			let placeholders = vec!["?"; fields.len()].join(", ");
			format!(
				"INSERT INTO {} ({}) VALUES ({}) RETURNING *",
				quote(&self.table),
				columns.join(", "),
				placeholders
			)
		};

		let mut query = sqlx::query(&sql);
		for value in fields.values() {
			query = bind_value(query, value);
		}
		let row = query
			.fetch_one(conn)
			.await
			.map_err(|error| map_sqlx_error(&self.table, error))?;
		convert_row(&row)
	}
}

#[async_trait]
impl Repository for SqliteRepository {
	fn entity_name(&self) -> &str {
		&self.table
	}

	fn primary_key_field_names(&self) -> Vec<String> {
		self.primary_key.clone()
	}

	async fn create(
		&self,
		fields: FieldMap,
		txn: Option<&dyn Transaction>,
	) -> PersistenceResult<FieldMap> {
		let mut handle = self.database.handle(txn).await?;
		self.insert(handle.connection()?, &fields).await
	}

	async fn bulk_create(
		&self,
		rows: Vec<FieldMap>,
		txn: Option<&dyn Transaction>,
	) -> PersistenceResult<Vec<FieldMap>> {
		if rows.is_empty() {
			return Ok(Vec::new());
		}
		tracing::trace!(table = %self.table, rows = rows.len(), "Bulk insert");

		let mut handle = self.database.handle(txn).await?;
		// A savepoint when already inside a transaction
		let mut batch = handle
			.connection()?
			.begin()
			.await
			.map_err(PersistenceError::backend)?;
		let mut created = Vec::with_capacity(rows.len());
		for row in &rows {
			created.push(self.insert(&mut *batch, row).await?);
		}
		batch.commit().await.map_err(PersistenceError::backend)?;
		Ok(created)
	}

	async fn destroy(
		&self,
		filters: &[KeyFilter],
		txn: Option<&dyn Transaction>,
	) -> PersistenceResult<u64> {
		if filters.is_empty() {
			return Ok(0);
		}
		let predicate = filters
			.iter()
			.map(|filter| format!("({})", where_clause(filter)))
			.collect::<Vec<_>>()
			.join(" OR ");
		let sql = format!("DELETE FROM {} WHERE {}", quote(&self.table), predicate);

		let mut query = sqlx::query(&sql);
		for filter in filters {
			query = bind_filter(query, filter);
		}
		let mut handle = self.database.handle(txn).await?;
		let result = query
			.execute(handle.connection()?)
			.await
			.map_err(|error| map_sqlx_error(&self.table, error))?;
		Ok(result.rows_affected())
	}

	async fn find_by_primary_key(
		&self,
		filter: &KeyFilter,
		txn: Option<&dyn Transaction>,
	) -> PersistenceResult<Option<FieldMap>> {
		let sql = format!(
			"SELECT * FROM {} WHERE {} LIMIT 1",
			quote(&self.table),
			where_clause(filter)
		);
		let mut handle = self.database.handle(txn).await?;
		let row = bind_filter(sqlx::query(&sql), filter)
			.fetch_optional(handle.connection()?)
			.await
			.map_err(PersistenceError::backend)?;
		row.as_ref().map(convert_row).transpose()
	}

	fn relation_attacher(&self) -> Option<&dyn RelationAttacher> {
		Some(self)
	}
}

#[async_trait]
impl RelationAttacher for SqliteRepository {
	async fn attach_many(
		&self,
		parent: &FieldMap,
		association: &str,
		children: &[FieldMap],
		txn: Option<&dyn Transaction>,
	) -> PersistenceResult<()> {
		let declared = self
			.associations
			.iter()
			.find(|declared| declared.name == association)
			.ok_or_else(|| PersistenceError::UnsupportedAssociation {
				entity: self.table.clone(),
				association: association.to_string(),
			})?;
		let parent_key = parent
			.get(&declared.parent_key)
			.filter(|value| !value.is_null())
			.ok_or_else(|| PersistenceError::NotNullViolation {
				table: self.table.clone(),
				column: declared.parent_key.clone(),
			})?;
		if children.is_empty() {
			return Ok(());
		}

		let mut handle = self.database.handle(txn).await?;
		let conn = handle.connection()?;
		let target_key = primary_key_columns(conn, &declared.target_table).await?;

		let mut batch = conn.begin().await.map_err(PersistenceError::backend)?;
		for child in children {
			let mut filter = KeyFilter::new();
			for column in &target_key {
				let value = child.get(column).ok_or_else(|| PersistenceError::NotNullViolation {
					table: declared.target_table.clone(),
					column: column.clone(),
				})?;
				filter = filter.and(column.clone(), value.clone());
			}

			let sql = format!(
				"UPDATE {} SET {} = ? WHERE {}",
				quote(&declared.target_table),
				quote(&declared.foreign_key),
				where_clause(&filter)
			);
			let query = bind_value(sqlx::query(&sql), parent_key);
			let result = bind_filter(query, &filter)
				.execute(&mut *batch)
				.await
				.map_err(|error| map_sqlx_error(&declared.target_table, error))?;
			if result.rows_affected() == 0 {
				return Err(PersistenceError::RowNotFound {
					table: declared.target_table.clone(),
					key: filter.to_string(),
				});
			}
		}
		batch.commit().await.map_err(PersistenceError::backend)?;

		tracing::trace!(
			table = %self.table,
			association,
			children = children.len(),
			"Attached children"
		);
		Ok(())
	}
}
