//! Connection pool wrapper and transaction resolution.

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use fake_entity_core::{PersistenceError, PersistenceResult, Transaction};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection};
use tokio::sync::MutexGuard;

use crate::repository::SqliteRepository;
use crate::row::quote;
use crate::settings::SqliteSettings;
use crate::transaction::{SqliteTransaction, SqlxTransaction};

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(1);

/// A SQLite connection pool the repositories and transactions share.
///
/// Cloning the handle shares the pool.
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
	pool: SqlitePool,
	id: usize,
}

impl SqliteDatabase {
	/// Opens a pool according to `settings`.
	///
	/// # Examples
	///
	/// ```
	/// use fake_entity_core::Repository;
	/// use fake_entity_sqlx::{SqliteDatabase, SqliteSettings};
	///
	/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
	/// let db = SqliteDatabase::connect(SqliteSettings::default()).await?;
	/// db.execute("CREATE TABLE roles (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
	/// 	.await?;
	///
	/// let roles = db.repository("roles").await?;
	/// assert_eq!(roles.primary_key_field_names(), vec!["id".to_string()]);
	/// # Ok(())
	/// # }
	/// # tokio::runtime::Runtime::new().unwrap().block_on(example()).unwrap();
	/// ```
	pub async fn connect(settings: SqliteSettings) -> PersistenceResult<Self> {
		let mut options = SqliteConnectOptions::from_str(&settings.database_url)
			.map_err(PersistenceError::backend)?
			.create_if_missing(settings.create_if_missing)
			.foreign_keys(settings.foreign_keys)
			.busy_timeout(settings.busy_timeout());
		if !settings.is_in_memory() {
			options = options.journal_mode(SqliteJournalMode::Wal);
		}

		// In-memory databases vanish with their connection, so connections
		// are never retired.
		let pool = SqlitePoolOptions::new()
			.max_connections(settings.max_connections)
			.idle_timeout(None)
			.max_lifetime(None)
			.connect_with(options)
			.await
			.map_err(PersistenceError::backend)?;

		tracing::debug!(
			url = %settings.database_url,
			max_connections = settings.max_connections,
			"Connected SQLite pool"
		);
		Ok(Self::from_pool(pool))
	}

	/// Wraps an existing pool.
	pub fn from_pool(pool: SqlitePool) -> Self {
		Self {
			pool,
			id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
		}
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	/// Runs raw SQL, typically schema setup. Multiple statements are allowed.
	pub async fn execute(&self, sql: &str) -> PersistenceResult<()> {
		sqlx::raw_sql(sql)
			.execute(&self.pool)
			.await
			.map_err(PersistenceError::backend)?;
		Ok(())
	}

	/// Repository over `table`, with the primary key read from the schema.
	pub async fn repository(&self, table: &str) -> PersistenceResult<SqliteRepository> {
		let mut conn = self.pool.acquire().await.map_err(PersistenceError::backend)?;
		let primary_key = primary_key_columns(&mut *conn, table).await?;
		tracing::debug!(table, ?primary_key, "Detected primary key");
		Ok(SqliteRepository::new(
			self.clone(),
			table.to_string(),
			primary_key,
		))
	}

	/// Starts a transaction holding one pooled connection until it finishes.
	pub async fn begin(&self) -> PersistenceResult<SqliteTransaction> {
		let tx = self.pool.begin().await.map_err(PersistenceError::backend)?;
		Ok(SqliteTransaction::new(self.id, tx))
	}

	/// Number of rows in `table`, read outside any transaction.
	pub async fn count_rows(&self, table: &str) -> PersistenceResult<i64> {
		let sql = format!("SELECT COUNT(*) FROM {}", quote(table));
		sqlx::query_scalar::<_, i64>(&sql)
			.fetch_one(&self.pool)
			.await
			.map_err(PersistenceError::backend)
	}

	/// Closes every pooled connection.
	pub async fn close(&self) {
		self.pool.close().await;
	}

	/// Connection for one repository call: the transaction's when given,
	/// otherwise a pooled one.
	pub(crate) async fn handle<'a>(
		&self,
		txn: Option<&'a dyn Transaction>,
	) -> PersistenceResult<Handle<'a>> {
		match txn {
			None => Ok(Handle::Pooled(
				self.pool.acquire().await.map_err(PersistenceError::backend)?,
			)),
			Some(txn) => {
				let txn = txn
					.as_any()
					.downcast_ref::<SqliteTransaction>()
					.filter(|txn| txn.pool_id() == self.id)
					.ok_or(PersistenceError::ForeignTransaction)?;
				Ok(Handle::Transaction(txn.lock().await))
			}
		}
	}
}

pub(crate) enum Handle<'a> {
	Pooled(PoolConnection<Sqlite>),
	Transaction(MutexGuard<'a, Option<SqlxTransaction>>),
}

impl Handle<'_> {
	pub(crate) fn connection(&mut self) -> PersistenceResult<&mut SqliteConnection> {
		match self {
			Self::Pooled(conn) => Ok(&mut **conn),
			Self::Transaction(guard) => guard
				.as_mut()
				.map(|tx| &mut **tx)
				.ok_or(PersistenceError::TransactionFinished),
		}
	}
}

/// Primary key columns of `table` in key order.
pub(crate) async fn primary_key_columns(
	conn: &mut SqliteConnection,
	table: &str,
) -> PersistenceResult<Vec<String>> {
	let mut columns: Vec<(String, i64)> =
		sqlx::query_as("SELECT name, pk FROM pragma_table_info(?)")
			.bind(table)
			.fetch_all(&mut *conn)
			.await
			.map_err(PersistenceError::backend)?;
	if columns.is_empty() {
		return Err(PersistenceError::UnknownTable(table.to_string()));
	}

	columns.retain(|(_, pk)| *pk > 0);
	columns.sort_by_key(|(_, pk)| *pk);
	Ok(columns.into_iter().map(|(name, _)| name).collect())
}
