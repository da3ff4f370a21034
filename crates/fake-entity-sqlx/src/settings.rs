//! Connection settings for the SQLite backend.

use std::str::FromStr;
use std::time::Duration;

use fake_entity_core::{FactoryError, FactoryResult};
use serde::{Deserialize, Serialize};

/// Environment variable holding the database URL.
pub const DATABASE_URL_VAR: &str = "FAKE_ENTITY_DATABASE_URL";
/// Environment variable holding the pool size.
pub const MAX_CONNECTIONS_VAR: &str = "FAKE_ENTITY_MAX_CONNECTIONS";
/// Environment variable holding the busy timeout in milliseconds.
pub const BUSY_TIMEOUT_VAR: &str = "FAKE_ENTITY_BUSY_TIMEOUT_MS";

/// SQLite connection settings
///
/// `sqlite::memory:` databases live inside a single connection, so the
/// default pool holds exactly one.
///
/// # Examples
///
/// ```
/// use fake_entity_sqlx::SqliteSettings;
///
/// let settings: SqliteSettings =
/// 	serde_json::from_str(r#"{"database_url": "sqlite://test.db"}"#).unwrap();
///
/// assert_eq!(settings.database_url, "sqlite://test.db");
/// assert_eq!(settings.max_connections, 1);
/// assert!(settings.foreign_keys);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteSettings {
	/// Database URL, e.g. `sqlite://path/to/file.db` or `sqlite::memory:`
	pub database_url: String,

	/// Maximum number of pooled connections
	pub max_connections: u32,

	/// How long a connection waits on a locked database
	pub busy_timeout_ms: u64,

	/// Enforce foreign key constraints
	pub foreign_keys: bool,

	/// Create the database file when it does not exist
	pub create_if_missing: bool,
}

impl Default for SqliteSettings {
	fn default() -> Self {
		Self {
			database_url: "sqlite::memory:".to_string(),
			max_connections: 1,
			busy_timeout_ms: 5000,
			foreign_keys: true,
			create_if_missing: true,
		}
	}
}

impl SqliteSettings {
	/// Settings for the given URL, defaults elsewhere.
	pub fn new(database_url: impl Into<String>) -> Self {
		Self {
			database_url: database_url.into(),
			..Self::default()
		}
	}

	/// Settings for an on-disk database file.
	pub fn file(path: impl AsRef<std::path::Path>) -> Self {
		Self::new(format!("sqlite://{}", path.as_ref().display()))
	}

	pub fn with_max_connections(mut self, max_connections: u32) -> Self {
		self.max_connections = max_connections;
		self
	}

	pub fn with_busy_timeout_ms(mut self, busy_timeout_ms: u64) -> Self {
		self.busy_timeout_ms = busy_timeout_ms;
		self
	}

	pub fn with_foreign_keys(mut self, foreign_keys: bool) -> Self {
		self.foreign_keys = foreign_keys;
		self
	}

	/// Reads the `FAKE_ENTITY_*` environment variables over the defaults.
	pub fn from_env() -> FactoryResult<Self> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Same as [`Self::from_env`] with a custom variable source.
	pub fn from_lookup<F>(lookup: F) -> FactoryResult<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let mut settings = Self::default();
		if let Some(url) = lookup(DATABASE_URL_VAR).filter(|url| !url.trim().is_empty()) {
			settings.database_url = url;
		}
		if let Some(value) = lookup(MAX_CONNECTIONS_VAR) {
			settings.max_connections = parse_var(MAX_CONNECTIONS_VAR, &value)?;
		}
		if let Some(value) = lookup(BUSY_TIMEOUT_VAR) {
			settings.busy_timeout_ms = parse_var(BUSY_TIMEOUT_VAR, &value)?;
		}
		if settings.max_connections == 0 {
			return Err(FactoryError::Configuration(format!(
				"{MAX_CONNECTIONS_VAR} must be at least 1"
			)));
		}
		Ok(settings)
	}

	pub fn busy_timeout(&self) -> Duration {
		Duration::from_millis(self.busy_timeout_ms)
	}

	/// True for databases that only live inside their connection.
	pub fn is_in_memory(&self) -> bool {
		self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
	}
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> FactoryResult<T> {
	value.trim().parse().map_err(|_| {
		FactoryError::Configuration(format!("Invalid value for {key}: {value:?}"))
	})
}
