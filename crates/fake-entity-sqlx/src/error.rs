//! Mapping of sqlx errors onto [`PersistenceError`].

use fake_entity_core::PersistenceError;
use sqlx::error::ErrorKind;

/// Translates a driver error raised while writing to `table`.
///
/// SQLite reports constraint failures as `<KIND> constraint failed: t.a, t.b`,
/// the column list is recovered from that message.
pub(crate) fn map_sqlx_error(table: &str, error: sqlx::Error) -> PersistenceError {
	let Some(database_error) = error.as_database_error() else {
		return PersistenceError::backend(error);
	};
	let message = database_error.message().to_string();

	match database_error.kind() {
		ErrorKind::UniqueViolation => PersistenceError::UniqueViolation {
			table: table.to_string(),
			columns: constraint_columns(&message),
		},
		ErrorKind::NotNullViolation => PersistenceError::NotNullViolation {
			table: table.to_string(),
			column: constraint_columns(&message),
		},
		ErrorKind::ForeignKeyViolation => PersistenceError::ForeignKeyViolation {
			table: table.to_string(),
			detail: message,
		},
		_ => PersistenceError::backend(error),
	}
}

fn constraint_columns(message: &str) -> String {
	let Some((_, columns)) = message.split_once(": ") else {
		return message.to_string();
	};
	columns
		.split(',')
		.map(|column| {
			let column = column.trim();
			column
				.rsplit_once('.')
				.map_or(column, |(_, name)| name)
		})
		.collect::<Vec<_>>()
		.join(",")
}
