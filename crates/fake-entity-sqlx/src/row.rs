//! Conversion between JSON field values and SQLite rows.

use fake_entity_core::{FieldMap, KeyFilter, PersistenceError};
use serde_json::{Number, Value};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row as SqlxRow, Sqlite, TypeInfo};

pub(crate) type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Quotes an identifier for use in generated SQL.
pub(crate) fn quote(identifier: &str) -> String {
	format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// `"a" = ? AND "b" = ?` for one filter. An empty filter matches every row.
pub(crate) fn where_clause(filter: &KeyFilter) -> String {
	if filter.is_empty() {
		return "1 = 1".to_string();
	}
	filter
		.conditions()
		.iter()
		.map(|(column, _)| format!("{} = ?", quote(column)))
		.collect::<Vec<_>>()
		.join(" AND ")
}

/// Binds a JSON value, mapping it onto the closest SQLite storage class.
///
/// Arrays and objects are stored as their JSON text.
pub(crate) fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
	match value {
		Value::Null => query.bind(None::<i64>),
		Value::Bool(b) => query.bind(*b),
		Value::Number(n) => {
			if let Some(i) = n.as_i64() {
				query.bind(i)
			} else if let Some(f) = n.as_f64() {
				query.bind(f)
			} else {
				query.bind(n.to_string())
			}
		}
		Value::String(s) => query.bind(s.clone()),
		Value::Array(_) | Value::Object(_) => query.bind(value.to_string()),
	}
}

pub(crate) fn bind_filter<'q>(mut query: SqliteQuery<'q>, filter: &KeyFilter) -> SqliteQuery<'q> {
	for (_, value) in filter.conditions() {
		query = bind_value(query, value);
	}
	query
}

/// Converts a SQLite row into a field map.
pub(crate) fn convert_row(row: &SqliteRow) -> Result<FieldMap, PersistenceError> {
	let mut fields = FieldMap::new();

	for (idx, column) in row.columns().iter().enumerate() {
		let type_name = column.type_info().name().to_uppercase();

		let is_null = row.try_get::<Option<i64>, _>(idx).ok().flatten().is_none()
			&& row.try_get::<Option<f64>, _>(idx).ok().flatten().is_none()
			&& row.try_get::<Option<String>, _>(idx).ok().flatten().is_none()
			&& row.try_get::<Option<Vec<u8>>, _>(idx).ok().flatten().is_none();

		let value = if is_null {
			Value::Null
		} else if type_name == "BOOLEAN" || type_name == "BOOL" {
			row.try_get::<bool, _>(idx)
				.map(Value::Bool)
				.map_err(PersistenceError::backend)?
		} else if let Ok(i) = row.try_get::<i64, _>(idx) {
			Value::Number(i.into())
		} else if let Ok(f) = row.try_get::<f64, _>(idx) {
			Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
		} else if let Ok(s) = row.try_get::<String, _>(idx) {
			Value::String(s)
		} else {
			let bytes = row
				.try_get::<Vec<u8>, _>(idx)
				.map_err(PersistenceError::backend)?;
			Value::String(String::from_utf8_lossy(&bytes).into_owned())
		};

		fields.insert(column.name().to_string(), value);
	}

	Ok(fields)
}
