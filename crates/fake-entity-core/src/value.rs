//! Field maps, entity identities and key filters.
//!
//! Records cross the persistence boundary as [`FieldMap`]s. Typed entities are
//! produced from them with serde, which is why any
//! `Serialize + DeserializeOwned` type is an [`Entity`].

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered map of field name to value.
pub type FieldMap = serde_json::Map<String, Value>;

/// Marker for types a factory can produce.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Entity for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Converts a JSON object into a [`FieldMap`].
///
/// Anything other than an object yields an empty map.
///
/// # Examples
///
/// ```
/// use fake_entity_core::value::field_map;
/// use serde_json::json;
///
/// let fields = field_map(json!({"name": "Ada", "age": 36}));
/// assert_eq!(fields.len(), 2);
/// assert!(field_map(json!(42)).is_empty());
/// ```
pub fn field_map(value: Value) -> FieldMap {
	match value {
		Value::Object(map) => map,
		_ => FieldMap::new(),
	}
}

/// Returns true when a field is absent or explicitly null.
pub(crate) fn is_empty_value(value: Option<&Value>) -> bool {
	matches!(value, None | Some(Value::Null))
}

/// Identity of a persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
	/// Field name to value, one entry per key component.
	Composite(FieldMap),
	/// Value of the single primary key field.
	Scalar(Value),
}

impl EntityId {
	/// Builds a composite id from `(field, value)` pairs.
	///
	/// # Examples
	///
	/// ```
	/// use fake_entity_core::value::EntityId;
	///
	/// let id = EntityId::composite([("leaderId", 1), ("followerId", 2)]);
	/// assert!(id.is_composite());
	/// ```
	pub fn composite<K, V, I>(pairs: I) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
		I: IntoIterator<Item = (K, V)>,
	{
		Self::Composite(
			pairs
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		)
	}

	/// Returns true for composite ids.
	pub fn is_composite(&self) -> bool {
		matches!(self, Self::Composite(_))
	}

	/// Returns the scalar value, if this is a scalar id.
	pub fn as_scalar(&self) -> Option<&Value> {
		match self {
			Self::Scalar(value) => Some(value),
			Self::Composite(_) => None,
		}
	}

	/// Returns the value of one key component of a composite id.
	pub fn component(&self, field: &str) -> Option<&Value> {
		match self {
			Self::Composite(map) => map.get(field),
			Self::Scalar(_) => None,
		}
	}

	/// Compares two ids on the given key fields only.
	///
	/// Scalars compare by value. Composite ids match when every key field is
	/// present on both sides with equal values.
	pub fn matches(&self, other: &EntityId, key_fields: &[String]) -> bool {
		match (self, other) {
			(Self::Scalar(a), Self::Scalar(b)) => a == b,
			(Self::Composite(a), Self::Composite(b)) => key_fields.iter().all(|field| {
				match (a.get(field), b.get(field)) {
					(Some(x), Some(y)) => x == y,
					_ => false,
				}
			}),
			_ => false,
		}
	}
}

impl From<i64> for EntityId {
	fn from(value: i64) -> Self {
		Self::Scalar(value.into())
	}
}

impl From<i32> for EntityId {
	fn from(value: i32) -> Self {
		Self::Scalar(value.into())
	}
}

impl From<u64> for EntityId {
	fn from(value: u64) -> Self {
		Self::Scalar(value.into())
	}
}

impl From<&str> for EntityId {
	fn from(value: &str) -> Self {
		Self::Scalar(value.into())
	}
}

impl From<String> for EntityId {
	fn from(value: String) -> Self {
		Self::Scalar(value.into())
	}
}

impl From<FieldMap> for EntityId {
	fn from(value: FieldMap) -> Self {
		Self::Composite(value)
	}
}

/// Conjunction of `field = value` conditions on primary key fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyFilter {
	conditions: Vec<(String, Value)>,
}

impl KeyFilter {
	/// Creates an empty filter.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an equality condition.
	pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
		self.conditions.push((field.into(), value.into()));
		self
	}

	/// The conditions in insertion order.
	pub fn conditions(&self) -> &[(String, Value)] {
		&self.conditions
	}

	/// Returns true when the filter has no conditions.
	pub fn is_empty(&self) -> bool {
		self.conditions.is_empty()
	}

	/// Returns true when every condition holds for `record`.
	pub fn matches(&self, record: &FieldMap) -> bool {
		self.conditions
			.iter()
			.all(|(field, value)| record.get(field) == Some(value))
	}
}

impl fmt::Display for KeyFilter {
	/// `leaderId = 1 AND followerId = 2`
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (index, (field, value)) in self.conditions.iter().enumerate() {
			if index > 0 {
				f.write_str(" AND ")?;
			}
			write!(f, "{field} = {value}")?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	fn keys() -> Vec<String> {
		vec!["leaderId".to_string(), "followerId".to_string()]
	}

	#[rstest]
	fn test_composite_ids_match_ignoring_order_and_extras() {
		let a = EntityId::composite([("leaderId", 1), ("followerId", 2)]);
		let b = EntityId::Composite(field_map(
			json!({"followerId": 2, "leaderId": 1, "createdAt": "now"}),
		));
		assert!(a.matches(&b, &keys()));
	}

	#[rstest]
	#[case(json!({"leaderId": 1, "followerId": 3}))]
	#[case(json!({"leaderId": 1}))]
	fn test_composite_ids_do_not_match(#[case] other: Value) {
		let a = EntityId::composite([("leaderId", 1), ("followerId", 2)]);
		let b = EntityId::Composite(field_map(other));
		assert!(!a.matches(&b, &keys()));
	}

	#[rstest]
	fn test_key_filter_display() {
		let filter = KeyFilter::new().and("leaderId", 1).and("handle", "ada");
		assert_eq!(filter.to_string(), r#"leaderId = 1 AND handle = "ada""#);
	}

	#[rstest]
	fn test_scalar_and_composite_never_match() {
		let scalar = EntityId::from(1);
		let composite = EntityId::composite([("id", 1)]);
		assert!(!scalar.matches(&composite, &["id".to_string()]));
	}

	#[rstest]
	fn test_untagged_deserialization() {
		let scalar: EntityId = serde_json::from_value(json!(7)).unwrap();
		assert_eq!(scalar, EntityId::from(7));

		let composite: EntityId =
			serde_json::from_value(json!({"leaderId": 1, "followerId": 2})).unwrap();
		assert_eq!(composite.component("followerId"), Some(&json!(2)));
	}

	#[rstest]
	fn test_key_filter_matches_record() {
		let filter = KeyFilter::new().and("leaderId", 1).and("followerId", 2);
		let hit = field_map(json!({"leaderId": 1, "followerId": 2, "createdAt": "x"}));
		let miss = field_map(json!({"leaderId": 1, "followerId": 5}));
		assert!(filter.matches(&hit));
		assert!(!filter.matches(&miss));
	}

	#[rstest]
	fn test_is_empty_value() {
		let map = field_map(json!({"a": null, "b": 0}));
		assert!(is_empty_value(map.get("a")));
		assert!(is_empty_value(map.get("missing")));
		assert!(!is_empty_value(map.get("b")));
	}
}
