//! Primary key resolution for single and composite keys.
//!
//! [`KeyResolver`] knows the ordered key fields of one entity type. It
//! extracts identities from stored records, validates caller supplied key
//! values, and turns identities into [`KeyFilter`]s for the repository.

use serde_json::Value;

use crate::error::{FactoryError, FactoryResult, IdentityError};
use crate::value::{EntityId, FieldMap, KeyFilter, is_empty_value};

/// Primary key description of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyResolver {
	entity: String,
	fields: Vec<String>,
}

impl KeyResolver {
	/// Creates a resolver. Fails when no key field is known.
	pub fn new(entity: impl Into<String>, fields: Vec<String>) -> FactoryResult<Self> {
		let entity = entity.into();
		if fields.is_empty() {
			return Err(FactoryError::Configuration(format!(
				"No primary key columns found for entity {entity}"
			)));
		}
		Ok(Self { entity, fields })
	}

	pub fn entity(&self) -> &str {
		&self.entity
	}

	/// Key fields in declaration order, never empty.
	pub fn id_field_names(&self) -> &[String] {
		&self.fields
	}

	pub fn has_composite_id(&self) -> bool {
		self.fields.len() > 1
	}

	/// Extracts the identity of a stored record.
	///
	/// Missing and null components are both rejected.
	pub fn get_id(&self, record: &FieldMap) -> Result<EntityId, IdentityError> {
		if self.has_composite_id() {
			return self.pick_keys(record).map(EntityId::Composite);
		}
		let field = &self.fields[0];
		match record.get(field) {
			Some(value) if !value.is_null() => Ok(EntityId::Scalar(value.clone())),
			_ => Err(self.missing(field)),
		}
	}

	/// Copies every key field of `record` into a new map.
	pub fn pick_keys(&self, record: &FieldMap) -> Result<FieldMap, IdentityError> {
		let mut keys = FieldMap::new();
		for field in &self.fields {
			let value = record.get(field);
			if is_empty_value(value) {
				return Err(self.missing(field));
			}
			keys.insert(field.clone(), value.cloned().unwrap_or(Value::Null));
		}
		Ok(keys)
	}

	/// Validates caller supplied key values and builds a filter from them.
	///
	/// Every field must be a declared key field.
	pub fn build_key_where(&self, key_values: &FieldMap) -> Result<KeyFilter, IdentityError> {
		let mut filter = KeyFilter::new();
		for (field, value) in key_values {
			if !self.fields.contains(field) {
				return Err(IdentityError::InvalidKeyField {
					entity: self.entity.clone(),
					field: field.clone(),
				});
			}
			filter = filter.and(field.clone(), value.clone());
		}
		Ok(filter)
	}

	/// Builds the filter selecting exactly the record with this identity.
	pub fn filter_for(&self, id: &EntityId) -> Result<KeyFilter, IdentityError> {
		match id {
			EntityId::Scalar(value) => {
				if self.has_composite_id() {
					return Err(IdentityError::ScalarForCompositeKey {
						entity: self.entity.clone(),
					});
				}
				if value.is_null() {
					return Err(self.missing(&self.fields[0]));
				}
				Ok(KeyFilter::new().and(self.fields[0].clone(), value.clone()))
			}
			EntityId::Composite(map) => {
				let picked = self.pick_keys(map)?;
				self.build_key_where(&picked)
			}
		}
	}

	/// Compares two identities on the key fields.
	pub fn same_identity(&self, a: &EntityId, b: &EntityId) -> bool {
		a.matches(b, &self.fields)
	}

	fn missing(&self, field: &str) -> IdentityError {
		IdentityError::MissingKeyField {
			entity: self.entity.clone(),
			field: field.to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::value::field_map;
	use rstest::{fixture, rstest};
	use serde_json::json;

	#[fixture]
	fn follower() -> KeyResolver {
		KeyResolver::new(
			"Follower",
			vec!["leaderId".to_string(), "followerId".to_string()],
		)
		.unwrap()
	}

	#[fixture]
	fn user() -> KeyResolver {
		KeyResolver::new("User", vec!["id".to_string()]).unwrap()
	}

	#[rstest]
	fn test_no_key_fields_is_configuration_error() {
		let error = KeyResolver::new("Orphan", Vec::new()).unwrap_err();
		assert!(matches!(error, FactoryError::Configuration(_)));
	}

	#[rstest]
	fn test_composite_get_id(follower: KeyResolver) {
		let record = field_map(json!({"leaderId": 1, "followerId": 2, "createdAt": "now"}));
		let id = follower.get_id(&record).unwrap();
		assert_eq!(id, EntityId::composite([("leaderId", 1), ("followerId", 2)]));
		assert!(follower.has_composite_id());
	}

	#[rstest]
	#[case(json!({"leaderId": 1}))]
	#[case(json!({"leaderId": 1, "followerId": null}))]
	fn test_composite_missing_component(follower: KeyResolver, #[case] record: Value) {
		let error = follower.get_id(&field_map(record)).unwrap_err();
		assert_eq!(
			error,
			IdentityError::MissingKeyField {
				entity: "Follower".to_string(),
				field: "followerId".to_string(),
			}
		);
	}

	#[rstest]
	fn test_scalar_get_id(user: KeyResolver) {
		let id = user.get_id(&field_map(json!({"id": 5, "email": "a@b.c"}))).unwrap();
		assert_eq!(id, EntityId::from(5));
		assert!(!user.has_composite_id());
	}

	#[rstest]
	#[case(json!({"email": "a@b.c"}))]
	#[case(json!({"id": null}))]
	fn test_scalar_missing(user: KeyResolver, #[case] record: Value) {
		assert!(user.get_id(&field_map(record)).is_err());
	}

	#[rstest]
	fn test_build_key_where_rejects_unknown_field(follower: KeyResolver) {
		let error = follower
			.build_key_where(&field_map(json!({"leaderId": 1, "invalidField": 2})))
			.unwrap_err();
		assert_eq!(
			error.to_string(),
			"Invalid primary key field \"invalidField\" for entity Follower"
		);
	}

	#[rstest]
	fn test_filter_for_composite_ignores_extra_fields(follower: KeyResolver) {
		let id = EntityId::Composite(field_map(
			json!({"followerId": 2, "leaderId": 1, "createdAt": "x"}),
		));
		let filter = follower.filter_for(&id).unwrap();
		assert_eq!(
			filter,
			KeyFilter::new().and("leaderId", 1).and("followerId", 2)
		);
	}

	#[rstest]
	fn test_filter_for_scalar_on_composite_key(follower: KeyResolver) {
		let error = follower.filter_for(&EntityId::from(1)).unwrap_err();
		assert!(matches!(error, IdentityError::ScalarForCompositeKey { .. }));
	}
}
