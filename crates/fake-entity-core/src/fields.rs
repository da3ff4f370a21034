//! Default field generation and final field resolution.

use crate::value::FieldMap;

/// Produces default field values for one entity type.
///
/// Implemented for any `Fn() -> FieldMap`, so a closure using the `fake`
/// crate is enough:
///
/// ```
/// use fake_entity_core::fields::FieldFaker;
/// use fake_entity_core::value::field_map;
/// use serde_json::json;
///
/// let faker = || field_map(json!({"name": "generated"}));
/// assert_eq!(faker.fake_fields()["name"], "generated");
/// ```
pub trait FieldFaker: Send + Sync {
	fn fake_fields(&self) -> FieldMap;
}

impl<F> FieldFaker for F
where
	F: Fn() -> FieldMap + Send + Sync,
{
	fn fake_fields(&self) -> FieldMap {
		self()
	}
}

/// Faker producing no default fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDefaults;

impl FieldFaker for NoDefaults {
	fn fake_fields(&self) -> FieldMap {
		FieldMap::new()
	}
}

/// Overlays `defaults`, then `state`, then `overrides`.
///
/// Overrides win over state, state wins over defaults.
pub fn resolve_fields(defaults: FieldMap, state: FieldMap, overrides: Option<&FieldMap>) -> FieldMap {
	let mut fields = defaults;
	for (key, value) in state {
		fields.insert(key, value);
	}
	if let Some(overrides) = overrides {
		for (key, value) in overrides {
			fields.insert(key.clone(), value.clone());
		}
	}
	fields
}
