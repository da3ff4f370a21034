//! Factory configuration.

use serde::{Deserialize, Serialize};

/// Settings applied when a factory is built.
///
/// Both fields fall back to what the repository reports.
///
/// # Examples
///
/// ```
/// use fake_entity_core::config::FactoryConfig;
///
/// let config: FactoryConfig =
///     serde_json::from_str(r#"{"id_field_names": ["leaderId", "followerId"]}"#).unwrap();
/// assert_eq!(config.id_field_names.unwrap().len(), 2);
/// assert!(config.entity_name.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
	/// Name used in logs and errors instead of the repository's.
	pub entity_name: Option<String>,
	/// Primary key fields, replacing auto-detection.
	pub id_field_names: Option<Vec<String>>,
}

impl FactoryConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn entity_name(mut self, name: impl Into<String>) -> Self {
		self.entity_name = Some(name.into());
		self
	}

	pub fn id_field_names<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.id_field_names = Some(fields.into_iter().map(Into::into).collect());
		self
	}
}
