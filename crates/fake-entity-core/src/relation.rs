//! Relation field mappings between a parent and its children.

use crate::error::{FactoryError, FactoryResult};
use crate::value::FieldMap;

/// One foreign key column copied from a parent record to a child record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
	/// Field read from the parent record.
	pub parent: String,
	/// Field written on the child record.
	pub child: String,
}

impl KeyPair {
	pub fn new(parent: impl Into<String>, child: impl Into<String>) -> Self {
		Self {
			parent: parent.into(),
			child: child.into(),
		}
	}
}

/// How children are linked to their parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
	/// A single foreign key column.
	Single(KeyPair),
	/// A composite foreign key.
	Multiple(Vec<KeyPair>),
	/// A named association on the parent; children are attached after creation.
	Property(String),
}

impl Relation {
	/// Single column relation, `parent_field` copied into `child_field`.
	pub fn key(parent_field: impl Into<String>, child_field: impl Into<String>) -> Self {
		Self::Single(KeyPair::new(parent_field, child_field))
	}

	/// Composite relation from `(parent_field, child_field)` pairs.
	pub fn keys<P, C, I>(pairs: I) -> Self
	where
		P: Into<String>,
		C: Into<String>,
		I: IntoIterator<Item = (P, C)>,
	{
		Self::Multiple(
			pairs
				.into_iter()
				.map(|(parent, child)| KeyPair::new(parent, child))
				.collect(),
		)
	}

	/// Association attach through the parent's `name` property.
	pub fn property(name: impl Into<String>) -> Self {
		Self::Property(name.into())
	}

	pub fn is_property(&self) -> bool {
		matches!(self, Self::Property(_))
	}

	/// Builds the child fields carrying `parent`'s key values.
	///
	/// Fails when the parent record lacks a mapped field. Property relations
	/// carry no columns and yield an empty map.
	pub fn child_fields(&self, parent_entity: &str, parent: &FieldMap) -> FactoryResult<FieldMap> {
		let mut fields = FieldMap::new();
		let pairs: &[KeyPair] = match self {
			Self::Single(pair) => std::slice::from_ref(pair),
			Self::Multiple(pairs) => pairs,
			Self::Property(_) => &[],
		};
		for pair in pairs {
			let value = parent.get(&pair.parent).ok_or_else(|| FactoryError::Relation {
				entity: parent_entity.to_string(),
				field: pair.parent.clone(),
			})?;
			fields.insert(pair.child.clone(), value.clone());
		}
		Ok(fields)
	}
}

/// Number of parents created for a batch of children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Cardinality {
	/// One parent shared by every child in the batch.
	#[default]
	Shared,
	/// One parent per child.
	Each,
}

impl Cardinality {
	/// Parents needed for a batch of `batch_size` children.
	pub fn parent_count(self, batch_size: usize) -> usize {
		match self {
			Self::Shared => 1,
			Self::Each => batch_size,
		}
	}
}

impl From<bool> for Cardinality {
	fn from(each: bool) -> Self {
		if each { Self::Each } else { Self::Shared }
	}
}
