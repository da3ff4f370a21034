//! Table definitions for the in-memory database.

use serde::{Deserialize, Serialize};

/// Foreign key from a column to a column of another table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
	pub column: String,
	pub references_table: String,
	pub references_column: String,
}

/// Has-many association attached by writing the parent key into the target's
/// foreign key column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
	/// Name used by `Relation::property`.
	pub name: String,
	/// Table holding the children.
	pub target_table: String,
	/// Column on the child table receiving the parent key.
	pub foreign_key: String,
	/// Column on the parent table copied into the child.
	pub parent_key: String,
}

/// Definition of one table.
///
/// # Examples
///
/// ```
/// use fake_entity_memory::TableSchema;
///
/// let followers = TableSchema::new("followers", ["leaderId", "followerId"])
///     .foreign_key("leaderId", "users", "id")
///     .foreign_key("followerId", "users", "id");
/// assert!(!followers.auto_increment);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
	pub table: String,
	pub primary_key: Vec<String>,
	/// Generates integer ids for a single-column primary key left empty.
	#[serde(default)]
	pub auto_increment: bool,
	/// Column sets that must be unique, in addition to the primary key.
	#[serde(default)]
	pub unique: Vec<Vec<String>>,
	/// Columns that must be present and non-null.
	#[serde(default)]
	pub required: Vec<String>,
	#[serde(default)]
	pub foreign_keys: Vec<ForeignKey>,
	#[serde(default)]
	pub associations: Vec<Association>,
}

impl TableSchema {
	/// Creates a table with the given primary key and no constraints.
	pub fn new<I, S>(table: impl Into<String>, primary_key: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			table: table.into(),
			primary_key: primary_key.into_iter().map(Into::into).collect(),
			auto_increment: false,
			unique: Vec::new(),
			required: Vec::new(),
			foreign_keys: Vec::new(),
			associations: Vec::new(),
		}
	}

	/// Table with an auto-incremented integer `id` primary key.
	pub fn with_serial_id(table: impl Into<String>) -> Self {
		Self {
			auto_increment: true,
			..Self::new(table, ["id"])
		}
	}

	pub fn unique<I, S>(mut self, columns: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.unique
			.push(columns.into_iter().map(Into::into).collect());
		self
	}

	pub fn required<I, S>(mut self, columns: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.required.extend(columns.into_iter().map(Into::into));
		self
	}

	pub fn foreign_key(
		mut self,
		column: impl Into<String>,
		references_table: impl Into<String>,
		references_column: impl Into<String>,
	) -> Self {
		self.foreign_keys.push(ForeignKey {
			column: column.into(),
			references_table: references_table.into(),
			references_column: references_column.into(),
		});
		self
	}

	pub fn has_many(
		mut self,
		name: impl Into<String>,
		target_table: impl Into<String>,
		foreign_key: impl Into<String>,
		parent_key: impl Into<String>,
	) -> Self {
		self.associations.push(Association {
			name: name.into(),
			target_table: target_table.into(),
			foreign_key: foreign_key.into(),
			parent_key: parent_key.into(),
		});
		self
	}

	pub(crate) fn association(&self, name: &str) -> Option<&Association> {
		self.associations.iter().find(|a| a.name == name)
	}

	/// Returns true when ids are generated for this table.
	pub(crate) fn generates_id(&self) -> bool {
		self.auto_increment && self.primary_key.len() == 1
	}
}
