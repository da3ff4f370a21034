//! Pending field state applied to the next batch of created entities.
//!
//! Two kinds of state accumulate on a factory between creation calls:
//!
//! - a merged map, where later writes win per field;
//! - round-robin generators, each cycling over a fixed list of partial maps.
//!
//! [`StateAccumulator::next_states`] combines both for one entity. It is
//! called once per entity, in creation order, so entity `n` receives value
//! `n mod len` of every generator registered before the batch started.

use serde_json::Value;

use crate::value::FieldMap;

/// Cyclic cursor over a fixed list of partial field maps.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRobin {
	values: Vec<FieldMap>,
	cursor: usize,
}

impl RoundRobin {
	/// Creates a generator. Returns `None` for an empty list.
	pub fn new(values: Vec<FieldMap>) -> Option<Self> {
		if values.is_empty() {
			return None;
		}
		Some(Self { values, cursor: 0 })
	}

	/// Returns the value under the cursor and advances it, wrapping around.
	pub fn next(&mut self) -> &FieldMap {
		let index = self.cursor;
		self.cursor = (self.cursor + 1) % self.values.len();
		&self.values[index]
	}

	/// Moves the cursor back to the first value.
	pub fn reset(&mut self) {
		self.cursor = 0;
	}

	/// Index the next call to [`next`](Self::next) will return.
	pub fn position(&self) -> usize {
		self.cursor
	}

	/// Number of values in the cycle.
	pub fn len(&self) -> usize {
		self.values.len()
	}

	/// Always false, empty generators are never constructed.
	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}
}

/// Argument accepted by `add_states`.
#[derive(Debug, Clone, PartialEq)]
pub enum StateInput {
	/// Merged into the pending map.
	Single(FieldMap),
	/// Registered as a new round-robin generator.
	Sequence(Vec<FieldMap>),
}

impl From<FieldMap> for StateInput {
	fn from(value: FieldMap) -> Self {
		Self::Single(value)
	}
}

impl From<Vec<FieldMap>> for StateInput {
	fn from(value: Vec<FieldMap>) -> Self {
		Self::Sequence(value)
	}
}

impl From<Value> for StateInput {
	/// Objects merge, arrays become a sequence. Anything else is dropped
	/// with a warning.
	fn from(value: Value) -> Self {
		match value {
			Value::Array(items) => {
				let total = items.len();
				let values: Vec<FieldMap> = items
					.into_iter()
					.filter_map(|item| match item {
						Value::Object(map) => Some(map),
						_ => None,
					})
					.collect();
				if values.len() < total {
					tracing::warn!(
						skipped = total - values.len(),
						"Skipping non-object elements of a state sequence"
					);
				}
				Self::Sequence(values)
			}
			Value::Object(map) => Self::Single(map),
			other => {
				tracing::warn!(state = %other, "Ignoring state that is neither an object nor an array");
				Self::Single(FieldMap::new())
			}
		}
	}
}

/// Pending merged state plus registered generators.
#[derive(Debug, Clone, Default)]
pub struct StateAccumulator {
	pending: Option<FieldMap>,
	generators: Vec<RoundRobin>,
}

impl StateAccumulator {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add(&mut self, input: StateInput) {
		match input {
			StateInput::Single(fields) => self.merge(fields),
			StateInput::Sequence(values) => self.push_sequence(values),
		}
	}

	/// Merges fields into the pending map, last write wins.
	pub fn merge(&mut self, fields: FieldMap) {
		let pending = self.pending.get_or_insert_with(FieldMap::new);
		for (key, value) in fields {
			pending.insert(key, value);
		}
	}

	/// Registers a generator over `values`. Empty lists are ignored.
	pub fn push_sequence(&mut self, values: Vec<FieldMap>) {
		if let Some(generator) = RoundRobin::new(values) {
			self.generators.push(generator);
		}
	}

	/// Registers a generator yielding `{field: value}` for each value.
	pub fn push_field_sequence(&mut self, field: &str, values: Vec<Value>) {
		let maps = values
			.into_iter()
			.map(|value| {
				let mut map = FieldMap::new();
				map.insert(field.to_string(), value);
				map
			})
			.collect();
		self.push_sequence(maps);
	}

	/// Pending map overlaid with one draw from every generator, in order.
	pub fn next_states(&mut self) -> FieldMap {
		let mut state = self.pending.clone().unwrap_or_default();
		for generator in &mut self.generators {
			for (key, value) in generator.next() {
				state.insert(key.clone(), value.clone());
			}
		}
		state
	}

	pub fn pending(&self) -> Option<&FieldMap> {
		self.pending.as_ref()
	}

	pub fn generators(&self) -> &[RoundRobin] {
		&self.generators
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_none() && self.generators.is_empty()
	}

	/// Drops every generator registered after the first `len`.
	pub fn truncate_generators(&mut self, len: usize) {
		self.generators.truncate(len);
	}

	pub fn clear(&mut self) {
		self.pending = None;
		self.generators.clear();
	}
}
