//! Graph construction for one `create`/`create_many` call.
//!
//! Stages run in this order:
//!
//! 1. parent resolution, which turns parent records into state generators;
//! 2. field resolution, sequential per index;
//! 3. persistence, a single create or bulk create;
//! 4. identity capture;
//! 5. nested resolution, by foreign key state or association attach;
//! 6. postprocessing;
//! 7. reset of pending state and hooks.
//!
//! Parent and nested declarations are taken out of the factory when the call
//! starts, so they are consumed even when a later stage fails. The generators
//! derived from them are removed again on failure, so a later call never
//! points at rows of a rolled back graph. Pending state and hooks are only
//! reset once every stage succeeded.

use std::iter;
use std::mem;

use crate::error::{FactoryError, FactoryResult};
use crate::factory::{FakeEntityFactory, NestedDeclaration, ParentDeclaration};
use crate::fields::resolve_fields;
use crate::relation::Relation;
use crate::repository::Transaction;
use crate::transaction::with_transaction;
use crate::value::{Entity, FieldMap};

impl<E: Entity> FakeEntityFactory<E> {
	/// Creates and persists one entity.
	///
	/// When `txn` is given, every insert of the call chain (parents, nested
	/// children) runs in it and a failure rolls it back once.
	pub async fn create(
		&self,
		custom_fields: Option<FieldMap>,
		txn: Option<&dyn Transaction>,
	) -> FactoryResult<E> {
		let mut entities = self.create_many(1, custom_fields, txn).await?;
		entities.pop().ok_or_else(|| {
			FactoryError::Configuration(format!(
				"Repository for {} returned no record",
				self.entity_name()
			))
		})
	}

	/// Creates and persists `count` entities, returned in creation order.
	pub async fn create_many(
		&self,
		count: usize,
		custom_fields: Option<FieldMap>,
		txn: Option<&dyn Transaction>,
	) -> FactoryResult<Vec<E>> {
		with_transaction(
			txn,
			self.entity_name(),
			self.build_graph(count, custom_fields.as_ref(), txn),
		)
		.await
	}

	async fn build_graph(
		&self,
		count: usize,
		custom_fields: Option<&FieldMap>,
		txn: Option<&dyn Transaction>,
	) -> FactoryResult<Vec<E>> {
		let (parents, nested, own_generators) = {
			let mut state = self.inner.state.lock();
			(
				mem::take(&mut state.parents),
				mem::take(&mut state.nested),
				state.states.generators().len(),
			)
		};

		let result = self
			.run_stages(parents, nested, count, custom_fields, txn)
			.await;
		{
			let mut state = self.inner.state.lock();
			match &result {
				Ok(_) => state.reset_transient(),
				Err(_) => state.states.truncate_generators(own_generators),
			}
		}
		result
	}

	async fn run_stages(
		&self,
		parents: Vec<ParentDeclaration>,
		nested: Vec<NestedDeclaration>,
		count: usize,
		custom_fields: Option<&FieldMap>,
		txn: Option<&dyn Transaction>,
	) -> FactoryResult<Vec<E>> {
		self.resolve_parents(parents, count, txn).await?;
		let rows = self.resolve_fields(count, custom_fields).await?;
		let records = self.persist(rows, txn).await?;
		self.capture_ids(&records)?;
		self.resolve_nested(nested, &records, txn).await?;
		self.postprocess(records).await
	}

	async fn resolve_parents(
		&self,
		parents: Vec<ParentDeclaration>,
		count: usize,
		txn: Option<&dyn Transaction>,
	) -> FactoryResult<()> {
		for declaration in parents {
			let parent_entity = declaration.factory.entity_name().to_string();
			if let Relation::Property(association) = &declaration.relation {
				return Err(FactoryError::Configuration(format!(
					"Association \"{association}\" cannot link {} to its parent {parent_entity}, use a key relation",
					self.entity_name()
				)));
			}

			let parent_count = declaration.cardinality.parent_count(count);
			tracing::debug!(
				entity = self.entity_name(),
				parent = %parent_entity,
				parents = parent_count,
				cardinality = ?declaration.cardinality,
				"Resolving parent"
			);

			let records = declaration
				.factory
				.create_records(parent_count, declaration.custom_fields, txn)
				.await?;
			let mapped = records
				.iter()
				.map(|record| declaration.relation.child_fields(&parent_entity, record))
				.collect::<FactoryResult<Vec<_>>>()?;

			self.inner.state.lock().states.push_sequence(mapped);
		}
		Ok(())
	}

	async fn resolve_fields(
		&self,
		count: usize,
		custom_fields: Option<&FieldMap>,
	) -> FactoryResult<Vec<FieldMap>> {
		let preprocess = self.inner.state.lock().preprocess.clone();
		let mut rows = Vec::with_capacity(count);
		for index in 0..count {
			let state = self.inner.state.lock().states.next_states();
			let fields = resolve_fields(self.inner.faker.fake_fields(), state, custom_fields);
			let fields = match &preprocess {
				Some(hook) => hook(fields, index).await?,
				None => fields,
			};
			rows.push(fields);
		}
		Ok(rows)
	}

	async fn persist(
		&self,
		mut rows: Vec<FieldMap>,
		txn: Option<&dyn Transaction>,
	) -> FactoryResult<Vec<FieldMap>> {
		let repository = &self.inner.repository;
		tracing::debug!(
			entity = self.entity_name(),
			count = rows.len(),
			transactional = txn.is_some(),
			"Persisting records"
		);
		let records = match rows.len() {
			0 => Vec::new(),
			1 => match rows.pop() {
				Some(row) => vec![repository.create(row, txn).await?],
				None => Vec::new(),
			},
			_ => repository.bulk_create(rows, txn).await?,
		};
		Ok(records)
	}

	fn capture_ids(&self, records: &[FieldMap]) -> FactoryResult<()> {
		for record in records {
			let id = self.inner.keys.get_id(record)?;
			self.inner.state.lock().entity_ids.push(id);
		}
		Ok(())
	}

	async fn resolve_nested(
		&self,
		nested: Vec<NestedDeclaration>,
		parents: &[FieldMap],
		txn: Option<&dyn Transaction>,
	) -> FactoryResult<()> {
		for declaration in nested {
			if declaration.count == 0 || parents.is_empty() {
				continue;
			}
			let total = declaration.count * parents.len();
			tracing::debug!(
				entity = self.entity_name(),
				child = declaration.factory.entity_name(),
				count = declaration.count,
				parents = parents.len(),
				"Resolving nested children"
			);

			match &declaration.relation {
				Relation::Property(association) => {
					let attacher = self.inner.repository.relation_attacher().ok_or_else(|| {
						FactoryError::Configuration(format!(
							"Repository for {} cannot attach association \"{association}\"",
							self.entity_name()
						))
					})?;
					let children = declaration
						.factory
						.create_records(total, declaration.custom_fields, txn)
						.await?;
					for (parent, chunk) in parents.iter().zip(children.chunks(declaration.count)) {
						attacher.attach_many(parent, association, chunk, txn).await?;
					}
				}
				relation => {
					let mut sequence = Vec::with_capacity(total);
					for parent in parents {
						let fields = relation.child_fields(self.entity_name(), parent)?;
						sequence.extend(iter::repeat_n(fields, declaration.count));
					}
					let child_generators = declaration.factory.generator_count();
					declaration.factory.push_state_sequence(sequence);
					if let Err(error) = declaration
						.factory
						.create_records(total, declaration.custom_fields, txn)
						.await
					{
						declaration.factory.truncate_state_sequences(child_generators);
						return Err(error);
					}
				}
			}
		}
		Ok(())
	}

	async fn postprocess(&self, records: Vec<FieldMap>) -> FactoryResult<Vec<E>> {
		let postprocess = self.inner.state.lock().postprocess.clone();
		let mut entities = Vec::with_capacity(records.len());
		for (index, record) in records.into_iter().enumerate() {
			let entity = self.decode(record)?;
			let entity = match &postprocess {
				Some(hook) => hook(entity, index).await?,
				None => entity,
			};
			entities.push(entity);
		}
		Ok(entities)
	}
}
