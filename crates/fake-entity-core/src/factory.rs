//! The factory handle and its builder-style configuration.
//!
//! A [`FakeEntityFactory`] is a cheap, clonable handle. Clones share
//! configuration and tracked identities, so a factory can be stored in a test
//! fixture and captured by hooks. Use [`FakeEntityFactory::fork`] for an
//! independent factory over the same repository.
//!
//! Configuration accumulates through `&self` methods returning `&Self`, and is
//! consumed by the next [`create`](FakeEntityFactory::create) or
//! [`create_many`](FakeEntityFactory::create_many) call:
//!
//! ```ignore
//! let posts = post_factory
//!     .add_field_sequence("message", ["first", "second"])
//!     .with_parent(&user_factory, Relation::key("id", "userId"), Cardinality::Shared, None)
//!     .create_many(2, None, None)
//!     .await?;
//! ```

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;

use crate::config::FactoryConfig;
use crate::error::{FactoryError, FactoryResult};
use crate::fields::{FieldFaker, NoDefaults};
use crate::identity::KeyResolver;
use crate::relation::{Cardinality, Relation};
use crate::repository::{Repository, Transaction};
use crate::state::{StateAccumulator, StateInput};
use crate::value::{Entity, EntityId, FieldMap};

/// Hook run on each resolved field map before persistence.
pub type PreprocessHook =
	Arc<dyn Fn(FieldMap, usize) -> BoxFuture<'static, FactoryResult<FieldMap>> + Send + Sync>;

/// Hook run on each created entity after nested relations are resolved.
pub type PostprocessHook<E> =
	Arc<dyn Fn(E, usize) -> BoxFuture<'static, FactoryResult<E>> + Send + Sync>;

/// Type-erased view of a factory used by parent and nested declarations.
#[async_trait]
pub(crate) trait RelatedFactory: Send + Sync {
	fn entity_name(&self) -> &str;

	fn generator_count(&self) -> usize;

	fn push_state_sequence(&self, values: Vec<FieldMap>);

	fn truncate_state_sequences(&self, len: usize);

	/// Runs a full creation call and returns the created records as field maps.
	async fn create_records(
		&self,
		count: usize,
		custom_fields: Option<FieldMap>,
		txn: Option<&dyn Transaction>,
	) -> FactoryResult<Vec<FieldMap>>;
}

pub(crate) struct ParentDeclaration {
	pub(crate) factory: Arc<dyn RelatedFactory>,
	pub(crate) cardinality: Cardinality,
	pub(crate) custom_fields: Option<FieldMap>,
	pub(crate) relation: Relation,
}

pub(crate) struct NestedDeclaration {
	pub(crate) factory: Arc<dyn RelatedFactory>,
	pub(crate) count: usize,
	pub(crate) custom_fields: Option<FieldMap>,
	pub(crate) relation: Relation,
}

/// Mutable part of a factory.
pub(crate) struct FactoryState<E> {
	pub(crate) states: StateAccumulator,
	pub(crate) parents: Vec<ParentDeclaration>,
	pub(crate) nested: Vec<NestedDeclaration>,
	pub(crate) preprocess: Option<PreprocessHook>,
	pub(crate) postprocess: Option<PostprocessHook<E>>,
	pub(crate) entity_ids: Vec<EntityId>,
}

impl<E> Default for FactoryState<E> {
	fn default() -> Self {
		Self {
			states: StateAccumulator::new(),
			parents: Vec::new(),
			nested: Vec::new(),
			preprocess: None,
			postprocess: None,
			entity_ids: Vec::new(),
		}
	}
}

impl<E> FactoryState<E> {
	/// Drops pending state, generators and hooks. Tracked ids are kept.
	pub(crate) fn reset_transient(&mut self) {
		self.states.clear();
		self.preprocess = None;
		self.postprocess = None;
	}
}

pub(crate) struct FactoryInner<E> {
	pub(crate) repository: Arc<dyn Repository>,
	pub(crate) faker: Arc<dyn FieldFaker>,
	pub(crate) keys: KeyResolver,
	pub(crate) state: Mutex<FactoryState<E>>,
}

/// Factory generating, persisting and tracking entities of type `E`.
pub struct FakeEntityFactory<E> {
	pub(crate) inner: Arc<FactoryInner<E>>,
}

impl<E> Clone for FakeEntityFactory<E> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<E> fmt::Debug for FakeEntityFactory<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.inner.state.lock();
		f.debug_struct("FakeEntityFactory")
			.field("entity", &self.inner.keys.entity())
			.field("id_fields", &self.inner.keys.id_field_names())
			.field("entity_ids", &state.entity_ids.len())
			.field("parents", &state.parents.len())
			.field("nested", &state.nested.len())
			.finish()
	}
}

/// Builder for [`FakeEntityFactory`].
pub struct FactoryBuilder<E> {
	repository: Arc<dyn Repository>,
	faker: Arc<dyn FieldFaker>,
	config: FactoryConfig,
	_entity: PhantomData<fn() -> E>,
}

impl<E: Entity> FactoryBuilder<E> {
	pub fn new(repository: Arc<dyn Repository>) -> Self {
		Self {
			repository,
			faker: Arc::new(NoDefaults),
			config: FactoryConfig::default(),
			_entity: PhantomData,
		}
	}

	/// Default field generator, invoked once per entity.
	pub fn fake_fields<F>(mut self, faker: F) -> Self
	where
		F: FieldFaker + 'static,
	{
		self.faker = Arc::new(faker);
		self
	}

	/// Overrides the primary key fields reported by the repository.
	pub fn id_field_names<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.config = self.config.id_field_names(fields);
		self
	}

	pub fn entity_name(mut self, name: impl Into<String>) -> Self {
		self.config = self.config.entity_name(name);
		self
	}

	/// Replaces the whole configuration.
	pub fn config(mut self, config: FactoryConfig) -> Self {
		self.config = config;
		self
	}

	/// Resolves the primary key and builds the factory.
	///
	/// # Errors
	///
	/// Returns [`FactoryError::Configuration`] when neither the configuration
	/// nor the repository names a primary key field.
	pub fn build(self) -> FactoryResult<FakeEntityFactory<E>> {
		let entity = self
			.config
			.entity_name
			.unwrap_or_else(|| self.repository.entity_name().to_string());
		let fields = self
			.config
			.id_field_names
			.unwrap_or_else(|| self.repository.primary_key_field_names());
		let keys = KeyResolver::new(entity, fields)?;

		tracing::debug!(
			entity = keys.entity(),
			id_fields = ?keys.id_field_names(),
			"Built fake entity factory"
		);

		Ok(FakeEntityFactory {
			inner: Arc::new(FactoryInner {
				repository: self.repository,
				faker: self.faker,
				keys,
				state: Mutex::new(FactoryState::default()),
			}),
		})
	}
}

impl<E: Entity> FakeEntityFactory<E> {
	/// Starts building a factory over `repository`.
	pub fn builder<R>(repository: R) -> FactoryBuilder<E>
	where
		R: Repository + 'static,
	{
		FactoryBuilder::new(Arc::new(repository))
	}

	/// Builds a factory with default settings.
	pub fn new<R, F>(repository: R, faker: F) -> FactoryResult<Self>
	where
		R: Repository + 'static,
		F: FieldFaker + 'static,
	{
		Self::builder(repository).fake_fields(faker).build()
	}

	pub fn entity_name(&self) -> &str {
		self.inner.keys.entity()
	}

	pub fn repository(&self) -> &Arc<dyn Repository> {
		&self.inner.repository
	}

	/// Primary key fields in declaration order.
	pub fn id_field_names(&self) -> &[String] {
		self.inner.keys.id_field_names()
	}

	pub fn has_composite_id(&self) -> bool {
		self.inner.keys.has_composite_id()
	}

	/// Adds pending state.
	///
	/// A map is merged into the pending state. A list registers a new
	/// round-robin generator, so the `n`-th entity created gets element
	/// `n mod len`.
	pub fn add_states(&self, states: impl Into<StateInput>) -> &Self {
		self.inner.state.lock().states.add(states.into());
		self
	}

	/// Like [`add_states`](Self::add_states) with a lazily computed value.
	pub fn add_states_with<F, S>(&self, states: F) -> &Self
	where
		F: FnOnce() -> S,
		S: Into<StateInput>,
	{
		self.add_states(states())
	}

	/// Registers a generator whose elements are produced by calling each
	/// function once, now.
	pub fn add_state_sequence_with<I>(&self, producers: I) -> &Self
	where
		I: IntoIterator<Item = Box<dyn FnOnce() -> FieldMap>>,
	{
		let values: Vec<FieldMap> = producers.into_iter().map(|produce| produce()).collect();
		self.inner.state.lock().states.push_sequence(values);
		self
	}

	/// Cycles `field` through `values`, one per created entity.
	pub fn add_field_sequence<I, V>(&self, field: &str, values: I) -> &Self
	where
		I: IntoIterator<Item = V>,
		V: Into<Value>,
	{
		let values = values.into_iter().map(Into::into).collect();
		self.inner
			.state
			.lock()
			.states
			.push_field_sequence(field, values);
		self
	}

	/// Drops pending state and generators.
	pub fn clear_states(&self) -> &Self {
		self.inner.state.lock().states.clear();
		self
	}

	/// Pending merged state, if any.
	pub fn pending_state(&self) -> Option<FieldMap> {
		self.inner.state.lock().states.pending().cloned()
	}

	/// Number of registered round-robin generators.
	pub fn generator_count(&self) -> usize {
		self.inner.state.lock().states.generators().len()
	}

	/// Declares a parent created before the next batch.
	///
	/// With [`Cardinality::Shared`] one parent is created and its mapped
	/// fields go to every child. With [`Cardinality::Each`] one parent is
	/// created per child and child `i` references parent `i`.
	pub fn with_parent<P: Entity>(
		&self,
		parent: &FakeEntityFactory<P>,
		relation: Relation,
		cardinality: impl Into<Cardinality>,
		custom_fields: Option<FieldMap>,
	) -> &Self {
		self.inner.state.lock().parents.push(ParentDeclaration {
			factory: Arc::new(parent.clone()),
			cardinality: cardinality.into(),
			custom_fields,
			relation,
		});
		self
	}

	/// Declares `count` children created for every entity of the next batch.
	pub fn with_nested<C: Entity>(
		&self,
		child: &FakeEntityFactory<C>,
		relation: Relation,
		count: usize,
		custom_fields: Option<FieldMap>,
	) -> &Self {
		self.inner.state.lock().nested.push(NestedDeclaration {
			factory: Arc::new(child.clone()),
			count,
			custom_fields,
			relation,
		});
		self
	}

	/// Hook receiving each resolved field map and its index before insert.
	pub fn after_making<F, Fut>(&self, hook: F) -> &Self
	where
		F: Fn(FieldMap, usize) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = FactoryResult<FieldMap>> + Send + 'static,
	{
		let hook: PreprocessHook = Arc::new(
			move |fields: FieldMap, index: usize| -> BoxFuture<'static, FactoryResult<FieldMap>> {
				Box::pin(hook(fields, index))
			},
		);
		self.inner.state.lock().preprocess = Some(hook);
		self
	}

	/// Hook receiving each created entity and its index.
	pub fn after_creating<F, Fut>(&self, hook: F) -> &Self
	where
		F: Fn(E, usize) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = FactoryResult<E>> + Send + 'static,
	{
		let hook: PostprocessHook<E> = Arc::new(
			move |entity: E, index: usize| -> BoxFuture<'static, FactoryResult<E>> {
				Box::pin(hook(entity, index))
			},
		);
		self.inner.state.lock().postprocess = Some(hook);
		self
	}

	/// Drops both hooks.
	pub fn clear_hooks(&self) -> &Self {
		let mut state = self.inner.state.lock();
		state.preprocess = None;
		state.postprocess = None;
		drop(state);
		self
	}

	/// New factory over the same repository, faker and key fields, with
	/// no tracked ids and no pending configuration.
	pub fn fork(&self) -> Self {
		Self {
			inner: Arc::new(FactoryInner {
				repository: Arc::clone(&self.inner.repository),
				faker: Arc::clone(&self.inner.faker),
				keys: self.inner.keys.clone(),
				state: Mutex::new(FactoryState::default()),
			}),
		}
	}

	pub(crate) fn decode(&self, record: FieldMap) -> FactoryResult<E> {
		serde_json::from_value(Value::Object(record)).map_err(|source| {
			FactoryError::Serialization {
				entity: self.entity_name().to_string(),
				source,
			}
		})
	}

	pub(crate) fn encode(&self, entity: &E) -> FactoryResult<FieldMap> {
		let serialization = |source| FactoryError::Serialization {
			entity: self.entity_name().to_string(),
			source,
		};
		match serde_json::to_value(entity).map_err(serialization)? {
			Value::Object(map) => Ok(map),
			_ => Err(serialization(<serde_json::Error as serde::ser::Error>::custom(
				"entity did not serialize to a map",
			))),
		}
	}
}

#[async_trait]
impl<E: Entity> RelatedFactory for FakeEntityFactory<E> {
	fn entity_name(&self) -> &str {
		self.inner.keys.entity()
	}

	fn generator_count(&self) -> usize {
		FakeEntityFactory::generator_count(self)
	}

	fn push_state_sequence(&self, values: Vec<FieldMap>) {
		self.inner.state.lock().states.push_sequence(values);
	}

	fn truncate_state_sequences(&self, len: usize) {
		self.inner.state.lock().states.truncate_generators(len);
	}

	async fn create_records(
		&self,
		count: usize,
		custom_fields: Option<FieldMap>,
		txn: Option<&dyn Transaction>,
	) -> FactoryResult<Vec<FieldMap>> {
		let entities = self.create_many(count, custom_fields, txn).await?;
		entities.iter().map(|entity| self.encode(entity)).collect()
	}
}
