//! Test helpers for fake-entity-core integration tests.
//!
//! Provides a memory database with users, roles, posts, comments and
//! followers, and one factory per table generating values with `fake`.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use fake::Fake;
use fake::faker::internet::en::SafeEmail;
use fake::faker::lorem::en::{Sentence, Word};
use fake::faker::name::en::{FirstName, LastName};
use fake_entity_core::prelude::*;
use fake_entity_memory::{MemoryDatabase, MemoryRepository, TableSchema};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
	pub id: i64,
	pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
	pub id: i64,
	pub email: String,
	pub first_name: String,
	pub last_name: String,
	pub role_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
	pub id: i64,
	pub user_id: Option<i64>,
	pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
	pub id: i64,
	pub user_id: i64,
	pub post_id: i64,
	pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Follower {
	pub leader_id: i64,
	pub follower_id: i64,
	pub created_at: String,
}

/// Installs a test-writer subscriber once per test binary.
pub fn init_test_logging() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

pub fn database() -> MemoryDatabase {
	let db = MemoryDatabase::new();
	db.define_table(
		TableSchema::with_serial_id("roles")
			.unique(["name"])
			.required(["name"]),
	)
	.define_table(
		TableSchema::with_serial_id("users")
			.required(["email"])
			.foreign_key("roleId", "roles", "id")
			.has_many("posts", "posts", "userId", "id"),
	)
	.define_table(
		TableSchema::with_serial_id("posts")
			.required(["message"])
			.foreign_key("userId", "users", "id"),
	)
	.define_table(
		TableSchema::with_serial_id("comments")
			.required(["userId", "postId"])
			.foreign_key("userId", "users", "id")
			.foreign_key("postId", "posts", "id"),
	)
	.define_table(
		TableSchema::new("followers", ["leaderId", "followerId"])
			.foreign_key("leaderId", "users", "id")
			.foreign_key("followerId", "users", "id"),
	);
	db
}

/// One factory per table over a fresh database.
pub struct Factories {
	pub db: MemoryDatabase,
	pub roles: FakeEntityFactory<Role>,
	pub users: FakeEntityFactory<User>,
	pub posts: FakeEntityFactory<Post>,
	pub comments: FakeEntityFactory<Comment>,
	pub followers: FakeEntityFactory<Follower>,
}

pub fn factories() -> Factories {
	init_test_logging();
	let db = database();
	let repository = |table: &str| db.repository(table).unwrap();

	let role_sequence = Arc::new(AtomicUsize::new(1));
	let roles = FakeEntityFactory::<Role>::new(repository("roles"), move || {
		let n = role_sequence.fetch_add(1, Ordering::SeqCst);
		field_map(json!({ "name": format!("{}-{n}", Word().fake::<String>()) }))
	})
	.unwrap();

	let users = FakeEntityFactory::<User>::new(repository("users"), || {
		field_map(json!({
			"email": SafeEmail().fake::<String>(),
			"firstName": FirstName().fake::<String>(),
			"lastName": LastName().fake::<String>(),
		}))
	})
	.unwrap();

	let posts = FakeEntityFactory::<Post>::new(repository("posts"), || {
		field_map(json!({ "message": Sentence(3..8).fake::<String>() }))
	})
	.unwrap();

	let comments = FakeEntityFactory::<Comment>::new(repository("comments"), || {
		field_map(json!({ "message": Sentence(2..5).fake::<String>() }))
	})
	.unwrap();

	let followers = FakeEntityFactory::<Follower>::new(repository("followers"), || {
		field_map(json!({ "createdAt": format!("2024-01-{:02}", (1u8..28).fake::<u8>()) }))
	})
	.unwrap();

	Factories {
		db,
		roles,
		users,
		posts,
		comments,
		followers,
	}
}

/// Shorthands mirroring how projects wrap their user factory.
pub trait UserFactoryExt {
	fn with_role(&self, roles: &FakeEntityFactory<Role>, each: bool) -> &Self;
	fn with_posts(&self, posts: &FakeEntityFactory<Post>, count: usize) -> &Self;
}

impl UserFactoryExt for FakeEntityFactory<User> {
	fn with_role(&self, roles: &FakeEntityFactory<Role>, each: bool) -> &Self {
		self.with_parent(roles, Relation::key("id", "roleId"), each, None)
	}

	fn with_posts(&self, posts: &FakeEntityFactory<Post>, count: usize) -> &Self {
		self.with_nested(posts, Relation::key("id", "userId"), count, None)
	}
}

/// Repository wrapper counting destroy calls.
pub struct CountingRepository {
	pub inner: MemoryRepository,
	pub destroys: Arc<AtomicUsize>,
}

#[async_trait]
impl Repository for CountingRepository {
	fn entity_name(&self) -> &str {
		self.inner.entity_name()
	}

	fn primary_key_field_names(&self) -> Vec<String> {
		self.inner.primary_key_field_names()
	}

	async fn create(
		&self,
		fields: FieldMap,
		txn: Option<&dyn Transaction>,
	) -> PersistenceResult<FieldMap> {
		self.inner.create(fields, txn).await
	}

	async fn bulk_create(
		&self,
		rows: Vec<FieldMap>,
		txn: Option<&dyn Transaction>,
	) -> PersistenceResult<Vec<FieldMap>> {
		self.inner.bulk_create(rows, txn).await
	}

	async fn destroy(
		&self,
		filters: &[KeyFilter],
		txn: Option<&dyn Transaction>,
	) -> PersistenceResult<u64> {
		self.destroys.fetch_add(1, Ordering::SeqCst);
		self.inner.destroy(filters, txn).await
	}

	async fn find_by_primary_key(
		&self,
		filter: &KeyFilter,
		txn: Option<&dyn Transaction>,
	) -> PersistenceResult<Option<FieldMap>> {
		self.inner.find_by_primary_key(filter, txn).await
	}
}
