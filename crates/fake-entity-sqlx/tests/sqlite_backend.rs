//! SQLite repository, transaction and factory behavior on on-disk databases.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use fake::Fake;
use fake::faker::lorem::en::Sentence;
use fake::faker::name::en::Name;
use fake_entity_core::prelude::*;
use fake_entity_sqlx::{SqliteDatabase, SqliteSettings};
use rstest::rstest;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tempfile::TempDir;

const SCHEMA: &str = r#"
CREATE TABLE users (
	id INTEGER PRIMARY KEY AUTOINCREMENT,
	email TEXT NOT NULL UNIQUE,
	name TEXT
);
CREATE TABLE posts (
	id INTEGER PRIMARY KEY AUTOINCREMENT,
	user_id INTEGER REFERENCES users(id),
	message TEXT NOT NULL
);
CREATE TABLE followers (
	leader_id INTEGER NOT NULL REFERENCES users(id),
	follower_id INTEGER NOT NULL REFERENCES users(id),
	PRIMARY KEY (leader_id, follower_id)
);
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
	id: i64,
	email: String,
	name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Post {
	id: i64,
	user_id: Option<i64>,
	message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Follower {
	leader_id: i64,
	follower_id: i64,
}

/// Keeps the directory alive for as long as the database is used.
struct TestDatabase {
	_dir: TempDir,
	db: SqliteDatabase,
}

async fn setup() -> TestDatabase {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
	let dir = tempfile::tempdir().unwrap();
	let settings = SqliteSettings::file(dir.path().join("fixtures.db")).with_max_connections(4);
	let db = SqliteDatabase::connect(settings).await.unwrap();
	db.execute(SCHEMA).await.unwrap();
	TestDatabase { _dir: dir, db }
}

fn user_fields(email: &str) -> FieldMap {
	field_map(json!({"email": email, "name": "Ada"}))
}

async fn user_factory(db: &SqliteDatabase) -> FakeEntityFactory<User> {
	let sequence = Arc::new(AtomicUsize::new(1));
	let repository = db
		.repository("users")
		.await
		.unwrap()
		.with_association("posts", "posts", "user_id", "id");
	FakeEntityFactory::new(repository, move || {
		let n = sequence.fetch_add(1, Ordering::SeqCst);
		field_map(json!({
			"email": format!("user{n}@example.com"),
			"name": Name().fake::<String>(),
		}))
	})
	.unwrap()
}

async fn post_factory(db: &SqliteDatabase) -> FakeEntityFactory<Post> {
	FakeEntityFactory::new(db.repository("posts").await.unwrap(), || {
		field_map(json!({"message": Sentence(3..6).fake::<String>()}))
	})
	.unwrap()
}

#[rstest]
#[tokio::test]
async fn test_primary_key_detection() {
	let TestDatabase { db, .. } = &setup().await;

	let users = db.repository("users").await.unwrap();
	let followers = db.repository("followers").await.unwrap();

	assert_eq!(users.primary_key_field_names(), vec!["id".to_string()]);
	assert_eq!(
		followers.primary_key_field_names(),
		vec!["leader_id".to_string(), "follower_id".to_string()]
	);
	let error = db.repository("missing").await.unwrap_err();
	assert!(matches!(error, PersistenceError::UnknownTable(ref t) if t == "missing"));
}

#[rstest]
#[tokio::test]
async fn test_create_returns_stored_row() {
	let TestDatabase { db, .. } = &setup().await;
	let users = db.repository("users").await.unwrap();

	let created = users.create(user_fields("a@example.com"), None).await.unwrap();

	assert_eq!(created["id"], 1);
	assert_eq!(created["email"], "a@example.com");
	let found = users
		.find_by_primary_key(&KeyFilter::new().and("id", 1), None)
		.await
		.unwrap();
	assert_eq!(found, Some(created));
	let missing = users
		.find_by_primary_key(&KeyFilter::new().and("id", 2), None)
		.await
		.unwrap();
	assert!(missing.is_none());
}

#[rstest]
#[tokio::test]
async fn test_null_columns_round_trip() {
	let TestDatabase { db, .. } = &setup().await;
	let users = db.repository("users").await.unwrap();

	let created = users
		.create(field_map(json!({"email": "a@example.com"})), None)
		.await
		.unwrap();

	assert!(created["name"].is_null());
}

#[rstest]
#[tokio::test]
async fn test_constraint_errors_are_mapped() {
	let TestDatabase { db, .. } = &setup().await;
	let users = db.repository("users").await.unwrap();
	let posts = db.repository("posts").await.unwrap();
	users.create(user_fields("a@example.com"), None).await.unwrap();

	let unique = users
		.create(user_fields("a@example.com"), None)
		.await
		.unwrap_err();
	assert!(matches!(
		unique,
		PersistenceError::UniqueViolation { ref columns, .. } if columns == "email"
	));

	let not_null = posts
		.create(field_map(json!({"user_id": 1})), None)
		.await
		.unwrap_err();
	assert!(matches!(
		not_null,
		PersistenceError::NotNullViolation { ref column, .. } if column == "message"
	));

	let foreign = posts
		.create(field_map(json!({"user_id": 999, "message": "hi"})), None)
		.await
		.unwrap_err();
	assert!(matches!(foreign, PersistenceError::ForeignKeyViolation { .. }));
}

#[rstest]
#[tokio::test]
async fn test_bulk_create_is_atomic() {
	let TestDatabase { db, .. } = &setup().await;
	let users = db.repository("users").await.unwrap();

	let error = users
		.bulk_create(
			vec![
				user_fields("a@example.com"),
				user_fields("b@example.com"),
				user_fields("a@example.com"),
			],
			None,
		)
		.await
		.unwrap_err();

	assert!(matches!(error, PersistenceError::UniqueViolation { .. }));
	assert_eq!(db.count_rows("users").await.unwrap(), 0);
}

#[rstest]
#[tokio::test]
async fn test_destroy_with_composite_filters() {
	let TestDatabase { db, .. } = &setup().await;
	let users = db.repository("users").await.unwrap();
	let followers = db.repository("followers").await.unwrap();
	users
		.bulk_create(
			vec![
				user_fields("a@example.com"),
				user_fields("b@example.com"),
				user_fields("c@example.com"),
			],
			None,
		)
		.await
		.unwrap();
	followers
		.bulk_create(
			vec![
				field_map(json!({"leader_id": 1, "follower_id": 2})),
				field_map(json!({"leader_id": 1, "follower_id": 3})),
			],
			None,
		)
		.await
		.unwrap();

	let deleted = followers
		.destroy(
			&[
				KeyFilter::new().and("leader_id", 1).and("follower_id", 3),
				KeyFilter::new().and("leader_id", 2).and("follower_id", 1),
			],
			None,
		)
		.await
		.unwrap();

	assert_eq!(deleted, 1);
	assert_eq!(db.count_rows("followers").await.unwrap(), 1);
}

#[rstest]
#[tokio::test]
async fn test_attach_missing_child_is_rejected() {
	let TestDatabase { db, .. } = &setup().await;
	let users = db
		.repository("users")
		.await
		.unwrap()
		.with_association("posts", "posts", "user_id", "id");
	let posts = db.repository("posts").await.unwrap();
	let user = users.create(user_fields("a@example.com"), None).await.unwrap();
	let post = posts
		.create(field_map(json!({"message": "kept"})), None)
		.await
		.unwrap();

	let error = users
		.attach_many(
			&user,
			"posts",
			&[post.clone(), field_map(json!({"id": 99}))],
			None,
		)
		.await
		.unwrap_err();

	assert!(matches!(
		error,
		PersistenceError::RowNotFound { ref table, ref key } if table == "posts" && key == "id = 99"
	));
	// The first update was undone with the rest of the batch
	let stored = posts
		.find_by_primary_key(&KeyFilter::new().and("id", post["id"].clone()), None)
		.await
		.unwrap()
		.unwrap();
	assert!(stored["user_id"].is_null());
}

#[rstest]
#[tokio::test]
async fn test_transaction_commit_and_rollback() {
	let TestDatabase { db, .. } = &setup().await;
	let users = db.repository("users").await.unwrap();

	let txn = db.begin().await.unwrap();
	users
		.create(user_fields("a@example.com"), Some(&txn))
		.await
		.unwrap();
	assert_eq!(db.count_rows("users").await.unwrap(), 0);
	txn.commit().await.unwrap();
	assert_eq!(txn.status(), TransactionStatus::Committed);
	assert_eq!(db.count_rows("users").await.unwrap(), 1);

	let txn = db.begin().await.unwrap();
	users
		.create(user_fields("b@example.com"), Some(&txn))
		.await
		.unwrap();
	txn.rollback().await.unwrap();
	assert!(matches!(
		txn.rollback().await,
		Err(PersistenceError::TransactionFinished)
	));
	assert_eq!(txn.status(), TransactionStatus::RolledBack);
	assert_eq!(db.count_rows("users").await.unwrap(), 1);

	let error = users
		.create(user_fields("c@example.com"), Some(&txn))
		.await
		.unwrap_err();
	assert!(matches!(error, PersistenceError::TransactionFinished));
}

#[rstest]
#[tokio::test]
async fn test_transaction_from_another_database_is_rejected() {
	let TestDatabase { db, .. } = &setup().await;
	let other = SqliteDatabase::connect(SqliteSettings::default())
		.await
		.unwrap();
	let users = db.repository("users").await.unwrap();
	let txn = other.begin().await.unwrap();

	let error = users
		.create(user_fields("a@example.com"), Some(&txn))
		.await
		.unwrap_err();

	assert!(matches!(error, PersistenceError::ForeignTransaction));
}

#[rstest]
#[tokio::test]
async fn test_factory_nested_posts_through_association() {
	let TestDatabase { db, .. } = &setup().await;
	let users = user_factory(db).await;
	let posts = post_factory(db).await;

	let created = users
		.with_nested(&posts, Relation::property("posts"), 2, None)
		.create_many(2, None, None)
		.await
		.unwrap();

	assert_eq!(posts.entity_count(), 4);
	let mut owners = Vec::new();
	for index in 0..4 {
		let post = posts.get_entity_at(index, None).await.unwrap().unwrap();
		owners.push(post.user_id);
	}
	let first = Some(created[0].id);
	let second = Some(created[1].id);
	assert_eq!(owners, vec![first, first, second, second]);
}

#[rstest]
#[tokio::test]
async fn test_factory_rolls_back_graph_on_failure() {
	let TestDatabase { db, .. } = &setup().await;
	let users = user_factory(db).await;
	let posts = post_factory(db).await;
	users.with_nested(
		&posts,
		Relation::key("id", "user_id"),
		2,
		Some(field_map(json!({"id": 500}))),
	);

	let txn = db.begin().await.unwrap();
	let error = users.create(None, Some(&txn)).await.unwrap_err();

	assert!(error.is_persistence());
	assert_eq!(txn.status(), TransactionStatus::RolledBack);
	assert_eq!(db.count_rows("users").await.unwrap(), 0);
	assert_eq!(db.count_rows("posts").await.unwrap(), 0);
}

#[rstest]
#[tokio::test]
async fn test_factory_composite_key_lifecycle() {
	let TestDatabase { db, .. } = &setup().await;
	let users = user_factory(db).await;
	let followers =
		FakeEntityFactory::<Follower>::new(db.repository("followers").await.unwrap(), NoDefaults)
			.unwrap();
	let people = users.create_many(2, None, None).await.unwrap();

	assert!(followers.has_composite_id());
	let link = followers
		.create(
			Some(field_map(
				json!({"leader_id": people[0].id, "follower_id": people[1].id}),
			)),
			None,
		)
		.await
		.unwrap();

	let found = followers
		.find_by_key_values(
			&field_map(json!({"leader_id": people[0].id, "follower_id": people[1].id})),
			None,
		)
		.await
		.unwrap();
	assert_eq!(found, Some(link));

	assert_eq!(followers.cleanup(None).await.unwrap(), 1);
	assert_eq!(users.cleanup(None).await.unwrap(), 2);
	assert_eq!(db.count_rows("followers").await.unwrap(), 0);
	assert_eq!(db.count_rows("users").await.unwrap(), 0);
}
