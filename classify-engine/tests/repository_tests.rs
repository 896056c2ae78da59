//! SQLite repository and restoring the orchestrator from it

use classify_common::config::EngineConfig;
use classify_common::{Error, EventBus};
use classify_engine::repository::{Record, RecordMatch, Table};
use classify_engine::{Classify, Repository, SqliteRepository, TypeRegistry};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

async fn open_test_repository(temp_dir: &TempDir) -> SqliteRepository {
    SqliteRepository::open(&temp_dir.path().join("data").join("classify.db"))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_insert_list_delete() {
    let temp_dir = TempDir::new().unwrap();
    let repo = open_test_repository(&temp_dir).await;

    let record = Record::new("films", "movies").with_config(json!({ "buffer_size": 4 }));
    let id = repo.insert(Table::Collections, &record).await.unwrap();
    assert!(id > 0);

    let listed = repo.list(Table::Collections).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, Some(id));
    assert_eq!(listed[0].kind, "movies");
    assert_eq!(listed[0].config, json!({ "buffer_size": 4 }));
    assert!(listed[0].params.is_null());
    assert!(repo.list(Table::Imports).await.unwrap().is_empty());

    repo.delete(Table::Collections, &listed[0], RecordMatch::Id)
        .await
        .unwrap();
    let err = repo
        .delete(Table::Collections, &record, RecordMatch::Name)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_duplicate_name_is_already_exists() {
    let temp_dir = TempDir::new().unwrap();
    let repo = open_test_repository(&temp_dir).await;

    let record = Record::new("films", "movies");
    repo.insert(Table::Collections, &record).await.unwrap();
    let err = repo.insert(Table::Collections, &record).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)));

    // Same name in the other table is fine
    repo.insert(Table::Imports, &record).await.unwrap();
}

#[tokio::test]
async fn test_reopen_keeps_records() {
    let temp_dir = TempDir::new().unwrap();
    {
        let repo = open_test_repository(&temp_dir).await;
        repo.insert(Table::Imports, &Record::new("abc", "list").with_params(json!({ "items": ["a"] })))
            .await
            .unwrap();
        repo.pool().close().await;
    }

    let repo = open_test_repository(&temp_dir).await;
    let listed = repo.list(Table::Imports).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].params["items"][0], "a");
}

#[tokio::test]
async fn test_classify_restores_collections_and_imports() {
    let temp_dir = TempDir::new().unwrap();
    let repo: Arc<dyn Repository> = Arc::new(open_test_repository(&temp_dir).await);

    let first = Classify::new(
        TypeRegistry::with_defaults(),
        EventBus::new(),
        Arc::clone(&repo),
        EngineConfig::default(),
    );
    first
        .add_collection("films", "movies", Some(&json!({ "buffer_size": 7 })))
        .await
        .unwrap();
    first.add_collection("notes", "simple", None).await.unwrap();
    let import = first
        .add_import(
            "list",
            &json!({ "items": ["Alien.1979.720p"] }),
            &["films".to_string()],
        )
        .await
        .unwrap();
    first.rename_collection("notes", "memos").await.unwrap();

    let second = Classify::new(
        TypeRegistry::with_defaults(),
        EventBus::new(),
        repo,
        EngineConfig::default(),
    );
    second.restore().await.unwrap();

    let names: Vec<_> = second
        .get_collections()
        .await
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["films", "memos"]);

    let films = second.get_collection("films").await.unwrap();
    assert_eq!(films.kind(), "movies");
    assert_eq!(films.config().await.buffer_size, 7);

    let restored = second.get_import(import.id()).await.unwrap();
    assert_eq!(restored.collections().await, vec!["films".to_string()]);

    // Restored imports run like new ones
    second.start_imports(&[], &[]).await.unwrap();
    second.wait_imports(&[]).await.unwrap();
    let staged = films.get_buffer().await;
    assert_eq!(staged.len(), 1);
    assert_eq!(staged[0].cleaned_name, "Alien 1979");
}

#[tokio::test]
async fn test_restore_drops_imports_without_collections() {
    let temp_dir = TempDir::new().unwrap();
    let repo: Arc<dyn Repository> = Arc::new(open_test_repository(&temp_dir).await);

    let first = Classify::new(
        TypeRegistry::with_defaults(),
        EventBus::new(),
        Arc::clone(&repo),
        EngineConfig::default(),
    );
    first.add_collection("films", "simple", None).await.unwrap();
    let import = first
        .add_import("list", &json!({ "items": ["a"] }), &["films".to_string()])
        .await
        .unwrap();

    // Collection row vanishes while the import row stays behind
    repo.delete(Table::Collections, &Record::new("films", "simple"), RecordMatch::Name)
        .await
        .unwrap();

    let second = Classify::new(
        TypeRegistry::with_defaults(),
        EventBus::new(),
        Arc::clone(&repo),
        EngineConfig::default(),
    );
    second.restore().await.unwrap();

    assert!(second.get_import(import.id()).await.unwrap_err().is_not_found());
    assert!(repo.list(Table::Imports).await.unwrap().is_empty());
}
