use super::*;

async fn memory_storage() -> Storage {
    Storage::new("sqlite::memory:").await.expect("db")
}

fn queries(entries: &[SearchHistoryEntry]) -> Vec<&str> {
    entries.iter().map(|entry| entry.query.as_str()).collect()
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = memory_storage().await;
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn lists_history_most_recent_first() {
    let storage = memory_storage().await;
    for query in ["business", "nursing", "data science"] {
        assert!(storage.record_search(query, 10).await.expect("record"));
    }

    let history = storage.list_search_history(10).await.expect("history");
    assert_eq!(queries(&history), vec!["data science", "nursing", "business"]);
}

#[tokio::test]
async fn duplicate_query_keeps_original_position() {
    let storage = memory_storage().await;
    storage.record_search("business", 10).await.expect("first");
    storage.record_search("nursing", 10).await.expect("second");
    let inserted = storage.record_search("business", 10).await.expect("repeat");

    assert!(!inserted);
    let history = storage.list_search_history(10).await.expect("history");
    assert_eq!(queries(&history), vec!["nursing", "business"]);
}

#[tokio::test]
async fn caps_history_to_most_recent_entries() {
    let storage = memory_storage().await;
    for index in 0..12 {
        storage
            .record_search(&format!("query {index}"), DEFAULT_HISTORY_CAP)
            .await
            .expect("record");
    }

    let history = storage.list_search_history(50).await.expect("history");
    assert_eq!(history.len(), DEFAULT_HISTORY_CAP);
    assert_eq!(history[0].query, "query 11");
    assert_eq!(history[DEFAULT_HISTORY_CAP - 1].query, "query 2");
}

#[tokio::test]
async fn blank_queries_are_not_recorded() {
    let storage = memory_storage().await;
    assert!(!storage.record_search("   ", 10).await.expect("blank"));
    assert!(storage
        .list_search_history(10)
        .await
        .expect("history")
        .is_empty());
}

#[tokio::test]
async fn clear_removes_every_entry() {
    let storage = memory_storage().await;
    storage.record_search("business", 10).await.expect("record");
    storage.record_search("law", 10).await.expect("record");

    assert_eq!(storage.clear_search_history().await.expect("clear"), 2);
    assert!(storage
        .list_search_history(10)
        .await
        .expect("history")
        .is_empty());
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("catalog_storage_test_{suffix}"));
    let db_path = temp_root.join("nested").join("history.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    storage.record_search("business", 10).await.expect("record");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}

#[test]
fn memory_urls_have_no_filesystem_path() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(
        sqlite_path("sqlite://./data/history.db?mode=rwc"),
        Some(PathBuf::from("./data/history.db"))
    );
}

#[test]
fn plain_paths_become_sqlite_urls() {
    assert_eq!(sqlite_url("./data/history.db"), "sqlite://./data/history.db");
    assert_eq!(sqlite_url(" sqlite:data\\history.db "), "sqlite://data/history.db");
    assert_eq!(sqlite_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(
        sqlite_url("sqlite://./data/history.db?mode=rwc"),
        "sqlite://./data/history.db?mode=rwc"
    );
}

#[tokio::test]
async fn opens_database_from_plain_path() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("catalog_storage_plain_{suffix}"));
    let db_path = temp_root.join("history.db");

    let storage = Storage::new(&db_path.to_string_lossy()).await.expect("db");
    storage.record_search("nursing", 10).await.expect("record");
    drop(storage);

    assert!(db_path.exists());
    std::fs::remove_dir_all(temp_root).expect("cleanup");
}
