use super::*;

fn draft(title: &str, content: &str, owner: &str) -> NewArticle {
    NewArticle { title: title.into(), content: content.into(), owner_id: owner.into() }
}

fn window(offset: usize, limit: usize) -> ArticleQuery {
    ArticleQuery { offset, limit, ..Default::default() }
}

async fn seeded(n: usize) -> MemoryStore {
    let store = MemoryStore::new();
    for i in 0..n {
        store.insert(draft(&format!("post {i}"), &format!("body {i}"), if i % 2 == 0 { "u1" } else { "u2" })).await.unwrap();
    }
    store
}

#[tokio::test]
async fn query_orders_newest_first() {
    let store = seeded(5).await;
    let page = store.query(&window(0, 10)).await.unwrap();
    let titles: Vec<&str> = page.items.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["post 4", "post 3", "post 2", "post 1", "post 0"]);
    assert_eq!(page.total_count, 5);
}

#[tokio::test]
async fn total_count_ignores_window() {
    let store = seeded(21).await;
    let page = store.query(&window(10, 10)).await.unwrap();
    assert_eq!(page.items.len(), 10);
    assert_eq!(page.total_count, 21);
    let last = store.query(&window(20, 10)).await.unwrap();
    assert_eq!(last.items.len(), 1);
    let past = store.query(&window(30, 10)).await.unwrap();
    assert!(past.items.is_empty());
    assert_eq!(past.total_count, 21);
}

#[tokio::test]
async fn search_matches_title_or_content_case_insensitively() {
    let store = MemoryStore::new();
    store.insert(draft("Rust ownership", "borrowing rules", "u1")).await.unwrap();
    store.insert(draft("Gardening", "Tomatoes love RUST-free tools", "u2")).await.unwrap();
    store.insert(draft("Cooking", "pasta", "u1")).await.unwrap();

    let q = ArticleQuery { search: Some("rust".into()), limit: 10, ..Default::default() };
    let page = store.query(&q).await.unwrap();
    assert_eq!(page.total_count, 2);
    assert_eq!(page.items[0].title, "Gardening");
    assert_eq!(page.items[1].title, "Rust ownership");
}

#[tokio::test]
async fn blank_search_equals_unfiltered() {
    let store = seeded(4).await;
    let plain = store.query(&window(0, 10)).await.unwrap();
    for blank in ["", "   "] {
        let q = ArticleQuery { search: Some(blank.into()), limit: 10, ..Default::default() };
        assert_eq!(store.query(&q).await.unwrap(), plain);
    }
}

#[tokio::test]
async fn owner_filter_restricts_rows() {
    let store = seeded(5).await;
    let q = ArticleQuery { owner_id: Some("u2".into()), limit: 10, ..Default::default() };
    let page = store.query(&q).await.unwrap();
    assert_eq!(page.total_count, 2);
    assert!(page.items.iter().all(|a| a.owner_id == "u2"));
}

#[tokio::test]
async fn insert_validates_fields() {
    let store = MemoryStore::new();
    let err = store.insert(draft("  ", "body", "u1")).await.unwrap_err();
    assert_eq!(err.field(), Some("title"));
    let err = store.insert(draft("title", "\n", "u1")).await.unwrap_err();
    assert_eq!(err.field(), Some("content"));
    let err = store.insert(draft("title", "body", "")).await.unwrap_err();
    assert_eq!(err.http_status(), 401);
    assert!(store.is_empty());
}

#[tokio::test]
async fn update_by_owner_keeps_owner_and_created_at() {
    let store = MemoryStore::new();
    let a = store.insert(draft("old", "old body", "u1")).await.unwrap();
    let patch = ArticlePatch { title: "new".into(), content: "new body".into() };
    let b = store.update(&a.id, "u1", patch).await.unwrap();
    assert_eq!(b.title, "new");
    assert_eq!(b.owner_id, "u1");
    assert_eq!(b.created_at, a.created_at);
    assert!(b.updated_at >= a.updated_at);
}

#[tokio::test]
async fn non_owner_writes_are_rejected_and_leave_row_intact() {
    let store = MemoryStore::new();
    let a = store.insert(draft("mine", "body", "u1")).await.unwrap();
    let patch = ArticlePatch { title: "hijacked".into(), content: "x".into() };
    let err = store.update(&a.id, "u2", patch).await.unwrap_err();
    assert_eq!(err.code_str(), "not_owner");
    let err = store.delete(&a.id, "u2").await.unwrap_err();
    assert_eq!(err.code_str(), "not_owner");
    assert_eq!(store.get(&a.id).await.unwrap(), Some(a));
}

#[tokio::test]
async fn missing_rows_are_not_found() {
    let store = MemoryStore::new();
    let patch = ArticlePatch { title: "t".into(), content: "c".into() };
    assert_eq!(store.update("missing", "u1", patch).await.unwrap_err().http_status(), 404);
    assert_eq!(store.delete("missing", "u1").await.unwrap_err().http_status(), 404);
    assert_eq!(store.get("missing").await.unwrap(), None);
}

#[tokio::test]
async fn delete_by_owner_removes_row() {
    let store = seeded(1).await;
    let id = store.query(&window(0, 1)).await.unwrap().items[0].id.clone();
    store.delete(&id, "u1").await.unwrap();
    assert!(store.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn snapshot_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let store = MemoryStore::open_in(tmp.path()).unwrap();
    let kept = store.insert(draft("kept", "body", "u1")).await.unwrap();
    let gone = store.insert(draft("gone", "body", "u1")).await.unwrap();
    store.delete(&gone.id, "u1").await.unwrap();

    let reopened = MemoryStore::open_in(tmp.path()).unwrap();
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.get(&kept.id).await.unwrap(), Some(kept.clone()));
    // New rows still sort after the reloaded ones.
    let newer = reopened.insert(draft("newer", "body", "u2")).await.unwrap();
    assert!(newer.created_at > kept.created_at);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_inserts_all_reach_the_snapshot() {
    let tmp = tempfile::tempdir().unwrap();
    let store = MemoryStore::open_in(tmp.path()).unwrap();
    let tasks: Vec<_> = (0..200)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.insert(draft(&format!("post {i}"), "body", "u1")).await })
        })
        .collect();
    for t in tasks {
        t.await.unwrap().unwrap();
    }
    assert_eq!(store.len(), 200);
    assert_eq!(MemoryStore::open_in(tmp.path()).unwrap().len(), 200);
}

#[tokio::test]
async fn failed_snapshot_rolls_the_write_back() {
    let tmp = tempfile::tempdir().unwrap();
    let store = MemoryStore::open_in(tmp.path()).unwrap();
    let kept = store.insert(draft("kept", "body", "u1")).await.unwrap();

    // Replace the snapshot file with a directory so every later save fails.
    let path = tmp.path().join("articles.json");
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();

    let err = store.insert(draft("lost", "body", "u1")).await.unwrap_err();
    assert_eq!(err.code_str(), "snapshot");
    assert_eq!(store.len(), 1);

    let patch = ArticlePatch { title: "changed".into(), content: "x".into() };
    assert!(store.update(&kept.id, "u1", patch).await.is_err());
    assert!(store.delete(&kept.id, "u1").await.is_err());
    assert_eq!(store.get(&kept.id).await.unwrap(), Some(kept));
}
