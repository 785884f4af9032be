// HTTP API tests: a real axum server on an ephemeral port, driven through the
// `RemoteClient` and, for the raw contract, through plain reqwest calls.

use std::sync::Arc;
use std::time::Duration;

use bloggy::client::RemoteClient;
use bloggy::error::AppError;
use bloggy::identity::{AuthProvider, AuthService, SessionProvider};
use bloggy::repository::ArticleRepository;
use bloggy::server::{self, AppState};
use bloggy::storage::{ArticleQuery, ArticleStore, MemoryStore, NewArticle};
use bloggy::views::{DetailView, ListScope, ListState, ListView, ViewContext};

async fn start_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(AuthService::default(), Arc::new(MemoryStore::new()));
    tokio::spawn(async move {
        let _ = server::serve(listener, state).await;
    });
    format!("http://{}", addr)
}

async fn signed_in(base: &str, email: &str) -> Arc<RemoteClient> {
    let c = Arc::new(RemoteClient::new(base).unwrap());
    c.sign_up(email, "password1").await.unwrap();
    c.sign_in_with_password(email, "password1").await.unwrap();
    c
}

fn draft(title: &str) -> NewArticle {
    NewArticle { title: title.into(), content: "body text".into(), owner_id: String::new() }
}

#[tokio::test]
async fn health_route_answers() {
    let base = start_server().await;
    let body = reqwest::get(format!("{base}/")).await.unwrap().text().await.unwrap();
    assert_eq!(body, "bloggy ok");
}

#[tokio::test]
async fn signup_login_and_current_user() {
    let base = start_server().await;
    let c = RemoteClient::new(&base).unwrap();
    assert_eq!(c.get_current_user().await.unwrap(), None);
    let created = c.sign_up("a@example.com", "password1").await.unwrap();
    let err = c.sign_up("a@example.com", "password1").await.unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));
    let err = c.sign_in_with_password("a@example.com", "wrong-pass").await.unwrap_err();
    assert!(matches!(err, AppError::Auth { .. }));

    let me = c.sign_in_with_password("a@example.com", "password1").await.unwrap();
    assert_eq!(me, created);
    assert_eq!(c.get_current_user().await.unwrap(), Some(me));
    c.sign_out().await.unwrap();
    assert_eq!(c.get_current_user().await.unwrap(), None);
}

#[tokio::test]
async fn owner_writes_and_foreign_writes_over_http() {
    let base = start_server().await;
    let u1 = signed_in(&base, "u1@example.com").await;
    let u2 = signed_in(&base, "u2@example.com").await;

    let a = u1.insert(draft("First")).await.unwrap();
    assert!(!a.owner_id.is_empty());
    assert_eq!(u2.get(&a.id).await.unwrap(), Some(a.clone()));

    let patch = bloggy::storage::ArticlePatch { title: "Hijacked".into(), content: "x".into() };
    let err = u2.update(&a.id, "ignored", patch).await.unwrap_err();
    assert!(matches!(err, AppError::Auth { .. }));
    let err = u2.delete(&a.id, "ignored").await.unwrap_err();
    assert!(matches!(err, AppError::Auth { .. }));

    let patch = bloggy::storage::ArticlePatch { title: "Second".into(), content: "new body".into() };
    assert_eq!(u1.update(&a.id, "ignored", patch).await.unwrap().title, "Second");
    u1.delete(&a.id, "ignored").await.unwrap();
    assert_eq!(u1.get(&a.id).await.unwrap(), None);
}

#[tokio::test]
async fn validation_and_pagination_over_http() {
    let base = start_server().await;
    let c = signed_in(&base, "p@example.com").await;
    let err = c.insert(draft("  ")).await.unwrap_err();
    assert_eq!(err.field(), Some("title"));

    for i in 0..21 { c.insert(draft(&format!("post {i}"))).await.unwrap(); }
    let page = c.query(&ArticleQuery { offset: 20, limit: 10, ..Default::default() }).await.unwrap();
    assert_eq!(page.total_count, 21);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].title, "post 0");
    let hits = c.query(&ArticleQuery { search: Some("POST 2".into()), limit: 10, ..Default::default() }).await.unwrap();
    assert_eq!(hits.total_count, 2); // "post 2" and "post 20"

    let err = c.query(&ArticleQuery { limit: 500, ..Default::default() }).await.unwrap_err();
    assert_eq!(err.field(), Some("limit"));
}

#[tokio::test]
async fn mutations_need_session_and_csrf() {
    let base = start_server().await;
    let http = reqwest::Client::new();
    let resp = http.post(format!("{base}/articles")).json(&serde_json::json!({"title":"t","content":"c"})).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"]["type"], "auth");

    http.post(format!("{base}/auth/signup")).json(&serde_json::json!({"email":"c@example.com","password":"password1"})).send().await.unwrap();
    let login = http.post(format!("{base}/auth/login")).json(&serde_json::json!({"email":"c@example.com","password":"password1"})).send().await.unwrap();
    let cookie = login.headers().get("set-cookie").unwrap().to_str().unwrap().split(';').next().unwrap().to_string();
    let resp = http
        .post(format!("{base}/articles"))
        .header("cookie", &cookie)
        .json(&serde_json::json!({"title":"t","content":"c"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn views_run_unchanged_over_the_remote_client() {
    let base = start_server().await;
    let author = signed_in(&base, "author@example.com").await;
    let a = author.insert(draft("Remote")).await.unwrap();

    let reader = signed_in(&base, "reader@example.com").await;
    let session = SessionProvider::start(reader.clone()).await;
    let ctx = ViewContext::new(ArticleRepository::new(reader.clone()), session, reader.clone()).with_debounce(Duration::ZERO);

    let home = ListView::new(ctx.clone(), ListScope::Home);
    home.mount().await;
    assert!(matches!(home.state(), ListState::Loaded { total_count: 1, .. }));

    let detail = DetailView::new(ctx.clone(), a.id.clone());
    detail.load().await;
    assert!(detail.article().is_some());
    assert!(!detail.can_mutate());

    let mine = ListView::new(ctx, ListScope::Mine);
    mine.mount().await;
    assert_eq!(mine.state(), ListState::Empty { searching: false });
}
