//!
//! bloggy HTTP server
//! ------------------
//! Axum-based JSON API over the account registry, the session table and the
//! article store.
//!
//! Responsibilities:
//! - Session management with a cookie (`bloggy_session`) plus a per-session CSRF token
//!   that every mutating request after login must echo in `x-csrf-token`.
//! - Signup, login, logout and current-user endpoints backed by [`AuthService`].
//! - Article list/search/pagination and owner-checked create, update and delete
//!   delegating to an [`ArticleStore`].
//! - Errors are rendered by `AppError`'s `IntoResponse` impl as
//!   `{"status":"error","error":{type,code,message}}`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use anyhow::Context;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::{Config, DEFAULT_PAGE_SIZE};
use crate::error::{AppError, AppResult};
use crate::identity::{AccountStore, AuthService, RequestContext, Session, SessionManager};
use crate::storage::{ArticlePatch, ArticleQuery, ArticleStore, MemoryStore, NewArticle};

pub const SESSION_COOKIE: &str = "bloggy_session";
pub const CSRF_HEADER: &str = "x-csrf-token";
/// Upper bound on `limit` for list requests.
pub const MAX_LIMIT: usize = 100;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub store: Arc<dyn ArticleStore>,
}

impl AppState {
    pub fn new(auth: AuthService, store: Arc<dyn ArticleStore>) -> Self { Self { auth, store } }

    /// Memory-only state, or state persisted under `cfg.data_dir` when set.
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let sessions = SessionManager::new(cfg.session_ttl);
        match &cfg.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create or access data directory: {}", dir.display()))?;
                let auth = AuthService::open(dir, sessions)
                    .with_context(|| format!("While loading accounts under: {}", dir.display()))?;
                let store = MemoryStore::open_in(dir)
                    .with_context(|| format!("While loading articles under: {}", dir.display()))?;
                Ok(Self::new(auth, Arc::new(store)))
            }
            None => Ok(Self::new(AuthService::new(AccountStore::in_memory(), sessions), Arc::new(MemoryStore::new()))),
        }
    }

    fn session(&self, headers: &HeaderMap) -> Option<Session> {
        let token = parse_cookie(headers, SESSION_COOKIE)?;
        self.auth.sessions.get(&token)
    }

    fn request_context(&self, headers: &HeaderMap) -> RequestContext {
        match self.session(headers) {
            Some(s) => RequestContext { identity: Some(s.identity) },
            None => RequestContext::default(),
        }
    }

    /// Session of a mutating request: must be signed in and carry the matching CSRF token.
    fn require_mutation(&self, headers: &HeaderMap) -> AppResult<Session> {
        let session = self.session(headers).ok_or_else(|| AppError::auth("no_session", "You must be logged in"))?;
        let provided = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(session.csrf.as_str()) {
            warn!(target: "bloggy::server", "csrf check failed user={}", session.identity.id);
            return Err(AppError::forbidden("invalid_csrf", "invalid csrf"));
        }
        Ok(session)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "bloggy ok" }))
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/user", get(current_user))
        .route("/csrf", get(get_csrf))
        .route("/articles", get(list_articles).post(create_article))
        .route("/articles/{id}", get(get_article).put(update_article).delete(delete_article))
        .with_state(state)
}

/// Serve on an already-bound listener.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(target: "bloggy::server", "listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Start the bloggy HTTP server described by `cfg`.
pub async fn run(cfg: Config) -> anyhow::Result<()> {
    info!(
        target: "bloggy::server",
        "bloggy starting: bind={} port={} data_dir={:?} session_ttl={}s",
        cfg.bind, cfg.http_port, cfg.data_dir, cfg.session_ttl.as_secs()
    );
    let state = AppState::from_config(&cfg)?;
    info!(target: "bloggy::server", "accounts={} articles backend={}", state.auth.accounts.len(), state.store.backend_tag());
    let listener = tokio::net::TcpListener::bind(cfg.listen_addr())
        .await
        .with_context(|| format!("Failed to bind {}", cfg.listen_addr()))?;
    serve(listener, state).await
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie")?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        if let Some((k, v)) = part.trim().split_once('=') {
            if k == name && !v.is_empty() { return Some(v.to_string()); }
        }
    }
    None
}

fn set_session_cookie(token: &str, max_age_secs: u64) -> AppResult<HeaderValue> {
    // HttpOnly cookie scoped to path / with SameSite=Strict
    HeaderValue::from_str(&format!("{}={}; HttpOnly; Secure; SameSite=Strict; Path=/; Max-Age={}", SESSION_COOKIE, token, max_age_secs))
        .map_err(|e| AppError::internal("cookie", e.to_string()))
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("bloggy_session=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/")
}

#[derive(Debug, Deserialize)]
struct CredentialsPayload {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct ArticlePayload {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    search: Option<String>,
    offset: Option<usize>,
    limit: Option<usize>,
    #[serde(default)]
    mine: bool,
}

async fn signup(State(state): State<AppState>, Json(payload): Json<CredentialsPayload>) -> AppResult<impl IntoResponse> {
    let user = state.auth.sign_up(&payload.email, &payload.password)?;
    info!(target: "bloggy::server", "signup user={}", user.id);
    Ok((StatusCode::OK, Json(json!({"status":"ok","user": user}))))
}

async fn login(State(state): State<AppState>, headers: HeaderMap, Json(payload): Json<CredentialsPayload>) -> AppResult<impl IntoResponse> {
    let session = state.auth.login(&payload.email, &payload.password)?;
    if let Some(old) = parse_cookie(&headers, SESSION_COOKIE) { state.auth.logout(&old); }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", set_session_cookie(&session.token, state.auth.sessions.ttl.as_secs())?);
    Ok((StatusCode::OK, h, Json(json!({"status":"ok","user": session.identity,"csrf": session.csrf}))))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<impl IntoResponse> {
    // A request without a live session has nothing to protect.
    if state.session(&headers).is_some() {
        let session = state.require_mutation(&headers)?;
        state.auth.logout(&session.token);
        info!(target: "bloggy::server", "logout user={}", session.identity.id);
    }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    Ok((StatusCode::OK, h, Json(json!({"status":"ok"}))))
}

async fn current_user(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let ctx = state.request_context(&headers);
    (StatusCode::OK, Json(json!({"status":"ok","user": ctx.identity})))
}

async fn get_csrf(State(state): State<AppState>, headers: HeaderMap) -> AppResult<impl IntoResponse> {
    let session = state.session(&headers).ok_or_else(|| AppError::auth("no_session", "You must be logged in"))?;
    Ok((StatusCode::OK, Json(json!({"status":"ok","csrf": session.csrf}))))
}

async fn list_articles(State(state): State<AppState>, headers: HeaderMap, Query(params): Query<ListParams>) -> AppResult<impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE as usize);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(AppError::validation("limit", format!("limit must be between 1 and {}", MAX_LIMIT)));
    }
    let owner_id = if params.mine {
        let ctx = state.request_context(&headers);
        let id = ctx.requester_id().ok_or_else(|| AppError::auth("no_session", "You must be logged in to see your articles"))?;
        Some(id.to_string())
    } else {
        None
    };
    let q = ArticleQuery { search: params.search, owner_id, offset: params.offset.unwrap_or(0), limit };
    let page = state.store.query(&q).await?;
    debug!(target: "bloggy::server", "list offset={} limit={} -> {}/{}", q.offset, q.limit, page.items.len(), page.total_count);
    Ok((StatusCode::OK, Json(json!({"status":"ok","items": page.items,"total_count": page.total_count}))))
}

async fn get_article(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<impl IntoResponse> {
    let article = state.store.get(&id).await?.ok_or_else(|| AppError::not_found("article_not_found", "Article not found"))?;
    Ok((StatusCode::OK, Json(json!({"status":"ok","article": article}))))
}

async fn create_article(State(state): State<AppState>, headers: HeaderMap, Json(payload): Json<ArticlePayload>) -> AppResult<impl IntoResponse> {
    let session = state.require_mutation(&headers)?;
    let new = NewArticle { title: payload.title, content: payload.content, owner_id: session.identity.id };
    let article = state.store.insert(new).await?;
    Ok((StatusCode::OK, Json(json!({"status":"ok","article": article}))))
}

async fn update_article(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<ArticlePayload>,
) -> AppResult<impl IntoResponse> {
    let session = state.require_mutation(&headers)?;
    let patch = ArticlePatch { title: payload.title, content: payload.content };
    let article = state.store.update(&id, &session.identity.id, patch).await?;
    Ok((StatusCode::OK, Json(json!({"status":"ok","article": article}))))
}

async fn delete_article(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<String>) -> AppResult<impl IntoResponse> {
    let session = state.require_mutation(&headers)?;
    state.store.delete(&id, &session.identity.id).await?;
    Ok((StatusCode::OK, Json(json!({"status":"ok"}))))
}
