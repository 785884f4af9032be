//! HTTP client for a remote bloggy server.
//!
//! [`RemoteClient`] implements both client contracts, [`AuthProvider`] and
//! [`ArticleStore`], so views can run against a server exactly as they do against
//! the in-process backend. The session cookie and CSRF token captured at login are
//! replayed on every request; error bodies are decoded back into [`AppError`].

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
use reqwest::{Method, Url};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::identity::{AuthEvent, AuthProvider, Identity, EVENT_CAPACITY};
use crate::server::{CSRF_HEADER, SESSION_COOKIE};
use crate::storage::{Article, ArticlePatch, ArticleQuery, ArticleStore, NewArticle, Page};

#[derive(Clone)]
struct RemoteSession {
    /// `bloggy_session=<token>` as sent in the Cookie header.
    cookie: String,
    csrf: String,
}

pub struct RemoteClient {
    base: Url,
    http: reqwest::Client,
    session: RwLock<Option<RemoteSession>>,
    events: broadcast::Sender<AuthEvent>,
}

impl RemoteClient {
    pub fn new(base: &str) -> AppResult<Self> {
        let base = Url::parse(base).map_err(|e| AppError::validation("url", format!("invalid base URL: {e}")))?;
        let http = reqwest::Client::builder().build()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self { base, http, session: RwLock::new(None), events })
    }

    pub fn base(&self) -> &Url { &self.base }

    pub fn is_signed_in(&self) -> bool { self.session.read().is_some() }

    fn url(&self, path: &str) -> AppResult<Url> {
        self.base.join(path).map_err(|e| AppError::internal("url", e.to_string()))
    }

    fn article_url(&self, id: &str) -> AppResult<Url> {
        self.url(&format!("/articles/{}", urlencoding::encode(id)))
    }

    fn session_headers(&self, mutating: bool) -> AppResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(s) = self.session.read().as_ref() {
            headers.insert(COOKIE, HeaderValue::from_str(&s.cookie).map_err(|e| AppError::internal("cookie", e.to_string()))?);
            if mutating {
                headers.insert(CSRF_HEADER, HeaderValue::from_str(&s.csrf).map_err(|e| AppError::internal("csrf", e.to_string()))?);
            }
        }
        Ok(headers)
    }

    /// Send one request and return the decoded JSON body of a success response.
    async fn call(&self, method: Method, url: Url, query: &[(&str, String)], body: Option<Value>) -> AppResult<(HeaderMap, Value)> {
        let mutating = method != Method::GET;
        debug!(target: "bloggy::client", "{} {}", method, url);
        let mut req = self.http.request(method, url).headers(self.session_headers(mutating)?);
        if !query.is_empty() { req = req.query(query); }
        if let Some(b) = body { req = req.json(&b); }
        let resp = req.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let text = resp.text().await?;
        let value: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        if status.is_success() {
            return Ok((headers, value));
        }
        Err(decode_error(status.as_u16(), value, &text))
    }

    async fn call_json(&self, method: Method, url: Url, query: &[(&str, String)], body: Option<Value>) -> AppResult<Value> {
        Ok(self.call(method, url, query, body).await?.1)
    }
}

/// Error body written by the server, or a transport-level error for anything else.
fn decode_error(status: u16, mut body: Value, raw: &str) -> AppError {
    match serde_json::from_value::<AppError>(body.get_mut("error").map(Value::take).unwrap_or(Value::Null)) {
        Ok(e) => e,
        Err(_) => AppError::network(format!("http_{status}"), format!("HTTP {status}: {}", raw.chars().take(200).collect::<String>())),
    }
}

fn take_field<T: serde::de::DeserializeOwned>(body: &mut Value, key: &str) -> AppResult<T> {
    Ok(serde_json::from_value(body.get_mut(key).map(Value::take).unwrap_or(Value::Null))?)
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers.get_all(SET_COOKIE).iter().filter_map(|v| v.to_str().ok()).find_map(|s| {
        let (nv, _) = s.split_once(';').unwrap_or((s, ""));
        let nv = nv.trim();
        nv.starts_with(&format!("{}=", SESSION_COOKIE)).then(|| nv.to_string())
    })
}

#[async_trait]
impl AuthProvider for RemoteClient {
    async fn sign_up(&self, email: &str, password: &str) -> AppResult<Identity> {
        let mut v = self.call_json(Method::POST, self.url("/auth/signup")?, &[], Some(json!({"email": email, "password": password}))).await?;
        take_field(&mut v, "user")
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AppResult<Identity> {
        let (headers, mut v) = self.call(Method::POST, self.url("/auth/login")?, &[], Some(json!({"email": email, "password": password}))).await?;
        let cookie = session_cookie(&headers).ok_or_else(|| AppError::network("no_cookie", "login response carried no session cookie"))?;
        let csrf: String = take_field(&mut v, "csrf")?;
        let identity: Identity = take_field(&mut v, "user")?;
        *self.session.write() = Some(RemoteSession { cookie, csrf });
        info!(target: "bloggy::client", "signed in to {} as {}", self.base, identity.email);
        let _ = self.events.send(AuthEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> AppResult<()> {
        if !self.is_signed_in() { return Ok(()); }
        let result = self.call_json(Method::POST, self.url("/auth/logout")?, &[], None).await;
        // The local session is gone either way.
        *self.session.write() = None;
        let _ = self.events.send(AuthEvent::SignedOut);
        result.map(|_| ())
    }

    async fn get_current_user(&self) -> AppResult<Option<Identity>> {
        if !self.is_signed_in() { return Ok(None); }
        let mut v = self.call_json(Method::GET, self.url("/auth/user")?, &[], None).await?;
        take_field(&mut v, "user")
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> { self.events.subscribe() }
}

#[async_trait]
impl ArticleStore for RemoteClient {
    fn backend_tag(&self) -> &'static str { "http" }

    /// `owner_id` is resolved by the server from the session; any value means "mine".
    async fn query(&self, query: &ArticleQuery) -> AppResult<Page<Article>> {
        let mut params = vec![("offset", query.offset.to_string()), ("limit", query.limit.to_string())];
        if let Some(s) = query.needle() { params.push(("search", s)); }
        if query.owner_id.is_some() { params.push(("mine", "true".to_string())); }
        let mut v = self.call_json(Method::GET, self.url("/articles")?, &params, None).await?;
        Ok(Page { items: take_field(&mut v, "items")?, total_count: take_field(&mut v, "total_count")? })
    }

    async fn get(&self, id: &str) -> AppResult<Option<Article>> {
        match self.call_json(Method::GET, self.article_url(id)?, &[], None).await {
            Ok(mut v) => Ok(Some(take_field(&mut v, "article")?)),
            Err(AppError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn insert(&self, new: NewArticle) -> AppResult<Article> {
        let body = json!({"title": new.title, "content": new.content});
        let mut v = self.call_json(Method::POST, self.url("/articles")?, &[], Some(body)).await?;
        take_field(&mut v, "article")
    }

    async fn update(&self, id: &str, _requester_id: &str, patch: ArticlePatch) -> AppResult<Article> {
        let body = json!({"title": patch.title, "content": patch.content});
        let mut v = self.call_json(Method::PUT, self.article_url(id)?, &[], Some(body)).await?;
        take_field(&mut v, "article")
    }

    async fn delete(&self, id: &str, _requester_id: &str) -> AppResult<()> {
        self.call_json(Method::DELETE, self.article_url(id)?, &[], None).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_bodies_decode_to_app_errors() {
        let body = json!({"status":"error","error":{"type":"auth","code":"not_owner","message":"nope"}});
        assert_eq!(decode_error(401, body, ""), AppError::auth("not_owner", "nope"));
        let e = decode_error(502, Value::Null, "<html>bad gateway</html>");
        assert!(matches!(e, AppError::Network { .. }));
        assert_eq!(e.code_str(), "http_502");
    }

    #[test]
    fn picks_session_cookie_out_of_set_cookie_headers() {
        let mut h = HeaderMap::new();
        h.append(SET_COOKIE, HeaderValue::from_static("theme=dark; Path=/"));
        h.append(SET_COOKIE, HeaderValue::from_static("bloggy_session=abc; HttpOnly; Path=/"));
        assert_eq!(session_cookie(&h).as_deref(), Some("bloggy_session=abc"));
        assert_eq!(session_cookie(&HeaderMap::new()), None);
    }

    #[test]
    fn ids_are_url_encoded() {
        let c = RemoteClient::new("http://127.0.0.1:7878").unwrap();
        assert_eq!(c.article_url("a b/c").unwrap().path(), "/articles/a%20b%2Fc");
        assert!(RemoteClient::new("not a url").is_err());
    }
}
