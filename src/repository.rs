//! Client-side resource repository over an [`ArticleStore`].
//!
//! Turns view-level requests (search text, 1-based page numbers, the current
//! identity) into store calls. Field validation runs before anything reaches the
//! store; ownership is left to the store, which is the real authority.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::identity::Identity;
use crate::storage::{validate_fields, Article, ArticlePatch, ArticleQuery, ArticleStore, NewArticle, Page};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub search_text: Option<String>,
}

impl SearchFilter {
    pub fn text<S: Into<String>>(s: S) -> Self { Self { search_text: Some(s.into()) } }

    pub fn is_active(&self) -> bool { self.search_text.as_deref().is_some_and(|s| !s.trim().is_empty()) }
}

/// 1-based page number and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self { Self { page: page.max(1), page_size } }

    pub fn first(page_size: u32) -> Self { Self::new(1, page_size) }

    pub fn offset(&self) -> usize { (self.page.max(1) as usize - 1) * self.page_size as usize }
}

/// `ceil(total_count / page_size)`; zero rows means zero pages.
pub fn total_pages(total_count: usize, page_size: u32) -> u32 {
    if page_size == 0 { return 0; }
    total_count.div_ceil(page_size as usize) as u32
}

fn require_identity(identity: Option<&Identity>, message: &str) -> AppResult<String> {
    identity.map(|i| i.id.clone()).ok_or_else(|| AppError::auth("no_session", message))
}

#[derive(Clone)]
pub struct ArticleRepository {
    store: Arc<dyn ArticleStore>,
}

impl ArticleRepository {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self { Self { store } }

    pub fn backend_tag(&self) -> &'static str { self.store.backend_tag() }

    pub async fn list(&self, filter: &SearchFilter, page: PageRequest) -> AppResult<Page<Article>> {
        self.query(filter, page, None).await
    }

    pub async fn list_by_owner(&self, identity: Option<&Identity>, filter: &SearchFilter, page: PageRequest) -> AppResult<Page<Article>> {
        let owner = require_identity(identity, "You must be logged in to see your articles")?;
        self.query(filter, page, Some(owner)).await
    }

    async fn query(&self, filter: &SearchFilter, page: PageRequest, owner_id: Option<String>) -> AppResult<Page<Article>> {
        if page.page_size == 0 {
            return Err(AppError::validation("page_size", "Page size must be at least 1"));
        }
        let q = ArticleQuery {
            search: filter.search_text.clone().filter(|_| filter.is_active()),
            owner_id,
            offset: page.offset(),
            limit: page.page_size as usize,
        };
        debug!(target: "bloggy::repository", "list page={} size={} search={:?} owner={:?}", page.page, page.page_size, q.search, q.owner_id);
        self.store.query(&q).await.inspect_err(|e| {
            warn!(target: "bloggy::repository", "list failed: {e}");
        })
    }

    pub async fn get_by_id(&self, id: &str) -> AppResult<Article> {
        debug!(target: "bloggy::repository", "get id={}", id);
        match self.store.get(id).await {
            Ok(Some(a)) => Ok(a),
            Ok(None) => Err(AppError::not_found("article_not_found", "Article not found")),
            Err(e) => {
                warn!(target: "bloggy::repository", "get id={} failed: {e}", id);
                Err(e)
            }
        }
    }

    /// The article only if `requester` owns it. Missing and foreign rows are
    /// indistinguishable to the caller.
    pub async fn get_owned(&self, id: &str, requester: Option<&Identity>) -> AppResult<Article> {
        let requester_id = require_identity(requester, "You must be logged in")?;
        match self.store.get(id).await? {
            Some(a) if a.owner_id == requester_id => Ok(a),
            _ => Err(AppError::not_found("article_not_found", "Failed to fetch article or you don't have permission")),
        }
    }

    pub async fn create(&self, title: &str, content: &str, identity: Option<&Identity>) -> AppResult<Article> {
        validate_fields(title, content)?;
        let owner_id = require_identity(identity, "You must be logged in to create an article")?;
        debug!(target: "bloggy::repository", "create owner={}", owner_id);
        let new = NewArticle { title: title.to_string(), content: content.to_string(), owner_id };
        self.store.insert(new).await.inspect_err(|e| {
            warn!(target: "bloggy::repository", "create failed: {e}");
        })
    }

    pub async fn update(&self, id: &str, title: &str, content: &str, requester: Option<&Identity>) -> AppResult<Article> {
        validate_fields(title, content)?;
        let requester_id = require_identity(requester, "You must be logged in")?;
        debug!(target: "bloggy::repository", "update id={} requester={}", id, requester_id);
        let patch = ArticlePatch { title: title.to_string(), content: content.to_string() };
        self.store.update(id, &requester_id, patch).await.inspect_err(|e| {
            warn!(target: "bloggy::repository", "update id={} failed: {e}", id);
        })
    }

    pub async fn delete(&self, id: &str, requester: Option<&Identity>) -> AppResult<()> {
        let requester_id = require_identity(requester, "You must be logged in")?;
        debug!(target: "bloggy::repository", "delete id={} requester={}", id, requester_id);
        self.store.delete(id, &requester_id).await.inspect_err(|e| {
            warn!(target: "bloggy::repository", "delete id={} failed: {e}", id);
        })
    }
}

#[cfg(test)]
#[path = "repository_tests.rs"]
mod repository_tests;
