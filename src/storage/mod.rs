//!
//! bloggy storage module
//! ---------------------
//! The article collection and the contract every backend for it honours.
//!
//! Key responsibilities:
//! - Article row types and the query shape (search text, owner filter, offset/limit window).
//! - The `ArticleStore` trait: filtered/ordered/paginated reads and owner-scoped writes.
//! - `MemoryStore`, the authoritative in-process implementation, optionally snapshotted
//!   to disk after every write.
//!
//! Stores are the authorization boundary for writes: update and delete succeed only
//! when the requester owns the row, whatever the caller checked beforehand.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

mod memory;
pub mod snapshot;

pub use memory::MemoryStore;

/// A user-authored text article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Identity that created the row. Never changes after insert.
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub owner_id: String,
}

/// The mutable columns of an article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArticlePatch {
    pub title: String,
    pub content: String,
}

/// One read against the collection. `search` matches title or content,
/// case-insensitive substring; blank text means no filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleQuery {
    pub search: Option<String>,
    pub owner_id: Option<String>,
    pub offset: usize,
    pub limit: usize,
}

/// A window of rows plus the count of all rows matching the filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
}

impl<T> Default for Page<T> {
    fn default() -> Self { Self { items: Vec::new(), total_count: 0 } }
}

impl ArticleQuery {
    /// Lower-cased search needle, `None` when blank.
    pub fn needle(&self) -> Option<String> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(|s| s.to_lowercase())
    }

    pub fn matches(&self, article: &Article) -> bool {
        if let Some(owner) = &self.owner_id {
            if &article.owner_id != owner { return false; }
        }
        match self.needle() {
            Some(n) => article.title.to_lowercase().contains(&n) || article.content.to_lowercase().contains(&n),
            None => true,
        }
    }
}

/// Newest first; equal timestamps fall back to id, descending.
pub fn sort_newest_first(rows: &mut [Article]) {
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

/// Required-field checks applied by every writer, client and store alike.
/// Title is checked before content.
pub fn validate_fields(title: &str, content: &str) -> AppResult<()> {
    if title.trim().is_empty() { return Err(AppError::validation("title", "Title is required")); }
    if content.trim().is_empty() { return Err(AppError::validation("content", "Content is required")); }
    Ok(())
}

pub(crate) fn article_not_found() -> AppError { AppError::not_found("article_not_found", "Article not found") }

pub(crate) fn not_owner() -> AppError {
    AppError::auth("not_owner", "You do not have permission to modify this article")
}

/// Backend contract for the article collection.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    /// Filtered rows, newest first, windowed by offset/limit. `total_count`
    /// ignores the window. A window past the end yields no items.
    async fn query(&self, query: &ArticleQuery) -> AppResult<Page<Article>>;

    async fn get(&self, id: &str) -> AppResult<Option<Article>>;

    async fn insert(&self, new: NewArticle) -> AppResult<Article>;

    /// Replace title and content. `NotFound` when no row has `id`; `Auth` when the
    /// row belongs to someone other than `requester_id`.
    async fn update(&self, id: &str, requester_id: &str, patch: ArticlePatch) -> AppResult<Article>;

    /// Same ownership rules as `update`.
    async fn delete(&self, id: &str, requester_id: &str) -> AppResult<()>;
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod storage_tests;
