use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{
    article_not_found, not_owner, snapshot, sort_newest_first, validate_fields, Article, ArticlePatch, ArticleQuery,
    ArticleStore, NewArticle, Page,
};
use crate::error::{AppError, AppResult};
use crate::identity::is_owner;

#[derive(Default)]
struct Rows {
    by_id: HashMap<String, Article>,
    /// Last handed-out creation stamp; new rows are stamped strictly after it so
    /// insertion order survives coarse clocks.
    last_created: Option<DateTime<Utc>>,
}

/// How to take back a mutation whose snapshot could not be written.
enum Undo {
    Remove(String),
    Restore(Article),
}

/// In-process article collection guarded by a `parking_lot::RwLock`.
/// Cloning shares the same rows.
///
/// Writers hold `write_gate` from the mutation until its snapshot is on disk, so
/// snapshots land in mutation order. A failed snapshot undoes the mutation.
#[derive(Clone, Default)]
pub struct MemoryStore {
    rows: Arc<RwLock<Rows>>,
    write_gate: Arc<Mutex<()>>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Store persisted to `path`, loading existing rows.
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let entries: Vec<Article> = snapshot::load_entries(&path)?;
        let last_created = entries.iter().map(|a| a.created_at).max();
        let by_id = entries.into_iter().map(|a| (a.id.clone(), a)).collect::<HashMap<_, _>>();
        info!(target: "bloggy::storage", "articles loaded: {} from '{}'", by_id.len(), path.display());
        Ok(Self { rows: Arc::new(RwLock::new(Rows { by_id, last_created })), write_gate: Arc::default(), snapshot: Some(path) })
    }

    /// Articles persisted under `dir/articles.json`.
    pub fn open_in(dir: &Path) -> anyhow::Result<Self> { Self::open(dir.join("articles.json")) }

    pub fn len(&self) -> usize { self.rows.read().by_id.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn persist(&self) -> AppResult<()> {
        let Some(path) = &self.snapshot else { return Ok(()); };
        let mut rows: Vec<Article> = self.rows.read().by_id.values().cloned().collect();
        sort_newest_first(&mut rows);
        snapshot::save_entries(path, &rows).map_err(|e| {
            warn!(target: "bloggy::storage", "article snapshot failed: {e:#}");
            AppError::internal("snapshot", e.to_string())
        })
    }

    /// Apply one mutation and write it through.
    fn commit<R>(&self, mutate: impl FnOnce(&mut Rows) -> AppResult<(R, Undo)>) -> AppResult<R> {
        let _gate = self.write_gate.lock();
        let (out, undo) = mutate(&mut *self.rows.write())?;
        if let Err(e) = self.persist() {
            let mut rows = self.rows.write();
            match undo {
                Undo::Remove(id) => { rows.by_id.remove(&id); }
                Undo::Restore(article) => { rows.by_id.insert(article.id.clone(), article); }
            }
            return Err(e);
        }
        Ok(out)
    }
}

/// Owner check on one row, under the caller's lock.
fn owned_row<'a>(rows: &'a mut Rows, id: &str, requester_id: &str) -> AppResult<&'a mut Article> {
    let Some(row) = rows.by_id.get_mut(id) else { return Err(article_not_found()); };
    if !is_owner(requester_id, row) {
        debug!(target: "bloggy::storage", "owner check failed id={} requester={}", id, requester_id);
        return Err(not_owner());
    }
    Ok(row)
}

#[async_trait]
impl ArticleStore for MemoryStore {
    fn backend_tag(&self) -> &'static str { "memory" }

    async fn query(&self, query: &ArticleQuery) -> AppResult<Page<Article>> {
        let mut hits: Vec<Article> = self.rows.read().by_id.values().filter(|a| query.matches(a)).cloned().collect();
        sort_newest_first(&mut hits);
        let total_count = hits.len();
        let items: Vec<Article> = hits.into_iter().skip(query.offset).take(query.limit).collect();
        debug!(
            target: "bloggy::storage",
            "query search={:?} owner={:?} offset={} limit={} -> {}/{}",
            query.search, query.owner_id, query.offset, query.limit, items.len(), total_count
        );
        Ok(Page { items, total_count })
    }

    async fn get(&self, id: &str) -> AppResult<Option<Article>> {
        Ok(self.rows.read().by_id.get(id).cloned())
    }

    async fn insert(&self, new: NewArticle) -> AppResult<Article> {
        validate_fields(&new.title, &new.content)?;
        if new.owner_id.is_empty() {
            return Err(AppError::auth("no_session", "You must be logged in"));
        }
        let article = self.commit(|rows| {
            let mut created_at = Utc::now();
            if let Some(last) = rows.last_created {
                if created_at <= last { created_at = last + Duration::microseconds(1); }
            }
            rows.last_created = Some(created_at);
            let article = Article {
                id: uuid::Uuid::new_v4().to_string(),
                title: new.title,
                content: new.content,
                owner_id: new.owner_id,
                created_at,
                updated_at: created_at,
            };
            rows.by_id.insert(article.id.clone(), article.clone());
            let undo = Undo::Remove(article.id.clone());
            Ok((article, undo))
        })?;
        info!(target: "bloggy::storage", "article created id={} owner={}", article.id, article.owner_id);
        Ok(article)
    }

    async fn update(&self, id: &str, requester_id: &str, patch: ArticlePatch) -> AppResult<Article> {
        validate_fields(&patch.title, &patch.content)?;
        let updated = self.commit(|rows| {
            let row = owned_row(rows, id, requester_id)?;
            let before = row.clone();
            row.title = patch.title;
            row.content = patch.content;
            row.updated_at = Utc::now().max(row.created_at);
            Ok((row.clone(), Undo::Restore(before)))
        })?;
        info!(target: "bloggy::storage", "article updated id={} owner={}", id, requester_id);
        Ok(updated)
    }

    async fn delete(&self, id: &str, requester_id: &str) -> AppResult<()> {
        self.commit(|rows| {
            owned_row(rows, id, requester_id)?;
            let removed = rows.by_id.remove(id).ok_or_else(article_not_found)?;
            Ok(((), Undo::Restore(removed)))
        })?;
        info!(target: "bloggy::storage", "article deleted id={} owner={}", id, requester_id);
        Ok(())
    }
}
