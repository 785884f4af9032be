//! Paginated, searchable article list (home page and "my articles").
//!
//! Every fetch carries a generation number. Changing the search text or page bumps
//! the generation, so a response that lands after a newer request was issued is
//! dropped instead of overwriting fresher state. Search input is debounced by the
//! context's `search_debounce`.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use super::{Route, ViewContext};
use crate::repository::{total_pages, PageRequest, SearchFilter};
use crate::storage::Article;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// Every author's articles.
    Home,
    /// Only the signed-in user's articles.
    Mine,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListState {
    Loading,
    Loaded { items: Vec<Article>, total_count: usize },
    /// No rows; `searching` says whether a search filter produced the emptiness.
    Empty { searching: bool },
    Error { message: String },
}

/// What a fetch did to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOutcome {
    Applied,
    /// A newer request was issued while this one was pending.
    Superseded,
    /// Navigation request left the state as it was (already at the first or last page).
    Unchanged,
    Redirect(Route),
}

struct Inner {
    state: ListState,
    page: u32,
    search: String,
    total_pages: u32,
}

pub struct ListView {
    ctx: ViewContext,
    scope: ListScope,
    inner: Mutex<Inner>,
    generation: AtomicU64,
}

impl ListView {
    pub fn new(ctx: ViewContext, scope: ListScope) -> Self {
        Self {
            ctx,
            scope,
            inner: Mutex::new(Inner { state: ListState::Loading, page: 1, search: String::new(), total_pages: 0 }),
            generation: AtomicU64::new(0),
        }
    }

    pub fn scope(&self) -> ListScope { self.scope }

    pub fn state(&self) -> ListState { self.inner.lock().state.clone() }

    pub fn page(&self) -> u32 { self.inner.lock().page }

    pub fn search_text(&self) -> String { self.inner.lock().search.clone() }

    pub fn total_pages(&self) -> u32 { self.inner.lock().total_pages }

    pub fn page_size(&self) -> u32 { self.ctx.page_size }

    pub fn has_previous(&self) -> bool { self.inner.lock().page > 1 }

    /// A following page exists only when this one came back full.
    pub fn has_next(&self) -> bool {
        let inner = self.inner.lock();
        let shown = match &inner.state {
            ListState::Loaded { items, .. } => items.len(),
            _ => 0,
        };
        inner.page < inner.total_pages && shown == self.ctx.page_size as usize
    }

    /// Hint shown with the empty state.
    pub fn empty_hint(&self) -> Option<&'static str> {
        match self.inner.lock().state {
            ListState::Empty { searching: true } => Some("Try adjusting your search criteria"),
            ListState::Empty { searching: false } => Some(match self.scope {
                ListScope::Home => "Be the first to write an article!",
                ListScope::Mine => "You haven't written any articles yet",
            }),
            _ => None,
        }
    }

    pub async fn mount(&self) -> ListOutcome {
        let generation = self.bump();
        self.fetch(generation).await
    }

    /// Re-run the current query without changing page or search.
    pub async fn refresh(&self) -> ListOutcome { self.mount().await }

    pub async fn set_page(&self, page: u32) -> ListOutcome {
        self.inner.lock().page = page.max(1);
        let generation = self.bump();
        self.fetch(generation).await
    }

    pub async fn next_page(&self) -> ListOutcome {
        if !self.has_next() { return ListOutcome::Unchanged; }
        let page = self.page() + 1;
        self.set_page(page).await
    }

    pub async fn previous_page(&self) -> ListOutcome {
        if !self.has_previous() { return ListOutcome::Unchanged; }
        let page = self.page() - 1;
        self.set_page(page).await
    }

    /// Record new search text, reset to page 1 and fetch after the debounce
    /// interval unless another keystroke arrives first.
    pub async fn set_search(&self, text: &str) -> ListOutcome {
        {
            let mut inner = self.inner.lock();
            inner.search = text.to_string();
            inner.page = 1;
        }
        let generation = self.bump();
        if !self.ctx.search_debounce.is_zero() {
            tokio::time::sleep(self.ctx.search_debounce).await;
            if !self.is_current(generation) {
                debug!(target: "bloggy::views", "search '{}' superseded during debounce", text);
                return ListOutcome::Superseded;
            }
        }
        self.fetch(generation).await
    }

    fn bump(&self) -> u64 { self.generation.fetch_add(1, Ordering::SeqCst) + 1 }

    fn is_current(&self, generation: u64) -> bool { self.generation.load(Ordering::SeqCst) == generation }

    async fn fetch(&self, generation: u64) -> ListOutcome {
        let (filter, request) = {
            let mut inner = self.inner.lock();
            inner.state = ListState::Loading;
            (SearchFilter::text(inner.search.clone()), PageRequest::new(inner.page, self.ctx.page_size))
        };
        let result = match self.scope {
            ListScope::Home => self.ctx.repo.list(&filter, request).await,
            ListScope::Mine => {
                let Some(identity) = self.ctx.identity() else {
                    self.apply(generation, ListState::Error { message: "You must be logged in to see your articles".into() }, 0);
                    return ListOutcome::Redirect(Route::Login);
                };
                self.ctx.repo.list_by_owner(Some(&identity), &filter, request).await
            }
        };
        let (state, pages) = match result {
            Ok(page) if page.items.is_empty() => (ListState::Empty { searching: filter.is_active() }, total_pages(page.total_count, request.page_size)),
            Ok(page) => {
                let pages = total_pages(page.total_count, request.page_size);
                (ListState::Loaded { items: page.items, total_count: page.total_count }, pages)
            }
            Err(e) => (ListState::Error { message: e.user_message() }, 0),
        };
        if self.apply(generation, state, pages) {
            ListOutcome::Applied
        } else {
            debug!(target: "bloggy::views", "list response generation={} discarded", generation);
            ListOutcome::Superseded
        }
    }

    fn apply(&self, generation: u64, state: ListState, pages: u32) -> bool {
        let mut inner = self.inner.lock();
        if !self.is_current(generation) { return false; }
        inner.state = state;
        inner.total_pages = pages;
        true
    }
}
