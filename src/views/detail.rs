//! Single-article page.

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{Notice, Route, ViewContext};
use crate::error::AppError;
use crate::identity::can_mutate;
use crate::storage::Article;

const WORDS_PER_MINUTE: usize = 200;

pub fn word_count(content: &str) -> usize { content.split_whitespace().count() }

/// Estimated reading time, never below one minute.
pub fn read_time_minutes(content: &str) -> u32 {
    word_count(content).div_ceil(WORDS_PER_MINUTE).max(1) as u32
}

pub fn read_time_label(content: &str) -> String { format!("{} min read", read_time_minutes(content)) }

/// Asks the user to confirm a destructive action.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool { self(prompt) }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailState {
    Loading,
    Loaded(Article),
    /// Terminal; the page offers `Route::Home` and does not retry.
    NotFound,
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Cancelled,
    Deleted { route: Route, notice: Notice },
    Failed { notice: Notice },
}

pub struct DetailView {
    ctx: ViewContext,
    id: String,
    state: Mutex<DetailState>,
}

impl DetailView {
    pub fn new<S: Into<String>>(ctx: ViewContext, id: S) -> Self {
        Self { ctx, id: id.into(), state: Mutex::new(DetailState::Loading) }
    }

    pub fn id(&self) -> &str { &self.id }

    pub fn state(&self) -> DetailState { self.state.lock().clone() }

    pub fn article(&self) -> Option<Article> {
        match &*self.state.lock() {
            DetailState::Loaded(a) => Some(a.clone()),
            _ => None,
        }
    }

    pub async fn load(&self) -> DetailState {
        *self.state.lock() = DetailState::Loading;
        let next = match self.ctx.repo.get_by_id(&self.id).await {
            Ok(article) => DetailState::Loaded(article),
            Err(AppError::NotFound { .. }) => DetailState::NotFound,
            Err(e) => DetailState::Error { message: e.user_message() },
        };
        *self.state.lock() = next.clone();
        next
    }

    /// Whether Edit and Delete are offered, evaluated against the live session.
    pub fn can_mutate(&self) -> bool {
        let identity = self.ctx.identity();
        match &*self.state.lock() {
            DetailState::Loaded(a) => can_mutate(identity.as_ref(), a),
            _ => false,
        }
    }

    pub fn edit_route(&self) -> Option<Route> {
        self.can_mutate().then(|| Route::Edit(self.id.clone()))
    }

    pub fn read_time_label(&self) -> Option<String> { self.article().map(|a| read_time_label(&a.content)) }

    pub async fn delete(&self, confirm: &dyn Confirm) -> DeleteOutcome {
        if !confirm.confirm("Are you sure you want to delete this article?") {
            debug!(target: "bloggy::views", "delete id={} cancelled", self.id);
            return DeleteOutcome::Cancelled;
        }
        let identity = self.ctx.identity();
        match self.ctx.repo.delete(&self.id, identity.as_ref()).await {
            Ok(()) => {
                info!(target: "bloggy::views", "article deleted id={}", self.id);
                DeleteOutcome::Deleted { route: Route::Home, notice: Notice::success("Article deleted") }
            }
            Err(e) => DeleteOutcome::Failed { notice: Notice::error(format!("Failed to delete article: {}", e.user_message())) },
        }
    }
}
