//! Create and edit forms.

use parking_lot::Mutex;
use tracing::info;

use super::{Notice, Route, ViewContext};
use crate::error::{AppError, AppResult};
use crate::storage::{validate_fields, Article};

/// Editable fields plus the last error and the in-flight flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    pub title: String,
    pub content: String,
    pub error: Option<AppError>,
    pub saving: bool,
}

impl FormState {
    /// Message for `field` when the last error was a validation error on it.
    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.error.as_ref().filter(|e| e.field() == Some(field)).map(|e| e.message())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Saved { route: Route, notice: Option<Notice> },
    /// The error is also recorded on the form.
    Rejected(AppError),
    /// A submission is already in flight.
    Busy,
}

/// Clears `saving` however the submission ends, including cancellation.
struct SavingGuard<'a>(&'a Mutex<FormState>);

impl<'a> SavingGuard<'a> {
    fn enter(form: &'a Mutex<FormState>) -> Option<(Self, String, String)> {
        let mut f = form.lock();
        if f.saving { return None; }
        f.saving = true;
        f.error = None;
        let fields = (f.title.clone(), f.content.clone());
        drop(f);
        Some((SavingGuard(form), fields.0, fields.1))
    }
}

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) { self.0.lock().saving = false; }
}

/// Shared submit path: local validation, then the write, then the verdict.
async fn submit_form<Fut>(form: &Mutex<FormState>, write: impl FnOnce(String, String) -> Fut) -> Result<Article, SubmitOutcome>
where
    Fut: std::future::Future<Output = AppResult<Article>>,
{
    let Some((_guard, title, content)) = SavingGuard::enter(form) else { return Err(SubmitOutcome::Busy); };
    let result = match validate_fields(&title, &content) {
        Ok(()) => write(title, content).await,
        Err(e) => Err(e),
    };
    result.map_err(|e| {
        form.lock().error = Some(e.clone());
        SubmitOutcome::Rejected(e)
    })
}

pub struct CreateView {
    ctx: ViewContext,
    form: Mutex<FormState>,
}

impl CreateView {
    pub fn new(ctx: ViewContext) -> Self { Self { ctx, form: Mutex::new(FormState::default()) } }

    pub fn form(&self) -> FormState { self.form.lock().clone() }

    pub fn set_title(&self, title: &str) { self.form.lock().title = title.to_string(); }

    pub fn set_content(&self, content: &str) { self.form.lock().content = content.to_string(); }

    pub async fn submit(&self) -> SubmitOutcome {
        let identity = self.ctx.identity();
        let repo = &self.ctx.repo;
        match submit_form(&self.form, |t, c| async move { repo.create(&t, &c, identity.as_ref()).await }).await {
            Ok(article) => {
                info!(target: "bloggy::views", "article created id={}", article.id);
                *self.form.lock() = FormState::default();
                SubmitOutcome::Saved { route: Route::Home, notice: Some(Notice::success("Article created")) }
            }
            Err(outcome) => outcome,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditLoad {
    Loading,
    Ready,
    Redirect(Route),
    Failed { message: String, back: Route },
}

pub struct EditView {
    ctx: ViewContext,
    id: String,
    load: Mutex<EditLoad>,
    form: Mutex<FormState>,
}

impl EditView {
    pub fn new<S: Into<String>>(ctx: ViewContext, id: S) -> Self {
        Self { ctx, id: id.into(), load: Mutex::new(EditLoad::Loading), form: Mutex::new(FormState::default()) }
    }

    pub fn id(&self) -> &str { &self.id }

    pub fn load_state(&self) -> EditLoad { self.load.lock().clone() }

    pub fn form(&self) -> FormState { self.form.lock().clone() }

    pub fn set_title(&self, title: &str) { self.form.lock().title = title.to_string(); }

    pub fn set_content(&self, content: &str) { self.form.lock().content = content.to_string(); }

    /// Prefill the form with the caller's own article.
    pub async fn load(&self) -> EditLoad {
        *self.load.lock() = EditLoad::Loading;
        let next = match self.ctx.identity() {
            None => EditLoad::Redirect(Route::Login),
            Some(identity) => match self.ctx.repo.get_owned(&self.id, Some(&identity)).await {
                Ok(article) => {
                    let mut f = self.form.lock();
                    f.title = article.title;
                    f.content = article.content;
                    f.error = None;
                    EditLoad::Ready
                }
                Err(e @ AppError::NotFound { .. }) => EditLoad::Failed { message: e.message().to_string(), back: Route::MyArticles },
                Err(e) => EditLoad::Failed { message: e.user_message(), back: Route::MyArticles },
            },
        };
        *self.load.lock() = next.clone();
        next
    }

    pub async fn submit(&self) -> SubmitOutcome {
        let identity = self.ctx.identity();
        let repo = &self.ctx.repo;
        let id = self.id.as_str();
        match submit_form(&self.form, |t, c| async move { repo.update(id, &t, &c, identity.as_ref()).await }).await {
            Ok(article) => {
                info!(target: "bloggy::views", "article updated id={}", article.id);
                SubmitOutcome::Saved { route: Route::Article(article.id), notice: Some(Notice::success("Article updated")) }
            }
            Err(outcome) => outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ArticleStore, NewArticle};
    use crate::views::testing::Fixture;

    #[tokio::test]
    async fn blank_fields_are_rejected_locally() {
        let fx = Fixture::new().await;
        fx.sign_in("u1@example.com", "secret1").await;
        let view = CreateView::new(fx.ctx.clone());
        view.set_content("body");
        assert!(matches!(view.submit().await, SubmitOutcome::Rejected(_)));
        let form = view.form();
        assert!(form.field_error("title").is_some());
        assert!(!form.saving);

        view.set_title("Title");
        view.set_content("   ");
        view.submit().await;
        assert!(view.form().field_error("content").is_some());
        assert!(fx.store.is_empty());
    }

    #[tokio::test]
    async fn create_without_identity_is_an_auth_error() {
        let fx = Fixture::new().await;
        let view = CreateView::new(fx.ctx.clone());
        view.set_title("T");
        view.set_content("C");
        match view.submit().await {
            SubmitOutcome::Rejected(e) => {
                assert_eq!(e.http_status(), 401);
                assert_eq!(e.message(), "You must be logged in to create an article");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(view.form().title, "T");
    }

    #[tokio::test]
    async fn create_success_goes_home_and_clears_form() {
        let fx = Fixture::new().await;
        let me = fx.sign_in("u1@example.com", "secret1").await;
        let view = CreateView::new(fx.ctx.clone());
        view.set_title("First");
        view.set_content("Hello world");
        assert_eq!(
            view.submit().await,
            SubmitOutcome::Saved { route: Route::Home, notice: Some(Notice::success("Article created")) }
        );
        assert_eq!(view.form(), FormState::default());
        assert_eq!(fx.store.len(), 1);
        let page = fx.store.query(&crate::storage::ArticleQuery { limit: 1, ..Default::default() }).await.unwrap();
        assert_eq!(page.items[0].owner_id, me.id);
    }

    #[tokio::test]
    async fn edit_requires_identity_and_ownership() {
        let fx = Fixture::new().await;
        let theirs = fx.store.insert(NewArticle { title: "t".into(), content: "c".into(), owner_id: "other".into() }).await.unwrap();
        let view = EditView::new(fx.ctx.clone(), theirs.id.clone());
        assert_eq!(view.load().await, EditLoad::Redirect(Route::Login));

        fx.sign_in("u2@example.com", "secret2").await;
        match view.load().await {
            EditLoad::Failed { back, .. } => assert_eq!(back, Route::MyArticles),
            other => panic!("unexpected load {other:?}"),
        }
        let missing = EditView::new(fx.ctx.clone(), "missing");
        assert!(matches!(missing.load().await, EditLoad::Failed { .. }));
    }

    #[tokio::test]
    async fn edit_prefills_and_saves_to_detail_route() {
        let fx = Fixture::new().await;
        let me = fx.sign_in("u1@example.com", "secret1").await;
        let mine = fx.store.insert(NewArticle { title: "old".into(), content: "old body".into(), owner_id: me.id.clone() }).await.unwrap();
        let view = EditView::new(fx.ctx.clone(), mine.id.clone());
        assert_eq!(view.load().await, EditLoad::Ready);
        assert_eq!(view.form().title, "old");
        view.set_title("new");
        match view.submit().await {
            SubmitOutcome::Saved { route, .. } => assert_eq!(route, Route::Article(mine.id.clone())),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(fx.store.get(&mine.id).await.unwrap().unwrap().title, "new");
        assert!(!view.form().saving);
    }

    #[tokio::test]
    async fn foreign_edit_submit_is_rejected_by_the_store() {
        let fx = Fixture::new().await;
        let theirs = fx.store.insert(NewArticle { title: "t".into(), content: "c".into(), owner_id: "other".into() }).await.unwrap();
        fx.sign_in("u2@example.com", "secret2").await;
        let view = EditView::new(fx.ctx.clone(), theirs.id.clone());
        view.set_title("hijack");
        view.set_content("x");
        assert!(matches!(view.submit().await, SubmitOutcome::Rejected(AppError::Auth { .. })));
        assert_eq!(fx.store.get(&theirs.id).await.unwrap().unwrap().title, "t");
    }

    #[test]
    fn second_submit_while_saving_is_busy() {
        let form = Mutex::new(FormState::default());
        let first = SavingGuard::enter(&form);
        assert!(first.is_some());
        assert!(SavingGuard::enter(&form).is_none());
        drop(first);
        assert!(!form.lock().saving);
    }
}
