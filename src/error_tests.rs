use super::*;

#[test]
fn http_status_mapping() {
    assert_eq!(AppError::validation("title", "Title is required").http_status(), 400);
    assert_eq!(AppError::auth("auth", "no").http_status(), 401);
    assert_eq!(AppError::forbidden("csrf", "blocked").http_status(), 403);
    assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
    assert_eq!(AppError::conflict("conflict", "dup").http_status(), 409);
    assert_eq!(AppError::network("network", "down").http_status(), 503);
    assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
}

#[test]
fn validation_carries_field_and_code() {
    let e = AppError::validation("content", "Content is required");
    assert_eq!(e.field(), Some("content"));
    assert_eq!(e.code_str(), "content_required");
    assert_eq!(e.to_string(), "content_required: Content is required");
    assert_eq!(AppError::auth("auth", "x").field(), None);
}

#[test]
fn transient_errors_get_generic_notice() {
    let e = AppError::network("network", "connection refused");
    assert!(e.is_transient());
    assert_eq!(e.user_message(), "Something went wrong, please try again");
    let e = AppError::not_found("article_not_found", "Article not found");
    assert!(!e.is_transient());
    assert_eq!(e.user_message(), "Article not found");
}

#[test]
fn anyhow_roundtrips_app_error() {
    let original = AppError::auth("not_owner", "You do not own this article");
    let wrapped: anyhow::Error = original.clone().into();
    assert_eq!(AppError::from(wrapped), original);
    let other = AppError::from(anyhow::anyhow!("boom"));
    assert_eq!(other.code_str(), "internal");
}

#[test]
fn json_shape_is_tagged() {
    let v = serde_json::to_value(AppError::auth("no_session", "You must be logged in")).unwrap();
    assert_eq!(v["type"], "auth");
    assert_eq!(v["code"], "no_session");
    let back: AppError = serde_json::from_value(v).unwrap();
    assert_eq!(back.code_str(), "no_session");
}
