use super::principal::Identity;
use crate::storage::Article;

/// Whether `identity` may edit or delete `article`.
///
/// This only gates which affordances a view offers. The store applies the same
/// predicate to every update and delete, and its answer is the one that counts.
pub fn can_mutate(identity: Option<&Identity>, article: &Article) -> bool {
    identity.is_some_and(|i| is_owner(&i.id, article))
}

/// Owner-row predicate used by the stores.
pub fn is_owner(requester_id: &str, article: &Article) -> bool {
    !requester_id.is_empty() && requester_id == article.owner_id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article_owned_by(owner: &str) -> Article {
        let now = chrono::Utc::now();
        Article {
            id: "a1".into(),
            title: "T".into(),
            content: "C".into(),
            owner_id: owner.into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn owner_may_mutate() {
        let a = article_owned_by("u1");
        assert!(can_mutate(Some(&Identity::new("u1", "u1@example.com")), &a));
    }

    #[test]
    fn other_identity_may_not() {
        let a = article_owned_by("u1");
        assert!(!can_mutate(Some(&Identity::new("u2", "u2@example.com")), &a));
    }

    #[test]
    fn anonymous_may_not() {
        assert!(!can_mutate(None, &article_owned_by("u1")));
        // An empty id never matches, even against a malformed row.
        assert!(!can_mutate(Some(&Identity::default()), &article_owned_by("")));
    }
}
