use std::sync::Arc;

use tracing::debug;

use super::repository::{RepositoryError, UserRepository};
use crate::models::User;

/// Maps a verified token subject to a stored user.
#[derive(Clone)]
pub struct PrincipalResolver {
    repository: Arc<dyn UserRepository>,
}

impl PrincipalResolver {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    /// `Ok(None)` is a normal outcome; `Err` means the store itself failed.
    pub async fn resolve(&self, subject: &str) -> Result<Option<User>, RepositoryError> {
        debug!(subject, "Resolving principal");
        self.repository.get_user_by_username(subject).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::auth::InMemoryUserRepository;

    struct BrokenRepository;

    #[async_trait]
    impl UserRepository for BrokenRepository {
        async fn get_user_by_username(&self, _: &str) -> Result<Option<User>, RepositoryError> {
            Err(RepositoryError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_resolve_found_and_absent() {
        let resolver = PrincipalResolver::new(Arc::new(InMemoryUserRepository::with_usernames(
            &["alice"],
        )));

        assert!(resolver.resolve("alice").await.unwrap().is_some());
        assert!(resolver.resolve("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let resolver = PrincipalResolver::new(Arc::new(BrokenRepository));
        assert!(resolver.resolve("alice").await.is_err());
    }
}
