use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use crate::models::User;

/// Failure of the backing user store itself (not "user absent").
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("user store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to user records.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Look up a user by exact username. `Ok(None)` when no such user exists.
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;
}

/// Process-local user store.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: DashMap<String, User>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let repository = Self::new();
        for user in users {
            repository.insert(user);
        }
        repository
    }

    /// One active user per name, with generated ids.
    pub fn with_usernames<S: AsRef<str>>(usernames: &[S]) -> Self {
        Self::with_users(usernames.iter().map(|name| User::new(name.as_ref())))
    }

    /// Insert or replace the user keyed by its username.
    pub fn insert(&self, user: User) {
        self.users.insert(user.username.clone(), user);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.get(username).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_existing_and_missing() {
        let repository = InMemoryUserRepository::with_usernames(&["alice", "bob"]);

        let alice = repository.get_user_by_username("alice").await.unwrap();
        assert_eq!(alice.map(|u| u.username), Some("alice".to_string()));

        assert!(repository.get_user_by_username("mallory").await.unwrap().is_none());
        assert_eq!(repository.len(), 2);
    }

    #[tokio::test]
    async fn test_lookup_is_case_sensitive() {
        let repository = InMemoryUserRepository::with_usernames(&["alice"]);
        assert!(repository.get_user_by_username("Alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_replaces_same_username() {
        let repository = InMemoryUserRepository::new();
        repository.insert(User::new("alice"));
        repository.insert(User::new("alice").with_email("alice@example.com"));

        let alice = repository.get_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(alice.email.as_deref(), Some("alice@example.com"));
        assert_eq!(repository.len(), 1);
    }
}
