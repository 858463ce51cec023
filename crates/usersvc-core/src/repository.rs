//! User persistence contract.
//!
//! [`UserRepository`] is the CRUD capability the request handlers consume.
//! Absence on lookups is not a failure (`Ok(None)`); absence on update and
//! delete is reported as [`RepositoryError::NotFound`].
//!
//! Storage backends report raw failures as [`StorageError`]. Converting one
//! into a [`RepositoryError`] recognizes unique-constraint violations and
//! turns them into a [`ConflictError`] with a readable message:
//!
//! ```
//! use usersvc_core::{RepositoryError, StorageError};
//!
//! let raw = StorageError::unique_violation("Key (email)=(ada@example.com) already exists.");
//! let err = RepositoryError::from(raw);
//!
//! assert_eq!(
//!     err.to_string(),
//!     "[email] already exists with this value (ada@example.com)"
//! );
//! ```

use std::future::Future;
use std::sync::OnceLock;

use indexmap::IndexMap;
use parking_lot::RwLock;
use regex::Regex;
use thiserror::Error;

use crate::error::ErrorList;
use crate::model::{User, UserPayload};

/// SQLSTATE code of a unique constraint violation.
pub const UNIQUE_VIOLATION: &str = "23505";

/// Result type alias using [`RepositoryError`].
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// CRUD operations on [`User`] records.
///
/// Implementations must be shareable across connection tasks.
pub trait UserRepository: Send + Sync + 'static {
    /// Returns every user; an empty store yields an empty list.
    fn get_all(&self) -> impl Future<Output = RepositoryResult<Vec<User>>> + Send;

    /// Looks a user up by id.
    fn find_by_id(&self, id: &str) -> impl Future<Output = RepositoryResult<Option<User>>> + Send;

    /// Looks a user up by email.
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = RepositoryResult<Option<User>>> + Send;

    /// Stores a new user and returns it with its assigned id.
    fn create(&self, payload: UserPayload) -> impl Future<Output = RepositoryResult<User>> + Send;

    /// Replaces the name and email of an existing user.
    fn update(
        &self,
        id: &str,
        payload: UserPayload,
    ) -> impl Future<Output = RepositoryResult<User>> + Send;

    /// Removes a user.
    fn delete(&self, id: &str) -> impl Future<Output = RepositoryResult<()>> + Send;
}

/// Failure reported by a [`UserRepository`].
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// A uniqueness constraint rejected the write.
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// The addressed record does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record, e.g. `"user"`.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// The record was rejected by storage-side checks.
    #[error("validation failed: {0}")]
    Validation(ErrorList),

    /// Any other storage failure.
    #[error("storage backend failure")]
    Backend(#[source] anyhow::Error),
}

impl RepositoryError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Wraps an arbitrary backend failure.
    #[must_use]
    pub fn backend(source: impl Into<anyhow::Error>) -> Self {
        Self::Backend(source.into())
    }
}

impl From<StorageError> for RepositoryError {
    fn from(err: StorageError) -> Self {
        if err.code == UNIQUE_VIOLATION {
            let detail = err.detail.clone();
            return Self::Conflict(ConflictError::from_unique_violation(&detail, err));
        }
        Self::Backend(err.into())
    }
}

/// Raw failure reported by a storage engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("storage error {code}: {detail}")]
pub struct StorageError {
    /// Engine error code (SQLSTATE style).
    pub code: String,
    /// Engine-provided detail text.
    pub detail: String,
}

impl StorageError {
    /// Creates a storage error.
    #[must_use]
    pub fn new(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            detail: detail.into(),
        }
    }

    /// Creates a unique constraint violation with the given detail.
    #[must_use]
    pub fn unique_violation(detail: impl Into<String>) -> Self {
        Self::new(UNIQUE_VIOLATION, detail)
    }
}

/// A write collided with an existing record.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ConflictError {
    message: String,
    #[source]
    source: anyhow::Error,
}

impl ConflictError {
    /// Creates a conflict with an explicit message.
    #[must_use]
    pub fn new(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Builds a conflict from a unique-violation detail such as
    /// `Key (email)=(ada@example.com) already exists.`
    ///
    /// Parts that cannot be found in `detail` render as empty strings.
    #[must_use]
    pub fn from_unique_violation(detail: &str, source: impl Into<anyhow::Error>) -> Self {
        let (column, value) = extract_column_value(detail);
        Self::new(
            format!("[{column}] already exists with this value ({value})"),
            source,
        )
    }

    /// Returns the client-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Extracts the column and value from a unique-violation detail.
fn extract_column_value(detail: &str) -> (String, String) {
    static COLUMN: OnceLock<Regex> = OnceLock::new();
    static VALUE: OnceLock<Regex> = OnceLock::new();

    let column = COLUMN.get_or_init(|| Regex::new(r"Key \((.+)\)=").expect("valid regex"));
    let value = VALUE.get_or_init(|| Regex::new(r"Key \(.+\)=\((.+)\)").expect("valid regex"));

    (first_capture(column, detail), first_capture(value, detail))
}

fn first_capture(regex: &Regex, haystack: &str) -> String {
    regex
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Process-local [`UserRepository`] keeping users in insertion order.
///
/// Emails are unique: a write that would duplicate one fails the same way a
/// relational backend does, through a [`StorageError`] unique violation.
///
/// # Example
///
/// ```
/// use usersvc_core::{InMemoryUserRepository, UserPayload, UserRepository};
///
/// # tokio_test::block_on(async {
/// let repo = InMemoryUserRepository::new();
/// let user = repo
///     .create(UserPayload::new("Ada", "ada@example.com"))
///     .await
///     .unwrap();
///
/// assert_eq!(user.id, "1");
/// assert_eq!(repo.get_all().await.unwrap().len(), 1);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    store: RwLock<Store>,
}

#[derive(Debug, Default)]
struct Store {
    users: IndexMap<String, User>,
    last_id: u64,
}

impl Store {
    fn ensure_unique_email(&self, email: &str, except_id: Option<&str>) -> Result<(), StorageError> {
        let taken = self
            .users
            .values()
            .any(|u| u.email == email && Some(u.id.as_str()) != except_id);
        if taken {
            return Err(StorageError::unique_violation(format!(
                "Key (email)=({email}) already exists."
            )));
        }
        Ok(())
    }
}

impl InMemoryUserRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-populated with `users`.
    ///
    /// Ids are kept as given; later inserts continue after the largest
    /// numeric id.
    #[must_use]
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let mut store = Store::default();
        for user in users {
            if let Ok(n) = user.id.parse::<u64>() {
                store.last_id = store.last_id.max(n);
            }
            store.users.insert(user.id.clone(), user);
        }
        Self {
            store: RwLock::new(store),
        }
    }

    /// Returns the number of stored users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.read().users.len()
    }

    /// Returns `true` if no user is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.read().users.is_empty()
    }
}

impl UserRepository for InMemoryUserRepository {
    async fn get_all(&self) -> RepositoryResult<Vec<User>> {
        Ok(self.store.read().users.values().cloned().collect())
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
        Ok(self.store.read().users.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        Ok(self
            .store
            .read()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create(&self, payload: UserPayload) -> RepositoryResult<User> {
        let mut store = self.store.write();
        store.ensure_unique_email(&payload.email, None)?;

        store.last_id += 1;
        let user = User {
            id: store.last_id.to_string(),
            name: payload.name,
            email: payload.email,
        };
        store.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn update(&self, id: &str, payload: UserPayload) -> RepositoryResult<User> {
        let mut store = self.store.write();
        if !store.users.contains_key(id) {
            return Err(RepositoryError::not_found("user", id));
        }
        store.ensure_unique_email(&payload.email, Some(id))?;

        let user = User {
            id: id.to_string(),
            name: payload.name,
            email: payload.email,
        };
        store.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        match self.store.write().users.shift_remove(id) {
            Some(_) => Ok(()),
            None => Err(RepositoryError::not_found("user", id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> InMemoryUserRepository {
        InMemoryUserRepository::with_users([
            User::new("1", "Ada", "ada@example.com"),
            User::new("2", "Grace", "grace@example.com"),
        ])
    }

    #[test]
    fn test_extract_column_value() {
        let (column, value) = extract_column_value("Key (email)=(x@y.io) already exists.");
        assert_eq!(column, "email");
        assert_eq!(value, "x@y.io");
    }

    #[test]
    fn test_extract_column_value_missing_parts() {
        let (column, value) = extract_column_value("duplicate key value");
        assert_eq!(column, "");
        assert_eq!(value, "");
    }

    #[test]
    fn test_conflict_message_with_unparseable_detail() {
        let err = ConflictError::from_unique_violation("???", anyhow::anyhow!("raw"));
        assert_eq!(err.message(), "[] already exists with this value ()");
    }

    #[test]
    fn test_storage_error_classification() {
        let err = RepositoryError::from(StorageError::new("08006", "connection failure"));
        assert!(matches!(err, RepositoryError::Backend(_)));

        let err = RepositoryError::from(StorageError::unique_violation(
            "Key (email)=(a@b.co) already exists.",
        ));
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_get_all_preserves_insertion_order() {
        let repo = seeded();
        let users = repo.get_all().await.unwrap();
        let names: Vec<_> = users.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Ada", "Grace"]);
    }

    #[tokio::test]
    async fn test_find_absent_is_none() {
        let repo = seeded();
        assert!(repo.find_by_id("99").await.unwrap().is_none());
        assert!(repo.find_by_email("nobody@example.com").await.unwrap().is_none());
        assert_eq!(
            repo.find_by_email("grace@example.com").await.unwrap().map(|u| u.id),
            Some("2".to_string())
        );
    }

    #[tokio::test]
    async fn test_create_continues_after_seeded_ids() {
        let repo = seeded();
        let user = repo
            .create(UserPayload::new("Linus", "linus@example.com"))
            .await
            .unwrap();
        assert_eq!(user.id, "3");
        assert_eq!(repo.len(), 3);
    }

    #[tokio::test]
    async fn test_create_duplicate_email_conflicts() {
        let repo = seeded();
        let err = repo
            .create(UserPayload::new("Ada 2", "ada@example.com"))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "[email] already exists with this value (ada@example.com)"
        );
    }

    #[tokio::test]
    async fn test_update_conflict_and_not_found() {
        let repo = seeded();

        let err = repo
            .update("1", UserPayload::new("Ada", "grace@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let err = repo
            .update("99", UserPayload::new("Nobody", "n@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_keeps_own_email() {
        let repo = seeded();
        let user = repo
            .update("1", UserPayload::new("Ada Lovelace", "ada@example.com"))
            .await
            .unwrap();
        assert_eq!(user.name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = seeded();
        repo.delete("1").await.unwrap();
        assert_eq!(repo.len(), 1);
        assert!(matches!(
            repo.delete("1").await,
            Err(RepositoryError::NotFound { .. })
        ));
    }
}
