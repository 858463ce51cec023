//! The user resource.

use serde::{Deserialize, Serialize};

use crate::error::ErrorList;

/// Longest accepted user name, in characters.
pub const MAX_NAME_LENGTH: usize = 100;

/// A stored user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identifier assigned by the repository.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Unique contact email.
    pub email: String,
}

impl User {
    /// Creates a user record.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Request body for creating or updating a user.
///
/// Missing fields deserialize as empty strings so that [`validate`](Self::validate)
/// can report them together with any other problem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPayload {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Contact email.
    #[serde(default)]
    pub email: String,
}

impl UserPayload {
    /// Creates a payload.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Checks every field and returns all problems found.
    ///
    /// An empty list means the payload is acceptable.
    ///
    /// # Example
    ///
    /// ```
    /// use usersvc_core::UserPayload;
    ///
    /// let errors = UserPayload::new("", "not-an-email").validate();
    /// assert_eq!(errors.to_string(), "name: invalid length, email: invalid format");
    /// ```
    #[must_use]
    pub fn validate(&self) -> ErrorList {
        let mut errors = ErrorList::new();

        let name_len = self.name.trim().chars().count();
        if name_len == 0 || name_len > MAX_NAME_LENGTH {
            errors.push("name: invalid length");
        }
        if !is_valid_email(&self.email) {
            errors.push("email: invalid format");
        }

        errors
    }
}

/// `local@domain.tld` with no whitespace and exactly one `@`.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
