use crate::model::{Id, auth::PasswordDigest};
use thiserror::Error;
use time::UtcDateTime;

pub const USERNAME_MAX_LEN: usize = 150;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct User {
    pub id: Id<UserMarker>,
    pub username: Username,
    pub date_joined: UtcDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateUser {
    pub username: Username,
    pub password: PasswordDigest,
}

/// A user account together with its stored password digest, used to check
/// login attempts.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Credentials {
    pub user: User,
    pub password: PasswordDigest,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Username(String);

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum InvalidUsernameError {
    #[error("Enter a username.")]
    Empty,
    #[error("Usernames are limited to {USERNAME_MAX_LEN} characters.")]
    TooLong,
    #[error("Usernames may only contain letters, digits and @/./+/-/_ characters.")]
    InvalidCharacter,
}

impl Username {
    pub fn new(username: &str) -> Result<Self, InvalidUsernameError> {
        let username = username.trim();

        if username.is_empty() {
            return Err(InvalidUsernameError::Empty);
        }
        if username.chars().count() > USERNAME_MAX_LEN {
            return Err(InvalidUsernameError::TooLong);
        }
        if !username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
        {
            return Err(InvalidUsernameError::InvalidCharacter);
        }

        Ok(Self(username.to_owned()))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Unicode-aware case-insensitive comparison, so "Ada" and "ada" count as
    /// the same account name.
    #[must_use]
    pub fn matches_ignore_case(&self, other: &str) -> bool {
        self.0.to_lowercase() == other.trim().to_lowercase()
    }
}
