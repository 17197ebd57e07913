use crate::model::{
    Id,
    post::PostMarker,
    user::{User, UserMarker},
};
use thiserror::Error;
use time::UtcDateTime;

pub const COMMENT_AUTHOR_MAX_LEN: usize = 60;
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post: Id<PostMarker>,
    /// `None` for legacy comments and for comments whose account was deleted.
    pub user: Option<User>,
    pub author: CommentAuthor,
    pub body: String,
    pub created_on: UtcDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct CreateComment {
    pub post: Id<PostMarker>,
    pub user: Id<UserMarker>,
    pub body: String,
}

/// Free-text display name kept from comments written before accounts existed.
/// May be empty.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentAuthor(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Comment author names are limited to {COMMENT_AUTHOR_MAX_LEN} characters: {0}")]
pub struct InvalidCommentAuthorError(String);

impl CommentAuthor {
    pub fn new(author: String) -> Result<Self, InvalidCommentAuthorError> {
        if author.chars().count() <= COMMENT_AUTHOR_MAX_LEN {
            Ok(Self(author))
        } else {
            Err(InvalidCommentAuthorError(author))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Comment {
    /// The account's username when there is one, then the legacy author name.
    #[must_use]
    pub fn display_author(&self) -> &str {
        match &self.user {
            Some(user) => user.username.get(),
            None if !self.author.get().trim().is_empty() => self.author.get(),
            None => ANONYMOUS_AUTHOR,
        }
    }
}
