use crate::model::{
    Id, bounded_text,
    category::{Category, CategoryMarker},
};
use thiserror::Error;
use time::UtcDateTime;

pub const POST_TITLE_MAX_LEN: usize = 255;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub title: PostTitle,
    pub body: String,
    pub created_on: UtcDateTime,
    pub last_modified: UtcDateTime,
    pub categories: Vec<Category>,
}

/// Everything an author controls about a post, used both for creating and
/// editing one.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostContent {
    pub title: PostTitle,
    pub body: String,
    pub categories: Vec<Id<CategoryMarker>>,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostTitle(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Titles must be between 1 and {POST_TITLE_MAX_LEN} characters.")]
pub struct InvalidPostTitleError;

impl PostTitle {
    pub fn new(title: &str) -> Result<Self, InvalidPostTitleError> {
        bounded_text(title, POST_TITLE_MAX_LEN)
            .map(Self)
            .ok_or(InvalidPostTitleError)
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Post {
    #[must_use]
    pub fn category_ids(&self) -> Vec<Id<CategoryMarker>> {
        self.categories.iter().map(|category| category.id).collect()
    }
}
