use crate::model::{Id, bounded_text};
use thiserror::Error;

pub const CATEGORY_NAME_MAX_LEN: usize = 30;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CategoryMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Category {
    pub id: Id<CategoryMarker>,
    pub name: CategoryName,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CategoryName(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Category names must be between 1 and {CATEGORY_NAME_MAX_LEN} characters.")]
pub struct InvalidCategoryNameError;

impl CategoryName {
    pub fn new(name: &str) -> Result<Self, InvalidCategoryNameError> {
        bounded_text(name, CATEGORY_NAME_MAX_LEN)
            .map(Self)
            .ok_or(InvalidCategoryNameError)
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    /// Unicode-aware case-insensitive comparison, used for category filtering.
    #[must_use]
    pub fn matches_ignore_case(&self, other: &str) -> bool {
        self.0.to_lowercase() == other.trim().to_lowercase()
    }
}
