use quillpad_common::model::{
    ModelValidationError,
    auth::{PasswordDigest, Session},
    category::{Category, CategoryName},
    comment::{Comment, CommentAuthor},
    post::{Post, PostTitle},
    user::{Credentials, User, Username},
};
use sqlx::FromRow;
use time::{Duration, PrimitiveDateTime, UtcDateTime};

/// Timestamps are stored as UTC without an offset.
pub(crate) fn to_primitive(value: UtcDateTime) -> PrimitiveDateTime {
    PrimitiveDateTime::new(value.date(), value.time())
}

/// Escapes `%`, `_` and `\` so user input only matches literally inside a
/// `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_id: i64,
    pub username: String,
    pub date_joined: PrimitiveDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CredentialsRecord {
    pub user_id: i64,
    pub username: String,
    pub date_joined: PrimitiveDateTime,
    pub password_hash: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct CategoryRecord {
    pub category_id: i64,
    pub name: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct PostCategoryRecord {
    pub post_id: i64,
    pub category_id: i64,
    pub name: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub post_id: i64,
    pub title: String,
    pub body: String,
    pub created_on: PrimitiveDateTime,
    pub last_modified: PrimitiveDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_id: i64,
    pub post_id: i64,
    pub author: String,
    pub body: String,
    pub created_on: PrimitiveDateTime,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub date_joined: Option<PrimitiveDateTime>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct SessionUserRecord {
    pub token_hash: Vec<u8>,
    pub created_at: PrimitiveDateTime,
    pub expires_after_seconds: Option<i64>,
    pub user_id: i64,
    pub username: String,
    pub date_joined: PrimitiveDateTime,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_id.into(),
            username: Username::new(&value.username)?,
            date_joined: value.date_joined.as_utc(),
        })
    }
}

impl TryFrom<CredentialsRecord> for Credentials {
    type Error = ModelValidationError;

    fn try_from(value: CredentialsRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: User {
                id: value.user_id.into(),
                username: Username::new(&value.username)?,
                date_joined: value.date_joined.as_utc(),
            },
            password: PasswordDigest::from_stored(value.password_hash),
        })
    }
}

impl TryFrom<CategoryRecord> for Category {
    type Error = ModelValidationError;

    fn try_from(value: CategoryRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.category_id.into(),
            name: CategoryName::new(&value.name)?,
        })
    }
}

impl TryFrom<PostCategoryRecord> for Category {
    type Error = ModelValidationError;

    fn try_from(value: PostCategoryRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.category_id.into(),
            name: CategoryName::new(&value.name)?,
        })
    }
}

impl PostRecord {
    pub fn into_post(self, categories: Vec<Category>) -> Result<Post, ModelValidationError> {
        Ok(Post {
            id: self.post_id.into(),
            title: PostTitle::new(&self.title)?,
            body: self.body,
            created_on: self.created_on.as_utc(),
            last_modified: self.last_modified.as_utc(),
            categories,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        let user = match (value.user_id, value.username, value.date_joined) {
            (Some(user_id), Some(username), Some(date_joined)) => Some(User {
                id: user_id.into(),
                username: Username::new(&username)?,
                date_joined: date_joined.as_utc(),
            }),
            _ => None,
        };

        Ok(Self {
            id: value.comment_id.into(),
            post: value.post_id.into(),
            user,
            author: CommentAuthor::new(value.author)?,
            body: value.body,
            created_on: value.created_on.as_utc(),
        })
    }
}

impl TryFrom<SessionUserRecord> for (Session, User) {
    type Error = ModelValidationError;

    fn try_from(value: SessionUserRecord) -> Result<Self, Self::Error> {
        let session = Session {
            user: value.user_id.into(),
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at.as_utc(),
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        };
        let user = User {
            id: value.user_id.into(),
            username: Username::new(&value.username)?,
            date_joined: value.date_joined.as_utc(),
        };

        Ok((session, user))
    }
}

#[cfg(test)]
mod tests {
    use crate::record::like_pattern;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern(" 100% "), "%100\\%%");
        assert_eq!(like_pattern("a_b\\c"), "%a\\_b\\\\c%");
        assert_eq!(like_pattern(""), "%%");
    }
}
