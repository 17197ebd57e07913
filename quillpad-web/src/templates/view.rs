use crate::server::auth::SessionUser;
use quillpad_common::model::{category::Category, comment::Comment, post::Post, user::User};
use serde::Serialize;
use time::{UtcDateTime, format_description::BorrowedFormatItem, macros::format_description};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year], [hour]:[minute]");

fn format_date(date: UtcDateTime) -> String {
    // every component the description asks for exists on a UtcDateTime
    date.format(DATE_FORMAT).unwrap_or_default()
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct ViewerView {
    pub username: String,
    pub is_staff: bool,
}

impl From<&SessionUser> for ViewerView {
    fn from(viewer: &SessionUser) -> Self {
        Self {
            username: viewer.user.username.get().to_owned(),
            is_staff: viewer.is_staff,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct CategoryView {
    pub id: i64,
    pub name: String,
}

impl From<&Category> for CategoryView {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id.get(),
            name: category.name.get().to_owned(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub created_on: String,
    pub last_modified: String,
    pub categories: Vec<CategoryView>,
}

impl From<&Post> for PostView {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.get(),
            title: post.title.get().to_owned(),
            body: post.body.clone(),
            created_on: format_date(post.created_on),
            last_modified: format_date(post.last_modified),
            categories: post.categories.iter().map(CategoryView::from).collect(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub post: i64,
    pub author: String,
    pub body: String,
    pub created_on: String,
}

impl From<&Comment> for CommentView {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id.get(),
            post: comment.post.get(),
            author: comment.display_author().to_owned(),
            body: comment.body.clone(),
            created_on: format_date(comment.created_on),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub date_joined: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.get(),
            username: user.username.get().to_owned(),
            date_joined: format_date(user.date_joined),
        }
    }
}
