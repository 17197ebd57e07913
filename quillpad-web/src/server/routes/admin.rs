use crate::{
    server::{
        Result, ServerError, ServerRouter,
        auth::StaffUser,
        extract::{Form, Query},
    },
    templates::{
        TemplateRenderer,
        view::{CategoryView, CommentView, PostView, UserView, ViewerView},
    },
};
use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use quillpad_common::{
    form::{CategoryForm, CommentForm, FormErrors},
    model::{
        Id, category::CategoryMarker, comment::CommentMarker, post::PostMarker, user::UserMarker,
    },
};
use quillpad_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(dashboard)
        .typed_post(create_category)
        .typed_get(edit_category_form)
        .typed_post(update_category)
        .typed_post(delete_category)
        .typed_post(delete_post)
        .typed_get(edit_comment_form)
        .typed_post(update_comment)
        .typed_post(delete_comment)
        .typed_post(delete_user)
}

#[derive(TypedPath)]
#[typed_path("/admin/")]
pub struct AdminPath;

#[derive(TypedPath)]
#[typed_path("/admin/categories/")]
pub struct CategoriesPath;

#[derive(TypedPath, Deserialize)]
#[typed_path("/admin/categories/{id}/edit/", rejection(ServerError))]
pub struct EditCategoryPath {
    id: Id<CategoryMarker>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/admin/categories/{id}/delete/", rejection(ServerError))]
pub struct DeleteCategoryPath {
    id: Id<CategoryMarker>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/admin/posts/{id}/delete/", rejection(ServerError))]
pub struct DeletePostPath {
    id: Id<PostMarker>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/admin/comments/{id}/edit/", rejection(ServerError))]
pub struct EditCommentPath {
    id: Id<CommentMarker>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/admin/comments/{id}/delete/", rejection(ServerError))]
pub struct DeleteCommentPath {
    id: Id<CommentMarker>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/admin/users/{id}/delete/", rejection(ServerError))]
pub struct DeleteUserPath {
    id: Id<UserMarker>,
}

/// `q` searches categories, posts and comments. `category` narrows the posts
/// table to one category; values that are not a category id show all posts.
#[derive(Deserialize, Default)]
struct AdminQuery {
    #[serde(default)]
    q: String,
    #[serde(default)]
    category: String,
}

impl AdminQuery {
    fn category(&self) -> Option<Id<CategoryMarker>> {
        self.category.trim().parse::<i64>().ok().map(Id::new)
    }
}

#[derive(Serialize)]
struct AdminPage {
    viewer: ViewerView,
    q: String,
    category: Option<i64>,
    all_categories: Vec<CategoryView>,
    categories: Vec<CategoryView>,
    posts: Vec<PostView>,
    comments: Vec<CommentView>,
    users: Vec<UserView>,
    category_name: String,
    errors: FormErrors,
}

async fn render_dashboard(
    db: &DbClient,
    templates: &TemplateRenderer,
    viewer: ViewerView,
    query: AdminQuery,
    category_name: String,
    errors: FormErrors,
) -> Result<Html<String>> {
    let search = query.q.trim();
    let category = query.category();

    let all_categories = db.list_categories().await?;
    let categories = db.search_categories(search).await?;
    let posts = db.search_posts(search, category).await?;
    let comments = db.search_comments(search).await?;
    let users = db.list_users().await?;

    let page = AdminPage {
        viewer,
        category: category.map(Id::get),
        all_categories: all_categories.iter().map(CategoryView::from).collect(),
        categories: categories.iter().map(CategoryView::from).collect(),
        posts: posts.iter().map(PostView::from).collect(),
        comments: comments.iter().map(CommentView::from).collect(),
        users: users.iter().map(UserView::from).collect(),
        q: query.q,
        category_name,
        errors,
    };
    Ok(templates.render("admin.html", &page)?)
}

async fn dashboard(
    _: AdminPath,
    StaffUser(staff): StaffUser,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<TemplateRenderer>>,
    Query(query): Query<AdminQuery>,
) -> Result<Html<String>> {
    render_dashboard(
        &db,
        &templates,
        ViewerView::from(&staff),
        query,
        String::new(),
        FormErrors::default(),
    )
    .await
}

/// Edit page for a single field of one object.
#[derive(Serialize)]
struct ChangePage {
    viewer: ViewerView,
    heading: String,
    action: String,
    field: &'static str,
    value: String,
    errors: FormErrors,
}

fn back_to_dashboard() -> Response {
    Redirect::to(&AdminPath.to_string()).into_response()
}

async fn create_category(
    _: CategoriesPath,
    StaffUser(staff): StaffUser,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<TemplateRenderer>>,
    Form(form): Form<CategoryForm>,
) -> Result<Response> {
    let name = match form.validate() {
        Ok(name) => name,
        Err(errors) => {
            let html = render_dashboard(
                &db,
                &templates,
                ViewerView::from(&staff),
                AdminQuery::default(),
                form.name,
                errors,
            )
            .await?;
            return Ok(html.into_response());
        }
    };

    let category_id = db.create_category(&name).await?;
    info!(%category_id, name = name.get(), "Created category");

    Ok(back_to_dashboard())
}

async fn edit_category_form(
    EditCategoryPath { id }: EditCategoryPath,
    StaffUser(staff): StaffUser,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<TemplateRenderer>>,
) -> Result<Html<String>> {
    let category = db
        .fetch_category(id)
        .await?
        .ok_or(ServerError::CategoryByIdNotFound(id))?;

    let page = ChangePage {
        viewer: ViewerView::from(&staff),
        heading: format!("Change category {}", category.name.get()),
        action: EditCategoryPath { id }.to_string(),
        field: "name",
        value: category.name.get().to_owned(),
        errors: FormErrors::default(),
    };
    Ok(templates.render("admin_change.html", &page)?)
}

async fn update_category(
    EditCategoryPath { id }: EditCategoryPath,
    StaffUser(staff): StaffUser,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<TemplateRenderer>>,
    Form(form): Form<CategoryForm>,
) -> Result<Response> {
    let category = db
        .fetch_category(id)
        .await?
        .ok_or(ServerError::CategoryByIdNotFound(id))?;

    let name = match form.validate() {
        Ok(name) => name,
        Err(errors) => {
            let page = ChangePage {
                viewer: ViewerView::from(&staff),
                heading: format!("Change category {}", category.name.get()),
                action: EditCategoryPath { id }.to_string(),
                field: "name",
                value: form.name,
                errors,
            };
            return Ok(templates.render("admin_change.html", &page)?.into_response());
        }
    };

    if !db.update_category(id, &name).await? {
        return Err(ServerError::CategoryByIdNotFound(id));
    }
    info!(
        category_id = %id,
        name = name.get(),
        staff = staff.user.username.get(),
        "Renamed category"
    );

    Ok(back_to_dashboard())
}

async fn delete_category(
    DeleteCategoryPath { id }: DeleteCategoryPath,
    StaffUser(staff): StaffUser,
    State(db): State<Arc<DbClient>>,
) -> Result<Response> {
    if !db.delete_category(id).await? {
        return Err(ServerError::CategoryByIdNotFound(id));
    }
    info!(category_id = %id, staff = staff.user.username.get(), "Deleted category");

    Ok(back_to_dashboard())
}

async fn delete_post(
    DeletePostPath { id }: DeletePostPath,
    StaffUser(staff): StaffUser,
    State(db): State<Arc<DbClient>>,
) -> Result<Response> {
    if !db.delete_post(id).await? {
        return Err(ServerError::PostByIdNotFound(id));
    }
    info!(post_id = %id, staff = staff.user.username.get(), "Deleted post");

    Ok(back_to_dashboard())
}

async fn edit_comment_form(
    EditCommentPath { id }: EditCommentPath,
    StaffUser(staff): StaffUser,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<TemplateRenderer>>,
) -> Result<Html<String>> {
    let comment = db
        .fetch_comment(id)
        .await?
        .ok_or(ServerError::CommentByIdNotFound(id))?;

    let page = ChangePage {
        viewer: ViewerView::from(&staff),
        heading: format!("Change comment by {}", comment.display_author()),
        action: EditCommentPath { id }.to_string(),
        field: "body",
        value: comment.body,
        errors: FormErrors::default(),
    };
    Ok(templates.render("admin_change.html", &page)?)
}

async fn update_comment(
    EditCommentPath { id }: EditCommentPath,
    StaffUser(staff): StaffUser,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<TemplateRenderer>>,
    Form(form): Form<CommentForm>,
) -> Result<Response> {
    let comment = db
        .fetch_comment(id)
        .await?
        .ok_or(ServerError::CommentByIdNotFound(id))?;

    let body = match form.validate() {
        Ok(body) => body,
        Err(errors) => {
            let page = ChangePage {
                viewer: ViewerView::from(&staff),
                heading: format!("Change comment by {}", comment.display_author()),
                action: EditCommentPath { id }.to_string(),
                field: "body",
                value: form.body,
                errors,
            };
            return Ok(templates.render("admin_change.html", &page)?.into_response());
        }
    };

    if !db.update_comment(id, &body).await? {
        return Err(ServerError::CommentByIdNotFound(id));
    }
    info!(comment_id = %id, staff = staff.user.username.get(), "Edited comment");

    Ok(back_to_dashboard())
}

async fn delete_comment(
    DeleteCommentPath { id }: DeleteCommentPath,
    StaffUser(staff): StaffUser,
    State(db): State<Arc<DbClient>>,
) -> Result<Response> {
    if !db.delete_comment(id).await? {
        return Err(ServerError::CommentByIdNotFound(id));
    }
    info!(comment_id = %id, staff = staff.user.username.get(), "Deleted comment");

    Ok(back_to_dashboard())
}

async fn delete_user(
    DeleteUserPath { id }: DeleteUserPath,
    StaffUser(staff): StaffUser,
    State(db): State<Arc<DbClient>>,
) -> Result<Response> {
    if !db.delete_user(id).await? {
        return Err(ServerError::UserByIdNotFound(id));
    }
    info!(user_id = %id, staff = staff.user.username.get(), "Deleted user");

    Ok(back_to_dashboard())
}
