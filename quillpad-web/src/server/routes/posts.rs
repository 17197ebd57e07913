use crate::{
    server::{
        Result, ServerError, ServerRouter,
        auth::{AuthenticatedUser, CurrentUser},
        extract::Form,
    },
    templates::{
        TemplateRenderer,
        view::{CategoryView, CommentView, PostView, ViewerView},
    },
};
use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use quillpad_common::{
    form::{CommentForm, FormErrors, PostForm},
    model::{
        Id,
        comment::CreateComment,
        post::{Post, PostMarker},
    },
};
use quillpad_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(index)
        .typed_get(post_detail)
        .typed_post(create_comment)
        .typed_get(new_post_form)
        .typed_post(create_post)
        .typed_get(edit_post_form)
        .typed_post(update_post)
        .typed_get(category)
}

#[derive(TypedPath)]
#[typed_path("/")]
pub struct IndexPath;

#[derive(TypedPath, Deserialize)]
#[typed_path("/post/{id}/", rejection(ServerError))]
pub struct PostDetailPath {
    id: Id<PostMarker>,
}

#[derive(TypedPath)]
#[typed_path("/post/new/")]
pub struct NewPostPath;

#[derive(TypedPath, Deserialize)]
#[typed_path("/post/{id}/edit/", rejection(ServerError))]
pub struct EditPostPath {
    id: Id<PostMarker>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/category/{name}/", rejection(ServerError))]
pub struct CategoryPath {
    name: String,
}

fn detail_url(id: Id<PostMarker>) -> String {
    PostDetailPath { id }.to_string()
}

#[derive(Serialize)]
struct PostListPage {
    viewer: Option<ViewerView>,
    category: Option<String>,
    posts: Vec<PostView>,
    categories: Vec<CategoryView>,
}

async fn index(
    _: IndexPath,
    CurrentUser(viewer): CurrentUser,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<TemplateRenderer>>,
) -> Result<Html<String>> {
    let posts = db.list_posts().await?;
    let categories = db.list_categories().await?;

    let page = PostListPage {
        viewer: viewer.as_ref().map(ViewerView::from),
        category: None,
        posts: posts.iter().map(PostView::from).collect(),
        categories: categories.iter().map(CategoryView::from).collect(),
    };
    Ok(templates.render("index.html", &page)?)
}

async fn category(
    CategoryPath { name }: CategoryPath,
    CurrentUser(viewer): CurrentUser,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<TemplateRenderer>>,
) -> Result<Html<String>> {
    let posts = db.list_posts_by_category(&name).await?;
    let categories = db.list_categories().await?;

    let page = PostListPage {
        viewer: viewer.as_ref().map(ViewerView::from),
        category: Some(name),
        posts: posts.iter().map(PostView::from).collect(),
        categories: categories.iter().map(CategoryView::from).collect(),
    };
    Ok(templates.render("category.html", &page)?)
}

#[derive(Serialize)]
struct DetailPage {
    viewer: Option<ViewerView>,
    post: PostView,
    comments: Vec<CommentView>,
    form: CommentForm,
    errors: FormErrors,
}

async fn render_detail(
    db: &DbClient,
    templates: &TemplateRenderer,
    viewer: Option<ViewerView>,
    post: &Post,
    form: CommentForm,
    errors: FormErrors,
) -> Result<Html<String>> {
    let comments = db.list_post_comments(post.id).await?;

    let page = DetailPage {
        viewer,
        post: PostView::from(post),
        comments: comments.iter().map(CommentView::from).collect(),
        form,
        errors,
    };
    Ok(templates.render("detail.html", &page)?)
}

async fn post_detail(
    PostDetailPath { id }: PostDetailPath,
    CurrentUser(viewer): CurrentUser,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<TemplateRenderer>>,
) -> Result<Html<String>> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    render_detail(
        &db,
        &templates,
        viewer.as_ref().map(ViewerView::from),
        &post,
        CommentForm::default(),
        FormErrors::default(),
    )
    .await
}

async fn create_comment(
    PostDetailPath { id }: PostDetailPath,
    AuthenticatedUser(viewer): AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<TemplateRenderer>>,
    Form(form): Form<CommentForm>,
) -> Result<Response> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    let body = match form.validate() {
        Ok(body) => body,
        Err(errors) => {
            let html = render_detail(
                &db,
                &templates,
                Some(ViewerView::from(&viewer)),
                &post,
                form,
                errors,
            )
            .await?;
            return Ok(html.into_response());
        }
    };

    let comment_id = db
        .create_comment(&CreateComment {
            post: id,
            user: viewer.user_id(),
            body,
        })
        .await?;
    info!(%comment_id, post_id = %id, user_id = %viewer.user_id(), "Created comment");

    Ok(Redirect::to(&detail_url(id)).into_response())
}

#[derive(Serialize)]
struct PostFormPage {
    viewer: ViewerView,
    /// The post being edited; absent while creating one.
    post: Option<PostView>,
    action: String,
    form: PostForm,
    categories: Vec<CategoryView>,
    errors: FormErrors,
}

async fn render_post_form(
    db: &DbClient,
    templates: &TemplateRenderer,
    page: PostFormPage,
) -> Result<Html<String>> {
    let categories = db.list_categories().await?;
    let page = PostFormPage {
        categories: categories.iter().map(CategoryView::from).collect(),
        ..page
    };
    Ok(templates.render("post_form.html", &page)?)
}

async fn new_post_form(
    _: NewPostPath,
    AuthenticatedUser(viewer): AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<TemplateRenderer>>,
) -> Result<Html<String>> {
    let page = PostFormPage {
        viewer: ViewerView::from(&viewer),
        post: None,
        action: NewPostPath.to_string(),
        form: PostForm::default(),
        categories: Vec::new(),
        errors: FormErrors::default(),
    };
    render_post_form(&db, &templates, page).await
}

async fn create_post(
    _: NewPostPath,
    AuthenticatedUser(viewer): AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<TemplateRenderer>>,
    Form(form): Form<PostForm>,
) -> Result<Response> {
    let available = db.list_categories().await?;

    let content = match form.validate(&available) {
        Ok(content) => content,
        Err(errors) => {
            let page = PostFormPage {
                viewer: ViewerView::from(&viewer),
                post: None,
                action: NewPostPath.to_string(),
                form,
                categories: Vec::new(),
                errors,
            };
            return Ok(render_post_form(&db, &templates, page)
                .await?
                .into_response());
        }
    };

    let post_id = db.create_post(&content).await?;
    info!(%post_id, user_id = %viewer.user_id(), "Created post");

    Ok(Redirect::to(&detail_url(post_id)).into_response())
}

async fn edit_post_form(
    EditPostPath { id }: EditPostPath,
    AuthenticatedUser(viewer): AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<TemplateRenderer>>,
) -> Result<Html<String>> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    let page = PostFormPage {
        viewer: ViewerView::from(&viewer),
        post: Some(PostView::from(&post)),
        action: EditPostPath { id }.to_string(),
        form: PostForm::from(&post),
        categories: Vec::new(),
        errors: FormErrors::default(),
    };
    render_post_form(&db, &templates, page).await
}

async fn update_post(
    EditPostPath { id }: EditPostPath,
    AuthenticatedUser(viewer): AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<TemplateRenderer>>,
    Form(form): Form<PostForm>,
) -> Result<Response> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;
    let available = db.list_categories().await?;

    let content = match form.validate(&available) {
        Ok(content) => content,
        Err(errors) => {
            let page = PostFormPage {
                viewer: ViewerView::from(&viewer),
                post: Some(PostView::from(&post)),
                action: EditPostPath { id }.to_string(),
                form,
                categories: Vec::new(),
                errors,
            };
            return Ok(render_post_form(&db, &templates, page)
                .await?
                .into_response());
        }
    };

    // The post may have been deleted since it was fetched above.
    db.update_post(id, &content)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;
    info!(post_id = %id, user_id = %viewer.user_id(), "Updated post");

    Ok(Redirect::to(&detail_url(id)).into_response())
}
