use crate::templates::TemplateRenderer;
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::FormRejection;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use quillpad_common::{
    model::{
        Id,
        auth::{PasswordHashError, SessionTokenHashError},
        category::CategoryMarker,
        comment::CommentMarker,
        post::PostMarker,
        user::UserMarker,
    },
    util::PositiveDuration,
};
use quillpad_db::client::{DbClient, DbError};
use std::{collections::HashSet, sync::Arc};
use thiserror::Error;
use tracing::{debug, error};

pub mod auth;
mod extract;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub templates: Arc<TemplateRenderer>,
    pub settings: Arc<Settings>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Settings {
    /// Usernames allowed into the admin pages.
    pub staff: HashSet<String>,
    /// `None` keeps sessions alive until logout.
    pub session_lifetime: Option<PositiveDuration>,
    pub secure_cookies: bool,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Submitted form rejected: {0}")]
    FormRejection(#[from] FormRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Rendering template failed: {0}")]
    Template(#[from] tera::Error),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("The session token could not be hashed: {0}")]
    SessionTokenHash(#[from] SessionTokenHashError),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error("Login required to access {next}")]
    LoginRequired { next: String },
    #[error("Staff access required")]
    Forbidden,
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("Category with id {0} was not found.")]
    CategoryByIdNotFound(Id<CategoryMarker>),
    #[error("Comment with id {0} was not found.")]
    CommentByIdNotFound(Id<CommentMarker>),
    #[error("User with id {0} was not found.")]
    UserByIdNotFound(Id<UserMarker>),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::CategoryByIdNotFound(_)
            | ServerError::CommentByIdNotFound(_)
            | ServerError::UserByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::LoginRequired { .. } => StatusCode::SEE_OTHER,
            ServerError::Forbidden => StatusCode::FORBIDDEN,
            ServerError::FormRejection(_) | ServerError::QueryRejection(_) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::Template(_)
            | ServerError::Database(_)
            | ServerError::SessionTokenHash(_)
            | ServerError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Where anonymous visitors of `next` are sent to sign in.
pub fn login_url(next: &str) -> String {
    format!("/login/?next={}", utf8_percent_encode(next, NON_ALPHANUMERIC))
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let ServerError::LoginRequired { next } = &self {
            debug!(%next, "Redirecting anonymous visitor to login");
            return Redirect::to(&login_url(next)).into_response();
        }

        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let reason = status.canonical_reason().unwrap_or("Error");
        let body = format!(
            "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\"><title>{code} {reason}</title></head>\
            <body><h1>{code} {reason}</h1><p><a href=\"/\">Back to the blog</a></p></body></html>",
            code = status.as_u16()
        );
        (status, Html(body)).into_response()
    }
}


#[cfg(test)]
mod tests {
    use crate::server::{
        login_url,
        test_support::{TestApp, body_text},
    };
    use axum::http::StatusCode;

    #[test]
    fn login_url_encodes_next() {
        assert_eq!(login_url("/post/new/"), "/login/?next=%2Fpost%2Fnew%2F");
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let app = TestApp::new(&[]).await;

        let response = app.get("/no/such/page", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("404 Not Found"));
    }
}
