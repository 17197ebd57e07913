use crate::{server::ServerRouter, templates::TemplateRenderer};
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(highlight_css)
}

#[derive(TypedPath)]
#[typed_path("/static/highlight.css")]
pub struct HighlightCssPath;

async fn highlight_css(
    _: HighlightCssPath,
    State(templates): State<Arc<TemplateRenderer>>,
) -> Response {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        templates.highlight_css().to_owned(),
    )
        .into_response()
}
