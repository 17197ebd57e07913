use crate::server::ServerError;
use axum::extract::{FromRequest, FromRequestParts, Query as AxumQuery};
use axum_extra::extract::Form as HtmlForm;

/// An urlencoded form body. Repeated keys, as sent by multi-selects, collect
/// into sequences.
#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(HtmlForm), rejection(ServerError))]
pub struct Form<T>(pub T);

#[derive(FromRequestParts, Debug, Clone, Copy, Default)]
#[from_request(via(AxumQuery), rejection(ServerError))]
pub struct Query<T>(pub T);
