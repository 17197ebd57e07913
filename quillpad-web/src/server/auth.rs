use crate::server::{Result, ServerError, Settings};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use quillpad_common::model::{
    Id,
    auth::{Session, SessionToken, SessionTokenHash},
    user::{User, UserMarker},
};
use quillpad_db::client::DbClient;
use std::sync::Arc;
use time::UtcDateTime;
use tracing::{debug, info};

pub const SESSION_COOKIE: &str = "quillpad_session";

/// The user behind a valid session cookie.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct SessionUser {
    pub user: User,
    pub is_staff: bool,
    token_hash: SessionTokenHash,
}

impl SessionUser {
    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.user.id
    }
}

/// Resolves the session cookie if there is one. Missing, malformed, unknown
/// and expired sessions all resolve to `None`.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct CurrentUser(pub Option<SessionUser>);

impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<DbClient>: FromRef<S>,
    Arc<Settings>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        if let Some(current) = parts.extensions.get::<Self>() {
            return Ok(current.clone());
        }

        let jar = CookieJar::from_headers(&parts.headers);
        let session_user = match jar.get(SESSION_COOKIE) {
            Some(cookie) => {
                let db = Arc::<DbClient>::from_ref(state);
                let settings = Arc::<Settings>::from_ref(state);
                resolve_session(cookie.value(), &db, &settings).await?
            }
            None => None,
        };

        let current = Self(session_user);
        parts.extensions.insert(current.clone());
        Ok(current)
    }
}

async fn resolve_session(
    cookie_value: &str,
    db: &DbClient,
    settings: &Settings,
) -> Result<Option<SessionUser>> {
    let token: SessionToken = match cookie_value.parse() {
        Ok(token) => token,
        Err(err) => {
            debug!(%err, "Ignoring malformed session cookie");
            return Ok(None);
        }
    };

    let token_hash = token.hash()?;

    let Some((session, user)) = db.fetch_session(&token_hash).await? else {
        debug!(user_id = %token.user_id, "Ignoring unknown session");
        return Ok(None);
    };

    if session.user != token.user_id {
        debug!(user_id = %token.user_id, "Ignoring session presented for another user");
        return Ok(None);
    }

    if session.is_expired_at(UtcDateTime::now()) {
        debug!(user_id = %session.user, "Removing expired session");
        db.delete_session(&token_hash).await?;
        return Ok(None);
    }

    let is_staff = settings.staff.contains(user.username.get());

    Ok(Some(SessionUser {
        user,
        is_staff,
        token_hash,
    }))
}

/// Like [`CurrentUser`], but anonymous visitors are redirected to the login
/// page and brought back afterwards.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct AuthenticatedUser(pub SessionUser);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    Arc<Settings>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let CurrentUser(session_user) = CurrentUser::from_request_parts(parts, state).await?;

        session_user.map(Self).ok_or_else(|| ServerError::LoginRequired {
            next: parts
                .uri
                .path_and_query()
                .map_or_else(|| parts.uri.path().to_owned(), ToString::to_string),
        })
    }
}

/// A signed in user listed in the configured staff usernames.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct StaffUser(pub SessionUser);

impl<S> FromRequestParts<S> for StaffUser
where
    Arc<DbClient>: FromRef<S>,
    Arc<Settings>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let AuthenticatedUser(session_user) =
            AuthenticatedUser::from_request_parts(parts, state).await?;

        if session_user.is_staff {
            Ok(Self(session_user))
        } else {
            Err(ServerError::Forbidden)
        }
    }
}

/// Persists a fresh session for `user_id` and sets its cookie on `jar`.
pub async fn open_session(
    db: &DbClient,
    settings: &Settings,
    jar: CookieJar,
    user_id: Id<UserMarker>,
) -> Result<CookieJar> {
    let token = SessionToken::generate_random(user_id);
    let session = Session {
        user: user_id,
        token_hash: token.hash()?,
        created_at: UtcDateTime::now(),
        expires_after: settings.session_lifetime,
    };

    db.create_session(&session).await?;
    info!(%user_id, "Opened session");

    let mut cookie = Cookie::build((SESSION_COOKIE, token.as_token_str()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(settings.secure_cookies);
    if let Some(lifetime) = settings.session_lifetime {
        cookie = cookie.max_age(lifetime.get());
    }

    Ok(jar.add(cookie))
}

/// Deletes the session of `session_user` and clears its cookie.
pub async fn close_session(
    db: &DbClient,
    jar: CookieJar,
    session_user: &SessionUser,
) -> Result<CookieJar> {
    db.delete_session(&session_user.token_hash).await?;
    info!(user_id = %session_user.user_id(), "Closed session");

    Ok(jar.remove(Cookie::build(SESSION_COOKIE).path("/")))
}
