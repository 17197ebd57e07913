use crate::{
    server::{
        Result, ServerError, ServerRouter, Settings,
        auth::{CurrentUser, close_session, open_session},
        extract::{Form, Query},
    },
    templates::{TemplateRenderer, view::ViewerView},
};
use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::{
    extract::CookieJar,
    routing::{RouterExt, TypedPath},
};
use quillpad_common::{
    form::{FormErrors, INVALID_LOGIN, LoginForm, RegistrationForm},
    model::{auth::PasswordDigest, user::CreateUser},
};
use quillpad_db::client::{DbClient, DbError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

const USERNAME_TAKEN: &str = "A user with that username already exists.";

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(registration_form)
        .typed_post(register)
        .typed_get(login_form)
        .typed_post(login)
        .typed_post(logout)
}

#[derive(TypedPath)]
#[typed_path("/register/")]
pub struct RegisterPath;

#[derive(TypedPath)]
#[typed_path("/login/")]
pub struct LoginPath;

#[derive(TypedPath)]
#[typed_path("/logout/")]
pub struct LogoutPath;

/// Only local paths are followed after login, anything else goes home.
fn redirect_target(next: Option<&str>) -> &str {
    match next {
        Some(next) if next.starts_with('/') && !next.starts_with("//") => next,
        _ => "/",
    }
}

#[derive(Serialize)]
struct RegisterPage {
    viewer: Option<ViewerView>,
    username: String,
    errors: FormErrors,
}

async fn registration_form(
    _: RegisterPath,
    CurrentUser(viewer): CurrentUser,
    State(templates): State<Arc<TemplateRenderer>>,
) -> Result<Html<String>> {
    let page = RegisterPage {
        viewer: viewer.as_ref().map(ViewerView::from),
        username: String::new(),
        errors: FormErrors::default(),
    };
    Ok(templates.render("register.html", &page)?)
}

async fn register(
    _: RegisterPath,
    CurrentUser(viewer): CurrentUser,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<TemplateRenderer>>,
    State(settings): State<Arc<Settings>>,
    jar: CookieJar,
    Form(form): Form<RegistrationForm>,
) -> Result<Response> {
    let rejected = |errors: FormErrors| -> Result<Response> {
        let page = RegisterPage {
            viewer: viewer.as_ref().map(ViewerView::from),
            username: form.username.clone(),
            errors,
        };
        Ok(templates.render("register.html", &page)?.into_response())
    };

    let registration = match form.validate() {
        Ok(registration) => registration,
        Err(errors) => return rejected(errors),
    };

    if db.username_exists(&registration.username).await? {
        return rejected(FormErrors::with("username", USERNAME_TAKEN));
    }

    let user = CreateUser {
        username: registration.username,
        password: PasswordDigest::hash(&registration.password)?,
    };
    let user_id = match db.create_user(&user).await {
        Ok(user_id) => user_id,
        Err(DbError::UsernameTaken) => {
            return rejected(FormErrors::with("username", USERNAME_TAKEN));
        }
        Err(err) => return Err(err.into()),
    };
    info!(%user_id, username = user.username.get(), "Registered user");

    let jar = open_session(&db, &settings, jar, user_id).await?;
    Ok((jar, Redirect::to("/")).into_response())
}

#[derive(Deserialize)]
struct LoginQuery {
    next: Option<String>,
}

#[derive(Serialize)]
struct LoginPage {
    viewer: Option<ViewerView>,
    username: String,
    next: Option<String>,
    errors: FormErrors,
}

async fn login_form(
    _: LoginPath,
    CurrentUser(viewer): CurrentUser,
    State(templates): State<Arc<TemplateRenderer>>,
    Query(LoginQuery { next }): Query<LoginQuery>,
) -> Result<Html<String>> {
    let page = LoginPage {
        viewer: viewer.as_ref().map(ViewerView::from),
        username: String::new(),
        next,
        errors: FormErrors::default(),
    };
    Ok(templates.render("login.html", &page)?)
}

async fn login(
    _: LoginPath,
    CurrentUser(viewer): CurrentUser,
    State(db): State<Arc<DbClient>>,
    State(templates): State<Arc<TemplateRenderer>>,
    State(settings): State<Arc<Settings>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let rejected = |errors: FormErrors| -> Result<Response> {
        let page = LoginPage {
            viewer: viewer.as_ref().map(ViewerView::from),
            username: form.username.clone(),
            next: form.next.clone(),
            errors,
        };
        Ok(templates.render("login.html", &page)?.into_response())
    };

    let (username, password) = match form.validate() {
        Ok(credentials) => credentials,
        Err(errors) => return rejected(errors),
    };

    let credentials = db.fetch_credentials(&username).await?;
    let Some(credentials) = credentials.filter(|credentials| credentials.password.verify(password))
    else {
        info!(username = username.get(), "Rejected login attempt");
        return rejected(FormErrors::with(FormErrors::FORM, INVALID_LOGIN));
    };

    let jar = open_session(&db, &settings, jar, credentials.user.id).await?;
    let target = redirect_target(form.next.as_deref());
    Ok((jar, Redirect::to(target)).into_response())
}

async fn logout(
    _: LogoutPath,
    CurrentUser(viewer): CurrentUser,
    State(db): State<Arc<DbClient>>,
    jar: CookieJar,
) -> Result<Response> {
    let jar = match viewer {
        Some(viewer) => close_session(&db, jar, &viewer).await?,
        None => jar,
    };

    Ok((jar, Redirect::to("/")).into_response())
}
