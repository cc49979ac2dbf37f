//! Registration, login and logout.

use axum::{
    Form,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_cookies::Cookies;
use tracing::info;

use super::{AppState, context, render};
use crate::{
    auth::{self, CurrentUser},
    entity::user,
    error::AppError,
    form::{FormErrors, FormSchema, LoginForm, NON_FIELD_ERRORS, SignupForm},
    service::{Mutation as MutationCore, Query as QueryCore},
};

#[derive(Debug, Default, Deserialize)]
pub struct LoginParams {
    next: Option<String>,
}

fn render_signup(
    state: &AppState,
    viewer: Option<&user::Model>,
    form: &SignupForm,
    errors: &FormErrors,
) -> Result<Html<String>, AppError> {
    let mut ctx = context(viewer);
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("fields", SignupForm::FIELDS);
    render(state, "users/signup.html", &ctx)
}

pub async fn signup(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
) -> Result<Html<String>, AppError> {
    render_signup(&state, viewer.as_ref(), &SignupForm::default(), &FormErrors::new())
}

/// A successful registration does not log the new user in.
pub async fn signup_submit(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    let taken = QueryCore::username_exists(&state.conn, form.username.trim()).await?;
    match form.validate(taken) {
        Ok(new_user) => {
            MutationCore::create_user(&state.conn, new_user).await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(errors) => Ok(render_signup(&state, viewer.as_ref(), &form, &errors)?.into_response()),
    }
}

fn render_login(
    state: &AppState,
    viewer: Option<&user::Model>,
    form: &LoginForm,
    errors: &FormErrors,
    next: Option<&str>,
) -> Result<Html<String>, AppError> {
    let mut ctx = context(viewer);
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("fields", LoginForm::FIELDS);
    ctx.insert("next", &next);
    render(state, "users/login.html", &ctx)
}

pub async fn login(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Query(params): Query<LoginParams>,
) -> Result<Html<String>, AppError> {
    render_login(
        &state,
        viewer.as_ref(),
        &LoginForm::default(),
        &FormErrors::new(),
        params.next.as_deref(),
    )
}

pub async fn login_submit(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Query(params): Query<LoginParams>,
    cookies: Cookies,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let next = params.next.as_deref();
    if let Err(errors) = form.validate() {
        return Ok(render_login(&state, viewer.as_ref(), &form, &errors, next)?.into_response());
    }

    match auth::authenticate(&state.conn, &form.username, &form.password).await? {
        Some(user) => {
            auth::login(&state.conn, &cookies, &user).await?;
            Ok(Redirect::to(auth::safe_next(next)).into_response())
        }
        None => {
            let mut errors = FormErrors::new();
            errors.add(NON_FIELD_ERRORS, LoginForm::INVALID_LOGIN);
            Ok(render_login(&state, viewer.as_ref(), &form, &errors, next)?.into_response())
        }
    }
}

pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    cookies: Cookies,
) -> Result<Html<String>, AppError> {
    auth::logout(&state.conn, &cookies).await?;
    if let Some(user) = viewer {
        info!("{} logged out", user.username);
    }

    render(&state, "users/logged_out.html", &context(None))
}
