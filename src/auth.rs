//! Passwords, sessions and the identity of the requesting user.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use sea_orm::{DbConn, DbErr};
use tower_cookies::{Cookie, Cookies};
use tracing::{error, info};
use url::Url;

use crate::{
    entity::user,
    error::AppError,
    service::{Mutation, Query},
    web::AppState,
};

pub const SESSION_COOKIE: &str = "sessionid";
pub const LOGIN_URL: &str = "/auth/login/";

/// Hash `password` with argon2 off the async executor.
pub async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(e.to_string()))
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

pub fn verify_password(user: &user::Model, password: &str) -> bool {
    if !user.has_usable_password() {
        return false;
    }
    let hash = match PasswordHash::new(&user.password_hash) {
        Ok(hash) => hash,
        Err(err) => {
            error!("failed to parse password hash of {}: {}", user.username, err);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .is_ok()
}

/// The user with these credentials, if they are correct.
pub async fn authenticate(
    db: &DbConn,
    username: &str,
    password: &str,
) -> Result<Option<user::Model>, AppError> {
    let Some(user) = Query::find_user_by_username(db, username.trim()).await? else {
        return Ok(None);
    };
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || verify_password(&user, &password).then_some(user))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Open a session for `user` and hand its token to the browser.
pub async fn login(db: &DbConn, cookies: &Cookies, user: &user::Model) -> Result<(), DbErr> {
    let session = Mutation::create_session(db, user.id).await?;
    let mut cookie = Cookie::new(SESSION_COOKIE, session.token);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookies.add(cookie);
    info!("{} logged in", user.username);

    Ok(())
}

pub async fn logout(db: &DbConn, cookies: &Cookies) -> Result<(), DbErr> {
    if let Some(cookie) = cookies.get(SESSION_COOKIE) {
        Mutation::delete_session(db, cookie.value()).await?;
    }
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookies.remove(cookie);

    Ok(())
}

/// Login page that sends the user back to `next` afterwards.
pub fn login_url(next: &str) -> String {
    let next: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{LOGIN_URL}?next={next}")
}

/// Stand-in origin that relative redirect targets are resolved against.
const LOCAL_ORIGIN: &str = "http://local.invalid/";

/// `next` if it points inside this site, `/` otherwise.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if is_local_path(path) => path,
        _ => "/",
    }
}

/// Browsers read `\` as `/` and drop tabs and newlines, so both are refused
/// before checking that the path resolves to the same host.
fn is_local_path(path: &str) -> bool {
    if !path.starts_with('/') || path.contains('\\') || path.chars().any(char::is_control) {
        return false;
    }

    Url::parse(LOCAL_ORIGIN)
        .and_then(|origin| origin.join(path))
        .is_ok_and(|target| target.host_str() == Some("local.invalid"))
}

async fn session_user(parts: &mut Parts, state: &AppState) -> Result<Option<user::Model>, AppError> {
    let cookies = Cookies::from_request_parts(parts, state)
        .await
        .map_err(|(_, message)| AppError::Internal(message.to_owned()))?;

    match cookies.get(SESSION_COOKIE) {
        Some(cookie) => Ok(Query::find_user_by_session(&state.conn, cookie.value()).await?),
        None => Ok(None),
    }
}

/// The requesting user, if logged in.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<user::Model>);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        session_user(parts, state).await.map(CurrentUser)
    }
}

/// The requesting user; anonymous requests are sent to the login page.
#[derive(Debug, Clone)]
pub struct RequireUser(pub user::Model);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match session_user(parts, state).await {
            Ok(Some(user)) => Ok(RequireUser(user)),
            Ok(None) => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map_or_else(|| parts.uri.path(), |pq| pq.as_str());
                Err(Redirect::to(&login_url(next)).into_response())
            }
            Err(err) => Err(err.into_response()),
        }
    }
}
