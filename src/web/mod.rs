//! HTTP surface: application state, routes and rendering helpers.

pub mod posts;
pub mod users;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    response::Html,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tera::{Context, Tera};
use tower_cookies::CookieManagerLayer;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    cache::PageCache,
    config::Config,
    entity::user,
    error::AppError,
    media::MediaStore,
};

/// Key prefix of the cached home page.
pub const INDEX_CACHE_PREFIX: &str = "index_page";
/// Largest request body accepted, uploads included.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct AppState {
    pub conn: DatabaseConnection,
    pub templates: Arc<Tera>,
    pub cache: PageCache,
    pub media: MediaStore,
    pub page_size: u64,
}

impl AppState {
    pub fn new(conn: DatabaseConnection, config: &Config) -> Result<Self, tera::Error> {
        Ok(Self {
            conn,
            templates: Arc::new(load_templates()?),
            cache: PageCache::new(INDEX_CACHE_PREFIX, config.index_cache_ttl),
            media: MediaStore::new(&config.media_root),
            page_size: config.page_size,
        })
    }

    /// Replace the home page cache, e.g. with one driven by a test clock.
    pub fn with_cache(self, cache: PageCache) -> Self {
        Self { cache, ..self }
    }
}

pub fn load_templates() -> Result<Tera, tera::Error> {
    Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*"))
}

pub fn router(state: AppState) -> Router {
    let media = ServeDir::new(state.media.root());

    Router::new()
        .route("/", get(posts::index))
        .route("/group/{slug}/", get(posts::group_posts))
        .route("/profile/{username}/", get(posts::profile))
        .route("/profile/{username}/follow/", get(posts::profile_follow))
        .route("/profile/{username}/unfollow/", get(posts::profile_unfollow))
        .route("/posts/{post_id}/", get(posts::post_detail))
        .route(
            "/posts/{post_id}/edit/",
            get(posts::post_edit).post(posts::post_edit_submit),
        )
        .route("/posts/{post_id}/comment/", post(posts::add_comment))
        .route(
            "/create/",
            get(posts::post_create).post(posts::post_create_submit),
        )
        .route("/follow/", get(posts::follow_index))
        .route(
            "/auth/signup/",
            get(users::signup).post(users::signup_submit),
        )
        .route("/auth/login/", get(users::login).post(users::login_submit))
        .route("/auth/logout/", get(users::logout).post(users::logout))
        .nest_service("/media", media)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound("page")
}

/// Template context with the requesting user filled in.
pub(crate) fn context(viewer: Option<&user::Model>) -> Context {
    let mut ctx = Context::new();
    ctx.insert("user", &viewer);
    ctx
}

pub(crate) fn render(state: &AppState, template: &str, ctx: &Context) -> Result<Html<String>, AppError> {
    Ok(Html(state.templates.render(template, ctx)?))
}

fn path_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{}/", path_segment(username))
}

pub fn post_detail_url(post_id: i32) -> String {
    format!("/posts/{post_id}/")
}
