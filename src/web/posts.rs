//! Post listings, post authoring, comments and follows.

use std::convert::Infallible;

use axum::{
    Form,
    extract::{FromRequest, FromRequestParts, Multipart, Path, Request, State},
    http::{header, request::Parts},
    response::{Html, IntoResponse, Redirect, Response},
};

use super::{AppState, context, post_detail_url, profile_url, render};
use crate::{
    auth::{CurrentUser, RequireUser},
    entity::{group, post, user},
    error::AppError,
    form::{CleanedPost, CommentForm, FormErrors, FormSchema, PostForm},
    media::ImageUpload,
    service::{Mutation as MutationCore, PostData, Query as QueryCore},
};

/// The `?page=` value of a listing request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PageParams {
    /// Kept raw: unparsable values fall back to the first page
    pub page: Option<String>,
}

impl PageParams {
    /// Read `page` from a query string; when repeated, the last value wins.
    pub fn from_query(query: &str) -> Self {
        let page = url::form_urlencoded::parse(query.as_bytes())
            .filter(|(key, _)| key == "page")
            .map(|(_, value)| value.into_owned())
            .last();
        Self { page }
    }

    /// Path of the home page for this request, used as its cache key.
    /// Values that cannot name a page collapse onto the first one.
    fn index_path(&self) -> String {
        let number = self
            .page
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(1);
        format!("/?page={number}")
    }
}

impl<S: Send + Sync> FromRequestParts<S> for PageParams {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.uri.query().map(Self::from_query).unwrap_or_default())
    }
}

fn parse_post_id(raw: &str) -> Result<i32, AppError> {
    raw.parse().map_err(|_| AppError::NotFound("post"))
}

async fn find_post(state: &AppState, raw_id: &str) -> Result<post::Model, AppError> {
    QueryCore::find_post_by_id(&state.conn, parse_post_id(raw_id)?)
        .await?
        .ok_or(AppError::NotFound("post"))
}

async fn find_author(state: &AppState, username: &str) -> Result<user::Model, AppError> {
    QueryCore::find_user_by_username(&state.conn, username)
        .await?
        .ok_or(AppError::NotFound("author"))
}

/// Home page. Rendered pages are cached per page number and viewer until they expire.
pub async fn index(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    params: PageParams,
) -> Result<Html<String>, AppError> {
    let key = state
        .cache
        .key(&params.index_path(), viewer.as_ref().map(|user| user.id));
    if let Some(body) = state.cache.get(&key) {
        return Ok(Html(body));
    }

    let page =
        QueryCore::find_posts_in_page(&state.conn, state.page_size, params.page.as_deref()).await?;

    let mut ctx = context(viewer.as_ref());
    ctx.insert("page_obj", &page);
    let Html(body) = render(&state, "posts/index.html", &ctx)?;
    state.cache.insert(key, body.clone());

    Ok(Html(body))
}

pub async fn group_posts(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(slug): Path<String>,
    params: PageParams,
) -> Result<Html<String>, AppError> {
    let group = QueryCore::find_group_by_slug(&state.conn, &slug)
        .await?
        .ok_or(AppError::NotFound("group"))?;
    let page = QueryCore::find_group_posts_in_page(
        &state.conn,
        group.id,
        state.page_size,
        params.page.as_deref(),
    )
    .await?;

    let mut ctx = context(viewer.as_ref());
    ctx.insert("group", &group);
    ctx.insert("page_obj", &page);
    render(&state, "posts/group_list.html", &ctx)
}

pub async fn profile(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(username): Path<String>,
    params: PageParams,
) -> Result<Html<String>, AppError> {
    let author = find_author(&state, &username).await?;
    let page = QueryCore::find_author_posts_in_page(
        &state.conn,
        author.id,
        state.page_size,
        params.page.as_deref(),
    )
    .await?;
    let following = match &viewer {
        Some(viewer) => QueryCore::is_following(&state.conn, viewer.id, author.id).await?,
        None => false,
    };

    let mut ctx = context(viewer.as_ref());
    ctx.insert("author", &author);
    ctx.insert("full_name", &author.full_name());
    ctx.insert("post_count", &page.num_items);
    ctx.insert("following", &following);
    ctx.insert("page_obj", &page);
    render(&state, "posts/profile.html", &ctx)
}

pub async fn post_detail(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(post_id): Path<String>,
) -> Result<Html<String>, AppError> {
    let post = QueryCore::find_post_view(&state.conn, parse_post_id(&post_id)?)
        .await?
        .ok_or(AppError::NotFound("post"))?;
    let post_count = QueryCore::count_posts_by_author(&state.conn, post.author.id).await?;
    let comments = QueryCore::find_comments_for_post(&state.conn, post.post.id).await?;

    let mut ctx = context(viewer.as_ref());
    ctx.insert("title", &post.post.to_string());
    ctx.insert("post", &post);
    ctx.insert("post_count", &post_count);
    ctx.insert("comments", &comments);
    ctx.insert("form", &CommentForm::default());
    ctx.insert("errors", &FormErrors::new());
    ctx.insert("fields", CommentForm::FIELDS);
    render(&state, "posts/post_detail.html", &ctx)
}

/// Body of a post form: url-encoded, or multipart when an image is attached.
#[derive(Debug, Clone, Default)]
pub struct PostSubmission {
    pub form: PostForm,
    pub image: Option<ImageUpload>,
}

fn bad_request(message: String) -> AppError {
    AppError::BadRequest(message)
}

impl FromRequest<AppState> for PostSubmission {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if !is_multipart {
            let Form(form) = Form::<PostForm>::from_request(req, state)
                .await
                .map_err(|e| bad_request(e.body_text()))?;
            return Ok(Self { form, image: None });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| bad_request(e.body_text()))?;
        let mut submission = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| bad_request(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_owned();
            match name.as_str() {
                "text" => {
                    submission.form.text = field.text().await.map_err(|e| bad_request(e.body_text()))?;
                }
                "group" => {
                    submission.form.group =
                        field.text().await.map_err(|e| bad_request(e.body_text()))?;
                }
                "image" => {
                    let file_name = field.file_name().map(str::to_owned);
                    let bytes = field.bytes().await.map_err(|e| bad_request(e.body_text()))?;
                    // browsers send an empty part when no file was chosen
                    if !bytes.is_empty() {
                        submission.image = Some(ImageUpload { file_name, bytes });
                    }
                }
                _ => {}
            }
        }

        Ok(submission)
    }
}

fn render_post_form(
    state: &AppState,
    user: &user::Model,
    form: &PostForm,
    errors: &FormErrors,
    groups: &[group::Model],
    post: Option<&post::Model>,
) -> Result<Html<String>, AppError> {
    let mut ctx = context(Some(user));
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("fields", PostForm::FIELDS);
    ctx.insert("groups", groups);
    ctx.insert("is_edit", &post.is_some());
    ctx.insert("post", &post);
    render(state, "posts/create_post.html", &ctx)
}

/// Store the uploaded image, if any, and produce the data to persist.
async fn into_post_data(state: &AppState, cleaned: CleanedPost) -> Result<PostData, AppError> {
    let image = match cleaned.image {
        Some(image) => Some(state.media.save_post_image(&image.upload, image.format).await?),
        None => None,
    };

    Ok(PostData {
        text: cleaned.text,
        group_id: cleaned.group_id,
        image,
    })
}

pub async fn post_create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Html<String>, AppError> {
    let groups = QueryCore::list_groups(&state.conn).await?;
    render_post_form(
        &state,
        &user,
        &PostForm::default(),
        &FormErrors::new(),
        &groups,
        None,
    )
}

pub async fn post_create_submit(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    submission: PostSubmission,
) -> Result<Response, AppError> {
    let groups = QueryCore::list_groups(&state.conn).await?;
    match submission.form.validate(&groups, submission.image.as_ref()) {
        Ok(cleaned) => {
            let data = into_post_data(&state, cleaned).await?;
            MutationCore::create_post(&state.conn, user.id, data).await?;
            Ok(Redirect::to(&profile_url(&user.username)).into_response())
        }
        Err(errors) => Ok(render_post_form(
            &state,
            &user,
            &submission.form,
            &errors,
            &groups,
            None,
        )?
        .into_response()),
    }
}

pub async fn post_edit(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<String>,
) -> Result<Response, AppError> {
    let post = find_post(&state, &post_id).await?;
    if post.author_id != user.id {
        return Ok(Redirect::to(&post_detail_url(post.id)).into_response());
    }

    let groups = QueryCore::list_groups(&state.conn).await?;
    Ok(render_post_form(
        &state,
        &user,
        &PostForm::from_post(&post),
        &FormErrors::new(),
        &groups,
        Some(&post),
    )?
    .into_response())
}

pub async fn post_edit_submit(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<String>,
    submission: PostSubmission,
) -> Result<Response, AppError> {
    let post = find_post(&state, &post_id).await?;
    if post.author_id != user.id {
        return Ok(Redirect::to(&post_detail_url(post.id)).into_response());
    }

    let groups = QueryCore::list_groups(&state.conn).await?;
    match submission.form.validate(&groups, submission.image.as_ref()) {
        Ok(cleaned) => {
            let data = into_post_data(&state, cleaned).await?;
            let post = MutationCore::update_post(&state.conn, post, data).await?;
            Ok(Redirect::to(&post_detail_url(post.id)).into_response())
        }
        Err(errors) => Ok(render_post_form(
            &state,
            &user,
            &submission.form,
            &errors,
            &groups,
            Some(&post),
        )?
        .into_response()),
    }
}

/// Invalid comments are dropped; the browser always goes back to the post.
pub async fn add_comment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Result<Redirect, AppError> {
    let post = find_post(&state, &post_id).await?;
    if let Ok(text) = form.validate() {
        MutationCore::create_comment(&state.conn, post.id, user.id, text).await?;
    }

    Ok(Redirect::to(&post_detail_url(post.id)))
}

pub async fn follow_index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    params: PageParams,
) -> Result<Html<String>, AppError> {
    let page = QueryCore::find_followed_posts_in_page(
        &state.conn,
        user.id,
        state.page_size,
        params.page.as_deref(),
    )
    .await?;

    let mut ctx = context(Some(&user));
    ctx.insert("page_obj", &page);
    render(&state, "posts/follow.html", &ctx)
}

/// Following yourself is silently ignored.
pub async fn profile_follow(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Result<Redirect, AppError> {
    let author = find_author(&state, &username).await?;
    if author.id != user.id {
        MutationCore::follow(&state.conn, user.id, author.id).await?;
    }

    Ok(Redirect::to(&profile_url(&author.username)))
}

/// Unfollowing an author you do not follow is a no-op.
pub async fn profile_unfollow(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Result<Redirect, AppError> {
    let author = find_author(&state, &username).await?;
    MutationCore::unfollow(&state.conn, user.id, author.id).await?;

    Ok(Redirect::to(&profile_url(&author.username)))
}
