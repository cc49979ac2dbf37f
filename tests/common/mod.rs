#![allow(dead_code)]

use std::{io::Write, sync::Arc};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use sea_orm::{Database, DatabaseConnection};
use tempfile::TempDir;
use tower::ServiceExt;

use yatube::{
    auth::SESSION_COOKIE,
    cache::{ManualClock, PageCache},
    config::Config,
    entity::{group, post, user},
    schema,
    service::{Mutation, NewUser, PostData},
    web::{self, AppState, INDEX_CACHE_PREFIX},
};

/// 1x1 transparent GIF.
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

const BOUNDARY: &str = "yatube-test-boundary";

pub struct TestContext {
    pub db: DatabaseConnection,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub media: TempDir,
    app: Router,
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub set_cookie: Vec<String>,
    pub body: String,
}

impl TestResponse {
    /// Number of posts rendered on a listing page.
    pub fn post_cards(&self) -> usize {
        self.body.matches("<article class=\"post\">").count()
    }

    pub fn assert_redirect(&self, location: &str) {
        assert_eq!(self.status, StatusCode::SEE_OTHER, "body: {}", self.body);
        assert_eq!(self.location.as_deref(), Some(location));
    }
}

impl TestContext {
    pub async fn new() -> Self {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        schema::create_tables(&db).await.unwrap();

        let media = tempfile::tempdir().unwrap();
        let config = Config {
            media_root: media.path().to_owned(),
            ..Config::default()
        };
        let clock = Arc::new(ManualClock::new());
        let cache = PageCache::with_clock(INDEX_CACHE_PREFIX, config.index_cache_ttl, clock.clone());
        let state = AppState::new(db.clone(), &config).unwrap().with_cache(cache);
        let app = web::router(state.clone());

        Self {
            db,
            state,
            clock,
            media,
            app,
        }
    }

    pub async fn user(&self, username: &str) -> user::Model {
        Mutation::create_user(&self.db, NewUser::named(username))
            .await
            .unwrap()
    }

    /// Session cookie for `user`, as if they had logged in.
    pub async fn login(&self, user: &user::Model) -> String {
        let session = Mutation::create_session(&self.db, user.id).await.unwrap();
        format!("{SESSION_COOKIE}={}", session.token)
    }

    pub async fn group(&self, title: &str, slug: &str) -> group::Model {
        Mutation::create_group(&self.db, title, slug, "Test description")
            .await
            .unwrap()
    }

    pub async fn post(
        &self,
        author: &user::Model,
        text: &str,
        group: Option<&group::Model>,
    ) -> post::Model {
        Mutation::create_post(
            &self.db,
            author.id,
            PostData {
                text: text.to_owned(),
                group_id: group.map(|group| group.id),
                image: None,
            },
        )
        .await
        .unwrap()
    }

    pub async fn get(&self, uri: &str, session: Option<&str>) -> TestResponse {
        let request = Self::request(Method::GET, uri, session)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_form(
        &self,
        uri: &str,
        session: Option<&str>,
        fields: &[(&str, &str)],
    ) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let request = Self::request(Method::POST, uri, session)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Submit `fields` plus an optional `(field, file name, content)` upload.
    pub async fn post_multipart(
        &self,
        uri: &str,
        session: Option<&str>,
        fields: &[(&str, &str)],
        file: Option<(&str, &str, &[u8])>,
    ) -> TestResponse {
        let mut body = Vec::new();
        for (name, value) in fields {
            write!(
                body,
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .unwrap();
        }
        if let Some((name, file_name, content)) = file {
            write!(
                body,
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .unwrap();
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        write!(body, "--{BOUNDARY}--\r\n").unwrap();

        let request = Self::request(Method::POST, uri, session)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    fn request(method: Method, uri: &str, session: Option<&str>) -> axum::http::request::Builder {
        let builder = Request::builder().method(method).uri(uri);
        match session {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        }
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|value| value.to_str().unwrap().to_owned());
        let set_cookie = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|value| value.to_str().unwrap().to_owned())
            .collect();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        TestResponse {
            status,
            location,
            set_cookie,
            body: String::from_utf8_lossy(&body).into_owned(),
        }
    }
}
