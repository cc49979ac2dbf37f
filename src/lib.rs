#![deny(missing_debug_implementations)]

//! # Yatube
//!
//! A small blogging site. Users register, publish posts (optionally in a
//! group and with a picture), browse paginated listings, comment on posts
//! and follow other authors to get a personal feed.
//!
//! The crate is layered the usual way for a SeaORM web application:
//!
//! 1. [`entity`] declares the tables and their relations,
//!    [`schema`] creates them.
//! 2. [`service`] holds every query and mutation.
//! 3. [`form`] binds and validates submitted forms; [`media`] checks and
//!    stores uploaded images; [`auth`] deals with passwords and sessions.
//! 4. [`web`] wires handlers, templates and the [`cache::PageCache`] that
//!    fronts the home page into an axum [`Router`](axum::Router).
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use sea_orm::Database;
//! use yatube::{config::Config, schema, web};
//!
//! let config = Config::from_env()?;
//! let conn = Database::connect(config.database_url.as_str()).await?;
//! schema::create_tables(&conn).await?;
//!
//! let app = web::router(web::AppState::new(conn, &config)?);
//! let listener = tokio::net::TcpListener::bind(config.server_url()).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod form;
pub mod media;
pub mod paginator;
pub mod schema;
pub mod service;
pub mod web;

pub use error::AppError;
