//! Persisted entities of the blog.

pub mod prelude;

pub mod comment;
pub mod follow;
pub mod group;
pub mod post;
pub mod session;
pub mod user;
