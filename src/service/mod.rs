//! Database reads and writes used by the request handlers.

mod mutation;
mod query;

pub use mutation::*;
pub use query::*;

use serde::Serialize;

use crate::entity::{comment, group, post, user};

/// A post together with the records it is displayed with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: post::Model,
    pub author: user::Model,
    pub group: Option<group::Model>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: comment::Model,
    pub author: user::Model,
}

/// Account details for registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// `None` creates an account that cannot log in with a password
    pub password: Option<String>,
}

impl NewUser {
    pub fn named(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }
}

/// Validated content of a post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostData {
    pub text: String,
    pub group_id: Option<i32>,
    /// Stored image path; `None` leaves the current image untouched on update
    pub image: Option<String>,
}
