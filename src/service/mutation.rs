use chrono::Utc;
use sea_orm::{sea_query::OnConflict, *};
use tracing::info;
use uuid::Uuid;

use super::{NewUser, PostData};
use crate::{
    auth,
    entity::{comment, follow, group, post, session, user},
    error::AppError,
};

#[derive(Debug)]
pub struct Mutation;

impl Mutation {
    pub async fn create_user(db: &DbConn, new_user: NewUser) -> Result<user::Model, AppError> {
        let password_hash = match new_user.password {
            Some(password) => auth::hash_password(password).await?,
            None => user::UNUSABLE_PASSWORD.to_owned(),
        };

        let user = user::ActiveModel {
            username: Set(new_user.username),
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            email: Set(new_user.email),
            password_hash: Set(password_hash),
            date_joined: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;
        info!("registered user {}", user.username);

        Ok(user)
    }

    pub async fn create_group(
        db: &DbConn,
        title: &str,
        slug: &str,
        description: &str,
    ) -> Result<group::Model, DbErr> {
        group::ActiveModel {
            title: Set(title.to_owned()),
            slug: Set(slug.to_owned()),
            description: Set(description.to_owned()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn create_post(
        db: &DbConn,
        author_id: i32,
        data: PostData,
    ) -> Result<post::Model, DbErr> {
        let post = post::ActiveModel {
            text: Set(data.text),
            pub_date: Set(Utc::now()),
            author_id: Set(author_id),
            group_id: Set(data.group_id),
            image: Set(data.image),
            ..Default::default()
        }
        .insert(db)
        .await?;
        info!("user {author_id} published post {}", post.id);

        Ok(post)
    }

    /// Overwrite text and group of `post`; the image only when a new one is given.
    pub async fn update_post(
        db: &DbConn,
        post: post::Model,
        data: PostData,
    ) -> Result<post::Model, DbErr> {
        let mut post: post::ActiveModel = post.into();
        post.text = Set(data.text);
        post.group_id = Set(data.group_id);
        if let Some(image) = data.image {
            post.image = Set(Some(image));
        }

        let post = post.update(db).await?;
        info!("post {} edited", post.id);

        Ok(post)
    }

    pub async fn delete_post(db: &DbConn, id: i32) -> Result<DeleteResult, DbErr> {
        post::Entity::delete_by_id(id).exec(db).await
    }

    pub async fn create_comment(
        db: &DbConn,
        post_id: i32,
        author_id: i32,
        text: String,
    ) -> Result<comment::Model, DbErr> {
        let comment = comment::ActiveModel {
            text: Set(text),
            created: Set(Utc::now()),
            author_id: Set(author_id),
            post_id: Set(post_id),
            ..Default::default()
        }
        .insert(db)
        .await?;
        info!("user {author_id} commented on post {post_id}");

        Ok(comment)
    }

    /// Record that `user_id` follows `author_id`. Returns `false` if it already did.
    pub async fn follow(db: &DbConn, user_id: i32, author_id: i32) -> Result<bool, DbErr> {
        let inserted = follow::Entity::insert(follow::ActiveModel {
            user_id: Set(user_id),
            author_id: Set(author_id),
        })
        .on_conflict(
            OnConflict::columns([follow::Column::UserId, follow::Column::AuthorId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

        if inserted > 0 {
            info!("user {user_id} now follows {author_id}");
        }
        Ok(inserted > 0)
    }

    /// Remove the follow relation, if any. Returns whether one existed.
    pub async fn unfollow(db: &DbConn, user_id: i32, author_id: i32) -> Result<bool, DbErr> {
        let result = follow::Entity::delete_many()
            .filter(follow::Column::UserId.eq(user_id))
            .filter(follow::Column::AuthorId.eq(author_id))
            .exec(db)
            .await?;

        if result.rows_affected > 0 {
            info!("user {user_id} unfollowed {author_id}");
        }
        Ok(result.rows_affected > 0)
    }

    pub async fn create_session(db: &DbConn, user_id: i32) -> Result<session::Model, DbErr> {
        session::ActiveModel {
            token: Set(Uuid::new_v4().simple().to_string()),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await
    }

    pub async fn delete_session(db: &DbConn, token: &str) -> Result<DeleteResult, DbErr> {
        session::Entity::delete_by_id(token.to_owned()).exec(db).await
    }
}
