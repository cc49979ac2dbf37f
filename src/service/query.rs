use std::collections::HashMap;

use sea_orm::*;

use super::{CommentView, PostView};
use crate::{
    entity::{comment, follow, group, post, session, user},
    paginator::{self, Page},
};

#[derive(Debug)]
pub struct Query;

fn newest_first(select: Select<post::Entity>) -> Select<post::Entity> {
    select
        .order_by_desc(post::Column::PubDate)
        .order_by_desc(post::Column::Id)
}

impl Query {
    pub async fn find_post_by_id(db: &DbConn, id: i32) -> Result<Option<post::Model>, DbErr> {
        post::Entity::find_by_id(id).one(db).await
    }

    pub async fn find_post_view(db: &DbConn, id: i32) -> Result<Option<PostView>, DbErr> {
        match Self::find_post_by_id(db, id).await? {
            Some(post) => Ok(Self::with_relations(db, vec![post]).await?.pop()),
            None => Ok(None),
        }
    }

    pub async fn find_group_by_slug(db: &DbConn, slug: &str) -> Result<Option<group::Model>, DbErr> {
        group::Entity::find()
            .filter(group::Column::Slug.eq(slug))
            .one(db)
            .await
    }

    /// Groups a post may be assigned to, by title.
    pub async fn list_groups(db: &DbConn) -> Result<Vec<group::Model>, DbErr> {
        group::Entity::find()
            .order_by_asc(group::Column::Title)
            .all(db)
            .await
    }

    pub async fn find_user_by_username(
        db: &DbConn,
        username: &str,
    ) -> Result<Option<user::Model>, DbErr> {
        user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(db)
            .await
    }

    pub async fn username_exists(db: &DbConn, username: &str) -> Result<bool, DbErr> {
        Ok(user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .count(db)
            .await?
            > 0)
    }

    /// The user a session token belongs to.
    pub async fn find_user_by_session(
        db: &DbConn,
        token: &str,
    ) -> Result<Option<user::Model>, DbErr> {
        Ok(session::Entity::find_by_id(token.to_owned())
            .find_also_related(user::Entity)
            .one(db)
            .await?
            .and_then(|(_, user)| user))
    }

    pub async fn count_posts(db: &DbConn) -> Result<u64, DbErr> {
        post::Entity::find().count(db).await
    }

    pub async fn count_posts_by_author(db: &DbConn, author_id: i32) -> Result<u64, DbErr> {
        post::Entity::find()
            .filter(post::Column::AuthorId.eq(author_id))
            .count(db)
            .await
    }

    pub async fn count_comments(db: &DbConn, post_id: i32) -> Result<u64, DbErr> {
        comment::Entity::find()
            .filter(comment::Column::PostId.eq(post_id))
            .count(db)
            .await
    }

    pub async fn count_follows(db: &DbConn) -> Result<u64, DbErr> {
        follow::Entity::find().count(db).await
    }

    pub async fn is_following(db: &DbConn, user_id: i32, author_id: i32) -> Result<bool, DbErr> {
        Ok(follow::Entity::find_by_id((user_id, author_id))
            .one(db)
            .await?
            .is_some())
    }

    /// All posts, newest first.
    pub async fn find_posts_in_page(
        db: &DbConn,
        page_size: u64,
        requested: Option<&str>,
    ) -> Result<Page<PostView>, DbErr> {
        Self::posts_in_page(db, post::Entity::find(), page_size, requested).await
    }

    pub async fn find_group_posts_in_page(
        db: &DbConn,
        group_id: i32,
        page_size: u64,
        requested: Option<&str>,
    ) -> Result<Page<PostView>, DbErr> {
        let select = post::Entity::find().filter(post::Column::GroupId.eq(group_id));
        Self::posts_in_page(db, select, page_size, requested).await
    }

    pub async fn find_author_posts_in_page(
        db: &DbConn,
        author_id: i32,
        page_size: u64,
        requested: Option<&str>,
    ) -> Result<Page<PostView>, DbErr> {
        let select = post::Entity::find().filter(post::Column::AuthorId.eq(author_id));
        Self::posts_in_page(db, select, page_size, requested).await
    }

    /// Posts by every author `user_id` follows.
    pub async fn find_followed_posts_in_page(
        db: &DbConn,
        user_id: i32,
        page_size: u64,
        requested: Option<&str>,
    ) -> Result<Page<PostView>, DbErr> {
        let followed = follow::Entity::find()
            .select_only()
            .column(follow::Column::AuthorId)
            .filter(follow::Column::UserId.eq(user_id))
            .into_query();
        let select = post::Entity::find().filter(post::Column::AuthorId.in_subquery(followed));
        Self::posts_in_page(db, select, page_size, requested).await
    }

    /// Comments on a post, oldest first.
    pub async fn find_comments_for_post(
        db: &DbConn,
        post_id: i32,
    ) -> Result<Vec<CommentView>, DbErr> {
        let rows = comment::Entity::find()
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_asc(comment::Column::Created)
            .order_by_asc(comment::Column::Id)
            .find_also_related(user::Entity)
            .all(db)
            .await?;

        rows.into_iter()
            .map(|(comment, author)| {
                let author = author.ok_or_else(|| {
                    DbErr::RecordNotFound(format!("author of comment {}", comment.id))
                })?;
                Ok(CommentView { comment, author })
            })
            .collect()
    }

    async fn posts_in_page(
        db: &DbConn,
        select: Select<post::Entity>,
        page_size: u64,
        requested: Option<&str>,
    ) -> Result<Page<PostView>, DbErr> {
        let Page {
            items,
            number,
            num_pages,
            num_items,
            ..
        } = paginator::fetch_page(db, newest_first(select), page_size, requested).await?;
        let views = Self::with_relations(db, items).await?;

        Ok(Page::new(views, number, num_pages, num_items))
    }

    /// Attach authors and groups to `posts`, keeping their order.
    async fn with_relations(db: &DbConn, posts: Vec<post::Model>) -> Result<Vec<PostView>, DbErr> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }
        let author_ids: Vec<i32> = posts.iter().map(|post| post.author_id).collect();
        let group_ids: Vec<i32> = posts.iter().filter_map(|post| post.group_id).collect();

        let authors: HashMap<i32, user::Model> = user::Entity::find()
            .filter(user::Column::Id.is_in(author_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();
        let groups: HashMap<i32, group::Model> = if group_ids.is_empty() {
            HashMap::new()
        } else {
            group::Entity::find()
                .filter(group::Column::Id.is_in(group_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|group| (group.id, group))
                .collect()
        };

        posts
            .into_iter()
            .map(|post| {
                let author = authors.get(&post.author_id).cloned().ok_or_else(|| {
                    DbErr::RecordNotFound(format!("author of post {}", post.id))
                })?;
                let group = post.group_id.and_then(|id| groups.get(&id).cloned());
                Ok(PostView {
                    post,
                    author,
                    group,
                })
            })
            .collect()
    }
}
