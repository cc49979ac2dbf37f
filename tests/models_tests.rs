pub mod common;

use pretty_assertions::assert_eq;
use sea_orm::{EntityTrait, ModelTrait, PaginatorTrait};

use common::TestContext;
use yatube::{
    AppError,
    entity::{comment, group, post, user},
    service::{Mutation, NewUser, Query},
};

#[tokio::test]
async fn display_strings() {
    let ctx = TestContext::new().await;
    let author = ctx.user("auth").await;
    let group = ctx.group("Test group", "test-slug").await;
    let post = ctx
        .post(&author, "A test post that is rather long", Some(&group))
        .await;
    let short = ctx.post(&author, "Short", None).await;

    assert_eq!(post.to_string(), "A test post tha");
    assert_eq!(post.to_string().chars().count(), post::DISPLAY_LEN);
    assert_eq!(short.to_string(), "Short");
    assert_eq!(group.to_string(), "Test group");
    assert_eq!(author.to_string(), "auth");
}

#[tokio::test]
async fn display_counts_characters_not_bytes() {
    let ctx = TestContext::new().await;
    let author = ctx.user("auth").await;
    let post = ctx
        .post(&author, "Тестовый пост про котиков", None)
        .await;

    assert_eq!(post.to_string(), "Тестовый пост п");
}

#[tokio::test]
async fn usernames_are_unique() {
    let ctx = TestContext::new().await;
    ctx.user("auth").await;

    let duplicate = Mutation::create_user(&ctx.db, NewUser::named("auth")).await;
    assert!(matches!(duplicate, Err(AppError::Db(_))));
    assert_eq!(user::Entity::find().count(&ctx.db).await.unwrap(), 1);
}

#[tokio::test]
async fn group_slugs_are_unique() {
    let ctx = TestContext::new().await;
    ctx.group("Test group", "test-slug").await;

    let duplicate = Mutation::create_group(&ctx.db, "Another", "test-slug", "").await;
    assert!(duplicate.is_err());
    assert_eq!(group::Entity::find().count(&ctx.db).await.unwrap(), 1);
}

#[tokio::test]
async fn users_have_no_usable_password_by_default() {
    let ctx = TestContext::new().await;
    let user = ctx.user("auth").await;

    assert_eq!(user.password_hash, user::UNUSABLE_PASSWORD);
    assert!(!user.has_usable_password());
    assert_eq!(user.full_name(), "auth");
}

#[tokio::test]
async fn post_relations() {
    let ctx = TestContext::new().await;
    let author = ctx.user("auth").await;
    let reader = ctx.user("reader").await;
    let group = ctx.group("Test group", "test-slug").await;
    let post = ctx.post(&author, "Related post", Some(&group)).await;
    Mutation::create_comment(&ctx.db, post.id, reader.id, "Hi".to_owned())
        .await
        .unwrap();

    let view = Query::find_post_view(&ctx.db, post.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(view.author, author);
    assert_eq!(view.group, Some(group.clone()));

    let group_posts = group.find_related(post::Entity).all(&ctx.db).await.unwrap();
    assert_eq!(group_posts, vec![post.clone()]);
    let author_posts = author.find_related(post::Entity).all(&ctx.db).await.unwrap();
    assert_eq!(author_posts, vec![post.clone()]);

    let comments = Query::find_comments_for_post(&ctx.db, post.id).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].comment.text, "Hi");
    assert_eq!(comments[0].author, reader);
}

#[tokio::test]
async fn deleting_a_post_removes_its_comments() {
    let ctx = TestContext::new().await;
    let author = ctx.user("auth").await;
    let post = ctx.post(&author, "Short-lived post", None).await;
    Mutation::create_comment(&ctx.db, post.id, author.id, "Bye".to_owned())
        .await
        .unwrap();

    let result = Mutation::delete_post(&ctx.db, post.id).await.unwrap();
    assert_eq!(result.rows_affected, 1);
    assert_eq!(Query::count_posts(&ctx.db).await.unwrap(), 0);
    assert_eq!(comment::Entity::find().count(&ctx.db).await.unwrap(), 0);
}

#[tokio::test]
async fn deleting_a_group_keeps_its_posts() {
    let ctx = TestContext::new().await;
    let author = ctx.user("auth").await;
    let group = ctx.group("Test group", "test-slug").await;
    let post = ctx.post(&author, "Orphaned post", Some(&group)).await;

    group::Entity::delete_by_id(group.id)
        .exec(&ctx.db)
        .await
        .unwrap();

    let post = Query::find_post_by_id(&ctx.db, post.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(post.group_id, None);
}
