//! Table creation from the entity definitions.

use sea_orm::{ConnectionTrait, DbConn, DbErr, EntityTrait, ExecResult, Schema};
use tracing::info;

use crate::entity::{comment, follow, group, post, session, user};

async fn create_table<E>(db: &DbConn, entity: E) -> Result<ExecResult, DbErr>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut stmt = Schema::new(builder).create_table_from_entity(entity);
    stmt.if_not_exists();

    db.execute(builder.build(&stmt)).await
}

/// Create every table that does not exist yet, parents before children.
pub async fn create_tables(db: &DbConn) -> Result<(), DbErr> {
    create_table(db, user::Entity).await?;
    create_table(db, group::Entity).await?;
    create_table(db, post::Entity).await?;
    create_table(db, comment::Entity).await?;
    create_table(db, follow::Entity).await?;
    create_table(db, session::Entity).await?;
    info!("database schema is up to date");

    Ok(())
}
