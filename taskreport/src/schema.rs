//! Table creation from entity metadata.
//!
//! Each domain table is created with `CREATE TABLE IF NOT EXISTS` derived
//! from its entity definition, so a fresh database bootstraps itself on
//! first start. The scheduler's own `_report_jobs` table is created
//! separately by [`crate::scheduler::store`].

use sea_orm::sea_query::SqliteQueryBuilder;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Schema};

use crate::entity::{subscription, task, user};

/// Create the `users`, `tasks` and `subscriptions` tables if they do not
/// already exist.
pub async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table_from_entity(db, user::Entity).await?;
    create_table_from_entity(db, task::Entity).await?;
    create_table_from_entity(db, subscription::Entity).await?;
    Ok(())
}

async fn create_table_from_entity<E>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let create_stmt = schema
        .create_table_from_entity(entity)
        .if_not_exists()
        .to_owned();
    db.execute_unprepared(&create_stmt.to_string(SqliteQueryBuilder))
        .await?;
    Ok(())
}
