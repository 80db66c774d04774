//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs. Composite uniqueness that the entity attributes cannot express
//! (idempotency keys per owner, one membership row per person and group) is
//! added as explicit indexes.

use crate::entities::{
    Account, Group, GroupMember, Person, PersonLimit, Settlement, SplitShare, Transaction,
    group_member, transaction,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info};

/// Establishes a connection to the database at `database_url`.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to database at {}", database_url);
    Database::connect(database_url).await.map_err(Into::into)
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables and indexes if they do not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, Account).await?;
    create_table(db, &schema, Person).await?;
    create_table(db, &schema, PersonLimit).await?;
    create_table(db, &schema, Group).await?;
    create_table(db, &schema, GroupMember).await?;
    create_table(db, &schema, Transaction).await?;
    create_table(db, &schema, SplitShare).await?;
    create_table(db, &schema, Settlement).await?;

    let idempotency = Index::create()
        .name("ux_transactions_owner_idempotency_key")
        .table(Transaction)
        .col(transaction::Column::OwnerId)
        .col(transaction::Column::IdempotencyKey)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&idempotency)).await?;

    let parent_lookup = Index::create()
        .name("ix_transactions_parent")
        .table(Transaction)
        .col(transaction::Column::ParentTransactionId)
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&parent_lookup)).await?;

    let membership = Index::create()
        .name("ux_group_members_group_person")
        .table(GroupMember)
        .col(group_member::Column::GroupId)
        .col(group_member::Column::PersonId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&membership)).await?;

    info!("Database schema is ready");
    Ok(())
}
