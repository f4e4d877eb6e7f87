// connexion BD + création du schéma

use sea_orm::sea_query::Index;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema};
use tracing::info;

use crate::models::{account_hash_event, client, license, trading_configuration, users};

pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options.sqlx_logging(false);

    // SQLite en mémoire : une seule connexion, sinon chaque connexion voit une base vide
    if database_url.contains(":memory:") {
        options.max_connections(1).min_connections(1);
    }

    Database::connect(options).await
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(backend.build(&statement)).await?;
    Ok(())
}

/// Crée les tables manquantes (idempotent). L'ordre suit les clés étrangères.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    create_table(db, &schema, users::Entity).await?;
    create_table(db, &schema, trading_configuration::Entity).await?;
    create_table(db, &schema, client::Entity).await?;
    create_table(db, &schema, license::Entity).await?;
    create_table(db, &schema, account_hash_event::Entity).await?;

    let client_identity = Index::create()
        .name("idx_clients_identity")
        .table(client::Entity)
        .col(client::Column::FirstName)
        .col(client::Column::LastName)
        .col(client::Column::Country)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&client_identity)).await?;

    let license_expiry = Index::create()
        .name("idx_licenses_expires_at")
        .table(license::Entity)
        .col(license::Column::ExpiresAt)
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&license_expiry)).await?;

    info!("✅ Database schema ready");
    Ok(())
}

#[cfg(test)]
pub async fn test_connection() -> DatabaseConnection {
    let db = establish_connection("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    ensure_schema(&db).await.expect("Failed to create schema");
    db
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{EntityTrait, PaginatorTrait};

    #[actix_web::test]
    async fn test_schema_is_idempotent() {
        let db = test_connection().await;
        ensure_schema(&db).await.unwrap();

        assert_eq!(license::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(client::Entity::find().count(&db).await.unwrap(), 0);
    }
}
