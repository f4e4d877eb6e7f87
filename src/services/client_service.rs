use sea_orm::*;
use tracing::info;

use crate::error::AppError;
use crate::models::dto::{ClientQuery, ClientRequest, ClientResponse, Page};
use crate::models::{account_hash_event, client, license};
use crate::services::fetch_page;

pub struct ClientService;

pub fn to_response(client: client::Model, license_count: Option<u64>) -> ClientResponse {
    ClientResponse {
        id: client.id,
        full_name: client.full_name(),
        first_name: client.first_name,
        last_name: client.last_name,
        country: client.country,
        email: client.email,
        phone: client.phone,
        license_count,
        created_at: client.created_at,
        updated_at: client.updated_at,
    }
}

/// Chaîne vide => NULL pour les champs optionnels
fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ClientService {
    pub async fn find(db: &DatabaseConnection, id: i32) -> Result<client::Model, AppError> {
        client::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("Client", id))
    }

    pub async fn license_count(db: &DatabaseConnection, id: i32) -> Result<u64, DbErr> {
        license::Entity::find()
            .filter(license::Column::ClientId.eq(id))
            .count(db)
            .await
    }

    pub async fn get(db: &DatabaseConnection, id: i32) -> Result<ClientResponse, AppError> {
        let client = Self::find(db, id).await?;
        let count = Self::license_count(db, id).await?;
        Ok(to_response(client, Some(count)))
    }

    pub async fn list(db: &DatabaseConnection, query: &ClientQuery) -> Result<Page<ClientResponse>, AppError> {
        let mut select = client::Entity::find()
            .order_by_asc(client::Column::LastName)
            .order_by_asc(client::Column::FirstName);

        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(client::Column::FirstName.contains(search))
                    .add(client::Column::LastName.contains(search))
                    .add(client::Column::Email.contains(search))
                    .add(client::Column::Country.contains(search)),
            );
        }

        if let Some(country) = query.country.as_deref().filter(|c| !c.is_empty()) {
            select = select.filter(client::Column::Country.eq(country));
        }

        let (clients, count) = fetch_page(db, select, query.paging()).await?;

        let mut results = Vec::with_capacity(clients.len());
        for c in clients {
            let licenses = Self::license_count(db, c.id).await?;
            results.push(to_response(c, Some(licenses)));
        }

        Ok(Page::new(results, count, query.paging()))
    }

    /// Unicité (prénom, nom, pays)
    async fn ensure_unique_identity(
        db: &DatabaseConnection,
        request: &ClientRequest,
        except_id: Option<i32>,
    ) -> Result<(), AppError> {
        let mut select = client::Entity::find()
            .filter(client::Column::FirstName.eq(request.first_name.trim()))
            .filter(client::Column::LastName.eq(request.last_name.trim()))
            .filter(client::Column::Country.eq(request.country.trim()));
        if let Some(id) = except_id {
            select = select.filter(client::Column::Id.ne(id));
        }

        if select.one(db).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Client {} {} ({}) already exists",
                request.first_name.trim(),
                request.last_name.trim(),
                request.country.trim()
            )));
        }
        Ok(())
    }

    pub async fn create(
        db: &DatabaseConnection,
        request: &ClientRequest,
        created_by: Option<i32>,
    ) -> Result<client::Model, AppError> {
        Self::ensure_unique_identity(db, request, None).await?;

        let client = client::ActiveModel {
            first_name: Set(request.first_name.trim().to_string()),
            last_name: Set(request.last_name.trim().to_string()),
            country: Set(request.country.trim().to_string()),
            email: Set(optional(&request.email)),
            phone: Set(optional(&request.phone)),
            created_by: Set(created_by),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!("👤 Created client {}", client.full_name());
        Ok(client)
    }

    pub async fn update(
        db: &DatabaseConnection,
        id: i32,
        request: &ClientRequest,
    ) -> Result<client::Model, AppError> {
        let existing = Self::find(db, id).await?;
        Self::ensure_unique_identity(db, request, Some(id)).await?;

        let mut active: client::ActiveModel = existing.into();
        active.first_name = Set(request.first_name.trim().to_string());
        active.last_name = Set(request.last_name.trim().to_string());
        active.country = Set(request.country.trim().to_string());
        active.email = Set(optional(&request.email));
        active.phone = Set(optional(&request.phone));

        Ok(active.update(db).await?)
    }

    /// Supprime le client et ses licences (avec leur historique) dans une transaction
    pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<u64, AppError> {
        let client = Self::find(db, id).await?;

        let txn = db.begin().await?;

        let license_ids: Vec<i32> = license::Entity::find()
            .filter(license::Column::ClientId.eq(id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|l| l.id)
            .collect();

        if !license_ids.is_empty() {
            account_hash_event::Entity::delete_many()
                .filter(account_hash_event::Column::LicenseId.is_in(license_ids))
                .exec(&txn)
                .await?;
        }

        let deleted = license::Entity::delete_many()
            .filter(license::Column::ClientId.eq(id))
            .exec(&txn)
            .await?
            .rows_affected;

        client::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        info!("🗑️  Deleted client {} and {} license(s)", client.full_name(), deleted);
        Ok(deleted)
    }
}
