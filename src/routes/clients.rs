use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use validator::Validate;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{ClientQuery, ClientRequest, LicenseQuery};
use crate::services::client_service::{self, ClientService};
use crate::services::license_service::{LicenseScope, LicenseService};

#[get("")]
pub async fn list_clients(
    _auth_user: AuthUser,
    query: web::Query<ClientQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let page = ClientService::list(db.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[post("")]
pub async fn create_client(
    auth_user: AuthUser,
    body: web::Json<ClientRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    let client = ClientService::create(db.get_ref(), &body, Some(auth_user.user_id)).await?;
    Ok(HttpResponse::Created().json(client_service::to_response(client, Some(0))))
}

#[get("/{id}")]
pub async fn get_client(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let client = ClientService::get(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(client))
}

#[put("/{id}")]
pub async fn update_client(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<ClientRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    let id = path.into_inner();
    ClientService::update(db.get_ref(), id, &body).await?;
    let client = ClientService::get(db.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(client))
}

#[delete("/{id}")]
pub async fn delete_client(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let deleted = ClientService::delete(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "deleted_licenses": deleted
    })))
}

/// GET /api/clients/{id}/licenses - Licences d'un client
#[get("/{id}/licenses")]
pub async fn client_licenses(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    query: web::Query<LicenseQuery>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let client = ClientService::find(db.get_ref(), path.into_inner()).await?;

    let mut query = query.into_inner();
    query.client_id = Some(client.id);

    let page = LicenseService::list(
        db.get_ref(),
        &query,
        LicenseScope::All,
        Utc::now(),
        config.expiring_soon_days,
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub fn clients_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/clients")
            .service(list_clients)
            .service(create_client)
            .service(client_licenses)
            .service(get_client)
            .service(update_client)
            .service(delete_client)
    );
}
