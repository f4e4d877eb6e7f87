use actix_web::{delete, get, patch, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{ConfigurationQuery, ConfigurationRequest};
use crate::services::configuration_service::ConfigurationService;

#[get("")]
pub async fn list_configurations(
    _auth_user: AuthUser,
    query: web::Query<ConfigurationQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let page = ConfigurationService::list(db.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[post("")]
pub async fn create_configuration(
    _auth_user: AuthUser,
    body: web::Json<ConfigurationRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    let configuration = ConfigurationService::create(db.get_ref(), &body).await?;
    let response = ConfigurationService::get(db.get_ref(), configuration.id).await?;
    Ok(HttpResponse::Created().json(response))
}

#[get("/{id}")]
pub async fn get_configuration(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let response = ConfigurationService::get(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn apply_update(
    db: &DatabaseConnection,
    id: i32,
    request: &ConfigurationRequest,
) -> Result<HttpResponse, AppError> {
    request.validate()?;
    ConfigurationService::update(db, id, request).await?;
    let response = ConfigurationService::get(db, id).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[put("/{id}")]
pub async fn update_configuration(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<ConfigurationRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    apply_update(db.get_ref(), path.into_inner(), &body).await
}

#[patch("/{id}")]
pub async fn patch_configuration(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<ConfigurationRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    apply_update(db.get_ref(), path.into_inner(), &body).await
}

#[delete("/{id}")]
pub async fn delete_configuration(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    ConfigurationService::delete(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn configurations_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/configurations")
            .service(list_configurations)
            .service(create_configuration)
            .service(get_configuration)
            .service(update_configuration)
            .service(patch_configuration)
            .service(delete_configuration)
    );
}
