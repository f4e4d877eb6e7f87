use actix_web::{delete, get, patch, post, put, web, HttpResponse};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use validator::Validate;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{CleanupParams, CreateLicenseRequest, LicenseQuery, UpdateLicenseRequest};
use crate::services::license_service::{LicenseScope, LicenseService};

const DEFAULT_CLEANUP_DAYS: i64 = 30;

async fn list_scope(
    db: &DatabaseConnection,
    config: &AppConfig,
    query: &LicenseQuery,
    scope: LicenseScope,
) -> Result<HttpResponse, AppError> {
    let page = LicenseService::list(db, query, scope, Utc::now(), config.expiring_soon_days).await?;
    Ok(HttpResponse::Ok().json(page))
}

async fn detail_response(
    db: &DatabaseConnection,
    config: &AppConfig,
    id: i32,
) -> Result<HttpResponse, AppError> {
    let license = LicenseService::find(db, id).await?;
    let detail = LicenseService::detail(db, license, Utc::now(), config.expiring_soon_days).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[get("")]
pub async fn list_licenses(
    _auth_user: AuthUser,
    query: web::Query<LicenseQuery>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    list_scope(db.get_ref(), &config, &query, LicenseScope::All).await
}

#[get("/active")]
pub async fn list_active(
    _auth_user: AuthUser,
    query: web::Query<LicenseQuery>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    list_scope(db.get_ref(), &config, &query, LicenseScope::Active).await
}

#[get("/expired")]
pub async fn list_expired(
    _auth_user: AuthUser,
    query: web::Query<LicenseQuery>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    list_scope(db.get_ref(), &config, &query, LicenseScope::Expired).await
}

#[get("/expiring-soon")]
pub async fn list_expiring_soon(
    _auth_user: AuthUser,
    query: web::Query<LicenseQuery>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    list_scope(db.get_ref(), &config, &query, LicenseScope::ExpiringSoon).await
}

/// POST /api/licenses/cleanup-expired?days=30&dry_run=true
#[post("/cleanup-expired")]
pub async fn cleanup_expired(
    _auth_user: AuthUser,
    params: web::Query<CleanupParams>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let report = LicenseService::deactivate_expired(
        db.get_ref(),
        params.days.unwrap_or(DEFAULT_CLEANUP_DAYS),
        params.dry_run.unwrap_or(false),
        Utc::now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(report))
}

#[post("")]
pub async fn create_license(
    auth_user: AuthUser,
    body: web::Json<CreateLicenseRequest>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    let now = Utc::now();
    let license = LicenseService::create(
        db.get_ref(),
        &body,
        Some(auth_user.user_id),
        now,
        config.default_license_days,
    )
    .await?;

    let detail = LicenseService::detail(db.get_ref(), license, now, config.expiring_soon_days).await?;
    Ok(HttpResponse::Created().json(detail))
}

#[get("/{id}")]
pub async fn get_license(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    detail_response(db.get_ref(), &config, path.into_inner()).await
}

async fn apply_update(
    db: &DatabaseConnection,
    config: &AppConfig,
    id: i32,
    request: &UpdateLicenseRequest,
) -> Result<HttpResponse, AppError> {
    request.validate()?;
    LicenseService::update(db, id, request).await?;
    detail_response(db, config, id).await
}

#[put("/{id}")]
pub async fn update_license(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateLicenseRequest>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    apply_update(db.get_ref(), &config, path.into_inner(), &body).await
}

#[patch("/{id}")]
pub async fn patch_license(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateLicenseRequest>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    apply_update(db.get_ref(), &config, path.into_inner(), &body).await
}

#[delete("/{id}")]
pub async fn delete_license(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    LicenseService::delete(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/licenses/{id}/history - Historique des logins (hash masqués)
#[get("/{id}/history")]
pub async fn license_history(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let license = LicenseService::find(db.get_ref(), path.into_inner()).await?;
    let history = LicenseService::history(db.get_ref(), license.id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "license_id": license.id,
        "account_hash_changes_count": history.len(),
        "history": history
    })))
}

/// POST /api/licenses/{id}/reset-binding - Délier le compte de trading
#[post("/{id}/reset-binding")]
pub async fn reset_binding(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    LicenseService::reset_binding(db.get_ref(), id).await?;
    detail_response(db.get_ref(), &config, id).await
}

/// GET /api/licenses/{id}/configuration - Configuration au format du robot
#[get("/{id}/configuration")]
pub async fn license_configuration(
    _auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let configuration = LicenseService::configuration_for(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(configuration))
}

pub fn licenses_routes(cfg: &mut web::ServiceConfig) {
    // Les chemins fixes avant "/{id}"
    cfg.service(
        web::scope("/licenses")
            .service(list_licenses)
            .service(list_active)
            .service(list_expired)
            .service(list_expiring_soon)
            .service(cleanup_expired)
            .service(create_license)
            .service(license_history)
            .service(reset_binding)
            .service(license_configuration)
            .service(get_license)
            .service(update_license)
            .service(patch_license)
            .service(delete_license)
    );
}
