use actix_web::{get, web, HttpResponse};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::services::report_service::{ReportFormat, ReportService};

#[derive(Deserialize)]
pub struct ReportParams {
    pub format: Option<ReportFormat>,
}

/// GET /api/dashboard - Statistiques du tableau de bord
#[get("/dashboard")]
pub async fn dashboard(
    _auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let stats = ReportService::dashboard(db.get_ref(), Utc::now(), config.expiring_soon_days).await?;
    Ok(HttpResponse::Ok().json(stats))
}

/// GET /api/reports/usage?format=json|csv|text
#[get("/reports/usage")]
pub async fn usage_report(
    _auth_user: AuthUser,
    params: web::Query<ReportParams>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let report = ReportService::usage_report(db.get_ref(), Utc::now(), config.expiring_soon_days).await?;

    let response = match params.format.unwrap_or_default() {
        ReportFormat::Json => HttpResponse::Ok().json(report),
        ReportFormat::Csv => HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .body(report.render(ReportFormat::Csv)?),
        ReportFormat::Text => HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .body(report.render(ReportFormat::Text)?),
    };
    Ok(response)
}
