use actix_web::{get, web, HttpResponse};
use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait};
use tracing::error;

use crate::models::health::HealthResponse;
use crate::models::license;

/// GET /api/health - État du service et de la base (PUBLIC)
#[get("/health")]
pub async fn health_check(db: web::Data<DatabaseConnection>) -> HttpResponse {
    let checked = async {
        db.ping().await?;
        license::Entity::find().count(db.get_ref()).await
    }
    .await;

    match checked {
        Ok(total) => HttpResponse::Ok().json(HealthResponse {
            status: "healthy".to_string(),
            database: "connected".to_string(),
            total_licenses: Some(total),
            error: None,
            time: Utc::now(),
        }),
        Err(e) => {
            error!("❌ Health check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(HealthResponse {
                status: "unhealthy".to_string(),
                database: "disconnected".to_string(),
                total_licenses: None,
                error: Some(e.to_string()),
                time: Utc::now(),
            })
        }
    }
}

/// GET /api/info - Description de l'API (PUBLIC)
#[get("/info")]
pub async fn api_info() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "name": "MT5 License Validation API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "validate": "POST /api/validate",
            "health": "GET /api/health",
            "info": "GET /api/info",
            "auth": "/api/auth/*",
            "clients": "/api/clients",
            "licenses": "/api/licenses",
            "configurations": "/api/configurations",
            "dashboard": "GET /api/dashboard",
            "reports": "GET /api/reports/usage"
        }
    }))
}
