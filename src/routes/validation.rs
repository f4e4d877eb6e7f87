use actix_web::{post, web, HttpResponse};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use tracing::error;
use validator::Validate;

use crate::models::dto::{BotValidationRequest, BotValidationResponse};
use crate::services::license_service::{LicenseService, ValidationOutcome};

fn invalid_request(errors: serde_json::Value) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({
        "success": false,
        "message": "Invalid request data",
        "errors": errors
    }))
}

/// POST /api/validate - Validation de licence par le robot MT5 (PUBLIC)
///
/// Un refus répond 200 avec success=false : le robot lit toujours le corps.
#[post("/validate")]
pub async fn validate_license(
    body: web::Bytes,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    // 1. Décoder et valider la requête
    let request: BotValidationRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return invalid_request(serde_json::json!({ "body": e.to_string() })),
    };

    if let Err(errors) = request.validate() {
        return invalid_request(serde_json::to_value(&errors).unwrap_or_default());
    }

    // 2. Vérifier la licence et enregistrer l'utilisation
    match LicenseService::validate(db.get_ref(), &request, Utc::now()).await {
        Ok(ValidationOutcome::Accepted(accepted)) => HttpResponse::Ok().json(BotValidationResponse {
            success: true,
            message: "License validated successfully".to_string(),
            configuration: Some(accepted.configuration),
            expires_at: Some(accepted.license.expires_at),
            account_trade_mode: Some(accepted.license.account_trade_mode),
            first_time_use: Some(accepted.first_time_use),
            account_login_changed: Some(accepted.account_login_changed),
            usage_count: Some(accepted.license.usage_count),
        }),
        Ok(ValidationOutcome::Rejected(rejection)) => {
            HttpResponse::Ok().json(BotValidationResponse::rejected(rejection.message()))
        }
        Err(e) => {
            error!("❌ License validation error: {}", e);
            HttpResponse::InternalServerError().json(BotValidationResponse::rejected(
                "Internal server error during license validation".to_string(),
            ))
        }
    }
}
