use actix_web::{dev::Payload, web, Error, FromRequest, HttpRequest, HttpResponse};
use futures::future::{ready, Ready};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::utils::jwt;

/// Administrateur authentifié, extrait du header "Authorization: Bearer <token>"
/// Utilisé comme extracteur dans toutes les routes d'administration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
}

fn unauthorized(message: String) -> Error {
    let response = HttpResponse::Unauthorized().json(serde_json::json!({
        "error": message
    }));
    actix_web::error::InternalError::from_response("", response).into()
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, Error> {
    // 1. Extraire le header Authorization
    let auth_header = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| unauthorized("Missing Authorization header".to_string()))?;

    // 2. Convertir le header en string
    let auth_str = auth_header
        .to_str()
        .map_err(|_| unauthorized("Invalid Authorization header".to_string()))?;

    // 3. Extraire le token (format: "Bearer <token>")
    let token = auth_str.strip_prefix("Bearer ").ok_or_else(|| {
        unauthorized("Invalid Authorization format (expected: Bearer <token>)".to_string())
    })?;

    // 4. Vérifier le token avec le secret de la config
    let config = req.app_data::<web::Data<AppConfig>>().ok_or_else(|| {
        actix_web::error::ErrorInternalServerError("Server configuration missing")
    })?;

    let claims = jwt::verify_token(token, &config.jwt_secret).map_err(unauthorized)?;

    Ok(AuthUser {
        user_id: claims.sub,
        username: claims.username,
    })
}

impl FromRequest for AuthUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}
