use actix_web::{get, post, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::services::admin_service::AdminService;
use crate::utils::jwt;

// DTO pour la connexion et la création d'un admin
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

// DTO pour changer le mot de passe
#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// Réponse après login
#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: i32,
    pub username: String,
    pub expires_in: i64,
}

/// POST /api/auth/login - Se connecter (PUBLIC)
#[post("/login")]
pub async fn login(
    body: web::Json<CredentialsRequest>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let admin = AdminService::authenticate(db.get_ref(), &body.username, &body.password).await?;

    let token = jwt::generate_token(admin.id, &admin.username, &config.jwt_secret, config.jwt_ttl_hours)
        .map_err(AppError::Internal)?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        token,
        user_id: admin.id,
        username: admin.username,
        expires_in: config.jwt_ttl_hours * 3600,
    }))
}

/// GET /api/auth/me - Admin courant (PROTÉGÉE)
#[get("/me")]
pub async fn me(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let admin = AdminService::find_by_id(db.get_ref(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(admin))
}

/// POST /api/auth/change-password - Changer son mot de passe (PROTÉGÉE)
#[post("/change-password")]
pub async fn change_password(
    auth_user: AuthUser,
    body: web::Json<ChangePasswordRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    AdminService::change_password(
        db.get_ref(),
        auth_user.user_id,
        &body.current_password,
        &body.new_password,
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Password changed successfully"
    })))
}

/// POST /api/auth/users - Créer un autre administrateur (PROTÉGÉE)
#[post("/users")]
pub async fn create_user(
    _auth_user: AuthUser,
    body: web::Json<CredentialsRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let admin = AdminService::create_admin(db.get_ref(), &body.username, &body.password).await?;
    Ok(HttpResponse::Created().json(admin))
}

pub fn auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(login)
            .service(me)
            .service(change_password)
            .service(create_user)
    );
}
