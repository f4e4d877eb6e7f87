use chrono::Utc;
use sea_orm::*;
use tracing::info;

use crate::error::AppError;
use crate::models::users;
use crate::utils::password;

pub struct AdminService;

impl AdminService {
    /// Crée un administrateur (409 si le username existe déjà)
    pub async fn create_admin(
        db: &DatabaseConnection,
        username: &str,
        plain_password: &str,
    ) -> Result<users::Model, AppError> {
        let username = username.trim();
        if username.is_empty() || plain_password.is_empty() {
            return Err(AppError::BadRequest("Username and password are required".to_string()));
        }

        let existing = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }

        let password_hash = password::hash_password(plain_password).map_err(AppError::Internal)?;

        let admin = users::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(password_hash),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            last_login_at: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!("👤 Created admin user {}", admin.username);
        Ok(admin)
    }

    /// Crée l'admin s'il n'existe pas encore. Retourne true si un compte a été créé.
    pub async fn ensure_admin(
        db: &DatabaseConnection,
        username: &str,
        plain_password: &str,
    ) -> Result<bool, AppError> {
        match Self::create_admin(db, username, plain_password).await {
            Ok(_) => Ok(true),
            Err(AppError::Conflict(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Vérifie les identifiants et met à jour last_login_at
    pub async fn authenticate(
        db: &DatabaseConnection,
        username: &str,
        plain_password: &str,
    ) -> Result<users::Model, AppError> {
        let invalid = || AppError::Unauthorized("Invalid username or password".to_string());

        let admin = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(db)
            .await?
            .ok_or_else(invalid)?;

        if !admin.is_active {
            return Err(invalid());
        }

        let is_valid = password::verify_password(plain_password, &admin.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification error: {}", e)))?;
        if !is_valid {
            return Err(invalid());
        }

        let mut active: users::ActiveModel = admin.into();
        active.last_login_at = Set(Some(Utc::now()));
        Ok(active.update(db).await?)
    }

    pub async fn find_by_id(db: &DatabaseConnection, user_id: i32) -> Result<users::Model, AppError> {
        users::Entity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn change_password(
        db: &DatabaseConnection,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        if new_password.is_empty() {
            return Err(AppError::BadRequest("New password must not be empty".to_string()));
        }

        let admin = Self::find_by_id(db, user_id).await?;

        let is_valid = password::verify_password(current_password, &admin.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification error: {}", e)))?;
        if !is_valid {
            return Err(AppError::Unauthorized("Current password is incorrect".to_string()));
        }

        let new_hash = password::hash_password(new_password).map_err(AppError::Internal)?;
        let mut active: users::ActiveModel = admin.into();
        active.password_hash = Set(new_hash);
        active.update(db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;

    #[actix_web::test]
    async fn test_create_and_authenticate() {
        let db = test_connection().await;
        let admin = AdminService::create_admin(&db, "admin", "admin123").await.unwrap();
        assert!(admin.last_login_at.is_none());

        let logged = AdminService::authenticate(&db, "admin", "admin123").await.unwrap();
        assert_eq!(logged.id, admin.id);
        assert!(logged.last_login_at.is_some());

        let err = AdminService::authenticate(&db, "admin", "nope").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[actix_web::test]
    async fn test_duplicate_username() {
        let db = test_connection().await;
        AdminService::create_admin(&db, "admin", "a").await.unwrap();
        let err = AdminService::create_admin(&db, "admin", "b").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        assert!(!AdminService::ensure_admin(&db, "admin", "c").await.unwrap());
        assert!(AdminService::ensure_admin(&db, "ops", "c").await.unwrap());
    }

    #[actix_web::test]
    async fn test_inactive_admin_cannot_login() {
        let db = test_connection().await;
        let admin = AdminService::create_admin(&db, "old", "pw").await.unwrap();
        let mut active: users::ActiveModel = admin.into();
        active.is_active = Set(false);
        active.update(&db).await.unwrap();

        assert!(AdminService::authenticate(&db, "old", "pw").await.is_err());
    }

    #[actix_web::test]
    async fn test_change_password() {
        let db = test_connection().await;
        let admin = AdminService::create_admin(&db, "admin", "old").await.unwrap();

        let err = AdminService::change_password(&db, admin.id, "bad", "new").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        AdminService::change_password(&db, admin.id, "old", "new").await.unwrap();
        assert!(AdminService::authenticate(&db, "admin", "new").await.is_ok());
        assert!(AdminService::authenticate(&db, "admin", "old").await.is_err());
    }
}
