pub mod auth;
pub mod clients;
pub mod configurations;
pub mod dashboard;
pub mod health;
pub mod licenses;
pub mod validation;

use actix_web::{error::InternalError, web, HttpResponse};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(health::health_check)
            .service(health::api_info)
            .service(validation::validate_license)
            .configure(auth::auth_routes)
            .configure(clients::clients_routes)
            .configure(licenses::licenses_routes)
            .configure(configurations::configurations_routes)
            .service(dashboard::dashboard)
            .service(dashboard::usage_report)
    );
}

/// Corps JSON illisible => 400 {"error": ...}
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("Invalid JSON body: {}", err)
        }));
        InternalError::from_response(err, response).into()
    })
}

/// Query string illisible => 400 {"error": ...}
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("Invalid query string: {}", err)
        }));
        InternalError::from_response(err, response).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::test_connection;
    use crate::services::admin_service::AdminService;
    use actix_web::{http::StatusCode, test, App};
    use sea_orm::DatabaseConnection;
    use serde_json::{json, Value};

    fn test_config() -> AppConfig {
        AppConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some("sqlite::memory:".to_string()),
            "JWT_SECRET" => Some("route-test-secret".to_string()),
            _ => None,
        })
        .unwrap()
    }

    async fn setup() -> (DatabaseConnection, AppConfig) {
        let db = test_connection().await;
        AdminService::create_admin(&db, "admin", "admin123").await.unwrap();
        (db, test_config())
    }

    macro_rules! app {
        ($db:expr, $config:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($db.clone()))
                    .app_data(web::Data::new($config.clone()))
                    .app_data(json_config())
                    .app_data(query_config())
                    .configure(configure_routes),
            )
            .await
        };
    }

    macro_rules! login {
        ($app:expr) => {{
            let req = test::TestRequest::post()
                .uri("/api/auth/login")
                .set_json(json!({"username": "admin", "password": "admin123"}))
                .to_request();
            let body: Value = test::call_and_read_body_json(&$app, req).await;
            body["token"].as_str().unwrap().to_string()
        }};
    }

    fn bearer(token: &str) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", token))
    }

    #[actix_web::test]
    async fn test_health_and_info_are_public() {
        let (db, config) = setup().await;
        let app = app!(db, config);

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["total_licenses"], 0);

        let req = test::TestRequest::get().uri("/api/info").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["endpoints"]["validate"], "POST /api/validate");
    }

    #[actix_web::test]
    async fn test_admin_routes_require_token() {
        let (db, config) = setup().await;
        let app = app!(db, config);

        let req = test::TestRequest::get().uri("/api/licenses").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/dashboard")
            .insert_header(bearer("not-a-token"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_wrong_password_is_rejected() {
        let (db, config) = setup().await;
        let app = app!(db, config);

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({"username": "admin", "password": "wrong"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_license_lifecycle_through_api() {
        let (db, config) = setup().await;
        let app = app!(db, config);
        let token = login!(app);

        // Client
        let req = test::TestRequest::post()
            .uri("/api/clients")
            .insert_header(bearer(&token))
            .set_json(json!({
                "first_name": "Maria",
                "last_name": "Garcia",
                "country": "Spain",
                "email": "maria@example.com"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let client: Value = test::read_body_json(resp).await;

        // Licence avec configuration par défaut
        let req = test::TestRequest::post()
            .uri("/api/licenses")
            .insert_header(bearer(&token))
            .set_json(json!({"client_id": client["id"], "account_trade_mode": 0}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let license: Value = test::read_body_json(resp).await;
        assert_eq!(license["status"], "Not Bound");
        assert_eq!(license["trading_configuration"]["name"], "Default Configuration");
        let key = license["license_key"].as_str().unwrap().to_string();

        // Premier appel du robot
        let req = test::TestRequest::post()
            .uri("/api/validate")
            .set_json(json!({
                "license_key": key,
                "system_hash": "sys-abc",
                "account_trade_mode": 0,
                "broker_server": "demo.broker.com",
                "timestamp": "2025-06-20T10:30:00Z",
                "account_hash": "login-abc"
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "License validated successfully");
        assert_eq!(body["first_time_use"], true);
        assert_eq!(body["usage_count"], 1);
        assert_eq!(body["configuration"]["inp_AllowedSymbol"], "US30");

        // Autre compte sur la même licence
        let req = test::TestRequest::post()
            .uri("/api/validate")
            .set_json(json!({
                "license_key": key,
                "system_hash": "sys-other",
                "account_trade_mode": 0,
                "timestamp": "2025-06-20T10:31:00Z"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(
            body["message"],
            "Account not authorized - license bound to different trading account"
        );
        assert!(body.get("configuration").is_none());

        // Historique et détail
        let uri = format!("/api/licenses/{}/history", license["id"]);
        let req = test::TestRequest::get().uri(&uri).insert_header(bearer(&token)).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["account_hash_changes_count"], 1);
        assert_eq!(body["history"][0]["account_hash"], "login-ab...");

        let uri = format!("/api/licenses/{}", license["id"]);
        let req = test::TestRequest::get().uri(&uri).insert_header(bearer(&token)).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "Active");
        assert_eq!(body["is_account_bound"], true);

        // Configuration au format du robot
        let uri = format!("/api/licenses/{}/configuration", license["id"]);
        let req = test::TestRequest::get().uri(&uri).insert_header(bearer(&token)).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["inp_SessionStart"], "08:45");
    }

    #[actix_web::test]
    async fn test_malformed_validation_request() {
        let (db, config) = setup().await;
        let app = app!(db, config);

        let req = test::TestRequest::post()
            .uri("/api/validate")
            .set_json(json!({"license_key": "abc"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Invalid request data");

        let req = test::TestRequest::post()
            .uri("/api/validate")
            .set_json(json!({
                "license_key": "missing",
                "system_hash": "sys",
                "account_trade_mode": 1,
                "timestamp": "2025-06-20T10:30:00Z"
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Invalid license key");
    }

    #[actix_web::test]
    async fn test_validation_identifiers_are_trimmed() {
        let (db, config) = setup().await;
        let app = app!(db, config);
        let token = login!(app);

        let req = test::TestRequest::post()
            .uri("/api/clients")
            .insert_header(bearer(&token))
            .set_json(json!({"first_name": "Jean", "last_name": "Dupont", "country": "France"}))
            .to_request();
        let client: Value = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::post()
            .uri("/api/licenses")
            .insert_header(bearer(&token))
            .set_json(json!({"client_id": client["id"], "account_trade_mode": 0}))
            .to_request();
        let license: Value = test::call_and_read_body_json(&app, req).await;
        let key = license["license_key"].as_str().unwrap().to_string();

        // Hash blanc : requête invalide, rien n'est lié
        let req = test::TestRequest::post()
            .uri("/api/validate")
            .set_json(json!({
                "license_key": key,
                "system_hash": "   ",
                "account_trade_mode": 0,
                "timestamp": "2025-06-20T10:30:00Z"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Invalid request data");
        assert!(body["errors"].to_string().contains("system_hash"));

        // Espaces autour de la clé et du hash
        let req = test::TestRequest::post()
            .uri("/api/validate")
            .set_json(json!({
                "license_key": format!(" {} ", key),
                "system_hash": "sys-1 ",
                "account_trade_mode": 0,
                "broker_server": "  ",
                "timestamp": "2025-06-20T10:30:00Z"
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["first_time_use"], true);

        let req = test::TestRequest::post()
            .uri("/api/validate")
            .set_json(json!({
                "license_key": key,
                "system_hash": "sys-1",
                "account_trade_mode": 0,
                "timestamp": "2025-06-20T10:31:00Z"
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["first_time_use"], false);

        let uri = format!("/api/licenses/{}", license["id"]);
        let req = test::TestRequest::get().uri(&uri).insert_header(bearer(&token)).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["system_hash"], "sys-1");
        assert!(body["broker_server"].is_null());
    }

    #[actix_web::test]
    async fn test_out_of_range_parameters() {
        let (db, config) = setup().await;
        let app = app!(db, config);
        let token = login!(app);

        let req = test::TestRequest::post()
            .uri("/api/licenses/cleanup-expired?days=9223372036854775807&dry_run=true")
            .insert_header(bearer(&token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get()
            .uri("/api/clients?page=18446744073709551615&page_size=100")
            .insert_header(bearer(&token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["page"], u32::MAX as u64);
        assert_eq!(body["results"].as_array().unwrap().len(), 0);

        let req = test::TestRequest::post()
            .uri("/api/clients")
            .insert_header(bearer(&token))
            .set_json(json!({"first_name": "   ", "last_name": "Dupont", "country": "France"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_configuration_crud_and_validation() {
        let (db, config) = setup().await;
        let app = app!(db, config);
        let token = login!(app);

        let req = test::TestRequest::post()
            .uri("/api/configurations")
            .insert_header(bearer(&token))
            .set_json(json!({"name": "Night", "session_start": "25:00"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["details"]["session_start"].is_array());

        let req = test::TestRequest::post()
            .uri("/api/configurations")
            .insert_header(bearer(&token))
            .set_json(json!({"name": "Night", "allowed_symbol": "NAS100"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["license_count"], 0);

        let uri = format!("/api/configurations/{}", created["id"]);
        let req = test::TestRequest::patch()
            .uri(&uri)
            .insert_header(bearer(&token))
            .set_json(json!({"primary_pending_timeout": 45}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["primary_pending_timeout"], 45);
        assert_eq!(body["allowed_symbol"], "NAS100");

        let req = test::TestRequest::delete().uri(&uri).insert_header(bearer(&token)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[actix_web::test]
    async fn test_dashboard_and_csv_report() {
        let (db, config) = setup().await;
        crate::services::sample_data::create_sample_data(&db, chrono::Utc::now(), 365)
            .await
            .unwrap();
        let app = app!(db, config);
        let token = login!(app);

        let req = test::TestRequest::get().uri("/api/dashboard").insert_header(bearer(&token)).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total_licenses"], 5);
        assert_eq!(body["recent_licenses"].as_array().unwrap().len(), 5);

        let req = test::TestRequest::get()
            .uri("/api/reports/usage?format=csv")
            .insert_header(bearer(&token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert!(std::str::from_utf8(&body).unwrap().starts_with("Metric,Value\nTotal Licenses,5\n"));

        let req = test::TestRequest::get()
            .uri("/api/licenses/active?page_size=2")
            .insert_header(bearer(&token))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 5);
        assert_eq!(body["total_pages"], 3);
        assert_eq!(body["results"].as_array().unwrap().len(), 2);
    }

    #[actix_web::test]
    async fn test_client_licenses_and_delete() {
        let (db, config) = setup().await;
        crate::services::sample_data::create_sample_data(&db, chrono::Utc::now(), 365)
            .await
            .unwrap();
        let app = app!(db, config);
        let token = login!(app);

        let req = test::TestRequest::get()
            .uri("/api/clients?search=Hassan")
            .insert_header(bearer(&token))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 1);
        let id = body["results"][0]["id"].clone();
        assert_eq!(body["results"][0]["license_count"], 1);

        let uri = format!("/api/clients/{}/licenses", id);
        let req = test::TestRequest::get().uri(&uri).insert_header(bearer(&token)).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["results"][0]["client_name"], "Ahmed Hassan");

        let uri = format!("/api/clients/{}", id);
        let req = test::TestRequest::delete().uri(&uri).insert_header(bearer(&token)).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["deleted_licenses"], 1);

        let req = test::TestRequest::get().uri(&uri).insert_header(bearer(&token)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
