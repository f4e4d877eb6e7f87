// ============================================================================
// DTO - requêtes et réponses de l'API
// ============================================================================

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

use crate::models::license::LicenseStatus;
use crate::models::trading_configuration::{self, MtConfiguration};

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;
pub const MAX_PAGE: u64 = u32::MAX as u64;

// ----------------------------------------------------------------------------
// Pagination
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl PageParams {
    /// Page demandée, à partir de 1
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE)
    }

    pub fn page_size(&self) -> u64 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, count: u64, paging: PageParams) -> Self {
        let page_size = paging.page_size();
        Page {
            count,
            page: paging.page(),
            page_size,
            total_pages: count.div_ceil(page_size),
            results,
        }
    }
}

/// Les query strings ne passent pas par #[serde(flatten)] (nombres reçus en texte)
macro_rules! impl_paging {
    ($($query:ty),*) => {
        $(impl $query {
            pub fn paging(&self) -> PageParams {
                PageParams { page: self.page, page_size: self.page_size }
            }
        })*
    };
}

impl_paging!(ClientQuery, LicenseQuery, ConfigurationQuery);

// ----------------------------------------------------------------------------
// Champs texte : espaces retirés avant validation
// ----------------------------------------------------------------------------

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_string())
}

/// Une valeur vide ou blanche devient None
fn trimmed_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

// ----------------------------------------------------------------------------
// Clients
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct ClientRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 50))]
    pub first_name: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 50))]
    pub last_name: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 100))]
    pub country: String,
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(max = 20))]
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientQuery {
    pub search: Option<String>,
    pub country: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ClientResponse {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub country: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_count: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ----------------------------------------------------------------------------
// Licences
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLicenseRequest {
    pub client_id: i32,
    pub trading_configuration_id: Option<i32>,
    #[validate(range(min = 0, max = 2))]
    pub account_trade_mode: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

/// Champs modifiables par un admin (PUT et PATCH)
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateLicenseRequest {
    pub client_id: Option<i32>,
    pub trading_configuration_id: Option<i32>,
    #[validate(range(min = 0, max = 2))]
    pub account_trade_mode: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LicenseQuery {
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub account_trade_mode: Option<i32>,
    pub broker_server: Option<String>,
    pub client_id: Option<i32>,
    pub trading_configuration_id: Option<i32>,
    pub expires_after: Option<DateTime<Utc>>,
    pub expires_before: Option<DateTime<Utc>>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

/// Vue courte pour les listes (pas de hash exposé)
#[derive(Debug, Serialize)]
pub struct LicenseSummary {
    pub id: i32,
    pub license_key: String,
    pub client_name: String,
    pub configuration_name: Option<String>,
    pub account_trade_mode: i32,
    pub account_trade_mode_display: &'static str,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub status: LicenseStatus,
    pub usage_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ConfigurationRef {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub account_hash: String,
    pub timestamp: DateTime<Utc>,
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct LicenseDetail {
    pub id: i32,
    pub license_key: String,
    pub client: ClientResponse,
    pub trading_configuration: Option<ConfigurationRef>,
    pub system_hash: Option<String>,
    pub account_hash: Option<String>,
    pub broker_server: Option<String>,
    pub account_trade_mode: i32,
    pub account_trade_mode_display: &'static str,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub status: LicenseStatus,
    pub is_expired: bool,
    pub is_valid: bool,
    pub is_account_bound: bool,
    pub has_login_info: bool,
    pub account_hash_changes_count: usize,
    pub account_hash_history: Vec<HistoryEntry>,
    pub first_used_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub usage_count: i32,
    pub daily_usage_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CleanupParams {
    pub days: Option<i64>,
    pub dry_run: Option<bool>,
}

// ----------------------------------------------------------------------------
// Configurations
// ----------------------------------------------------------------------------

/// Création (name obligatoire, le reste prend les valeurs par défaut) et mise à jour partielle
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ConfigurationRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,

    #[validate(length(min = 1, max = 20))]
    pub allowed_symbol: Option<String>,
    pub strict_symbol_check: Option<bool>,

    #[validate(custom(function = "validate_session_time"))]
    pub session_start: Option<String>,
    #[validate(custom(function = "validate_session_time"))]
    pub session_end: Option<String>,

    #[validate(range(min = -5.0, max = 5.0))]
    pub fib_primary_buy_tp: Option<f64>,
    #[validate(range(min = -5.0, max = 5.0))]
    pub fib_primary_buy_entry: Option<f64>,
    #[validate(range(min = -5.0, max = 5.0))]
    pub fib_session_high: Option<f64>,
    #[validate(range(min = -5.0, max = 5.0))]
    pub fib_primary_buy_sl: Option<f64>,
    #[validate(range(min = -5.0, max = 5.0))]
    pub fib_primary_sell_sl: Option<f64>,
    #[validate(range(min = -5.0, max = 5.0))]
    pub fib_hedge_buy_entry: Option<f64>,
    #[validate(range(min = -5.0, max = 5.0))]
    pub fib_hedge_sell_entry: Option<f64>,
    #[validate(range(min = -5.0, max = 5.0))]
    pub fib_hedge_buy_sl: Option<f64>,
    #[validate(range(min = -5.0, max = 5.0))]
    pub fib_hedge_sell_sl: Option<f64>,
    #[validate(range(min = -5.0, max = 5.0))]
    pub fib_session_low: Option<f64>,
    #[validate(range(min = -5.0, max = 5.0))]
    pub fib_primary_sell_entry: Option<f64>,
    #[validate(range(min = -5.0, max = 5.0))]
    pub fib_primary_sell_tp: Option<f64>,
    #[validate(range(min = -5.0, max = 5.0))]
    pub fib_hedge_buy_tp: Option<f64>,
    #[validate(range(min = -5.0, max = 5.0))]
    pub fib_hedge_sell_tp: Option<f64>,

    #[validate(range(min = 1, max = 1440))]
    pub primary_pending_timeout: Option<i32>,
    #[validate(range(min = 1, max = 1440))]
    pub primary_position_timeout: Option<i32>,
    #[validate(range(min = 1, max = 1440))]
    pub hedging_pending_timeout: Option<i32>,
    #[validate(range(min = 1, max = 1440))]
    pub hedging_position_timeout: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfigurationQuery {
    pub license_id: Option<i32>,
    pub is_active: Option<bool>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ConfigurationResponse {
    #[serde(flatten)]
    pub configuration: trading_configuration::Model,
    pub license_count: u64,
}

/// Format HH:MM (00:00 à 23:59)
pub fn validate_session_time(value: &str) -> Result<(), ValidationError> {
    if value.len() == 5 && NaiveTime::parse_from_str(value, "%H:%M").is_ok() {
        Ok(())
    } else {
        let mut error = ValidationError::new("session_time");
        error.message = Some("Expected HH:MM (e.g. 08:45)".into());
        Err(error)
    }
}

// ----------------------------------------------------------------------------
// Validation robot
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct BotValidationRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 64))]
    pub license_key: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 128))]
    pub system_hash: String,
    #[validate(range(min = 0, max = 2))]
    pub account_trade_mode: i32,
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(max = 100))]
    pub broker_server: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(max = 128))]
    pub account_hash: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BotValidationResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<MtConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_trade_mode: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_time_use: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_login_changed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_count: Option<i32>,
}

impl BotValidationResponse {
    pub fn rejected(message: String) -> Self {
        BotValidationResponse {
            success: false,
            message,
            configuration: None,
            expires_at: None,
            account_trade_mode: None,
            first_time_use: None,
            account_login_changed: None,
            usage_count: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_bounds() {
        let params = PageParams { page: Some(0), page_size: Some(500) };
        assert_eq!(params.page(), 1);
        assert_eq!(params.page_size(), MAX_PAGE_SIZE);

        let params = PageParams { page: Some(u64::MAX), page_size: Some(100) };
        assert_eq!(params.page(), MAX_PAGE);
        assert!(params.page().checked_mul(params.page_size()).is_some());

        let params = PageParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.page_size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_page_total_pages() {
        let paging = PageParams { page: Some(2), page_size: Some(20) };
        let page = Page::new(vec![1, 2, 3], 41, paging);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 2);

        let empty: Page<i32> = Page::new(vec![], 0, PageParams::default());
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_session_time_format() {
        assert!(validate_session_time("08:45").is_ok());
        assert!(validate_session_time("23:59").is_ok());
        assert!(validate_session_time("24:00").is_err());
        assert!(validate_session_time("8:45").is_err());
        assert!(validate_session_time("08h45").is_err());
    }

    #[test]
    fn test_configuration_request_ranges() {
        let request = ConfigurationRequest {
            fib_primary_buy_tp: Some(5.5),
            primary_pending_timeout: Some(0),
            ..Default::default()
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("fib_primary_buy_tp"));
        assert!(fields.contains_key("primary_pending_timeout"));
    }

    #[test]
    fn test_bot_request_rejects_unknown_trade_mode() {
        let request: BotValidationRequest = serde_json::from_value(serde_json::json!({
            "license_key": "abc",
            "system_hash": "sys",
            "account_trade_mode": 5,
            "timestamp": "2025-06-20T10:30:00Z"
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_bot_request_trims_identifiers() {
        let request: BotValidationRequest = serde_json::from_value(serde_json::json!({
            "license_key": " abc ",
            "system_hash": "sys-1 ",
            "account_trade_mode": 0,
            "broker_server": "   ",
            "timestamp": "2025-06-20T10:30:00Z",
            "account_hash": " login-1"
        }))
        .unwrap();
        assert_eq!(request.license_key, "abc");
        assert_eq!(request.system_hash, "sys-1");
        assert_eq!(request.broker_server, None);
        assert_eq!(request.account_hash.as_deref(), Some("login-1"));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_bot_request_rejects_blank_system_hash() {
        let request: BotValidationRequest = serde_json::from_value(serde_json::json!({
            "license_key": "   ",
            "system_hash": "   ",
            "account_trade_mode": 0,
            "timestamp": "2025-06-20T10:30:00Z"
        }))
        .unwrap();
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("system_hash"));
        assert!(fields.contains_key("license_key"));
    }

    #[test]
    fn test_client_request_trims_before_validation() {
        let request: ClientRequest = serde_json::from_value(serde_json::json!({
            "first_name": "   ",
            "last_name": " Dupont ",
            "country": "France",
            "email": "  ",
            "phone": null
        }))
        .unwrap();
        assert_eq!(request.last_name, "Dupont");
        assert_eq!(request.email, None);
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("first_name"));
        assert!(!fields.contains_key("last_name"));
        assert!(!fields.contains_key("email"));

        let request: ClientRequest = serde_json::from_value(serde_json::json!({
            "first_name": "Jean",
            "last_name": "Dupont",
            "country": "France"
        }))
        .unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.phone, None);
    }
}
