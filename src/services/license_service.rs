use chrono::{DateTime, Duration, Utc};
use sea_orm::*;
use sea_orm::sea_query::Expr;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::account_hash_event::{self, ACTION_INITIAL_SET, ACTION_REPLACED, ACTION_UPDATED};
use crate::models::dto::{
    BotValidationRequest, ConfigurationRef, CreateLicenseRequest, HistoryEntry, LicenseDetail,
    LicenseQuery, LicenseSummary, Page, UpdateLicenseRequest,
};
use crate::models::license::{mask_hash, SystemHashCheck};
use crate::models::trading_configuration::MtConfiguration;
use crate::models::{client, license, trading_configuration};
use crate::services::client_service::{self, ClientService};
use crate::services::configuration_service::ConfigurationService;
use crate::services::fetch_page;
use crate::utils::license_key::generate_license_key;

pub struct LicenseService;

/// Fenêtre maximale du nettoyage (100 ans)
pub const MAX_CLEANUP_DAYS: i64 = 36_500;

/// Sous-ensembles prédéfinis de la liste des licences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseScope {
    All,
    Active,
    Expired,
    ExpiringSoon,
}

/// Raison d'un refus de validation, renvoyée au robot avec success=false
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    UnknownKey,
    Expired,
    Inactive,
    Unconfigured,
    SystemHashMismatch,
    SystemHashTaken,
    TradeModeMismatch { expected: i32, got: i32 },
}

impl Rejection {
    pub fn message(&self) -> String {
        match self {
            Rejection::UnknownKey => "Invalid license key".to_string(),
            Rejection::Expired => "License is expired".to_string(),
            Rejection::Inactive => "License is inactive".to_string(),
            Rejection::Unconfigured => "License has no trading configuration".to_string(),
            Rejection::SystemHashMismatch => {
                "Account not authorized - license bound to different trading account".to_string()
            }
            Rejection::SystemHashTaken => {
                "Account not authorized - trading account already bound to another license".to_string()
            }
            Rejection::TradeModeMismatch { expected, got } => format!(
                "Account trade mode mismatch. Expected {}, got {}",
                expected, got
            ),
        }
    }
}

#[derive(Debug)]
pub struct Accepted {
    pub license: license::Model,
    pub configuration: MtConfiguration,
    pub first_time_use: bool,
    pub account_login_changed: bool,
}

#[derive(Debug)]
pub enum ValidationOutcome {
    Accepted(Accepted),
    Rejected(Rejection),
}

#[derive(Debug, Serialize)]
pub struct CleanupEntry {
    pub license_key: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CleanupReport {
    pub dry_run: bool,
    pub matched: u64,
    pub deactivated: u64,
    pub sample: Vec<CleanupEntry>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

async fn record_event<C: ConnectionTrait>(
    db: &C,
    license_id: i32,
    account_hash: &str,
    action: &str,
    now: DateTime<Utc>,
) -> Result<(), DbErr> {
    account_hash_event::ActiveModel {
        license_id: Set(license_id),
        account_hash: Set(account_hash.to_string()),
        action: Set(action.to_string()),
        recorded_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(())
}

impl LicenseService {
    pub async fn find(db: &DatabaseConnection, id: i32) -> Result<license::Model, AppError> {
        license::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("License", id))
    }

    // ------------------------------------------------------------------------
    // Lecture
    // ------------------------------------------------------------------------

    pub async fn list(
        db: &DatabaseConnection,
        query: &LicenseQuery,
        scope: LicenseScope,
        now: DateTime<Utc>,
        window_days: i64,
    ) -> Result<Page<LicenseSummary>, AppError> {
        let mut select = license::Entity::find()
            .order_by_desc(license::Column::CreatedAt)
            .order_by_desc(license::Column::Id);

        select = match scope {
            LicenseScope::All => select,
            LicenseScope::Active => select
                .filter(license::Column::IsActive.eq(true))
                .filter(license::Column::ExpiresAt.gt(now)),
            LicenseScope::Expired => select.filter(license::Column::ExpiresAt.lt(now)),
            LicenseScope::ExpiringSoon => select
                .filter(license::Column::IsActive.eq(true))
                .filter(license::Column::ExpiresAt.gt(now))
                .filter(license::Column::ExpiresAt.lt(now + Duration::days(window_days))),
        };

        if let Some(search) = non_empty(&query.search) {
            let client_ids: Vec<i32> = client::Entity::find()
                .filter(
                    Condition::any()
                        .add(client::Column::FirstName.contains(search))
                        .add(client::Column::LastName.contains(search)),
                )
                .all(db)
                .await?
                .into_iter()
                .map(|c| c.id)
                .collect();

            let mut condition = Condition::any()
                .add(license::Column::LicenseKey.contains(search))
                .add(license::Column::SystemHash.contains(search))
                .add(license::Column::AccountHash.contains(search));
            if !client_ids.is_empty() {
                condition = condition.add(license::Column::ClientId.is_in(client_ids));
            }
            select = select.filter(condition);
        }

        if let Some(is_active) = query.is_active {
            select = select.filter(license::Column::IsActive.eq(is_active));
        }
        if let Some(mode) = query.account_trade_mode {
            select = select.filter(license::Column::AccountTradeMode.eq(mode));
        }
        if let Some(server) = non_empty(&query.broker_server) {
            select = select.filter(license::Column::BrokerServer.contains(server));
        }
        if let Some(client_id) = query.client_id {
            select = select.filter(license::Column::ClientId.eq(client_id));
        }
        if let Some(config_id) = query.trading_configuration_id {
            select = select.filter(license::Column::TradingConfigurationId.eq(config_id));
        }
        if let Some(after) = query.expires_after {
            select = select.filter(license::Column::ExpiresAt.gte(after));
        }
        if let Some(before) = query.expires_before {
            select = select.filter(license::Column::ExpiresAt.lte(before));
        }

        let (licenses, count) = fetch_page(db, select, query.paging()).await?;
        let results = Self::summarize(db, licenses, now, window_days).await?;
        Ok(Page::new(results, count, query.paging()))
    }

    /// Vue courte : noms du client et de la configuration chargés en deux requêtes
    pub async fn summarize(
        db: &DatabaseConnection,
        licenses: Vec<license::Model>,
        now: DateTime<Utc>,
        window_days: i64,
    ) -> Result<Vec<LicenseSummary>, AppError> {
        let client_ids: Vec<i32> = licenses.iter().map(|l| l.client_id).collect();
        let config_ids: Vec<i32> = licenses.iter().filter_map(|l| l.trading_configuration_id).collect();

        let clients: HashMap<i32, String> = client::Entity::find()
            .filter(client::Column::Id.is_in(client_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c.full_name()))
            .collect();

        let configurations: HashMap<i32, String> = trading_configuration::Entity::find()
            .filter(trading_configuration::Column::Id.is_in(config_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        Ok(licenses
            .into_iter()
            .map(|l| LicenseSummary {
                id: l.id,
                client_name: clients.get(&l.client_id).cloned().unwrap_or_default(),
                configuration_name: l
                    .trading_configuration_id
                    .and_then(|id| configurations.get(&id).cloned()),
                account_trade_mode: l.account_trade_mode,
                account_trade_mode_display: l.trade_mode_label(),
                expires_at: l.expires_at,
                is_active: l.is_active,
                status: l.status(now, window_days),
                usage_count: l.usage_count,
                created_at: l.created_at,
                license_key: l.license_key,
            })
            .collect())
    }

    pub async fn history(db: &DatabaseConnection, license_id: i32) -> Result<Vec<HistoryEntry>, AppError> {
        let events = account_hash_event::Entity::find()
            .filter(account_hash_event::Column::LicenseId.eq(license_id))
            .order_by_asc(account_hash_event::Column::Id)
            .all(db)
            .await?;

        Ok(events
            .into_iter()
            .map(|e| HistoryEntry {
                account_hash: mask_hash(&e.account_hash),
                timestamp: e.recorded_at,
                action: e.action,
            })
            .collect())
    }

    pub async fn detail(
        db: &DatabaseConnection,
        license: license::Model,
        now: DateTime<Utc>,
        window_days: i64,
    ) -> Result<LicenseDetail, AppError> {
        let client = ClientService::find(db, license.client_id).await?;

        let configuration = match license.trading_configuration_id {
            Some(id) => trading_configuration::Entity::find_by_id(id)
                .one(db)
                .await?
                .map(|c| ConfigurationRef { id: c.id, name: c.name }),
            None => None,
        };

        let history = Self::history(db, license.id).await?;

        Ok(LicenseDetail {
            id: license.id,
            client: client_service::to_response(client, None),
            trading_configuration: configuration,
            account_trade_mode_display: license.trade_mode_label(),
            status: license.status(now, window_days),
            is_expired: license.is_expired(now),
            is_valid: license.is_valid(now),
            is_account_bound: license.is_account_bound(),
            has_login_info: license.has_login_info(),
            account_hash_changes_count: history.len(),
            account_hash_history: history,
            license_key: license.license_key,
            system_hash: license.system_hash,
            account_hash: license.account_hash,
            broker_server: license.broker_server,
            account_trade_mode: license.account_trade_mode,
            expires_at: license.expires_at,
            is_active: license.is_active,
            first_used_at: license.first_used_at,
            last_used_at: license.last_used_at,
            usage_count: license.usage_count,
            daily_usage_count: license.daily_usage_count,
            created_at: license.created_at,
            updated_at: license.updated_at,
        })
    }

    /// Configuration assignée, au format du robot
    pub async fn configuration_for(db: &DatabaseConnection, id: i32) -> Result<MtConfiguration, AppError> {
        let license = Self::find(db, id).await?;
        let config_id = license
            .trading_configuration_id
            .ok_or_else(|| AppError::NotFound(format!("License {} has no trading configuration", id)))?;
        let configuration = ConfigurationService::find(db, config_id).await?;
        Ok(MtConfiguration::from(&configuration))
    }

    // ------------------------------------------------------------------------
    // Écriture (admin)
    // ------------------------------------------------------------------------

    async fn unused_key(db: &DatabaseConnection) -> Result<String, AppError> {
        for _ in 0..3 {
            let key = generate_license_key();
            let taken = license::Entity::find()
                .filter(license::Column::LicenseKey.eq(key.as_str()))
                .one(db)
                .await?
                .is_some();
            if !taken {
                return Ok(key);
            }
        }
        Err(AppError::Internal("Could not generate a unique license key".to_string()))
    }

    async fn ensure_client(db: &DatabaseConnection, client_id: i32) -> Result<(), AppError> {
        match client::Entity::find_by_id(client_id).one(db).await? {
            Some(_) => Ok(()),
            None => Err(AppError::BadRequest(format!("Client {} does not exist", client_id))),
        }
    }

    async fn ensure_configuration(db: &DatabaseConnection, config_id: i32) -> Result<(), AppError> {
        match trading_configuration::Entity::find_by_id(config_id).one(db).await? {
            Some(_) => Ok(()),
            None => Err(AppError::BadRequest(format!(
                "Trading configuration {} does not exist",
                config_id
            ))),
        }
    }

    pub async fn create(
        db: &DatabaseConnection,
        request: &CreateLicenseRequest,
        created_by: Option<i32>,
        now: DateTime<Utc>,
        default_days: i64,
    ) -> Result<license::Model, AppError> {
        Self::ensure_client(db, request.client_id).await?;

        // Sans configuration explicite : configuration partagée par défaut
        let config_id = match request.trading_configuration_id {
            Some(id) => {
                Self::ensure_configuration(db, id).await?;
                id
            }
            None => ConfigurationService::get_or_create_default(db).await?.id,
        };

        let license = license::ActiveModel {
            license_key: Set(Self::unused_key(db).await?),
            client_id: Set(request.client_id),
            trading_configuration_id: Set(Some(config_id)),
            system_hash: Set(None),
            account_hash: Set(None),
            broker_server: Set(None),
            account_trade_mode: Set(request.account_trade_mode.unwrap_or(0)),
            expires_at: Set(request.expires_at.unwrap_or(now + Duration::days(default_days))),
            is_active: Set(request.is_active.unwrap_or(true)),
            first_used_at: Set(None),
            last_used_at: Set(None),
            usage_count: Set(0),
            daily_usage_count: Set(0),
            last_reset_date: Set(now.date_naive()),
            created_by: Set(created_by),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!("🔑 Created license {}... for client {}", &license.license_key[..8], license.client_id);
        Ok(license)
    }

    pub async fn update(
        db: &DatabaseConnection,
        id: i32,
        request: &UpdateLicenseRequest,
    ) -> Result<license::Model, AppError> {
        let existing = Self::find(db, id).await?;
        let mut active: license::ActiveModel = existing.into();

        if let Some(client_id) = request.client_id {
            Self::ensure_client(db, client_id).await?;
            active.client_id = Set(client_id);
        }
        if let Some(config_id) = request.trading_configuration_id {
            Self::ensure_configuration(db, config_id).await?;
            active.trading_configuration_id = Set(Some(config_id));
        }
        if let Some(mode) = request.account_trade_mode {
            active.account_trade_mode = Set(mode);
        }
        if let Some(expires_at) = request.expires_at {
            active.expires_at = Set(expires_at);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }

        Ok(active.update(db).await?)
    }

    pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<(), AppError> {
        let license = Self::find(db, id).await?;

        let txn = db.begin().await?;
        account_hash_event::Entity::delete_many()
            .filter(account_hash_event::Column::LicenseId.eq(id))
            .exec(&txn)
            .await?;
        license::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        info!("🗑️  Deleted license {}...", &license.license_key[..8]);
        Ok(())
    }

    /// Délie le compte de trading : la prochaine validation liera un nouveau compte.
    /// Compteurs et historique sont conservés.
    pub async fn reset_binding(db: &DatabaseConnection, id: i32) -> Result<license::Model, AppError> {
        let existing = Self::find(db, id).await?;
        let key_prefix = existing.license_key[..8].to_string();

        let mut active: license::ActiveModel = existing.into();
        active.system_hash = Set(None);
        active.account_hash = Set(None);
        active.broker_server = Set(None);
        active.first_used_at = Set(None);
        let updated = active.update(db).await?;

        warn!("🔓 Account binding reset for license {}...", key_prefix);
        Ok(updated)
    }

    /// Désactive les licences expirées depuis plus de `days` jours
    pub async fn deactivate_expired(
        db: &DatabaseConnection,
        days: i64,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> Result<CleanupReport, AppError> {
        if !(0..=MAX_CLEANUP_DAYS).contains(&days) {
            return Err(AppError::BadRequest(format!(
                "days must be between 0 and {}",
                MAX_CLEANUP_DAYS
            )));
        }
        let cutoff = now - Duration::days(days);
        let condition = Condition::all()
            .add(license::Column::ExpiresAt.lt(cutoff))
            .add(license::Column::IsActive.eq(true));

        let matched = license::Entity::find()
            .filter(condition.clone())
            .count(db)
            .await?;

        if dry_run {
            let sample = license::Entity::find()
                .filter(condition)
                .order_by_asc(license::Column::ExpiresAt)
                .limit(10)
                .all(db)
                .await?
                .into_iter()
                .map(|l| CleanupEntry { license_key: l.license_key, expires_at: l.expires_at })
                .collect();

            return Ok(CleanupReport { dry_run, matched, deactivated: 0, sample });
        }

        let result = license::Entity::update_many()
            .col_expr(license::Column::IsActive, Expr::value(false))
            .col_expr(license::Column::UpdatedAt, Expr::value(now))
            .filter(condition)
            .exec(db)
            .await?;

        info!("🧹 Deactivated {} expired license(s)", result.rows_affected);
        Ok(CleanupReport {
            dry_run,
            matched,
            deactivated: result.rows_affected,
            sample: Vec::new(),
        })
    }

    // ------------------------------------------------------------------------
    // Validation robot
    // ------------------------------------------------------------------------

    /// Valide la licence d'un robot et enregistre l'utilisation (liaison au premier appel).
    /// Tout se fait dans une transaction, ligne verrouillée sur PostgreSQL.
    pub async fn validate(
        db: &DatabaseConnection,
        request: &BotValidationRequest,
        now: DateTime<Utc>,
    ) -> Result<ValidationOutcome, AppError> {
        let txn = db.begin().await?;
        let outcome = Self::check_and_bind(&txn, request, now).await?;
        txn.commit().await?;

        match &outcome {
            ValidationOutcome::Accepted(accepted) => info!(
                "✅ License validation successful for {}... (first use: {}, usage: {})",
                &accepted.license.license_key[..8],
                accepted.first_time_use,
                accepted.license.usage_count
            ),
            ValidationOutcome::Rejected(rejection) => warn!(
                "⚠️  License validation failed for {}: {}",
                request.license_key,
                rejection.message()
            ),
        }

        Ok(outcome)
    }

    async fn check_and_bind(
        txn: &DatabaseTransaction,
        request: &BotValidationRequest,
        now: DateTime<Utc>,
    ) -> Result<ValidationOutcome, DbErr> {
        let mut select = license::Entity::find()
            .filter(license::Column::LicenseKey.eq(request.license_key.as_str()));
        if txn.get_database_backend() == DbBackend::Postgres {
            select = select.lock_exclusive();
        }

        let Some(found) = select.one(txn).await? else {
            return Ok(ValidationOutcome::Rejected(Rejection::UnknownKey));
        };

        if !found.is_valid(now) {
            let rejection = if found.is_expired(now) {
                Rejection::Expired
            } else if !found.is_active {
                Rejection::Inactive
            } else {
                Rejection::Unconfigured
            };
            return Ok(ValidationOutcome::Rejected(rejection));
        }

        match found.check_system_hash(&request.system_hash) {
            SystemHashCheck::Mismatch => {
                return Ok(ValidationOutcome::Rejected(Rejection::SystemHashMismatch));
            }
            SystemHashCheck::FirstUse => {
                // system_hash est UNIQUE : un compte ne peut être lié qu'à une licence
                let taken = license::Entity::find()
                    .filter(license::Column::SystemHash.eq(request.system_hash.as_str()))
                    .filter(license::Column::Id.ne(found.id))
                    .one(txn)
                    .await?
                    .is_some();
                if taken {
                    return Ok(ValidationOutcome::Rejected(Rejection::SystemHashTaken));
                }
            }
            SystemHashCheck::Authorized => {}
        }

        if found.is_account_bound() && found.account_trade_mode != request.account_trade_mode {
            return Ok(ValidationOutcome::Rejected(Rejection::TradeModeMismatch {
                expected: found.account_trade_mode,
                got: request.account_trade_mode,
            }));
        }

        let configuration = match found.trading_configuration_id {
            Some(id) => trading_configuration::Entity::find_by_id(id).one(txn).await?,
            None => None,
        };
        let Some(configuration) = configuration else {
            return Ok(ValidationOutcome::Rejected(Rejection::Unconfigured));
        };

        let (license, first_time_use, account_login_changed) =
            Self::record_usage(txn, found, request, now).await?;

        Ok(ValidationOutcome::Accepted(Accepted {
            license,
            configuration: MtConfiguration::from(&configuration),
            first_time_use,
            account_login_changed,
        }))
    }

    /// Liaison au premier usage, suivi des changements de login, compteurs d'utilisation
    async fn record_usage(
        txn: &DatabaseTransaction,
        found: license::Model,
        request: &BotValidationRequest,
        now: DateTime<Utc>,
    ) -> Result<(license::Model, bool, bool), DbErr> {
        let today = now.date_naive();
        let (daily_usage, reset_date) = if found.last_reset_date < today {
            (0, today)
        } else {
            (found.daily_usage_count, found.last_reset_date)
        };

        let first_time_use = found.first_used_at.is_none();
        let account_hash = non_empty(&request.account_hash);
        let mut account_login_changed = false;

        let mut active: license::ActiveModel = found.clone().into();

        if first_time_use {
            active.first_used_at = Set(Some(now));
            active.system_hash = Set(Some(request.system_hash.clone()));
            active.account_trade_mode = Set(request.account_trade_mode);
            if let Some(server) = non_empty(&request.broker_server) {
                active.broker_server = Set(Some(server.to_string()));
            }
            if let Some(hash) = account_hash {
                active.account_hash = Set(Some(hash.to_string()));
                record_event(txn, found.id, hash, ACTION_INITIAL_SET, now).await?;
            }
        } else if let Some(hash) = account_hash {
            if found.account_hash.as_deref() != Some(hash) {
                if let Some(previous) = non_empty(&found.account_hash) {
                    record_event(txn, found.id, previous, ACTION_REPLACED, now).await?;
                }
                active.account_hash = Set(Some(hash.to_string()));
                record_event(txn, found.id, hash, ACTION_UPDATED, now).await?;
                account_login_changed = true;
            }
        }

        active.last_used_at = Set(Some(now));
        active.usage_count = Set(found.usage_count + 1);
        active.daily_usage_count = Set(daily_usage + 1);
        active.last_reset_date = Set(reset_date);

        let updated = active.update(txn).await?;
        Ok((updated, first_time_use, account_login_changed))
    }
}
