// ============================================================================
// MODÈLE : LICENSE
// ============================================================================
//
// Description:
//   Licence d'un robot de trading. La clé est générée à la création, le compte
//   de trading (system_hash) est lié lors de la première validation réussie.
//
// Colonnes de la table licenses:
//   - license_key (VARCHAR 64, UNIQUE) - UUID v4 sans tirets
//   - client_id (FK clients, CASCADE)
//   - trading_configuration_id (FK trading_configurations, RESTRICT, NULL)
//   - system_hash (VARCHAR 128, UNIQUE, NULL) - identifiant principal du compte
//   - account_hash (VARCHAR 128, NULL) - login haché, historique dans account_hash_events
//   - broker_server (VARCHAR 100, NULL)
//   - account_trade_mode (INTEGER) - 0 démo, 1 restreint, 2 réel
//   - expires_at, is_active
//   - first_used_at, last_used_at, usage_count, daily_usage_count, last_reset_date
//
// Points d'attention:
//   - Un system_hash lié ne change jamais silencieusement (rejet si différent)
//   - Toutes les propriétés dérivées prennent "now" en paramètre (testable)
//
// ============================================================================

use chrono::{DateTime, Duration, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "licenses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub license_key: String,
    pub client_id: i32,
    pub trading_configuration_id: Option<i32>,
    #[sea_orm(unique)]
    pub system_hash: Option<String>,
    pub account_hash: Option<String>,
    pub broker_server: Option<String>,
    pub account_trade_mode: i32,
    pub expires_at: DateTimeUtc,
    pub is_active: bool,
    pub first_used_at: Option<DateTimeUtc>,
    pub last_used_at: Option<DateTimeUtc>,
    pub usage_count: i32,
    pub daily_usage_count: i32,
    pub last_reset_date: Date,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub created_by: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::client::Entity",
        from = "Column::ClientId",
        to = "super::client::Column::Id",
        on_delete = "Cascade"
    )]
    Client,

    #[sea_orm(
        belongs_to = "super::trading_configuration::Entity",
        from = "Column::TradingConfigurationId",
        to = "super::trading_configuration::Column::Id",
        on_delete = "Restrict"
    )]
    TradingConfiguration,

    #[sea_orm(has_many = "super::account_hash_event::Entity")]
    AccountHashEvent,

    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::CreatedBy",
        to = "super::users::Column::Id",
        on_delete = "SetNull"
    )]
    CreatedBy,
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
    }
}

impl Related<super::trading_configuration::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TradingConfiguration.def()
    }
}

impl Related<super::account_hash_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccountHashEvent.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();
        if insert {
            self.created_at = Set(now);
        }
        self.updated_at = Set(now);
        Ok(self)
    }
}

/// Mode du compte MT5 (ACCOUNT_TRADE_MODE côté terminal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountTradeMode {
    Demo = 0,
    Restricted = 1,
    Live = 2,
}

impl AccountTradeMode {
    pub const ALL: [AccountTradeMode; 3] = [
        AccountTradeMode::Demo,
        AccountTradeMode::Restricted,
        AccountTradeMode::Live,
    ];

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn label(self) -> &'static str {
        match self {
            AccountTradeMode::Demo => "Demo Account",
            AccountTradeMode::Restricted => "Restricted Account",
            AccountTradeMode::Live => "Live Account",
        }
    }
}

impl TryFrom<i32> for AccountTradeMode {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AccountTradeMode::Demo),
            1 => Ok(AccountTradeMode::Restricted),
            2 => Ok(AccountTradeMode::Live),
            other => Err(format!("Invalid account trade mode: {} (expected 0, 1 or 2)", other)),
        }
    }
}

/// Statut affiché dans l'admin, le premier cas qui s'applique gagne
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LicenseStatus {
    #[serde(rename = "Inactive")]
    Inactive,
    #[serde(rename = "Expired")]
    Expired,
    #[serde(rename = "Not Bound")]
    NotBound,
    #[serde(rename = "Bound - No Login")]
    BoundNoLogin,
    #[serde(rename = "Expiring Soon")]
    ExpiringSoon,
    #[serde(rename = "Active")]
    Active,
}

/// Résultat de la comparaison du system_hash envoyé par le robot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemHashCheck {
    FirstUse,
    Authorized,
    Mismatch,
}

impl Model {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_expiring_soon(&self, now: DateTime<Utc>, window_days: i64) -> bool {
        now + Duration::days(window_days) > self.expires_at
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired(now) && self.trading_configuration_id.is_some()
    }

    pub fn is_account_bound(&self) -> bool {
        self.system_hash.as_deref().is_some_and(|h| !h.is_empty())
    }

    pub fn has_login_info(&self) -> bool {
        self.account_hash.as_deref().is_some_and(|h| !h.is_empty())
    }

    pub fn status(&self, now: DateTime<Utc>, window_days: i64) -> LicenseStatus {
        if !self.is_active {
            LicenseStatus::Inactive
        } else if self.is_expired(now) {
            LicenseStatus::Expired
        } else if !self.is_account_bound() {
            LicenseStatus::NotBound
        } else if !self.has_login_info() {
            LicenseStatus::BoundNoLogin
        } else if self.is_expiring_soon(now, window_days) {
            LicenseStatus::ExpiringSoon
        } else {
            LicenseStatus::Active
        }
    }

    pub fn check_system_hash(&self, system_hash: &str) -> SystemHashCheck {
        match self.system_hash.as_deref() {
            None | Some("") => SystemHashCheck::FirstUse,
            Some(bound) if bound == system_hash => SystemHashCheck::Authorized,
            Some(_) => SystemHashCheck::Mismatch,
        }
    }

    pub fn trade_mode_label(&self) -> &'static str {
        AccountTradeMode::try_from(self.account_trade_mode)
            .map(AccountTradeMode::label)
            .unwrap_or("Unknown")
    }
}

/// Masque un hash pour l'affichage : 8 premiers caractères + "..."
pub fn mask_hash(hash: &str) -> String {
    let prefix: String = hash.chars().take(8).collect();
    format!("{}...", prefix)
}
