use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use sea_orm::*;
use tracing::info;

use crate::error::AppError;
use crate::models::dto::{ConfigurationQuery, ConfigurationRequest, ConfigurationResponse, Page};
use crate::models::{license, trading_configuration};
use crate::models::trading_configuration::DEFAULT_CONFIGURATION_NAME;
use crate::services::fetch_page;

pub struct ConfigurationService;

/// Préréglages livrés avec le panneau (commande create-default-configs)
struct Preset {
    name: &'static str,
    description: &'static str,
    symbol: &'static str,
    session_start: &'static str,
    session_end: &'static str,
    buy_entry: Option<Decimal>,
    sell_entry: Option<Decimal>,
}

fn presets() -> Vec<Preset> {
    vec![
        Preset {
            name: "US30 Standard",
            description: "Standard US30 trading configuration",
            symbol: "US30",
            session_start: "08:45",
            session_end: "10:00",
            buy_entry: None,
            sell_entry: None,
        },
        Preset {
            name: "EURUSD Conservative",
            description: "Conservative EURUSD trading configuration",
            symbol: "EURUSD",
            session_start: "09:00",
            session_end: "17:00",
            buy_entry: Some(Decimal::new(102, 2)),
            sell_entry: Some(Decimal::new(-2, 2)),
        },
        Preset {
            name: "XAUUSD Aggressive",
            description: "Aggressive Gold trading configuration",
            symbol: "XAUUSD",
            session_start: "07:00",
            session_end: "16:00",
            buy_entry: Some(Decimal::new(108, 2)),
            sell_entry: Some(Decimal::new(-8, 2)),
        },
    ]
}

fn to_level(value: f64) -> Result<Decimal, AppError> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(5))
        .ok_or_else(|| AppError::BadRequest(format!("Invalid Fibonacci level: {}", value)))
}

macro_rules! set_fields {
    ($active:ident, $request:ident, $($field:ident),* $(,)?) => {
        $(if let Some(value) = $request.$field.clone() {
            $active.$field = Set(value);
        })*
    };
}

macro_rules! set_levels {
    ($active:ident, $request:ident, $($field:ident),* $(,)?) => {
        $(if let Some(value) = $request.$field {
            $active.$field = Set(to_level(value)?);
        })*
    };
}

/// Applique les champs présents de la requête (PATCH et création)
fn apply_request(
    active: &mut trading_configuration::ActiveModel,
    request: &ConfigurationRequest,
) -> Result<(), AppError> {
    if let Some(name) = &request.name {
        active.name = Set(name.trim().to_string());
    }
    if request.description.is_some() {
        active.description = Set(request.description.clone());
    }

    set_fields!(
        active, request,
        is_active,
        allowed_symbol,
        strict_symbol_check,
        session_start,
        session_end,
        primary_pending_timeout,
        primary_position_timeout,
        hedging_pending_timeout,
        hedging_position_timeout,
    );

    set_levels!(
        active, request,
        fib_primary_buy_tp,
        fib_primary_buy_entry,
        fib_session_high,
        fib_primary_buy_sl,
        fib_primary_sell_sl,
        fib_hedge_buy_entry,
        fib_hedge_sell_entry,
        fib_hedge_buy_sl,
        fib_hedge_sell_sl,
        fib_session_low,
        fib_primary_sell_entry,
        fib_primary_sell_tp,
        fib_hedge_buy_tp,
        fib_hedge_sell_tp,
    );

    Ok(())
}

impl ConfigurationService {
    pub async fn find(db: &DatabaseConnection, id: i32) -> Result<trading_configuration::Model, AppError> {
        trading_configuration::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("Trading configuration", id))
    }

    pub async fn license_count<C: ConnectionTrait>(db: &C, id: i32) -> Result<u64, DbErr> {
        license::Entity::find()
            .filter(license::Column::TradingConfigurationId.eq(id))
            .count(db)
            .await
    }

    pub async fn get(db: &DatabaseConnection, id: i32) -> Result<ConfigurationResponse, AppError> {
        let configuration = Self::find(db, id).await?;
        let license_count = Self::license_count(db, id).await?;
        Ok(ConfigurationResponse { configuration, license_count })
    }

    pub async fn list(
        db: &DatabaseConnection,
        query: &ConfigurationQuery,
    ) -> Result<Page<ConfigurationResponse>, AppError> {
        let mut select = trading_configuration::Entity::find()
            .order_by_asc(trading_configuration::Column::Name);

        // Filtrer sur la configuration assignée à une licence
        if let Some(license_id) = query.license_id {
            let assigned = license::Entity::find_by_id(license_id)
                .one(db)
                .await?
                .and_then(|l| l.trading_configuration_id);
            match assigned {
                Some(config_id) => {
                    select = select.filter(trading_configuration::Column::Id.eq(config_id));
                }
                None => return Ok(Page::new(Vec::new(), 0, query.paging())),
            }
        }

        if let Some(is_active) = query.is_active {
            select = select.filter(trading_configuration::Column::IsActive.eq(is_active));
        }

        let (configurations, count) = fetch_page(db, select, query.paging()).await?;

        let mut results = Vec::with_capacity(configurations.len());
        for configuration in configurations {
            let license_count = Self::license_count(db, configuration.id).await?;
            results.push(ConfigurationResponse { configuration, license_count });
        }

        Ok(Page::new(results, count, query.paging()))
    }

    async fn ensure_unique_name(
        db: &DatabaseConnection,
        name: &str,
        except_id: Option<i32>,
    ) -> Result<(), AppError> {
        let mut select = trading_configuration::Entity::find()
            .filter(trading_configuration::Column::Name.eq(name));
        if let Some(id) = except_id {
            select = select.filter(trading_configuration::Column::Id.ne(id));
        }

        if select.one(db).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "A trading configuration named '{}' already exists",
                name
            )));
        }
        Ok(())
    }

    pub async fn create(
        db: &DatabaseConnection,
        request: &ConfigurationRequest,
    ) -> Result<trading_configuration::Model, AppError> {
        let name = match request.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(AppError::BadRequest("Configuration name is required".to_string())),
        };

        Self::ensure_unique_name(db, &name, None).await?;

        let mut active = trading_configuration::with_defaults(&name, None);
        apply_request(&mut active, request)?;

        let configuration = active.insert(db).await?;
        info!("⚙️  Created trading configuration {}", configuration.name);
        Ok(configuration)
    }

    pub async fn update(
        db: &DatabaseConnection,
        id: i32,
        request: &ConfigurationRequest,
    ) -> Result<trading_configuration::Model, AppError> {
        let existing = Self::find(db, id).await?;

        if let Some(name) = request.name.as_deref().map(str::trim) {
            if name.is_empty() {
                return Err(AppError::BadRequest("Configuration name is required".to_string()));
            }
            if name != existing.name {
                Self::ensure_unique_name(db, name, Some(id)).await?;
            }
        }

        let mut active: trading_configuration::ActiveModel = existing.into();
        apply_request(&mut active, request)?;
        Ok(active.update(db).await?)
    }

    /// Refuse la suppression tant qu'une licence utilise la configuration
    pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<(), AppError> {
        let configuration = Self::find(db, id).await?;

        let in_use = Self::license_count(db, id).await?;
        if in_use > 0 {
            return Err(AppError::Conflict(format!(
                "Configuration '{}' is used by {} license(s)",
                configuration.name, in_use
            )));
        }

        trading_configuration::Entity::delete_by_id(id).exec(db).await?;
        info!("🗑️  Deleted trading configuration {}", configuration.name);
        Ok(())
    }

    /// Configuration partagée assignée aux licences créées sans configuration
    pub async fn get_or_create_default<C: ConnectionTrait>(
        db: &C,
    ) -> Result<trading_configuration::Model, DbErr> {
        let existing = trading_configuration::Entity::find()
            .filter(trading_configuration::Column::Name.eq(DEFAULT_CONFIGURATION_NAME))
            .one(db)
            .await?;

        if let Some(configuration) = existing {
            return Ok(configuration);
        }

        let configuration = trading_configuration::with_defaults(
            DEFAULT_CONFIGURATION_NAME,
            Some("Default trading configuration for new licenses".to_string()),
        )
        .insert(db)
        .await?;

        info!("⚙️  Created default shared trading configuration");
        Ok(configuration)
    }

    /// Crée les préréglages manquants. Retourne (nom, créé?) pour chaque préréglage.
    pub async fn create_presets(db: &DatabaseConnection) -> Result<Vec<(String, bool)>, DbErr> {
        let mut report = Vec::new();

        for preset in presets() {
            let exists = trading_configuration::Entity::find()
                .filter(trading_configuration::Column::Name.eq(preset.name))
                .one(db)
                .await?
                .is_some();

            if !exists {
                let mut active = trading_configuration::with_defaults(
                    preset.name,
                    Some(preset.description.to_string()),
                );
                active.allowed_symbol = Set(preset.symbol.to_string());
                active.session_start = Set(preset.session_start.to_string());
                active.session_end = Set(preset.session_end.to_string());
                if let Some(level) = preset.buy_entry {
                    active.fib_primary_buy_entry = Set(level);
                }
                if let Some(level) = preset.sell_entry {
                    active.fib_primary_sell_entry = Set(level);
                }
                active.insert(db).await?;
            }

            report.push((preset.name.to_string(), !exists));
        }

        Ok(report)
    }
}
