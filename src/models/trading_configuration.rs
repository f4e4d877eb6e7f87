// ============================================================================
// MODÈLE : TRADING CONFIGURATION
// ============================================================================
//
// Description:
//   Jeu de paramètres nommé envoyé au robot MT5 après validation de licence.
//   Une configuration est partagée par plusieurs licences (FK côté licenses).
//
// Groupes de colonnes:
//   - Symbole : allowed_symbol, strict_symbol_check
//   - Session : session_start, session_end (HH:MM)
//   - Fibonacci : 14 niveaux NUMERIC(8,5) compris entre -5 et 5
//   - Timeouts : 4 valeurs en minutes entre 1 et 1440
//
// Points d'attention:
//   - ON DELETE RESTRICT côté licenses : une config utilisée ne se supprime pas
//   - Le robot attend les noms d'inputs MT5 (inp_*) et des floats, voir MtConfiguration
//
// ============================================================================

use rust_decimal::prelude::ToPrimitive;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIGURATION_NAME: &str = "Default Configuration";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "trading_configurations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,

    // ═══ Symbole ═══
    pub allowed_symbol: String,
    pub strict_symbol_check: bool,

    // ═══ Session ═══
    pub session_start: String,
    pub session_end: String,

    // ═══ Fibonacci ═══
    #[sea_orm(column_type = "Decimal(Some((8, 5)))")]
    pub fib_primary_buy_tp: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 5)))")]
    pub fib_primary_buy_entry: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 5)))")]
    pub fib_session_high: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 5)))")]
    pub fib_primary_buy_sl: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 5)))")]
    pub fib_primary_sell_sl: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 5)))")]
    pub fib_hedge_buy_entry: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 5)))")]
    pub fib_hedge_sell_entry: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 5)))")]
    pub fib_hedge_buy_sl: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 5)))")]
    pub fib_hedge_sell_sl: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 5)))")]
    pub fib_session_low: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 5)))")]
    pub fib_primary_sell_entry: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 5)))")]
    pub fib_primary_sell_tp: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 5)))")]
    pub fib_hedge_buy_tp: Decimal,
    #[sea_orm(column_type = "Decimal(Some((8, 5)))")]
    pub fib_hedge_sell_tp: Decimal,

    // ═══ Timeouts (minutes) ═══
    pub primary_pending_timeout: i32,
    pub primary_position_timeout: i32,
    pub hedging_pending_timeout: i32,
    pub hedging_position_timeout: i32,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::license::Entity")]
    License,
}

impl Related<super::license::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::License.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = chrono::Utc::now();
        if insert {
            self.created_at = Set(now);
        }
        self.updated_at = Set(now);
        Ok(self)
    }
}

/// ActiveModel rempli avec les valeurs par défaut du robot
pub fn with_defaults(name: &str, description: Option<String>) -> ActiveModel {
    ActiveModel {
        name: Set(name.to_string()),
        description: Set(description),
        is_active: Set(true),
        allowed_symbol: Set("US30".to_string()),
        strict_symbol_check: Set(true),
        session_start: Set("08:45".to_string()),
        session_end: Set("10:00".to_string()),
        fib_primary_buy_tp: Set(Decimal::new(1325, 3)),
        fib_primary_buy_entry: Set(Decimal::new(105, 2)),
        fib_session_high: Set(Decimal::ONE),
        fib_primary_buy_sl: Set(Decimal::new(-5, 2)),
        fib_primary_sell_sl: Set(Decimal::new(105, 2)),
        fib_hedge_buy_entry: Set(Decimal::new(105, 2)),
        fib_hedge_sell_entry: Set(Decimal::new(-5, 2)),
        fib_hedge_buy_sl: Set(Decimal::ZERO),
        fib_hedge_sell_sl: Set(Decimal::ONE),
        fib_session_low: Set(Decimal::ZERO),
        fib_primary_sell_entry: Set(Decimal::new(-5, 2)),
        fib_primary_sell_tp: Set(Decimal::new(-325, 3)),
        fib_hedge_buy_tp: Set(Decimal::new(13, 1)),
        fib_hedge_sell_tp: Set(Decimal::new(-3, 1)),
        primary_pending_timeout: Set(30),
        primary_position_timeout: Set(60),
        hedging_pending_timeout: Set(30),
        hedging_position_timeout: Set(60),
        ..Default::default()
    }
}

/// Paramètres tels que le robot MT5 les lit (noms des inputs, niveaux en float)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MtConfiguration {
    #[serde(rename = "inp_AllowedSymbol")]
    pub allowed_symbol: String,
    #[serde(rename = "inp_StrictSymbolCheck")]
    pub strict_symbol_check: bool,
    #[serde(rename = "inp_SessionStart")]
    pub session_start: String,
    #[serde(rename = "inp_SessionEnd")]
    pub session_end: String,
    #[serde(rename = "inp_FibLevel_1_1")]
    pub fib_level_1_1: f64,
    #[serde(rename = "inp_FibLevel_1_05")]
    pub fib_level_1_05: f64,
    #[serde(rename = "inp_FibLevel_1_0")]
    pub fib_level_1_0: f64,
    #[serde(rename = "inp_FibLevel_PrimaryBuySL")]
    pub fib_level_primary_buy_sl: f64,
    #[serde(rename = "inp_FibLevel_PrimarySellSL")]
    pub fib_level_primary_sell_sl: f64,
    #[serde(rename = "inp_FibLevel_HedgeBuy")]
    pub fib_level_hedge_buy: f64,
    #[serde(rename = "inp_FibLevel_HedgeSell")]
    pub fib_level_hedge_sell: f64,
    #[serde(rename = "inp_FibLevel_HedgeBuySL")]
    pub fib_level_hedge_buy_sl: f64,
    #[serde(rename = "inp_FibLevel_HedgeSellSL")]
    pub fib_level_hedge_sell_sl: f64,
    #[serde(rename = "inp_FibLevel_0_0")]
    pub fib_level_0_0: f64,
    #[serde(rename = "inp_FibLevel_Neg_05")]
    pub fib_level_neg_05: f64,
    #[serde(rename = "inp_FibLevel_Neg_1")]
    pub fib_level_neg_1: f64,
    #[serde(rename = "inp_FibLevel_HedgeBuyTP")]
    pub fib_level_hedge_buy_tp: f64,
    #[serde(rename = "inp_FibLevel_HedgeSellTP")]
    pub fib_level_hedge_sell_tp: f64,
    #[serde(rename = "inp_PrimaryPendingTimeout")]
    pub primary_pending_timeout: i32,
    #[serde(rename = "inp_PrimaryPositionTimeout")]
    pub primary_position_timeout: i32,
    #[serde(rename = "inp_HedgingPendingTimeout")]
    pub hedging_pending_timeout: i32,
    #[serde(rename = "inp_HedgingPositionTimeout")]
    pub hedging_position_timeout: i32,
}

fn level(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

impl From<&Model> for MtConfiguration {
    fn from(config: &Model) -> Self {
        MtConfiguration {
            allowed_symbol: config.allowed_symbol.clone(),
            strict_symbol_check: config.strict_symbol_check,
            session_start: config.session_start.clone(),
            session_end: config.session_end.clone(),
            fib_level_1_1: level(config.fib_primary_buy_tp),
            fib_level_1_05: level(config.fib_primary_buy_entry),
            fib_level_1_0: level(config.fib_session_high),
            fib_level_primary_buy_sl: level(config.fib_primary_buy_sl),
            fib_level_primary_sell_sl: level(config.fib_primary_sell_sl),
            fib_level_hedge_buy: level(config.fib_hedge_buy_entry),
            fib_level_hedge_sell: level(config.fib_hedge_sell_entry),
            fib_level_hedge_buy_sl: level(config.fib_hedge_buy_sl),
            fib_level_hedge_sell_sl: level(config.fib_hedge_sell_sl),
            fib_level_0_0: level(config.fib_session_low),
            fib_level_neg_05: level(config.fib_primary_sell_entry),
            fib_level_neg_1: level(config.fib_primary_sell_tp),
            fib_level_hedge_buy_tp: level(config.fib_hedge_buy_tp),
            fib_level_hedge_sell_tp: level(config.fib_hedge_sell_tp),
            primary_pending_timeout: config.primary_pending_timeout,
            primary_position_timeout: config.primary_position_timeout,
            hedging_pending_timeout: config.hedging_pending_timeout,
            hedging_position_timeout: config.hedging_position_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> Model {
        Model {
            id: 1,
            name: "US30 Standard".to_string(),
            description: None,
            is_active: true,
            allowed_symbol: "US30".to_string(),
            strict_symbol_check: true,
            session_start: "08:45".to_string(),
            session_end: "10:00".to_string(),
            fib_primary_buy_tp: Decimal::new(1325, 3),
            fib_primary_buy_entry: Decimal::new(105, 2),
            fib_session_high: Decimal::ONE,
            fib_primary_buy_sl: Decimal::new(-5, 2),
            fib_primary_sell_sl: Decimal::new(105, 2),
            fib_hedge_buy_entry: Decimal::new(105, 2),
            fib_hedge_sell_entry: Decimal::new(-5, 2),
            fib_hedge_buy_sl: Decimal::ZERO,
            fib_hedge_sell_sl: Decimal::ONE,
            fib_session_low: Decimal::ZERO,
            fib_primary_sell_entry: Decimal::new(-5, 2),
            fib_primary_sell_tp: Decimal::new(-325, 3),
            fib_hedge_buy_tp: Decimal::new(13, 1),
            fib_hedge_sell_tp: Decimal::new(-3, 1),
            primary_pending_timeout: 30,
            primary_position_timeout: 60,
            hedging_pending_timeout: 30,
            hedging_position_timeout: 60,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_mt5_payload_uses_input_names_and_floats() {
        let payload = serde_json::to_value(MtConfiguration::from(&sample())).unwrap();

        assert_eq!(payload["inp_AllowedSymbol"], "US30");
        assert_eq!(payload["inp_StrictSymbolCheck"], true);
        assert_eq!(payload["inp_SessionStart"], "08:45");
        assert_eq!(payload["inp_FibLevel_1_1"].as_f64(), Some(1.325));
        assert_eq!(payload["inp_FibLevel_Neg_1"].as_f64(), Some(-0.325));
        assert_eq!(payload["inp_FibLevel_HedgeSellTP"].as_f64(), Some(-0.3));
        assert_eq!(payload["inp_HedgingPositionTimeout"], 60);
        assert_eq!(payload.as_object().unwrap().len(), 22);
    }
}
