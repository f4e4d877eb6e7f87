// ============================================================================
// REPORT SERVICE
// ============================================================================
//
// Description:
//   Statistiques du tableau de bord et rapport d'utilisation des licences.
//
// Formats du rapport:
//   - json : objet UsageReport
//   - csv  : lignes "Metric,Value"
//   - text : rapport lisible pour la console
//
// ============================================================================

use chrono::{DateTime, Duration, Utc};
use clap::ValueEnum;
use sea_orm::*;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::dto::LicenseSummary;
use crate::models::license::AccountTradeMode;
use crate::models::{client, license, trading_configuration};
use crate::services::license_service::LicenseService;

const RECENT_LICENSES: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Csv,
    Text,
}

#[derive(Debug, Serialize)]
pub struct TradeModeCount {
    pub account_trade_mode: i32,
    pub label: &'static str,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_licenses: u64,
    pub active_licenses: u64,
    pub expired_licenses: u64,
    pub total_clients: u64,
    pub total_configurations: u64,
    pub trade_modes: Vec<TradeModeCount>,
    pub recent_licenses: Vec<LicenseSummary>,
}

#[derive(Debug, Serialize)]
pub struct UsageReport {
    pub generated_at: DateTime<Utc>,
    pub total_licenses: u64,
    pub active_licenses: u64,
    pub expired_licenses: u64,
    pub demo_licenses: u64,
    pub restricted_licenses: u64,
    pub live_licenses: u64,
    pub expiring_soon: u64,
}

impl UsageReport {
    fn metrics(&self) -> [(&'static str, u64); 7] {
        [
            ("Total Licenses", self.total_licenses),
            ("Active Licenses", self.active_licenses),
            ("Expired Licenses", self.expired_licenses),
            ("Demo Accounts", self.demo_licenses),
            ("Restricted Accounts", self.restricted_licenses),
            ("Live Accounts", self.live_licenses),
            ("Expiring Soon", self.expiring_soon),
        ]
    }

    pub fn render(&self, format: ReportFormat) -> Result<String, AppError> {
        match format {
            ReportFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| AppError::Internal(format!("Failed to serialize report: {}", e))),
            ReportFormat::Csv => {
                let rows: String = self
                    .metrics()
                    .iter()
                    .map(|(metric, value)| format!("{},{}\n", metric, value))
                    .collect();
                Ok(format!(
                    "Metric,Value\n{}Generated At,{}\n",
                    rows,
                    self.generated_at.to_rfc3339()
                ))
            }
            ReportFormat::Text => {
                let rows: String = self
                    .metrics()
                    .iter()
                    .map(|(metric, value)| format!("{:<22}{}\n", format!("{}:", metric), value))
                    .collect();
                Ok(format!(
                    "MT5 License Usage Report\nGenerated: {}\n{}\n{}",
                    self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    "=".repeat(40),
                    rows
                ))
            }
        }
    }
}

pub struct ReportService;

impl ReportService {
    async fn count_active(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<u64, DbErr> {
        license::Entity::find()
            .filter(license::Column::IsActive.eq(true))
            .filter(license::Column::ExpiresAt.gt(now))
            .count(db)
            .await
    }

    async fn count_expired(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<u64, DbErr> {
        license::Entity::find()
            .filter(license::Column::ExpiresAt.lt(now))
            .count(db)
            .await
    }

    async fn trade_mode_counts(db: &DatabaseConnection) -> Result<Vec<TradeModeCount>, DbErr> {
        let mut counts = Vec::with_capacity(AccountTradeMode::ALL.len());
        for mode in AccountTradeMode::ALL {
            let count = license::Entity::find()
                .filter(license::Column::AccountTradeMode.eq(mode.as_i32()))
                .count(db)
                .await?;
            counts.push(TradeModeCount {
                account_trade_mode: mode.as_i32(),
                label: mode.label(),
                count,
            });
        }
        Ok(counts)
    }

    pub async fn dashboard(
        db: &DatabaseConnection,
        now: DateTime<Utc>,
        window_days: i64,
    ) -> Result<DashboardStats, AppError> {
        let recent = license::Entity::find()
            .order_by_desc(license::Column::CreatedAt)
            .order_by_desc(license::Column::Id)
            .limit(RECENT_LICENSES)
            .all(db)
            .await?;

        Ok(DashboardStats {
            total_licenses: license::Entity::find().count(db).await?,
            active_licenses: Self::count_active(db, now).await?,
            expired_licenses: Self::count_expired(db, now).await?,
            total_clients: client::Entity::find().count(db).await?,
            total_configurations: trading_configuration::Entity::find().count(db).await?,
            trade_modes: Self::trade_mode_counts(db).await?,
            recent_licenses: LicenseService::summarize(db, recent, now, window_days).await?,
        })
    }

    pub async fn usage_report(
        db: &DatabaseConnection,
        now: DateTime<Utc>,
        window_days: i64,
    ) -> Result<UsageReport, AppError> {
        let modes = Self::trade_mode_counts(db).await?;
        let mode_count = |mode: AccountTradeMode| {
            modes
                .iter()
                .find(|m| m.account_trade_mode == mode.as_i32())
                .map(|m| m.count)
                .unwrap_or(0)
        };

        let expiring_soon = license::Entity::find()
            .filter(license::Column::IsActive.eq(true))
            .filter(license::Column::ExpiresAt.gt(now))
            .filter(license::Column::ExpiresAt.lt(now + Duration::days(window_days)))
            .count(db)
            .await?;

        Ok(UsageReport {
            generated_at: now,
            total_licenses: license::Entity::find().count(db).await?,
            active_licenses: Self::count_active(db, now).await?,
            expired_licenses: Self::count_expired(db, now).await?,
            demo_licenses: mode_count(AccountTradeMode::Demo),
            restricted_licenses: mode_count(AccountTradeMode::Restricted),
            live_licenses: mode_count(AccountTradeMode::Live),
            expiring_soon,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::services::sample_data;

    fn report() -> UsageReport {
        UsageReport {
            generated_at: DateTime::parse_from_rfc3339("2025-06-20T10:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
            total_licenses: 5,
            active_licenses: 4,
            expired_licenses: 1,
            demo_licenses: 2,
            restricted_licenses: 2,
            live_licenses: 1,
            expiring_soon: 0,
        }
    }

    #[test]
    fn test_csv_format() {
        let csv = report().render(ReportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Metric,Value");
        assert_eq!(lines[1], "Total Licenses,5");
        assert_eq!(lines[6], "Live Accounts,1");
        assert_eq!(lines[8], "Generated At,2025-06-20T10:30:00+00:00");
        assert_eq!(lines.len(), 9);
        assert!(csv.ends_with('\n'));
    }

    #[test]
    fn test_text_and_json_formats() {
        let text = report().render(ReportFormat::Text).unwrap();
        assert!(text.starts_with("MT5 License Usage Report\n"));
        assert!(text.contains("Active Licenses:      4"));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "Generated: 2025-06-20 10:30:00 UTC");
        assert_eq!(lines[2], "=".repeat(40));
        assert_eq!(lines[9], "Expiring Soon:        0");

        let json: serde_json::Value =
            serde_json::from_str(&report().render(ReportFormat::Json).unwrap()).unwrap();
        assert_eq!(json["restricted_licenses"], 2);
    }

    #[actix_web::test]
    async fn test_dashboard_counts_sample_data() {
        let db = test_connection().await;
        let now = Utc::now();
        sample_data::create_sample_data(&db, now, 365).await.unwrap();

        let stats = ReportService::dashboard(&db, now, 30).await.unwrap();
        assert_eq!(stats.total_licenses, 5);
        assert_eq!(stats.active_licenses, 5);
        assert_eq!(stats.expired_licenses, 0);
        assert_eq!(stats.total_clients, 5);
        assert_eq!(stats.total_configurations, 1);
        assert_eq!(stats.recent_licenses.len(), 5);

        let counts: Vec<u64> = stats.trade_modes.iter().map(|m| m.count).collect();
        assert_eq!(counts, vec![2, 2, 1]);
    }

    #[actix_web::test]
    async fn test_usage_report_expiring_window() {
        let db = test_connection().await;
        let now = Utc::now();
        sample_data::create_sample_data(&db, now, 10).await.unwrap();

        let report = ReportService::usage_report(&db, now, 30).await.unwrap();
        assert_eq!(report.total_licenses, 5);
        assert_eq!(report.expiring_soon, 5);
        assert_eq!(report.demo_licenses, 2);
        assert_eq!(report.live_licenses, 1);
    }
}
