mod config;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod services;
mod utils;

use actix_web::{middleware::Logger, web, App, HttpServer};
use chrono::Utc;
use clap::{Parser, Subcommand};
use sea_orm::DatabaseConnection;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::services::admin_service::AdminService;
use crate::services::configuration_service::ConfigurationService;
use crate::services::license_service::{LicenseService, MAX_CLEANUP_DAYS};
use crate::services::report_service::{ReportFormat, ReportService};
use crate::services::sample_data;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "license_admin")]
#[command(about = "MT5 trading robot license administration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API (default)
    Serve,
    /// Create an administrator account
    CreateAdmin {
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Deactivate licenses expired for more than N days
    CleanupExpired {
        #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(i64).range(0..=MAX_CLEANUP_DAYS))]
        days: i64,
        /// Only list what would be deactivated
        #[arg(long)]
        dry_run: bool,
    },
    /// Print or save the license usage report
    GenerateReport {
        #[arg(long, value_enum, default_value_t = ReportFormat::Json)]
        format: ReportFormat,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Create the preset trading configurations
    CreateDefaultConfigs,
    /// Create demo clients with one license each
    CreateSampleData,
}

#[actix_web::main]
async fn main() -> CliResult {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "license_admin=info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    info!("🔌 Connecting to database...");
    let db = db::establish_connection(&config.database_url).await?;
    db::ensure_schema(&db).await?;
    info!("✅ Database connected!");

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(db, config).await,
        Commands::CreateAdmin { username, password } => {
            let admin = AdminService::create_admin(&db, &username, &password).await?;
            println!("Admin '{}' created (id {})", admin.username, admin.id);
            Ok(())
        }
        Commands::CleanupExpired { days, dry_run } => cleanup_expired(&db, days, dry_run).await,
        Commands::GenerateReport { format, output } => {
            generate_report(&db, &config, format, output).await
        }
        Commands::CreateDefaultConfigs => {
            for (name, created) in ConfigurationService::create_presets(&db).await? {
                let state = if created { "created" } else { "already exists" };
                println!("{}: {}", name, state);
            }
            Ok(())
        }
        Commands::CreateSampleData => {
            let report =
                sample_data::create_sample_data(&db, Utc::now(), config.default_license_days).await?;
            for (client, created) in report {
                let state = if created { "license created" } else { "already has a license" };
                println!("{}: {}", client, state);
            }
            Ok(())
        }
    }
}

async fn serve(db: DatabaseConnection, config: AppConfig) -> CliResult {
    if let Some((username, password)) = &config.bootstrap_admin {
        if AdminService::ensure_admin(&db, username, password).await? {
            info!("👤 Bootstrap admin '{}' created", username);
        }
    }

    let bind = (config.host.clone(), config.port);
    info!("🚀 Starting server on http://{}:{}", bind.0, bind.1);

    let db = web::Data::new(db);
    let config = web::Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(db.clone())
            .app_data(config.clone())
            .app_data(routes::json_config())
            .app_data(routes::query_config())
            .configure(routes::configure_routes)
    })
        .bind(bind)?
        .run()
        .await?;

    Ok(())
}

async fn cleanup_expired(db: &DatabaseConnection, days: i64, dry_run: bool) -> CliResult {
    let report = LicenseService::deactivate_expired(db, days, dry_run, Utc::now()).await?;

    if dry_run {
        println!("Would deactivate {} license(s)", report.matched);
        for entry in &report.sample {
            println!("  {} (expired {})", entry.license_key, entry.expires_at.format("%Y-%m-%d"));
        }
        if report.matched > report.sample.len() as u64 {
            println!("  ... and {} more", report.matched - report.sample.len() as u64);
        }
    } else {
        println!("Deactivated {} expired license(s)", report.deactivated);
    }
    Ok(())
}

async fn generate_report(
    db: &DatabaseConnection,
    config: &AppConfig,
    format: ReportFormat,
    output: Option<PathBuf>,
) -> CliResult {
    let report = ReportService::usage_report(db, Utc::now(), config.expiring_soon_days).await?;
    let rendered = report.render(format)?;

    match output {
        Some(path) => {
            tokio::fs::write(&path, rendered).await?;
            println!("Report written to {}", path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}
