// ============================================================================
// CONFIGURATION
// ============================================================================
//
// Description:
//   Paramètres du serveur lus depuis l'environnement (.env chargé par dotenv).
//
// Variables:
//   - DATABASE_URL (obligatoire) : postgres://... ou sqlite://...
//   - HOST / PORT : adresse d'écoute (127.0.0.1:8080 par défaut)
//   - JWT_SECRET / JWT_TTL_HOURS : signature et durée de vie des tokens admin
//   - DEFAULT_LICENSE_DAYS : validité d'une licence créée sans date (365)
//   - EXPIRING_SOON_DAYS : fenêtre "expire bientôt" (30)
//   - ADMIN_USERNAME / ADMIN_PASSWORD : admin créé au démarrage s'il n'existe pas
//
// ============================================================================

use std::env;
use thiserror::Error;
use tracing::warn;

const INSECURE_JWT_SECRET: &str = "default-insecure-key-change-this";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set in .env file")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub default_license_days: i64,
    pub expiring_soon_days: i64,
    pub bootstrap_admin: Option<(String, String)>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construit la config à partir d'une fonction de lecture (env, HashMap en test...)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("⚠️  JWT_SECRET not found in .env, using default (INSECURE)");
                INSECURE_JWT_SECRET.to_string()
            }
        };

        let bootstrap_admin = match (lookup("ADMIN_USERNAME"), lookup("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some((username, password))
            }
            _ => None,
        };

        Ok(AppConfig {
            database_url,
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 8080)?,
            jwt_secret,
            jwt_ttl_hours: parse_or(&lookup, "JWT_TTL_HOURS", 24)?,
            default_license_days: parse_or(&lookup, "DEFAULT_LICENSE_DAYS", 365)?,
            expiring_soon_days: parse_or(&lookup, "EXPIRING_SOON_DAYS", 30)?,
            bootstrap_admin,
        })
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[("DATABASE_URL", "sqlite::memory:")])).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.jwt_ttl_hours, 24);
        assert_eq!(config.default_license_days, 365);
        assert_eq!(config.expiring_soon_days, 30);
        assert_eq!(config.jwt_secret, INSECURE_JWT_SECRET);
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn test_missing_database_url() {
        let result = AppConfig::from_lookup(lookup_from(&[]));
        assert_eq!(result.unwrap_err(), ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn test_invalid_port() {
        let result = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("PORT", "http"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid { var: "PORT", .. })));
    }

    #[test]
    fn test_bootstrap_admin_needs_both_values() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("ADMIN_USERNAME", "admin"),
        ]))
        .unwrap();
        assert!(config.bootstrap_admin.is_none());

        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("ADMIN_USERNAME", "admin"),
            ("ADMIN_PASSWORD", "secret"),
            ("JWT_SECRET", "s3cr3t"),
        ]))
        .unwrap();
        assert_eq!(config.bootstrap_admin, Some(("admin".to_string(), "secret".to_string())));
        assert_eq!(config.jwt_secret, "s3cr3t");
    }
}
