use chrono::{DateTime, Utc};
use sea_orm::*;
use tracing::info;

use crate::error::AppError;
use crate::models::dto::{ClientRequest, CreateLicenseRequest};
use crate::models::{client, license};
use crate::services::client_service::ClientService;
use crate::services::license_service::LicenseService;

struct SampleClient {
    first_name: &'static str,
    last_name: &'static str,
    country: &'static str,
    email: &'static str,
}

const SAMPLE_CLIENTS: [SampleClient; 5] = [
    SampleClient { first_name: "John", last_name: "Smith", country: "United States", email: "john.smith@example.com" },
    SampleClient { first_name: "Maria", last_name: "Garcia", country: "Spain", email: "maria.garcia@example.com" },
    SampleClient { first_name: "Ahmed", last_name: "Hassan", country: "Egypt", email: "ahmed.hassan@example.com" },
    SampleClient { first_name: "Li", last_name: "Chen", country: "China", email: "li.chen@example.com" },
    SampleClient { first_name: "Hans", last_name: "Mueller", country: "Germany", email: "hans.mueller@example.com" },
];

/// Clients de démonstration, une licence chacun (modes 0/1/2 en alternance).
/// Retourne (nom complet, licence créée?) ; relancer ne duplique rien.
pub async fn create_sample_data(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
    license_days: i64,
) -> Result<Vec<(String, bool)>, AppError> {
    let mut report = Vec::with_capacity(SAMPLE_CLIENTS.len());

    for (i, sample) in SAMPLE_CLIENTS.iter().enumerate() {
        let existing = client::Entity::find()
            .filter(client::Column::FirstName.eq(sample.first_name))
            .filter(client::Column::LastName.eq(sample.last_name))
            .filter(client::Column::Country.eq(sample.country))
            .one(db)
            .await?;

        let owner = match existing {
            Some(found) => found,
            None => {
                let request = ClientRequest {
                    first_name: sample.first_name.to_string(),
                    last_name: sample.last_name.to_string(),
                    country: sample.country.to_string(),
                    email: Some(sample.email.to_string()),
                    phone: None,
                };
                ClientService::create(db, &request, None).await?
            }
        };

        let has_license = license::Entity::find()
            .filter(license::Column::ClientId.eq(owner.id))
            .one(db)
            .await?
            .is_some();

        if !has_license {
            let request = CreateLicenseRequest {
                client_id: owner.id,
                trading_configuration_id: None,
                account_trade_mode: Some((i % 3) as i32),
                expires_at: None,
                is_active: Some(true),
            };
            LicenseService::create(db, &request, None, now, license_days).await?;
        }

        report.push((owner.full_name(), !has_license));
    }

    let created = report.iter().filter(|(_, created)| *created).count();
    info!("🌱 Sample data ready ({} new license(s))", created);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;

    #[actix_web::test]
    async fn test_sample_data_is_idempotent() {
        let db = test_connection().await;
        let now = Utc::now();

        let first = create_sample_data(&db, now, 365).await.unwrap();
        assert_eq!(first.len(), 5);
        assert!(first.iter().all(|(_, created)| *created));
        assert_eq!(first[0].0, "John Smith");

        let second = create_sample_data(&db, now, 365).await.unwrap();
        assert!(second.iter().all(|(_, created)| !*created));

        assert_eq!(client::Entity::find().count(&db).await.unwrap(), 5);
        assert_eq!(license::Entity::find().count(&db).await.unwrap(), 5);
    }
}
