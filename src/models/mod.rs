// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque entité correspond à une table (PostgreSQL ou SQLite) avec SeaORM.
//
// Liste des modules:
//   - health : Health check API
//   - users : Administrateurs du panneau (login JWT)
//   - client : Clients propriétaires de licences
//   - license : Licences des robots MT5 (clé, liaison du compte, usage)
//   - account_hash_event : Historique des changements de login d'une licence
//   - trading_configuration : Paramètres envoyés au robot (Fibonacci, session, timeouts)
//   - dto : Data Transfer Objects pour les requêtes/réponses API
//
// Points d'attention:
//   - Tous les accès passent par SeaORM (pas de SQL brut)
//   - Les tables sont créées depuis les entités au démarrage (db::ensure_schema)
//
// ============================================================================

pub mod health;
pub mod users;
pub mod client;
pub mod license;
pub mod account_hash_event;
pub mod trading_configuration;
pub mod dto;
