use uuid::Uuid;

/// Génère une clé de licence : UUID v4 sans tirets (32 caractères hexadécimaux)
pub fn generate_license_key() -> String {
    Uuid::new_v4().simple().to_string()
}
