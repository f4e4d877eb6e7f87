use hmac::Hmac;
use pbkdf2::pbkdf2;
use sha2::Sha256;
use rand::Rng;
use rand::distributions::Alphanumeric;
use base64::{Engine, engine::general_purpose::{STANDARD, STANDARD_NO_PAD}};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "pbkdf2_sha256";
#[cfg(not(test))]
const ITERATIONS: u32 = 600_000;
#[cfg(test)]
const ITERATIONS: u32 = 1_000;
const SALT_LENGTH: usize = 22;
const KEY_LENGTH: usize = 32;

/// Hash un mot de passe au format Django (comptes admin importés compatibles)
/// Format: pbkdf2_sha256$iterations$salt$hash (hash en base64 standard)
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LENGTH)
        .map(char::from)
        .collect();

    let key = derive(password, salt.as_bytes(), ITERATIONS, KEY_LENGTH)?;

    Ok(format!("{}${}${}${}", ALGORITHM, ITERATIONS, salt, STANDARD.encode(key)))
}

/// Vérifie un mot de passe contre un hash Django
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, String> {
    let parts: Vec<&str> = stored_hash.split('$').collect();
    if parts.len() != 4 {
        return Err("Invalid hash format".to_string());
    }

    if parts[0] != ALGORITHM {
        return Err(format!("Unsupported algorithm: {}", parts[0]));
    }

    let iterations = parts[1]
        .parse::<u32>()
        .map_err(|_| "Invalid iterations".to_string())?;

    let salt = parts[2];
    let expected_hash = decode_flexible(parts[3])?;

    let computed = derive(password, salt.as_bytes(), iterations, expected_hash.len())?;

    Ok(constant_time_eq(&computed, &expected_hash))
}

fn derive(password: &str, salt: &[u8], iterations: u32, length: usize) -> Result<Vec<u8>, String> {
    let mut key = vec![0u8; length];
    pbkdf2::<HmacSha256>(password.as_bytes(), salt, iterations, &mut key)
        .map_err(|e| format!("PBKDF2 failed: {}", e))?;
    Ok(key)
}

/// Décode le hash : base64 (Django) ou hexadécimal (anciens exports)
fn decode_flexible(input: &str) -> Result<Vec<u8>, String> {
    if input.len() == KEY_LENGTH * 2 && input.chars().all(|c| c.is_ascii_hexdigit()) {
        return hex::decode(input)
            .map_err(|e| format!("Hex decode failed: {}", e));
    }

    STANDARD
        .decode(input)
        .or_else(|_| STANDARD_NO_PAD.decode(input))
        .map_err(|_| "Failed to decode".to_string())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("admin123").unwrap();
        assert!(hash.starts_with("pbkdf2_sha256$"));
        assert!(verify_password("admin123", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_known_django_style_hash() {
        // Hash construit à la main avec un salt fixe, comme Django le stocke
        let key = derive("secret", b"fixedsalt", 1_000, KEY_LENGTH).unwrap();
        let stored = format!("pbkdf2_sha256$1000$fixedsalt${}", STANDARD.encode(&key));
        assert!(verify_password("secret", &stored).unwrap());

        let stored_hex = format!("pbkdf2_sha256$1000$fixedsalt${}", hex::encode(&key));
        assert!(verify_password("secret", &stored_hex).unwrap());
    }

    #[test]
    fn test_rejects_malformed_hash() {
        assert!(verify_password("x", "not-a-hash").is_err());
        assert!(verify_password("x", "md5$1$salt$hash").is_err());
        assert!(verify_password("x", "pbkdf2_sha256$abc$salt$hash").is_err());
    }
}
