pub mod jwt;
pub mod license_key;
pub mod password;
