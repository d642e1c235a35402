pub mod pbkdf2;
pub mod static_key;
