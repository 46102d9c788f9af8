use bcrypt::{hash, verify};

use crate::storage::StoreError;

/// bcrypt cost used for admin passwords.
pub const BCRYPT_COST: u32 = 10;

/// Credential installed when no admin password has ever been stored.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// bcrypt ignores input past 72 bytes.
pub const MAX_PASSWORD_LENGTH: usize = 72;

/// Hash a password on the blocking pool.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, StoreError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        hash(password, cost).map_err(|e| StoreError::Hashing(e.to_string()))
    })
    .await
    .map_err(|e| StoreError::Hashing(format!("task join error: {e}")))?
}

/// Check a password against a stored hash. A malformed hash never matches.
pub async fn verify_password(password: &str, hashed: &str) -> Result<bool, StoreError> {
    let password = password.to_string();
    let hashed = hashed.to_string();
    tokio::task::spawn_blocking(move || match verify(password, &hashed) {
        Ok(matched) => matched,
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash could not be verified");
            false
        }
    })
    .await
    .map_err(|e| StoreError::Hashing(format!("task join error: {e}")))
}

/// Reason a new admin password is refused, if any.
pub fn validate_new_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        ));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} bytes"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_and_verify() {
        let hashed = hash_password("s3cret-pass", 4).await.unwrap();
        assert!(hashed.starts_with("$2"));
        assert!(verify_password("s3cret-pass", &hashed).await.unwrap());
        assert!(!verify_password("wrong", &hashed).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_hash_never_matches() {
        assert!(!verify_password("admin123", "not-a-hash").await.unwrap());
    }

    #[test]
    fn new_password_rules() {
        assert!(validate_new_password("12345").is_err());
        assert!(validate_new_password("123456").is_ok());
        assert!(validate_new_password(&"x".repeat(73)).is_err());
    }
}
