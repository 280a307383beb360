use bcrypt::{hash, verify, DEFAULT_COST};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::User;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hashed_password: &str) -> Result<bool, AppError> {
    verify(password, hashed_password)
        .map_err(|e| AppError::InternalServerError(format!("Failed to verify password: {}", e)))
}

/// Checks a login (email or username) and password against the user table.
///
/// Unknown logins and wrong passwords produce the same error.
pub async fn authenticate(pool: &PgPool, login: &str, password: &str) -> Result<User, AppError> {
    let invalid = || AppError::Unauthorized("Unable to log in with provided credentials".into());

    let user = User::find_by_login(pool, login).await?.ok_or_else(invalid)?;
    if verify_password(password, &user.password_hash)? {
        log::debug!("user {} authenticated", user.id);
        Ok(user)
    } else {
        Err(invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing_and_verification() {
        let hashed = hash_password("correct horse").unwrap();

        assert_ne!(hashed, "correct horse");
        assert!(verify_password("correct horse", &hashed).unwrap());
        assert!(!verify_password("battery staple", &hashed).unwrap());
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        match verify_password("correct horse", "not-a-bcrypt-hash") {
            Err(AppError::InternalServerError(msg)) => {
                assert!(msg.contains("Failed to verify password"))
            }
            Ok(false) => {}
            other => panic!("malformed hash must not verify, got {:?}", other),
        }
    }
}
