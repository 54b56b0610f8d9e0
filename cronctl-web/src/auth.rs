//! ABOUTME: Authentication utilities for password hashing and JWT operations
//! ABOUTME: Provides secure password verification and JWT token management

use crate::models::Claims;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use cronctl_config::Argon2Config;
use cronctl_core::{Error, Result};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument};

/// Password hashing utilities
pub struct PasswordAuth;

impl PasswordAuth {
    fn argon2(params: &Argon2Config) -> Result<Argon2<'static>> {
        let params = Params::new(
            params.memory_cost,
            params.time_cost,
            params.parallelism,
            None,
        )
        .map_err(|e| Error::Config(format!("Invalid argon2 params: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hash a password using Argon2 with the configured cost parameters.
    #[instrument(skip(password, params))]
    pub fn hash_password(password: &str, params: &Argon2Config) -> Result<String> {
        debug!("Hashing password");

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Self::argon2(params)?;

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Config(format!("Failed to hash password: {}", e)))?
            .to_string();

        debug!("Password hashed successfully");
        Ok(password_hash)
    }

    /// Verify a password against a hash. The hash's own PHC string carries
    /// the parameters it was created with, so verification doesn't need the
    /// current configured cost — only the algorithm/version.
    #[instrument(skip(password, hash))]
    pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
        debug!("Verifying password");

        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| Error::Config(format!("Invalid password hash format: {}", e)))?;

        let argon2 = Argon2::default();

        match argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => {
                debug!("Password verification successful");
                Ok(true)
            }
            Err(_) => {
                debug!("Password verification failed");
                Ok(false)
            }
        }
    }
}

/// JWT token utilities
pub struct JwtAuth;

impl JwtAuth {
    /// Create a signed token carrying the claims the auth contract requires:
    /// `{user_id, username, is_admin, category_id, is_permission, exp}`.
    #[instrument(skip(secret))]
    pub fn create_token(
        user_id: i64,
        username: &str,
        is_admin: bool,
        category_id: i64,
        is_permission: bool,
        secret: &str,
        expiration_days: u32,
    ) -> Result<String> {
        debug!(user_id, username, "Creating JWT token for user");

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::Config(format!("Time error: {}", e)))?
            .as_secs() as usize;

        let expiration_secs = expiration_days as usize * 24 * 60 * 60;

        let claims = Claims {
            user_id,
            username: username.to_string(),
            is_admin,
            category_id,
            is_permission,
            exp: now + expiration_secs,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_ref()),
        )
        .map_err(|e| Error::Config(format!("Failed to create JWT: {}", e)))?;

        debug!("JWT token created successfully");
        Ok(token)
    }

    /// Verify and decode a JWT token.
    #[instrument(skip(token, secret))]
    pub fn verify_token(token: &str, secret: &str) -> Result<Claims> {
        debug!("Verifying JWT token");

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|e| Error::Auth(format!("Invalid or expired token: {}", e)))?;

        debug!("JWT token verified successfully");
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_and_verify() {
        let password = "test_password_123";
        let params = Argon2Config::default();

        let hash = PasswordAuth::hash_password(password, &params).expect("Should hash password");
        assert!(!hash.is_empty());
        assert!(hash.starts_with("$argon2"));

        let is_valid = PasswordAuth::verify_password(password, &hash).expect("Should verify");
        assert!(is_valid);

        let is_valid =
            PasswordAuth::verify_password("wrong_password", &hash).expect("Should verify");
        assert!(!is_valid);
    }

    #[test]
    fn test_jwt_create_and_verify() {
        let secret = "test_secret_key_that_is_long_enough";

        let token = JwtAuth::create_token(42, "alice", true, 7, false, secret, 1)
            .expect("Should create token");
        assert!(!token.is_empty());

        let claims = JwtAuth::verify_token(&token, secret).expect("Should verify token");
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.username, "alice");
        assert!(claims.is_admin);
        assert_eq!(claims.category_id, 7);
        assert!(!claims.is_permission);
    }

    #[test]
    fn test_jwt_invalid_secret() {
        let secret = "test_secret_key_that_is_long_enough";
        let wrong_secret = "wrong_secret_that_is_also_long_enough";

        let token = JwtAuth::create_token(1, "bob", false, 0, true, secret, 1)
            .expect("Should create token");

        let result = JwtAuth::verify_token(&token, wrong_secret);
        assert!(result.is_err());
    }
}
