//! Authenticated user claims

use serde::{Deserialize, Serialize};

use super::enums::Role;
use crate::error::AppError;

/// JWT claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    /// Employee id of the caller
    pub user_id: i32,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    // Authorization checks
    pub fn require_write_assets(&self) -> Result<(), AppError> {
        if self.role.is_it_staff() {
            Ok(())
        } else {
            Err(AppError::Authorization("Insufficient rights to manage assets".to_string()))
        }
    }

    pub fn require_manage_tickets(&self) -> Result<(), AppError> {
        if self.role.is_it_staff() {
            Ok(())
        } else {
            Err(AppError::Authorization("Insufficient rights to manage tickets".to_string()))
        }
    }

    /// Staff see every ticket, employees only their own
    pub fn can_read_ticket(&self, requester_id: i32) -> bool {
        self.role.is_it_staff() || self.user_id == requester_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn claims(role: Role) -> UserClaims {
        let now = Utc::now().timestamp();
        UserClaims {
            sub: "jdoe".to_string(),
            user_id: 42,
            role,
            exp: now + 3600,
            iat: now,
        }
    }

    #[test]
    fn test_token_round_trip() {
        let token = claims(Role::It).create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.user_id, 42);
        assert_eq!(parsed.role, Role::It);
        assert!(UserClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn test_rights() {
        assert!(claims(Role::Admin).require_write_assets().is_ok());
        assert!(claims(Role::Hr).require_write_assets().is_err());
        assert!(claims(Role::Employee).require_manage_tickets().is_err());
        assert!(claims(Role::Employee).can_read_ticket(42));
        assert!(!claims(Role::Manager).can_read_ticket(7));
        assert!(claims(Role::It).can_read_ticket(7));
    }
}
