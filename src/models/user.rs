//! Signed-in user identity

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Claims of a bearer token issued by the external auth service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// Owner key used to scope devices and realtime subscriptions
    pub sub: Uuid,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: i64,
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

    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator rights required".to_string()))
        }
    }

    /// Owners may act on their own devices, administrators on any
    pub fn require_owner(&self, owner_id: Uuid) -> Result<(), AppError> {
        if self.sub == owner_id || self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Not the owner of this device".to_string()))
        }
    }
}
