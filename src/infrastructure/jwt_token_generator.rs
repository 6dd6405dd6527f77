use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::domain::{
    error::DomainError,
    models::user::{Profile, UserId},
    services::token_service::{IssuedToken, TokenGenerator, VerifiedToken},
};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,   // Subject (user ID)
    email: String, // Sign-in email
    exp: i64,      // Expiration time
    iat: i64,      // Issued at
}

#[derive(Clone)]
pub struct JwtTokenGenerator {
    secret: String,
    expiration_hours: i64,
}

impl JwtTokenGenerator {
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            expiration_hours: 24, // 24h
        }
    }

    pub fn with_expiration(secret: String, expiration_hours: i64) -> Self {
        Self {
            secret,
            expiration_hours,
        }
    }
}

impl TokenGenerator for JwtTokenGenerator {
    fn generate(&self, profile: &Profile) -> Result<IssuedToken, DomainError> {
        let now = Utc::now();
        let exp = Duration::try_hours(self.expiration_hours)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                DomainError::Token(format!(
                    "Token lifetime out of range: {}h",
                    self.expiration_hours
                ))
            })?;

        let claims = Claims {
            sub: profile.id().to_string(),
            email: profile.email().to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| DomainError::Token(format!("Failed to generate token: {}", e)))?;

        Ok(IssuedToken {
            token,
            expires_at: exp,
        })
    }

    fn verify(&self, token: &str) -> Result<VerifiedToken, DomainError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => DomainError::TokenExpired,
            _ => DomainError::InvalidCredentials,
        })?;

        let claims = data.claims;
        let user_id = UserId::parse(&claims.sub).ok_or(DomainError::InvalidCredentials)?;
        let expires_at =
            DateTime::from_timestamp(claims.exp, 0).ok_or(DomainError::InvalidCredentials)?;

        Ok(VerifiedToken {
            user_id,
            email: claims.email,
            expires_at,
        })
    }
}
