use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Why a token failed verification. Callers must treat all variants
/// identically: reject the request, never attempt repair.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("token signature is invalid")]
    BadSignature,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Issues and verifies signed identity tokens (HS256, server-held secret).
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_hours: u64,
}

impl TokenService {
    pub fn new(secret: &str, ttl_hours: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_hours,
        }
    }

    /// Produce a signed credential embedding the user id and an expiry.
    pub fn issue(&self, user_id: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + self.ttl_hours as i64 * 3600,
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    /// Verify a credential and return the embedded user id.
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Exact expiry, no clock leeway
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            }
        })?;

        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", 1)
    }

    #[test]
    fn issued_token_verifies_to_original_user_id() {
        let tokens = service();
        let token = tokens.issue("user-123").unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), "user-123");
    }

    #[test]
    fn tokens_for_different_users_differ() {
        let tokens = service();
        let a = tokens.issue("user-a").unwrap();
        let b = tokens.issue("user-b").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = service();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "user-123".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert_eq!(tokens.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let tokens = service();
        let other = TokenService::new("other-secret", 1);
        let token = other.issue("user-123").unwrap();
        assert_eq!(tokens.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let tokens = service();
        let token = tokens.issue("user-123").unwrap();

        // Flip a character in the payload segment
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        let payload = parts[1].clone();
        let flipped = if payload.starts_with('A') { "B" } else { "A" };
        parts[1] = format!("{}{}", flipped, &payload[1..]);
        let tampered = parts.join(".");

        assert!(tokens.verify(&tampered).is_err());
    }

    #[test]
    fn garbage_token_is_malformed() {
        let tokens = service();
        assert_eq!(
            tokens.verify("not-a-token"),
            Err(TokenError::Malformed)
        );
        assert_eq!(tokens.verify(""), Err(TokenError::Malformed));
    }
}
