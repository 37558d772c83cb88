/// Shared token module for the catalog services
///
/// Asymmetric identity boundary: the identity service signs RS256 tokens
/// with its private key; every other service verifies them locally against
/// the configured public key and never calls identity per request.
///
/// ## Security design
///
/// - **RS256 only**: no symmetric algorithms, preventing algorithm
///   confusion attacks
/// - **No hardcoded keys**: PEM material comes from configuration
/// - **Injected components**: issuer and verifier are plain values owned by
///   the process entry point, so tests construct their own
pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT algorithm used by every service
const JWT_ALGORITHM: Algorithm = Algorithm::RS256;

const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Role claim carried by every token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            other => Err(AuthError::InvalidToken(format!("unknown role: {other}"))),
        }
    }
}

/// Claims carried by catalog access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    pub username: String,
    pub role: Role,
    /// Issued at (unix timestamp)
    pub iat: i64,
    /// Expiration (unix timestamp)
    pub exp: i64,
}

/// Signs access tokens; lives only in the identity service.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn from_rsa_pem(private_key_pem: &str) -> AuthResult<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| AuthError::InvalidKey(format!("failed to parse RSA private key: {e}")))?;
        Ok(Self {
            encoding_key,
            ttl: Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn token_ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue(&self, user_id: Uuid, username: &str, role: Role) -> AuthResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(JWT_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidToken(format!("failed to sign token: {e}")))
    }
}

/// Verifies access tokens; constructed from the public key in every service.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
}

impl TokenVerifier {
    pub fn from_rsa_pem(public_key_pem: &str) -> AuthResult<Self> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| AuthError::InvalidKey(format!("failed to parse RSA public key: {e}")))?;
        Ok(Self { decoding_key })
    }

    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let validation = Validation::new(JWT_ALGORITHM);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2048-bit RSA test keypair, used only by this module's tests.
    const TEST_PRIVATE_KEY: &str = include_str!("../test_keys/private.pem");
    const TEST_PUBLIC_KEY: &str = include_str!("../test_keys/public.pem");

    #[test]
    fn issue_and_verify_round_trip() {
        let issuer = TokenIssuer::from_rsa_pem(TEST_PRIVATE_KEY).unwrap();
        let verifier = TokenVerifier::from_rsa_pem(TEST_PUBLIC_KEY).unwrap();

        let user_id = Uuid::new_v4();
        let token = issuer.issue(user_id, "admin", Role::Admin).unwrap();
        let claims = verifier.verify(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.username, "admin");
        assert_eq!(claims.role, Role::Admin);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let issuer = TokenIssuer::from_rsa_pem(TEST_PRIVATE_KEY).unwrap();
        let verifier = TokenVerifier::from_rsa_pem(TEST_PUBLIC_KEY).unwrap();

        let mut token = issuer.issue(Uuid::new_v4(), "admin", Role::Admin).unwrap();
        token.push('x');
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let verifier = TokenVerifier::from_rsa_pem(TEST_PUBLIC_KEY).unwrap();
        assert!(verifier.verify("not-a-token").is_err());
    }

    #[test]
    fn role_serializes_uppercase() {
        assert_eq!(serde_json::to_value(Role::Admin).unwrap(), "ADMIN");
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
        assert!("SUPERUSER".parse::<Role>().is_err());
    }
}
