//! JWT token issuing and verification.
//!
//! Access and refresh tokens share one claim shape and one HMAC secret. Both
//! are stateless: validity is signature plus expiry. The refresh endpoint
//! additionally consults the revocation table by `jti`.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived bearer token presented on protected calls
    Access,
    /// Longer-lived token used only to mint a new access token
    Refresh,
}

/// JWT claims carried by both token types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Identity claim
    pub email: String,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// JWT ID, used as the revocation key
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Default access token lifetime: 10 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 600;

/// Default refresh token lifetime: 24 hours
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 86_400;

/// Longest lifetime a caller may request: 100 years
pub const MAX_TOKEN_DURATION_SECS: u64 = 100 * 365 * 86_400;

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: u64,
    /// Lifetime in seconds
    pub duration: u64,
}

/// Access and refresh token minted together by `issue`.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Why a presented token was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    /// No token supplied
    Missing,
    /// Well-formed and correctly signed, but past its expiry
    Expired,
    /// Bad signature, malformed, or the wrong token type
    Invalid,
}

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Issue an access/refresh pair for `email`.
    /// `None` lifetimes use the defaults (600s access, 86400s refresh).
    pub fn issue(
        &self,
        email: &str,
        access_ttl: Option<u64>,
        refresh_ttl: Option<u64>,
    ) -> Result<TokenPair, JwtError> {
        let access = self.sign(
            email,
            TokenType::Access,
            access_ttl.unwrap_or(ACCESS_TOKEN_DURATION_SECS),
        )?;
        let refresh = self.sign(
            email,
            TokenType::Refresh,
            refresh_ttl.unwrap_or(REFRESH_TOKEN_DURATION_SECS),
        )?;
        Ok(TokenPair { access, refresh })
    }

    /// Issue a single access token with the default lifetime.
    pub fn issue_access(&self, email: &str) -> Result<IssuedToken, JwtError> {
        self.sign(email, TokenType::Access, ACCESS_TOKEN_DURATION_SECS)
    }

    fn sign(
        &self,
        email: &str,
        token_type: TokenType,
        duration: u64,
    ) -> Result<IssuedToken, JwtError> {
        let now = now_secs()?;
        let jti = uuid::Uuid::new_v4().to_string();
        let exp = now
            .checked_add(duration)
            .filter(|exp| i64::try_from(*exp).is_ok())
            .ok_or(JwtError::Lifetime(duration))?;

        let claims = Claims {
            email: email.to_string(),
            token_type,
            jti: jti.clone(),
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(IssuedToken {
            token,
            jti,
            expires_at: exp,
            duration,
        })
    }

    /// Verify an access token and return its claims.
    pub fn verify_access(&self, token: Option<&str>) -> Result<Claims, VerifyError> {
        self.verify(token, TokenType::Access)
    }

    /// Verify a refresh token and return its claims.
    pub fn verify_refresh(&self, token: Option<&str>) -> Result<Claims, VerifyError> {
        self.verify(token, TokenType::Refresh)
    }

    fn verify(&self, token: Option<&str>, expected: TokenType) -> Result<Claims, VerifyError> {
        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => return Err(VerifyError::Missing),
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::Expired,
                _ => VerifyError::Invalid,
            })?;

        if token_data.claims.token_type != expected {
            return Err(VerifyError::Invalid);
        }

        Ok(token_data.claims)
    }
}

/// Current Unix time in seconds.
pub fn now_secs() -> Result<u64, JwtError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JwtError::TimeError)?
        .as_secs())
}

/// Errors that can occur while signing tokens.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
    /// Requested lifetime puts the expiry out of range
    Lifetime(u64),
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::Lifetime(secs) => write!(f, "Token lifetime out of range: {}s", secs),
        }
    }
}

impl std::error::Error for JwtError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_with_exp(secret: &[u8], token_type: TokenType, iat: u64, exp: u64) -> String {
        let claims = Claims {
            email: "alice@example.com".to_string(),
            token_type,
            jti: "jti-1".to_string(),
            iat,
            exp,
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    #[test]
    fn test_issue_and_verify_pair() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        let pair = config.issue("alice@example.com", None, None).unwrap();
        assert_eq!(pair.access.duration, ACCESS_TOKEN_DURATION_SECS);
        assert_eq!(pair.refresh.duration, REFRESH_TOKEN_DURATION_SECS);

        let access = config.verify_access(Some(&pair.access.token)).unwrap();
        assert_eq!(access.email, "alice@example.com");
        assert_eq!(access.token_type, TokenType::Access);
        assert_eq!(access.exp - access.iat, ACCESS_TOKEN_DURATION_SECS);

        let refresh = config.verify_refresh(Some(&pair.refresh.token)).unwrap();
        assert_eq!(refresh.email, "alice@example.com");
        assert_eq!(refresh.jti, pair.refresh.jti);
    }

    #[test]
    fn test_ttl_overrides() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        let pair = config.issue("bob@example.com", Some(30), Some(120)).unwrap();
        assert_eq!(pair.access.duration, 30);
        assert_eq!(pair.refresh.duration, 120);

        let claims = config.verify_refresh(Some(&pair.refresh.token)).unwrap();
        assert_eq!(claims.exp - claims.iat, 120);
    }

    #[test]
    fn test_out_of_range_lifetime_is_an_error() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        let result = config.issue("alice@example.com", Some(u64::MAX), None);
        assert!(matches!(result, Err(JwtError::Lifetime(u64::MAX))));

        let result = config.issue("alice@example.com", None, Some(i64::MAX as u64));
        assert!(matches!(result, Err(JwtError::Lifetime(_))));

        let pair = config
            .issue("alice@example.com", Some(MAX_TOKEN_DURATION_SECS), None)
            .unwrap();
        assert_eq!(pair.access.duration, MAX_TOKEN_DURATION_SECS);
    }

    #[test]
    fn test_pair_tokens_are_independent() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");
        let pair = config.issue("alice@example.com", None, None).unwrap();

        assert_ne!(pair.access.token, pair.refresh.token);
        assert_ne!(pair.access.jti, pair.refresh.jti);
    }

    #[test]
    fn test_wrong_token_type_rejected() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");
        let pair = config.issue("alice@example.com", None, None).unwrap();

        assert_eq!(
            config.verify_refresh(Some(&pair.access.token)).unwrap_err(),
            VerifyError::Invalid
        );
        assert_eq!(
            config.verify_access(Some(&pair.refresh.token)).unwrap_err(),
            VerifyError::Invalid
        );
    }

    #[test]
    fn test_missing_token() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        assert_eq!(config.verify_access(None).unwrap_err(), VerifyError::Missing);
        assert_eq!(
            config.verify_refresh(Some("")).unwrap_err(),
            VerifyError::Missing
        );
    }

    #[test]
    fn test_malformed_token() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        assert_eq!(
            config.verify_access(Some("invalid-token")).unwrap_err(),
            VerifyError::Invalid
        );
    }

    #[test]
    fn test_wrong_secret() {
        let config1 = JwtConfig::new(b"secret-1");
        let config2 = JwtConfig::new(b"secret-2");

        let pair = config1.issue("alice@example.com", None, None).unwrap();

        assert_eq!(
            config2.verify_access(Some(&pair.access.token)).unwrap_err(),
            VerifyError::Invalid
        );
    }

    #[test]
    fn test_expired_token() {
        let secret = b"test-secret";
        let now = now_secs().unwrap();

        // Expired 50 seconds ago
        let token = signed_with_exp(secret, TokenType::Access, now - 100, now - 50);

        let config = JwtConfig::new(secret);
        assert_eq!(
            config.verify_access(Some(&token)).unwrap_err(),
            VerifyError::Expired
        );
    }

    #[test]
    fn test_expired_token_with_bad_signature_is_invalid() {
        let now = now_secs().unwrap();
        let token = signed_with_exp(b"other-secret", TokenType::Refresh, now - 100, now - 50);

        let config = JwtConfig::new(b"test-secret");
        assert_eq!(
            config.verify_refresh(Some(&token)).unwrap_err(),
            VerifyError::Invalid
        );
    }

    #[test]
    fn test_unique_jti_per_token() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        let first = config.issue("alice@example.com", None, None).unwrap();
        let second = config.issue("alice@example.com", None, None).unwrap();

        assert_ne!(
            first.refresh.jti, second.refresh.jti,
            "Each refresh token should have a unique jti"
        );
    }
}
