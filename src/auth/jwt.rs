/// JWT Token Generation and Validation
///
/// Signs and verifies access and refresh tokens. Each class has its own
/// symmetric key; a token signed with one key never verifies under the other.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{AccessClaims, Claims, Identity, RefreshClaims, TokenClass, TokenKind};
use crate::configuration::AuthSettings;
use crate::error::{ConfigError, TokenError};

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;
const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// HMAC key material for one token class
#[derive(Clone)]
pub struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKey {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Issues and verifies signed tokens. Immutable once built.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    access_key: SigningKey,
    refresh_key: SigningKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    issuer: String,
}

impl TokenCodec {
    /// Build the codec from validated settings
    ///
    /// # Errors
    /// Returns error if the settings fail validation
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            access_key: SigningKey::from_secret(settings.access_secret.as_bytes()),
            refresh_key: SigningKey::from_secret(settings.refresh_secret.as_bytes()),
            access_ttl: Duration::seconds(settings.access_token_expiry),
            refresh_ttl: Duration::seconds(settings.refresh_token_expiry),
            issuer: settings.issuer.clone(),
        })
    }

    pub fn key(&self, kind: TokenKind) -> &SigningKey {
        match kind {
            TokenKind::Access => &self.access_key,
            TokenKind::Refresh => &self.refresh_key,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Sign an access token for `identity`, expiring `access_ttl` after `now`
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if encoding fails
    pub fn issue_access(&self, identity: &Identity, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = AccessClaims::new(identity, now, self.access_ttl, &self.issuer);
        self.sign(&claims)
    }

    /// Sign a refresh token for `identity`, expiring `refresh_ttl` after `now`
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if encoding fails
    pub fn issue_refresh(&self, identity: &Identity, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = RefreshClaims::new(identity, now, self.refresh_ttl, &self.issuer);
        self.sign(&claims)
    }

    fn sign<C: TokenClass>(&self, claims: &Claims<C>) -> Result<String, TokenError> {
        encode(&Header::new(SIGNING_ALGORITHM), claims, &self.key(C::KIND).encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.verify_access_at(token, Utc::now())
    }

    pub fn verify_access_at(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, TokenError> {
        self.verify(token, &self.access_key, now)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.verify_refresh_at(token, Utc::now())
    }

    pub fn verify_refresh_at(&self, token: &str, now: DateTime<Utc>) -> Result<RefreshClaims, TokenError> {
        self.verify(token, &self.refresh_key, now)
    }

    /// Validate a token under `key` and extract its claims
    ///
    /// Checks, in order: algorithm is HMAC, signature, issuer and claim
    /// shape, token class, then expiry against `now` with no leeway.
    ///
    /// # Errors
    /// - `UnexpectedAlgorithm` for any non-HMAC `alg`
    /// - `Malformed` for bad encoding, bad signature, wrong issuer, missing
    ///   or mistyped claims, or a token of the other class
    /// - `Expired` once `now >= exp`
    pub fn verify<C: TokenClass>(
        &self,
        token: &str,
        key: &SigningKey,
        now: DateTime<Utc>,
    ) -> Result<Claims<C>, TokenError> {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.leeway = 0;
        // Expiry is checked below against the caller's clock
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.set_issuer(&[&self.issuer]);

        let claims = decode::<Claims<C>>(token, &key.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::warn!(token_class = C::KIND.as_str(), "JWT validation error: {}", e);
                match e.kind() {
                    ErrorKind::InvalidAlgorithm
                    | ErrorKind::InvalidAlgorithmName
                    | ErrorKind::MissingAlgorithm => TokenError::UnexpectedAlgorithm,
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Malformed,
                }
            })?;

        if claims.token_use != C::KIND {
            tracing::warn!(
                expected = C::KIND.as_str(),
                found = claims.token_use.as_str(),
                "Token presented for the wrong class"
            );
            return Err(TokenError::Malformed);
        }

        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const RS256_HEADER: &str = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9";
    const NONE_HEADER: &str = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0";

    fn get_test_settings() -> AuthSettings {
        let mut settings = AuthSettings::new(
            "access-secret-key-at-least-32-characters",
            "refresh-secret-key-at-least-32-characters",
        );
        settings.issuer = "test".to_string();
        settings
    }

    fn codec() -> TokenCodec {
        TokenCodec::from_settings(&get_test_settings()).expect("Failed to build codec")
    }

    fn identity() -> Identity {
        Identity::new(Uuid::new_v4(), "ursula", Some("ursula@example.com".to_string()))
    }

    fn swap_header(token: &str, header: &str) -> String {
        let rest = token.split_once('.').map(|(_, rest)| rest).unwrap();
        format!("{}.{}", header, rest)
    }

    #[test]
    fn test_generate_and_validate_access_token() {
        let codec = codec();
        let identity = identity();

        let token = codec.issue_access(&identity, Utc::now()).expect("Failed to generate token");
        let claims = codec.verify_access(&token).expect("Failed to validate token");

        assert_eq!(claims.identity(), identity);
        assert_eq!(claims.iss, "test");
        assert_eq!(claims.token_use, TokenKind::Access);
    }

    #[test]
    fn test_generate_and_validate_refresh_token() {
        let codec = codec();
        let identity = identity();

        let token = codec.issue_refresh(&identity, Utc::now()).unwrap();
        let claims = codec.verify_refresh(&token).unwrap();

        assert_eq!(claims.identity(), identity);
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_keys_are_not_interchangeable() {
        let codec = codec();
        let identity = identity();
        let access = codec.issue_access(&identity, Utc::now()).unwrap();
        let refresh = codec.issue_refresh(&identity, Utc::now()).unwrap();

        assert_eq!(codec.verify_refresh(&access), Err(TokenError::Malformed));
        assert_eq!(codec.verify_access(&refresh), Err(TokenError::Malformed));
    }

    #[test]
    fn test_class_tag_checked_even_under_the_right_key() {
        let codec = codec();
        let refresh = codec.issue_refresh(&identity(), Utc::now()).unwrap();

        // A refresh token verified as access claims under the refresh key
        let result = codec.verify::<crate::auth::claims::Access>(
            &refresh,
            codec.key(TokenKind::Refresh),
            Utc::now(),
        );

        assert_eq!(result, Err(TokenError::Malformed));
    }

    #[test]
    fn test_access_token_expires_after_fifteen_minutes() {
        let codec = codec();
        let issued_at = Utc::now();
        let token = codec.issue_access(&identity(), issued_at).unwrap();

        let just_before = issued_at + Duration::minutes(15) - Duration::seconds(1);
        assert!(codec.verify_access_at(&token, just_before).is_ok());

        let at_expiry = issued_at + Duration::minutes(15);
        assert_eq!(codec.verify_access_at(&token, at_expiry), Err(TokenError::Expired));
    }

    #[test]
    fn test_refresh_token_expires_after_seven_days() {
        let codec = codec();
        let issued_at = Utc::now();
        let token = codec.issue_refresh(&identity(), issued_at).unwrap();

        assert!(codec.verify_refresh_at(&token, issued_at + Duration::days(6)).is_ok());
        assert_eq!(
            codec.verify_refresh_at(&token, issued_at + Duration::days(7)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_invalid_token() {
        assert_eq!(codec().verify_access("invalid.token.here"), Err(TokenError::Malformed));
        assert_eq!(codec().verify_access(""), Err(TokenError::Malformed));
    }

    #[test]
    fn test_tampered_token() {
        let codec = codec();
        let token = codec.issue_access(&identity(), Utc::now()).unwrap();

        let tampered = format!("{}X", token);

        assert_eq!(codec.verify_access(&tampered), Err(TokenError::Malformed));
    }

    #[test]
    fn test_wrong_issuer() {
        let token = codec().issue_access(&identity(), Utc::now()).unwrap();

        let mut settings = get_test_settings();
        settings.issuer = "wrong-issuer".to_string();
        let other = TokenCodec::from_settings(&settings).unwrap();

        assert_eq!(other.verify_access(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn test_non_hmac_algorithm_rejected() {
        let codec = codec();
        let token = codec.issue_access(&identity(), Utc::now()).unwrap();

        let substituted = swap_header(&token, RS256_HEADER);

        assert_eq!(codec.verify_access(&substituted), Err(TokenError::UnexpectedAlgorithm));
    }

    #[test]
    fn test_unsigned_token_rejected() {
        let codec = codec();
        let token = codec.issue_access(&identity(), Utc::now()).unwrap();
        let payload = token.split('.').nth(1).unwrap();

        let unsigned = format!("{}.{}.", NONE_HEADER, payload);

        assert!(codec.verify_access(&unsigned).is_err());
    }

    #[test]
    fn test_other_hmac_variant_accepted_with_the_right_key() {
        let codec = codec();
        let claims = AccessClaims::new(&identity(), Utc::now(), Duration::minutes(15), "test");
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"access-secret-key-at-least-32-characters"),
        )
        .unwrap();

        assert_eq!(codec.verify_access(&token).unwrap(), claims);
    }

    #[test]
    fn test_missing_claim_is_malformed() {
        #[derive(serde::Serialize)]
        struct Partial {
            user_id: Uuid,
            exp: i64,
            iss: String,
        }

        let token = encode(
            &Header::new(Algorithm::HS256),
            &Partial {
                user_id: Uuid::new_v4(),
                exp: (Utc::now() + Duration::minutes(5)).timestamp(),
                iss: "test".to_string(),
            },
            &EncodingKey::from_secret(b"access-secret-key-at-least-32-characters"),
        )
        .unwrap();

        assert_eq!(codec().verify_access(&token), Err(TokenError::Malformed));
    }
}
