//! Bearer token minting and verification.
//!
//! Tokens are compact JWS strings (HS256 by default) carrying [`Claims`].
//! The signing primitive sits behind [`Signer`]; [`TokenCodec`] layers the
//! structural check and the clock-driven expiry check on top of it.
//!
//! Verification failures of every kind collapse into [`TokenInvalid`]. The
//! specific cause is only logged at debug level.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::{Claims, Principal, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("signing key must not be empty")]
    EmptyKey,

    #[error("claims rejected: {0}")]
    InvalidClaims(String),

    #[error("failed to encode token: {0}")]
    Encode(String),

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("signature mismatch")]
    BadSignature,
}

/// Signs serialized claims and verifies signed tokens.
///
/// Implementations only check structure and signature; expiry is the codec's
/// job so that the clock stays injectable.
pub trait Signer: Send + Sync {
    fn sign(&self, claims: &Claims) -> Result<String, SignerError>;
    fn verify(&self, token: &str) -> Result<Claims, SignerError>;
}

/// HMAC-SHA256 signer over a process-wide symmetric key.
pub struct Hs256Signer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Hs256Signer {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, SignerError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(SignerError::EmptyKey);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::new();

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        })
    }
}

impl core::fmt::Debug for Hs256Signer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Signer").finish_non_exhaustive()
    }
}

impl Signer for Hs256Signer {
    fn sign(&self, claims: &Claims) -> Result<String, SignerError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| SignerError::Encode(e.to_string()))
    }

    fn verify(&self, token: &str) -> Result<Claims, SignerError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => SignerError::BadSignature,
                _ => SignerError::Malformed(e.to_string()),
            })
    }
}

/// Uniform verification failure.
///
/// Deliberately carries no detail: malformed, forged and expired tokens are
/// indistinguishable to the caller.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid token")]
pub struct TokenInvalid;

/// Mints and verifies bearer tokens. Stateless and safe to share.
#[derive(Clone)]
pub struct TokenCodec {
    signer: Arc<dyn Signer>,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(signer: Arc<dyn Signer>, ttl: Duration) -> Self {
        Self { signer, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign `claims` as-is.
    pub fn mint(&self, claims: &Claims) -> Result<String, SignerError> {
        if claims.expires_at <= claims.issued_at {
            return Err(SignerError::InvalidClaims(
                "expires_at must be after issued_at".to_string(),
            ));
        }
        self.signer.sign(claims)
    }

    /// Build claims for `principal` at `now` with the configured TTL and sign them.
    pub fn issue_for(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<(String, Claims), SignerError> {
        let claims = Claims::for_principal(principal, now, self.ttl);
        let token = self.mint(&claims)?;
        Ok((token, claims))
    }

    /// Verify structure, then signature, then expiry at `now`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenInvalid> {
        if !is_well_formed(token) {
            tracing::debug!(reason = "malformed", "token rejected");
            return Err(TokenInvalid);
        }

        let claims = self.signer.verify(token).map_err(|e| {
            tracing::debug!(reason = %e, "token rejected");
            TokenInvalid
        })?;

        validate_claims(&claims, now).map_err(|e| {
            tracing::debug!(reason = %e, principal_id = %claims.principal_id, "token rejected");
            TokenInvalid
        })?;

        Ok(claims)
    }
}

impl core::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenCodec").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

/// Three non-empty base64url segments separated by dots.
fn is_well_formed(token: &str) -> bool {
    let mut segments = 0;
    for segment in token.split('.') {
        segments += 1;
        if segment.is_empty()
            || !segment
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return false;
        }
    }
    segments == 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use workhub_core::{CompanyId, UserId};

    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_.";

    fn codec(secret: &str) -> TokenCodec {
        TokenCodec::new(Arc::new(Hs256Signer::new(secret).unwrap()), Duration::hours(1))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn claims(issued: i64, ttl: i64) -> Claims {
        Claims {
            sub: "a@x.com".to_string(),
            principal_id: UserId::new(),
            role: Role::Staff,
            company_id: Some(CompanyId::new()),
            issued_at: at(issued),
            expires_at: at(issued + ttl),
        }
    }

    #[test]
    fn verify_returns_minted_claims() {
        let codec = codec("k1");
        let c = claims(1_700_000_000, 3_600);
        let token = codec.mint(&c).unwrap();
        assert_eq!(codec.verify(&token, at(1_700_000_001)), Ok(c));
    }

    #[test]
    fn token_signed_with_other_key_is_invalid() {
        let c = claims(1_700_000_000, 3_600);
        let token = codec("k1").mint(&c).unwrap();
        assert_eq!(codec("k2").verify(&token, at(1_700_000_001)), Err(TokenInvalid));
    }

    #[test]
    fn mint_rejects_inverted_window() {
        let c = claims(1_700_000_000, 0);
        assert!(matches!(codec("k1").mint(&c), Err(SignerError::InvalidClaims(_))));
    }

    #[test]
    fn garbage_is_invalid() {
        let codec = codec("k1");
        for token in ["", "abc", "a.b", "a..c", "a.b.c.d", "Bearer x.y.z", "a.b.c"] {
            assert_eq!(codec.verify(token, at(0)), Err(TokenInvalid), "{token:?}");
        }
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(Hs256Signer::new(""), Err(SignerError::EmptyKey)));
    }

    #[test]
    fn issue_for_uses_configured_ttl() {
        let codec = codec("k1");
        let principal = Principal {
            id: UserId::new(),
            identity: "a@x.com".to_string(),
            full_name: "A".to_string(),
            role: Role::Manager,
            company_id: None,
            active: true,
            created_at: at(0),
        };
        let (token, c) = codec.issue_for(&principal, at(1_000)).unwrap();
        assert_eq!(c.expires_at - c.issued_at, Duration::hours(1));
        assert_eq!(c.role, Role::Manager);
        assert_eq!(codec.verify(&token, at(1_001)).unwrap().principal_id, principal.id);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Verification succeeds exactly while now < expires_at.
        #[test]
        fn accepted_iff_before_expiry(
            issued in 1_600_000_000i64..1_900_000_000i64,
            ttl in 1i64..200_000i64,
            offset in -200_000i64..400_000i64,
        ) {
            let codec = codec("prop-key");
            let c = claims(issued, ttl);
            let token = codec.mint(&c).unwrap();
            let now = at(issued + offset);

            let result = codec.verify(&token, now);
            if now < c.expires_at {
                prop_assert_eq!(result, Ok(c));
            } else {
                prop_assert_eq!(result, Err(TokenInvalid));
            }
        }

        /// Any single-character mutation of a minted token is rejected.
        #[test]
        fn mutated_token_is_rejected(
            index in any::<prop::sample::Index>(),
            replacement in any::<prop::sample::Index>(),
        ) {
            let codec = codec("prop-key");
            let c = claims(1_700_000_000, 3_600);
            let token = codec.mint(&c).unwrap();

            let mut bytes = token.into_bytes();
            let i = index.index(bytes.len());
            let mut r = ALPHABET[replacement.index(ALPHABET.len())];
            if r == bytes[i] {
                r = if r == b'A' { b'B' } else { b'A' };
            }
            bytes[i] = r;
            let mutated = String::from_utf8(bytes).unwrap();

            prop_assert_eq!(codec.verify(&mutated, at(1_700_000_001)), Err(TokenInvalid));
        }
    }
}
