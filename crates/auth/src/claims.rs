use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use workhub_core::{CompanyId, UserId};

use crate::{Principal, Role};

/// Claims embedded in a Workhub bearer token.
///
/// Timestamps travel as whole seconds since the epoch (`iat`/`exp`), so
/// [`Claims::for_principal`] truncates sub-second precision up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the login identity (email).
    pub sub: String,

    /// Principal identifier.
    #[serde(rename = "uid")]
    pub principal_id: UserId,

    pub role: Role,

    /// Primary company of the principal at issue time.
    #[serde(rename = "cid", default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<CompanyId>,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    /// Build claims for `principal`, valid for `ttl` starting at `now`.
    pub fn for_principal(principal: &Principal, now: DateTime<Utc>, ttl: Duration) -> Self {
        let issued_at = now.trunc_subsecs(0);
        Self {
            sub: principal.identity.clone(),
            principal_id: principal.id,
            role: principal.role,
            company_id: principal.company_id,
            issued_at,
            expires_at: issued_at + ttl,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate the time window of `claims` at `now`.
///
/// A token is accepted strictly before `expires_at` and rejected from that
/// instant on. Signature checks happen in [`crate::token`].
pub fn validate_claims(claims: &Claims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn claims(issued: i64, expires: i64) -> Claims {
        Claims {
            sub: "a@x.com".to_string(),
            principal_id: UserId::new(),
            role: Role::Staff,
            company_id: None,
            issued_at: Utc.timestamp_opt(issued, 0).unwrap(),
            expires_at: Utc.timestamp_opt(expires, 0).unwrap(),
        }
    }

    #[test]
    fn accepts_until_the_expiry_instant() {
        let c = claims(1_000, 2_000);
        assert_eq!(validate_claims(&c, Utc.timestamp_opt(1_999, 0).unwrap()), Ok(()));
        assert_eq!(
            validate_claims(&c, Utc.timestamp_opt(2_000, 0).unwrap()),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn rejects_inverted_window() {
        let c = claims(2_000, 2_000);
        assert_eq!(
            validate_claims(&c, Utc.timestamp_opt(1_500, 0).unwrap()),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn serializes_with_compact_claim_names() {
        let c = claims(1_000, 2_000);
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["iat"], 1_000);
        assert_eq!(json["exp"], 2_000);
        assert_eq!(json["role"], "STAFF");
        assert!(json.get("cid").is_none());
        assert_eq!(json["uid"], c.principal_id.to_string());
    }
}
