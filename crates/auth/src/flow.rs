//! Login and registration.
//!
//! Both entry points end by minting a token for a principal that is already
//! committed to the store. Nothing is persisted on the login path, and on the
//! register path the principal is persisted before any token referencing it
//! exists.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use workhub_core::{CompanyId, DomainError, validate};

use crate::credentials::{CredentialError, hash_secret};
use crate::{
    Clock, CompanyDirectory, CredentialHasher, CredentialVerifier, HashError, NewPrincipal,
    Principal, PrincipalStore, Role, SignerError, StoreError, TokenCodec,
};

pub const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad identity or secret. The message is the only thing clients see.
    #[error("Invalid email or password")]
    AuthenticationFailed,

    #[error("Email already exists: {0}")]
    DuplicateIdentity(String),

    #[error("Company not found with id: {0}")]
    CompanyNotFound(CompanyId),

    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error("token signing failed: {0}")]
    Signing(#[from] SignerError),
}

impl From<CredentialError> for AuthError {
    fn from(value: CredentialError) -> Self {
        match value {
            CredentialError::Rejected => AuthError::AuthenticationFailed,
            CredentialError::Store(e) => AuthError::Store(e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub identity: String,
    pub secret: String,
}

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub identity: String,
    pub secret: String,
    pub full_name: String,
    pub company_id: CompanyId,
    pub role: Role,
}

/// Result of a successful login or registration.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub principal: Principal,
}

pub struct AuthenticationFlow {
    principals: Arc<dyn PrincipalStore>,
    companies: Arc<dyn CompanyDirectory>,
    hasher: Arc<dyn CredentialHasher>,
    verifier: CredentialVerifier,
    codec: TokenCodec,
    clock: Arc<dyn Clock>,
}

impl AuthenticationFlow {
    pub fn new(
        principals: Arc<dyn PrincipalStore>,
        companies: Arc<dyn CompanyDirectory>,
        hasher: Arc<dyn CredentialHasher>,
        codec: TokenCodec,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let verifier = CredentialVerifier::new(principals.clone(), hasher.clone());
        Self {
            principals,
            companies,
            hasher,
            verifier,
            codec,
            clock,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    #[tracing::instrument(skip_all, fields(identity = %request.identity))]
    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession, AuthError> {
        let principal = self
            .verifier
            .verify(request.identity.trim(), &request.secret)
            .await?;

        let session = self.session_for(principal)?;
        tracing::info!(principal_id = %session.principal.id, "login succeeded");
        Ok(session)
    }

    #[tracing::instrument(skip_all, fields(identity = %request.identity, company_id = %request.company_id))]
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthSession, AuthError> {
        let identity = validate::identity(&request.identity)?;
        let full_name = validate::non_blank("fullName", &request.full_name)?;
        validate::secret(&request.secret)?;

        if self.principals.exists_by_identity(&identity).await? {
            return Err(AuthError::DuplicateIdentity(identity));
        }

        if !self.companies.company_exists(request.company_id).await? {
            return Err(AuthError::CompanyNotFound(request.company_id));
        }

        let secret_hash = hash_secret(&self.hasher, &request.secret).await?;

        // The store enforces identity uniqueness; a concurrent registration
        // that slipped past the check above lands here.
        let principal = self
            .principals
            .insert(NewPrincipal {
                identity: identity.clone(),
                full_name,
                secret_hash,
                role: request.role,
                company_id: Some(request.company_id),
                active: true,
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => AuthError::DuplicateIdentity(identity),
                StoreError::MissingReference(_) => AuthError::CompanyNotFound(request.company_id),
                other => AuthError::Store(other),
            })?;

        let session = self.session_for(principal)?;
        tracing::info!(principal_id = %session.principal.id, role = %session.principal.role, "principal registered");
        Ok(session)
    }

    fn session_for(&self, principal: Principal) -> Result<AuthSession, AuthError> {
        let (token, claims) = self.codec.issue_for(&principal, self.clock.now())?;
        Ok(AuthSession {
            token,
            token_type: TOKEN_TYPE,
            expires_at: claims.expires_at,
            principal,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::store::testing::{MemoryCompanies, MemoryPrincipals};
    use crate::{BcryptHasher, FixedClock, Hs256Signer};
    use chrono::{Duration, TimeZone};

    struct Fixture {
        flow: AuthenticationFlow,
        principals: Arc<MemoryPrincipals>,
        company: CompanyId,
        clock: Arc<FixedClock>,
    }

    fn fixture() -> Fixture {
        fixture_with_cost(4)
    }

    fn fixture_with_cost(cost: u32) -> Fixture {
        let company = CompanyId::new();
        let principals = Arc::new(MemoryPrincipals::default());
        let clock = Arc::new(FixedClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        let codec = TokenCodec::new(
            Arc::new(Hs256Signer::new("flow-test").unwrap()),
            Duration::minutes(30),
        );
        let flow = AuthenticationFlow::new(
            principals.clone(),
            Arc::new(MemoryCompanies::with(company)),
            Arc::new(BcryptHasher::new(cost)),
            codec,
            clock.clone(),
        );
        Fixture {
            flow,
            principals,
            company,
            clock,
        }
    }

    fn register_request(company_id: CompanyId) -> RegisterRequest {
        RegisterRequest {
            identity: "a@x.com".to_string(),
            secret: "secret1".to_string(),
            full_name: "Alice".to_string(),
            company_id,
            role: Role::Staff,
        }
    }

    #[tokio::test]
    async fn register_persists_then_mints() {
        let f = fixture();
        let session = f.flow.register(register_request(f.company)).await.unwrap();

        assert_eq!(session.token_type, "Bearer");
        assert!(session.principal.active);
        assert_eq!(session.principal.company_id, Some(f.company));

        let stored = f.principals.find_by_identity("a@x.com").await.unwrap().unwrap();
        assert_eq!(stored.id, session.principal.id);

        let claims = f.flow.codec().verify(&session.token, f.clock.now()).unwrap();
        assert_eq!(claims.sub, "a@x.com");
        assert_eq!(claims.principal_id, stored.id);
        assert_eq!(claims.role, Role::Staff);
        assert_eq!(claims.company_id, Some(f.company));
    }

    #[tokio::test]
    async fn register_rejects_duplicate_identity() {
        let f = fixture();
        f.flow.register(register_request(f.company)).await.unwrap();
        let err = f.flow.register(register_request(f.company)).await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateIdentity(ref id) if id == "a@x.com"));
    }

    #[tokio::test]
    async fn register_rejects_unknown_company_without_persisting() {
        let f = fixture();
        let err = f.flow.register(register_request(CompanyId::new())).await.unwrap_err();
        assert!(matches!(err, AuthError::CompanyNotFound(_)));
        assert!(!f.principals.exists_by_identity("a@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn register_validates_input() {
        let f = fixture();
        let mut req = register_request(f.company);
        req.identity = "not-an-email".to_string();
        assert!(matches!(f.flow.register(req).await, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn login_returns_token_for_registered_principal() {
        let f = fixture();
        f.flow.register(register_request(f.company)).await.unwrap();

        let session = f
            .flow
            .login(LoginRequest {
                identity: "a@x.com".to_string(),
                secret: "secret1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(session.expires_at, f.clock.now() + Duration::minutes(30));
        assert!(f.flow.codec().verify(&session.token, f.clock.now()).is_ok());
    }

    #[tokio::test]
    async fn login_failures_share_one_generic_message() {
        let f = fixture();
        f.flow.register(register_request(f.company)).await.unwrap();

        let wrong_secret = f
            .flow
            .login(LoginRequest {
                identity: "a@x.com".to_string(),
                secret: "wrong-secret".to_string(),
            })
            .await
            .unwrap_err();
        let unknown = f
            .flow
            .login(LoginRequest {
                identity: "nobody@x.com".to_string(),
                secret: "secret1".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(wrong_secret, AuthError::AuthenticationFailed));
        assert!(matches!(unknown, AuthError::AuthenticationFailed));
        assert_eq!(wrong_secret.to_string(), "Invalid email or password");
        assert_eq!(unknown.to_string(), wrong_secret.to_string());
    }

    #[tokio::test]
    async fn token_expires_with_the_clock() {
        let f = fixture();
        let session = f.flow.register(register_request(f.company)).await.unwrap();
        f.clock.advance(Duration::minutes(30));
        assert!(f.flow.codec().verify(&session.token, f.clock.now()).is_err());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn bcrypt_work_does_not_starve_other_tasks() {
        let f = fixture_with_cost(10);
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = tokio::spawn({
            let ticks = Arc::clone(&ticks);
            async move {
                loop {
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        f.flow.register(register_request(f.company)).await.unwrap();
        let after_register = ticks.load(Ordering::SeqCst);
        f.flow
            .login(LoginRequest {
                identity: "a@x.com".to_string(),
                secret: "secret1".to_string(),
            })
            .await
            .unwrap();
        let after_login = ticks.load(Ordering::SeqCst);
        ticker.abort();

        assert!(after_register > 0);
        assert!(after_login > after_register);
    }
}
