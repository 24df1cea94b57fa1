//! Secret hashing and credential verification.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::OnceCell;

use crate::{Principal, PrincipalStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("credential hashing failed: {0}")]
pub struct HashError(pub String);

/// One-way, salted, deliberately slow secret hashing.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String, HashError>;

    /// `Ok(false)` on mismatch; `Err` only when the stored hash is unusable.
    fn verify(&self, secret: &str, hash: &str) -> Result<bool, HashError>;
}

/// bcrypt-backed hasher.
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl CredentialHasher for BcryptHasher {
    fn hash(&self, secret: &str) -> Result<String, HashError> {
        bcrypt::hash(secret, self.cost).map_err(|e| HashError(e.to_string()))
    }

    fn verify(&self, secret: &str, hash: &str) -> Result<bool, HashError> {
        bcrypt::verify(secret, hash).map_err(|e| HashError(e.to_string()))
    }
}

/// Hash `secret` on the blocking pool so a slow hasher never stalls an
/// executor worker.
pub async fn hash_secret(hasher: &Arc<dyn CredentialHasher>, secret: &str) -> Result<String, HashError> {
    let hasher = Arc::clone(hasher);
    let secret = secret.to_owned();
    tokio::task::spawn_blocking(move || hasher.hash(&secret))
        .await
        .map_err(|e| HashError(format!("hashing task failed: {e}")))?
}

/// Blocking-pool counterpart of [`CredentialHasher::verify`].
pub async fn verify_secret(
    hasher: &Arc<dyn CredentialHasher>,
    secret: &str,
    hash: &str,
) -> Result<bool, HashError> {
    let hasher = Arc::clone(hasher);
    let (secret, hash) = (secret.to_owned(), hash.to_owned());
    tokio::task::spawn_blocking(move || hasher.verify(&secret, &hash))
        .await
        .map_err(|e| HashError(format!("verification task failed: {e}")))?
}

const DECOY_SECRET: &str = "workhub-decoy-secret";

/// Why a credential check failed. Internal only: callers see
/// [`CredentialError::Rejected`] without the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    UnknownIdentity,
    SecretMismatch,
    UnusableHash,
    Inactive,
}

impl Rejection {
    fn as_str(self) -> &'static str {
        match self {
            Rejection::UnknownIdentity => "unknown identity",
            Rejection::SecretMismatch => "secret mismatch",
            Rejection::UnusableHash => "stored hash unusable",
            Rejection::Inactive => "inactive principal",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("invalid credentials")]
    Rejected,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validates an identity + secret pair against the principal store.
pub struct CredentialVerifier {
    principals: Arc<dyn PrincipalStore>,
    hasher: Arc<dyn CredentialHasher>,
    decoy_hash: OnceCell<Option<String>>,
}

impl CredentialVerifier {
    pub fn new(principals: Arc<dyn PrincipalStore>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self {
            principals,
            hasher,
            decoy_hash: OnceCell::new(),
        }
    }

    pub async fn verify(&self, identity: &str, secret: &str) -> Result<Principal, CredentialError> {
        let Some(record) = self.principals.find_credential(identity).await? else {
            // Burn a comparable amount of work so unknown identities do not
            // answer noticeably faster than wrong secrets.
            if let Some(decoy) = self.decoy_hash().await {
                let _ = verify_secret(&self.hasher, secret, decoy).await;
            }
            return Err(self.reject(identity, Rejection::UnknownIdentity));
        };

        match verify_secret(&self.hasher, secret, &record.secret_hash).await {
            Ok(true) => {}
            Ok(false) => return Err(self.reject(identity, Rejection::SecretMismatch)),
            Err(e) => {
                tracing::error!(error = %e, principal_id = %record.principal.id, "stored secret hash is unusable");
                return Err(self.reject(identity, Rejection::UnusableHash));
            }
        }

        if !record.principal.active {
            return Err(self.reject(identity, Rejection::Inactive));
        }

        Ok(record.principal)
    }

    fn reject(&self, identity: &str, why: Rejection) -> CredentialError {
        tracing::warn!(identity = %identity, reason = why.as_str(), "credential check failed");
        CredentialError::Rejected
    }

    async fn decoy_hash(&self) -> Option<&str> {
        self.decoy_hash
            .get_or_init(|| async { hash_secret(&self.hasher, DECOY_SECRET).await.ok() })
            .await
            .as_deref()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::store::testing::MemoryPrincipals;
    use crate::{NewPrincipal, Role};

    fn hasher() -> Arc<dyn CredentialHasher> {
        Arc::new(BcryptHasher::new(4))
    }

    async fn seeded(active: bool) -> (CredentialVerifier, Arc<MemoryPrincipals>) {
        let store = Arc::new(MemoryPrincipals::default());
        let hasher = hasher();
        store
            .insert(NewPrincipal {
                identity: "a@x.com".to_string(),
                full_name: "A".to_string(),
                secret_hash: hasher.hash("secret1").unwrap(),
                role: Role::Staff,
                company_id: None,
                active,
            })
            .await
            .unwrap();
        (CredentialVerifier::new(store.clone(), hasher), store)
    }

    #[test]
    fn bcrypt_hash_is_salted_and_verifiable() {
        let h = BcryptHasher::new(4);
        let a = h.hash("secret1").unwrap();
        let b = h.hash("secret1").unwrap();
        assert_ne!(a, b);
        assert!(h.verify("secret1", &a).unwrap());
        assert!(!h.verify("secret2", &a).unwrap());
        assert!(h.verify("secret1", "not-a-hash").is_err());
    }

    #[tokio::test]
    async fn correct_secret_returns_principal() {
        let (verifier, _) = seeded(true).await;
        let principal = verifier.verify("a@x.com", "secret1").await.unwrap();
        assert_eq!(principal.identity, "a@x.com");
    }

    #[tokio::test]
    async fn wrong_secret_and_unknown_identity_fail_identically() {
        let (verifier, _) = seeded(true).await;
        let wrong = verifier.verify("a@x.com", "nope").await.unwrap_err();
        let unknown = verifier.verify("b@x.com", "secret1").await.unwrap_err();
        assert_eq!(wrong, CredentialError::Rejected);
        assert_eq!(unknown, wrong);
    }

    #[tokio::test]
    async fn identity_lookup_is_case_sensitive() {
        let (verifier, _) = seeded(true).await;
        let err = verifier.verify("A@x.com", "secret1").await.unwrap_err();
        assert_eq!(err, CredentialError::Rejected);
    }

    /// Stand-in for an expensive hash: the thread sleeps instead of spinning.
    struct SlowHasher {
        inner: BcryptHasher,
        delay: Duration,
    }

    impl CredentialHasher for SlowHasher {
        fn hash(&self, secret: &str) -> Result<String, HashError> {
            self.inner.hash(secret)
        }

        fn verify(&self, secret: &str, hash: &str) -> Result<bool, HashError> {
            std::thread::sleep(self.delay);
            self.inner.verify(secret, hash)
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn verification_leaves_the_executor_free() {
        let store = Arc::new(MemoryPrincipals::default());
        let slow: Arc<dyn CredentialHasher> = Arc::new(SlowHasher {
            inner: BcryptHasher::new(4),
            delay: Duration::from_millis(120),
        });
        store
            .insert(NewPrincipal {
                identity: "a@x.com".to_string(),
                full_name: "A".to_string(),
                secret_hash: slow.hash("secret1").unwrap(),
                role: Role::Staff,
                company_id: None,
                active: true,
            })
            .await
            .unwrap();
        let verifier = CredentialVerifier::new(store, slow);

        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = tokio::spawn({
            let ticks = Arc::clone(&ticks);
            async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        let principal = verifier.verify("a@x.com", "secret1").await.unwrap();
        ticker.abort();

        assert_eq!(principal.identity, "a@x.com");
        // A single-threaded runtime only ticks if the hash ran elsewhere.
        assert!(ticks.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn hash_helpers_run_on_the_blocking_pool() {
        let hasher = hasher();
        let hash = hash_secret(&hasher, "secret1").await.unwrap();
        assert!(verify_secret(&hasher, "secret1", &hash).await.unwrap());
        assert!(!verify_secret(&hasher, "secret2", &hash).await.unwrap());
        assert!(verify_secret(&hasher, "secret1", "not-a-hash").await.is_err());
    }

    #[tokio::test]
    async fn inactive_principal_is_rejected() {
        let (verifier, _) = seeded(false).await;
        let err = verifier.verify("a@x.com", "secret1").await.unwrap_err();
        assert_eq!(err, CredentialError::Rejected);
    }
}
