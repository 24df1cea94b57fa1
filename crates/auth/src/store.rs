//! Collaborator interfaces consumed by the auth core.
//!
//! Concrete implementations (in-memory, Postgres) live in `workhub-infra`.

use async_trait::async_trait;
use thiserror::Error;

use workhub_core::{CompanyId, UserId};

use crate::{NewPrincipal, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store refused a write because a unique key already exists.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A referenced row does not exist (foreign key violation).
    #[error("referenced record missing: {0}")]
    MissingReference(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A principal together with its stored secret hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub principal: Principal,
    pub secret_hash: String,
}

/// Lookup and creation of principals.
///
/// `insert` must enforce identity uniqueness itself and report a duplicate as
/// [`StoreError::UniqueViolation`], so that concurrent registrations cannot
/// both succeed.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<Principal>, StoreError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError>;
    async fn find_credential(&self, identity: &str) -> Result<Option<CredentialRecord>, StoreError>;
    async fn exists_by_identity(&self, identity: &str) -> Result<bool, StoreError>;
    async fn insert(&self, principal: NewPrincipal) -> Result<Principal, StoreError>;
}

/// Existence checks for companies.
#[async_trait]
pub trait CompanyDirectory: Send + Sync {
    async fn company_exists(&self, id: CompanyId) -> Result<bool, StoreError>;
}
