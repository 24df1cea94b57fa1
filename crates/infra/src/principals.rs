use async_trait::async_trait;

use workhub_auth::{Principal, PrincipalStore, Role, StoreError};
use workhub_core::{CompanyId, UserId};

/// Field-wise changes to a principal. `None` leaves the field untouched;
/// `company_id: Some(None)` clears the primary company.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrincipalUpdate {
    pub identity: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub company_id: Option<Option<CompanyId>>,
    pub secret_hash: Option<String>,
}

impl PrincipalUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Administrative operations on principals that the auth core never needs.
#[async_trait]
pub trait PrincipalAdmin: PrincipalStore {
    /// All principals in creation order.
    async fn list(&self) -> Result<Vec<Principal>, StoreError>;

    /// Clear the primary company of every principal homed in `company_id`.
    async fn detach_company(&self, company_id: CompanyId) -> Result<u64, StoreError>;

    /// Apply `changes`; `Ok(None)` when no principal has `id`. A new identity
    /// that belongs to someone else fails with [`StoreError::UniqueViolation`].
    async fn update(&self, id: UserId, changes: PrincipalUpdate) -> Result<Option<Principal>, StoreError>;

    async fn delete(&self, id: UserId) -> Result<bool, StoreError>;
}
