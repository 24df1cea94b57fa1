//! Company records.
//!
//! Companies are the multi-tenant boundary. This layer keeps them minimal: an
//! id, a unique name and a creation timestamp.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use workhub_auth::{CompanyDirectory, StoreError};
use workhub_core::CompanyId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCompany {
    pub name: String,
}

/// Company persistence.
///
/// Name uniqueness is enforced by the store and reported as
/// [`StoreError::UniqueViolation`]. `list` returns companies in creation order.
#[async_trait]
pub trait CompanyStore: CompanyDirectory {
    async fn create(&self, company: NewCompany) -> Result<Company, StoreError>;
    async fn find(&self, id: CompanyId) -> Result<Option<Company>, StoreError>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Company>, StoreError>;
    async fn list(&self) -> Result<Vec<Company>, StoreError>;

    /// Returns the updated company, or `None` if it does not exist.
    async fn rename(&self, id: CompanyId, name: &str) -> Result<Option<Company>, StoreError>;

    /// Fails with [`StoreError::MissingReference`] on backends that still
    /// hold rows referencing the company.
    async fn delete(&self, id: CompanyId) -> Result<bool, StoreError>;
}
