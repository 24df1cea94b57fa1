//! Company membership ledger.
//!
//! Membership links live in their own association table, independent of the
//! lifecycle of the user and the company they connect. The backing
//! [`MembershipStore`] enforces `(company_id, user_id)` uniqueness itself; the
//! existence check in [`MembershipLedger::add`] only produces a nicer error on
//! the common path.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use workhub_auth::{CompanyDirectory, Principal, PrincipalStore, StoreError};
use workhub_core::{CompanyId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipLink {
    pub company_id: CompanyId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Association table operations.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Must fail with [`StoreError::UniqueViolation`] if the pair exists.
    async fn insert(&self, company_id: CompanyId, user_id: UserId)
    -> Result<MembershipLink, StoreError>;

    async fn exists(&self, company_id: CompanyId, user_id: UserId) -> Result<bool, StoreError>;

    /// Members of `company_id` in insertion order.
    async fn user_ids(&self, company_id: CompanyId) -> Result<Vec<UserId>, StoreError>;

    async fn delete_by_company(&self, company_id: CompanyId) -> Result<u64, StoreError>;

    async fn delete_by_user(&self, user_id: UserId) -> Result<u64, StoreError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Company not found with id: {0}")]
    CompanyNotFound(CompanyId),

    #[error("User not found with id: {0}")]
    UserNotFound(UserId),

    #[error("User {user_id} is already a member of company {company_id}")]
    AlreadyMember {
        company_id: CompanyId,
        user_id: UserId,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct MembershipLedger {
    links: Arc<dyn MembershipStore>,
    principals: Arc<dyn PrincipalStore>,
    companies: Arc<dyn CompanyDirectory>,
}

impl MembershipLedger {
    pub fn new(
        links: Arc<dyn MembershipStore>,
        principals: Arc<dyn PrincipalStore>,
        companies: Arc<dyn CompanyDirectory>,
    ) -> Self {
        Self {
            links,
            principals,
            companies,
        }
    }

    #[instrument(skip(self), fields(company_id = %company_id, user_id = %user_id), err)]
    pub async fn add(&self, company_id: CompanyId, user_id: UserId) -> Result<MembershipLink, LedgerError> {
        if !self.companies.company_exists(company_id).await? {
            return Err(LedgerError::CompanyNotFound(company_id));
        }

        if self.principals.find_by_id(user_id).await?.is_none() {
            return Err(LedgerError::UserNotFound(user_id));
        }

        if self.links.exists(company_id, user_id).await? {
            return Err(LedgerError::AlreadyMember { company_id, user_id });
        }

        let link = match self.links.insert(company_id, user_id).await {
            Ok(link) => link,
            Err(StoreError::UniqueViolation(_)) => return Err(LedgerError::AlreadyMember { company_id, user_id }),
            // One side was deleted after the checks above.
            Err(StoreError::MissingReference(_)) => return Err(self.vanished_side(company_id, user_id).await),
            Err(other) => return Err(other.into()),
        };

        tracing::info!("membership link created");
        Ok(link)
    }

    async fn vanished_side(&self, company_id: CompanyId, user_id: UserId) -> LedgerError {
        match self.companies.company_exists(company_id).await {
            Ok(false) => LedgerError::CompanyNotFound(company_id),
            Ok(true) => LedgerError::UserNotFound(user_id),
            Err(e) => LedgerError::Store(e),
        }
    }

    /// Members of `company_id` in the order they were added.
    ///
    /// Links whose principal has disappeared are skipped.
    pub async fn list_users(&self, company_id: CompanyId) -> Result<Vec<Principal>, LedgerError> {
        let ids = self.links.user_ids(company_id).await?;
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            match self.principals.find_by_id(id).await? {
                Some(p) => users.push(p),
                None => tracing::warn!(company_id = %company_id, user_id = %id, "membership link points at a missing user"),
            }
        }
        Ok(users)
    }

    /// Must run before the company row itself is removed.
    #[instrument(skip(self), fields(company_id = %company_id), err)]
    pub async fn remove_all_for_company(&self, company_id: CompanyId) -> Result<u64, LedgerError> {
        let removed = self.links.delete_by_company(company_id).await?;
        tracing::debug!(removed, "membership links removed");
        Ok(removed)
    }

    /// Must run before the user row itself is removed.
    #[instrument(skip(self), fields(user_id = %user_id), err)]
    pub async fn remove_all_for_user(&self, user_id: UserId) -> Result<u64, LedgerError> {
        let removed = self.links.delete_by_user(user_id).await?;
        tracing::debug!(removed, "membership links removed");
        Ok(removed)
    }

    pub async fn exists_member(&self, company_id: CompanyId, user_id: UserId) -> Result<bool, LedgerError> {
        Ok(self.links.exists(company_id, user_id).await?)
    }
}

impl core::fmt::Debug for MembershipLedger {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MembershipLedger").finish_non_exhaustive()
    }
}
