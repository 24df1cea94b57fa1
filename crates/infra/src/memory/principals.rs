use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use workhub_auth::{CredentialRecord, NewPrincipal, Principal, PrincipalStore, StoreError};
use workhub_core::{CompanyId, UserId};

use super::poisoned;
use crate::principals::{PrincipalAdmin, PrincipalUpdate};

#[derive(Debug, Default)]
pub struct InMemoryPrincipalStore {
    inner: RwLock<Vec<CredentialRecord>>,
}

impl InMemoryPrincipalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the active flag of a principal. Returns whether it exists.
    pub fn set_active(&self, id: UserId, active: bool) -> Result<bool, StoreError> {
        let mut rows = self.inner.write().map_err(poisoned)?;
        Ok(rows
            .iter_mut()
            .find(|r| r.principal.id == id)
            .map(|r| r.principal.active = active)
            .is_some())
    }
}

#[async_trait]
impl PrincipalStore for InMemoryPrincipalStore {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<Principal>, StoreError> {
        Ok(self.find_credential(identity).await?.map(|r| r.principal))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError> {
        let rows = self.inner.read().map_err(poisoned)?;
        Ok(rows
            .iter()
            .find(|r| r.principal.id == id)
            .map(|r| r.principal.clone()))
    }

    async fn find_credential(&self, identity: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let rows = self.inner.read().map_err(poisoned)?;
        Ok(rows.iter().find(|r| r.principal.identity == identity).cloned())
    }

    async fn exists_by_identity(&self, identity: &str) -> Result<bool, StoreError> {
        let rows = self.inner.read().map_err(poisoned)?;
        Ok(rows.iter().any(|r| r.principal.identity == identity))
    }

    async fn insert(&self, new: NewPrincipal) -> Result<Principal, StoreError> {
        let mut rows = self.inner.write().map_err(poisoned)?;
        if rows.iter().any(|r| r.principal.identity == new.identity) {
            return Err(StoreError::UniqueViolation(format!("users.email = {}", new.identity)));
        }

        let principal = Principal {
            id: UserId::new(),
            identity: new.identity,
            full_name: new.full_name,
            role: new.role,
            company_id: new.company_id,
            active: new.active,
            created_at: Utc::now(),
        };
        rows.push(CredentialRecord {
            principal: principal.clone(),
            secret_hash: new.secret_hash,
        });
        Ok(principal)
    }
}

#[async_trait]
impl PrincipalAdmin for InMemoryPrincipalStore {
    async fn list(&self) -> Result<Vec<Principal>, StoreError> {
        let rows = self.inner.read().map_err(poisoned)?;
        Ok(rows.iter().map(|r| r.principal.clone()).collect())
    }

    async fn detach_company(&self, company_id: CompanyId) -> Result<u64, StoreError> {
        let mut rows = self.inner.write().map_err(poisoned)?;
        let mut detached = 0;
        for row in rows.iter_mut().filter(|r| r.principal.company_id == Some(company_id)) {
            row.principal.company_id = None;
            detached += 1;
        }
        Ok(detached)
    }

    async fn update(&self, id: UserId, changes: PrincipalUpdate) -> Result<Option<Principal>, StoreError> {
        let mut rows = self.inner.write().map_err(poisoned)?;
        if let Some(identity) = &changes.identity {
            if rows.iter().any(|r| r.principal.identity == *identity && r.principal.id != id) {
                return Err(StoreError::UniqueViolation(format!("users.email = {identity}")));
            }
        }
        let Some(row) = rows.iter_mut().find(|r| r.principal.id == id) else {
            return Ok(None);
        };

        if let Some(identity) = changes.identity {
            row.principal.identity = identity;
        }
        if let Some(full_name) = changes.full_name {
            row.principal.full_name = full_name;
        }
        if let Some(role) = changes.role {
            row.principal.role = role;
        }
        if let Some(active) = changes.active {
            row.principal.active = active;
        }
        if let Some(company_id) = changes.company_id {
            row.principal.company_id = company_id;
        }
        if let Some(secret_hash) = changes.secret_hash {
            row.secret_hash = secret_hash;
        }
        Ok(Some(row.principal.clone()))
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let mut rows = self.inner.write().map_err(poisoned)?;
        let before = rows.len();
        rows.retain(|r| r.principal.id != id);
        Ok(rows.len() != before)
    }
}
