use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use workhub_auth::StoreError;
use workhub_core::{CompanyId, UserId};

use super::poisoned;
use crate::membership::{MembershipLink, MembershipStore};

#[derive(Debug, Default)]
pub struct InMemoryMembershipStore {
    inner: RwLock<Vec<MembershipLink>>,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn insert(&self, company_id: CompanyId, user_id: UserId) -> Result<MembershipLink, StoreError> {
        let mut links = self.inner.write().map_err(poisoned)?;
        if links.iter().any(|l| l.company_id == company_id && l.user_id == user_id) {
            return Err(StoreError::UniqueViolation(format!(
                "company_users ({company_id}, {user_id})"
            )));
        }

        let link = MembershipLink {
            company_id,
            user_id,
            created_at: Utc::now(),
        };
        links.push(link.clone());
        Ok(link)
    }

    async fn exists(&self, company_id: CompanyId, user_id: UserId) -> Result<bool, StoreError> {
        let links = self.inner.read().map_err(poisoned)?;
        Ok(links.iter().any(|l| l.company_id == company_id && l.user_id == user_id))
    }

    async fn user_ids(&self, company_id: CompanyId) -> Result<Vec<UserId>, StoreError> {
        let links = self.inner.read().map_err(poisoned)?;
        Ok(links
            .iter()
            .filter(|l| l.company_id == company_id)
            .map(|l| l.user_id)
            .collect())
    }

    async fn delete_by_company(&self, company_id: CompanyId) -> Result<u64, StoreError> {
        let mut links = self.inner.write().map_err(poisoned)?;
        let before = links.len();
        links.retain(|l| l.company_id != company_id);
        Ok((before - links.len()) as u64)
    }

    async fn delete_by_user(&self, user_id: UserId) -> Result<u64, StoreError> {
        let mut links = self.inner.write().map_err(poisoned)?;
        let before = links.len();
        links.retain(|l| l.user_id != user_id);
        Ok((before - links.len()) as u64)
    }
}
