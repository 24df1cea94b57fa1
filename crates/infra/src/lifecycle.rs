//! Ordered deletion of companies and principals.
//!
//! Nothing cascades implicitly. Deleting a company removes its membership
//! links, then detaches principals homed in it, then removes the company row.
//! Deleting a principal removes its links, then the principal row.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use workhub_auth::{PrincipalStore, StoreError};
use workhub_core::{CompanyId, UserId};

use crate::companies::CompanyStore;
use crate::membership::{LedgerError, MembershipLedger};
use crate::principals::PrincipalAdmin;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Company not found with id: {0}")]
    CompanyNotFound(CompanyId),

    #[error("User not found with id: {0}")]
    UserNotFound(UserId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Deprovisioner {
    ledger: Arc<MembershipLedger>,
    principals: Arc<dyn PrincipalAdmin>,
    companies: Arc<dyn CompanyStore>,
}

impl Deprovisioner {
    pub fn new(
        ledger: Arc<MembershipLedger>,
        principals: Arc<dyn PrincipalAdmin>,
        companies: Arc<dyn CompanyStore>,
    ) -> Self {
        Self {
            ledger,
            principals,
            companies,
        }
    }

    #[instrument(skip(self), fields(company_id = %company_id), err)]
    pub async fn delete_company(&self, company_id: CompanyId) -> Result<(), LifecycleError> {
        if self.companies.find(company_id).await?.is_none() {
            return Err(LifecycleError::CompanyNotFound(company_id));
        }

        let links = self.ledger.remove_all_for_company(company_id).await?;
        let detached = self.principals.detach_company(company_id).await?;

        if !self.companies.delete(company_id).await? {
            return Err(LifecycleError::CompanyNotFound(company_id));
        }

        tracing::info!(links, detached, "company deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    pub async fn delete_principal(&self, user_id: UserId) -> Result<(), LifecycleError> {
        if self.principals.find_by_id(user_id).await?.is_none() {
            return Err(LifecycleError::UserNotFound(user_id));
        }

        let links = self.ledger.remove_all_for_user(user_id).await?;

        if !self.principals.delete(user_id).await? {
            return Err(LifecycleError::UserNotFound(user_id));
        }

        tracing::info!(links, "principal deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::companies::NewCompany;
    use crate::memory::{InMemoryCompanyStore, InMemoryMembershipStore, InMemoryPrincipalStore};
    use workhub_auth::{NewPrincipal, PrincipalStore, Role};

    struct Fixture {
        deprovisioner: Deprovisioner,
        ledger: Arc<MembershipLedger>,
        principals: Arc<InMemoryPrincipalStore>,
        companies: Arc<InMemoryCompanyStore>,
    }

    fn fixture() -> Fixture {
        let principals = Arc::new(InMemoryPrincipalStore::new());
        let companies = Arc::new(InMemoryCompanyStore::new());
        let ledger = Arc::new(MembershipLedger::new(
            Arc::new(InMemoryMembershipStore::new()),
            principals.clone(),
            companies.clone(),
        ));
        let deprovisioner = Deprovisioner::new(ledger.clone(), principals.clone(), companies.clone());
        Fixture {
            deprovisioner,
            ledger,
            principals,
            companies,
        }
    }

    async fn staff(store: &InMemoryPrincipalStore, company_id: Option<CompanyId>) -> UserId {
        store
            .insert(NewPrincipal {
                identity: "u1@x.com".to_string(),
                full_name: "U1".to_string(),
                secret_hash: "x".to_string(),
                role: Role::Staff,
                company_id,
                active: true,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn deleting_company_removes_links_but_keeps_users() {
        let f = fixture();
        let c1 = f.companies.create(NewCompany { name: "C1".into() }).await.unwrap().id;
        let u1 = staff(&f.principals, Some(c1)).await;
        f.ledger.add(c1, u1).await.unwrap();

        f.deprovisioner.delete_company(c1).await.unwrap();

        assert!(!f.ledger.exists_member(c1, u1).await.unwrap());
        assert!(f.companies.find(c1).await.unwrap().is_none());
        let user = f.principals.find_by_id(u1).await.unwrap().unwrap();
        assert_eq!(user.company_id, None);
    }

    #[tokio::test]
    async fn deleting_unknown_company_is_not_found() {
        let f = fixture();
        let id = CompanyId::new();
        assert_eq!(
            f.deprovisioner.delete_company(id).await.unwrap_err(),
            LifecycleError::CompanyNotFound(id)
        );
    }

    #[tokio::test]
    async fn deleting_principal_removes_links_first() {
        let f = fixture();
        let c1 = f.companies.create(NewCompany { name: "C1".into() }).await.unwrap().id;
        let u1 = staff(&f.principals, None).await;
        f.ledger.add(c1, u1).await.unwrap();

        f.deprovisioner.delete_principal(u1).await.unwrap();

        assert!(!f.ledger.exists_member(c1, u1).await.unwrap());
        assert!(f.principals.find_by_id(u1).await.unwrap().is_none());
        assert!(f.companies.find(c1).await.unwrap().is_some());
    }
}
