use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use workhub_auth::{CompanyDirectory, StoreError};
use workhub_core::CompanyId;

use super::poisoned;
use crate::companies::{Company, CompanyStore, NewCompany};

#[derive(Debug, Default)]
pub struct InMemoryCompanyStore {
    inner: RwLock<Vec<Company>>,
}

impl InMemoryCompanyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CompanyDirectory for InMemoryCompanyStore {
    async fn company_exists(&self, id: CompanyId) -> Result<bool, StoreError> {
        let rows = self.inner.read().map_err(poisoned)?;
        Ok(rows.iter().any(|c| c.id == id))
    }
}

#[async_trait]
impl CompanyStore for InMemoryCompanyStore {
    async fn create(&self, company: NewCompany) -> Result<Company, StoreError> {
        let mut rows = self.inner.write().map_err(poisoned)?;
        if rows.iter().any(|c| c.name == company.name) {
            return Err(StoreError::UniqueViolation(format!("companies.name = {}", company.name)));
        }

        let created = Company {
            id: CompanyId::new(),
            name: company.name,
            created_at: Utc::now(),
        };
        rows.push(created.clone());
        Ok(created)
    }

    async fn find(&self, id: CompanyId) -> Result<Option<Company>, StoreError> {
        let rows = self.inner.read().map_err(poisoned)?;
        Ok(rows.iter().find(|c| c.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Company>, StoreError> {
        let rows = self.inner.read().map_err(poisoned)?;
        Ok(rows.iter().find(|c| c.name == name).cloned())
    }

    async fn list(&self) -> Result<Vec<Company>, StoreError> {
        Ok(self.inner.read().map_err(poisoned)?.clone())
    }

    async fn rename(&self, id: CompanyId, name: &str) -> Result<Option<Company>, StoreError> {
        let mut rows = self.inner.write().map_err(poisoned)?;
        if rows.iter().any(|c| c.name == name && c.id != id) {
            return Err(StoreError::UniqueViolation(format!("companies.name = {name}")));
        }
        Ok(rows.iter_mut().find(|c| c.id == id).map(|c| {
            c.name = name.to_string();
            c.clone()
        }))
    }

    async fn delete(&self, id: CompanyId) -> Result<bool, StoreError> {
        let mut rows = self.inner.write().map_err(poisoned)?;
        let before = rows.len();
        rows.retain(|c| c.id != id);
        Ok(rows.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn names_are_unique() {
        let store = InMemoryCompanyStore::new();
        let c1 = store.create(NewCompany { name: "Acme".into() }).await.unwrap();
        let err = store.create(NewCompany { name: "Acme".into() }).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));

        let c2 = store.create(NewCompany { name: "Globex".into() }).await.unwrap();
        assert!(matches!(
            store.rename(c2.id, "Acme").await,
            Err(StoreError::UniqueViolation(_))
        ));
        assert_eq!(store.rename(c1.id, "Acme").await.unwrap().unwrap().name, "Acme");
    }

    #[tokio::test]
    async fn list_keeps_creation_order() {
        let store = InMemoryCompanyStore::new();
        for name in ["b", "a", "c"] {
            store.create(NewCompany { name: name.into() }).await.unwrap();
        }
        let names: Vec<String> = store.list().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["b", "a", "c"]);
    }
}
