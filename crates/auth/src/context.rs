//! Per-request security context.
//!
//! A [`SecurityContext`] is an explicit value built once per request from the
//! verified token claims and then passed to whatever needs it. Every query on
//! an anonymous context answers "no principal" or `false`; turning that into
//! a denial is the enforcer's job.

use std::sync::Arc;

use workhub_core::{CompanyId, UserId};

use crate::{Claims, Principal, PrincipalStore, Role, StoreError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityContext {
    principal: Option<Principal>,
}

impl SecurityContext {
    pub fn anonymous() -> Self {
        Self { principal: None }
    }

    pub fn authenticated(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    pub fn current_principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn current_user_id(&self) -> Option<UserId> {
        self.principal.as_ref().map(|p| p.id)
    }

    pub fn current_role(&self) -> Option<Role> {
        self.principal.as_ref().map(|p| p.role)
    }

    pub fn current_company_id(&self) -> Option<CompanyId> {
        self.principal.as_ref().and_then(|p| p.company_id)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.current_role() == Some(role)
    }

    /// False for an empty slice, whatever the principal's role.
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        if roles.is_empty() {
            return false;
        }
        self.current_role().is_some_and(|r| roles.contains(&r))
    }

    /// Whether the principal's home company is `company_id`.
    pub fn is_company_member(&self, company_id: CompanyId) -> bool {
        self.current_company_id() == Some(company_id)
    }
}

/// Turns verified claims into a [`SecurityContext`] by reloading the principal.
///
/// The store is the source of truth: a principal that has been deactivated
/// since the token was minted resolves to no principal, and a demoted one
/// carries its stored role rather than the role in the token.
#[derive(Clone)]
pub struct SecurityContextResolver {
    principals: Arc<dyn PrincipalStore>,
}

impl SecurityContextResolver {
    pub fn new(principals: Arc<dyn PrincipalStore>) -> Self {
        Self { principals }
    }

    pub async fn resolve(&self, claims: Option<&Claims>) -> Result<SecurityContext, StoreError> {
        let Some(claims) = claims else {
            return Ok(SecurityContext::anonymous());
        };

        let Some(principal) = self.principals.find_by_id(claims.principal_id).await? else {
            tracing::debug!(principal_id = %claims.principal_id, "token names an unknown principal");
            return Ok(SecurityContext::anonymous());
        };

        if principal.identity != claims.sub {
            tracing::debug!(principal_id = %principal.id, "token subject does not match principal");
            return Ok(SecurityContext::anonymous());
        }

        if !principal.active {
            tracing::debug!(principal_id = %principal.id, "principal is inactive");
            return Ok(SecurityContext::anonymous());
        }

        if principal.role != claims.role {
            tracing::debug!(
                principal_id = %principal.id,
                token_role = %claims.role,
                stored_role = %principal.role,
                "role changed since token was issued"
            );
        }

        Ok(SecurityContext::authenticated(principal))
    }
}

impl core::fmt::Debug for SecurityContextResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SecurityContextResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewPrincipal;
    use crate::store::testing::MemoryPrincipals;
    use chrono::{Duration, Utc};

    async fn seed(store: &MemoryPrincipals, role: Role, company: Option<CompanyId>) -> Principal {
        store
            .insert(NewPrincipal {
                identity: "m@x.com".to_string(),
                full_name: "M".to_string(),
                secret_hash: "unused".to_string(),
                role,
                company_id: company,
                active: true,
            })
            .await
            .unwrap()
    }

    fn claims_for(p: &Principal) -> Claims {
        Claims::for_principal(p, Utc::now(), Duration::hours(1))
    }

    #[test]
    fn anonymous_context_answers_no() {
        let ctx = SecurityContext::anonymous();
        assert!(ctx.current_principal().is_none());
        assert_eq!(ctx.current_role(), None);
        assert_eq!(ctx.current_company_id(), None);
        assert!(!ctx.has_role(Role::Admin));
        assert!(!ctx.has_any_role(&Role::ALL));
        assert!(!ctx.is_company_member(CompanyId::new()));
    }

    #[tokio::test]
    async fn empty_any_of_is_false_even_for_admin() {
        let store = MemoryPrincipals::default();
        let admin = seed(&store, Role::Admin, None).await;
        let ctx = SecurityContext::authenticated(admin);
        assert!(ctx.has_role(Role::Admin));
        assert!(!ctx.has_any_role(&[]));
        assert!(ctx.has_any_role(&[Role::Staff, Role::Admin]));
        assert!(!ctx.has_any_role(&[Role::Manager, Role::Staff]));
    }

    #[tokio::test]
    async fn resolves_stored_principal() {
        let store = Arc::new(MemoryPrincipals::default());
        let company = CompanyId::new();
        let p = seed(&store, Role::Manager, Some(company)).await;
        let resolver = SecurityContextResolver::new(store.clone());

        let ctx = resolver.resolve(Some(&claims_for(&p))).await.unwrap();
        assert_eq!(ctx.current_user_id(), Some(p.id));
        assert!(ctx.is_company_member(company));
        assert!(!ctx.is_company_member(CompanyId::new()));
    }

    #[tokio::test]
    async fn missing_claims_resolve_to_anonymous() {
        let resolver = SecurityContextResolver::new(Arc::new(MemoryPrincipals::default()));
        let ctx = resolver.resolve(None).await.unwrap();
        assert!(!ctx.is_authenticated());
    }

    #[tokio::test]
    async fn deactivated_principal_resolves_to_anonymous() {
        let store = Arc::new(MemoryPrincipals::default());
        let p = seed(&store, Role::Staff, None).await;
        let claims = claims_for(&p);
        store.set_active(p.id, false);

        let resolver = SecurityContextResolver::new(store.clone());
        assert!(!resolver.resolve(Some(&claims)).await.unwrap().is_authenticated());
    }

    #[tokio::test]
    async fn demoted_principal_carries_stored_role() {
        let store = Arc::new(MemoryPrincipals::default());
        let p = seed(&store, Role::Admin, None).await;
        let claims = claims_for(&p);
        store.set_role(p.id, Role::Staff);

        let resolver = SecurityContextResolver::new(store.clone());
        let ctx = resolver.resolve(Some(&claims)).await.unwrap();
        assert_eq!(ctx.current_role(), Some(Role::Staff));
        assert!(!ctx.has_role(Role::Admin));
    }

    #[tokio::test]
    async fn unknown_principal_id_resolves_to_anonymous() {
        let store = Arc::new(MemoryPrincipals::default());
        let p = seed(&store, Role::Staff, None).await;
        let mut claims = claims_for(&p);
        claims.principal_id = UserId::new();

        let resolver = SecurityContextResolver::new(store.clone());
        assert!(!resolver.resolve(Some(&claims)).await.unwrap().is_authenticated());
    }
}
