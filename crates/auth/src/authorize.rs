//! Declarative role requirements and their enforcement.
//!
//! Requirements are plain data attached to an operation, either at the group
//! level (every operation in a router group) or at the call level (one
//! operation). [`enforce`] evaluates every applicable requirement before the
//! operation runs and stops at the first failure.
//!
//! - No IO
//! - No panics
//! - No state mutation; passing checks can be composed freely

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Role, SecurityContext};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// No principal is attached to the request.
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient role to perform this action")]
    InsufficientRole {
        required: Vec<Role>,
        actual: Role,
    },

    /// The requirement itself is unusable (no role, or an empty role set).
    #[error("No role configured for this action")]
    Misconfigured,
}

impl AuthzError {
    /// Whether this denial maps to "forbidden" rather than "unauthenticated".
    pub fn is_forbidden(&self) -> bool {
        !matches!(self, AuthzError::Unauthenticated)
    }
}

/// A single declared precondition on the caller's role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoleRequirement {
    /// Exactly this role. `None` is a misconfiguration and always denies.
    Single(Option<Role>),

    /// Any role from the set. An empty set always denies.
    AnyOf(Vec<Role>),
}

impl RoleRequirement {
    pub fn role(role: Role) -> Self {
        RoleRequirement::Single(Some(role))
    }

    pub fn any_of(roles: impl IntoIterator<Item = Role>) -> Self {
        RoleRequirement::AnyOf(roles.into_iter().collect())
    }

    /// Position within one site: single-role checks run before any-of checks.
    fn rank(&self) -> u8 {
        match self {
            RoleRequirement::Single(_) => 0,
            RoleRequirement::AnyOf(_) => 1,
        }
    }

    pub fn evaluate(&self, ctx: &SecurityContext) -> Result<(), AuthzError> {
        let required: &[Role] = match self {
            RoleRequirement::Single(Some(role)) => core::slice::from_ref(role),
            RoleRequirement::AnyOf(roles) if !roles.is_empty() => roles,
            RoleRequirement::Single(None) | RoleRequirement::AnyOf(_) => {
                return Err(AuthzError::Misconfigured);
            }
        };

        let Some(actual) = ctx.current_role() else {
            return Err(AuthzError::Unauthenticated);
        };

        let granted = match self {
            RoleRequirement::Single(Some(role)) => ctx.has_role(*role),
            _ => ctx.has_any_role(required),
        };

        if granted {
            Ok(())
        } else {
            Err(AuthzError::InsufficientRole {
                required: required.to_vec(),
                actual,
            })
        }
    }
}

/// Where a policy was declared. Group policies are evaluated first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementSite {
    Group,
    Call,
}

/// The requirements declared at one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub site: RequirementSite,
    pub requirements: Vec<RoleRequirement>,
}

impl AccessPolicy {
    pub fn group() -> Self {
        Self {
            site: RequirementSite::Group,
            requirements: Vec::new(),
        }
    }

    pub fn call() -> Self {
        Self {
            site: RequirementSite::Call,
            requirements: Vec::new(),
        }
    }

    pub fn require_role(mut self, role: Role) -> Self {
        self.requirements.push(RoleRequirement::role(role));
        self
    }

    pub fn require_any(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.requirements.push(RoleRequirement::any_of(roles));
        self
    }

    pub fn with(mut self, requirement: RoleRequirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Enforce this policy on its own.
    pub fn enforce(&self, ctx: &SecurityContext) -> Result<(), AuthzError> {
        enforce(&[self], ctx)
    }
}

/// Evaluate all requirements from `policies` against `ctx`.
///
/// Order: group single-role, group any-of, call single-role, call any-of.
/// Within the same slot, declaration order is kept. The first failure wins.
pub fn enforce(policies: &[&AccessPolicy], ctx: &SecurityContext) -> Result<(), AuthzError> {
    let mut ordered: Vec<(RequirementSite, &RoleRequirement)> = policies
        .iter()
        .flat_map(|p| p.requirements.iter().map(move |r| (p.site, r)))
        .collect();
    ordered.sort_by_key(|(site, r)| (*site, r.rank()));

    for (site, requirement) in ordered {
        if let Err(e) = requirement.evaluate(ctx) {
            tracing::info!(
                site = ?site,
                requirement = ?requirement,
                actual = ?ctx.current_role(),
                principal_id = ?ctx.current_user_id(),
                reason = %e,
                "access denied"
            );
            return Err(e);
        }
    }

    Ok(())
}
