use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use workhub_core::{CompanyId, UserId};

use crate::Role;

/// Read-only view of a user for authentication and authorization decisions.
///
/// Owned by the principal store; the auth core never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    /// Login identity (email). Unique and compared exactly as stored.
    pub identity: String,
    pub full_name: String,
    pub role: Role,
    /// Primary company, if any.
    pub company_id: Option<CompanyId>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A principal about to be persisted. The secret is already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPrincipal {
    pub identity: String,
    pub full_name: String,
    pub secret_hash: String,
    pub role: Role,
    pub company_id: Option<CompanyId>,
    pub active: bool,
}
