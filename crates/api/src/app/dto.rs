use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use workhub_auth::{AuthSession, Principal, Role};
use workhub_core::{CompanyId, UserId};
use workhub_infra::Company;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "identity")]
    pub email: String,
    #[serde(alias = "secret")]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(alias = "identity")]
    pub email: String,
    #[serde(alias = "secret")]
    pub password: String,
    pub full_name: String,
    pub company_id: CompanyId,
    pub role: Role,
}

/// Admin-side user creation. Without `companyId` no membership link is made.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Every field is optional; an empty password keeps the current one.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub company_id: Option<CompanyId>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CompanyRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUserToCompanyRequest {
    pub user_id: UserId,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub size: Option<usize>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<CompanyId>,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Principal> for UserResponse {
    fn from(p: Principal) -> Self {
        Self {
            id: p.id,
            company_id: p.company_id,
            full_name: p.full_name,
            email: p.identity,
            role: p.role,
            is_active: p.active,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

impl From<AuthSession> for AuthResponse {
    fn from(s: AuthSession) -> Self {
        Self {
            token: s.token,
            token_type: s.token_type,
            expires_at: s.expires_at,
            user: s.principal.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyResponse {
    pub id: CompanyId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<UserResponse>>,
    pub created_at: DateTime<Utc>,
}

impl CompanyResponse {
    pub fn summary(c: Company) -> Self {
        Self {
            id: c.id,
            name: c.name,
            user_count: None,
            users: None,
            created_at: c.created_at,
        }
    }

    pub fn with_users(c: Company, users: Vec<Principal>) -> Self {
        let users: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
        Self {
            user_count: Some(users.len()),
            users: Some(users),
            ..Self::summary(c)
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total_elements: usize,
    pub total_pages: usize,
}

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

/// Slice `all` into the requested zero-based page.
pub fn paginate<T>(all: Vec<T>, query: &PageQuery) -> PageResponse<T> {
    let page = query.page.unwrap_or(0);
    let size = query.size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let total_elements = all.len();
    let total_pages = total_elements.div_ceil(size);

    let items = all
        .into_iter()
        .skip(page.saturating_mul(size))
        .take(size)
        .collect();

    PageResponse {
        items,
        page,
        size,
        total_elements,
        total_pages,
    }
}
