use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::Response,
    routing::{delete, get, post, put},
};

use workhub_auth::{AccessPolicy, AuthError, AuthzError, NewPrincipal, PrincipalStore, Role, StoreError, hash_secret};
use workhub_core::{CompanyId, UserId, validate};
use workhub_infra::{CompanyStore, LedgerError, PrincipalAdmin, PrincipalUpdate};

use crate::app::routes::{body_rejection, query_rejection};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::{guard_group, guard_route};
use crate::context::{CurrentPrincipal, ReqPath};

fn managers() -> AccessPolicy {
    AccessPolicy::call().require_any([Role::Admin, Role::Manager])
}

pub fn router() -> Router {
    let routes = Router::new()
        .route(
            "/",
            guard_route(get(list_users), managers())
                .merge(guard_route(post(create_user), AccessPolicy::call().require_role(Role::Admin))),
        )
        .route(
            "/:id",
            guard_route(get(get_user), AccessPolicy::call().require_any(Role::ALL))
                .merge(guard_route(put(update_user), managers()))
                .merge(guard_route(delete(delete_user), managers())),
        )
        .route("/company/:company_id", guard_route(get(list_company_users), managers()));

    guard_group(routes, AccessPolicy::group().require_any(Role::ALL))
}

fn parse_user_id(raw: &str, path: &ReqPath) -> Result<UserId, Response> {
    raw.parse::<UserId>()
        .map_err(|_| errors::invalid_id("user", path.as_str()))
}

fn not_found(id: UserId, path: &ReqPath) -> Response {
    errors::json_error(
        StatusCode::NOT_FOUND,
        "user_not_found",
        format!("User not found with id: {id}"),
        path.as_str(),
    )
}

fn company_not_found(id: CompanyId, path: &ReqPath) -> Response {
    errors::json_error(
        StatusCode::NOT_FOUND,
        "company_not_found",
        format!("Company not found with id: {id}"),
        path.as_str(),
    )
}

fn duplicate_email(email: &str, path: &ReqPath) -> Response {
    errors::auth_error(&AuthError::DuplicateIdentity(email.to_string()), path.as_str())
}

async fn ensure_company(services: &AppServices, id: CompanyId, path: &ReqPath) -> Result<(), Response> {
    match services.companies.find(id).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(company_not_found(id, path)),
        Err(e) => Err(errors::store_error(&e, path.as_str())),
    }
}

async fn ensure_email_free(services: &AppServices, email: &str, path: &ReqPath) -> Result<(), Response> {
    match services.principals.exists_by_identity(email).await {
        Ok(false) => Ok(()),
        Ok(true) => Err(duplicate_email(email, path)),
        Err(e) => Err(errors::store_error(&e, path.as_str())),
    }
}

async fn hash_password(services: &AppServices, raw: &str, path: &ReqPath) -> Result<String, Response> {
    validate::secret(raw).map_err(|e| errors::domain_error(&e, path.as_str()))?;
    hash_secret(&services.hasher, raw)
        .await
        .map_err(|e| errors::auth_error(&AuthError::Hash(e), path.as_str()))
}

/// Point the user's membership at `company_id` alone, unless already linked.
async fn relink(
    services: &AppServices,
    user_id: UserId,
    company_id: CompanyId,
    path: &ReqPath,
) -> Result<(), Response> {
    let ledger_err = |e: LedgerError| errors::ledger_error(&e, path.as_str());
    if services.ledger.exists_member(company_id, user_id).await.map_err(ledger_err)? {
        return Ok(());
    }
    services.ledger.remove_all_for_user(user_id).await.map_err(ledger_err)?;
    services.ledger.add(company_id, user_id).await.map_err(ledger_err)?;
    Ok(())
}

fn write_error(err: StoreError, email: &str, company_id: Option<CompanyId>, path: &ReqPath) -> Response {
    match (err, company_id) {
        (StoreError::UniqueViolation(_), _) => duplicate_email(email, path),
        (StoreError::MissingReference(_), Some(company_id)) => company_not_found(company_id, path),
        (other, _) => errors::store_error(&other, path.as_str()),
    }
}

/// Admin-side creation; unlike registration no token is issued.
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    path: ReqPath,
    body: Result<Json<dto::CreateUserRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return body_rejection(e, path.as_str()),
    };
    let (email, full_name) = match (
        validate::identity(&body.email),
        validate::non_blank("fullName", &body.full_name),
    ) {
        (Ok(email), Ok(full_name)) => (email, full_name),
        (Err(e), _) | (_, Err(e)) => return errors::domain_error(&e, path.as_str()),
    };

    if let Some(company_id) = body.company_id {
        if let Err(resp) = ensure_company(&services, company_id, &path).await {
            return resp;
        }
    }
    if let Err(resp) = ensure_email_free(&services, &email, &path).await {
        return resp;
    }
    let secret_hash = match hash_password(&services, &body.password, &path).await {
        Ok(h) => h,
        Err(resp) => return resp,
    };

    let principal = match services
        .principals
        .insert(NewPrincipal {
            identity: email.clone(),
            full_name,
            secret_hash,
            role: body.role,
            company_id: body.company_id,
            active: body.is_active.unwrap_or(true),
        })
        .await
    {
        Ok(p) => p,
        Err(e) => return write_error(e, &email, body.company_id, &path),
    };

    if let Some(company_id) = body.company_id {
        if let Err(e) = services.ledger.add(company_id, principal.id).await {
            return errors::ledger_error(&e, path.as_str());
        }
    }

    tracing::info!(principal_id = %principal.id, role = %principal.role, "user created");
    errors::success(
        StatusCode::CREATED,
        Some("User created successfully"),
        dto::UserResponse::from(principal),
    )
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    path: ReqPath,
    page: Result<Query<dto::PageQuery>, QueryRejection>,
) -> Response {
    let Query(page) = match page {
        Ok(q) => q,
        Err(e) => return query_rejection(e, path.as_str()),
    };

    match services.principals.list().await {
        Ok(all) => {
            let views: Vec<_> = all.into_iter().map(dto::UserResponse::from).collect();
            errors::success(StatusCode::OK, None, dto::paginate(views, &page))
        }
        Err(e) => errors::store_error(&e, path.as_str()),
    }
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    path: ReqPath,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_user_id(&id, &path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.principals.find_by_id(id).await {
        Ok(Some(p)) => errors::success(StatusCode::OK, None, dto::UserResponse::from(p)),
        Ok(None) => not_found(id, &path),
        Err(e) => errors::store_error(&e, path.as_str()),
    }
}

/// Role, status and membership changes take effect on the target's next
/// request: the security context is re-read from the store every time.
pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentPrincipal(caller): CurrentPrincipal,
    path: ReqPath,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateUserRequest>, JsonRejection>,
) -> Response {
    let id = match parse_user_id(&id, &path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return body_rejection(e, path.as_str()),
    };

    let target = match services.principals.find_by_id(id).await {
        Ok(Some(p)) => p,
        Ok(None) => return not_found(id, &path),
        Err(e) => return errors::store_error(&e, path.as_str()),
    };

    // Only an ADMIN may touch an ADMIN account or hand out the ADMIN role.
    if caller.role != Role::Admin && (target.role == Role::Admin || body.role == Some(Role::Admin)) {
        let denied = AuthzError::InsufficientRole {
            required: vec![Role::Admin],
            actual: caller.role,
        };
        return errors::authz_error(&denied, path.as_str());
    }

    let mut changes = PrincipalUpdate {
        role: body.role,
        active: body.is_active,
        company_id: body.company_id.map(Some),
        ..PrincipalUpdate::default()
    };

    if let Some(raw) = &body.email {
        let email = match validate::identity(raw) {
            Ok(e) => e,
            Err(e) => return errors::domain_error(&e, path.as_str()),
        };
        if email != target.identity {
            if let Err(resp) = ensure_email_free(&services, &email, &path).await {
                return resp;
            }
            changes.identity = Some(email);
        }
    }
    if let Some(raw) = &body.full_name {
        match validate::non_blank("fullName", raw) {
            Ok(name) => changes.full_name = Some(name),
            Err(e) => return errors::domain_error(&e, path.as_str()),
        }
    }
    if let Some(raw) = body.password.as_deref().filter(|p| !p.is_empty()) {
        match hash_password(&services, raw, &path).await {
            Ok(h) => changes.secret_hash = Some(h),
            Err(resp) => return resp,
        }
    }

    if let Some(company_id) = body.company_id {
        if let Err(resp) = ensure_company(&services, company_id, &path).await {
            return resp;
        }
        if let Err(resp) = relink(&services, id, company_id, &path).await {
            return resp;
        }
    }

    let email = changes.identity.clone().unwrap_or_else(|| target.identity.clone());
    match services.principals.update(id, changes).await {
        Ok(Some(updated)) => {
            tracing::info!(
                principal_id = %updated.id,
                role = %updated.role,
                active = updated.active,
                updated_by = %caller.id,
                "user updated"
            );
            errors::success(
                StatusCode::OK,
                Some("User updated successfully"),
                dto::UserResponse::from(updated),
            )
        }
        Ok(None) => not_found(id, &path),
        Err(e) => write_error(e, &email, body.company_id, &path),
    }
}

/// Members of a company, in the order they were added.
pub async fn list_company_users(
    Extension(services): Extension<Arc<AppServices>>,
    path: ReqPath,
    Path(company_id): Path<String>,
    page: Result<Query<dto::PageQuery>, QueryRejection>,
) -> Response {
    let company_id = match company_id.parse::<CompanyId>() {
        Ok(id) => id,
        Err(_) => return errors::invalid_id("company", path.as_str()),
    };
    let Query(page) = match page {
        Ok(q) => q,
        Err(e) => return query_rejection(e, path.as_str()),
    };

    if let Err(resp) = ensure_company(&services, company_id, &path).await {
        return resp;
    }

    match services.ledger.list_users(company_id).await {
        Ok(users) => {
            let views: Vec<_> = users.into_iter().map(dto::UserResponse::from).collect();
            errors::success(StatusCode::OK, None, dto::paginate(views, &page))
        }
        Err(e) => errors::ledger_error(&e, path.as_str()),
    }
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    path: ReqPath,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_user_id(&id, &path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.deprovisioner.delete_principal(id).await {
        Ok(()) => errors::success_without_data("User deleted successfully"),
        Err(e) => errors::lifecycle_error(&e, path.as_str()),
    }
}
