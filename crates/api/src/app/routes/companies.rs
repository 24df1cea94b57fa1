//! Company management and membership. Any authenticated role may read a
//! single company; every write is ADMIN-only.

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

use workhub_auth::{AccessPolicy, Role, StoreError};
use workhub_core::{CompanyId, validate};
use workhub_infra::{Company, CompanyStore, NewCompany};

use crate::app::routes::{body_rejection, query_rejection};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::{guard_group, guard_route};
use crate::context::ReqPath;

fn admin_only() -> AccessPolicy {
    AccessPolicy::call().require_role(Role::Admin)
}

pub fn router() -> Router {
    let routes = Router::new()
        .route(
            "/",
            guard_route(post(create_company), admin_only()).merge(guard_route(get(list_companies), admin_only())),
        )
        .route(
            "/:id",
            guard_route(get(get_company), AccessPolicy::call().require_any(Role::ALL))
                .merge(guard_route(put(update_company), admin_only()))
                .merge(guard_route(delete(delete_company), admin_only())),
        )
        .route("/:id/users", guard_route(post(add_user), admin_only()));

    guard_group(routes, AccessPolicy::group().require_any(Role::ALL))
}

fn parse_id(raw: &str, path: &ReqPath) -> Result<CompanyId, Response> {
    raw.parse::<CompanyId>()
        .map_err(|_| errors::invalid_id("company", path.as_str()))
}

fn not_found(id: CompanyId, path: &ReqPath) -> Response {
    errors::json_error(
        StatusCode::NOT_FOUND,
        "company_not_found",
        format!("Company not found with id: {id}"),
        path.as_str(),
    )
}

fn name_taken(name: &str, path: &ReqPath) -> Response {
    errors::json_error(
        StatusCode::CONFLICT,
        "duplicate_company",
        format!("Company already exists with name: {name}"),
        path.as_str(),
    )
}

/// Company-name uniqueness is checked up front and again by the store.
async fn ensure_name_free(
    services: &AppServices,
    name: &str,
    except: Option<CompanyId>,
    path: &ReqPath,
) -> Result<(), Response> {
    match services.companies.find_by_name(name).await {
        Ok(Some(existing)) if Some(existing.id) != except => Err(name_taken(name, path)),
        Ok(_) => Ok(()),
        Err(e) => Err(errors::store_error(&e, path.as_str())),
    }
}

fn write_error(err: StoreError, name: &str, path: &ReqPath) -> Response {
    match err {
        StoreError::UniqueViolation(_) => name_taken(name, path),
        other => errors::store_error(&other, path.as_str()),
    }
}

pub async fn create_company(
    Extension(services): Extension<Arc<AppServices>>,
    path: ReqPath,
    body: Result<Json<dto::CompanyRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return body_rejection(e, path.as_str()),
    };
    let name = match validate::non_blank("name", &body.name) {
        Ok(n) => n,
        Err(e) => return errors::domain_error(&e, path.as_str()),
    };
    if let Err(resp) = ensure_name_free(&services, &name, None, &path).await {
        return resp;
    }

    match services.companies.create(NewCompany { name: name.clone() }).await {
        Ok(company) => {
            tracing::info!(company_id = %company.id, "company created");
            errors::success(
                StatusCode::CREATED,
                Some("Company created successfully"),
                dto::CompanyResponse::summary(company),
            )
        }
        Err(e) => write_error(e, &name, &path),
    }
}

pub async fn list_companies(
    Extension(services): Extension<Arc<AppServices>>,
    path: ReqPath,
    page: Result<Query<dto::PageQuery>, QueryRejection>,
) -> Response {
    let Query(page) = match page {
        Ok(q) => q,
        Err(e) => return query_rejection(e, path.as_str()),
    };

    match services.companies.list().await {
        Ok(all) => {
            let views: Vec<_> = all.into_iter().map(dto::CompanyResponse::summary).collect();
            errors::success(StatusCode::OK, None, dto::paginate(views, &page))
        }
        Err(e) => errors::store_error(&e, path.as_str()),
    }
}

pub async fn get_company(
    Extension(services): Extension<Arc<AppServices>>,
    path: ReqPath,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id, &path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let company: Company = match services.companies.find(id).await {
        Ok(Some(c)) => c,
        Ok(None) => return not_found(id, &path),
        Err(e) => return errors::store_error(&e, path.as_str()),
    };

    match services.ledger.list_users(id).await {
        Ok(users) => errors::success(StatusCode::OK, None, dto::CompanyResponse::with_users(company, users)),
        Err(e) => errors::ledger_error(&e, path.as_str()),
    }
}

pub async fn update_company(
    Extension(services): Extension<Arc<AppServices>>,
    path: ReqPath,
    Path(id): Path<String>,
    body: Result<Json<dto::CompanyRequest>, JsonRejection>,
) -> Response {
    let id = match parse_id(&id, &path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return body_rejection(e, path.as_str()),
    };
    let name = match validate::non_blank("name", &body.name) {
        Ok(n) => n,
        Err(e) => return errors::domain_error(&e, path.as_str()),
    };
    if let Err(resp) = ensure_name_free(&services, &name, Some(id), &path).await {
        return resp;
    }

    match services.companies.rename(id, &name).await {
        Ok(Some(company)) => errors::success(
            StatusCode::OK,
            Some("Company updated successfully"),
            dto::CompanyResponse::summary(company),
        ),
        Ok(None) => not_found(id, &path),
        Err(e) => write_error(e, &name, &path),
    }
}

pub async fn delete_company(
    Extension(services): Extension<Arc<AppServices>>,
    path: ReqPath,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id, &path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.deprovisioner.delete_company(id).await {
        Ok(()) => errors::success_without_data("Company deleted successfully"),
        Err(e) => errors::lifecycle_error(&e, path.as_str()),
    }
}

pub async fn add_user(
    Extension(services): Extension<Arc<AppServices>>,
    path: ReqPath,
    Path(id): Path<String>,
    body: Result<Json<dto::AddUserToCompanyRequest>, JsonRejection>,
) -> Response {
    let id = match parse_id(&id, &path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return body_rejection(e, path.as_str()),
    };

    match services.ledger.add(id, body.user_id).await {
        Ok(_) => errors::success_without_data("User added to company successfully"),
        Err(e) => errors::ledger_error(&e, path.as_str()),
    }
}
