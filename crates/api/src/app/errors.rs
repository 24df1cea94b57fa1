//! Uniform JSON envelopes for success and error responses.
//!
//! Errors:
//! `{"success": false, "message", "error": {"error", "message", "status", "path"}, "timestamp"}`
//!
//! Successes:
//! `{"success": true, "message", "data", "timestamp"}`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use workhub_auth::{AuthError, AuthzError, StoreError};
use workhub_core::DomainError;
use workhub_infra::{LedgerError, LifecycleError};

const INTERNAL_MESSAGE: &str = "Internal server error";

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    path: &str,
) -> Response {
    let message = message.into();
    (
        status,
        axum::Json(json!({
            "success": false,
            "message": message,
            "error": {
                "error": code,
                "message": message,
                "status": status.as_u16(),
                "path": path,
            },
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
        .into_response()
}

pub fn success<T: Serialize>(status: StatusCode, message: Option<&str>, data: T) -> Response {
    (
        status,
        axum::Json(json!({
            "success": true,
            "message": message,
            "data": data,
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
        .into_response()
}

pub fn success_without_data(message: &str) -> Response {
    success(StatusCode::OK, Some(message), serde_json::Value::Null)
}

pub fn bad_request(message: impl Into<String>, path: &str) -> Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", message, path)
}

pub fn invalid_id(what: &str, path: &str) -> Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"), path)
}

pub fn unauthenticated(path: &str) -> Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthorized", "Authentication required", path)
}

/// Store failures are logged in full and answered with a generic message.
pub fn store_error(err: &StoreError, path: &str) -> Response {
    match err {
        StoreError::UniqueViolation(_) => json_error(StatusCode::CONFLICT, "conflict", "Resource already exists", path),
        StoreError::MissingReference(_) | StoreError::Backend(_) => {
            tracing::error!(error = %err, path, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", INTERNAL_MESSAGE, path)
        }
    }
}

pub fn domain_error(err: &DomainError, path: &str) -> Response {
    match err {
        DomainError::Validation(msg) => bad_request(msg.clone(), path),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg.clone(), path),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg.clone(), path),
    }
}

pub fn auth_error(err: &AuthError, path: &str) -> Response {
    match err {
        AuthError::AuthenticationFailed => json_error(
            StatusCode::UNAUTHORIZED,
            "authentication_failed",
            err.to_string(),
            path,
        ),
        AuthError::DuplicateIdentity(_) => {
            json_error(StatusCode::CONFLICT, "duplicate_email", err.to_string(), path)
        }
        AuthError::CompanyNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "company_not_found", err.to_string(), path)
        }
        AuthError::Validation(e) => domain_error(e, path),
        AuthError::Store(e) => store_error(e, path),
        AuthError::Hash(_) | AuthError::Signing(_) => {
            tracing::error!(error = %err, path, "credential or token primitive failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", INTERNAL_MESSAGE, path)
        }
    }
}

pub fn authz_error(err: &AuthzError, path: &str) -> Response {
    if err.is_forbidden() {
        json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string(), path)
    } else {
        unauthenticated(path)
    }
}

pub fn ledger_error(err: &LedgerError, path: &str) -> Response {
    match err {
        LedgerError::CompanyNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "company_not_found", err.to_string(), path)
        }
        LedgerError::UserNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "user_not_found", err.to_string(), path)
        }
        LedgerError::AlreadyMember { .. } => {
            json_error(StatusCode::CONFLICT, "already_member", err.to_string(), path)
        }
        LedgerError::Store(e) => store_error(e, path),
    }
}

pub fn lifecycle_error(err: &LifecycleError, path: &str) -> Response {
    match err {
        LifecycleError::CompanyNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "company_not_found", err.to_string(), path)
        }
        LifecycleError::UserNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "user_not_found", err.to_string(), path)
        }
        LifecycleError::Ledger(e) => ledger_error(e, path),
        LifecycleError::Store(e) => store_error(e, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workhub_core::{CompanyId, UserId};

    #[test]
    fn statuses_follow_error_kind() {
        let path = "/x";
        assert_eq!(auth_error(&AuthError::AuthenticationFailed, path).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            auth_error(&AuthError::DuplicateIdentity("a@x.com".into()), path).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            auth_error(&AuthError::CompanyNotFound(CompanyId::new()), path).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(authz_error(&AuthzError::Unauthenticated, path).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(authz_error(&AuthzError::Misconfigured, path).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ledger_error(
                &LedgerError::AlreadyMember {
                    company_id: CompanyId::new(),
                    user_id: UserId::new()
                },
                path
            )
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            store_error(&StoreError::Backend("boom".into()), path).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
