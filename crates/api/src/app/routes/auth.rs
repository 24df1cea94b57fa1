//! Login, registration and the current principal. Login and register are
//! public; `/me` needs an authenticated caller.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::Response,
    routing::{get, post},
};

use workhub_auth::{LoginRequest, RegisterRequest};

use crate::app::routes::body_rejection;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{CurrentPrincipal, ReqPath};

pub fn router() -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/me", get(me))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    path: ReqPath,
    body: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return body_rejection(e, path.as_str()),
    };

    let request = LoginRequest {
        identity: body.email,
        secret: body.password,
    };
    match services.auth.login(request).await {
        Ok(session) => errors::success(
            StatusCode::OK,
            Some("Login successful"),
            dto::AuthResponse::from(session),
        ),
        Err(e) => errors::auth_error(&e, path.as_str()),
    }
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    path: ReqPath,
    body: Result<Json<dto::RegisterRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return body_rejection(e, path.as_str()),
    };

    let request = RegisterRequest {
        identity: body.email,
        secret: body.password,
        full_name: body.full_name,
        company_id: body.company_id,
        role: body.role,
    };
    match services.auth.register(request).await {
        Ok(session) => errors::success(
            StatusCode::CREATED,
            Some("User registered successfully"),
            dto::AuthResponse::from(session),
        ),
        Err(e) => errors::auth_error(&e, path.as_str()),
    }
}

pub async fn me(CurrentPrincipal(principal): CurrentPrincipal) -> Response {
    errors::success(StatusCode::OK, None, dto::UserResponse::from(principal))
}
