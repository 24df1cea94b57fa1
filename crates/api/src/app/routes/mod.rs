use axum::{
    Router,
    extract::rejection::{JsonRejection, QueryRejection},
    response::Response,
};

use crate::app::errors;

pub mod auth;
pub mod companies;
pub mod system;
pub mod users;

pub fn router() -> Router {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/companies", companies::router())
        .nest("/users", users::router())
}

/// Map a malformed or mistyped JSON body onto the 400 envelope.
pub(crate) fn body_rejection(rejection: JsonRejection, path: &str) -> Response {
    errors::bad_request(rejection.body_text(), path)
}

/// Same envelope for an unparseable query string.
pub(crate) fn query_rejection(rejection: QueryRejection, path: &str) -> Response {
    errors::bad_request(rejection.body_text(), path)
}
