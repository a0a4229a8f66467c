//! Session gate for mutating requests.
//!
//! Reads (`GET`, `HEAD`, `OPTIONS`) pass straight through. `POST`, `PUT`,
//! `PATCH` and `DELETE` need a `session_token` cookie naming a live session,
//! otherwise the request ends here with 401 and the handler never runs.

use axum::extract::{Request, State};
use axum::http::header::COOKIE;
use axum::http::{HeaderMap, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::AppState;
use crate::error::AppError;

pub const SESSION_COOKIE: &str = "session_token";

/// Value of cookie `name`, looking through every `Cookie` header present.
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all(COOKIE) {
        let Ok(s) = cookie.to_str() else { continue };
        for part in s.split(';') {
            let p = part.trim();
            if let Some((k, v)) = p.split_once('=') {
                if k.trim() == name { return Some(v.trim().to_string()); }
            }
        }
    }
    None
}

pub fn session_token(headers: &HeaderMap) -> Option<String> {
    parse_cookie(headers, SESSION_COOKIE).filter(|s| !s.is_empty())
}

pub fn is_mutating(method: &Method) -> bool {
    method == Method::POST || method == Method::PUT || method == Method::PATCH || method == Method::DELETE
}

pub async fn require_session(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !is_mutating(req.method()) {
        return next.run(req).await;
    }
    let Some(token) = session_token(req.headers()) else {
        debug!(method = %req.method(), path = %req.uri().path(), "rejected: no session cookie");
        return AppError::auth("unauthorized", "login required").into_response();
    };
    match state.sessions.validate(&token) {
        Some(principal) => {
            debug!(user = %principal.username, method = %req.method(), path = %req.uri().path(), "session accepted");
            next.run(req).await
        }
        None => {
            debug!(method = %req.method(), path = %req.uri().path(), "rejected: unknown or expired session");
            AppError::auth("unauthorized", "session is invalid or expired").into_response()
        }
    }
}
