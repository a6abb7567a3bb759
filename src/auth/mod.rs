//! Authentication module.
//!
//! The API is guarded by a pre-shared key (constant-time comparison). The
//! end user acting behind the trusted front end is identified by the
//! `x-user-*` headers.

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;

use crate::errors::{codes, AppError, ErrorDetails, ErrorResponse};

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_PHOTO_HEADER: &str = "x-user-photo";

/// Display name used when the actor has none.
pub const ANONYMOUS_NAME: &str = "Anónimo";

/// The identified end user performing a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub uid: String,
    pub name: String,
    pub email: Option<String>,
    pub photo: Option<String>,
}

impl Actor {
    pub fn new(uid: &str, name: Option<&str>) -> Self {
        Self {
            uid: uid.to_string(),
            name: name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(ANONYMOUS_NAME)
                .to_string(),
            email: None,
            photo: None,
        }
    }

    /// Read the actor from request headers, if one is identified.
    ///
    /// Values are decoded as UTF-8 since display names carry accents.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };

        let uid = get(USER_ID_HEADER)?;
        let mut actor = Actor::new(uid, get(USER_NAME_HEADER));
        actor.email = get(USER_EMAIL_HEADER).map(str::to_string);
        actor.photo = get(USER_PHOTO_HEADER).map(str::to_string);
        Some(actor)
    }

    /// Like [`Actor::from_headers`], rejecting anonymous requests.
    pub fn require(headers: &HeaderMap) -> Result<Self, AppError> {
        Self::from_headers(headers)
            .ok_or_else(|| AppError::Unauthorized("Sign in required".to_string()))
    }
}

/// PSK authentication layer function that takes the expected PSK as a parameter.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    // If no PSK is configured, allow all requests (dev mode)
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    match provided {
        Some(provided_key) => {
            if constant_time_compare(&provided_key, &expected) {
                next.run(request).await
            } else {
                unauthorized_response("Invalid API key")
            }
        }
        None => {
            // Also accept the key as a bearer token
            let bearer = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(|s| s.to_string());

            match bearer {
                Some(bearer_key) if constant_time_compare(&bearer_key, &expected) => {
                    next.run(request).await
                }
                _ => unauthorized_response("Missing or invalid API key"),
            }
        }
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorResponse {
        success: false,
        error: ErrorDetails {
            code: codes::UNAUTHORIZED.to_string(),
            message: message.to_string(),
            details: None,
        },
        revision_id: 0,
    };

    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
