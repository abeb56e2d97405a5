use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use subtle::ConstantTimeEq;

use crate::{config::AuthMode, server_state::ServerState};

pub async fn require_auth(State(state): State<Arc<ServerState>>, req: Request<Body>, next: Next) -> Response {
    let AuthMode::Basic(users) = &state.config.auth else {
        return next.run(req).await;
    };

    if check_credentials(users, req.headers()) {
        return next.run(req).await;
    }

    if let Some((user, _)) = basic_credentials(req.headers()) {
        tracing::warn!("Rejected login for {}", user);
    }
    unauthorized()
}

/// User and password from a `Basic` authorization header.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ").or_else(|| value.strip_prefix("basic "))?;
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

pub fn check_credentials(users: &HashMap<String, String>, headers: &HeaderMap) -> bool {
    basic_credentials(headers).is_some_and(|(user, password)| {
        users.get(&user).is_some_and(|expected| password_matches(expected, &password))
    })
}

/// Constant-time for passwords of equal length.
fn password_matches(expected: &str, given: &str) -> bool {
    expected.as_bytes().ct_eq(given.as_bytes()).into()
}

fn unauthorized() -> Response {
    let mut response = StatusCode::UNAUTHORIZED.into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"openpath admin\""),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn decodes_basic_header() {
        let encoded = STANDARD.encode("admin:se:cret");
        assert_eq!(
            basic_credentials(&headers(&format!("Basic {encoded}"))),
            Some(("admin".into(), "se:cret".into()))
        );
        assert_eq!(basic_credentials(&headers("Bearer abc")), None);
        assert_eq!(basic_credentials(&HeaderMap::new()), None);
    }

    #[test]
    fn checks_against_known_users() {
        let users = HashMap::from([("admin".to_string(), "secret".to_string())]);

        assert!(check_credentials(&users, &headers(&format!("Basic {}", STANDARD.encode("admin:secret")))));
        assert!(!check_credentials(&users, &headers(&format!("Basic {}", STANDARD.encode("admin:wrong")))));
        assert!(!check_credentials(&users, &headers(&format!("Basic {}", STANDARD.encode("other:secret")))));
    }

    #[test]
    fn challenge_header() {
        let response = unauthorized();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[test]
    fn password_comparison() {
        assert!(password_matches("secret", "secret"));
        assert!(!password_matches("secret", "secreT"));
        assert!(!password_matches("secret", "secret2"));
        assert!(!password_matches("secret", ""));
    }
}
