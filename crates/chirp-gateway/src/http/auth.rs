//! HTTP Basic authentication for the ingestion endpoints.

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::warn;

use chirp_core::config::WebhooksConfig;

/// A request the ingestion endpoints refuse. The body is plain text.
#[derive(Debug, PartialEq, Eq)]
pub enum Rejection {
    Unauthorized,
    BadRequest(String),
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        match self {
            Rejection::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, r#"Basic realm="chirp""#)],
                "unauthorized",
            )
                .into_response(),
            Rejection::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
        }
    }
}

/// Check `Authorization: Basic …` against the configured credentials.
///
/// With no credentials configured every request is refused.
pub fn check_basic(cfg: &WebhooksConfig, headers: &HeaderMap) -> Result<(), Rejection> {
    let (Some(user), Some(pass)) = (cfg.username.as_deref(), cfg.password.as_deref()) else {
        warn!("webhook request refused: no credentials configured");
        return Err(Rejection::Unauthorized);
    };

    let supplied = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .and_then(|b64| STANDARD.decode(b64.trim()).ok())
        .and_then(|raw| String::from_utf8(raw).ok());

    match supplied.as_deref().and_then(|s| s.split_once(':')) {
        Some((u, p)) if u == user && p == pass => Ok(()),
        _ => {
            warn!("webhook request with bad credentials");
            Err(Rejection::Unauthorized)
        }
    }
}

/// `Authorization` header value for `user:pass`.
#[cfg(test)]
pub fn basic_header(user: &str, pass: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> WebhooksConfig {
        WebhooksConfig {
            enabled: true,
            username: Some("gw".into()),
            password: Some("s3cret".into()),
            ..WebhooksConfig::default()
        }
    }

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, value.parse().unwrap());
        h
    }

    #[test]
    fn accepts_matching_credentials() {
        assert!(check_basic(&cfg(), &headers(&basic_header("gw", "s3cret"))).is_ok());
    }

    #[test]
    fn rejects_wrong_or_missing_credentials() {
        assert_eq!(
            check_basic(&cfg(), &headers(&basic_header("gw", "nope"))),
            Err(Rejection::Unauthorized)
        );
        assert_eq!(
            check_basic(&cfg(), &headers("Bearer abc")),
            Err(Rejection::Unauthorized)
        );
        assert_eq!(check_basic(&cfg(), &HeaderMap::new()), Err(Rejection::Unauthorized));
    }

    #[test]
    fn unconfigured_credentials_refuse_everything() {
        let open = WebhooksConfig {
            enabled: true,
            ..WebhooksConfig::default()
        };
        assert_eq!(
            check_basic(&open, &headers(&basic_header("", ""))),
            Err(Rejection::Unauthorized)
        );
    }

    #[test]
    fn password_may_contain_colons() {
        let c = WebhooksConfig {
            password: Some("a:b".into()),
            ..cfg()
        };
        assert!(check_basic(&c, &headers(&basic_header("gw", "a:b"))).is_ok());
    }
}
