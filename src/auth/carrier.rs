//! Where session tokens travel: the `Authorization` header or the session cookie.

use std::time::Duration;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

/// Which carriers a guard accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carrier {
    /// `Authorization: Bearer` first, then the cookie
    HeaderOrCookie,
    CookieOnly,
}

/// Pull the token out of a `Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Extract the session token according to `carrier` precedence.
pub fn extract_token(headers: &HeaderMap, cookie_name: &str, carrier: Carrier) -> Option<String> {
    if carrier == Carrier::HeaderOrCookie {
        let from_header = headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(bearer_token);
        if let Some(token) = from_header {
            return Some(token.to_string());
        }
    }

    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

fn base_cookie(name: String, value: String, max_age: Duration) -> Cookie<'static> {
    let max_age = time::Duration::seconds(i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX));
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .max_age(max_age)
        .build()
}

/// Cookie carrying a freshly issued session token.
pub fn session_cookie(name: &str, token: String, ttl: Duration) -> Cookie<'static> {
    base_cookie(name.to_string(), token, ttl)
}

/// Cookie that makes the browser drop the session. The token itself stays valid until it expires.
pub fn clearing_cookie(name: &str) -> Cookie<'static> {
    base_cookie(name.to_string(), String::new(), Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::COOKIE, HeaderValue};

    fn headers(auth: Option<&str>, cookie: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(auth) = auth {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        }
        if let Some(cookie) = cookie {
            headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc123"), None);
        assert_eq!(bearer_token("abc123"), None);
    }

    #[test]
    fn test_header_wins_over_cookie() {
        let h = headers(Some("Bearer from-header"), Some("authToken=from-cookie"));
        assert_eq!(
            extract_token(&h, "authToken", Carrier::HeaderOrCookie).as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn test_falls_back_to_cookie() {
        let h = headers(Some("Basic nope"), Some("other=1; authToken=from-cookie"));
        assert_eq!(
            extract_token(&h, "authToken", Carrier::HeaderOrCookie).as_deref(),
            Some("from-cookie")
        );
        assert!(extract_token(&headers(None, None), "authToken", Carrier::HeaderOrCookie).is_none());
    }

    #[test]
    fn test_cookie_only_ignores_header() {
        let h = headers(Some("Bearer from-header"), None);
        assert!(extract_token(&h, "authToken", Carrier::CookieOnly).is_none());

        let h = headers(Some("Bearer from-header"), Some("authToken=from-cookie"));
        assert_eq!(
            extract_token(&h, "authToken", Carrier::CookieOnly).as_deref(),
            Some("from-cookie")
        );
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("authToken", "tok".to_string(), Duration::from_secs(604_800));
        let rendered = cookie.to_string();
        assert!(rendered.starts_with("authToken=tok"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("Secure"));
        assert!(rendered.contains("SameSite=None"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("Max-Age=604800"));
    }

    #[test]
    fn test_clearing_cookie_expires_immediately() {
        let rendered = clearing_cookie("authToken").to_string();
        assert!(rendered.starts_with("authToken=;"));
        assert!(rendered.contains("Max-Age=0"));
        assert!(rendered.contains("SameSite=None"));
    }
}
