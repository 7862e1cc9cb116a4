// src/auth/cookies.rs
//! Set-Cookie building and request-cookie parsing
//!
//! The wire contract is three cookies: `access_token` and `refresh_token`
//! are HttpOnly, `logged_in` is a flag the SPA may read. Attributes are
//! assembled by hand; clearing reuses the same names with an empty value
//! and `Max-Age=0`.

use axum::http::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
pub const LOGGED_IN_COOKIE: &str = "logged_in";

fn build_cookie(
    name: &str,
    value: &str,
    max_age_seconds: i64,
    http_only: bool,
    secure: bool,
) -> String {
    let mut cookie = format!(
        "{}={}; Max-Age={}; Path=/; SameSite=Lax",
        name, value, max_age_seconds
    );
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn append_cookie(headers: &mut HeaderMap, cookie: String) {
    // Token material is base64url, so this only skips on a malformed name
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        headers.append(SET_COOKIE, value);
    }
}

/// Headers that install the full login cookie set
pub fn login_cookies(
    access_token: &str,
    refresh_token: &str,
    access_minutes: i64,
    refresh_minutes: i64,
    secure: bool,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    append_cookie(
        &mut headers,
        build_cookie(ACCESS_TOKEN_COOKIE, access_token, access_minutes * 60, true, secure),
    );
    append_cookie(
        &mut headers,
        build_cookie(REFRESH_TOKEN_COOKIE, refresh_token, refresh_minutes * 60, true, secure),
    );
    append_cookie(
        &mut headers,
        build_cookie(LOGGED_IN_COOKIE, "true", access_minutes * 60, false, secure),
    );
    headers
}

/// Headers for a refresh: a new access token plus a renewed `logged_in` flag.
/// The refresh token cookie is left untouched.
pub fn refreshed_cookies(access_token: &str, access_minutes: i64, secure: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    append_cookie(
        &mut headers,
        build_cookie(ACCESS_TOKEN_COOKIE, access_token, access_minutes * 60, true, secure),
    );
    append_cookie(
        &mut headers,
        build_cookie(LOGGED_IN_COOKIE, "true", access_minutes * 60, false, secure),
    );
    headers
}

/// Headers that clear all three cookies with an immediately-past expiry
pub fn clearing_cookies(secure: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    append_cookie(
        &mut headers,
        build_cookie(ACCESS_TOKEN_COOKIE, "", 0, true, secure),
    );
    append_cookie(
        &mut headers,
        build_cookie(REFRESH_TOKEN_COOKIE, "", 0, true, secure),
    );
    append_cookie(
        &mut headers,
        build_cookie(LOGGED_IN_COOKIE, "", 0, false, secure),
    );
    headers
}

/// Read one cookie value out of the request's Cookie header(s)
pub fn request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_cookies(headers: &HeaderMap) -> Vec<String> {
        headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .collect()
    }

    #[test]
    fn test_login_cookies_attributes() {
        let headers = login_cookies("atoken", "rtoken", 15, 60, false);
        let cookies = all_cookies(&headers);
        assert_eq!(cookies.len(), 3);

        let access = &cookies[0];
        assert!(access.starts_with("access_token=atoken; "));
        assert!(access.contains("Max-Age=900"));
        assert!(access.contains("Path=/"));
        assert!(access.contains("SameSite=Lax"));
        assert!(access.contains("HttpOnly"));
        assert!(!access.contains("Secure"));

        let refresh = &cookies[1];
        assert!(refresh.starts_with("refresh_token=rtoken; "));
        assert!(refresh.contains("Max-Age=3600"));
        assert!(refresh.contains("HttpOnly"));

        // The SPA reads this one, so it must not be HttpOnly
        let logged_in = &cookies[2];
        assert!(logged_in.starts_with("logged_in=true; "));
        assert!(!logged_in.contains("HttpOnly"));
    }

    #[test]
    fn test_secure_flag_follows_environment() {
        let dev = all_cookies(&login_cookies("a", "r", 15, 60, false));
        assert!(dev.iter().all(|c| !c.contains("Secure")));

        let prod = all_cookies(&login_cookies("a", "r", 15, 60, true));
        assert!(prod.iter().all(|c| c.contains("Secure")));
    }

    #[test]
    fn test_refreshed_cookies_leave_refresh_token_alone() {
        let cookies = all_cookies(&refreshed_cookies("newtoken", 15, false));
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with("access_token=newtoken; "));
        assert!(cookies[1].starts_with("logged_in=true; "));
        assert!(cookies.iter().all(|c| !c.starts_with("refresh_token=")));
    }

    #[test]
    fn test_clearing_cookies_expire_immediately() {
        let cookies = all_cookies(&clearing_cookies(false));
        assert_eq!(cookies.len(), 3);
        assert!(cookies[0].starts_with("access_token=; "));
        assert!(cookies[1].starts_with("refresh_token=; "));
        assert!(cookies[2].starts_with("logged_in=; "));
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
    }

    #[test]
    fn test_request_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("logged_in=true; access_token=abc.def.ghi; other=1"),
        );

        assert_eq!(
            request_cookie(&headers, "access_token").as_deref(),
            Some("abc.def.ghi")
        );
        assert_eq!(request_cookie(&headers, "logged_in").as_deref(), Some("true"));
        assert!(request_cookie(&headers, "refresh_token").is_none());
    }

    #[test]
    fn test_request_cookie_handles_spacing_and_multiple_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("a=1;  b = 2 "));
        headers.append(COOKIE, HeaderValue::from_static("refresh_token=tok"));

        assert_eq!(request_cookie(&headers, "b").as_deref(), Some("2"));
        assert_eq!(request_cookie(&headers, "refresh_token").as_deref(), Some("tok"));
        assert!(request_cookie(&headers, "missing").is_none());
    }
}
