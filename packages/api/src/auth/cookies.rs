//! # Session cookies
//!
//! Every place the API writes or clears an auth cookie goes through
//! [`CookieManager`], so the security attributes stay identical everywhere:
//!
//! | Name | httpOnly | secure | sameSite | path | maxAge |
//! |------|----------|--------|----------|------|--------|
//! | `accessToken` | true | production only | Strict | `/` | 15 minutes |
//! | `refreshToken` | true | production only | Strict | `/` | 7 days |
//!
//! [`CookieAttributes`] is the one definition of `httpOnly`/`secure`/`sameSite`/
//! `path`. Set and clear both read it; a removal cookie whose attributes differ
//! from the ones used at set time is ignored by browsers and leaves the user
//! signed in.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::{Duration, OffsetDateTime};

use super::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::settings::Environment;

/// Lifetime of the access token and its cookie.
pub const ACCESS_TOKEN_MAX_AGE: Duration = Duration::minutes(15);
/// Lifetime of the refresh token and its cookie.
pub const REFRESH_TOKEN_MAX_AGE: Duration = Duration::days(7);

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CookieError {
    #[error("invalid cookie name {0:?}")]
    InvalidName(String),
    #[error("invalid characters in value of cookie {0:?}")]
    InvalidValue(String),
}

/// Security attributes shared by every auth cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieAttributes {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: &'static str,
}

impl CookieAttributes {
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            http_only: true,
            secure: environment.is_production(),
            same_site: SameSite::Strict,
            path: "/",
        }
    }
}

/// Per-call overrides. Every `Some` wins over the secure default.
#[derive(Debug, Clone, Default)]
pub struct CookieOptions {
    pub http_only: Option<bool>,
    pub secure: Option<bool>,
    pub same_site: Option<SameSite>,
    pub path: Option<String>,
    pub max_age: Option<Duration>,
}

impl CookieOptions {
    pub fn max_age(max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
            ..Self::default()
        }
    }
}

/// Writes and clears the session cookies for one environment.
#[derive(Debug, Clone)]
pub struct CookieManager {
    attributes: CookieAttributes,
}

impl CookieManager {
    pub fn new(environment: Environment) -> Self {
        Self {
            attributes: CookieAttributes::for_environment(environment),
        }
    }

    pub fn attributes(&self) -> &CookieAttributes {
        &self.attributes
    }

    /// Add a cookie built from the secure defaults merged with `options`.
    pub fn set_secure_cookie(
        &self,
        jar: CookieJar,
        name: &str,
        value: &str,
        options: CookieOptions,
    ) -> Result<CookieJar, CookieError> {
        if !is_valid_name(name) {
            return Err(CookieError::InvalidName(name.to_string()));
        }
        if !is_valid_value(value) {
            return Err(CookieError::InvalidValue(name.to_string()));
        }

        let defaults = &self.attributes;
        let cookie = Cookie::build((name.to_string(), value.to_string()))
            .http_only(options.http_only.unwrap_or(defaults.http_only))
            .secure(options.secure.unwrap_or(defaults.secure))
            .same_site(options.same_site.unwrap_or(defaults.same_site))
            .path(options.path.unwrap_or_else(|| defaults.path.to_string()))
            .max_age(options.max_age.unwrap_or(ACCESS_TOKEN_MAX_AGE))
            .build();

        Ok(jar.add(cookie))
    }

    pub fn set_access_token(&self, jar: CookieJar, token: &str) -> Result<CookieJar, CookieError> {
        self.set_secure_cookie(
            jar,
            ACCESS_TOKEN_COOKIE,
            token,
            CookieOptions::max_age(ACCESS_TOKEN_MAX_AGE),
        )
    }

    pub fn set_refresh_token(&self, jar: CookieJar, token: &str) -> Result<CookieJar, CookieError> {
        self.set_secure_cookie(
            jar,
            REFRESH_TOKEN_COOKIE,
            token,
            CookieOptions::max_age(REFRESH_TOKEN_MAX_AGE),
        )
    }

    /// Set both session cookies.
    pub fn set_session(
        &self,
        jar: CookieJar,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<CookieJar, CookieError> {
        let jar = self.set_access_token(jar, access_token)?;
        self.set_refresh_token(jar, refresh_token)
    }

    /// Emit removal cookies for both session cookies.
    ///
    /// Removal cookies are always emitted, even when the request carried neither
    /// cookie, so a stale cookie the server never saw is still cleared.
    pub fn clear_auth_cookies(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.removal(ACCESS_TOKEN_COOKIE))
            .add(self.removal(REFRESH_TOKEN_COOKIE))
    }

    fn removal(&self, name: &'static str) -> Cookie<'static> {
        let attributes = &self.attributes;
        Cookie::build((name, ""))
            .http_only(attributes.http_only)
            .secure(attributes.secure)
            .same_site(attributes.same_site)
            .path(attributes.path)
            .max_age(Duration::ZERO)
            .expires(OffsetDateTime::UNIX_EPOCH)
            .build()
    }
}

// RFC 6265 token.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic()
                && !matches!(
                    b,
                    b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\' | b'"'
                        | b'/' | b'[' | b']' | b'?' | b'=' | b'{' | b'}'
                )
        })
}

// RFC 6265 cookie-octet.
fn is_valid_value(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b.is_ascii_graphic() && !matches!(b, b'"' | b',' | b';' | b'\\'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::SET_COOKIE;
    use axum::response::IntoResponse;

    fn set_cookies(jar: CookieJar) -> Vec<Cookie<'static>> {
        let response = jar.into_response();
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| Cookie::parse(v.to_str().unwrap().to_string()).unwrap())
            .collect()
    }

    fn find<'a>(cookies: &'a [Cookie<'static>], name: &str) -> &'a Cookie<'static> {
        cookies.iter().find(|c| c.name() == name).unwrap()
    }

    #[test]
    fn test_access_token_cookie_outside_production() {
        let cookies = CookieManager::new(Environment::Development);
        let jar = cookies.set_access_token(CookieJar::new(), "abc").unwrap();
        let set = set_cookies(jar);
        let cookie = find(&set, ACCESS_TOKEN_COOKIE);

        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), None);
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::minutes(15)));
    }

    #[test]
    fn test_access_token_cookie_in_production() {
        let cookies = CookieManager::new(Environment::Production);
        let jar = cookies.set_access_token(CookieJar::new(), "abc").unwrap();
        let set = set_cookies(jar);
        let cookie = find(&set, ACCESS_TOKEN_COOKIE);

        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
    }

    #[test]
    fn test_refresh_token_cookie_lives_seven_days() {
        let cookies = CookieManager::new(Environment::Development);
        let jar = cookies.set_refresh_token(CookieJar::new(), "r1").unwrap();
        let set = set_cookies(jar);
        let cookie = find(&set, REFRESH_TOKEN_COOKIE);

        assert_eq!(cookie.max_age(), Some(Duration::days(7)));
        assert!(REFRESH_TOKEN_MAX_AGE > ACCESS_TOKEN_MAX_AGE);
    }

    #[test]
    fn test_caller_options_win() {
        let cookies = CookieManager::new(Environment::Production);
        let options = CookieOptions {
            secure: Some(false),
            same_site: Some(SameSite::Lax),
            path: Some("/api".into()),
            max_age: Some(Duration::seconds(30)),
            ..CookieOptions::default()
        };
        let jar = cookies
            .set_secure_cookie(CookieJar::new(), "prefs", "dark", options)
            .unwrap();
        let set = set_cookies(jar);
        let cookie = find(&set, "prefs");

        assert_eq!(cookie.secure(), None);
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/api"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(30)));
        // Not overridden
        assert_eq!(cookie.http_only(), Some(true));
    }

    #[test]
    fn test_invalid_cookie_is_an_error() {
        let cookies = CookieManager::new(Environment::Development);
        assert_eq!(
            cookies
                .set_secure_cookie(CookieJar::new(), "a;b", "v", CookieOptions::default())
                .unwrap_err(),
            CookieError::InvalidName("a;b".into())
        );
        assert_eq!(
            cookies
                .set_access_token(CookieJar::new(), "abc; Domain=evil.example")
                .unwrap_err(),
            CookieError::InvalidValue(ACCESS_TOKEN_COOKIE.into())
        );
    }

    #[test]
    fn test_clear_uses_set_time_attributes() {
        for environment in [Environment::Development, Environment::Production] {
            let cookies = CookieManager::new(environment);
            let issued = set_cookies(cookies.set_session(CookieJar::new(), "a", "r").unwrap());
            let cleared = set_cookies(cookies.clear_auth_cookies(CookieJar::new()));
            assert_eq!(cleared.len(), 2);

            for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
                let set = find(&issued, name);
                let clear = find(&cleared, name);
                assert_eq!(clear.value(), "");
                assert_eq!(clear.max_age(), Some(Duration::ZERO));
                assert_eq!(clear.http_only(), set.http_only());
                assert_eq!(clear.secure(), set.secure());
                assert_eq!(clear.same_site(), set.same_site());
                assert_eq!(clear.path(), set.path());
            }
        }
    }
}
