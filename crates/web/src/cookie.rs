//! Reading `Cookie` request headers and writing `Set-Cookie` response headers.

use std::fmt;
use std::fmt::Write;
use std::time::Duration;

use bytes::Bytes;
use http::header::{COOKIE, InvalidHeaderValue, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CookieError {
    #[error("cookie header is not visible ascii: {0}")]
    Unreadable(#[from] http::header::ToStrError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => f.write_str("Strict"),
            SameSite::Lax => f.write_str("Lax"),
            SameSite::None => f.write_str("None"),
        }
    }
}

/// A cookie to be sent with `Set-Cookie`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub max_age: Option<Duration>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            max_age: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    /// A cookie that tells the browser to drop `name` at `path`.
    pub fn removal(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, "").with_path(path).with_max_age(Duration::ZERO)
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    pub fn to_header_value(&self) -> String {
        let mut header = format!("{}={}", self.name, self.value);

        // writing into a String cannot fail
        if let Some(path) = &self.path {
            let _ = write!(header, "; Path={path}");
        }
        if let Some(max_age) = &self.max_age {
            let _ = write!(header, "; Max-Age={}", max_age.as_secs());
        }
        if self.secure {
            header.push_str("; Secure");
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        if let Some(same_site) = &self.same_site {
            let _ = write!(header, "; SameSite={same_site}");
        }

        header
    }
}

/// Finds the value of cookie `name` in the request headers.
///
/// Every `Cookie` header is searched, pairs without `=` are skipped and a
/// value wrapped in double quotes is unwrapped. A header that is not visible
/// ASCII is an error rather than "no cookie".
pub fn find_cookie<'h>(headers: &'h HeaderMap, name: &str) -> Result<Option<&'h str>, CookieError> {
    for header in headers.get_all(COOKIE) {
        let header = header.to_str()?;
        let found = header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| unquote(value));
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

fn unquote(value: &str) -> &str {
    value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value)
}

/// Appends a `Set-Cookie` header, keeping any already present.
pub fn set_cookie(response: &mut Response<Bytes>, cookie: &Cookie) -> Result<(), InvalidHeaderValue> {
    let value = HeaderValue::try_from(cookie.to_header_value())?;
    response.headers_mut().append(SET_COOKIE, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cookies: &[&'static str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for cookie in cookies {
            headers.append(COOKIE, HeaderValue::from_static(cookie));
        }
        headers
    }

    #[test]
    fn header_value() {
        let cookie = Cookie::new("X_AUTH", "abc123")
            .with_path("/")
            .http_only(true)
            .with_same_site(SameSite::Lax);
        assert_eq!(cookie.to_header_value(), "X_AUTH=abc123; Path=/; HttpOnly; SameSite=Lax");

        let cookie = cookie.secure(true);
        assert_eq!(cookie.to_header_value(), "X_AUTH=abc123; Path=/; Secure; HttpOnly; SameSite=Lax");
    }

    #[test]
    fn removal_cookie() {
        assert_eq!(Cookie::removal("X_AUTH", "/").to_header_value(), "X_AUTH=; Path=/; Max-Age=0");
    }

    #[test]
    fn find_among_pairs() {
        let headers = headers(&["theme=dark; X_AUTH=abc; lang=ko"]);

        assert_eq!(find_cookie(&headers, "X_AUTH").unwrap(), Some("abc"));
        assert_eq!(find_cookie(&headers, "lang").unwrap(), Some("ko"));
        assert_eq!(find_cookie(&headers, "X_AUTH_2").unwrap(), None);
        assert_eq!(find_cookie(&headers, "x_auth").unwrap(), None);
    }

    #[test]
    fn find_across_headers() {
        let headers = headers(&["theme=dark", "broken; X_AUTH=\"quoted\""]);
        assert_eq!(find_cookie(&headers, "X_AUTH").unwrap(), Some("quoted"));
    }

    #[test]
    fn empty_value_is_present() {
        let headers = headers(&["X_AUTH="]);
        assert_eq!(find_cookie(&headers, "X_AUTH").unwrap(), Some(""));
    }

    #[test]
    fn no_cookie_header() {
        assert_eq!(find_cookie(&HeaderMap::new(), "X_AUTH").unwrap(), None);
    }

    #[test]
    fn unreadable_header() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_bytes(b"X_AUTH=\xff").unwrap());

        assert!(find_cookie(&headers, "X_AUTH").is_err());
    }

    #[test]
    fn set_cookie_appends() {
        let mut response = Response::new(Bytes::new());
        set_cookie(&mut response, &Cookie::new("a", "1")).unwrap();
        set_cookie(&mut response, &Cookie::new("b", "2")).unwrap();

        let values = response.headers().get_all(SET_COOKIE).iter().collect::<Vec<_>>();
        assert_eq!(values, vec!["a=1", "b=2"]);
    }
}
