//! Credential attachment for authenticated requests.
//!
//! # Design
//! A `Credential` is issued once by the login response and then attached by
//! `ExpenseClient` to every authenticated request it builds. Which kind is
//! issued is decided by a single `CredentialPolicy` from configuration, so
//! no call site picks its own transport.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use cookie::Cookie;

use crate::http::{HttpRequest, HttpResponse};

/// Something that can authorise a request.
pub trait Credential: fmt::Debug + Send + Sync {
    fn attach(&self, request: &mut HttpRequest);
}

/// A session cookie captured from `Set-Cookie`.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie {
    name: String,
    value: String,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Read the cookie called `name` out of one `Set-Cookie` header value.
    pub fn from_set_cookie(header: &str, name: &str) -> Option<Self> {
        let cookie = Cookie::parse(header).ok()?;
        if cookie.name() != name || cookie.value().trim().is_empty() {
            return None;
        }
        Some(Self::new(cookie.name(), cookie.value()))
    }
}

impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionCookie({}=********)", self.name)
    }
}

impl Credential for SessionCookie {
    fn attach(&self, request: &mut HttpRequest) {
        let cookie = Cookie::new(self.name.as_str(), self.value.as_str());
        request.push_header("cookie", cookie.stripped().to_string());
    }
}

/// A token sent as `Authorization: Bearer <token>`.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(********)")
    }
}

impl Credential for BearerToken {
    fn attach(&self, request: &mut HttpRequest) {
        request.push_header("authorization", format!("Bearer {}", self.0));
    }
}

/// How the login response's credential is read and later presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialPolicy {
    /// Use the cookie called `name` from `Set-Cookie`.
    Cookie { name: String },
    /// Use the `token` field of the login body as a bearer token.
    Bearer,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        CredentialPolicy::Cookie {
            name: "token".to_string(),
        }
    }
}

impl CredentialPolicy {
    /// Extract the credential a successful login issued, if any.
    pub fn issue(&self, response: &HttpResponse, body_token: Option<&str>) -> Option<Arc<dyn Credential>> {
        match self {
            CredentialPolicy::Cookie { name } => response
                .header_values("set-cookie")
                .find_map(|header| SessionCookie::from_set_cookie(header, name))
                .map(|cookie| Arc::new(cookie) as Arc<dyn Credential>),
            CredentialPolicy::Bearer => body_token
                .filter(|token| !token.is_empty())
                .map(|token| Arc::new(BearerToken::new(token)) as Arc<dyn Credential>),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown credential policy \"{0}\" (expected \"cookie\" or \"bearer\")")]
pub struct UnknownPolicy(pub String);

impl FromStr for CredentialPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cookie" => Ok(CredentialPolicy::default()),
            "bearer" => Ok(CredentialPolicy::Bearer),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}
