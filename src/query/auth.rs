//! Basic authentication transport
//!
//! When credentials are present, every request leaving the client carries an
//! `Authorization: Basic ...` header. The header is installed as a client
//! default so request method, body and other headers are left alone.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, ClientBuilder};

use crate::error::{PromalyError, Result};

/// Basic-auth credentials; either field being non-empty enables auth
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

// password stays out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.user.is_empty() || !self.password.is_empty()
    }

    /// `Basic base64(user:password)`
    pub fn basic_header(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.user, self.password));
        format!("Basic {}", token)
    }
}

/// Client decorator adding Basic-Authentication to outbound requests
#[derive(Debug, Clone, Default)]
pub struct AuthTransport {
    credentials: Option<Credentials>,
}

impl AuthTransport {
    /// Auth is only active when the credentials say so
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: credentials.is_active().then_some(credentials),
        }
    }

    /// Transport that sends requests unmodified
    pub fn none() -> Self {
        Self { credentials: None }
    }

    pub fn is_active(&self) -> bool {
        self.credentials.is_some()
    }

    /// Headers added to every request; empty when auth is off
    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        if let Some(credentials) = &self.credentials {
            let mut value = HeaderValue::from_str(&credentials.basic_header()).map_err(|e| {
                PromalyError::ClientConstruction(format!("invalid authorization header: {}", e))
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    /// Install the auth headers on a client builder
    pub fn apply(&self, builder: ClientBuilder) -> Result<ClientBuilder> {
        Ok(builder.default_headers(self.headers()?))
    }

    /// Build a client carrying this transport's headers
    pub fn build_client(&self) -> Result<Client> {
        self.apply(Client::builder().user_agent(concat!("promaly/", env!("CARGO_PKG_VERSION"))))?
            .build()
            .map_err(|e| PromalyError::ClientConstruction(e.to_string()))
    }
}
