//! Basic authentication for the Jira API.
//!
//! Jira Cloud accepts Basic Auth with the account email as the username and
//! an API token as the password.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::header::HeaderValue;

use super::error::{ApiError, Result};
use crate::config::Credentials;

/// Authentication credentials for Jira.
#[derive(Debug, Clone)]
pub struct Auth {
    /// The user's email address.
    email: String,
    /// The complete `Basic ...` header, marked sensitive.
    auth_header: HeaderValue,
}

impl Auth {
    /// Create authentication from email and token.
    ///
    /// The token is immediately encoded and the raw token is not stored.
    pub fn new(email: &str, token: &str) -> Result<Self> {
        let mut auth_header = HeaderValue::from_str(&build_auth_header(email, token))
            .map_err(|e| ApiError::Authentication(format!("invalid auth header: {}", e)))?;
        auth_header.set_sensitive(true);

        Ok(Self {
            email: email.to_string(),
            auth_header,
        })
    }

    /// Create authentication from resolved credentials.
    pub fn from_credentials(credentials: &Credentials) -> Result<Self> {
        Self::new(credentials.user(), credentials.token())
    }

    /// Get the authorization header value for HTTP requests.
    pub fn header_value(&self) -> &HeaderValue {
        &self.auth_header
    }

    /// Get the email address.
    pub fn email(&self) -> &str {
        &self.email
    }
}

/// Build the Basic Auth header value.
///
/// Encodes "email:token" in Base64 and prepends "Basic ".
fn build_auth_header(email: &str, token: &str) -> String {
    let credentials = format!("{}:{}", email, token);
    let encoded = BASE64.encode(credentials.as_bytes());
    format!("Basic {}", encoded)
}
