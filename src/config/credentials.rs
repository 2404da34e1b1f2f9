//! Jira credential resolution.

use reqwest::Url;

use crate::api::{ApiError, Result};

/// Environment variable holding the Jira instance URL.
pub const ENV_URL: &str = "JIRA_URL";
/// Environment variable holding the Jira user (email).
pub const ENV_USER: &str = "JIRA_USER";
/// Environment variable holding the Jira API token.
pub const ENV_TOKEN: &str = "JIRA_API_TOKEN";

/// Credentials supplied by the caller. Any field left `None` falls back to
/// the environment.
#[derive(Debug, Clone, Default)]
pub struct CredentialInput {
    /// The Jira instance URL.
    pub url: Option<String>,
    /// The user's email address.
    pub user: Option<String>,
    /// The API token.
    pub token: Option<String>,
}

/// Resolved, validated Jira credentials.
///
/// Immutable once built. The base URL never ends with `/`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    base_url: String,
    user: String,
    token: String,
}

impl Credentials {
    /// Resolve credentials from explicit input, falling back to `lookup` for
    /// anything missing.
    ///
    /// `lookup` is called with [`ENV_URL`], [`ENV_USER`] and [`ENV_TOKEN`].
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Authentication`] if any value is missing or empty
    /// after fallback, if the URL is not an absolute http(s) URL, or if the
    /// user does not look like an email address.
    pub fn resolve<F>(input: CredentialInput, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |explicit: Option<String>, var: &str| {
            explicit
                .filter(|v| !v.trim().is_empty())
                .or_else(|| lookup(var))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let url = pick(input.url, ENV_URL);
        let user = pick(input.user, ENV_USER);
        let token = pick(input.token, ENV_TOKEN);

        let (Some(url), Some(user), Some(token)) = (url, user, token) else {
            return Err(ApiError::Authentication(format!(
                "All JIRA credentials must be provided either as parameters or through environment variables ({}, {}, {})",
                ENV_URL, ENV_USER, ENV_TOKEN
            )));
        };

        validate_url(&url)?;
        validate_email(&user)?;

        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            user,
            token,
        })
    }

    /// Resolve credentials, falling back to the process environment.
    pub fn from_env(input: CredentialInput) -> Result<Self> {
        Self::resolve(input, |var| std::env::var(var).ok())
    }

    /// The Jira instance URL without a trailing `/`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The user's email address.
    pub fn user(&self) -> &str {
        &self.user
    }

    pub(crate) fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("token", &"<redacted>")
            .finish()
    }
}

fn validate_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url)
        .map_err(|e| ApiError::Authentication(format!("'{}' is not a valid URL: {}", url, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::Authentication(format!(
            "URL must start with http:// or https://, got '{}'",
            url
        )));
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ApiError::Authentication(format!(
            "URL '{}' has no host",
            url
        )));
    }

    if parsed.scheme() == "http" && parsed.host_str() != Some("localhost") {
        tracing::warn!("URL does not use HTTPS: {}. This is insecure for production use.", url);
    }

    Ok(())
}

fn validate_email(user: &str) -> Result<()> {
    let invalid = || {
        ApiError::Authentication(format!(
            "'{}' does not appear to be a valid email address",
            user
        ))
    };

    if user.contains(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = user.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ErrorKind;
    use serial_test::serial;

    fn explicit(url: &str, user: &str, token: &str) -> CredentialInput {
        CredentialInput {
            url: Some(url.to_string()),
            user: Some(user.to_string()),
            token: Some(token.to_string()),
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_resolve_explicit_values() {
        let creds = Credentials::resolve(
            explicit("https://test.atlassian.net", "test@example.com", "test-token"),
            no_env,
        )
        .unwrap();

        assert_eq!(creds.base_url(), "https://test.atlassian.net");
        assert_eq!(creds.user(), "test@example.com");
        assert_eq!(creds.token(), "test-token");
    }

    #[test]
    fn test_resolve_strips_trailing_slashes() {
        let creds = Credentials::resolve(
            explicit("https://test.atlassian.net///", "test@example.com", "t"),
            no_env,
        )
        .unwrap();
        assert_eq!(creds.base_url(), "https://test.atlassian.net");
    }

    #[test]
    fn test_resolve_falls_back_to_lookup() {
        let creds = Credentials::resolve(CredentialInput::default(), |var| match var {
            ENV_URL => Some("https://env-test.atlassian.net".to_string()),
            ENV_USER => Some("env-user@example.com".to_string()),
            ENV_TOKEN => Some("env-token".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(creds.base_url(), "https://env-test.atlassian.net");
        assert_eq!(creds.user(), "env-user@example.com");
        assert_eq!(creds.token(), "env-token");
    }

    #[test]
    fn test_explicit_values_win_over_lookup() {
        let creds = Credentials::resolve(
            CredentialInput {
                user: Some("explicit@example.com".to_string()),
                ..Default::default()
            },
            |var| match var {
                ENV_URL => Some("https://env-test.atlassian.net".to_string()),
                ENV_USER => Some("env-user@example.com".to_string()),
                ENV_TOKEN => Some("env-token".to_string()),
                _ => None,
            },
        )
        .unwrap();

        assert_eq!(creds.user(), "explicit@example.com");
    }

    #[test]
    fn test_missing_user_fails_closed() {
        let err = Credentials::resolve(
            CredentialInput {
                url: Some("https://test.atlassian.net".to_string()),
                user: None,
                token: Some("test-token".to_string()),
            },
            no_env,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert!(err
            .to_string()
            .contains("All JIRA credentials must be provided"));
    }

    #[test]
    fn test_empty_token_is_missing() {
        let err = Credentials::resolve(
            explicit("https://test.atlassian.net", "test@example.com", "   "),
            no_env,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = Credentials::resolve(
            explicit("company.atlassian.net", "test@example.com", "t"),
            no_env,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert!(err.to_string().contains("not a valid URL"));
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let err = Credentials::resolve(
            explicit("ftp://company.atlassian.net", "test@example.com", "t"),
            no_env,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must start with http"));
    }

    #[test]
    fn test_http_localhost_accepted() {
        assert!(Credentials::resolve(
            explicit("http://localhost:8080", "test@example.com", "t"),
            no_env,
        )
        .is_ok());
    }

    #[test]
    fn test_invalid_email_rejected() {
        for user in ["not-an-email", "@example.com", "user@", "user@localhost", "a b@example.com"] {
            let err = Credentials::resolve(
                explicit("https://test.atlassian.net", user, "t"),
                no_env,
            )
            .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Authentication, "user {:?}", user);
            assert!(err.to_string().contains("valid email"));
        }
    }

    #[test]
    fn test_debug_does_not_expose_token() {
        let creds = Credentials::resolve(
            explicit("https://test.atlassian.net", "test@example.com", "secret_token"),
            no_env,
        )
        .unwrap();
        assert!(!format!("{:?}", creds).contains("secret_token"));
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        std::env::set_var(ENV_URL, "https://process-env.atlassian.net/");
        std::env::set_var(ENV_USER, "process@example.com");
        std::env::set_var(ENV_TOKEN, "process-token");

        let result = Credentials::from_env(CredentialInput::default());

        std::env::remove_var(ENV_URL);
        std::env::remove_var(ENV_USER);
        std::env::remove_var(ENV_TOKEN);

        let creds = result.unwrap();
        assert_eq!(creds.base_url(), "https://process-env.atlassian.net");
        assert_eq!(creds.user(), "process@example.com");
    }

    #[test]
    #[serial]
    fn test_from_env_without_environment_fails() {
        std::env::remove_var(ENV_URL);
        std::env::remove_var(ENV_USER);
        std::env::remove_var(ENV_TOKEN);

        let err = Credentials::from_env(CredentialInput::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }
}
