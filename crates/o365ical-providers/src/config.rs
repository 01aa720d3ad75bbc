//! Microsoft identity platform and Graph client configuration.

use std::time::Duration;

/// OAuth 2.0 credentials of the Azure AD application registration.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    /// Application (client) ID.
    pub client_id: String,
    /// Client secret value.
    pub client_secret: String,
    /// Directory (tenant) ID, or `common` / `organizations`.
    pub tenant: String,
    /// Redirect URI registered for the application; must point at `/token`.
    pub redirect_url: String,
    /// Scopes to request.
    pub scopes: Vec<String>,
}

impl OAuthCredentials {
    /// Scopes needed to read the calendar offline.
    pub const DEFAULT_SCOPES: [&'static str; 3] = ["offline_access", "user.read", "calendars.read"];

    /// Creates new credentials with the default scopes.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        tenant: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            tenant: tenant.into(),
            redirect_url: redirect_url.into(),
            scopes: Self::DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Builder method to override the scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Validates that every required value is present.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        if self.tenant.is_empty() {
            return Err("tenant is required");
        }
        if self.redirect_url.is_empty() {
            return Err("redirect_url is required");
        }
        if !self.scopes.iter().any(|s| s == "offline_access") {
            return Err("scopes must include offline_access");
        }
        Ok(())
    }
}

/// Configuration for the Graph client.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// API root, without trailing slash.
    pub base_url: String,
    /// `$top` for calendar view pages.
    pub page_size: usize,
    /// Request timeout.
    pub timeout: Duration,
    /// User agent string for API requests.
    pub user_agent: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            page_size: Self::DEFAULT_PAGE_SIZE,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("o365ical/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl GraphConfig {
    /// Microsoft Graph v1.0 endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://graph.microsoft.com/v1.0";

    /// Default page size.
    pub const DEFAULT_PAGE_SIZE: usize = 10;

    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Builder method to set the API root (used to point at a mock in tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Builder method to set the page size.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Builder method to set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> OAuthCredentials {
        OAuthCredentials::new("app-id", "s3cret", "contoso", "https://feed.example/token")
    }

    #[test]
    fn default_scopes() {
        let creds = credentials();
        assert_eq!(creds.scopes, vec!["offline_access", "user.read", "calendars.read"]);
        assert!(creds.validate().is_ok());
    }

    #[test]
    fn validate_reports_missing_fields() {
        let mut creds = credentials();
        creds.client_secret.clear();
        assert_eq!(creds.validate(), Err("client_secret is required"));

        let creds = credentials().with_scopes(vec!["user.read".into()]);
        assert_eq!(creds.validate(), Err("scopes must include offline_access"));
    }

    #[test]
    fn graph_config_builders() {
        let config = GraphConfig::default()
            .with_base_url("http://127.0.0.1:9999/")
            .with_page_size(0);
        assert_eq!(config.base_url, "http://127.0.0.1:9999");
        assert_eq!(config.page_size, 1);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
