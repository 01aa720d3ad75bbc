//! OAuth 2.0 authorization-code flow against the Microsoft identity platform.
//!
//! # Flow Overview
//!
//! 1. The feed's `/` route redirects the browser to [`OAuthClient::authorize_url`]
//! 2. The user signs in and consents; Azure AD redirects to `/token?code=...`
//! 3. [`OAuthClient::exchange_code`] trades the code for access and refresh tokens
//! 4. [`crate::tokens::OAuthSession`] refreshes the access token as it expires

use std::time::Duration;

use rand::Rng as _;
use rand::distr::Alphanumeric;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::config::OAuthCredentials;
use crate::error::{ProviderError, ProviderResult, Service, remote_message};
use crate::tokens::TokenInfo;

/// Azure AD authority host.
const MICROSOFT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Length of the random `state` parameter.
const STATE_LENGTH: usize = 24;

/// OAuth client for the Microsoft identity platform.
#[derive(Debug)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    http_client: reqwest::Client,
    authority: String,
}

impl OAuthClient {
    /// Creates a new OAuth client with the given credentials.
    pub fn new(credentials: OAuthCredentials, timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            credentials,
            http_client,
            authority: MICROSOFT_AUTHORITY.to_string(),
        })
    }

    /// Overrides the authority host (used to point at a mock in tests).
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the credentials this client was built with.
    pub fn credentials(&self) -> &OAuthCredentials {
        &self.credentials
    }

    fn endpoint(&self, name: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/{}",
            self.authority,
            urlencoding::encode(&self.credentials.tenant),
            name
        )
    }

    /// Builds the URL the browser is sent to for sign-in.
    pub fn authorize_url(&self, state: &str) -> ProviderResult<String> {
        let scope = self.credentials.scopes.join(" ");
        let url = Url::parse_with_params(
            &self.endpoint("authorize"),
            &[
                ("client_id", self.credentials.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.credentials.redirect_url.as_str()),
                ("response_mode", "query"),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| ProviderError::configuration(format!("invalid authorize URL: {}", e)))?;
        Ok(url.into())
    }

    /// Exchanges an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> ProviderResult<TokenInfo> {
        let scope = self.credentials.scopes.join(" ");
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.credentials.redirect_url.as_str()),
            ("scope", scope.as_str()),
        ];

        let token_response = self.token_request(&params, "token exchange").await?;

        info!("successfully obtained tokens");
        Ok(TokenInfo::new(
            token_response.access_token,
            token_response.refresh_token,
            token_response.expires_in,
            self.credentials.scopes.clone(),
        ))
    }

    /// Refreshes an expired access token using the refresh token.
    ///
    /// Returns the new access token, the rotated refresh token if the
    /// identity platform issued one, and the lifetime in seconds.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> ProviderResult<(String, Option<String>, Option<i64>)> {
        let scope = self.credentials.scopes.join(" ");
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
            ("scope", scope.as_str()),
        ];

        let token_response = self.token_request(&params, "token refresh").await?;

        debug!("successfully refreshed access token");
        Ok((
            token_response.access_token,
            token_response.refresh_token,
            token_response.expires_in,
        ))
    }

    async fn token_request(
        &self,
        params: &[(&str, &str)],
        what: &str,
    ) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(self.endpoint("token"))
            .form(params)
            .send()
            .await
            .map_err(|e| {
                ProviderError::network(format!("{} request failed: {}", what, e))
                    .with_service(Service::Identity)
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(ProviderError::authentication(format!(
                "{} failed ({}): {}",
                what,
                status,
                remote_message(&body)
            ))
            .with_service(Service::Identity));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {}", e))
                .with_service(Service::Identity)
        })
    }
}

/// Generates a random `state` value for an authorization request.
pub fn generate_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}
