//! OAuth token state and transparent refresh.
//!
//! [`TokenInfo`] holds one token set; [`OAuthSession`] owns it for a signed-in
//! user and implements [`AccessTokenSource`] so the Graph client always gets
//! a live token.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::auth::{AccessTokenSource, BoxFuture};
use crate::error::{ProviderError, ProviderResult};
use crate::oauth::OAuthClient;

/// Seconds shaved off the advertised lifetime so we refresh before expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Information about an OAuth token set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    /// The access token for API requests.
    pub access_token: String,

    /// The refresh token for obtaining new access tokens.
    pub refresh_token: Option<String>,

    /// When the access token expires (with the safety margin applied).
    pub expires_at: Option<DateTime<Utc>>,

    /// The OAuth scopes that were granted.
    pub scopes: Vec<String>,

    /// When the tokens were last refreshed.
    pub last_refresh: DateTime<Utc>,
}

impl TokenInfo {
    /// Creates a new token info from OAuth response data.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.map(expiry_from_now),
            scopes,
            last_refresh: Utc::now(),
        }
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns true if the access token is expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    /// Updates the token set after a refresh.
    ///
    /// The refresh token is only replaced when a new one was issued.
    pub fn update(
        &mut self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) {
        self.access_token = access_token.into();
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        self.expires_at = expires_in_secs.map(expiry_from_now);
        self.last_refresh = Utc::now();
    }
}

fn expiry_from_now(secs: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(secs) - Duration::seconds(EXPIRY_MARGIN_SECS)
}

/// A signed-in user's token set, refreshed on demand.
///
/// The mutex serializes refreshes: concurrent callers wait for the first one
/// and then reuse its token.
#[derive(Debug)]
pub struct OAuthSession {
    client: Arc<OAuthClient>,
    tokens: Mutex<TokenInfo>,
}

impl OAuthSession {
    /// Creates a session from freshly exchanged tokens.
    pub fn new(client: Arc<OAuthClient>, tokens: TokenInfo) -> Self {
        Self {
            client,
            tokens: Mutex::new(tokens),
        }
    }

    /// Returns a copy of the current token set.
    pub async fn snapshot(&self) -> TokenInfo {
        self.tokens.lock().await.clone()
    }

    async fn current_token(&self) -> ProviderResult<String> {
        let mut tokens = self.tokens.lock().await;
        if !tokens.is_expired() {
            return Ok(tokens.access_token.clone());
        }

        let refresh_token = tokens.refresh_token.clone().ok_or_else(|| {
            ProviderError::authentication("access token expired and no refresh token available")
        })?;

        debug!("access token expired, refreshing");
        let (access, rotated, expires_in) = self.client.refresh_token(&refresh_token).await?;
        tokens.update(access, rotated, expires_in);
        Ok(tokens.access_token.clone())
    }
}

impl AccessTokenSource for OAuthSession {
    fn access_token(&self) -> BoxFuture<'_, ProviderResult<String>> {
        Box::pin(self.current_token())
    }
}
