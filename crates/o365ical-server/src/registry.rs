//! Session registry: opaque session tokens to signed-in users.
//!
//! A session is minted when a browser first reaches the feed and becomes
//! active once the OAuth code exchange succeeds. At most one active session
//! exists per username. Sessions live for the process lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use o365ical_providers::{GraphClient, UserIdentity};
use rand::Rng as _;
use rand::distr::Alphanumeric;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{ServerError, ServerResult};

/// Length of a session token.
pub const TOKEN_LENGTH: usize = 60;

/// A signed-in user: who they are and how to reach their calendar.
#[derive(Debug)]
pub struct UserHandle {
    /// Identity resolved from the profile at sign-in.
    pub identity: UserIdentity,
    /// Graph client bound to the user's tokens.
    pub client: GraphClient,
}

impl UserHandle {
    /// Creates a handle.
    pub fn new(identity: UserIdentity, client: GraphClient) -> Self {
        Self { identity, client }
    }

    /// Username keying the caches.
    pub fn username(&self) -> &str {
        &self.identity.username
    }
}

#[derive(Debug, Clone)]
enum SessionState {
    /// Minted, waiting for the OAuth redirect carrying `oauth_state`.
    Pending { oauth_state: String },
    /// Signed in.
    Active(Arc<UserHandle>),
}

/// Internally synchronized map of sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionState>>,
    /// Persisted `username -> token` mappings of returning users.
    known_users: RwLock<HashMap<String, String>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry aware of persisted returning users.
    pub fn with_known_users(known_users: HashMap<String, String>) -> Self {
        Self {
            sessions: RwLock::default(),
            known_users: RwLock::new(known_users),
        }
    }

    /// Mints a new pending session expecting `oauth_state` back from the
    /// identity platform, and returns its token.
    pub async fn create_pending(&self, oauth_state: impl Into<String>) -> String {
        let token = generate_token();
        self.sessions.write().await.insert(
            token.clone(),
            SessionState::Pending {
                oauth_state: oauth_state.into(),
            },
        );
        debug!("pending session created");
        token
    }

    /// Checks that `token` is pending and was issued `oauth_state`.
    pub async fn check_pending(&self, token: &str, oauth_state: &str) -> ServerResult<()> {
        match self.sessions.read().await.get(token) {
            Some(SessionState::Pending { oauth_state: expected }) if expected == oauth_state => {
                Ok(())
            }
            _ => Err(ServerError::Unauthenticated),
        }
    }

    /// Returns true if `token` names a pending or active session.
    pub async fn contains(&self, token: &str) -> bool {
        self.sessions.read().await.contains_key(token)
    }

    /// Returns the user behind an active session.
    pub async fn resolve(&self, token: &str) -> ServerResult<Arc<UserHandle>> {
        match self.sessions.read().await.get(token) {
            Some(SessionState::Active(handle)) => Ok(handle.clone()),
            _ => Err(ServerError::Unauthenticated),
        }
    }

    /// Activates the session `token` for a freshly signed-in user and returns
    /// the token that is active afterwards.
    ///
    /// If the user already has a live session under another token, that token
    /// is kept and now points at the new handle. Otherwise, if the user is a
    /// known returning user, the persisted token is adopted. In both cases
    /// `token` itself is discarded.
    pub async fn activate(&self, token: &str, handle: UserHandle) -> String {
        let username = handle.username().to_string();
        let mut sessions = self.sessions.write().await;
        let mut known_users = self.known_users.write().await;

        let live = sessions.iter().find_map(|(key, state)| match state {
            SessionState::Active(h) if h.username() == username && key != token => {
                Some(key.clone())
            }
            _ => None,
        });
        let active = live
            .or_else(|| known_users.get(&username).cloned())
            .unwrap_or_else(|| token.to_string());

        if active != token {
            sessions.remove(token);
        }
        sessions.insert(active.clone(), SessionState::Active(Arc::new(handle)));
        known_users.insert(username.clone(), active.clone());

        info!(user = %username, reused = active != token, "session activated");
        active
    }

    /// Returns the handles of every active session.
    pub async fn active_sessions(&self) -> Vec<Arc<UserHandle>> {
        self.sessions
            .read()
            .await
            .values()
            .filter_map(|state| match state {
                SessionState::Active(handle) => Some(handle.clone()),
                SessionState::Pending { .. } => None,
            })
            .collect()
    }

    /// Number of sessions, pending included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns true if there are no sessions.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Generates a random session token.
pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use o365ical_providers::{GraphConfig, StaticToken};

    fn handle(username: &str) -> UserHandle {
        let client =
            GraphClient::new(&GraphConfig::default(), Arc::new(StaticToken::new("t"))).unwrap();
        UserHandle::new(
            UserIdentity {
                username: username.to_string(),
                mail: format!("{}@contoso.com", username),
                display_name: username.to_uppercase(),
            },
            client,
        )
    }

    #[test]
    fn tokens_are_long_and_random() {
        let a = generate_token();
        assert_eq!(a.len(), TOKEN_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, generate_token());
    }

    #[tokio::test]
    async fn pending_sessions_do_not_resolve() {
        let registry = SessionRegistry::new();
        let token = registry.create_pending("xyz").await;

        assert!(registry.contains(&token).await);
        assert!(registry.check_pending(&token, "xyz").await.is_ok());
        assert!(registry.check_pending(&token, "forged").await.is_err());
        assert!(registry.check_pending("nope", "xyz").await.is_err());
        assert!(matches!(
            registry.resolve(&token).await,
            Err(ServerError::Unauthenticated)
        ));
        assert!(registry.active_sessions().await.is_empty());
        assert!(matches!(
            registry.resolve("nope").await,
            Err(ServerError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn first_sign_in_keeps_token() {
        let registry = SessionRegistry::new();
        let token = registry.create_pending("xyz").await;

        let active = registry.activate(&token, handle("jdoe")).await;
        assert_eq!(active, token);
        assert!(registry.check_pending(&token, "xyz").await.is_err());
        assert_eq!(registry.resolve(&token).await.unwrap().username(), "jdoe");
        assert_eq!(registry.active_sessions().await.len(), 1);
    }

    #[tokio::test]
    async fn second_sign_in_reuses_live_token() {
        let registry = SessionRegistry::new();
        let first = registry.create_pending("xyz").await;
        registry.activate(&first, handle("jdoe")).await;

        let second = registry.create_pending("xyz").await;
        let active = registry.activate(&second, handle("jdoe")).await;

        assert_eq!(active, first);
        assert!(!registry.contains(&second).await);
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.active_sessions().await.len(), 1);
    }

    #[tokio::test]
    async fn returning_user_adopts_persisted_token() {
        let known = HashMap::from([("jdoe".to_string(), "persisted-token".to_string())]);
        let registry = SessionRegistry::with_known_users(known);

        let fresh = registry.create_pending("xyz").await;
        let active = registry.activate(&fresh, handle("jdoe")).await;

        assert_eq!(active, "persisted-token");
        assert!(!registry.contains(&fresh).await);
        assert_eq!(
            registry.resolve("persisted-token").await.unwrap().username(),
            "jdoe"
        );
    }

    #[tokio::test]
    async fn users_are_independent() {
        let registry = SessionRegistry::new();
        let a = registry.create_pending("xyz").await;
        let b = registry.create_pending("xyz").await;
        registry.activate(&a, handle("jdoe")).await;
        registry.activate(&b, handle("asmith")).await;

        assert_eq!(registry.resolve(&a).await.unwrap().username(), "jdoe");
        assert_eq!(registry.resolve(&b).await.unwrap().username(), "asmith");
        assert_eq!(registry.active_sessions().await.len(), 2);
    }
}
