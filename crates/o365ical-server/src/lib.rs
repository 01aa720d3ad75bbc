//! Feed daemon: storage, window cache, attachment mirror, refresher, HTTP.
//!
//! This crate provides the o365ical daemon that handles:
//! - The OAuth sign-in flow and the session registry
//! - Serving each user's calendar as an iCalendar feed
//! - Caching the month after the current week in SQLite with a TTL
//! - Background refresh of the cached windows
//! - Mirroring meeting attachments to local disk
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use o365ical_server::{
//!     AppState, AttachmentMirror, CalendarService, Config, Refresher, RefresherConfig,
//!     SessionRegistry, SqliteStore, Storage, WindowCache,
//! };
//! use o365ical_providers::OAuthClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load()?;
//!     let store: Arc<dyn Storage> = Arc::new(SqliteStore::open(&config.storage.database_path())?);
//!     let cache = WindowCache::new(store.clone(), config.refresh.ttl());
//!     let mirror = AttachmentMirror::new(store.clone(), config.storage.attachments_path());
//!     let oauth = OAuthClient::new(config.oauth.to_credentials()?, config.graph.timeout())?;
//!
//!     let registry = Arc::new(SessionRegistry::with_known_users(store.load_user_tokens()?));
//!     let calendar = Arc::new(CalendarService::new(cache.clone(), mirror.clone()));
//!     let refresher =
//!         Refresher::new(RefresherConfig::new(config.refresh.tick()), registry.clone(), cache);
//!     let refresher_handle = refresher.handle();
//!     tokio::spawn(refresher.run());
//!
//!     let state = AppState {
//!         registry,
//!         store,
//!         calendar,
//!         mirror,
//!         oauth: Arc::new(oauth),
//!         graph: config.graph.to_graph_config(),
//!         refresher: refresher_handle,
//!         public_url: config.server.public_url.clone(),
//!     };
//!     o365ical_server::http::serve(config.server.listen, state, async {}).await?;
//!     Ok(())
//! }
//! ```

pub mod attachments;
pub mod calendar;
pub mod config;
pub mod error;
pub mod http;
pub mod refresher;
pub mod registry;
pub mod secret;
pub mod store;
pub mod window_cache;

pub use attachments::{AttachmentMirror, DEFAULT_CONTENT_TYPE, attachment_url};
pub use calendar::CalendarService;
pub use config::{
    Config, GraphSettings, LoggingSettings, OAuthSettings, RefreshSettings, ServerSettings,
    StorageSettings,
};
pub use error::{ServerError, ServerResult};
pub use http::{AppState, COOKIE_NAME, router};
pub use refresher::{
    PassReport, Refresher, RefresherCommand, RefresherConfig, RefresherHandle, RefresherState,
    SharedRefresherState,
};
pub use registry::{SessionRegistry, TOKEN_LENGTH, UserHandle, generate_token};
pub use secret::SecretError;
pub use store::{AttachmentRecord, SqliteStore, Storage, StoreError, StoredWindow};
pub use window_cache::{CachedWindow, DEFAULT_TTL, WindowCache};
