//! Microsoft Graph access for the o365ical feed.
//!
//! This crate owns everything that talks to Microsoft:
//!
//! - [`GraphClient`] - Authenticated, paginated Graph requests (events,
//!   attachments, profile)
//! - [`OAuthClient`] / [`OAuthSession`] - Authorization-code flow and
//!   transparent token refresh
//! - [`to_event`] / [`keep_for_busy_view`] - Graph records to canonical events
//! - [`ProviderError`] - Error types for provider operations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────────┐
//! │ login.microsoftonline│      │ graph.microsoft.com  │
//! └──────────┬───────────┘      └──────────┬───────────┘
//!            │                             │
//!            ▼                             ▼
//! ┌──────────────────────┐      ┌──────────────────────┐
//! │     OAuthClient      │      │     GraphClient      │
//! └──────────┬───────────┘      └──────────┬───────────┘
//!            │                             │
//!            ▼      AccessTokenSource      │
//! ┌──────────────────────┐                 │
//! │     OAuthSession     │ ◄───────────────┘
//! └──────────────────────┘                 │
//!                                          ▼ calendar_view()
//!                                   ┌─────────────┐
//!                                   │ GraphEvent  │
//!                                   └──────┬──────┘
//!                                          │
//!                                          ▼ to_event()
//!                                   ┌─────────────┐
//!                                   │    Event    │
//!                                   └─────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use o365ical_providers::{GraphClient, keep_for_busy_view, to_event};
//!
//! async fn busy_events(client: &GraphClient, window: &TimeWindow) -> ProviderResult<Vec<Event>> {
//!     let raw = client.calendar_view(window).await?;
//!     raw.iter()
//!         .filter(|e| keep_for_busy_view(e))
//!         .map(|e| to_event(e, Vec::new()))
//!         .collect()
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod graph;
pub mod normalize;
pub mod oauth;
pub mod tokens;

// Re-export main types at crate root
pub use auth::{AccessTokenSource, BoxFuture, StaticToken};
pub use config::{GraphConfig, OAuthCredentials};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult, Service};
pub use graph::{
    GraphAttachment, GraphAttendee, GraphClient, GraphEvent, Page, UserIdentity, UserProfile,
};
pub use normalize::{
    availability_from_show_as, keep_for_busy_view, participation_from_response, role_from_type,
    to_event,
};
pub use oauth::{OAuthClient, generate_state};
pub use tokens::{OAuthSession, TokenInfo};
