//! Microsoft Graph access.
//!
//! - [`GraphClient`] performs authenticated requests and pagination
//! - [`model`] holds the typed schema of the responses we consume

mod client;
pub mod model;

pub use client::GraphClient;
pub use model::{
    GraphAttachment, GraphAttendee, GraphEvent, Page, UserIdentity, UserProfile,
};
