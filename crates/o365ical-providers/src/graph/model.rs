//! Microsoft Graph v1.0 schema types.
//!
//! Only the fields the feed consumes are modelled. Everything optional on the
//! Graph side is an `Option` here, so a missing field never fails decoding;
//! a wrong shape does, and surfaces as an invalid response.
//!
//! These records are also what the window cache persists, hence `Serialize`.

use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ProviderResult};

/// One page of a Graph collection response.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    /// Absolute URL of the next page, absent on the last one.
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

/// A calendar event as returned by `/me/calendarview`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEvent {
    pub id: String,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default)]
    pub last_modified_date_time: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<ItemBody>,
    #[serde(default)]
    pub start: Option<DateTimeTimeZone>,
    #[serde(default)]
    pub end: Option<DateTimeTimeZone>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub online_meeting: Option<OnlineMeetingInfo>,
    #[serde(default)]
    pub web_link: Option<String>,
    #[serde(default)]
    pub organizer: Option<Recipient>,
    #[serde(default)]
    pub attendees: Vec<GraphAttendee>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub show_as: Option<String>,
    #[serde(default)]
    pub response_status: Option<ResponseStatus>,
    #[serde(default)]
    pub has_attachments: bool,
}

impl GraphEvent {
    /// The owner's own response (`accepted`, `organizer`, `none`, ...).
    pub fn own_response(&self) -> Option<&str> {
        self.response_status
            .as_ref()
            .and_then(|r| r.response.as_deref())
    }
}

/// A naive timestamp plus the zone Graph says it is expressed in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeTimeZone {
    pub date_time: String,
    #[serde(default)]
    pub time_zone: Option<String>,
}

/// Event body content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    /// `html` or `text`.
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl ItemBody {
    /// Returns true if the content is HTML.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_none_or(|t| t.eq_ignore_ascii_case("html"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineMeetingInfo {
    #[serde(default)]
    pub join_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    #[serde(default)]
    pub email_address: Option<EmailAddress>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphAttendee {
    /// `required`, `optional` or `resource`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub status: Option<ResponseStatus>,
    #[serde(default)]
    pub email_address: Option<EmailAddress>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseStatus {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
}

/// Attachment metadata from `/me/events/{id}/attachments`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphAttachment {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub is_inline: bool,
}

/// The signed-in user's profile from `/me`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
}

/// Who a session belongs to. Resolved once at sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    /// Local part of the mail address; keys the caches.
    pub username: String,
    pub mail: String,
    pub display_name: String,
}

impl UserProfile {
    /// Derives the user identity from the profile.
    pub fn into_identity(self) -> ProviderResult<UserIdentity> {
        let mail = self
            .user_principal_name
            .filter(|m| !m.is_empty())
            .or(self.mail)
            .ok_or_else(|| ProviderError::invalid_response("profile has no mail address"))?;

        let username = match mail.split_once('@') {
            Some((local, _)) => local.to_string(),
            None => mail.clone(),
        };
        if username.is_empty() {
            return Err(ProviderError::invalid_response(format!(
                "cannot derive username from `{}`",
                mail
            )));
        }

        Ok(UserIdentity {
            display_name: self.display_name.unwrap_or_else(|| username.clone()),
            username,
            mail,
        })
    }
}
