//! Event types for calendar events.
//!
//! This module provides the canonical event model the feed is rendered from:
//! - [`Event`]: A provider-agnostic event representation
//! - [`Attendee`] / [`Organizer`]: People attached to an event
//! - [`AttachmentRef`]: A mirrored attachment reachable through a local URL
//! - [`Availability`]: How the event blocks the owner's time

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::EventTime;

/// The participation status of an attendee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationStatus {
    /// The attendee has accepted the invitation.
    Accepted,
    /// The attendee has tentatively accepted.
    Tentative,
    /// The attendee has declined the invitation.
    Declined,
    /// The attendee has not responded.
    #[default]
    NeedsAction,
}

impl ParticipationStatus {
    /// Returns the iCalendar `PARTSTAT` value.
    pub fn as_ical(&self) -> &'static str {
        match self {
            Self::Accepted => "ACCEPTED",
            Self::Tentative => "TENTATIVE",
            Self::Declined => "DECLINED",
            Self::NeedsAction => "NEEDS-ACTION",
        }
    }
}

/// The role of an attendee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendeeRole {
    /// The meeting organizer.
    Chair,
    /// A required participant.
    Required,
    /// An optional participant.
    #[default]
    Optional,
}

impl AttendeeRole {
    /// Returns the iCalendar `ROLE` value.
    pub fn as_ical(&self) -> &'static str {
        match self {
            Self::Chair => "CHAIR",
            Self::Required => "REQ-PARTICIPANT",
            Self::Optional => "OPT-PARTICIPANT",
        }
    }
}

/// How an event blocks the owner's time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Free,
    Tentative,
    Busy,
    OutOfOffice,
    WorkingElsewhere,
    #[default]
    Unknown,
}

impl Availability {
    /// Returns true if the event shows the owner as busy.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

/// The organizer of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organizer {
    pub email: String,
    pub name: Option<String>,
}

/// An attendee of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub email: String,
    pub name: Option<String>,
    pub role: AttendeeRole,
    pub status: ParticipationStatus,
}

impl Attendee {
    /// Creates a new attendee.
    pub fn new(email: impl Into<String>, role: AttendeeRole, status: ParticipationStatus) -> Self {
        Self {
            email: email.into(),
            name: None,
            role,
            status,
        }
    }

    /// Builder method to set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A reference to a locally mirrored attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Publicly reachable URL of the mirrored file.
    pub url: String,
    /// MIME type of the attachment.
    pub content_type: String,
}

impl AttachmentRef {
    /// Creates a new attachment reference.
    pub fn new(url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content_type: content_type.into(),
        }
    }
}

/// A provider-agnostic calendar event.
///
/// Events are built once by the provider layer and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Provider-assigned unique identifier.
    pub id: String,
    /// When the event was created.
    pub created: Option<DateTime<Utc>>,
    /// When the event was last modified.
    pub modified: Option<DateTime<Utc>>,
    /// Start time.
    pub start: EventTime,
    /// End time.
    pub end: EventTime,
    /// Title of the event.
    pub subject: String,
    /// Location of the event.
    pub location: Option<String>,
    /// The organizer, if known.
    pub organizer: Option<Organizer>,
    /// Invited attendees.
    pub attendees: Vec<Attendee>,
    /// Plain-text body.
    pub body: String,
    /// Online meeting join link.
    pub join_url: Option<String>,
    /// Link to the event in the provider's web UI.
    pub web_link: Option<String>,
    /// Mirrored attachments.
    pub attachments: Vec<AttachmentRef>,
    /// Free/busy classification.
    pub availability: Availability,
}

impl Event {
    /// Creates a new event with the required fields.
    pub fn new(id: impl Into<String>, start: EventTime, end: EventTime) -> Self {
        Self {
            id: id.into(),
            created: None,
            modified: None,
            start,
            end,
            subject: String::new(),
            location: None,
            organizer: None,
            attendees: Vec::new(),
            body: String::new(),
            join_url: None,
            web_link: None,
            attachments: Vec::new(),
            availability: Availability::default(),
        }
    }

    /// Builder method to set the subject.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method to set the organizer.
    pub fn with_organizer(mut self, organizer: Organizer) -> Self {
        self.organizer = Some(organizer);
        self
    }

    /// Builder method to set the attendees.
    pub fn with_attendees(mut self, attendees: Vec<Attendee>) -> Self {
        self.attendees = attendees;
        self
    }

    /// Builder method to set the plain-text body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Builder method to set the join link.
    pub fn with_join_url(mut self, url: impl Into<String>) -> Self {
        self.join_url = Some(url.into());
        self
    }

    /// Builder method to set the web link.
    pub fn with_web_link(mut self, url: impl Into<String>) -> Self {
        self.web_link = Some(url.into());
        self
    }

    /// Builder method to set the attachments.
    pub fn with_attachments(mut self, attachments: Vec<AttachmentRef>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Builder method to set the availability.
    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }

    /// Builder method to set the created/modified timestamps.
    pub fn with_timestamps(
        mut self,
        created: Option<DateTime<Utc>>,
        modified: Option<DateTime<Utc>>,
    ) -> Self {
        self.created = created;
        self.modified = modified;
        self
    }

    /// Returns true if this is an all-day event.
    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }

    /// Assembles the description shown in calendar clients.
    ///
    /// Sections are the body text, the enumerated attachment links and the
    /// join link, in that order, separated by a blank line. Empty sections
    /// are left out.
    pub fn description(&self) -> String {
        let mut sections = Vec::new();

        let body = self.body.trim_end();
        if !body.is_empty() {
            sections.push(body.to_string());
        }

        if !self.attachments.is_empty() {
            let lines: Vec<String> = self
                .attachments
                .iter()
                .enumerate()
                .map(|(i, att)| format!("Attachment ({}): {}", i + 1, att.url))
                .collect();
            sections.push(lines.join("\n"));
        }

        if let Some(ref url) = self.join_url {
            sections.push(url.clone());
        }

        sections.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Event {
        Event::new(
            "evt-1",
            EventTime::from_utc(Utc.with_ymd_and_hms(2025, 2, 5, 10, 0, 0).unwrap()),
            EventTime::from_utc(Utc.with_ymd_and_hms(2025, 2, 5, 11, 0, 0).unwrap()),
        )
        .with_subject("Standup")
    }

    #[test]
    fn ical_values() {
        assert_eq!(AttendeeRole::Chair.as_ical(), "CHAIR");
        assert_eq!(AttendeeRole::Required.as_ical(), "REQ-PARTICIPANT");
        assert_eq!(AttendeeRole::Optional.as_ical(), "OPT-PARTICIPANT");
        assert_eq!(ParticipationStatus::NeedsAction.as_ical(), "NEEDS-ACTION");
        assert_eq!(ParticipationStatus::Tentative.as_ical(), "TENTATIVE");
    }

    #[test]
    fn description_empty_when_nothing_to_say() {
        assert_eq!(sample().description(), "");
    }

    #[test]
    fn description_sections_in_order() {
        let event = sample()
            .with_body("Agenda\nNotes\n")
            .with_attachments(vec![
                AttachmentRef::new("https://feed.example/attachment/a/one.pdf", "application/pdf"),
                AttachmentRef::new("https://feed.example/attachment/b/two.png", "image/png"),
            ])
            .with_join_url("https://teams.microsoft.com/l/meetup-join/abc");

        assert_eq!(
            event.description(),
            "Agenda\nNotes\n\n\
             Attachment (1): https://feed.example/attachment/a/one.pdf\n\
             Attachment (2): https://feed.example/attachment/b/two.png\n\n\
             https://teams.microsoft.com/l/meetup-join/abc"
        );
    }

    #[test]
    fn description_skips_missing_body() {
        let event = sample().with_join_url("https://teams.microsoft.com/l/x");
        assert_eq!(event.description(), "https://teams.microsoft.com/l/x");
    }

    #[test]
    fn busy_check() {
        assert!(Availability::Busy.is_busy());
        assert!(!Availability::Free.is_busy());
        assert!(!Availability::Unknown.is_busy());
    }
}
