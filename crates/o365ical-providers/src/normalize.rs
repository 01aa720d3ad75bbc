//! Graph event records to canonical events.
//!
//! The busy filter and the field mappings live here so the server only ever
//! deals with [`Event`].

use chrono::{DateTime, Utc};
use o365ical_core::{
    AttachmentRef, Attendee, AttendeeRole, Availability, Event, EventTime, Organizer,
    ParticipationStatus, find_teams_link, html_to_text, parse_provider_timestamp,
};

use crate::error::{ProviderError, ProviderResult};
use crate::graph::GraphEvent;
use crate::graph::model::{DateTimeTimeZone, EmailAddress};

/// Returns true if the event belongs in the busy-only view.
///
/// The owner must have accepted, organized or not yet answered it, it must
/// not be all-day, and it must show the owner as busy.
pub fn keep_for_busy_view(event: &GraphEvent) -> bool {
    let responded_ok = matches!(
        event.own_response(),
        None | Some("accepted") | Some("organizer") | Some("none")
    );
    let busy = event
        .show_as
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case("busy"));

    responded_ok && !event.is_all_day && busy
}

/// Maps a Graph response string to a participation status.
pub fn participation_from_response(response: Option<&str>) -> ParticipationStatus {
    match response {
        Some("accepted") => ParticipationStatus::Accepted,
        Some("tentativelyAccepted") | Some("tentative") => ParticipationStatus::Tentative,
        Some("declined") => ParticipationStatus::Declined,
        _ => ParticipationStatus::NeedsAction,
    }
}

/// Maps a Graph attendee type to a role.
pub fn role_from_type(kind: Option<&str>) -> AttendeeRole {
    match kind {
        Some("required") => AttendeeRole::Required,
        _ => AttendeeRole::Optional,
    }
}

/// Maps a Graph `showAs` value to an availability.
pub fn availability_from_show_as(show_as: Option<&str>) -> Availability {
    match show_as {
        Some("free") => Availability::Free,
        Some("tentative") => Availability::Tentative,
        Some("busy") => Availability::Busy,
        Some("oof") => Availability::OutOfOffice,
        Some("workingElsewhere") => Availability::WorkingElsewhere,
        _ => Availability::Unknown,
    }
}

/// Builds the canonical event for a Graph record and its resolved attachments.
///
/// Fails with an invalid-response error when the start or end timestamp is
/// missing or unparseable.
pub fn to_event(raw: &GraphEvent, attachments: Vec<AttachmentRef>) -> ProviderResult<Event> {
    let start = event_time(raw, raw.start.as_ref(), "start")?;
    let end = event_time(raw, raw.end.as_ref(), "end")?;

    let html = raw
        .body
        .as_ref()
        .filter(|b| b.is_html())
        .and_then(|b| b.content.as_deref());
    let body = match raw.body.as_ref() {
        Some(b) if b.is_html() => b.content.as_deref().map(html_to_text).unwrap_or_default(),
        Some(b) => b.content.clone().unwrap_or_default(),
        None => String::new(),
    };

    let join_url = raw
        .online_meeting
        .as_ref()
        .and_then(|m| m.join_url.clone())
        .filter(|u| !u.is_empty())
        .or_else(|| html.and_then(find_teams_link));

    let mut event = Event::new(raw.id.clone(), start, end)
        .with_subject(raw.subject.clone().unwrap_or_default())
        .with_body(body)
        .with_attendees(raw.attendees.iter().filter_map(to_attendee).collect())
        .with_attachments(attachments)
        .with_availability(availability_from_show_as(raw.show_as.as_deref()))
        .with_timestamps(
            raw.created_date_time.as_deref().and_then(parse_rfc3339),
            raw.last_modified_date_time.as_deref().and_then(parse_rfc3339),
        );

    if let Some(location) = raw.location.as_ref().and_then(|l| l.display_name.as_deref())
        && !location.is_empty()
    {
        event = event.with_location(location);
    }
    if let Some(organizer) = raw
        .organizer
        .as_ref()
        .and_then(|o| o.email_address.as_ref())
        .and_then(to_organizer)
    {
        event = event.with_organizer(organizer);
    }
    if let Some(url) = join_url {
        event = event.with_join_url(url);
    }
    if let Some(ref link) = raw.web_link {
        event = event.with_web_link(link.clone());
    }

    Ok(event)
}

fn event_time(
    raw: &GraphEvent,
    value: Option<&DateTimeTimeZone>,
    which: &str,
) -> ProviderResult<EventTime> {
    let value = value.ok_or_else(|| {
        ProviderError::invalid_response(format!("event {} has no {} time", raw.id, which))
    })?;
    let naive = parse_provider_timestamp(&value.date_time).ok_or_else(|| {
        ProviderError::invalid_response(format!(
            "event {} has an invalid {} time `{}`",
            raw.id, which, value.date_time
        ))
    })?;
    Ok(EventTime::from_naive(naive, raw.is_all_day))
}

fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn to_organizer(address: &EmailAddress) -> Option<Organizer> {
    let email = address.address.clone().filter(|a| !a.is_empty())?;
    Some(Organizer {
        email,
        name: address.name.clone().filter(|n| !n.is_empty()),
    })
}

fn to_attendee(raw: &crate::graph::GraphAttendee) -> Option<Attendee> {
    let address = raw.email_address.as_ref()?;
    let email = address.address.clone().filter(|a| !a.is_empty())?;
    let status = participation_from_response(
        raw.status.as_ref().and_then(|s| s.response.as_deref()),
    );

    let attendee = Attendee::new(email, role_from_type(raw.kind.as_deref()), status);
    Some(match address.name.as_deref() {
        Some(name) if !name.is_empty() => attendee.with_name(name),
        _ => attendee,
    })
}
