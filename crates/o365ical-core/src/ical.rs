//! iCalendar rendering of canonical events.
//!
//! [`CalendarDocument`] wraps an [`icalendar::Calendar`] and appends one
//! VEVENT per [`Event`], applying the per-consumer rules of [`OutputMode`]:
//! Google Calendar chokes on large attendee lists and ATTACH properties, so
//! the Google variant only carries the organizer.

use chrono::{DateTime, Utc};
use icalendar::{Calendar, Component, EventLike, Property};
use serde::{Deserialize, Serialize};

use crate::event::{AttendeeRole, Event, Organizer, ParticipationStatus};
use crate::time::EventTime;

const ICAL_TIMESTAMP: &str = "%Y%m%dT%H%M%SZ";

/// Per-consumer output variant, taken from the feed query string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputMode {
    /// Include every event instead of only busy, accepted ones.
    pub full: bool,
    /// Emit the reduced property set Google Calendar accepts.
    pub google: bool,
}

impl OutputMode {
    /// Creates an output mode.
    pub fn new(full: bool, google: bool) -> Self {
        Self { full, google }
    }
}

/// An iCalendar document being assembled for one user.
#[derive(Debug)]
pub struct CalendarDocument {
    calendar: Calendar,
    mode: OutputMode,
    owner: Option<Organizer>,
    events: usize,
}

impl CalendarDocument {
    /// Creates an empty document for `user` with the calendar-level metadata.
    pub fn new(user: &str, mode: OutputMode) -> Self {
        let description = format!("Calendar for user {}", user);
        let mut calendar = Calendar::new();
        calendar
            .append_property(Property::new("METHOD", "REQUEST"))
            .append_property(Property::new("NAME", user))
            .append_property(Property::new("X-WR-CALNAME", user))
            .append_property(Property::new("DESCRIPTION", &description))
            .append_property(Property::new("X-WR-CALDESC", &description))
            .append_property(Property::new("X-WR-TIMEZONE", "UTC"));

        Self {
            calendar,
            mode,
            owner: None,
            events: 0,
        }
    }

    /// Sets the calendar owner, who chairs events that report no organizer.
    #[must_use]
    pub fn with_owner(mut self, owner: Organizer) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Returns the output mode of this document.
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Returns the number of events appended so far.
    pub fn len(&self) -> usize {
        self.events
    }

    /// Returns true if no event has been appended.
    pub fn is_empty(&self) -> bool {
        self.events == 0
    }

    /// Appends one event as a VEVENT.
    pub fn push_event(&mut self, event: &Event) {
        let mut vevent = icalendar::Event::new();
        vevent.uid(&event.id).summary(&event.subject);

        match &event.start {
            EventTime::AllDay(date) => vevent.starts(*date),
            EventTime::DateTime(dt) => vevent.starts(*dt),
        };
        match &event.end {
            EventTime::AllDay(date) => vevent.ends(*date),
            EventTime::DateTime(dt) => vevent.ends(*dt),
        };

        if let Some(created) = event.created {
            vevent.add_property("CREATED", &format_timestamp(created));
        }
        if let Some(modified) = event.modified {
            vevent.add_property("LAST-MODIFIED", &format_timestamp(modified));
        }
        if let Some(ref location) = event.location {
            vevent.add_property("LOCATION", location);
        }

        let description = event.description();
        if !description.is_empty() {
            vevent.description(&description);
        }

        if let Some(ref link) = event.web_link {
            vevent.add_property("URL", link);
        }

        // Every VEVENT carries at least the chair as ATTENDEE.
        if let Some(organizer) = event.organizer.as_ref().or(self.owner.as_ref()) {
            let mut prop = Property::new("ORGANIZER", &format!("mailto:{}", organizer.email));
            if let Some(ref name) = organizer.name {
                prop.add_parameter("CN", name);
            }
            vevent.append_property(prop.done());

            let mut chair = Property::new("ATTENDEE", &format!("mailto:{}", organizer.email));
            if let Some(ref name) = organizer.name {
                chair.add_parameter("CN", name);
            }
            chair
                .add_parameter("ROLE", AttendeeRole::Chair.as_ical())
                .add_parameter("PARTSTAT", ParticipationStatus::Accepted.as_ical());
            vevent.append_multi_property(chair.done());
        }

        if !self.mode.google {
            for attendee in &event.attendees {
                let mut prop = Property::new("ATTENDEE", &format!("mailto:{}", attendee.email));
                if let Some(ref name) = attendee.name {
                    prop.add_parameter("CN", name);
                }
                prop.add_parameter("ROLE", attendee.role.as_ical())
                    .add_parameter("PARTSTAT", attendee.status.as_ical())
                    .add_parameter("RSVP", "TRUE");
                vevent.append_multi_property(prop.done());
            }

            for attachment in &event.attachments {
                let prop = Property::new("ATTACH", &attachment.url)
                    .add_parameter("FMTTYPE", &attachment.content_type)
                    .done();
                vevent.append_multi_property(prop);
            }
        }

        self.calendar.push(vevent.done());
        self.events += 1;
    }

    /// Serializes the document to RFC 5545 text.
    pub fn render(&self) -> String {
        self.calendar.to_string()
    }
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.format(ICAL_TIMESTAMP).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{AttachmentRef, Attendee, Organizer};
    use chrono::{NaiveDate, TimeZone};

    fn count_lines(ics: &str, prefix: &str) -> usize {
        ics.lines().filter(|l| l.starts_with(prefix)).count()
    }

    fn busy_meeting() -> Event {
        let attendees = (0..10)
            .map(|i| {
                Attendee::new(
                    format!("person{}@example.com", i),
                    if i % 2 == 0 {
                        AttendeeRole::Required
                    } else {
                        AttendeeRole::Optional
                    },
                    ParticipationStatus::NeedsAction,
                )
                .with_name(format!("Person {}", i))
            })
            .collect();

        Event::new(
            "AAMkAD-1",
            EventTime::from_utc(Utc.with_ymd_and_hms(2025, 2, 5, 10, 0, 0).unwrap()),
            EventTime::from_utc(Utc.with_ymd_and_hms(2025, 2, 5, 11, 0, 0).unwrap()),
        )
        .with_subject("Planning")
        .with_location("Room 1")
        .with_organizer(Organizer {
            email: "boss@example.com".into(),
            name: Some("The Boss".into()),
        })
        .with_attendees(attendees)
        .with_attachments(vec![
            AttachmentRef::new("https://feed.example/attachment/a/one.pdf", "application/pdf"),
            AttachmentRef::new("https://feed.example/attachment/b/two.png", "image/png"),
        ])
    }

    #[test]
    fn calendar_metadata() {
        let doc = CalendarDocument::new("jdoe", OutputMode::default());
        let ics = doc.render();
        assert!(ics.contains("METHOD:REQUEST"));
        assert!(ics.contains("CALSCALE:GREGORIAN"));
        assert!(ics.contains("X-WR-TIMEZONE:UTC"));
        assert!(ics.contains("X-WR-CALNAME:jdoe"));
        assert!(ics.contains("X-WR-CALDESC:Calendar for user jdoe"));
        assert!(doc.is_empty());
    }

    #[test]
    fn full_featured_output_lists_everyone() {
        let mut doc = CalendarDocument::new("jdoe", OutputMode::new(false, false));
        doc.push_event(&busy_meeting());
        let ics = doc.render();

        assert_eq!(doc.len(), 1);
        assert_eq!(count_lines(&ics, "ATTENDEE"), 11);
        assert_eq!(count_lines(&ics, "ATTACH"), 2);
        assert_eq!(count_lines(&ics, "ORGANIZER"), 1);
        assert!(ics.contains("SUMMARY:Planning"));
        assert!(ics.contains("UID:AAMkAD-1"));
    }

    #[test]
    fn google_output_keeps_only_organizer() {
        let mut doc = CalendarDocument::new("jdoe", OutputMode::new(false, true));
        doc.push_event(&busy_meeting());
        let ics = doc.render();

        assert!(count_lines(&ics, "ATTENDEE") <= 1);
        assert_eq!(count_lines(&ics, "ATTACH"), 0);
        assert_eq!(count_lines(&ics, "ORGANIZER"), 1);
    }

    #[test]
    fn owner_chairs_events_without_organizer() {
        let mut event = busy_meeting();
        event.organizer = None;

        let mut doc = CalendarDocument::new("jdoe", OutputMode::new(false, true)).with_owner(
            Organizer {
                email: "jdoe@example.com".into(),
                name: Some("Jane Doe".into()),
            },
        );
        doc.push_event(&event);
        let ics = doc.render();

        assert_eq!(count_lines(&ics, "ATTENDEE"), 1);
        assert_eq!(count_lines(&ics, "ORGANIZER"), 1);
        assert!(ics.contains("mailto:jdoe@example.com"));
    }

    #[test]
    fn organizer_wins_over_owner() {
        let mut doc = CalendarDocument::new("jdoe", OutputMode::new(false, true)).with_owner(
            Organizer {
                email: "jdoe@example.com".into(),
                name: None,
            },
        );
        doc.push_event(&busy_meeting());
        let ics = doc.render();

        assert!(ics.contains("mailto:boss@example.com"));
        assert!(!ics.contains("mailto:jdoe@example.com"));
    }

    #[test]
    fn all_day_uses_date_values() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 5).unwrap();
        let event = Event::new(
            "allday",
            EventTime::from_date(date),
            EventTime::from_date(date.succ_opt().unwrap()),
        )
        .with_subject("Holiday");

        let mut doc = CalendarDocument::new("jdoe", OutputMode::new(true, false));
        doc.push_event(&event);
        let ics = doc.render();

        assert!(ics.contains("DTSTART;VALUE=DATE:20250205"));
        assert!(ics.contains("DTEND;VALUE=DATE:20250206"));
    }

    #[test]
    fn timed_event_uses_utc_datetimes() {
        let mut doc = CalendarDocument::new("jdoe", OutputMode::default());
        doc.push_event(&busy_meeting());
        let ics = doc.render();

        assert!(ics.contains("DTSTART:20250205T100000Z"));
        assert!(ics.contains("DTEND:20250205T110000Z"));
    }
}
