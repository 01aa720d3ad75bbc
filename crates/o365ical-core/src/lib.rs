//! Core types: time windows, events, links, HTML text, iCalendar rendering

pub mod event;
pub mod html;
pub mod ical;
pub mod links;
pub mod time;
pub mod tracing;

pub use event::{
    AttachmentRef, Attendee, AttendeeRole, Availability, Event, Organizer, ParticipationStatus,
};
pub use html::html_to_text;
pub use ical::{CalendarDocument, OutputMode};
pub use links::{find_teams_link, unwrap_safelink};
pub use time::{
    EventTime, TIMESTAMP_FORMAT, TimeWindow, WINDOW_FORMAT, cache_window, parse_provider_timestamp,
    week_window,
};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
