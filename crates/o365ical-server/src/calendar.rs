//! Calendar request path: live week plus cached horizon to iCalendar text.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use o365ical_core::{CalendarDocument, Organizer, OutputMode, cache_window, week_window};
use o365ical_providers::{GraphEvent, keep_for_busy_view, to_event};
use tracing::{debug, warn};

use crate::attachments::AttachmentMirror;
use crate::error::ServerResult;
use crate::registry::UserHandle;
use crate::window_cache::WindowCache;

/// Builds a user's feed.
#[derive(Debug, Clone)]
pub struct CalendarService {
    cache: WindowCache,
    mirror: AttachmentMirror,
}

impl CalendarService {
    /// Creates the service.
    pub fn new(cache: WindowCache, mirror: AttachmentMirror) -> Self {
        Self { cache, mirror }
    }

    /// Renders the feed of `user` as of `now`.
    ///
    /// The current business week is always fetched live and a failure there
    /// fails the request. The cached horizon is appended when present, stale
    /// or not; a lookup failure only drops it with a warning. Attachment URLs
    /// are built under `base_url`.
    pub async fn render(
        &self,
        user: &UserHandle,
        mode: OutputMode,
        base_url: &str,
        now: DateTime<Utc>,
    ) -> ServerResult<String> {
        let username = user.username();

        let mut records = user.client.calendar_view(&week_window(now)).await?;
        let live = records.len();

        match self.cache.get(username, &cache_window(now)) {
            Ok(entry) => records.extend(entry.events),
            Err(e) => warn!(
                user = %username,
                error = %e,
                "extended window unavailable, serving the live week only"
            ),
        }

        let mut document = CalendarDocument::new(username, mode).with_owner(Organizer {
            email: user.identity.mail.clone(),
            name: Some(user.identity.display_name.clone()).filter(|n| !n.is_empty()),
        });
        let mut seen = HashSet::new();

        for record in &records {
            // Events straddling the week boundary come back in both windows.
            if !seen.insert(record.id.as_str()) {
                continue;
            }
            if !mode.full && !keep_for_busy_view(record) {
                continue;
            }

            let attachments = self.attachments_for(user, record, base_url).await;
            match to_event(record, attachments) {
                Ok(event) => document.push_event(&event),
                Err(e) => warn!(
                    user = %username,
                    event_id = %record.id,
                    error = %e,
                    "skipping malformed event"
                ),
            }
        }

        debug!(
            user = %username,
            live,
            cached = records.len() - live,
            rendered = document.len(),
            full = mode.full,
            google = mode.google,
            "calendar rendered"
        );
        Ok(document.render())
    }

    async fn attachments_for(
        &self,
        user: &UserHandle,
        record: &GraphEvent,
        base_url: &str,
    ) -> Vec<o365ical_core::AttachmentRef> {
        match self
            .mirror
            .resolve(&user.client, &record.id, record.has_attachments, base_url)
            .await
        {
            Ok(refs) => refs,
            Err(e) => {
                warn!(
                    user = %user.username(),
                    event_id = %record.id,
                    error = %e,
                    "attachments unavailable"
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::window_cache::DEFAULT_TTL;
    use chrono::TimeZone;
    use o365ical_providers::{GraphClient, GraphConfig, StaticToken, UserIdentity};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BASE: &str = "https://feed.example";

    fn now() -> DateTime<Utc> {
        // Wednesday
        Utc.with_ymd_and_hms(2025, 2, 5, 15, 30, 0).unwrap()
    }

    fn raw(id: &str, day: u32, show_as: &str, response: &str) -> Value {
        json!({
            "id": id,
            "subject": format!("Meeting {}", id),
            "showAs": show_as,
            "isAllDay": false,
            "hasAttachments": false,
            "responseStatus": {"response": response},
            "start": {"dateTime": format!("2025-02-{:02}T10:00:00.0000000", day), "timeZone": "UTC"},
            "end": {"dateTime": format!("2025-02-{:02}T11:00:00.0000000", day), "timeZone": "UTC"},
            "organizer": {"emailAddress": {"name": "Boss", "address": "boss@contoso.com"}},
            "attendees": []
        })
    }

    struct Fixture {
        server: MockServer,
        service: CalendarService,
        cache: WindowCache,
        user: UserHandle,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let cache = WindowCache::new(store.clone(), DEFAULT_TTL);
        let mirror = AttachmentMirror::new(store, dir.path());
        let config = GraphConfig::default().with_base_url(server.uri());
        let client = GraphClient::new(&config, Arc::new(StaticToken::new("t"))).unwrap();
        let user = UserHandle::new(
            UserIdentity {
                username: "jdoe".into(),
                mail: "jdoe@contoso.com".into(),
                display_name: "Jane Doe".into(),
            },
            client,
        );
        Fixture {
            server,
            service: CalendarService::new(cache.clone(), mirror),
            cache,
            user,
            _dir: dir,
        }
    }

    async fn mount_live_week(server: &MockServer, events: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path("/me/calendarview"))
            .and(query_param("startdatetime", "2025-02-03T00:00:00"))
            .and(query_param("enddatetime", "2025-02-08T00:00:00"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": events })))
            .expect(1)
            .mount(server)
            .await;
    }

    fn cached(id: &str) -> GraphEvent {
        serde_json::from_value(raw(id, 12, "busy", "accepted")).unwrap()
    }

    #[tokio::test]
    async fn busy_view_filters_live_events() {
        let f = fixture().await;
        mount_live_week(
            &f.server,
            vec![
                raw("keep", 5, "busy", "accepted"),
                raw("free", 5, "free", "accepted"),
                raw("declined", 6, "busy", "declined"),
            ],
        )
        .await;

        let ics = f
            .service
            .render(&f.user, OutputMode::default(), BASE, now())
            .await
            .unwrap();

        assert!(ics.contains("UID:keep"));
        assert!(!ics.contains("UID:free"));
        assert!(!ics.contains("UID:declined"));
        assert!(ics.contains("X-WR-CALNAME:jdoe"));
    }

    #[tokio::test]
    async fn full_view_keeps_everything() {
        let f = fixture().await;
        mount_live_week(
            &f.server,
            vec![
                raw("keep", 5, "busy", "accepted"),
                raw("free", 5, "free", "accepted"),
                raw("declined", 6, "busy", "declined"),
            ],
        )
        .await;

        let ics = f
            .service
            .render(&f.user, OutputMode::new(true, false), BASE, now())
            .await
            .unwrap();

        for id in ["keep", "free", "declined"] {
            assert!(ics.contains(&format!("UID:{}", id)));
        }
    }

    #[tokio::test]
    async fn cached_horizon_is_appended_even_when_stale() {
        let f = fixture().await;
        mount_live_week(&f.server, vec![raw("live", 5, "busy", "accepted")]).await;
        f.cache
            .save_at(
                "jdoe",
                &cache_window(now()),
                &[cached("later"), cached("live")],
                now() - chrono::Duration::hours(48),
            )
            .unwrap();

        let ics = f
            .service
            .render(&f.user, OutputMode::default(), BASE, now())
            .await
            .unwrap();

        assert!(ics.contains("UID:live"));
        assert!(ics.contains("UID:later"));
        assert_eq!(ics.matches("UID:live").count(), 1);
    }

    #[tokio::test]
    async fn missing_cache_serves_live_week_only() {
        let f = fixture().await;
        mount_live_week(&f.server, vec![raw("live", 5, "busy", "accepted")]).await;

        let ics = f
            .service
            .render(&f.user, OutputMode::default(), BASE, now())
            .await
            .unwrap();
        assert_eq!(ics.matches("BEGIN:VEVENT").count(), 1);
    }

    #[tokio::test]
    async fn live_failure_fails_request() {
        let f = fixture().await;
        Mock::given(method("GET"))
            .and(path("/me/calendarview"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&f.server)
            .await;

        let err = f
            .service
            .render(&f.user, OutputMode::default(), BASE, now())
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn google_mode_links_attachments_in_description() {
        let f = fixture().await;
        let mut event = raw("att", 5, "busy", "accepted");
        event["hasAttachments"] = json!(true);
        event["body"] = json!({"contentType": "text", "content": "Agenda"});
        mount_live_week(&f.server, vec![event]).await;
        Mock::given(method("GET"))
            .and(path("/me/events/att/attachments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"id": "a1", "name": "doc.pdf", "contentType": "application/pdf"}]
            })))
            .expect(1)
            .mount(&f.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/me/events/att/attachments/a1/$value"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
            .mount(&f.server)
            .await;

        let ics = f
            .service
            .render(&f.user, OutputMode::new(false, true), BASE, now())
            .await
            .unwrap();
        let unfolded = ics.replace("\r\n ", "");

        assert!(unfolded.contains("Attachment (1): https://feed.example/attachment/a1/doc.pdf"));
        assert_eq!(unfolded.lines().filter(|l| l.starts_with("ATTACH")).count(), 0);
    }

    #[tokio::test]
    async fn owner_chairs_events_without_organizer() {
        let f = fixture().await;
        let mut event = raw("solo", 5, "busy", "accepted");
        event.as_object_mut().unwrap().remove("organizer");
        mount_live_week(&f.server, vec![event]).await;

        let ics = f
            .service
            .render(&f.user, OutputMode::new(false, true), BASE, now())
            .await
            .unwrap();
        let unfolded = ics.replace("\r\n ", "");

        assert!(unfolded.contains("mailto:jdoe@contoso.com"));
        assert_eq!(unfolded.lines().filter(|l| l.starts_with("ORGANIZER")).count(), 1);
        assert_eq!(unfolded.lines().filter(|l| l.starts_with("ATTENDEE")).count(), 1);
    }
}
