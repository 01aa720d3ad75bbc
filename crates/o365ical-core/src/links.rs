//! Meeting link detection in event bodies.
//!
//! Events created from Teams carry a structured join link, but many invites
//! only mention the meeting URL somewhere in their HTML body. This module
//! finds that URL, unwrapping Microsoft Outlook SafeLinks along the way.
//!
//! # Example
//!
//! ```
//! use o365ical_core::links::find_teams_link;
//!
//! let body = r#"<a href="https://teams.microsoft.com/l/meetup-join/abc">Join</a>"#;
//! assert_eq!(
//!     find_teams_link(body).as_deref(),
//!     Some("https://teams.microsoft.com/l/meetup-join/abc")
//! );
//! ```

use std::sync::LazyLock;

use regex::Regex;

/// Regex for extracting URLs from text.
static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'\)\]]+"#).expect("Invalid URL regex"));

/// Regex for detecting Microsoft Outlook SafeLinks.
///
/// SafeLinks wrap the original URL in a redirect through `safelinks.protection.outlook.com`.
/// The original URL is encoded in the `url` query parameter.
static SAFELINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^/]*safelinks\.protection\.outlook\.com/?\?[^?]*url=([^&]+)")
        .expect("Invalid SafeLink regex")
});

/// Regex for Microsoft Teams meeting URLs embedded in text or markup.
static TEAMS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://teams\.microsoft\.com([\w.,@?^=%&:/~+#-]*[\w@?^=%&/~+#-])?")
        .expect("Invalid Teams regex")
});

/// Returns the first Teams meeting URL found in `text`.
///
/// Direct links win; otherwise SafeLinks are unwrapped and checked in order.
pub fn find_teams_link(text: &str) -> Option<String> {
    if let Some(m) = TEAMS_REGEX.find(text) {
        return Some(m.as_str().to_string());
    }

    URL_REGEX
        .find_iter(text)
        .map(|m| unwrap_safelink(m.as_str()))
        .find_map(|url| TEAMS_REGEX.find(&url).map(|m| m.as_str().to_string()))
}

/// Unwraps a Microsoft Outlook SafeLink to get the original URL.
///
/// If the URL is not a SafeLink, it is returned unchanged.
pub fn unwrap_safelink(url: &str) -> String {
    if let Some(caps) = SAFELINK_REGEX.captures(url)
        && let Some(encoded) = caps.get(1)
        && let Ok(decoded) = urlencoding::decode(encoded.as_str())
    {
        return decoded.into_owned();
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    mod safelinks {
        use super::*;

        #[test]
        fn unwraps_safelink() {
            let safelink = "https://nam01.safelinks.protection.outlook.com/?url=https%3A%2F%2Fteams.microsoft.com%2Fl%2Fmeetup-join%2Fabc&data=abc123";
            assert_eq!(
                unwrap_safelink(safelink),
                "https://teams.microsoft.com/l/meetup-join/abc"
            );
        }

        #[test]
        fn returns_non_safelink_unchanged() {
            let url = "https://example.com/agenda";
            assert_eq!(unwrap_safelink(url), url);
        }
    }

    mod teams {
        use super::*;

        #[test]
        fn finds_link_in_html_body() {
            let body = r#"<p>Join:</p><a href="https://teams.microsoft.com/l/meetup-join/19%3ameeting_abc%40thread.v2/0?context=%7b%22Tid%22%3a%22xyz%22%7d">Click here</a>"#;
            assert_eq!(
                find_teams_link(body).as_deref(),
                Some(
                    "https://teams.microsoft.com/l/meetup-join/19%3ameeting_abc%40thread.v2/0?context=%7b%22Tid%22%3a%22xyz%22%7d"
                )
            );
        }

        #[test]
        fn returns_first_of_many() {
            let body = "https://teams.microsoft.com/l/first and https://teams.microsoft.com/l/second";
            assert_eq!(
                find_teams_link(body).as_deref(),
                Some("https://teams.microsoft.com/l/first")
            );
        }

        #[test]
        fn ignores_other_hosts() {
            assert!(find_teams_link("https://zoom.us/j/123 https://example.com").is_none());
        }

        #[test]
        fn unwraps_safelinked_teams_url() {
            let body = "Join: https://eur01.safelinks.protection.outlook.com/?url=https%3A%2F%2Fteams.microsoft.com%2Fl%2Fmeetup-join%2Fxyz&data=1";
            assert_eq!(
                find_teams_link(body).as_deref(),
                Some("https://teams.microsoft.com/l/meetup-join/xyz")
            );
        }

        #[test]
        fn handles_empty_text() {
            assert!(find_teams_link("").is_none());
        }
    }
}
