//! HTML to plain text conversion for event bodies.

use scraper::{Html, Selector};

/// Converts an HTML event body to plain text.
///
/// Line breaks in the source are dropped before parsing, then every text node
/// inside `<body>` is trimmed and written on its own line. Whitespace-only
/// nodes are skipped. Returns an empty string when no text remains.
pub fn html_to_text(html: &str) -> String {
    let flattened: String = html.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    let document = Html::parse_document(&flattened);

    let Ok(body_selector) = Selector::parse("body") else {
        return String::new();
    };
    let Some(body) = document.select(&body_selector).next() else {
        return String::new();
    };

    let mut output = String::new();
    for text in body.text() {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        output.push_str(trimmed);
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_block_text_on_lines() {
        let text = html_to_text("<html><body><p>Hi</p><br/>Bye</body></html>");
        assert_eq!(text, "Hi\nBye\n");
        assert!(!text.contains('<'));
    }

    #[test]
    fn ignores_head_content() {
        let text = html_to_text(
            "<html><head><title>Ignored</title></head><body><div>Visible</div></body></html>",
        );
        assert_eq!(text, "Visible\n");
    }

    #[test]
    fn drops_source_line_breaks() {
        let text = html_to_text("<html>\r\n<body>\r\n<p>Line\r\none</p></body></html>");
        assert_eq!(text, "Lineone\n");
    }

    #[test]
    fn empty_body_yields_empty_string() {
        assert_eq!(html_to_text("<html><body>   <p> </p></body></html>"), "");
        assert_eq!(html_to_text(""), "");
    }

    #[test]
    fn fragment_without_body_tag() {
        assert_eq!(html_to_text("<p>Just a fragment</p>"), "Just a fragment\n");
    }
}
