use crate::services::patterns::{BODY_OPEN_RE, BODY_RE};
use tracing::{debug, info, warn};

const COVER_MARKER: &str = r#"class="cover-page""#;

/// Splices a standalone cover page into the main document.
pub struct DocumentMerger;

impl DocumentMerger {
    /// Prepends the cover's body to the main body, followed by a page break.
    /// Without a cover, or when the main document already carries one, the
    /// main document is returned unchanged.
    pub fn merge(main_html: &str, cover_html: Option<&str>) -> String {
        let Some(cover_html) = cover_html else {
            debug!("No cover to merge");
            return main_html.to_string();
        };
        if main_html.contains(COVER_MARKER) {
            debug!("Cover already merged");
            return main_html.to_string();
        }

        let cover_body = Self::body_content(cover_html);
        let Some(body_open) = BODY_OPEN_RE.find(main_html) else {
            warn!("Main document has no <body>; cover page not merged");
            return main_html.to_string();
        };

        info!("Merging cover page into main document");
        let mut merged = String::with_capacity(main_html.len() + cover_body.len() + 96);
        merged.push_str(&main_html[..body_open.end()]);
        merged.push_str("\n<div class=\"cover-page\">");
        merged.push_str(cover_body);
        merged.push_str("</div>\n<div class=\"page-break\"></div>");
        merged.push_str(&main_html[body_open.end()..]);
        merged
    }

    /// Inner markup of `<body>`, or an empty string for a document without one.
    pub fn body_content(html: &str) -> &str {
        BODY_RE
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .unwrap_or("")
    }
}
