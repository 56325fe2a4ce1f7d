//! Typed index over compiled hypertext.
//!
//! The compiler's output is never parsed into a full tree. Instead the
//! elements the post-processor cares about (headings, paragraphs, TOC links)
//! are located once with their byte spans, corrections are computed against
//! those typed records, and the document is re-serialized by splicing
//! replacement text into the original.

use crate::services::patterns::{
    ATTRIBUTE_RE, FRAGMENT_MARKER_RE, HEADER_NUMBER_SPAN_RE, HEADING_RE, LINK_RE, NAV_OPEN_RE,
    PARAGRAPH_RE, TAG_RE, TOC_NUMBER_SPAN_RE, TOC_OPEN_RE,
};
use crate::types::{FragmentRole, HeadingEntry, HeadingKind};
use std::ops::Range;

/// Empty container the aggregator places before each fragment so headings
/// can be traced back to the role of the fragment they came from.
pub fn fragment_marker(role: FragmentRole) -> String {
    format!(
        r#"<div class="fragment-boundary" data-role="{}"></div>"#,
        role.as_str()
    )
}

/// Where a heading sits relative to the fragment markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// No marker precedes the heading.
    Unmarked,
    /// Inside a fragment of `role`; `leading` for the fragment's first heading.
    Fragment { role: FragmentRole, leading: bool },
}

/// A heading plus the raw pieces needed to re-serialize it.
#[derive(Debug, Clone)]
pub struct HeadingElement<'a> {
    pub entry: HeadingEntry,
    pub attrs: &'a str,
    /// Inner markup after the compiler's number span.
    pub content: &'a str,
}

impl HeadingElement<'_> {
    /// The element rewritten without its compiler-assigned number.
    pub fn without_number(&self) -> String {
        let attrs = remove_attr(self.attrs, "data-number");
        format!("<h{0}{1}>{2}</h{0}>", self.entry.level, attrs, self.content)
    }
}

#[derive(Debug, Clone)]
pub struct Paragraph<'a> {
    pub span: Range<usize>,
    pub open_tag: Range<usize>,
    pub attrs: &'a str,
    pub inner: &'a str,
}

/// A link inside the table of contents.
#[derive(Debug, Clone)]
pub struct TocLink<'a> {
    pub span: Range<usize>,
    pub attrs: &'a str,
    pub number: Option<&'a str>,
    pub title: &'a str,
}

impl TocLink<'_> {
    pub fn target(&self) -> Option<&str> {
        attr_value(self.attrs, "href").and_then(|href| href.strip_prefix('#'))
    }

    pub fn plain_title(&self) -> String {
        plain_text(self.title)
    }

    pub fn with_title(&self, title: &str) -> String {
        format!("<a{}>{}</a>", self.attrs, title)
    }
}

/// Text with tags removed and whitespace collapsed.
pub fn plain_text(markup: &str) -> String {
    TAG_RE
        .replace_all(markup, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn attr_value<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    ATTRIBUTE_RE
        .captures_iter(attrs)
        .find(|caps| caps.get(1).map(|m| m.as_str()) == Some(name))
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str())
}

pub fn remove_attr(attrs: &str, name: &str) -> String {
    let mut out = String::with_capacity(attrs.len());
    let mut last = 0;
    for caps in ATTRIBUTE_RE.captures_iter(attrs) {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if key.as_str() == name {
            out.push_str(attrs[last..whole.start()].trim_end());
            last = whole.end();
        }
    }
    out.push_str(&attrs[last..]);
    out
}

pub fn has_class(attrs: &str, class: &str) -> bool {
    attr_value(attrs, "class")
        .map(|value| value.split_whitespace().any(|c| c == class))
        .unwrap_or(false)
}

pub fn add_class(attrs: &str, class: &str) -> String {
    if has_class(attrs, class) {
        return attrs.to_string();
    }
    match attr_value(attrs, "class") {
        Some(existing) => {
            let merged = format!(r#"class="{} {}""#, existing, class);
            attrs.replacen(&format!(r#"class="{}""#, existing), &merged, 1)
        }
        None => format!(r#"{} class="{}""#, attrs, class),
    }
}

pub fn set_id(attrs: &str, id: &str) -> String {
    if attr_value(attrs, "id").is_some() {
        return attrs.to_string();
    }
    format!(r#" id="{}"{}"#, id, attrs)
}

/// Byte ranges of every `<nav>` block.
pub fn nav_ranges(html: &str) -> Vec<Range<usize>> {
    NAV_OPEN_RE
        .find_iter(html)
        .map(|open| {
            let end = html[open.end()..]
                .find("</nav>")
                .map(|pos| open.end() + pos + "</nav>".len())
                .unwrap_or(html.len());
            open.start()..end
        })
        .collect()
}

fn inside_any(ranges: &[Range<usize>], pos: usize) -> bool {
    ranges.iter().any(|r| r.contains(&pos))
}

/// Range of the table of contents container and the end of its opening tag.
pub fn toc_range(html: &str) -> Option<(Range<usize>, usize)> {
    let caps = TOC_OPEN_RE.captures(html)?;
    let open = caps.get(0)?;
    let tag = caps.get(1)?.as_str().to_lowercase();
    let close = format!("</{}>", tag);
    let end = html[open.end()..]
        .find(&close)
        .map(|pos| open.end() + pos + close.len())
        .unwrap_or(html.len());
    Some((open.start()..end, open.end()))
}

/// Start offset and role of every fragment marker, in document order.
pub fn fragment_markers(html: &str) -> Vec<(usize, FragmentRole)> {
    FRAGMENT_MARKER_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let start = caps.get(0)?.start();
            FragmentRole::parse(caps.get(1)?.as_str()).map(|role| (start, role))
        })
        .collect()
}

/// Id of a `<section id=...>` that directly wraps the heading at `start`.
fn enclosing_section_id(html: &str, start: usize) -> Option<String> {
    let before = html[..start].trim_end();
    if !before.ends_with('>') {
        return None;
    }
    let open = before.rfind('<')?;
    let tag = &before[open..];
    if !tag.starts_with("<section") {
        return None;
    }
    attr_value(tag, "id").map(str::to_string)
}

/// Every heading outside navigation blocks, in document order, classified.
pub fn headings(html: &str) -> Vec<HeadingElement<'_>> {
    let navs = nav_ranges(html);
    let markers = fragment_markers(html);
    let mut led_fragments = Vec::new();

    HEADING_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if inside_any(&navs, whole.start()) {
                return None;
            }
            let level: u8 = caps.get(1)?.as_str().parse().ok()?;
            let attrs = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let inner = caps.get(3)?.as_str();

            let (number, content) = match HEADER_NUMBER_SPAN_RE.captures(inner) {
                Some(num) => {
                    let span = num.get(0)?;
                    (Some(num[1].trim().to_string()), &inner[span.end()..])
                }
                None => (None, inner),
            };

            let id = attr_value(attrs, "id")
                .map(str::to_string)
                .or_else(|| enclosing_section_id(html, whole.start()));

            let mut entry = HeadingEntry {
                level,
                number,
                title: plain_text(content),
                id,
                kind: HeadingKind::Regular,
                span: whole.range(),
            };
            let placement = match markers.iter().rposition(|(pos, _)| *pos < whole.start()) {
                Some(idx) => {
                    let leading = !led_fragments.contains(&idx);
                    if leading {
                        led_fragments.push(idx);
                    }
                    Placement::Fragment {
                        role: markers[idx].1,
                        leading,
                    }
                }
                None => Placement::Unmarked,
            };
            entry.kind = classify(&entry, placement);

            Some(HeadingElement {
                entry,
                attrs,
                content,
            })
        })
        .collect()
}

fn is_reference_title(title: &str) -> bool {
    matches!(
        title.trim().to_lowercase().as_str(),
        "referencias" | "referencias bibliográficas" | "bibliografía" | "bibliografia"
    )
}

fn is_annex_title(title: &str) -> bool {
    title
        .get(..5)
        .map(|head| head.eq_ignore_ascii_case("anexo"))
        .unwrap_or(false)
}

/// Kind of a heading. Inside a marked fragment the fragment's role decides:
/// every appendix heading is an appendix heading and the first heading of a
/// reference fragment is the references title. An "ANEXO" title is an
/// appendix heading anywhere. Unmarked headings fall back to their titles.
pub fn classify(entry: &HeadingEntry, placement: Placement) -> HeadingKind {
    match placement {
        Placement::Fragment {
            role: FragmentRole::Reference,
            leading: true,
        } => HeadingKind::ReferenceTitle,
        Placement::Fragment {
            role: FragmentRole::Appendix,
            ..
        } => HeadingKind::Appendix,
        _ if is_annex_title(&entry.title) => HeadingKind::Appendix,
        Placement::Fragment { .. } => HeadingKind::Regular,
        Placement::Unmarked if is_reference_title(&entry.title) => HeadingKind::ReferenceTitle,
        Placement::Unmarked if entry.letter_number().is_some() => HeadingKind::Appendix,
        Placement::Unmarked => HeadingKind::Regular,
    }
}

/// Kind of a TOC entry whose target heading is unknown, judged by its
/// title alone.
pub fn classify_title(title: &str) -> HeadingKind {
    let entry = HeadingEntry {
        level: 1,
        number: None,
        title: title.to_string(),
        id: None,
        kind: HeadingKind::Regular,
        span: 0..0,
    };
    classify(&entry, Placement::Unmarked)
}

/// Links inside the table of contents, with their compiler number split off.
pub fn toc_links(html: &str) -> Vec<TocLink<'_>> {
    let Some((range, _)) = toc_range(html) else {
        return Vec::new();
    };
    let toc = &html[range.clone()];

    LINK_RE
        .captures_iter(toc)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let inner = caps.get(2)?.as_str();
            let (number, title) = match TOC_NUMBER_SPAN_RE.captures(inner) {
                Some(num) => (num.get(1).map(|m| m.as_str().trim()), &inner[num.get(0)?.end()..]),
                None => (None, inner),
            };
            Some(TocLink {
                span: range.start + whole.start()..range.start + whole.end(),
                attrs: caps.get(1)?.as_str(),
                number,
                title,
            })
        })
        .collect()
}

/// Every paragraph outside navigation blocks.
pub fn paragraphs(html: &str) -> Vec<Paragraph<'_>> {
    let navs = nav_ranges(html);
    PARAGRAPH_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if inside_any(&navs, whole.start()) {
                return None;
            }
            let inner = caps.get(2)?;
            let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            Some(Paragraph {
                span: whole.range(),
                open_tag: whole.start()..inner.start(),
                attrs,
                inner: inner.as_str(),
            })
        })
        .collect()
}

/// Replacement of a byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub text: String,
}

impl Edit {
    pub fn replace(range: Range<usize>, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(at..at, text)
    }
}

/// Splices non-overlapping edits into `html`. Edits may arrive in any order;
/// an edit overlapping an earlier-starting one is dropped.
pub fn apply_edits(html: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| (e.range.start, e.range.end));
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    for edit in edits {
        if edit.range.start < cursor {
            continue;
        }
        out.push_str(&html[cursor..edit.range.start]);
        out.push_str(&edit.text);
        cursor = edit.range.end;
    }
    out.push_str(&html[cursor..]);
    out
}
