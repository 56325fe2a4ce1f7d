use crate::error::Result;
use crate::services::indexer::FigureTableIndexer;
use crate::services::markup::{self, Edit, HeadingElement};
use crate::services::patterns::{INDEX_TITLE_RE, SOURCE_CITATION_RE, TOC_TITLE_RE};
use crate::types::{
    EquationEntry, HeadingKind, IndexKind, PassKind, PassReport, PostProcessReport, ReferenceEntry,
};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

const REFERENCES_SECTION_ID: &str = "referencias-section";

/// Ordered, idempotent rewrite passes over the merged hypertext.
pub struct StructuralPostProcessor {
    indexer: FigureTableIndexer,
}

impl StructuralPostProcessor {
    pub fn new(equations: Vec<EquationEntry>) -> Self {
        Self {
            indexer: FigureTableIndexer::new(equations),
        }
    }

    /// Runs every pass in its fixed order.
    pub fn process(&self, html: &str) -> (String, PostProcessReport) {
        let mut report = PostProcessReport::default();

        let (html, pass) = Self::inject_toc_title(html);
        report.passes.push(pass);
        let (html, pass) = Self::denumber_annexes(&html);
        report.passes.push(pass);
        let (html, pass) = Self::format_references(&html);
        report.passes.push(pass);
        let (html, pass) = self.generate_indices(&html);
        report.passes.push(pass);
        let (html, pass) = Self::style_titles(&html);
        report.passes.push(pass);
        let (html, pass) = Self::style_source_citations(&html);
        report.passes.push(pass);

        info!(
            "Post-processing applied {} corrections across {} passes",
            report.total_changes(),
            report.passes.len()
        );
        (html, report)
    }

    /// Post-processes a hypertext file in place.
    pub async fn process_file(&self, path: &Path) -> Result<PostProcessReport> {
        let html = fs::read_to_string(path).await?;
        let (processed, report) = self.process(&html);
        if processed != html {
            fs::write(path, processed).await?;
        }
        Ok(report)
    }

    pub fn inject_toc_title(html: &str) -> (String, PassReport) {
        let mut report = PassReport::new(PassKind::TocTitle);

        if TOC_TITLE_RE.is_match(html) {
            debug!("TOC title already present");
            return (html.to_string(), report);
        }
        let Some((_, open_end)) = markup::toc_range(html) else {
            info!("No table of contents found; skipping TOC title");
            return (html.to_string(), report);
        };

        report.record("inserted CONTENIDO heading");
        let edits = vec![Edit::insert(open_end, "\n<h1>CONTENIDO</h1>")];
        (markup::apply_edits(html, edits), report)
    }

    /// Removes compiler numbering from appendix headings in the body and the
    /// TOC. Letter-based appendix numbers in the title text are kept; regular
    /// headings are never touched.
    pub fn denumber_annexes(html: &str) -> (String, PassReport) {
        let mut report = PassReport::new(PassKind::AnnexDenumbering);
        let headings = markup::headings(html);
        let mut edits = Vec::new();

        for heading in headings.iter().filter(|h| h.entry.kind == HeadingKind::Appendix) {
            let Some(number) = heading.entry.number.as_deref() else {
                continue;
            };
            debug!("Removing number {} from appendix heading '{}'", number, heading.entry.title);
            report.record(format!(
                "body: removed {} before '{}' ({})",
                number,
                heading.entry.title,
                Self::denumber_reason(heading)
            ));
            edits.push(Edit::replace(heading.entry.span.clone(), heading.without_number()));
        }

        let kinds = Self::kinds_by_id(&headings);
        for link in markup::toc_links(html) {
            let Some(number) = link.number else {
                continue;
            };
            let kind = link
                .target()
                .and_then(|target| kinds.get(target).copied())
                .unwrap_or_else(|| markup::classify_title(&link.plain_title()));
            if kind != HeadingKind::Appendix {
                continue;
            }
            report.record(format!("toc: removed {} before '{}'", number, link.plain_title()));
            edits.push(Edit::replace(link.span.clone(), link.with_title(link.title)));
        }

        if edits.is_empty() {
            info!("No numbered appendix headings found");
            return (html.to_string(), report);
        }
        info!("Removed numbering from {} appendix entries", report.changes);
        (markup::apply_edits(html, edits), report)
    }

    fn denumber_reason(heading: &HeadingElement<'_>) -> &'static str {
        if heading.entry.letter_number().is_some() {
            "double numbering"
        } else if heading.entry.title.to_uppercase().starts_with("ANEXO") {
            "annex title"
        } else {
            "appendix section"
        }
    }

    fn kinds_by_id<'h>(headings: &'h [HeadingElement<'_>]) -> HashMap<&'h str, HeadingKind> {
        headings
            .iter()
            .filter_map(|h| h.entry.id.as_deref().map(|id| (id, h.entry.kind)))
            .collect()
    }

    /// Strips the number from the references heading and upper-cases its TOC
    /// entry, then re-wraps each reference paragraph as an addressable block.
    pub fn format_references(html: &str) -> (String, PassReport) {
        let mut report = PassReport::new(PassKind::References);
        let headings = markup::headings(html);
        let Some(heading) = headings
            .iter()
            .find(|h| h.entry.kind == HeadingKind::ReferenceTitle)
        else {
            info!("No references heading found");
            return (html.to_string(), report);
        };

        let mut edits = Vec::new();
        let toc_title = heading.entry.title.to_uppercase();

        for link in markup::toc_links(html) {
            let is_reference = match (link.target(), heading.entry.id.as_deref()) {
                (Some(target), Some(id)) => target == id,
                _ => markup::classify_title(&link.plain_title()) == HeadingKind::ReferenceTitle,
            };
            if !is_reference || (link.number.is_none() && link.title.trim() == toc_title) {
                continue;
            }
            report.record("toc: references entry de-numbered");
            edits.push(Edit::replace(link.span.clone(), link.with_title(&toc_title)));
        }

        let needs_denumber = heading.entry.number.is_some()
            || markup::attr_value(heading.attrs, "data-number").is_some();
        let heading_html = if needs_denumber {
            report.record(format!(
                "body: removed {} from references heading",
                heading.entry.number.as_deref().unwrap_or("data-number")
            ));
            heading.without_number()
        } else {
            html[heading.entry.span.clone()].to_string()
        };

        let already_wrapped = html.contains(&format!(r#"id="{}""#, REFERENCES_SECTION_ID));
        let region = heading.entry.span.end..Self::references_region_end(html, heading.entry.span.end);
        let (region_html, references) = if already_wrapped {
            (None, Vec::new())
        } else {
            Self::restructure_references(html, region.clone())
        };

        match region_html {
            Some(body) => {
                for reference in &references {
                    report.record(format!("wrapped reference {}", reference.id));
                }
                info!("Restructured {} references", references.len());
                edits.push(Edit::replace(
                    heading.entry.span.start..region.end,
                    format!(
                        "<div id=\"{}\">\n{}\n{}\n</div>\n",
                        REFERENCES_SECTION_ID, heading_html, body
                    ),
                ));
            }
            None if needs_denumber => {
                edits.push(Edit::replace(heading.entry.span.clone(), heading_html));
            }
            None => {}
        }

        (markup::apply_edits(html, edits), report)
    }

    /// The references section runs until the next top-level heading, the
    /// close of its enclosing section, or the end of the body.
    fn references_region_end(html: &str, start: usize) -> usize {
        let rest = &html[start..];
        ["<h1", "</section>", "</body>"]
            .iter()
            .filter_map(|marker| rest.find(marker))
            .min()
            .map(|pos| start + pos)
            .unwrap_or(html.len())
    }

    /// Rewrites every paragraph in `region` as a `single-reference` block.
    /// Returns `None` when the region holds no paragraphs.
    fn restructure_references(
        html: &str,
        region: std::ops::Range<usize>,
    ) -> (Option<String>, Vec<ReferenceEntry>) {
        let section = &html[region];
        let mut references = Vec::new();
        let mut edits = Vec::new();

        for paragraph in markup::paragraphs(section) {
            let entry = ReferenceEntry {
                id: format!("ref-{}", references.len() + 1),
                text: paragraph.inner.trim().to_string(),
            };
            edits.push(Edit::replace(paragraph.span.clone(), render_reference(&entry)));
            references.push(entry);
        }

        if references.is_empty() {
            return (None, references);
        }
        let body = markup::apply_edits(section, edits);
        (Some(body.trim().to_string()), references)
    }

    /// Inserts the figure, table and equation indices right after the TOC.
    pub fn generate_indices(&self, html: &str) -> (String, PassReport) {
        let mut report = PassReport::new(PassKind::Indices);

        if FigureTableIndexer::already_indexed(html) {
            debug!("Indices already present");
            return (html.to_string(), report);
        }
        let Some((toc, _)) = markup::toc_range(html) else {
            info!("No table of contents found; indices not inserted");
            return (html.to_string(), report);
        };

        let scan = FigureTableIndexer::scan(html);
        let mut entries = scan.entries;
        entries.extend(self.indexer.equation_entries());
        if entries.is_empty() {
            info!("No figures, tables or equations to index");
            return (html.to_string(), report);
        }

        info!(
            "Indexed {} figures, {} tables, {} equations",
            entries.iter().filter(|e| e.kind == IndexKind::Figure).count(),
            entries.iter().filter(|e| e.kind == IndexKind::Table).count(),
            entries.iter().filter(|e| e.kind == IndexKind::Equation).count()
        );
        for entry in &entries {
            report.record(entry.display());
        }

        let mut edits = scan.anchor_edits;
        edits.extend(self.indexer.equation_anchors(html));
        edits.push(Edit::insert(toc.end, FigureTableIndexer::render(&entries)));
        (markup::apply_edits(html, edits), report)
    }

    /// Tags table and figure title paragraphs for centering.
    pub fn style_titles(html: &str) -> (String, PassReport) {
        let mut report = PassReport::new(PassKind::TitleStyling);
        let mut edits = Vec::new();

        for paragraph in markup::paragraphs(html) {
            let Some(caps) = INDEX_TITLE_RE.captures(paragraph.inner) else {
                continue;
            };
            let class = if caps[1].eq_ignore_ascii_case("tabla") {
                if !paragraph.inner.trim_end().ends_with("</strong>") {
                    continue;
                }
                "table-title"
            } else {
                "figure-title"
            };
            if markup::has_class(paragraph.attrs, class) {
                continue;
            }
            report.record(format!("{} {}", class, &caps[2]));
            let attrs = markup::add_class(paragraph.attrs, class);
            edits.push(Edit::replace(paragraph.open_tag.clone(), format!("<p{}>", attrs)));
        }

        if edits.is_empty() {
            debug!("No untagged table or figure titles");
        }
        (markup::apply_edits(html, edits), report)
    }

    /// Tags "Fuente: ..." attribution paragraphs.
    pub fn style_source_citations(html: &str) -> (String, PassReport) {
        let mut report = PassReport::new(PassKind::SourceCitations);
        let edits: Vec<Edit> = markup::paragraphs(html)
            .into_iter()
            .filter(|p| SOURCE_CITATION_RE.is_match(p.inner))
            .filter(|p| !markup::has_class(p.attrs, "source-citation"))
            .map(|p| {
                let attrs = markup::add_class(p.attrs, "source-citation");
                Edit::replace(p.open_tag.clone(), format!("<p{}>", attrs))
            })
            .collect();

        for _ in &edits {
            report.record("source-citation");
        }
        (markup::apply_edits(html, edits), report)
    }
}

impl Default for StructuralPostProcessor {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn render_reference(reference: &ReferenceEntry) -> String {
    format!(
        "<div class=\"single-reference\" id=\"{}\">{}</div>",
        reference.id, reference.text
    )
}
