use crate::services::markup::{self, Edit};
use crate::services::patterns::{
    EQUATION_BLOCK_RE, EQUATION_LABEL_END_RE, EQUATION_LABEL_START_RE, INDEX_TITLE_RE,
};
use crate::types::{EquationEntry, IndexEntry, IndexKind};
use std::collections::HashSet;
use tracing::debug;

const INDEX_IDS: [&str; 3] = [r#"id="LOF""#, r#"id="LOT""#, r#"id="LOE""#];

/// Figures and tables found in the body, plus the edits that attach each
/// entry's anchor id to its title paragraph.
#[derive(Debug, Default)]
pub struct IndexScan {
    pub entries: Vec<IndexEntry>,
    pub anchor_edits: Vec<Edit>,
}

impl IndexScan {
    pub fn count(&self, kind: IndexKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }
}

/// Builds the figure, table and equation indices.
pub struct FigureTableIndexer {
    equations: Vec<EquationEntry>,
}

impl FigureTableIndexer {
    pub fn new(equations: Vec<EquationEntry>) -> Self {
        Self { equations }
    }

    pub fn already_indexed(html: &str) -> bool {
        INDEX_IDS.iter().any(|id| html.contains(id))
    }

    /// Scans bolded "Figura N.M: title" / "Tabla N.M: title" paragraphs in
    /// document order.
    pub fn scan(html: &str) -> IndexScan {
        let mut scan = IndexScan::default();
        let mut used_anchors = HashSet::new();

        for paragraph in markup::paragraphs(html) {
            let Some(caps) = INDEX_TITLE_RE.captures(paragraph.inner) else {
                continue;
            };
            let kind = if caps[1].eq_ignore_ascii_case("tabla") {
                IndexKind::Table
            } else {
                IndexKind::Figure
            };
            let entry = IndexEntry::new(kind, &caps[2], &caps[3]);

            if used_anchors.insert(entry.anchor.clone())
                && markup::attr_value(paragraph.attrs, "id").is_none()
            {
                let attrs = markup::set_id(paragraph.attrs, &entry.anchor);
                scan.anchor_edits
                    .push(Edit::replace(paragraph.open_tag.clone(), format!("<p{}>", attrs)));
            }
            scan.entries.push(entry);
        }

        scan
    }

    pub fn equation_entries(&self) -> Vec<IndexEntry> {
        self.equations
            .iter()
            .map(|eq| IndexEntry::new(IndexKind::Equation, &eq.number, &escape(&eq.title)))
            .collect()
    }

    /// Wraps every display formula labelled with a listed equation number in
    /// a `numbered-equation` container carrying that entry's anchor. The
    /// label either closes the formula text or directly follows the block.
    pub fn equation_anchors(&self, html: &str) -> Vec<Edit> {
        let mut edits = Vec::new();
        let mut anchored = HashSet::new();

        for caps in EQUATION_BLOCK_RE.captures_iter(html) {
            let (Some(block), Some(body)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let label = EQUATION_LABEL_END_RE
                .captures(&markup::plain_text(body.as_str()))
                .or_else(|| EQUATION_LABEL_START_RE.captures(&html[block.end()..]))
                .and_then(|label| label.get(1))
                .map(|m| m.as_str().to_string());
            let Some(label) = label else {
                continue;
            };
            if !self.equations.iter().any(|eq| eq.number == label) {
                debug!("Formula labelled ({}) is not in the equation list", label);
                continue;
            }

            let anchor = IndexEntry::anchor_for(IndexKind::Equation, &label);
            if html.contains(&format!("id=\"{}\"", anchor)) || !anchored.insert(anchor.clone()) {
                continue;
            }
            edits.push(Edit::insert(
                block.start(),
                format!("<div class=\"numbered-equation\" id=\"{}\">", anchor),
            ));
            edits.push(Edit::insert(block.end(), "</div>"));
        }

        for eq in &self.equations {
            if !anchored.contains(&IndexEntry::anchor_for(IndexKind::Equation, &eq.number)) {
                debug!("No labelled formula found for equation {}", eq.number);
            }
        }
        edits
    }

    /// One `<nav>` per kind that has entries, figures first.
    pub fn render(entries: &[IndexEntry]) -> String {
        let sections = [
            (IndexKind::Figure, "LOF", "ÍNDICE DE FIGURAS"),
            (IndexKind::Table, "LOT", "ÍNDICE DE TABLAS"),
            (IndexKind::Equation, "LOE", "ÍNDICE DE ECUACIONES"),
        ];

        let mut html = String::new();
        for (kind, id, heading) in sections {
            let items: Vec<&IndexEntry> = entries.iter().filter(|e| e.kind == kind).collect();
            if items.is_empty() {
                continue;
            }
            html.push_str(&format!(
                "\n<nav id=\"{}\" role=\"doc-toc\">\n<h2>{}</h2>\n<ul>\n",
                id, heading
            ));
            for item in items {
                html.push_str(&format!(
                    "<li><a href=\"#{}\">{}</a></li>\n",
                    item.anchor,
                    item.display()
                ));
            }
            html.push_str("</ul>\n</nav>\n");
        }
        html
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = concat!(
        "<p><strong>Figura 3.1: Flujo de\n   residuos</strong></p>\n",
        "<p><img src=\"recursos/flujo.png\" /></p>\n",
        "<p class=\"table-title\"><strong>Tabla 2.3: Annual Totals</strong></p>\n",
        "<p>Texto que menciona la Figura 3.1: sin negritas.</p>\n",
        "<p id=\"propio\"><strong>TABLA 4.1: Costos</strong></p>\n",
    );

    #[test]
    fn test_scan_collects_titles_in_order() {
        let scan = FigureTableIndexer::scan(BODY);
        let shown: Vec<String> = scan.entries.iter().map(|e| e.display()).collect();

        assert_eq!(
            shown,
            vec![
                "Figura 3.1: Flujo de residuos",
                "Tabla 2.3: Annual Totals",
                "Tabla 4.1: Costos",
            ]
        );
        assert_eq!(scan.count(IndexKind::Figure), 1);
        assert_eq!(scan.count(IndexKind::Table), 2);
    }

    #[test]
    fn test_anchor_edits_skip_paragraphs_with_ids() {
        let scan = FigureTableIndexer::scan(BODY);
        let html = markup::apply_edits(BODY, scan.anchor_edits);

        assert!(html.contains("<p id=\"figura-3-1\"><strong>Figura 3.1"));
        assert!(html.contains("<p id=\"tabla-2-3\" class=\"table-title\"><strong>Tabla 2.3"));
        assert!(html.contains("<p id=\"propio\"><strong>TABLA 4.1"));
        assert!(!html.contains("id=\"tabla-4-1\""));
    }

    #[test]
    fn test_render_only_non_empty_sections() {
        let indexer = FigureTableIndexer::new(vec![EquationEntry {
            number: "3.1".to_string(),
            title: "Generación Total por Día".to_string(),
        }]);
        let mut entries = FigureTableIndexer::scan("<p><strong>Tabla 1.1: Datos</strong></p>").entries;
        entries.extend(indexer.equation_entries());

        let html = FigureTableIndexer::render(&entries);
        assert!(!html.contains("id=\"LOF\""));
        assert!(html.contains("<h2>ÍNDICE DE TABLAS</h2>"));
        assert!(html.contains("<li><a href=\"#tabla-1-1\">Tabla 1.1: Datos</a></li>"));
        assert!(html.contains(
            "<li><a href=\"#ecuacion-3-1\">Ecuación (3.1): Generación Total por Día</a></li>"
        ));
        assert!(html.find("id=\"LOT\"") < html.find("id=\"LOE\""));
    }

    fn equations(numbers: &[&str]) -> FigureTableIndexer {
        FigureTableIndexer::new(
            numbers
                .iter()
                .map(|n| EquationEntry {
                    number: n.to_string(),
                    title: format!("Ecuación {}", n),
                })
                .collect(),
        )
    }

    #[test]
    fn test_equation_anchors_follow_labels() {
        let html = concat!(
            "<div class=\"math-display\">G = ∑<sub>i</sub> g (3.1)</div>\n",
            "<div class=\"math-display\">T ≤ 9.6</div> (B.2)\n",
            "<div class=\"math-display\">sin etiqueta</div>\n",
            "<div class=\"math-display\">otra (9.9)</div>\n",
        );
        let indexer = equations(&["3.1", "B.2", "4.4"]);
        let out = markup::apply_edits(html, indexer.equation_anchors(html));

        assert!(out.contains(
            "<div class=\"numbered-equation\" id=\"ecuacion-3-1\"><div class=\"math-display\">G = ∑<sub>i</sub> g (3.1)</div></div>"
        ));
        assert!(out.contains(
            "<div class=\"numbered-equation\" id=\"ecuacion-b-2\"><div class=\"math-display\">T ≤ 9.6</div></div> (B.2)"
        ));
        assert!(out.contains("\n<div class=\"math-display\">sin etiqueta</div>\n"));
        assert!(out.contains("\n<div class=\"math-display\">otra (9.9)</div>\n"));
        assert!(!out.contains("ecuacion-4-4"));

        assert!(indexer.equation_anchors(&out).is_empty());
    }

    #[test]
    fn test_render_nothing_without_entries() {
        assert!(FigureTableIndexer::render(&[]).is_empty());
        assert!(FigureTableIndexer::scan("<p>Nada</p>").entries.is_empty());
    }
}
