use crate::services::patterns::{
    DISPLAY_MATH_RE, FIGURE_TITLE_LINE_RE, HEADING_LINE_RE, HEADING_NUMBER_RE, IMAGE_LINE_RE,
    INLINE_MATH_RE, MATH_SUBSTITUTIONS, TABLE_TITLE_LINE_RE,
};
use crate::types::{NormalizationReport, TitleCorrection};
use regex::Captures;
use tracing::{debug, info};

const TABLE_CONTAINER_OPEN: &str = r#"<div class="table-container no-break">"#;
const FIGURE_CONTAINER_OPEN: &str = r#"<div class="figure-container no-break">"#;
const CONTAINER_CLOSE: &str = "</div>";

/// Rewrites a single markdown fragment before compilation.
pub struct NotationNormalizer {
    title_corrections: Vec<TitleCorrection>,
}

impl NotationNormalizer {
    pub fn new(title_corrections: Vec<TitleCorrection>) -> Self {
        Self { title_corrections }
    }

    /// Applies, in order: heading de-enumeration, title corrections,
    /// table/figure wrapping and formula conversion.
    pub fn normalize(&self, fragment: &str, text: &str) -> (String, NormalizationReport) {
        let mut report = NormalizationReport::for_fragment(fragment);

        let content = Self::strip_heading_numbers(text, &mut report);
        let content = self.correct_titles(&content, &mut report);
        let content = Self::wrap_tables_and_figures(&content, &mut report);
        let content = Self::convert_formulas(&content, &mut report);

        if report.is_empty() {
            debug!("No corrections needed in {}", fragment);
        } else {
            info!(
                "Normalized {}: {} heading numbers, {} title corrections, {} tables, {} figures, {} formulas",
                fragment,
                report.stripped_heading_numbers,
                report.title_corrections.len(),
                report.wrapped_tables,
                report.wrapped_figures,
                report.display_formulas + report.inline_formulas
            );
        }

        (content, report)
    }

    fn strip_heading_numbers(text: &str, report: &mut NormalizationReport) -> String {
        report.stripped_heading_numbers = HEADING_NUMBER_RE.find_iter(text).count();
        HEADING_NUMBER_RE.replace_all(text, "${1}").into_owned()
    }

    fn correct_titles(&self, text: &str, report: &mut NormalizationReport) -> String {
        if self.title_corrections.is_empty() {
            return text.to_string();
        }

        HEADING_LINE_RE
            .replace_all(text, |caps: &Captures| {
                let marker = &caps[1];
                let title = &caps[2];
                for correction in &self.title_corrections {
                    if let Some(rest) = title.strip_prefix(correction.from.as_str()) {
                        debug!("Correcting heading '{}' -> '{}'", correction.from, correction.to);
                        report.title_corrections.push(correction.from.clone());
                        return format!("{}{}{}", marker, correction.to, rest);
                    }
                }
                caps[0].to_string()
            })
            .into_owned()
    }

    fn wrap_tables_and_figures(text: &str, report: &mut NormalizationReport) -> String {
        let lines: Vec<&str> = text.split('\n').collect();
        let mut output: Vec<&str> = Vec::with_capacity(lines.len());
        let mut idx = 0;

        while idx < lines.len() {
            let line = lines[idx];

            if TABLE_TITLE_LINE_RE.is_match(line) {
                if let Some(end) = Self::table_block_end(&lines, idx) {
                    output.push(TABLE_CONTAINER_OPEN);
                    output.extend_from_slice(&lines[idx..end]);
                    output.push("");
                    output.push(CONTAINER_CLOSE);
                    report.wrapped_tables += 1;
                    idx = end;
                    continue;
                }
            } else if FIGURE_TITLE_LINE_RE.is_match(line) {
                if let Some(end) = Self::figure_block_end(&lines, idx) {
                    output.push(FIGURE_CONTAINER_OPEN);
                    output.extend_from_slice(&lines[idx..end]);
                    output.push("");
                    output.push(CONTAINER_CLOSE);
                    report.wrapped_figures += 1;
                    idx = end;
                    continue;
                }
            }

            output.push(line);
            idx += 1;
        }

        output.join("\n")
    }

    fn skip_blank(lines: &[&str], mut idx: usize) -> usize {
        while idx < lines.len() && lines[idx].trim().is_empty() {
            idx += 1;
        }
        idx
    }

    /// End (exclusive) of a table title followed by a pipe-delimited block.
    fn table_block_end(lines: &[&str], title: usize) -> Option<usize> {
        let start = Self::skip_blank(lines, title + 1);
        let mut end = start;
        while end < lines.len() && lines[end].trim_start().starts_with('|') {
            end += 1;
        }
        (end > start).then_some(end)
    }

    /// End (exclusive) of a figure title, its image and the source line.
    fn figure_block_end(lines: &[&str], title: usize) -> Option<usize> {
        let image = Self::skip_blank(lines, title + 1);
        if image >= lines.len() || !IMAGE_LINE_RE.is_match(lines[image].trim_start()) {
            return None;
        }
        let source = Self::skip_blank(lines, image + 1);
        if source >= lines.len() || !lines[source].contains("Fuente:") {
            return None;
        }
        Some(source + 1)
    }

    fn convert_formulas(text: &str, report: &mut NormalizationReport) -> String {
        let content = DISPLAY_MATH_RE
            .replace_all(text, |caps: &Captures| {
                report.display_formulas += 1;
                format!(r#"<div class="math-display">{}</div>"#, Self::convert_notation(&caps[1]))
            })
            .into_owned();

        INLINE_MATH_RE
            .replace_all(&content, |caps: &Captures| {
                report.inline_formulas += 1;
                format!(r#"<span class="math-formula">{}</span>"#, Self::convert_notation(&caps[1]))
            })
            .into_owned()
    }

    /// Runs one formula body through the ordered substitution table.
    pub fn convert_notation(latex: &str) -> String {
        MATH_SUBSTITUTIONS
            .iter()
            .fold(latex.to_string(), |acc, (pattern, replacement)| {
                pattern.replace_all(&acc, *replacement).into_owned()
            })
    }
}

impl Default for NotationNormalizer {
    fn default() -> Self {
        Self::new(TitleCorrection::defaults())
    }
}
