//! Cached regex patterns for fragment normalization and hypertext rewriting.
//!
//! Compiled once on first use through `LazyLock`.

use regex::Regex;
use std::sync::LazyLock;

// === Markdown fragment patterns ===

/// Manual heading enumeration: `## 1.2 Title`, `# 3. Title`
pub static HEADING_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(#{1,6}[ \t]+)\d+(?:\.\d+)*\.?[ \t]+").unwrap()
});

/// Any ATX heading line, marker and text captured separately
pub static HEADING_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(#{1,6}[ \t]+)([^\n]*)$").unwrap()
});

/// Bold table title line: `**Tabla 2.3: Annual Totals**`
pub static TABLE_TITLE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\*\*Tabla \d+\.\d+:.*\*\*").unwrap()
});

/// Bold figure title line: `**Figura 3.1: Flow**`
pub static FIGURE_TITLE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\*\*Figura \d+\.\d+:.*\*\*").unwrap()
});

/// Markdown image line
pub static IMAGE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^!\[[^\]]*\]\([^)]*\)").unwrap()
});

/// `$$...$$` display formula
pub static DISPLAY_MATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$([^$]+)\$\$").unwrap()
});

/// `$...$` inline formula, never spanning lines
pub static INLINE_MATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$([^$\n]+)\$").unwrap()
});

const FRACTION_HTML: &str = concat!(
    r#"<span style="display: inline-block; vertical-align: middle; margin: 0 2px;">"#,
    r#"<span style="display: block; text-align: center; border-bottom: 1px solid black; padding: 0 2px;">${1}</span>"#,
    r#"<span style="display: block; text-align: center; padding: 0 2px;">${2}</span>"#,
    r#"</span>"#,
);

/// Ordered notation substitutions. Bounded forms precede their bare
/// fallbacks so `\sum_{i}^{n}` is never consumed as `\sum`.
pub static MATH_SUBSTITUTIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (
            r"\\sum_\{\s*([^}]+?)\s*\}\s*\^\s*\{\s*([^}]+?)\s*\}",
            "∑<sub>${1}</sub><sup>${2}</sup>",
        ),
        (r"\\sum_\{\s*([^}]+?)\s*\}", "∑<sub>${1}</sub>"),
        (r"\\sum", "∑"),
        (
            r"\\prod_\{\s*([^}]+?)\s*\}\s*\^\s*\{\s*([^}]+?)\s*\}",
            "∏<sub>${1}</sub><sup>${2}</sup>",
        ),
        (r"\\prod_\{\s*([^}]+?)\s*\}", "∏<sub>${1}</sub>"),
        (r"\\prod", "∏"),
        (r"\\times", "×"),
        (r"\\min", "min"),
        (r"\\max", "max"),
        (r"\\frac\{\s*([^}]+?)\s*\}\{\s*([^}]+?)\s*\}", FRACTION_HTML),
        (r"\\mu", "μ"),
        (r"\\sigma", "σ"),
        (r"\\alpha", "α"),
        (r"\\beta", "β"),
        (r"\\sim", "~"),
        (r"\\%", "%"),
        (r"\\Delta", "Δ"),
        (r"_\{\s*([^}]+?)\s*\}", "<sub>${1}</sub>"),
        (r"\^\s*\{\s*([^}]+?)\s*\}", "<sup>${1}</sup>"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), replacement))
    .collect()
});

// === Compiled hypertext patterns ===

/// Opening tag of the table of contents container
pub static TOC_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<(nav|div)\b[^>]*\bid="TOC"[^>]*>"#).unwrap()
});

/// Existing "CONTENIDO" title
pub static TOC_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<h1[^>]*>\s*CONTENIDO\s*</h1>").unwrap()
});

/// `<nav ...>` opening tags, used to exclude navigation blocks from scans
pub static NAV_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<nav\b[^>]*>").unwrap()
});

/// Heading element, level, attributes and inner markup captured
pub static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<h([1-6])(\s[^>]*)?>(.*?)</h[1-6]>").unwrap()
});

/// Compiler-assigned number at the start of a heading's inner markup
pub static HEADER_NUMBER_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)^\s*<span\s+class="header-section-number"[^>]*>([^<]*)</span>\s*"#).unwrap()
});

/// Compiler-assigned number at the start of a TOC link's text
pub static TOC_NUMBER_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)^\s*<span\s+class="toc-section-number"[^>]*>([^<]*)</span>\s*"#).unwrap()
});

/// Link element, attributes and inner markup captured
pub static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<a\b([^>]*)>(.*?)</a>").unwrap()
});

/// Paragraph element; `<p>` never nests, so the lazy body stops at its own close
pub static PARAGRAPH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<p(\s[^>]*)?>(.*?)</p>").unwrap()
});

/// `name="value"` attribute pair
pub static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)="([^"]*)""#).unwrap()
});

/// Any markup tag
pub static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Document body, inner markup captured
pub static BODY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<body[^>]*>(.*?)</body>").unwrap()
});

/// Opening body tag
pub static BODY_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<body[^>]*>").unwrap());

/// Bold figure/table title at the start of a paragraph
pub static INDEX_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*<strong>\s*(figura|tabla)\s+(\d+\.\d+)\s*:\s*(.*?)</strong>").unwrap()
});

/// Fragment marker left by the aggregator, role captured
pub static FRAGMENT_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<div\s+class="fragment-boundary"\s+data-role="([a-z-]+)"[^>]*>"#).unwrap()
});

/// Display formula block produced by the normalizer, body captured
pub static EQUATION_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div class="math-display">(.*?)</div>"#).unwrap()
});

/// Equation label `(3.1)` or `(B.2)` closing a formula's text
pub static EQUATION_LABEL_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(((?:\d+|[A-Z])\.\d+)\)\s*$").unwrap()
});

/// Equation label right after a formula block
pub static EQUATION_LABEL_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\(((?:\d+|[A-Z])\.\d+)\)").unwrap()
});

/// Emphasised source attribution, with or without a leading asterisk
pub static SOURCE_CITATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*<em>\s*\*?\s*Fuente:.*</em>\s*$").unwrap()
});
