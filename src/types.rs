use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FragmentRole {
    Cover,
    FirstPage,
    Chapter,
    Appendix,
    Reference,
}

impl FragmentRole {
    /// Guesses the role of a manifest entry from its path.
    pub fn infer(path: &str) -> Self {
        let lower = path.to_lowercase();
        if lower.contains("anexo") || lower.contains("appendix") {
            FragmentRole::Appendix
        } else if lower.contains("referencia") || lower.contains("bibliograf") {
            FragmentRole::Reference
        } else {
            FragmentRole::Chapter
        }
    }

    /// Name used in manifests and fragment markers.
    pub fn as_str(self) -> &'static str {
        match self {
            FragmentRole::Cover => "cover",
            FragmentRole::FirstPage => "first-page",
            FragmentRole::Chapter => "chapter",
            FragmentRole::Appendix => "appendix",
            FragmentRole::Reference => "reference",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "cover" => Some(FragmentRole::Cover),
            "first-page" => Some(FragmentRole::FirstPage),
            "chapter" => Some(FragmentRole::Chapter),
            "appendix" => Some(FragmentRole::Appendix),
            "reference" => Some(FragmentRole::Reference),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceFragment {
    pub path: PathBuf,
    pub role: FragmentRole,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NumberingPolicy {
    Numbered,
    Unnumbered,
}

/// Fragments compiled together into the numbered main document, in caller
/// order.
#[derive(Debug, Clone, Default)]
pub struct Stream {
    pub fragments: Vec<SourceFragment>,
}

impl Stream {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentStatus {
    pub path: String,
    pub role: FragmentRole,
    pub found: bool,
}

/// Output of the source aggregator: the optional cover stream and the
/// numbered main stream, already concatenated.
#[derive(Debug, Clone)]
pub struct AggregatedSources {
    pub cover_stream: Option<String>,
    pub main_stream: String,
    pub fragments: Vec<FragmentStatus>,
    pub normalization: Vec<NormalizationReport>,
}

impl AggregatedSources {
    pub fn has_cover(&self) -> bool {
        self.cover_stream.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub fragment: String,
    pub stripped_heading_numbers: usize,
    pub title_corrections: Vec<String>,
    pub wrapped_tables: usize,
    pub wrapped_figures: usize,
    pub display_formulas: usize,
    pub inline_formulas: usize,
}

impl NormalizationReport {
    pub fn for_fragment(fragment: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stripped_heading_numbers == 0
            && self.title_corrections.is_empty()
            && self.wrapped_tables == 0
            && self.wrapped_figures == 0
            && self.display_formulas == 0
            && self.inline_formulas == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeadingKind {
    Regular,
    Appendix,
    ReferenceTitle,
}

/// A heading found in compiled hypertext. `span` is the byte range of the
/// whole `<hN ...>...</hN>` element in the document it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingEntry {
    pub level: u8,
    pub number: Option<String>,
    pub title: String,
    pub id: Option<String>,
    pub kind: HeadingKind,
    pub span: Range<usize>,
}

impl HeadingEntry {
    /// Letter-based appendix number at the start of the title (`A.2`), if any.
    pub fn letter_number(&self) -> Option<&str> {
        let end = self
            .title
            .find(|c: char| c.is_whitespace())
            .unwrap_or(self.title.len());
        let head = self.title[..end].trim_end_matches([':', '.']);
        let mut parts = head.split('.');
        let letter = parts.next()?;
        if letter.len() != 1 || !letter.chars().all(|c| c.is_ascii_uppercase()) {
            return None;
        }
        let mut digits = 0;
        for part in parts {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            digits += 1;
        }
        (digits > 0).then_some(head)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexKind {
    Figure,
    Table,
    Equation,
}

impl IndexKind {
    pub fn label(self) -> &'static str {
        match self {
            IndexKind::Figure => "Figura",
            IndexKind::Table => "Tabla",
            IndexKind::Equation => "Ecuación",
        }
    }

    fn anchor_prefix(self) -> &'static str {
        match self {
            IndexKind::Figure => "figura",
            IndexKind::Table => "tabla",
            IndexKind::Equation => "ecuacion",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub kind: IndexKind,
    pub number: String,
    pub title: String,
    pub anchor: String,
}

impl IndexEntry {
    pub fn new(kind: IndexKind, number: &str, title: &str) -> Self {
        Self {
            kind,
            number: number.to_string(),
            title: title.split_whitespace().collect::<Vec<_>>().join(" "),
            anchor: Self::anchor_for(kind, number),
        }
    }

    /// Deterministic anchor id: `figura-3-2`, `tabla-2-3`, `ecuacion-b-1`.
    pub fn anchor_for(kind: IndexKind, number: &str) -> String {
        format!(
            "{}-{}",
            kind.anchor_prefix(),
            number.to_lowercase().replace('.', "-")
        )
    }

    pub fn display(&self) -> String {
        match self.kind {
            IndexKind::Equation => format!("{} ({}): {}", self.kind.label(), self.number, self.title),
            _ => format!("{} {}: {}", self.kind.label(), self.number, self.title),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub id: String,
    pub text: String,
}

/// Terminal states of the compilation adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilationOutcome {
    WithCover { cover_html: PathBuf, main_html: PathBuf },
    WithoutCover { main_html: PathBuf },
}

impl CompilationOutcome {
    pub fn main_html(&self) -> &Path {
        match self {
            CompilationOutcome::WithCover { main_html, .. } => main_html,
            CompilationOutcome::WithoutCover { main_html } => main_html,
        }
    }

    pub fn cover_html(&self) -> Option<&Path> {
        match self {
            CompilationOutcome::WithCover { cover_html, .. } => Some(cover_html),
            CompilationOutcome::WithoutCover { .. } => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CompilationOutcome::WithCover { .. } => "with-cover",
            CompilationOutcome::WithoutCover { .. } => "without-cover",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassKind {
    TocTitle,
    AnnexDenumbering,
    References,
    Indices,
    TitleStyling,
    SourceCitations,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    pub pass: PassKind,
    pub changes: usize,
    pub notes: Vec<String>,
}

impl PassReport {
    pub fn new(pass: PassKind) -> Self {
        Self {
            pass,
            changes: 0,
            notes: Vec::new(),
        }
    }

    pub fn record(&mut self, note: impl Into<String>) {
        self.changes += 1;
        self.notes.push(note.into());
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostProcessReport {
    pub passes: Vec<PassReport>,
}

impl PostProcessReport {
    pub fn total_changes(&self) -> usize {
        self.passes.iter().map(|p| p.changes).sum()
    }

    pub fn pass(&self, kind: PassKind) -> Option<&PassReport> {
        self.passes.iter().find(|p| p.pass == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleCorrection {
    pub from: String,
    pub to: String,
}

impl TitleCorrection {
    /// Headings whose text historically broke the compiler's title detection.
    pub fn defaults() -> Vec<Self> {
        defaults::title_corrections()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquationEntry {
    pub number: String,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FragmentSpecRepr {
    Path(String),
    Detailed {
        path: String,
        #[serde(default)]
        role: Option<FragmentRole>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FragmentSpecRepr")]
pub struct FragmentSpec {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<FragmentRole>,
}

impl From<FragmentSpecRepr> for FragmentSpec {
    fn from(repr: FragmentSpecRepr) -> Self {
        match repr {
            FragmentSpecRepr::Path(path) => Self { path, role: None },
            FragmentSpecRepr::Detailed { path, role } => Self { path, role },
        }
    }
}

impl FragmentSpec {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            role: None,
        }
    }

    pub fn resolved_role(&self) -> FragmentRole {
        self.role.unwrap_or_else(|| FragmentRole::infer(&self.path))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildManifest {
    pub fragments: Vec<FragmentSpec>,
    #[serde(default = "defaults::cover")]
    pub cover: Option<String>,
    #[serde(default = "defaults::first_page")]
    pub first_page: Option<String>,
    #[serde(default = "defaults::stylesheet")]
    pub stylesheet: String,
    #[serde(default = "defaults::output_html")]
    pub output_html: String,
    #[serde(default = "defaults::output_pdf")]
    pub output_pdf: String,
    #[serde(default = "defaults::asset_dir")]
    pub asset_dir: String,
    #[serde(default = "defaults::title_corrections")]
    pub title_corrections: Vec<TitleCorrection>,
    #[serde(default)]
    pub equations: Vec<EquationEntry>,
    #[serde(default = "defaults::compiler")]
    pub compiler: String,
    #[serde(default = "defaults::renderer")]
    pub renderer: String,
}

impl BuildManifest {
    pub fn with_fragments(fragments: Vec<FragmentSpec>) -> Self {
        Self {
            fragments,
            cover: defaults::cover(),
            first_page: defaults::first_page(),
            stylesheet: defaults::stylesheet(),
            output_html: defaults::output_html(),
            output_pdf: defaults::output_pdf(),
            asset_dir: defaults::asset_dir(),
            title_corrections: defaults::title_corrections(),
            equations: Vec::new(),
            compiler: defaults::compiler(),
            renderer: defaults::renderer(),
        }
    }
}

mod defaults {
    use super::TitleCorrection;

    pub fn cover() -> Option<String> {
        Some("portada.md".to_string())
    }

    pub fn first_page() -> Option<String> {
        Some("primer_pagina.md".to_string())
    }

    pub fn stylesheet() -> String {
        "formato_tesina.css".to_string()
    }

    pub fn output_html() -> String {
        "tesina_completa.html".to_string()
    }

    pub fn output_pdf() -> String {
        "tesina.pdf".to_string()
    }

    pub fn asset_dir() -> String {
        "recursos".to_string()
    }

    pub fn compiler() -> String {
        "pandoc".to_string()
    }

    pub fn renderer() -> String {
        "weasyprint".to_string()
    }

    pub fn title_corrections() -> Vec<TitleCorrection> {
        [
            ("Hallazgo Central:", "Hallazgo Central -"),
            ("Superioridad del Escenario 8:", "Superioridad del Escenario 8 -"),
        ]
        .into_iter()
        .map(|(from, to)| TitleCorrection {
            from: from.to_string(),
            to: to.to_string(),
        })
        .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub generated_at: String,
    pub fragments: Vec<FragmentStatus>,
    pub normalization: Vec<NormalizationReport>,
    pub compilation: String,
    pub postprocess: PostProcessReport,
    pub html_path: PathBuf,
    pub pdf_path: Option<PathBuf>,
}

/// Result of checking a base directory against its manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub stylesheet: PathBuf,
    pub stylesheet_found: bool,
    pub fragments: Vec<FragmentStatus>,
    /// Markdown files under the base directory the manifest never names.
    pub unreferenced: Vec<String>,
}

impl CheckReport {
    pub fn missing(&self) -> impl Iterator<Item = &FragmentStatus> {
        self.fragments.iter().filter(|f| !f.found)
    }
}
