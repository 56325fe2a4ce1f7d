use crate::error::{Result, ThesisBuildError};
use crate::services::markup::fragment_marker;
use crate::services::normalizer::NotationNormalizer;
use crate::types::{
    AggregatedSources, BuildManifest, FragmentRole, FragmentStatus, SourceFragment, Stream,
};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

const PAGE_BREAK: &str = r#"<div class="page-break"></div>"#;

/// Reads, normalizes and orders the manifest's fragments into the cover
/// stream and the numbered main stream.
pub struct SourceAggregator<'a> {
    manifest: &'a BuildManifest,
    normalizer: NotationNormalizer,
}

impl<'a> SourceAggregator<'a> {
    pub fn new(manifest: &'a BuildManifest) -> Self {
        Self {
            manifest,
            normalizer: NotationNormalizer::new(manifest.title_corrections.clone()),
        }
    }

    pub async fn aggregate(&self, base_dir: &Path) -> Result<AggregatedSources> {
        let mut statuses = Vec::new();
        let mut normalization = Vec::new();

        let cover = match &self.manifest.cover {
            Some(path) => self.read_front_matter(base_dir, path, FragmentRole::Cover, &mut statuses).await?,
            None => None,
        };
        let first_page = match &self.manifest.first_page {
            Some(path) => {
                self.read_front_matter(base_dir, path, FragmentRole::FirstPage, &mut statuses)
                    .await?
            }
            None => None,
        };

        let mut stream = Stream::default();
        for spec in &self.manifest.fragments {
            let role = spec.resolved_role();
            let Some(raw) = Self::read_optional(base_dir, &spec.path).await? else {
                warn!("[✗] {} (not found, skipped)", spec.path);
                statuses.push(FragmentStatus {
                    path: spec.path.clone(),
                    role,
                    found: false,
                });
                continue;
            };

            info!("[✓] {}", spec.path);
            let (text, report) = self
                .normalizer
                .normalize(&spec.path, &self.rewrite_assets(&raw));
            normalization.push(report);
            statuses.push(FragmentStatus {
                path: spec.path.clone(),
                role,
                found: true,
            });
            stream.fragments.push(SourceFragment {
                path: spec.path.clone().into(),
                role,
                text,
            });
        }

        if stream.is_empty() && cover.is_none() {
            return Err(ThesisBuildError::NoContent {
                reason: "none of the manifest's fragments or cover were found".to_string(),
            });
        }

        info!(
            "Aggregated {} fragments{}{}",
            stream.fragments.len(),
            if cover.is_some() { " with cover" } else { "" },
            if first_page.is_some() { " and first page" } else { "" }
        );

        Ok(AggregatedSources {
            cover_stream: cover.map(|c| c.text),
            main_stream: Self::assemble(first_page.as_ref(), &stream),
            fragments: statuses,
            normalization,
        })
    }

    /// Cover and first page only get their asset paths flattened.
    async fn read_front_matter(
        &self,
        base_dir: &Path,
        path: &str,
        role: FragmentRole,
        statuses: &mut Vec<FragmentStatus>,
    ) -> Result<Option<SourceFragment>> {
        let raw = Self::read_optional(base_dir, path).await?;
        statuses.push(FragmentStatus {
            path: path.to_string(),
            role,
            found: raw.is_some(),
        });

        match raw {
            Some(raw) => {
                info!("[✓] {} ({:?})", path, role);
                Ok(Some(SourceFragment {
                    path: path.into(),
                    role,
                    text: self.rewrite_assets(&raw),
                }))
            }
            None => {
                warn!("[✗] {} (not found)", path);
                Ok(None)
            }
        }
    }

    async fn read_optional(base_dir: &Path, relative: &str) -> Result<Option<String>> {
        let path = BuildManifest::resolve(base_dir, relative);
        match fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// `../recursos/x.png` becomes `recursos/x.png`.
    pub fn rewrite_assets(&self, text: &str) -> String {
        let asset_dir = &self.manifest.asset_dir;
        text.replace(&format!("../{}/", asset_dir), &format!("{}/", asset_dir))
    }

    /// First page, a page break, then every fragment in order, each preceded
    /// by a marker naming its role.
    pub fn assemble(first_page: Option<&SourceFragment>, stream: &Stream) -> String {
        let mut content = String::new();
        if let Some(first_page) = first_page {
            content.push_str(&first_page.text);
            content.push_str("\n\n");
            content.push_str(PAGE_BREAK);
            content.push_str("\n\n");
        }

        for fragment in &stream.fragments {
            content.push_str(&fragment_marker(fragment.role));
            content.push_str("\n\n");
            content.push_str(&fragment.text);
            content.push_str("\n\n");
        }
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FragmentSpec;

    fn write(base: &Path, relative: &str, text: &str) {
        let path = base.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, text).unwrap();
    }

    fn manifest(paths: &[&str]) -> BuildManifest {
        BuildManifest::with_fragments(paths.iter().map(|p| FragmentSpec::new(p)).collect())
    }

    #[tokio::test]
    async fn test_missing_fragments_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "capitulos/uno.md", "# 1 Uno\n\nTexto.");

        let manifest = manifest(&["capitulos/uno.md", "capitulos/dos.md"]);
        let sources = SourceAggregator::new(&manifest).aggregate(dir.path()).await.unwrap();

        assert!(!sources.has_cover());
        assert_eq!(
            sources.main_stream,
            format!("{}\n\n# Uno\n\nTexto.\n\n", fragment_marker(FragmentRole::Chapter))
        );
        let found: Vec<bool> = sources.fragments.iter().map(|f| f.found).collect();
        assert_eq!(found, vec![false, false, true, false]);
        assert_eq!(sources.normalization.len(), 1);
    }

    #[tokio::test]
    async fn test_order_markers_and_front_matter() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "portada.md", "# 1 Universidad\n\n![logo](../recursos/logo.png)");
        write(dir.path(), "primer_pagina.md", "Dedicatoria $x$");
        write(dir.path(), "capitulos/uno.md", "# Uno\n\n![mapa](../recursos/mapa.png)");
        write(dir.path(), "anexos/anexo_a.md", "# ANEXO A: Datos");
        write(dir.path(), "anexos/anexo_b.md", "# ANEXO B: Modelo");
        write(dir.path(), "referencias.md", "# Referencias");

        let manifest = manifest(&[
            "capitulos/uno.md",
            "anexos/anexo_a.md",
            "anexos/anexo_b.md",
            "referencias.md",
        ]);
        let sources = SourceAggregator::new(&manifest).aggregate(dir.path()).await.unwrap();

        assert_eq!(
            sources.cover_stream.as_deref(),
            Some("# 1 Universidad\n\n![logo](recursos/logo.png)")
        );
        let main = &sources.main_stream;
        assert!(main.starts_with(&format!(
            "Dedicatoria $x$\n\n<div class=\"page-break\"></div>\n\n{}\n\n# Uno",
            fragment_marker(FragmentRole::Chapter)
        )));
        assert!(main.contains("![mapa](recursos/mapa.png)"));
        let appendix = fragment_marker(FragmentRole::Appendix);
        assert_eq!(main.matches(&appendix).count(), 2);
        assert_eq!(main.matches(&fragment_marker(FragmentRole::Chapter)).count(), 1);

        let first_appendix = main.find(&appendix).unwrap();
        assert!(main.find("# Uno").unwrap() < first_appendix);
        assert!(first_appendix < main.find("# ANEXO A").unwrap());
        let reference = main.find(&fragment_marker(FragmentRole::Reference)).unwrap();
        assert!(main.find("# ANEXO B").unwrap() < reference);
        assert!(reference < main.find("# Referencias").unwrap());
    }

    #[tokio::test]
    async fn test_nothing_found_is_no_content() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = manifest(&["capitulos/uno.md"]);
        let err = SourceAggregator::new(&manifest).aggregate(dir.path()).await.unwrap_err();
        assert!(matches!(err, ThesisBuildError::NoContent { .. }));
    }
}
