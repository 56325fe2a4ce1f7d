use crate::error::{Result, ThesisBuildError};
use crate::services::compiler::{TEMP_COVER_MARKDOWN, TEMP_MAIN_MARKDOWN};
use crate::types::{BuildManifest, CheckReport, EquationEntry, FragmentRole, FragmentSpec, FragmentStatus};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use walkdir::WalkDir;

pub const DEFAULT_MANIFEST: &str = "thesis.json";

impl BuildManifest {
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ThesisBuildError::ManifestNotFound {
                path: path.display().to_string(),
            });
        }

        let content = fs::read_to_string(path).await?;
        let manifest: BuildManifest = serde_json::from_str(&content)?;
        info!(
            "Loaded manifest {} with {} fragments",
            path.display(),
            manifest.fragments.len()
        );
        Ok(manifest)
    }

    /// Starter manifest: six chapters, appendices A to E and references.
    pub fn template() -> Self {
        let chapters = [
            "capitulos/capitulo1_introduccion.md",
            "capitulos/capitulo2_marco_teorico.md",
            "capitulos/capitulo3_metodologia.md",
            "capitulos/capitulo4_validacion_sensibilidad.md",
            "capitulos/capitulo5_escenarios.md",
            "capitulos/capitulo6_resultados_recomendaciones.md",
        ];
        let appendices = ["a", "b", "c", "d", "e"].map(|letter| format!("anexos/anexo_{}.md", letter));

        let mut fragments: Vec<FragmentSpec> = chapters.iter().map(|p| FragmentSpec::new(p)).collect();
        fragments.extend(appendices.iter().map(|p| FragmentSpec::new(p)));
        fragments.push(FragmentSpec::new("referencias.md"));

        let mut manifest = Self::with_fragments(fragments);
        manifest.equations = [
            ("3.1", "Generación Total por Día"),
            ("3.2", "Restricción de Transporte Final"),
            ("3.3", "Balance de Conservación de Masa"),
            ("B.1", "Generación Total por Día"),
            ("B.2", "Restricción de Transporte Final"),
            ("B.3", "Acumulación Forzada"),
            ("B.4", "Costo Neto del Sistema"),
            ("B.5", "Balance de Conservación de Masa"),
        ]
        .into_iter()
        .map(|(number, title)| EquationEntry {
            number: number.to_string(),
            title: title.to_string(),
        })
        .collect();
        manifest
    }

    /// Writes the template manifest, refusing to replace an existing file
    /// unless `force` is set.
    pub async fn write_template(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            return Err(ThesisBuildError::ManifestExists {
                path: path.display().to_string(),
            });
        }
        let json = serde_json::to_string_pretty(&Self::template())?;
        fs::write(path, json).await?;
        info!("Wrote manifest template to {}", path.display());
        Ok(())
    }

    pub fn resolve(base_dir: &Path, relative: &str) -> PathBuf {
        base_dir.join(relative)
    }

    /// Every identifier the manifest names, in build order, with its role.
    pub fn entries(&self) -> Vec<(String, FragmentRole)> {
        let mut entries = Vec::with_capacity(self.fragments.len() + 2);
        if let Some(cover) = &self.cover {
            entries.push((cover.clone(), FragmentRole::Cover));
        }
        if let Some(first_page) = &self.first_page {
            entries.push((first_page.clone(), FragmentRole::FirstPage));
        }
        entries.extend(
            self.fragments
                .iter()
                .map(|f| (f.path.clone(), f.resolved_role())),
        );
        entries
    }

    /// Checks the stylesheet and every fragment under `base_dir`, and lists
    /// markdown files the manifest does not reference.
    pub fn check(&self, base_dir: &Path) -> CheckReport {
        let stylesheet = Self::resolve(base_dir, &self.stylesheet);
        let fragments: Vec<FragmentStatus> = self
            .entries()
            .into_iter()
            .map(|(path, role)| FragmentStatus {
                found: Self::resolve(base_dir, &path).is_file(),
                path,
                role,
            })
            .collect();

        let referenced: HashSet<PathBuf> = fragments
            .iter()
            .map(|f| Path::new(&f.path).components().collect())
            .collect();
        let scratch = [TEMP_MAIN_MARKDOWN, TEMP_COVER_MARKDOWN];

        let mut unreferenced: Vec<String> = WalkDir::new(base_dir)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|x| x == "md"))
            .filter_map(|e| {
                let relative = e.path().strip_prefix(base_dir).ok()?.to_path_buf();
                let name = relative.to_string_lossy().into_owned();
                if referenced.contains(&relative) || scratch.contains(&name.as_str()) {
                    return None;
                }
                debug!("Unreferenced markdown file: {}", name);
                Some(name)
            })
            .collect();
        unreferenced.sort();

        CheckReport {
            stylesheet_found: stylesheet.is_file(),
            stylesheet,
            fragments,
            unreferenced,
        }
    }
}
