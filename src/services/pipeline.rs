use crate::error::{Result, ThesisBuildError};
use crate::services::aggregator::SourceAggregator;
use crate::services::compiler::{CompilationAdapter, CompilerBackend, PandocCompiler};
use crate::services::merger::DocumentMerger;
use crate::services::postprocessor::StructuralPostProcessor;
use crate::services::renderer::{RenderBackend, RenderJob, WeasyPrintRenderer};
use crate::types::{BuildManifest, BuildReport};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info};

/// Sequential build: aggregate, compile, merge, post-process, render.
pub struct ThesisPipeline<C, R> {
    base_dir: PathBuf,
    manifest: BuildManifest,
    compiler: C,
    renderer: R,
}

impl ThesisPipeline<PandocCompiler, WeasyPrintRenderer> {
    /// Pipeline using the executables the manifest names.
    pub fn from_manifest(base_dir: &Path, manifest: BuildManifest) -> Self {
        let compiler = PandocCompiler::new(manifest.compiler.clone());
        let renderer = WeasyPrintRenderer::new(manifest.renderer.clone());
        Self::new(base_dir, manifest, compiler, renderer)
    }
}

impl<C: CompilerBackend, R: RenderBackend> ThesisPipeline<C, R> {
    pub fn new(base_dir: &Path, manifest: BuildManifest, compiler: C, renderer: R) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            manifest,
            compiler,
            renderer,
        }
    }

    pub fn html_path(&self) -> PathBuf {
        BuildManifest::resolve(&self.base_dir, &self.manifest.output_html)
    }

    pub fn pdf_path(&self) -> PathBuf {
        BuildManifest::resolve(&self.base_dir, &self.manifest.output_pdf)
    }

    /// Runs the whole build. With `render` unset the run stops after the
    /// hypertext is written. The hypertext is kept on disk whether or not
    /// rendering succeeds.
    pub async fn run(&self, render: bool) -> Result<BuildReport> {
        let stylesheet = BuildManifest::resolve(&self.base_dir, &self.manifest.stylesheet);
        if !stylesheet.is_file() {
            return Err(ThesisBuildError::StylesheetMissing {
                path: stylesheet.display().to_string(),
            });
        }

        info!("[1/4] Aggregating sources from {}", self.base_dir.display());
        let sources = SourceAggregator::new(&self.manifest)
            .aggregate(&self.base_dir)
            .await?;

        info!("[2/4] Compiling with {}", self.compiler.name());
        let html_path = self.html_path();
        let adapter = CompilationAdapter::new(&self.compiler, &self.base_dir, &self.manifest.stylesheet);
        let outcome = adapter.compile(&sources, &html_path).await?;

        info!("[3/4] Merging and post-processing ({})", outcome.label());
        let main_html = fs::read_to_string(outcome.main_html()).await?;
        let cover_html = match outcome.cover_html() {
            Some(path) => Some(fs::read_to_string(path).await?),
            None => None,
        };
        let merged = DocumentMerger::merge(&main_html, cover_html.as_deref());

        let processor = StructuralPostProcessor::new(self.manifest.equations.clone());
        let (processed, postprocess) = processor.process(&merged);
        fs::write(&html_path, processed).await?;
        adapter.cleanup(&outcome).await;
        info!("Hypertext kept for diagnosis: {}", html_path.display());

        let pdf_path = if render {
            info!("[4/4] Rendering with {}", self.renderer.name());
            let job = RenderJob {
                html: html_path.clone(),
                pdf: self.pdf_path(),
                base_url: self.base_dir.clone(),
            };
            if let Err(e) = self.renderer.render(&job).await {
                error!("Rendering failed; hypertext retained at {}", html_path.display());
                return Err(e);
            }
            info!("PDF written to {}", job.pdf.display());
            Some(job.pdf)
        } else {
            info!("[4/4] Rendering skipped");
            None
        };

        Ok(BuildReport {
            generated_at: chrono::Utc::now().to_rfc3339(),
            fragments: sources.fragments,
            normalization: sources.normalization,
            compilation: outcome.label().to_string(),
            postprocess,
            html_path,
            pdf_path,
        })
    }
}
