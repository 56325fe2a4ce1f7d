//! # Thesis Assembler
//!
//! Builds a single paginated thesis from ordered markdown fragments: cover,
//! first page, chapters, appendices and references. Fragments are
//! normalized, compiled to HTML by an external compiler, merged with the
//! cover page, corrected by a fixed sequence of structural passes and
//! rendered to PDF by an external renderer.
//!
//! ## Example Usage
//!
//! ```no_run
//! use thesis_assembler::{BuildManifest, ThesisPipeline};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let base_dir = Path::new("tesis");
//!     let manifest = BuildManifest::load(&base_dir.join("thesis.json")).await?;
//!
//!     let pipeline = ThesisPipeline::from_manifest(base_dir, manifest);
//!     let report = pipeline.run(true).await?;
//!
//!     println!("Applied {} corrections", report.postprocess.total_changes());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod services;
pub mod types;

pub use error::{Result, ThesisBuildError};
pub use services::{
    CompilationAdapter, CompileJob, CompilerBackend, DocumentMerger, FigureTableIndexer,
    NotationNormalizer, PandocCompiler, RenderBackend, RenderJob, SourceAggregator,
    StructuralPostProcessor, ThesisPipeline, WeasyPrintRenderer,
};
pub use types::{
    AggregatedSources, BuildManifest, BuildReport, CheckReport, CompilationOutcome, FragmentRole,
    FragmentSpec, HeadingKind, IndexEntry, IndexKind, PassKind, PostProcessReport,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
