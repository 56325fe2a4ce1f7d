pub mod aggregator;
pub mod compiler;
pub mod indexer;
pub mod manifest;
pub mod markup;
pub mod merger;
pub mod normalizer;
pub mod patterns;
pub mod pipeline;
pub mod postprocessor;
pub mod renderer;
pub mod tool;

pub use aggregator::SourceAggregator;
pub use compiler::{CompilationAdapter, CompileJob, CompilerBackend, PandocCompiler};
pub use indexer::FigureTableIndexer;
pub use merger::DocumentMerger;
pub use normalizer::NotationNormalizer;
pub use pipeline::ThesisPipeline;
pub use postprocessor::StructuralPostProcessor;
pub use renderer::{RenderBackend, RenderJob, WeasyPrintRenderer};
