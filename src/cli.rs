use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "thesis-build")]
#[command(about = "Assembles thesis markdown fragments into a post-processed HTML and PDF")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding the fragments, stylesheet and outputs
    #[arg(short, long, global = true, default_value = ".")]
    pub base_dir: PathBuf,

    /// Build manifest, relative to the base directory
    #[arg(short, long, global = true, default_value = "thesis.json")]
    pub manifest: PathBuf,
}

impl Cli {
    pub fn manifest_path(&self) -> PathBuf {
        self.base_dir.join(&self.manifest)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline and render the PDF
    Build(BuildArgs),

    /// Re-run the structural passes on an existing HTML file in place
    Postprocess(PostprocessArgs),

    /// Verify the stylesheet and every fragment the manifest lists
    Check,

    /// Write a starter manifest
    Init(InitArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Write the build report as JSON
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Stop after writing the HTML; skip PDF rendering
    #[arg(long)]
    pub html_only: bool,
}

#[derive(Args)]
pub struct PostprocessArgs {
    /// HTML file to correct
    #[arg(required = true, value_name = "HTML")]
    pub html: PathBuf,

    /// Write the pass reports to a JSON file
    #[arg(long, value_name = "FILE")]
    pub json_output: Option<PathBuf>,
}

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing manifest
    #[arg(long)]
    pub force: bool,
}
