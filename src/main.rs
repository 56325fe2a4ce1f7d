mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{BuildArgs, Cli, Commands, InitArgs, PostprocessArgs};
use thesis_assembler::{
    BuildManifest, Result, StructuralPostProcessor, ThesisBuildError, ThesisPipeline,
};
use tracing::{error, info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let result = match &cli.command {
        Commands::Build(args) => handle_build_command(&cli, args).await,
        Commands::Postprocess(args) => handle_postprocess_command(&cli, args).await,
        Commands::Check => handle_check_command(&cli).await,
        Commands::Init(args) => handle_init_command(&cli, args).await,
    };

    if let Err(e) = result {
        error!("Operation failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn handle_build_command(cli: &Cli, args: &BuildArgs) -> Result<()> {
    let manifest = BuildManifest::load(&cli.manifest_path()).await?;
    info!(
        "Building thesis in {} ({} fragments)",
        cli.base_dir.display(),
        manifest.fragments.len()
    );

    let pipeline = ThesisPipeline::from_manifest(&cli.base_dir, manifest);
    let report = pipeline.run(!args.html_only).await?;

    let missing = report.fragments.iter().filter(|f| !f.found).count();
    println!("\n=== Build Summary ===");
    println!("Fragments: {} found, {} missing", report.fragments.len() - missing, missing);
    println!("Compilation: {}", report.compilation);
    for pass in &report.postprocess.passes {
        println!("  {:?}: {} changes", pass.pass, pass.changes);
    }
    println!("HTML: {}", report.html_path.display());
    if let Some(pdf) = &report.pdf_path {
        println!("PDF: {}", pdf.display());
    }

    if let Some(report_path) = &args.report {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize build report")?;
        tokio::fs::write(report_path, json)
            .await
            .context("Failed to write build report")?;
        info!("Build report written to: {}", report_path.display());
    }

    Ok(())
}

async fn handle_postprocess_command(cli: &Cli, args: &PostprocessArgs) -> Result<()> {
    let equations = match BuildManifest::load(&cli.manifest_path()).await {
        Ok(manifest) => manifest.equations,
        Err(ThesisBuildError::ManifestNotFound { path }) => {
            warn!("No manifest at {}; equation index will be empty", path);
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    info!("Post-processing {}", args.html.display());
    let processor = StructuralPostProcessor::new(equations);
    let report = processor.process_file(&args.html).await?;

    for pass in &report.passes {
        println!("{:?}: {} changes", pass.pass, pass.changes);
        for note in &pass.notes {
            println!("  - {}", note);
        }
    }

    if let Some(json_path) = &args.json_output {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize pass reports")?;
        tokio::fs::write(json_path, json)
            .await
            .context("Failed to write pass reports")?;
        info!("Pass reports written to: {}", json_path.display());
    }

    Ok(())
}

async fn handle_check_command(cli: &Cli) -> Result<()> {
    let manifest = BuildManifest::load(&cli.manifest_path()).await?;
    let report = manifest.check(&cli.base_dir);

    println!("\n=== Check for '{}' ===", cli.base_dir.display());
    for fragment in &report.fragments {
        if fragment.found {
            info!("✓ {} ({:?})", fragment.path, fragment.role);
        } else {
            warn!("✗ {} ({:?}) not found", fragment.path, fragment.role);
        }
    }
    for path in &report.unreferenced {
        warn!("Not in manifest: {}", path);
    }

    let missing = report.missing().count();
    println!(
        "Fragments present: {}/{}",
        report.fragments.len() - missing,
        report.fragments.len()
    );

    if !report.stylesheet_found {
        return Err(ThesisBuildError::StylesheetMissing {
            path: report.stylesheet.display().to_string(),
        });
    }

    println!("Stylesheet: {}", report.stylesheet.display());
    Ok(())
}

async fn handle_init_command(cli: &Cli, args: &InitArgs) -> Result<()> {
    let path = cli.manifest_path();
    BuildManifest::write_template(&path, args.force).await?;
    println!("Manifest written to {}", path.display());
    Ok(())
}
