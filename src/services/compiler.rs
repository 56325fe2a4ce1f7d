use crate::error::{Result, ThesisBuildError};
use crate::services::tool::run_tool;
use crate::types::{AggregatedSources, CompilationOutcome, NumberingPolicy};
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

pub const TEMP_MAIN_MARKDOWN: &str = "temp_main.md";
pub const TEMP_COVER_MARKDOWN: &str = "temp_cover.md";
pub const COVER_HTML: &str = "cover.html";

/// One invocation of the markdown-to-hypertext compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub stylesheet: String,
    pub numbering: NumberingPolicy,
}

impl CompileJob {
    /// Standalone page without section numbers or table of contents.
    pub fn cover(input: PathBuf, output: PathBuf, stylesheet: &str) -> Self {
        Self {
            input,
            output,
            stylesheet: stylesheet.to_string(),
            numbering: NumberingPolicy::Unnumbered,
        }
    }

    /// Numbered main document with a two-level table of contents.
    pub fn main(input: PathBuf, output: PathBuf, stylesheet: &str) -> Self {
        Self {
            input,
            output,
            stylesheet: stylesheet.to_string(),
            numbering: NumberingPolicy::Numbered,
        }
    }

    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--from=markdown".into(),
            "--to=html5".into(),
            "--standalone".into(),
        ];
        if self.numbering == NumberingPolicy::Numbered {
            args.push("--number-sections".into());
            args.push("--toc".into());
            args.push("--toc-depth=2".into());
        }
        args.push("--css".into());
        args.push(self.stylesheet.clone().into());
        args.push("-o".into());
        args.push(self.output.clone().into_os_string());
        args.push(self.input.clone().into_os_string());
        args
    }
}

/// External compiler seam.
pub trait CompilerBackend {
    fn name(&self) -> &str;

    fn compile(&self, job: &CompileJob) -> impl Future<Output = Result<()>> + Send;
}

pub struct PandocCompiler {
    program: String,
}

impl PandocCompiler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for PandocCompiler {
    fn default() -> Self {
        Self::new("pandoc")
    }
}

impl CompilerBackend for PandocCompiler {
    fn name(&self) -> &str {
        &self.program
    }

    async fn compile(&self, job: &CompileJob) -> Result<()> {
        run_tool(&self.program, &job.args()).await
    }
}

/// Runs the cover and main compilation jobs.
pub struct CompilationAdapter<'a, C> {
    backend: &'a C,
    work_dir: PathBuf,
    stylesheet: String,
}

impl<'a, C: CompilerBackend> CompilationAdapter<'a, C> {
    pub fn new(backend: &'a C, work_dir: &Path, stylesheet: &str) -> Self {
        Self {
            backend,
            work_dir: work_dir.to_path_buf(),
            stylesheet: stylesheet.to_string(),
        }
    }

    /// Compiles the main stream into `main_html`. A failing cover job only
    /// downgrades the outcome; a failing main job aborts and removes every
    /// intermediate it left behind.
    pub async fn compile(
        &self,
        sources: &AggregatedSources,
        main_html: &Path,
    ) -> Result<CompilationOutcome> {
        let cover_html = match &sources.cover_stream {
            Some(cover) => self.compile_cover(cover).await,
            None => {
                debug!("No cover stream; compiling main document only");
                None
            }
        };

        let temp_main = self.work_dir.join(TEMP_MAIN_MARKDOWN);
        fs::write(&temp_main, &sources.main_stream).await?;

        info!("Compiling main document with {}", self.backend.name());
        let job = CompileJob::main(temp_main.clone(), main_html.to_path_buf(), &self.stylesheet);
        let result = match self.backend.compile(&job).await {
            Ok(()) => self.verify_output(main_html).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            Self::remove_quietly(&temp_main).await;
            if let Some(cover_html) = &cover_html {
                Self::remove_quietly(cover_html).await;
            }
            return Err(e);
        }

        let main_html = main_html.to_path_buf();
        Ok(match cover_html {
            Some(cover_html) => CompilationOutcome::WithCover {
                cover_html,
                main_html,
            },
            None => CompilationOutcome::WithoutCover { main_html },
        })
    }

    async fn verify_output(&self, main_html: &Path) -> Result<()> {
        if fs::try_exists(main_html).await? {
            return Ok(());
        }
        Err(ThesisBuildError::Compilation {
            reason: format!(
                "{} reported success but did not write {}",
                self.backend.name(),
                main_html.display()
            ),
        })
    }

    async fn compile_cover(&self, cover: &str) -> Option<PathBuf> {
        let temp_cover = self.work_dir.join(TEMP_COVER_MARKDOWN);
        let cover_html = self.work_dir.join(COVER_HTML);

        if let Err(e) = fs::write(&temp_cover, cover).await {
            warn!("Could not stage cover page, continuing without it: {}", e);
            return None;
        }

        info!("Compiling cover page with {}", self.backend.name());
        let job = CompileJob::cover(temp_cover.clone(), cover_html.clone(), &self.stylesheet);
        let result = self.backend.compile(&job).await;
        Self::remove_quietly(&temp_cover).await;

        match result {
            Ok(()) => Some(cover_html),
            Err(e) => {
                warn!("Cover compilation failed, continuing without cover: {}", e);
                Self::remove_quietly(&cover_html).await;
                None
            }
        }
    }

    /// Removes the staged markdown and the standalone cover hypertext.
    pub async fn cleanup(&self, outcome: &CompilationOutcome) {
        Self::remove_quietly(&self.work_dir.join(TEMP_MAIN_MARKDOWN)).await;
        if let Some(cover_html) = outcome.cover_html() {
            Self::remove_quietly(cover_html).await;
        }
    }

    async fn remove_quietly(path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => debug!("Removed temporary file {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingCompiler {
        fail_cover: bool,
        fail_main: bool,
        jobs: Mutex<Vec<CompileJob>>,
    }

    impl RecordingCompiler {
        fn new(fail_cover: bool, fail_main: bool) -> Self {
            Self {
                fail_cover,
                fail_main,
                jobs: Mutex::new(Vec::new()),
            }
        }
    }

    impl CompilerBackend for RecordingCompiler {
        fn name(&self) -> &str {
            "recording"
        }

        async fn compile(&self, job: &CompileJob) -> Result<()> {
            self.jobs.lock().unwrap().push(job.clone());
            let fail = match job.numbering {
                NumberingPolicy::Unnumbered => self.fail_cover,
                NumberingPolicy::Numbered => self.fail_main,
            };
            if fail {
                return Err(ThesisBuildError::ToolMissing {
                    tool: "recording".to_string(),
                });
            }
            fs::write(&job.output, "<html><body></body></html>").await?;
            Ok(())
        }
    }

    fn sources(cover: Option<&str>) -> AggregatedSources {
        AggregatedSources {
            cover_stream: cover.map(str::to_string),
            main_stream: "# Uno\n".to_string(),
            fragments: Vec::new(),
            normalization: Vec::new(),
        }
    }

    #[test]
    fn test_job_arguments() {
        let main = CompileJob::main("in.md".into(), "out.html".into(), "estilo.css");
        let args: Vec<String> = main.args().iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "--from=markdown", "--to=html5", "--standalone", "--number-sections", "--toc",
                "--toc-depth=2", "--css", "estilo.css", "-o", "out.html", "in.md"
            ]
        );

        let cover = CompileJob::cover("c.md".into(), "c.html".into(), "estilo.css");
        let args: Vec<String> = cover.args().iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert!(!args.iter().any(|a| a == "--toc" || a == "--number-sections"));
    }

    #[tokio::test]
    async fn test_cover_failure_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RecordingCompiler::new(true, false);
        let adapter = CompilationAdapter::new(&backend, dir.path(), "estilo.css");
        let main_html = dir.path().join("out.html");

        let outcome = adapter.compile(&sources(Some("# Portada")), &main_html).await.unwrap();
        assert_eq!(outcome, CompilationOutcome::WithoutCover { main_html: main_html.clone() });
        assert_eq!(backend.jobs.lock().unwrap().len(), 2);
        assert!(!dir.path().join(TEMP_COVER_MARKDOWN).exists());
    }

    #[tokio::test]
    async fn test_main_failure_is_fatal_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RecordingCompiler::new(false, true);
        let adapter = CompilationAdapter::new(&backend, dir.path(), "estilo.css");

        let result = adapter.compile(&sources(Some("# Portada")), &dir.path().join("out.html")).await;
        assert!(matches!(result, Err(ThesisBuildError::ToolMissing { .. })));
        assert_eq!(backend.jobs.lock().unwrap().len(), 2);
        assert!(!dir.path().join(TEMP_MAIN_MARKDOWN).exists());
        assert!(!dir.path().join(TEMP_COVER_MARKDOWN).exists());
        assert!(!dir.path().join(COVER_HTML).exists());
    }

    struct SilentCompiler;

    impl CompilerBackend for SilentCompiler {
        fn name(&self) -> &str {
            "silent"
        }

        async fn compile(&self, _job: &CompileJob) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_missing_main_output_is_a_compilation_error() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = CompilationAdapter::new(&SilentCompiler, dir.path(), "estilo.css");

        let err = adapter
            .compile(&sources(None), &dir.path().join("out.html"))
            .await
            .unwrap_err();
        match err {
            ThesisBuildError::Compilation { reason } => {
                assert!(reason.contains("silent reported success"));
                assert!(reason.contains("out.html"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join(TEMP_MAIN_MARKDOWN).exists());
    }

    #[tokio::test]
    async fn test_cleanup_removes_temporaries() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RecordingCompiler::new(false, false);
        let adapter = CompilationAdapter::new(&backend, dir.path(), "estilo.css");
        let main_html = dir.path().join("out.html");

        let outcome = adapter.compile(&sources(Some("# Portada")), &main_html).await.unwrap();
        assert_eq!(outcome.label(), "with-cover");
        assert!(dir.path().join(TEMP_MAIN_MARKDOWN).exists());

        adapter.cleanup(&outcome).await;
        assert!(!dir.path().join(TEMP_MAIN_MARKDOWN).exists());
        assert!(!dir.path().join(COVER_HTML).exists());
        assert!(main_html.exists());
    }
}
