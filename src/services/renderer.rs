use crate::error::Result;
use crate::services::tool::run_tool;
use std::ffi::OsString;
use std::future::Future;
use std::path::PathBuf;

/// One invocation of the hypertext-to-PDF renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub html: PathBuf,
    pub pdf: PathBuf,
    /// Directory relative asset and stylesheet paths resolve against.
    pub base_url: PathBuf,
}

impl RenderJob {
    pub fn args(&self) -> Vec<OsString> {
        vec![
            "--base-url".into(),
            self.base_url.clone().into_os_string(),
            self.html.clone().into_os_string(),
            self.pdf.clone().into_os_string(),
        ]
    }
}

/// External renderer seam.
pub trait RenderBackend {
    fn name(&self) -> &str;

    fn render(&self, job: &RenderJob) -> impl Future<Output = Result<()>> + Send;
}

pub struct WeasyPrintRenderer {
    program: String,
}

impl WeasyPrintRenderer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for WeasyPrintRenderer {
    fn default() -> Self {
        Self::new("weasyprint")
    }
}

impl RenderBackend for WeasyPrintRenderer {
    fn name(&self) -> &str {
        &self.program
    }

    async fn render(&self, job: &RenderJob) -> Result<()> {
        run_tool(&self.program, &job.args()).await
    }
}
