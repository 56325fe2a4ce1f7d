use crate::error::{Result, ThesisBuildError};
use std::ffi::OsString;
use std::io::ErrorKind;
use tokio::process::Command;
use tracing::debug;

/// Runs an external program to completion, once.
///
/// A program that cannot be spawned because it does not exist becomes
/// `ToolMissing`; a non-zero exit becomes `ToolFailed` carrying the
/// program's stderr unmodified.
pub async fn run_tool(program: &str, args: &[OsString]) -> Result<()> {
    debug!("Running {} {:?}", program, args);

    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => ThesisBuildError::ToolMissing {
                tool: program.to_string(),
            },
            _ => ThesisBuildError::Io(e),
        })?;

    if !output.status.success() {
        return Err(ThesisBuildError::ToolFailed {
            tool: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(())
}
