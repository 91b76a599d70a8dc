//! Text extraction from binary document formats.
//!
//! Conversion of slides, PDFs, spreadsheets and friends into plain text is
//! delegated to the external `markitdown` tool, run as a subprocess with a
//! hard timeout. Every failure mode here is non-fatal: a file that cannot
//! be extracted simply contributes zero fragments.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Upper bound on a single extraction run.
pub const EXTRACT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("file not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("markitdown not found; install it with: pip install markitdown")]
    ToolMissing,

    #[error("markitdown failed: {stderr}")]
    Failed { stderr: String },

    #[error("timed out extracting {} after {}s", .path.display(), EXTRACT_TIMEOUT.as_secs())]
    Timeout { path: PathBuf },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

/// Extract plain text from `path` via `markitdown`.
///
/// Handles pptx, pdf, docx, xlsx, html, markdown and whatever else the
/// tool supports; plain-text inputs pass through unchanged.
pub async fn extract_file(path: &Path) -> Result<String, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    tracing::debug!("extracting {}", path.display());

    let run = Command::new("markitdown").arg(path).output();
    let output = match timeout(EXTRACT_TIMEOUT, run).await {
        Err(_elapsed) => {
            return Err(ExtractError::Timeout {
                path: path.to_path_buf(),
            });
        }
        Ok(Err(err)) if err.kind() == io::ErrorKind::NotFound => {
            return Err(ExtractError::ToolMissing);
        }
        Ok(Err(err)) => return Err(err.into()),
        Ok(Ok(output)) => output,
    };

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(ExtractError::Failed {
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_reported_before_running_the_tool() {
        let err = extract_file(Path::new("/no/such/file.pdf")).await.unwrap_err();
        assert!(matches!(err, ExtractError::FileNotFound { .. }));
    }
}
