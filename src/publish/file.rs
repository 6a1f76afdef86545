// src/publish/file.rs
// Local file sink: one Markdown artifact per run under the output dir.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::StageError;
use crate::report::DailyReport;

use super::Sink;

pub struct FileSink {
    output_dir: PathBuf,
}

impl FileSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn artifact_path(&self, report: &DailyReport) -> PathBuf {
        self.output_dir.join(report.artifact_name())
    }
}

#[async_trait]
impl Sink for FileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn publish(&self, report: &DailyReport, markdown: &str) -> Result<(), StageError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| StageError::Sink(format!("creating {}: {e}", self.output_dir.display())))?;
        let path = self.artifact_path(report);
        tokio::fs::write(&path, markdown)
            .await
            .map_err(|e| StageError::Sink(format!("writing {}: {e}", path.display())))?;
        tracing::info!(target: "publish", path = %path.display(), "report written");
        Ok(())
    }
}

/// Convenience check used by tests and the CLI summary.
pub fn artifact_exists(dir: &Path, report: &DailyReport) -> bool {
    dir.join(report.artifact_name()).exists()
}
