// src/publish/mod.rs
// Publication stage: render the report once, then deliver to every
// configured sink independently. Sink errors are recorded per sink and
// never retried within the run.

pub mod file;
pub mod notion;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StageError;
use crate::limiter::run_bounded;
use crate::model::{FailureRecord, PublishOutcome, Stage};
use crate::report::DailyReport;

/// A publication destination for the rendered report.
#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &'static str;
    async fn publish(&self, report: &DailyReport, markdown: &str) -> Result<(), StageError>;
}

#[derive(Debug, Default)]
pub struct PublishOutput {
    pub results: BTreeMap<String, PublishOutcome>,
    pub failures: Vec<FailureRecord>,
}

/// Deliver `report` to all sinks. Rendering happens exactly once here.
pub async fn run(
    report: &DailyReport,
    sinks: &[Arc<dyn Sink>],
    stage_timeout: Duration,
) -> PublishOutput {
    let markdown = Arc::new(report.to_markdown());
    let report = Arc::new(report.clone());

    tracing::info!(target: "publish", sinks = sinks.len(), "publication stage starting");

    let ops: Vec<(String, _)> = sinks
        .iter()
        .map(|sink| {
            let name = sink.name().to_string();
            let sink = sink.clone();
            let markdown = markdown.clone();
            let report = report.clone();
            let fut = async move { sink.publish(&report, &markdown).await };
            (name, fut)
        })
        .collect();

    let settled = run_bounded(sinks.len().max(1), stage_timeout, ops).await;

    let mut out = PublishOutput::default();
    for (name, res) in settled {
        match res {
            Ok(()) => {
                tracing::info!(target: "publish", sink = %name, "published");
                out.results.insert(name, PublishOutcome::Success);
            }
            Err(e) => {
                tracing::warn!(target: "publish", sink = %name, error = %e, "sink failed");
                out.failures.push(FailureRecord {
                    stage: Stage::Publication,
                    subject: name.clone(),
                    error_kind: e.kind().to_string(),
                    attempt_count: 1,
                    message: e.to_string(),
                });
                out.results.insert(name, PublishOutcome::Failure);
            }
        }
    }
    out
}
