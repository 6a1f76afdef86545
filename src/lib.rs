// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod collect;
pub mod config;
pub mod enrich;
pub mod error;
pub mod limiter;
pub mod model;
pub mod orchestrator;
pub mod publish;
pub mod report;
pub mod retry;
pub mod text;

// ---- Re-exports for stable public API ----
pub use crate::config::{FetchMethod, Settings, SourceConfig, SourceType};
pub use crate::error::StageError;
pub use crate::model::{
    Article, EnrichmentStatus, FailureRecord, Importance, PublishOutcome, RunResult, RunStatus,
    Stage,
};
pub use crate::orchestrator::Orchestrator;
pub use crate::report::DailyReport;
pub use crate::retry::RetryPolicy;
