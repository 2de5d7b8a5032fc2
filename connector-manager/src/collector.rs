//! Drains every configured target into a record sink.
//!
//! Targets are pulled one at a time in `general.targets` order. A target that
//! fails (config, credentials, transport or decode) is logged and skipped;
//! records it already produced stay written.

use crate::registry::{build_service, ServiceContext};
use anyhow::{Context, Result};
use futures::TryStreamExt;
use serde::Serialize;
use std::io::Write;
use tasksync::config::{CommonConfig, Config, TargetSection};
use tasksync::NormalizedRecord;
use tracing::{error, info};

/// One rendered issue as handed to the sink.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub target: String,
    pub description: String,
    pub record: NormalizedRecord,
}

/// Receives records as they are pulled.
pub trait RecordSink {
    fn write(&mut self, record: &TaskRecord) -> Result<()>;
}

/// Writes one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn write(&mut self, record: &TaskRecord) -> Result<()> {
        serde_json::to_writer(&mut self.out, record).context("Failed to serialize record")?;
        self.out.write_all(b"\n").context("Failed to write record")?;
        Ok(())
    }
}

/// Outcome of one pull over all targets.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Records written, across all targets
    pub records: usize,
    /// Targets whose pull failed, in pull order
    pub failed_targets: Vec<String>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failed_targets.is_empty()
    }
}

/// Pulls every target in `config` into `sink`.
pub async fn collect(config: &Config, ctx: &ServiceContext, sink: &mut dyn RecordSink) -> SyncReport {
    let mut report = SyncReport::default();
    for name in &config.general.targets {
        let result = match config.target(name) {
            Ok(section) => pull_target(&section, ctx, sink).await,
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(count) => {
                info!(target = %name, count, "Pulled target");
                report.records += count;
            }
            Err(e) => {
                error!(target = %name, error = %format!("{:#}", e), "Target failed");
                report.failed_targets.push(name.clone());
            }
        }
    }
    report
}

/// Pulls one target, returning the number of records written.
pub async fn pull_target(
    section: &TargetSection,
    ctx: &ServiceContext,
    sink: &mut dyn RecordSink,
) -> Result<usize> {
    let common: CommonConfig = section.parse()?;
    let service = build_service(section, ctx).await?;

    let mut issues = service.issues();
    let mut count = 0;
    while let Some(issue) = issues.try_next().await? {
        let mut record = issue.to_record();
        record.add_tags(common.add_tags.iter().cloned());
        sink.write(&TaskRecord {
            target: service.target().to_string(),
            description: issue.default_description(),
            record,
        })?;
        count += 1;
    }
    Ok(count)
}
