//! A complete sync run: load, diff, apply, report.

use crate::adapter::Adapter;
use crate::apply::ApplyEngine;
use crate::cancel::CancelSignal;
use crate::config::SyncConfig;
use crate::diff::diff;
use crate::error::{Side, SyncError, SyncResult};
use crate::report::SyncReport;
use ssot_model::Registry;
use tracing::{info, warn};

/// One configured source/target pairing.
///
/// Record types are processed in the registry's declaration order, so a
/// registry that declares referenced types first gets its parents created
/// before their children.
pub struct SyncJob<S, T> {
    registry: Registry,
    source: S,
    target: T,
    config: SyncConfig,
    cancel: CancelSignal,
}

impl<S: Adapter, T: Adapter> SyncJob<S, T> {
    pub fn new(registry: Registry, source: S, target: T, config: SyncConfig) -> Self {
        Self {
            registry,
            source,
            target,
            config,
            cancel: CancelSignal::never(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Runs the configured dry-run setting.
    pub async fn execute(&self) -> SyncResult<SyncReport> {
        self.run(self.config.dry_run).await
    }

    /// Loads both snapshots, then reconciles each selected record type.
    ///
    /// Fails only when configuration is invalid or a snapshot cannot be
    /// loaded; in both cases nothing has been written to the target.
    pub async fn run(&self, dry_run: bool) -> SyncResult<SyncReport> {
        self.config.validate()?;
        let types = self.registry.select(self.config.include.as_deref())?;
        let sides: [(Side, &dyn Adapter); 2] =
            [(Side::Source, &self.source), (Side::Target, &self.target)];
        for (side, adapter) in sides {
            if let Some(missing) = types
                .iter()
                .find(|rt| adapter.registry().get(rt.name()).is_none())
            {
                return Err(SyncError::Config(format!(
                    "{side} adapter `{}` does not handle `{}`",
                    adapter.name(),
                    missing.name()
                )));
            }
        }

        info!(
            source = self.source.name(),
            target = self.target.name(),
            dry_run,
            types = ?types.names(),
            "starting sync"
        );

        let (source, target) = tokio::join!(self.source.load(), self.target.load());
        let source = source.map_err(|e| SyncError::LoadFailed {
            side: Side::Source,
            adapter: self.source.name().to_string(),
            source: e,
        })?;
        let target = target.map_err(|e| SyncError::LoadFailed {
            side: Side::Target,
            adapter: self.target.name().to_string(),
            source: e,
        })?;

        let engine = ApplyEngine::new(self.config.workers, self.config.retry.clone())
            .with_cancel(self.cancel.clone());
        let mut report = SyncReport::new(dry_run);

        for record_type in types.iter() {
            let changes = diff(&source, &target, record_type);
            info!(
                record_type = record_type.name(),
                create = changes.create.len(),
                update = changes.update.len(),
                delete = changes.delete.len(),
                unchanged = changes.unchanged.len(),
                "computed changes"
            );

            if dry_run {
                report.record_planned(record_type.name(), changes.planned_counts());
            } else {
                let applied = engine.apply(&changes, &self.target).await;
                report.record_applied(record_type.name(), applied);
            }
        }

        let totals = report.totals();
        if report.has_failures() {
            warn!(failures = report.failures().len(), "sync finished with failures");
        }
        info!(
            created = totals.created,
            updated = totals.updated,
            deleted = totals.deleted,
            unchanged = totals.unchanged,
            skipped = totals.skipped,
            cancelled = report.cancelled(),
            "sync finished"
        );
        Ok(report)
    }
}
