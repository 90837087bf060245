//! Pushes a [`ChangeSet`] into a target adapter.
//!
//! Buckets run strictly in order: every create completes before the first
//! update is issued, and every update before the first delete. Within a
//! bucket up to `workers` operations are in flight at once. A failing
//! operation is recorded and never stops its siblings.

use crate::adapter::Adapter;
use crate::cancel::CancelSignal;
use crate::config::RetryConfig;
use crate::diff::{ChangeSet, UpdateOp};
use crate::error::{ApplyError, ApplyResult, PermanentKind};
use crate::report::{ApplyFailure, Operation, TypeCounts};
use futures::stream::{self, StreamExt};
use ssot_model::{Handle, IdentityKey};
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, warn};

/// Outcome of applying one change set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeApply {
    pub counts: TypeCounts,
    pub failures: Vec<ApplyFailure>,
    pub cancelled: bool,
}

impl TypeApply {
    fn fail(
        &mut self,
        record_type: &str,
        identity: &IdentityKey,
        operation: Operation,
        error: ApplyError,
    ) {
        warn!(
            record_type,
            identity = %identity,
            %operation,
            error = %error,
            "apply failed"
        );
        self.failures.push(ApplyFailure {
            record_type: record_type.to_string(),
            identity: identity.clone(),
            operation,
            error,
        });
    }
}

/// Bounded-concurrency applier with retry and cancellation.
#[derive(Debug, Clone)]
pub struct ApplyEngine {
    workers: usize,
    retry: RetryConfig,
    cancel: CancelSignal,
}

impl ApplyEngine {
    pub fn new(workers: usize, retry: RetryConfig) -> Self {
        Self {
            workers: workers.max(1),
            retry,
            cancel: CancelSignal::never(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn apply(&self, changes: &ChangeSet, target: &dyn Adapter) -> TypeApply {
        let record_type = changes.record_type.as_str();
        let mut out = TypeApply {
            counts: TypeCounts {
                unchanged: changes.unchanged.len(),
                ..Default::default()
            },
            ..Default::default()
        };

        if self.stop_if_cancelled(&mut out, changes.pending()) {
            return out;
        }
        let created = self.apply_creates(changes, target, &mut out).await;

        if self.stop_if_cancelled(&mut out, changes.update.len() + changes.delete.len()) {
            return out;
        }
        self.apply_updates(changes, target, &created, &mut out).await;

        if self.stop_if_cancelled(&mut out, changes.delete.len()) {
            return out;
        }
        self.apply_deletes(changes, target, &mut out).await;

        debug!(
            record_type,
            created = out.counts.created,
            updated = out.counts.updated,
            deleted = out.counts.deleted,
            failed = out.failures.len(),
            "change set applied"
        );
        out
    }

    fn stop_if_cancelled(&self, out: &mut TypeApply, remaining: usize) -> bool {
        if !self.cancel.is_cancelled() {
            return false;
        }
        if remaining > 0 {
            warn!(skipped = remaining, "sync cancelled, skipping remaining operations");
        }
        out.counts.skipped += remaining;
        out.cancelled = true;
        true
    }

    /// Returns the handles of records created in this run.
    async fn apply_creates(
        &self,
        changes: &ChangeSet,
        target: &dyn Adapter,
        out: &mut TypeApply,
    ) -> HashMap<IdentityKey, Handle> {
        let record_type = changes.record_type.as_str();
        let mut created = HashMap::new();
        if changes.create.is_empty() {
            return created;
        }
        let Some(creatable) = target.creatable(record_type) else {
            for op in &changes.create {
                out.fail(
                    record_type,
                    &op.identity,
                    Operation::Create,
                    unsupported(target, record_type, Operation::Create),
                );
            }
            return created;
        };

        let retry = &self.retry;
        let results: Vec<_> = stream::iter(&changes.create)
            .map(|op| async move {
                let result =
                    with_retry(retry, || creatable.create(&op.identity, &op.attributes)).await;
                (op, result)
            })
            .buffered(self.workers)
            .collect()
            .await;

        for (op, result) in results {
            match result {
                Ok(handle) => {
                    debug!(record_type, identity = %op.identity, %handle, "created");
                    out.counts.created += 1;
                    created.insert(op.identity.clone(), handle);
                }
                Err(err) => out.fail(record_type, &op.identity, Operation::Create, err),
            }
        }
        created
    }

    async fn apply_updates(
        &self,
        changes: &ChangeSet,
        target: &dyn Adapter,
        created: &HashMap<IdentityKey, Handle>,
        out: &mut TypeApply,
    ) {
        let record_type = changes.record_type.as_str();
        if changes.update.is_empty() {
            return;
        }
        let Some(updatable) = target.updatable(record_type) else {
            for op in &changes.update {
                out.fail(
                    record_type,
                    &op.identity,
                    Operation::Update,
                    unsupported(target, record_type, Operation::Update),
                );
            }
            return;
        };

        let mut ready: Vec<(&UpdateOp, Handle)> = Vec::with_capacity(changes.update.len());
        for op in &changes.update {
            let handle = op
                .handle
                .clone()
                .or_else(|| created.get(&op.identity).cloned());
            match handle {
                Some(handle) => ready.push((op, handle)),
                None => out.fail(
                    record_type,
                    &op.identity,
                    Operation::Update,
                    missing_handle(&op.identity),
                ),
            }
        }

        let retry = &self.retry;
        let results: Vec<_> = stream::iter(ready)
            .map(|(op, handle)| async move {
                let changed = op.changed_attributes();
                let result = with_retry(retry, || updatable.update(&handle, &changed)).await;
                (op, result)
            })
            .buffered(self.workers)
            .collect()
            .await;

        for (op, result) in results {
            match result {
                Ok(()) => {
                    debug!(
                        record_type,
                        identity = %op.identity,
                        fields = ?op.changes.keys().collect::<Vec<_>>(),
                        "updated"
                    );
                    out.counts.updated += 1;
                }
                Err(err) => out.fail(record_type, &op.identity, Operation::Update, err),
            }
        }
    }

    async fn apply_deletes(&self, changes: &ChangeSet, target: &dyn Adapter, out: &mut TypeApply) {
        let record_type = changes.record_type.as_str();
        if changes.delete.is_empty() {
            return;
        }
        let Some(deletable) = target.deletable(record_type) else {
            for op in &changes.delete {
                out.fail(
                    record_type,
                    &op.identity,
                    Operation::Delete,
                    unsupported(target, record_type, Operation::Delete),
                );
            }
            return;
        };

        let mut ready = Vec::with_capacity(changes.delete.len());
        for op in &changes.delete {
            match &op.handle {
                Some(handle) => ready.push((op, handle)),
                None => out.fail(
                    record_type,
                    &op.identity,
                    Operation::Delete,
                    missing_handle(&op.identity),
                ),
            }
        }

        let retry = &self.retry;
        let results: Vec<_> = stream::iter(ready)
            .map(|(op, handle)| async move {
                let result = with_retry(retry, || deletable.delete(handle)).await;
                (op, result)
            })
            .buffered(self.workers)
            .collect()
            .await;

        for (op, result) in results {
            match result {
                Ok(()) => {
                    debug!(record_type, identity = %op.identity, "deleted");
                    out.counts.deleted += 1;
                }
                Err(err) => out.fail(record_type, &op.identity, Operation::Delete, err),
            }
        }
    }
}

fn unsupported(target: &dyn Adapter, record_type: &str, operation: Operation) -> ApplyError {
    ApplyError::permanent(
        PermanentKind::Unsupported,
        format!("`{}` cannot {operation} `{record_type}` records", target.name()),
    )
}

fn missing_handle(identity: &IdentityKey) -> ApplyError {
    ApplyError::permanent(
        PermanentKind::MissingHandle,
        format!("no target handle for ({identity})"),
    )
}

/// Runs `op`, retrying transient failures with exponential backoff.
pub(crate) async fn with_retry<T, F, Fut>(policy: &RetryConfig, mut op: F) -> ApplyResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApplyResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(ApplyError::Transient { message }) if attempt < max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                debug!(attempt, ?delay, %message, "transient failure, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(ApplyError::Transient { message }) => {
                return Err(ApplyError::RetryExhausted {
                    attempts: attempt,
                    last: message,
                });
            }
            Err(err) => return Err(err),
        }
    }
}
