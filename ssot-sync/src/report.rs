//! Outcome of a sync run.

use crate::apply::TypeApply;
use crate::error::ApplyError;
use serde::Serialize;
use ssot_model::IdentityKey;
use std::fmt;
use std::ops::AddAssign;

/// The kind of write an apply step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Update => f.write_str("update"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// Per-type outcome counts.
///
/// In a dry run the counts are the ones the change set implies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    /// Operations never issued because the run was cancelled.
    pub skipped: usize,
}

impl TypeCounts {
    pub fn changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

impl AddAssign for TypeCounts {
    fn add_assign(&mut self, other: Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
    }
}

/// A record whose write failed. The run carried on without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyFailure {
    pub record_type: String,
    pub identity: IdentityKey,
    pub operation: Operation,
    pub error: ApplyError,
}

impl fmt::Display for ApplyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}({}): {}",
            self.operation, self.record_type, self.identity, self.error
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeReport {
    pub record_type: String,
    pub counts: TypeCounts,
}

/// Result of [`SyncJob::run`](crate::SyncJob::run).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    dry_run: bool,
    cancelled: bool,
    types: Vec<TypeReport>,
    failures: Vec<ApplyFailure>,
}

impl SyncReport {
    pub(crate) fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    pub(crate) fn record_planned(&mut self, record_type: &str, counts: TypeCounts) {
        self.types.push(TypeReport {
            record_type: record_type.to_string(),
            counts,
        });
    }

    pub(crate) fn record_applied(&mut self, record_type: &str, applied: TypeApply) {
        self.cancelled |= applied.cancelled;
        self.record_planned(record_type, applied.counts);
        self.failures.extend(applied.failures);
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// True when cancellation stopped the run before every operation was issued.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    /// Per-type counts in processing order.
    pub fn types(&self) -> &[TypeReport] {
        &self.types
    }

    pub fn counts(&self, record_type: &str) -> Option<&TypeCounts> {
        self.types
            .iter()
            .find(|t| t.record_type == record_type)
            .map(|t| &t.counts)
    }

    pub fn totals(&self) -> TypeCounts {
        let mut totals = TypeCounts::default();
        for t in &self.types {
            totals += t.counts;
        }
        totals
    }

    pub fn failures(&self) -> &[ApplyFailure] {
        &self.failures
    }

    pub fn failures_for<'a>(&'a self, record_type: &'a str) -> impl Iterator<Item = &'a ApplyFailure> {
        self.failures
            .iter()
            .filter(move |f| f.record_type == record_type)
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            writeln!(f, "dry run: no changes applied")?;
        }
        for t in &self.types {
            let c = &t.counts;
            writeln!(
                f,
                "{:<12} created={} updated={} deleted={} unchanged={} skipped={}",
                t.record_type, c.created, c.updated, c.deleted, c.unchanged, c.skipped
            )?;
        }
        for failure in &self.failures {
            writeln!(f, "FAILED {failure}")?;
        }
        if self.cancelled {
            writeln!(f, "run cancelled before completion")?;
        }
        Ok(())
    }
}
