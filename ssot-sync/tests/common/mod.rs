#![allow(dead_code)]

use async_trait::async_trait;
use ssot_model::schemas;
use ssot_model::{
    Attributes, FieldValue, Handle, IdentityKey, Record, RecordType, Registry, Snapshot,
};
use ssot_sync::{
    Adapter, ApplyError, ApplyResult, Creatable, Deletable, LoadError, Operation, PermanentKind,
    Updatable,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn registry() -> Registry {
    schemas::vlan_registry().unwrap()
}

pub fn vlan_type() -> RecordType {
    schemas::vlan().unwrap()
}

pub fn group_type() -> RecordType {
    schemas::vlan_group().unwrap()
}

pub fn group(name: &str, description: &str) -> Record {
    Record::new(
        &group_type(),
        vec![("name", FieldValue::from(name))],
        vec![("description", FieldValue::from(description))],
    )
    .unwrap()
}

pub fn vlan(vid: i64, group: Option<&str>, name: &str, description: &str) -> Record {
    vlan_with_status(vid, group, name, description, None)
}

pub fn vlan_with_status(
    vid: i64,
    group: Option<&str>,
    name: &str,
    description: &str,
    status: Option<&str>,
) -> Record {
    Record::new(
        &vlan_type(),
        vec![("vid", FieldValue::from(vid)), ("group__name", group.into())],
        vec![
            ("name", FieldValue::from(name)),
            ("description", description.into()),
            ("status__name", status.into()),
        ],
    )
    .unwrap()
}

pub fn vlan_key(vid: i64, group: Option<&str>) -> IdentityKey {
    IdentityKey::from_pairs([
        ("vid", FieldValue::from(vid)),
        ("group__name", FieldValue::from(group)),
    ])
}

pub fn snapshot(name: &str, records: impl IntoIterator<Item = (Record, Option<Handle>)>) -> Snapshot {
    let mut snapshot = Snapshot::new(name);
    for (record, handle) in records {
        snapshot.add(record, handle).unwrap();
    }
    snapshot
}

// ── In-memory adapter ───────────────────────────────────────────

struct Fault {
    error: ApplyError,
    remaining: usize,
}

/// Shared state behind a [`MemoryAdapter`], inspectable from tests.
#[derive(Default)]
pub struct MemoryState {
    rows: Mutex<BTreeMap<String, BTreeMap<i64, Record>>>,
    next_id: AtomicI64,
    log: Mutex<Vec<(Operation, String, IdentityKey)>>,
    faults: Mutex<HashMap<IdentityKey, Fault>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    op_delay: Mutex<Option<Duration>>,
}

impl MemoryState {
    fn insert(&self, record: Record) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.rows
            .lock()
            .unwrap()
            .entry(record.record_type().to_string())
            .or_default()
            .insert(id, record);
        id
    }

    fn take_fault(&self, identity: &IdentityKey) -> Option<ApplyError> {
        let mut faults = self.faults.lock().unwrap();
        let fault = faults.get_mut(identity)?;
        if fault.remaining == 0 {
            return None;
        }
        fault.remaining -= 1;
        Some(fault.error.clone())
    }

    async fn enter(&self, operation: Operation, record_type: &str, identity: &IdentityKey) {
        self.log
            .lock()
            .unwrap()
            .push((operation, record_type.to_string(), identity.clone()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.op_delay.lock().unwrap();
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn identity_of(&self, record_type: &str, handle: &Handle) -> Option<IdentityKey> {
        let id: i64 = handle.as_str().parse().ok()?;
        self.rows
            .lock()
            .unwrap()
            .get(record_type)?
            .get(&id)
            .map(|r| r.identity().clone())
    }
}

struct MemoryTable {
    record_type: Arc<RecordType>,
    state: Arc<MemoryState>,
}

pub struct MemoryAdapter {
    name: String,
    registry: Registry,
    state: Arc<MemoryState>,
    tables: HashMap<String, MemoryTable>,
    writable: bool,
    fail_load: bool,
}

impl MemoryAdapter {
    pub fn new(name: &str) -> Self {
        let registry = registry();
        let state = Arc::new(MemoryState::default());
        let tables = registry
            .iter()
            .map(|rt| {
                (
                    rt.name().to_string(),
                    MemoryTable {
                        record_type: Arc::clone(rt),
                        state: Arc::clone(&state),
                    },
                )
            })
            .collect();
        Self {
            name: name.to_string(),
            registry,
            state,
            tables,
            writable: true,
            fail_load: false,
        }
    }

    pub fn with(self, records: impl IntoIterator<Item = Record>) -> Self {
        for record in records {
            self.state.insert(record);
        }
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn with_op_delay(self, delay: Duration) -> Self {
        *self.state.op_delay.lock().unwrap() = Some(delay);
        self
    }

    /// Fails the next `times` writes to `identity` with `error`.
    pub fn fail(&self, identity: IdentityKey, error: ApplyError, times: usize) {
        self.state.faults.lock().unwrap().insert(
            identity,
            Fault {
                error,
                remaining: times,
            },
        );
    }

    pub fn records(&self, record_type: &str) -> Vec<Record> {
        let mut records: Vec<Record> = self
            .state
            .rows
            .lock()
            .unwrap()
            .get(record_type)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| a.identity().cmp(b.identity()));
        records
    }

    pub fn find(&self, record_type: &str, identity: &IdentityKey) -> Option<Record> {
        self.records(record_type)
            .into_iter()
            .find(|r| r.identity() == identity)
    }

    pub fn log(&self) -> Vec<(Operation, String, IdentityKey)> {
        self.state.log.lock().unwrap().clone()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.log().into_iter().map(|(op, _, _)| op).collect()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.state.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn registry(&self) -> &Registry {
        &self.registry
    }

    async fn load(&self) -> Result<Snapshot, LoadError> {
        if self.fail_load {
            return Err(LoadError::Task(format!("{} is unreachable", self.name)));
        }
        let rows = self.state.rows.lock().unwrap().clone();
        let mut snapshot = Snapshot::new(&self.name);
        for (_, table) in rows {
            for (id, record) in table {
                snapshot.add(record, Some(Handle::from(id)))?;
            }
        }
        Ok(snapshot)
    }

    fn creatable(&self, record_type: &str) -> Option<&dyn Creatable> {
        self.tables
            .get(record_type)
            .filter(|_| self.writable)
            .map(|t| t as &dyn Creatable)
    }

    fn updatable(&self, record_type: &str) -> Option<&dyn Updatable> {
        self.tables
            .get(record_type)
            .filter(|_| self.writable)
            .map(|t| t as &dyn Updatable)
    }

    fn deletable(&self, record_type: &str) -> Option<&dyn Deletable> {
        self.tables
            .get(record_type)
            .filter(|_| self.writable)
            .map(|t| t as &dyn Deletable)
    }
}

fn not_found(handle: &Handle) -> ApplyError {
    ApplyError::permanent(PermanentKind::NotFound, format!("no row {handle}"))
}

#[async_trait]
impl Creatable for MemoryTable {
    async fn create(&self, identity: &IdentityKey, attributes: &Attributes) -> ApplyResult<Handle> {
        let name = self.record_type.name();
        self.state.enter(Operation::Create, name, identity).await;
        if let Some(err) = self.state.take_fault(identity) {
            return Err(err);
        }
        let record = Record::new(
            &self.record_type,
            identity
                .fields()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<Vec<_>>(),
            attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Vec<_>>(),
        )
        .map_err(|e| ApplyError::permanent(PermanentKind::Validation, e.to_string()))?;
        Ok(Handle::from(self.state.insert(record)))
    }
}

#[async_trait]
impl Updatable for MemoryTable {
    async fn update(&self, handle: &Handle, changed: &Attributes) -> ApplyResult<()> {
        let name = self.record_type.name();
        let identity = self
            .state
            .identity_of(name, handle)
            .ok_or_else(|| not_found(handle))?;
        self.state.enter(Operation::Update, name, &identity).await;
        if let Some(err) = self.state.take_fault(&identity) {
            return Err(err);
        }
        let id: i64 = handle.as_str().parse().map_err(|_| not_found(handle))?;
        let mut rows = self.state.rows.lock().unwrap();
        let record = rows
            .get_mut(name)
            .and_then(|t| t.get_mut(&id))
            .ok_or_else(|| not_found(handle))?;
        for (field, value) in changed {
            record
                .set_attribute(&self.record_type, field, value.clone())
                .map_err(|e| ApplyError::permanent(PermanentKind::Validation, e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Deletable for MemoryTable {
    async fn delete(&self, handle: &Handle) -> ApplyResult<()> {
        let name = self.record_type.name();
        let identity = self
            .state
            .identity_of(name, handle)
            .ok_or_else(|| not_found(handle))?;
        self.state.enter(Operation::Delete, name, &identity).await;
        if let Some(err) = self.state.take_fault(&identity) {
            return Err(err);
        }
        let id: i64 = handle.as_str().parse().map_err(|_| not_found(handle))?;
        self.state
            .rows
            .lock()
            .unwrap()
            .get_mut(name)
            .and_then(|t| t.remove(&id))
            .map(|_| ())
            .ok_or_else(|| not_found(handle))
    }
}
