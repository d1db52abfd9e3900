//! In-memory signal store with optional journal.

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use parking_lot::RwLock;
use sigbot_core::{ExitFill, PositionDetails, Signal, SignalData, SignalId, SignalStatus};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::journal::{self, JournalWriter};
use crate::store::SignalStore;

struct Entry {
    /// Insertion order, breaks `created_at` ties.
    seq: u64,
    signal: Signal,
}

#[derive(Default)]
struct Inner {
    records: HashMap<SignalId, Entry>,
    next_seq: u64,
    journal: Option<JournalWriter>,
}

impl Inner {
    fn insert(&mut self, signal: Signal) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.records.insert(signal.id, Entry { seq, signal });
    }

    /// Apply `mutate` to a copy of `id`, journal it, then commit.
    ///
    /// A failed journal write leaves the in-memory record untouched.
    fn commit<F>(&mut self, id: SignalId, mutate: F) -> StoreResult<Signal>
    where
        F: FnOnce(&mut Signal) -> StoreResult<()>,
    {
        let entry = self.records.get(&id).ok_or(StoreError::NotFound(id))?;
        let mut updated = entry.signal.clone();
        mutate(&mut updated)?;

        if let Some(journal) = self.journal.as_mut() {
            journal.append(&updated)?;
        }
        if let Some(entry) = self.records.get_mut(&id) {
            entry.signal = updated.clone();
        }
        Ok(updated)
    }

    fn sorted<P>(&self, predicate: P) -> Vec<&Entry>
    where
        P: Fn(&Signal) -> bool,
    {
        let mut entries: Vec<&Entry> = self
            .records
            .values()
            .filter(|e| predicate(&e.signal))
            .collect();
        entries.sort_by(|a, b| {
            a.signal
                .created_at
                .cmp(&b.signal.created_at)
                .then(a.seq.cmp(&b.seq))
        });
        entries
    }
}

/// Lock-protected signal map. Writes hold the write lock for the whole
/// check-mutate-journal step.
#[derive(Default)]
pub struct MemorySignalStore {
    inner: RwLock<Inner>,
}

impl MemorySignalStore {
    /// Volatile store (nothing survives a restart).
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backed by a journal at `path`, replaying and compacting it first.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let snapshots = journal::replay(path)?;

        let mut inner = Inner::default();
        for snapshot in snapshots {
            match inner.records.get_mut(&snapshot.id) {
                Some(entry) => entry.signal = snapshot,
                None => inner.insert(snapshot),
            }
        }

        let mut current: Vec<&Entry> = inner.records.values().collect();
        current.sort_by_key(|e| e.seq);
        let current: Vec<Signal> = current.into_iter().map(|e| e.signal.clone()).collect();
        journal::compact(path, &current)?;

        inner.journal = Some(JournalWriter::open(path)?);
        info!(
            path = %path.display(),
            signals = inner.records.len(),
            "Signal store loaded from journal"
        );

        Ok(Self {
            inner: RwLock::new(inner),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SignalStore for MemorySignalStore {
    fn create(&self, data: SignalData) -> StoreResult<Signal> {
        let signal = Signal::new(data, Utc::now());
        let mut inner = self.inner.write();
        if let Some(journal) = inner.journal.as_mut() {
            journal.append(&signal)?;
        }
        inner.insert(signal.clone());
        debug!(signal_id = %signal.id, symbol = %signal.symbol, "Signal created");
        Ok(signal)
    }

    fn update_status(
        &self,
        id: SignalId,
        status: SignalStatus,
        details: Option<PositionDetails>,
    ) -> StoreResult<Signal> {
        self.inner.write().commit(id, |signal| {
            let from = signal.status;
            signal
                .transition(status, details, Utc::now())
                .map_err(|_| StoreError::InvalidTransition {
                    id,
                    from,
                    to: status,
                })
        })
    }

    fn record_close(&self, id: SignalId, exit: ExitFill) -> StoreResult<Signal> {
        self.inner.write().commit(id, |signal| {
            let from = signal.status;
            signal
                .apply_close(exit, Utc::now())
                .map_err(|_| StoreError::InvalidTransition {
                    id,
                    from,
                    to: SignalStatus::Closed,
                })
        })
    }

    fn by_status(&self, status: SignalStatus) -> StoreResult<Vec<Signal>> {
        let inner = self.inner.read();
        Ok(inner
            .sorted(|s| s.status == status)
            .into_iter()
            .map(|e| e.signal.clone())
            .collect())
    }

    fn by_asset(&self, symbol: &str, status: Option<SignalStatus>) -> StoreResult<Vec<Signal>> {
        let inner = self.inner.read();
        Ok(inner
            .sorted(|s| s.symbol == symbol && status.map_or(true, |st| s.status == st))
            .into_iter()
            .rev()
            .map(|e| e.signal.clone())
            .collect())
    }

    fn get(&self, id: SignalId) -> StoreResult<Signal> {
        self.inner
            .read()
            .records
            .get(&id)
            .map(|e| e.signal.clone())
            .ok_or(StoreError::NotFound(id))
    }
}
