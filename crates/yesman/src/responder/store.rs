// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted learner state: one append-only JSONL file per project id under
//! the configured store directory. Reads are lock-free (copy-on-write via
//! `arc-swap`); writes are serialized through a single background flush
//! task and debounced (every 2s after the last write), with an unconditional
//! flush on clean shutdown.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{ContextKey, InteractionRecord, Outcome, Strategy};

/// Current on-disk schema version. Bumped if the envelope shape changes.
const SCHEMA_VERSION: u32 = 1;

/// fingerprint -> bounded, oldest-first list of records for one project.
type FingerprintMap = HashMap<String, Vec<InteractionRecord>>;

/// Wire envelope for one JSONL line. Self-describing: a `schema_version`
/// field plus the record fields, so future format changes can special-case
/// old lines during load instead of breaking on them.
#[derive(Debug, Serialize, Deserialize)]
struct RecordEnvelope {
    schema_version: u32,
    fingerprint: String,
    project: String,
    session: String,
    response: String,
    strategy: Strategy,
    outcome: Outcome,
    decided_at_ms: u64,
    recorded_at_ms: u64,
}

fn to_epoch_ms(t: SystemTime) -> u64 {
    t.duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

fn from_epoch_ms(ms: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_millis(ms)
}

impl From<&InteractionRecord> for RecordEnvelope {
    fn from(r: &InteractionRecord) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            fingerprint: r.fingerprint.clone(),
            project: r.context.project.clone(),
            session: r.context.session.clone(),
            response: r.response.clone(),
            strategy: r.strategy,
            outcome: r.outcome,
            decided_at_ms: to_epoch_ms(r.decided_at),
            recorded_at_ms: to_epoch_ms(r.recorded_at),
        }
    }
}

impl From<RecordEnvelope> for InteractionRecord {
    fn from(e: RecordEnvelope) -> Self {
        Self {
            context: ContextKey::new(e.project, e.session),
            fingerprint: e.fingerprint,
            response: e.response,
            strategy: e.strategy,
            outcome: e.outcome,
            decided_at: from_epoch_ms(e.decided_at_ms),
            recorded_at: from_epoch_ms(e.recorded_at_ms),
        }
    }
}

struct Inner {
    dir: PathBuf,
    max_per_fingerprint: usize,
    flush_interval: Duration,
    index: ArcSwap<HashMap<String, Arc<FingerprintMap>>>,
    pending: Mutex<HashMap<String, Vec<InteractionRecord>>>,
    dirty: AtomicBool,
    notify: tokio::sync::Notify,
}

/// The learner's persisted, per-project store.
pub struct LearnerStore {
    inner: Arc<Inner>,
}

impl LearnerStore {
    /// Load every `<project>.jsonl` file under `dir` (creating it if
    /// missing) and spawn the debounced background flush task.
    pub fn open(dir: PathBuf, max_per_fingerprint: usize, flush_interval: Duration, shutdown: CancellationToken) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&dir).map_err(|e| anyhow::anyhow!("creating store dir {dir:?}: {e}"))?;

        let mut index: HashMap<String, Arc<FingerprintMap>> = HashMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(project) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            let records = load_project_file(&path, max_per_fingerprint)?;
            index.insert(project.to_owned(), Arc::new(records));
        }

        let inner = Arc::new(Inner {
            dir,
            max_per_fingerprint,
            flush_interval,
            index: ArcSwap::from_pointee(index),
            pending: Mutex::new(HashMap::new()),
            dirty: AtomicBool::new(false),
            notify: tokio::sync::Notify::new(),
        });

        tokio::spawn(run_flush_loop(Arc::clone(&inner), shutdown));

        Ok(Self { inner })
    }

    /// Append a record: apply it to the lock-free in-memory index
    /// immediately (so subsequent reads see it) and queue it for the next
    /// debounced flush to disk.
    pub async fn append(&self, record: InteractionRecord) {
        let project = record.context.project.clone();
        let max_per_fingerprint = self.inner.max_per_fingerprint;

        self.inner.index.rcu(|current| {
            let mut next: HashMap<String, Arc<FingerprintMap>> = (**current).clone();
            let mut fmap: FingerprintMap = next.get(&project).map(|m| (**m).clone()).unwrap_or_default();
            let entry = fmap.entry(record.fingerprint.clone()).or_default();
            entry.push(record.clone());
            if entry.len() > max_per_fingerprint {
                let excess = entry.len() - max_per_fingerprint;
                entry.drain(0..excess);
            }
            next.insert(project.clone(), Arc::new(fmap));
            next
        });

        {
            let mut pending = self.inner.pending.lock().await;
            pending.entry(project).or_default().push(record);
        }
        self.inner.dirty.store(true, Ordering::Release);
        self.inner.notify.notify_one();
    }

    /// All records for `fingerprint` within `project`, oldest first.
    pub fn records_for_project(&self, project: &str, fingerprint: &str) -> Vec<InteractionRecord> {
        self.inner
            .index
            .load()
            .get(project)
            .and_then(|fmap| fmap.get(fingerprint))
            .cloned()
            .unwrap_or_default()
    }

    /// All `(project, records)` pairs holding `fingerprint`, excluding
    /// `exclude_project` (used for cross-project widening).
    pub fn records_for_fingerprint_excluding(&self, fingerprint: &str, exclude_project: &str) -> Vec<(String, Vec<InteractionRecord>)> {
        self.inner
            .index
            .load()
            .iter()
            .filter(|(project, _)| project.as_str() != exclude_project)
            .filter_map(|(project, fmap)| fmap.get(fingerprint).map(|records| (project.clone(), records.clone())))
            .collect()
    }

    /// Force an immediate flush of every pending record to disk, bypassing
    /// the debounce window. Used on clean shutdown.
    pub async fn flush_now(&self) {
        flush_pending(&self.inner).await;
    }
}

async fn run_flush_loop(inner: Arc<Inner>, shutdown: CancellationToken) {
    let tick = (inner.flush_interval / 4).max(Duration::from_millis(50));
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                flush_pending(&inner).await;
                return;
            }
            _ = inner.notify.notified() => {}
            _ = tokio::time::sleep(tick) => {}
        }
        if inner.dirty.load(Ordering::Acquire) {
            flush_pending(&inner).await;
        }
    }
}

async fn flush_pending(inner: &Arc<Inner>) {
    let drained: HashMap<String, Vec<InteractionRecord>> = {
        let mut pending = inner.pending.lock().await;
        if pending.is_empty() {
            inner.dirty.store(false, Ordering::Release);
            return;
        }
        std::mem::take(&mut *pending)
    };

    for (project, records) in drained {
        let path = inner.dir.join(format!("{project}.jsonl"));
        if let Err(e) = append_lines(&path, &records) {
            warn!(project = %project, error = %e, "failed to flush learner records");
        }
    }
    inner.dirty.store(false, Ordering::Release);
}

fn append_lines(path: &Path, records: &[InteractionRecord]) -> anyhow::Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    for record in records {
        let envelope = RecordEnvelope::from(record);
        let mut line = serde_json::to_string(&envelope)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
    }
    Ok(())
}

/// Load one project's JSONL file, tolerating a corrupted tail by truncating
/// to the last fully-parseable line (§6, `StoreCorrupted` recovery path) and
/// compacting to the K-per-fingerprint limit as records are folded in.
fn load_project_file(path: &Path, max_per_fingerprint: usize) -> anyhow::Result<FingerprintMap> {
    let contents = std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("reading {path:?}: {e}"))?;
    let mut map: FingerprintMap = HashMap::new();
    let mut valid_bytes = 0usize;

    for line in contents.lines() {
        if line.trim().is_empty() {
            valid_bytes += line.len() + 1;
            continue;
        }
        match serde_json::from_str::<RecordEnvelope>(line) {
            Ok(envelope) => {
                let record: InteractionRecord = envelope.into();
                let entry = map.entry(record.fingerprint.clone()).or_default();
                entry.push(record);
                if entry.len() > max_per_fingerprint {
                    entry.remove(0);
                }
                valid_bytes += line.len() + 1;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "truncating corrupted learner store tail");
                break;
            }
        }
    }

    if valid_bytes < contents.len() {
        std::fs::write(path, &contents.as_bytes()[..valid_bytes])
            .map_err(|e| anyhow::anyhow!("truncating {path:?}: {e}"))?;
    }

    for records in map.values_mut() {
        records.sort_by_key(|r| r.recorded_at);
    }

    Ok(map)
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
