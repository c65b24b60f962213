//! Catalog cache and search projection.
//!
//! The store owns the canonical media list.  Readers get an
//! `Arc<CatalogSnapshot>`; every mutation builds a complete new snapshot and
//! swaps it in, so nobody ever sees a half-updated list.  Statistics are
//! recomputed from the full list on every refresh.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use media_proto::model::MediaRecord;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::CatalogSource;
use crate::error::{CatalogError, TransportError};

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CatalogStats {
    pub total_files: usize,
    pub total_size_bytes: u64,
    /// Lowercased formats of the records that have one.
    pub distinct_formats: BTreeSet<String>,
    /// Positive durations, in catalog order.
    pub durations: Vec<f64>,
}

impl CatalogStats {
    pub fn compute(records: &[MediaRecord]) -> Self {
        let mut stats = Self {
            total_files: records.len(),
            ..Default::default()
        };
        for rec in records {
            stats.total_size_bytes += rec.size;
            if let Some(format) = rec.format.as_deref() {
                stats.distinct_formats.insert(format.to_lowercase());
            }
            if rec.duration > 0.0 {
                stats.durations.push(rec.duration);
            }
        }
        stats
    }

    pub fn total_duration(&self) -> f64 {
        self.durations.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CatalogSnapshot {
    pub all: Vec<MediaRecord>,
    pub filtered: Vec<MediaRecord>,
    pub stats: CatalogStats,
}

impl CatalogSnapshot {
    fn with_term(&self, term: &str) -> Self {
        Self {
            all: self.all.clone(),
            filtered: project(&self.all, term),
            stats: self.stats.clone(),
        }
    }
}

/// Order-preserving filter of `all` by a case-insensitive substring over
/// filename or format.  An empty term keeps everything.
pub fn project(all: &[MediaRecord], term: &str) -> Vec<MediaRecord> {
    if term.is_empty() {
        return all.to_vec();
    }
    let needle = term.to_lowercase();
    all.iter().filter(|r| r.matches(&needle)).cloned().collect()
}

struct State {
    snapshot: Arc<CatalogSnapshot>,
    term: String,
    /// Sequence number of the refresh that produced `snapshot`.
    applied_seq: u64,
}

pub struct CatalogStore {
    source: Arc<dyn CatalogSource>,
    state: RwLock<State>,
    next_seq: AtomicU64,
}

impl CatalogStore {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            state: RwLock::new(State {
                snapshot: Arc::new(CatalogSnapshot::default()),
                term: String::new(),
                applied_seq: 0,
            }),
            next_seq: AtomicU64::new(1),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.read().snapshot)
    }

    pub fn search_term(&self) -> String {
        self.read().term.clone()
    }

    /// Fetch the full list and replace the catalog.  On failure the previous
    /// snapshot stays in place.
    pub async fn refresh(&self) -> Result<Arc<CatalogSnapshot>, TransportError> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let records = match self.source.media_list().await {
            Ok(r) => r,
            Err(e) => {
                warn!("catalog: refresh failed, keeping last catalog: {}", e);
                return Err(e);
            }
        };
        let stats = CatalogStats::compute(&records);

        let mut state = self.write();
        if seq < state.applied_seq {
            // A later refresh already landed; ours is older data.
            debug!("catalog: dropping stale refresh #{}", seq);
            return Ok(Arc::clone(&state.snapshot));
        }
        let filtered = project(&records, &state.term);
        let snapshot = Arc::new(CatalogSnapshot {
            all: records,
            filtered,
            stats,
        });
        state.snapshot = Arc::clone(&snapshot);
        state.applied_seq = seq;
        info!(
            "catalog: {} files, {} bytes, {} formats",
            snapshot.stats.total_files,
            snapshot.stats.total_size_bytes,
            snapshot.stats.distinct_formats.len()
        );
        Ok(snapshot)
    }

    /// Re-project the current list; `all` and `stats` are untouched.
    pub fn set_search_term(&self, term: &str) -> Arc<CatalogSnapshot> {
        let mut state = self.write();
        state.term = term.to_string();
        let snapshot = Arc::new(state.snapshot.with_term(term));
        state.snapshot = Arc::clone(&snapshot);
        debug!(
            "catalog: search '{}' -> {}/{}",
            term,
            snapshot.filtered.len(),
            snapshot.all.len()
        );
        snapshot
    }

    pub fn get_by_id(&self, id: &str) -> Option<MediaRecord> {
        self.read().snapshot.all.iter().find(|r| r.id == id).cloned()
    }

    /// Full detail fields come from the server, not the cached list.
    pub async fn fetch_details(&self, id: &str) -> Result<MediaRecord, TransportError> {
        self.source.media_details(id).await
    }

    /// Ask the server to rescan its library, then refresh.
    pub async fn rescan(&self) -> Result<Arc<CatalogSnapshot>, CatalogError> {
        let result = self.source.rescan().await?;
        if !result.success {
            let message = result
                .message
                .unwrap_or_else(|| "Failed to scan media directory".to_string());
            warn!("catalog: rescan rejected: {}", message);
            return Err(CatalogError::ScanRejected { message });
        }
        Ok(self.refresh().await?)
    }
}
