//! In-memory reference backend.
//!
//! Used by tests, the conformance suite, and the CLI's file-snapshot store.
//! All state lives in maps behind a single mutex; operations are short and
//! never block across await points.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::record::{RequestFilter, RequestRecord, TransitionRecord};
use crate::traits::RequestStore;

#[derive(Debug, Default)]
struct Inner {
    requests: BTreeMap<String, RequestRecord>,
    /// Per-request history, kept sorted by seq.
    transitions: BTreeMap<String, Vec<TransitionRecord>>,
    /// Next seq per request; never reused after removal.
    next_seq: BTreeMap<String, u64>,
}

/// In-memory [`RequestStore`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

/// Serializable dump of a [`MemoryStore`], used for file-backed snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub requests: Vec<RequestRecord>,
    pub transitions: Vec<TransitionRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Rebuild a store from a snapshot. Sequence counters resume after the
    /// highest seq present per request.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut inner = Inner::default();
        for record in snapshot.requests {
            inner.requests.insert(record.id.clone(), record);
        }
        for transition in snapshot.transitions {
            let next = inner
                .next_seq
                .entry(transition.request_id.clone())
                .or_insert(1);
            if transition.seq >= *next {
                *next = transition.seq + 1;
            }
            inner
                .transitions
                .entry(transition.request_id.clone())
                .or_default()
                .push(transition);
        }
        for history in inner.transitions.values_mut() {
            history.sort_by_key(|t| t.seq);
        }
        MemoryStore {
            inner: Mutex::new(inner),
        }
    }

    /// Dump the full store contents.
    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.lock().expect("memory store poisoned");
        StoreSnapshot {
            requests: inner.requests.values().cloned().collect(),
            transitions: inner
                .transitions
                .values()
                .flat_map(|h| h.iter().cloned())
                .collect(),
        }
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn create_request(&self, record: RequestRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        if inner.requests.contains_key(&record.id) {
            return Err(StorageError::AlreadyExists {
                request_id: record.id,
            });
        }
        inner.next_seq.entry(record.id.clone()).or_insert(1);
        inner.transitions.entry(record.id.clone()).or_default();
        inner.requests.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get_request(&self, id: &str) -> Result<Option<RequestRecord>, StorageError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner.requests.get(id).cloned())
    }

    async fn update_request(
        &self,
        mut record: RequestRecord,
        expected_version: i64,
    ) -> Result<i64, StorageError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let current = inner
            .requests
            .get(&record.id)
            .ok_or_else(|| StorageError::RequestNotFound {
                request_id: record.id.clone(),
            })?;
        if current.version != expected_version {
            return Err(StorageError::ConcurrentConflict {
                request_id: record.id,
                expected_version,
            });
        }
        let new_version = expected_version + 1;
        record.version = new_version;
        inner.requests.insert(record.id.clone(), record);
        Ok(new_version)
    }

    async fn insert_transition(
        &self,
        mut record: TransitionRecord,
    ) -> Result<u64, StorageError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        if !inner.requests.contains_key(&record.request_id) {
            return Err(StorageError::RequestNotFound {
                request_id: record.request_id,
            });
        }
        let seq = {
            let next = inner
                .next_seq
                .entry(record.request_id.clone())
                .or_insert(1);
            let seq = *next;
            *next += 1;
            seq
        };
        record.seq = seq;
        inner
            .transitions
            .entry(record.request_id.clone())
            .or_default()
            .push(record);
        Ok(seq)
    }

    async fn get_history(
        &self,
        request_id: &str,
    ) -> Result<Vec<TransitionRecord>, StorageError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        if !inner.requests.contains_key(request_id) {
            return Err(StorageError::RequestNotFound {
                request_id: request_id.to_string(),
            });
        }
        Ok(inner
            .transitions
            .get(request_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<RequestRecord>, StorageError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let mut matches: Vec<RequestRecord> = inner
            .requests
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matches.sort_by_key(|r| r.updated_at);
        if filter.limit > 0 {
            matches.truncate(filter.limit);
        }
        Ok(matches)
    }

    async fn delete_request(&self, id: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        if inner.requests.remove(id).is_none() {
            return Err(StorageError::RequestNotFound {
                request_id: id.to_string(),
            });
        }
        inner.transitions.remove(id);
        inner.next_seq.remove(id);
        Ok(())
    }

    async fn remove_transition(&self, request_id: &str, seq: u64) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        if !inner.requests.contains_key(request_id) {
            return Err(StorageError::RequestNotFound {
                request_id: request_id.to_string(),
            });
        }
        let history = inner
            .transitions
            .entry(request_id.to_string())
            .or_default();
        let before = history.len();
        history.retain(|t| t.seq != seq);
        if history.len() == before {
            return Err(StorageError::TransitionNotFound {
                request_id: request_id.to_string(),
                seq,
            });
        }
        Ok(())
    }
}
