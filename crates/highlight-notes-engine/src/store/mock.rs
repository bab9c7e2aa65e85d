//! Mock remote store for testing.
//!
//! Records every call and can be switched offline, or set to fail after a
//! number of successful calls.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::sync::{RemoteHighlight, RemoteStore};
use crate::anchoring::HighlightId;
use crate::error::SyncError;

/// A recorded call to the mock remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Upsert(HighlightId),
    Delete(HighlightId),
    ListByUrl(String),
}

#[derive(Debug, Default)]
pub struct MockRemoteStore {
    records: Mutex<Vec<RemoteHighlight>>,
    calls: Mutex<Vec<RemoteCall>>,
    failing: AtomicBool,
    successes_left: Mutex<Option<usize>>,
}

impl MockRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a remote record.
    pub fn insert(&self, record: RemoteHighlight) {
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }

    /// Make every call fail with a network error until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
        if !failing {
            self.set_successes_left(None);
        }
    }

    /// Let the next `n` calls succeed, then fail the rest.
    pub fn fail_after(&self, n: usize) {
        self.failing.store(false, Ordering::SeqCst);
        self.set_successes_left(Some(n));
    }

    fn set_successes_left(&self, value: Option<usize>) {
        match self.successes_left.lock() {
            Ok(mut left) => *left = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }

    /// Return all recorded calls.
    pub fn calls(&self) -> Vec<RemoteCall> {
        match self.calls.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn records(&self) -> Vec<RemoteHighlight> {
        match self.records.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record_call(&self, call: RemoteCall) {
        match self.calls.lock() {
            Ok(mut calls) => calls.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }
    }

    fn check(&self) -> Result<(), SyncError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::Network("mock remote offline".to_string()));
        }
        let mut left = match self.successes_left.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match left.as_mut() {
            Some(0) => Err(SyncError::Network("mock remote offline".to_string())),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn with_records<T>(&self, f: impl FnOnce(&mut Vec<RemoteHighlight>) -> T) -> T {
        match self.records.lock() {
            Ok(mut records) => f(&mut records),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    async fn upsert(&self, record: &RemoteHighlight) -> Result<RemoteHighlight, SyncError> {
        self.record_call(RemoteCall::Upsert(record.anchor.id.clone()));
        self.check()?;
        self.with_records(|records| {
            match records.iter_mut().find(|r| r.anchor.id == record.anchor.id) {
                Some(existing) => *existing = record.clone(),
                None => records.push(record.clone()),
            }
        });
        Ok(record.clone())
    }

    async fn delete(&self, id: &HighlightId) -> Result<(), SyncError> {
        self.record_call(RemoteCall::Delete(id.clone()));
        self.check()?;
        self.with_records(|records| records.retain(|r| &r.anchor.id != id));
        Ok(())
    }

    async fn list_by_url(&self, url: &str) -> Result<Vec<RemoteHighlight>, SyncError> {
        self.record_call(RemoteCall::ListByUrl(url.to_string()));
        self.check()?;
        Ok(self.with_records(|records| {
            records.iter().filter(|r| r.url == url).cloned().collect()
        }))
    }
}
