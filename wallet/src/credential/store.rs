//! Concurrency-safe credential store.
//!
//! Issuance and spend tasks run concurrently and share one map. They touch
//! disjoint keys in practice, but the container itself is shared, so every
//! operation goes through a `DashMap` shard lock and nothing hands out a
//! reference into the map.
//!
//! ## Guarantees
//!
//! - At most one record per sequence id. `put` refuses to overwrite.
//! - Reads return a cloned record. The credential inside is an `Arc`, so a
//!   reader sees either the credential before a replacement or the one
//!   after it, never a mix.
//! - Records are never deleted. A spent record stays queryable.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use super::{Credential, IssuedCredentialRecord};

/// Errors returned by [`CredentialStore`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("no credential stored for sequence {0}")]
    NotFound(String),

    #[error("a credential is already stored for sequence {0}")]
    Duplicate(String),
}

/// In-memory map from sequence id to issued credential record.
#[derive(Debug, Default)]
pub struct CredentialStore {
    records: DashMap<String, IssuedCredentialRecord>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Inserts a record under `id`. Fails if the id is taken.
    pub fn put(&self, id: String, record: IssuedCredentialRecord) -> Result<(), StoreError> {
        match self.records.entry(id) {
            Entry::Occupied(entry) => Err(StoreError::Duplicate(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!(sequence = %entry.key(), value = record.token().value(), "credential stored");
                entry.insert(record);
                Ok(())
            }
        }
    }

    /// Returns a snapshot of the record stored under `id`.
    pub fn get(&self, id: &str) -> Result<IssuedCredentialRecord, StoreError> {
        self.records
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Swaps the credential stored under `id`, returning the previous one.
    /// The token is untouched.
    pub fn replace_credential(
        &self,
        id: &str,
        credential: Credential,
    ) -> Result<Arc<Credential>, StoreError> {
        let mut record = self
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let previous = std::mem::replace(&mut record.credential, Arc::new(credential));
        Ok(previous)
    }

    /// Marks the record under `id` as spent. Returns whether it already was.
    pub fn mark_spent(&self, id: &str) -> Result<bool, StoreError> {
        let mut record = self
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let was_spent = record.spent;
        record.spent = true;
        Ok(was_spent)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted snapshot of the stored sequence ids.
    pub fn sequence_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.records.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{AccountSecret, SequenceNumber, Token};

    fn record(seq_byte: u8, value: u64) -> IssuedCredentialRecord {
        let token = Token::new(
            SequenceNumber::from_bytes([seq_byte; 32]),
            AccountSecret::from_bytes([9; 32]),
            value,
        )
        .unwrap();
        IssuedCredentialRecord::new(token, Credential::from_bytes(vec![seq_byte; 16]))
    }

    #[test]
    fn put_then_get_returns_same_token() {
        let store = CredentialStore::new();
        let rec = record(1, 10);
        let id = rec.sequence_id();
        let token_before = rec.token().clone();

        store.put(id.clone(), rec).unwrap();
        let fetched = store.get(&id).unwrap();

        assert_eq!(**fetched.token(), *token_before);
        assert!(!fetched.is_spent());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn get_unknown_is_not_found() {
        let store = CredentialStore::new();
        assert_eq!(
            store.get("nope").unwrap_err(),
            StoreError::NotFound("nope".into())
        );
    }

    #[test]
    fn put_refuses_duplicate_sequence() {
        let store = CredentialStore::new();
        let rec = record(2, 5);
        let id = rec.sequence_id();
        store.put(id.clone(), rec.clone()).unwrap();

        assert!(matches!(
            store.put(id, rec),
            Err(StoreError::Duplicate(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn replace_keeps_token_and_swaps_credential() {
        let store = CredentialStore::new();
        let rec = record(3, 20);
        let id = rec.sequence_id();
        store.put(id.clone(), rec).unwrap();

        let old = store
            .replace_credential(&id, Credential::from_bytes(vec![0xEE; 16]))
            .unwrap();
        assert_eq!(old.as_bytes(), &[3u8; 16]);

        let fetched = store.get(&id).unwrap();
        assert_eq!(fetched.credential().as_bytes(), &[0xEE; 16]);
        assert_eq!(fetched.token().value(), 20);
    }

    #[test]
    fn replace_unknown_is_not_found() {
        let store = CredentialStore::new();
        assert!(store
            .replace_credential("missing", Credential::from_bytes(vec![1]))
            .is_err());
    }

    #[test]
    fn mark_spent_reports_previous_state() {
        let store = CredentialStore::new();
        let rec = record(4, 1);
        let id = rec.sequence_id();
        store.put(id.clone(), rec).unwrap();

        assert!(!store.mark_spent(&id).unwrap());
        assert!(store.mark_spent(&id).unwrap());
        assert!(store.get(&id).unwrap().is_spent());
    }

    #[test]
    fn snapshot_is_detached_from_store() {
        let store = CredentialStore::new();
        let rec = record(5, 2);
        let id = rec.sequence_id();
        store.put(id.clone(), rec).unwrap();

        let snapshot = store.get(&id).unwrap();
        store.mark_spent(&id).unwrap();
        assert!(!snapshot.is_spent());
    }

    #[test]
    fn concurrent_readers_never_see_partial_credentials() {
        let store = Arc::new(CredentialStore::new());
        let rec = record(6, 50);
        let id = rec.sequence_id();
        store.put(id.clone(), rec).unwrap();

        let a = vec![0xAA; 256];
        let b = vec![0xBB; 256];

        let writer = {
            let store = Arc::clone(&store);
            let id = id.clone();
            let (a, b) = (a.clone(), b.clone());
            std::thread::spawn(move || {
                for i in 0..2_000 {
                    let next = if i % 2 == 0 { a.clone() } else { b.clone() };
                    store
                        .replace_credential(&id, Credential::from_bytes(next))
                        .unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let id = id.clone();
                let (a, b) = (a.clone(), b.clone());
                std::thread::spawn(move || {
                    for _ in 0..2_000 {
                        let seen = store.get(&id).unwrap();
                        let bytes = seen.credential().as_bytes();
                        assert!(
                            bytes == [6u8; 16].as_slice() || bytes == a.as_slice() || bytes == b.as_slice(),
                            "reader observed a credential that was never written"
                        );
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn sequence_ids_are_sorted() {
        let store = CredentialStore::new();
        for b in [9u8, 1, 5] {
            let rec = record(b, 1);
            store.put(rec.sequence_id(), rec).unwrap();
        }
        let ids = store.sequence_ids();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 3);
    }
}
