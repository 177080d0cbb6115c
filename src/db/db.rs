//! A single numbered keyspace: a byte-string-keyed map of `Object`s with
//! lazy expiration.
//!
//! Deletion on expiry only happens when a key is looked up (spec §4.5: "no
//! background sweep is required"). A key past its expiry is treated as
//! absent by every read, and is physically removed the first time anything
//! touches it.

use std::collections::HashMap;

use bytes::Bytes;

use super::object::{now_ms, Object};

#[derive(Default)]
pub struct Database {
    entries: HashMap<Bytes, Object>,
}

impl Database {
    pub fn new() -> Database {
        Database {
            entries: HashMap::new(),
        }
    }

    /// Evict `key` if it is logically expired. Returns whether it was
    /// evicted, so callers that only need the up-to-date existence check
    /// don't have to look the entry up twice.
    fn expire_if_due(&mut self, key: &[u8], now: i64) -> bool {
        let expired = matches!(self.entries.get(key), Some(obj) if obj.is_logically_expired(now));
        if expired {
            self.entries.remove(key);
        }
        expired
    }

    pub fn get(&mut self, key: &[u8]) -> Option<&Object> {
        self.get_at(key, now_ms())
    }

    pub fn get_at(&mut self, key: &[u8], now: i64) -> Option<&Object> {
        self.expire_if_due(key, now);
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Object> {
        self.get_mut_at(key, now_ms())
    }

    pub fn get_mut_at(&mut self, key: &[u8], now: i64) -> Option<&mut Object> {
        self.expire_if_due(key, now);
        self.entries.get_mut(key)
    }

    pub fn contains(&mut self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace `key`'s value outright, clearing any prior expiry.
    pub fn set(&mut self, key: Bytes, object: Object) {
        self.entries.insert(key, object);
    }

    /// Remove `key` unconditionally. Returns whether it was present
    /// (accounting for lazy expiry, so an already-expired key reports
    /// `false` rather than `true`).
    pub fn remove(&mut self, key: &[u8]) -> bool {
        let now = now_ms();
        if self.expire_if_due(key, now) {
            return false;
        }
        self.entries.remove(key).is_some()
    }

    /// Move `key`'s entry to `new_key`, overwriting whatever was at
    /// `new_key`. Returns `false` if `key` doesn't exist (nothing moved).
    pub fn rename(&mut self, key: &[u8], new_key: Bytes) -> bool {
        let now = now_ms();
        if self.expire_if_due(key, now) {
            return false;
        }
        match self.entries.remove(key) {
            Some(obj) => {
                self.entries.insert(new_key, obj);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_after_set_returns_the_value() {
        let mut db = Database::new();
        db.set(Bytes::from_static(b"k"), Object::new_string(Bytes::from_static(b"v")));
        assert_eq!(db.get(b"k").unwrap().string_bytes(), Bytes::from_static(b"v"));
    }

    #[test]
    fn expired_key_reads_as_absent_and_is_evicted() {
        let mut db = Database::new();
        let mut obj = Object::new_string(Bytes::from_static(b"v"));
        let now = 1_000_000;
        obj.set_pttl(0, now);
        db.set(Bytes::from_static(b"k"), obj);

        assert!(db.get_at(b"k", now).is_none());
        assert_eq!(db.len(), 0);
    }

    #[test]
    fn rename_moves_value_and_drops_old_key() {
        let mut db = Database::new();
        db.set(Bytes::from_static(b"a"), Object::new_string(Bytes::from_static(b"1")));
        assert!(db.rename(b"a", Bytes::from_static(b"b")));
        assert!(db.get(b"a").is_none());
        assert_eq!(db.get(b"b").unwrap().string_bytes(), Bytes::from_static(b"1"));
    }

    #[test]
    fn rename_of_missing_key_reports_false() {
        let mut db = Database::new();
        assert!(!db.rename(b"nope", Bytes::from_static(b"b")));
    }
}
