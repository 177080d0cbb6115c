//! The typed value model: one `Object` per key, carrying one of six
//! encodings plus a type tag, an access timestamp, and an expiry.
//!
//! A tagged enum replaces a class hierarchy here for the same reason
//! `Piece` does for replies: commands match on the encoding directly, and
//! the invariant "this type always carries that encoding" is enforced by
//! construction rather than by a virtual dispatch table.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

/// Current time as a monotone-epoch millisecond timestamp. The spec
/// normalizes all of the source's inconsistent clock drafts (wall-clock
/// seconds in some, milliseconds in others) to this single representation.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}

/// The externally visible type of a key, independent of its storage
/// encoding (e.g. both `Int` and `Raw` report `String`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjType {
    String,
    List,
    Hash,
    Set,
    SortedSet,
}

impl ObjType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjType::String => "string",
            ObjType::List => "list",
            ObjType::Hash => "hash",
            ObjType::Set => "set",
            ObjType::SortedSet => "zset",
        }
    }
}

/// One of the six storage encodings. A `String` object is always `Int` or
/// `Raw`; the others each have exactly one corresponding encoding.
#[derive(Debug, Clone)]
pub enum Encoding {
    Int(i64),
    Raw(Bytes),
    LinkedList(VecDeque<Bytes>),
    HashTable(HashMap<Bytes, Bytes>),
    HashSet(HashSet<Bytes>),
    SortedSet(BTreeSet<Bytes>),
}

impl Encoding {
    fn obj_type(&self) -> ObjType {
        match self {
            Encoding::Int(_) | Encoding::Raw(_) => ObjType::String,
            Encoding::LinkedList(_) => ObjType::List,
            Encoding::HashTable(_) => ObjType::Hash,
            Encoding::HashSet(_) => ObjType::Set,
            Encoding::SortedSet(_) => ObjType::SortedSet,
        }
    }

    /// Name `OBJECT ENCODING` reports for this storage form.
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Int(_) => "int",
            Encoding::Raw(_) => "raw",
            Encoding::LinkedList(_) => "linkedlist",
            Encoding::HashTable(_) => "hashtable",
            Encoding::HashSet(_) => "hashtable",
            Encoding::SortedSet(_) => "skiplist",
        }
    }
}

/// A single keyspace value: encoding, last-access timestamp, and expiry.
#[derive(Debug, Clone)]
pub struct Object {
    encoding: Encoding,
    access_time_ms: i64,
    /// `None` means "never expires"; `Some(t)` with `t <= now` means
    /// logically deleted but not yet physically removed.
    expire_time_ms: Option<i64>,
}

impl Object {
    fn new(encoding: Encoding) -> Object {
        Object {
            encoding,
            access_time_ms: now_ms(),
            expire_time_ms: None,
        }
    }

    /// Store `bytes` as a string value. Parses as a signed 64-bit decimal
    /// first and falls back to raw storage — purely an optimization, never
    /// observable by a client (`STRLEN`/`APPEND`/`GETRANGE` must behave as
    /// if the textual form were always present).
    pub fn new_string(bytes: Bytes) -> Object {
        match parse_strict_i64(&bytes) {
            Some(n) => Object::new(Encoding::Int(n)),
            None => Object::new(Encoding::Raw(bytes)),
        }
    }

    pub fn new_list(items: VecDeque<Bytes>) -> Object {
        Object::new(Encoding::LinkedList(items))
    }

    pub fn new_hash(map: HashMap<Bytes, Bytes>) -> Object {
        Object::new(Encoding::HashTable(map))
    }

    pub fn new_set(set: HashSet<Bytes>) -> Object {
        Object::new(Encoding::HashSet(set))
    }

    pub fn new_sorted_set(set: BTreeSet<Bytes>) -> Object {
        Object::new(Encoding::SortedSet(set))
    }

    pub fn obj_type(&self) -> ObjType {
        self.encoding.obj_type()
    }

    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    pub fn encoding_mut(&mut self) -> &mut Encoding {
        &mut self.encoding
    }

    /// The textual form of a string value, regardless of storage encoding.
    /// Panics if called on a non-`String` object — accessing the wrong
    /// encoding accessor is a contract violation, not a runtime condition
    /// callers should recover from.
    pub fn string_bytes(&self) -> Bytes {
        match &self.encoding {
            Encoding::Int(n) => Bytes::from(n.to_string()),
            Encoding::Raw(b) => b.clone(),
            _ => panic!("string_bytes() called on a non-string object"),
        }
    }

    pub fn set_string(&mut self, bytes: Bytes) {
        self.encoding = match parse_strict_i64(&bytes) {
            Some(n) => Encoding::Int(n),
            None => Encoding::Raw(bytes),
        };
    }

    /// `-1` if the key never expires, otherwise the milliseconds remaining
    /// (clamped to zero once past expiry).
    pub fn pttl(&self, now: i64) -> i64 {
        match self.expire_time_ms {
            None => -1,
            Some(t) => (t - now).max(0),
        }
    }

    /// `msec == -1` clears the expiry; otherwise sets it `msec`
    /// milliseconds from `now` (which may already be in the past).
    pub fn set_pttl(&mut self, msec: i64, now: i64) {
        self.expire_time_ms = if msec == -1 { None } else { Some(now + msec) };
    }

    pub fn has_expiry(&self) -> bool {
        self.expire_time_ms.is_some()
    }

    pub fn is_logically_expired(&self, now: i64) -> bool {
        matches!(self.expire_time_ms, Some(t) if t <= now)
    }

    pub fn touch(&mut self, now: i64) {
        self.access_time_ms = now;
    }

    pub fn idle_time_ms(&self, now: i64) -> i64 {
        (now - self.access_time_ms).max(0)
    }
}

fn parse_strict_i64(bytes: &[u8]) -> Option<i64> {
    let s = std::str::from_utf8(bytes).ok()?;
    if s.is_empty() {
        return None;
    }
    // reject forms like "+1", "01", " 1" that i64::from_str_radix/parse would
    // otherwise accept or reject inconsistently with redis's integer encoding
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    s.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_decimal_strings_encode_as_int() {
        let obj = Object::new_string(Bytes::from_static(b"42"));
        assert_eq!(obj.encoding().name(), "int");
        assert_eq!(obj.string_bytes(), Bytes::from_static(b"42"));
    }

    #[test]
    fn non_canonical_decimals_stay_raw() {
        for v in [&b"+1"[..], b"01", b" 1", b"1 ", b"abc", b""] {
            let obj = Object::new_string(Bytes::copy_from_slice(v));
            assert_eq!(obj.encoding().name(), "raw", "{:?}", v);
        }
    }

    #[test]
    fn pttl_reports_negative_one_when_never_expires() {
        let obj = Object::new_string(Bytes::from_static(b"x"));
        assert_eq!(obj.pttl(now_ms()), -1);
    }

    #[test]
    fn set_pttl_then_pttl_is_within_epsilon_of_requested() {
        let mut obj = Object::new_string(Bytes::from_static(b"x"));
        let now = now_ms();
        obj.set_pttl(1000, now);
        let left = obj.pttl(now);
        assert!(left <= 1000 && left >= 990, "left={left}");
    }

    #[test]
    fn zero_pttl_is_logically_expired_immediately() {
        let mut obj = Object::new_string(Bytes::from_static(b"x"));
        let now = now_ms();
        obj.set_pttl(0, now);
        assert!(obj.is_logically_expired(now));
    }
}
