// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Per-driver typed attribute store.
//!
//! A small open-addressed table (FNV-1a hash, linear probing) holding up to 16 attributes.
//! The host fills it through `set_attribute` before Init; the bag is locked when Init runs
//! and stays immutable afterwards. Unknown attributes are stored and preserved but never
//! interpreted by the core.
//!
//! Keys are bounded case-sensitive ASCII. Keys beginning with `__` are reserved for values
//! the core synthesizes (e.g. `__errors`) and are rejected on write.

use crate::bytes::ByteBuf;

pub const MAX_ATTRS: usize = 16;
pub const MAX_KEY: usize = 16;
pub const MAX_VALUE_BYTES: usize = 32;

pub type AttrKey = ByteBuf<MAX_KEY>;

/// Tagged attribute value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum AttrValue {
    U64(u64),
    I64(i64),
    Bool(bool),
    Bytes(ByteBuf<MAX_VALUE_BYTES>),
}

/// Attribute access failures.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AttrError {
    /// Key absent.
    Missing,
    /// Stored under a different type tag.
    TypeMismatch,
    /// Write after the bag was locked at Init.
    Locked,
    /// All slots in use.
    Full,
    /// Empty, oversized, or non-ASCII key.
    BadKey,
    /// Write to a `__`-prefixed key.
    Reserved,
}

#[derive(Copy, Clone)]
struct Slot {
    key: AttrKey,
    value: AttrValue,
}

fn fnv1a(key: &[u8]) -> usize {
    let mut hash: u32 = 0x811c_9dc5;
    for &b in key {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash as usize
}

fn key_ok(key: &[u8]) -> bool {
    !key.is_empty() && key.len() <= MAX_KEY && key.iter().all(|b| (0x21..0x7F).contains(b))
}

/// Open-addressed attribute table. Copyable value type, part of a driver's config.
#[derive(Copy, Clone)]
pub struct AttrBag {
    slots: [Option<Slot>; MAX_ATTRS],
    locked: bool,
}

impl AttrBag {
    pub const fn new() -> Self {
        Self {
            slots: [None; MAX_ATTRS],
            locked: false,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freeze the bag. Called by the registry when Init succeeds.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Insert or overwrite `key`. Case-sensitive.
    pub fn set(&mut self, key: &[u8], value: AttrValue) -> Result<(), AttrError> {
        if self.locked {
            return Err(AttrError::Locked);
        }
        if !key_ok(key) {
            return Err(AttrError::BadKey);
        }
        if key.starts_with(b"__") {
            return Err(AttrError::Reserved);
        }
        let mut idx = fnv1a(key) % MAX_ATTRS;
        for _ in 0..MAX_ATTRS {
            match self.slots[idx] {
                Some(ref mut slot) if slot.key.as_slice() == key => {
                    slot.value = value;
                    return Ok(());
                }
                Some(_) => idx = (idx + 1) % MAX_ATTRS,
                None => {
                    let key = match AttrKey::from_slice(key) {
                        Some(k) => k,
                        None => return Err(AttrError::BadKey),
                    };
                    self.slots[idx] = Some(Slot { key, value });
                    return Ok(());
                }
            }
        }
        Err(AttrError::Full)
    }

    /// Untyped lookup.
    pub fn get(&self, key: &[u8]) -> Option<AttrValue> {
        let mut idx = fnv1a(key) % MAX_ATTRS;
        for _ in 0..MAX_ATTRS {
            match self.slots[idx] {
                Some(ref slot) if slot.key.as_slice() == key => return Some(slot.value),
                Some(_) => idx = (idx + 1) % MAX_ATTRS,
                None => return None,
            }
        }
        None
    }

    pub fn get_u64(&self, key: &[u8]) -> Result<u64, AttrError> {
        match self.get(key) {
            Some(AttrValue::U64(v)) => Ok(v),
            Some(_) => Err(AttrError::TypeMismatch),
            None => Err(AttrError::Missing),
        }
    }

    pub fn get_i64(&self, key: &[u8]) -> Result<i64, AttrError> {
        match self.get(key) {
            Some(AttrValue::I64(v)) => Ok(v),
            Some(_) => Err(AttrError::TypeMismatch),
            None => Err(AttrError::Missing),
        }
    }

    pub fn get_bool(&self, key: &[u8]) -> Result<bool, AttrError> {
        match self.get(key) {
            Some(AttrValue::Bool(v)) => Ok(v),
            Some(_) => Err(AttrError::TypeMismatch),
            None => Err(AttrError::Missing),
        }
    }

    pub fn get_bytes(&self, key: &[u8]) -> Result<ByteBuf<MAX_VALUE_BYTES>, AttrError> {
        match self.get(key) {
            Some(AttrValue::Bytes(v)) => Ok(v),
            Some(_) => Err(AttrError::TypeMismatch),
            None => Err(AttrError::Missing),
        }
    }

    /// Iterate over stored `(key, value)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &AttrValue)> {
        self.slots
            .iter()
            .flatten()
            .map(|slot| (slot.key.as_slice(), &slot.value))
    }
}

impl Default for AttrBag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_roundtrip() {
        let mut bag = AttrBag::new();
        bag.set(b"timing_budget", AttrValue::U64(50_000)).unwrap();
        bag.set(b"offset", AttrValue::I64(-7)).unwrap();
        bag.set(b"fast", AttrValue::Bool(true)).unwrap();
        assert_eq!(bag.get_u64(b"timing_budget"), Ok(50_000));
        assert_eq!(bag.get_i64(b"offset"), Ok(-7));
        assert_eq!(bag.get_bool(b"fast"), Ok(true));
        assert_eq!(bag.len(), 3);
    }

    #[test]
    fn overwrite_same_key() {
        let mut bag = AttrBag::new();
        bag.set(b"rate", AttrValue::U64(100)).unwrap();
        bag.set(b"rate", AttrValue::U64(200)).unwrap();
        assert_eq!(bag.get_u64(b"rate"), Ok(200));
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn type_mismatch() {
        let mut bag = AttrBag::new();
        bag.set(b"range", AttrValue::U64(16)).unwrap();
        assert_eq!(bag.get_bytes(b"range"), Err(AttrError::TypeMismatch));
        assert_eq!(bag.get_u64(b"missing"), Err(AttrError::Missing));
    }

    #[test]
    fn locked_after_init() {
        let mut bag = AttrBag::new();
        bag.set(b"a", AttrValue::Bool(false)).unwrap();
        bag.lock();
        assert_eq!(bag.set(b"b", AttrValue::Bool(true)), Err(AttrError::Locked));
        // Reads still work.
        assert_eq!(bag.get_bool(b"a"), Ok(false));
    }

    #[test]
    fn key_validation() {
        let mut bag = AttrBag::new();
        assert_eq!(bag.set(b"", AttrValue::U64(0)), Err(AttrError::BadKey));
        assert_eq!(
            bag.set(b"seventeen_bytes__", AttrValue::U64(0)),
            Err(AttrError::BadKey)
        );
        assert_eq!(
            bag.set(b"has space", AttrValue::U64(0)),
            Err(AttrError::BadKey)
        );
        assert_eq!(
            bag.set(b"__errors", AttrValue::U64(0)),
            Err(AttrError::Reserved)
        );
    }

    #[test]
    fn case_sensitive_keys() {
        let mut bag = AttrBag::new();
        bag.set(b"Rate", AttrValue::U64(1)).unwrap();
        bag.set(b"rate", AttrValue::U64(2)).unwrap();
        assert_eq!(bag.get_u64(b"Rate"), Ok(1));
        assert_eq!(bag.get_u64(b"rate"), Ok(2));
    }

    #[test]
    fn table_fills_up() {
        let mut bag = AttrBag::new();
        for i in 0..MAX_ATTRS {
            let key = [b'k', b'0' + i as u8];
            bag.set(&key, AttrValue::U64(i as u64)).unwrap();
        }
        assert_eq!(bag.set(b"overflow", AttrValue::U64(0)), Err(AttrError::Full));
        // Every earlier key still reachable through probing.
        for i in 0..MAX_ATTRS {
            let key = [b'k', b'0' + i as u8];
            assert_eq!(bag.get_u64(&key), Ok(i as u64));
        }
    }
}
