//! Identity types for CONDOR values
//!
//! A [`Key`] packs the hash of the owning scope into its upper 32 bits and
//! the hash of the item name into its lower 32 bits, so all values attached
//! to one scope sort together.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Compute a stable 32-bit hash of a string (first four bytes of SHA-256).
pub fn hash32(text: &str) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Opaque identity of the entity a value annotates.
///
/// The description layer owns the entity itself; this is only its hashed
/// path, so holding a `ScopeId` never keeps the entity alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(u32);

impl ScopeId {
    /// The global scope, for values not attached to any entity.
    pub const ROOT: ScopeId = ScopeId(0);

    /// Hash an entity path such as `/world/tracker/layer1`.
    pub fn from_path(path: &str) -> Self {
        if path.is_empty() || path == "/" {
            return Self::ROOT;
        }
        Self(hash32(path))
    }

    pub const fn from_hash(hash: u32) -> Self {
        Self(hash)
    }

    pub const fn hash(&self) -> u32 {
        self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Stable hashed identifier of a value.
///
/// Equality, ordering and lookup all go through the 64-bit hash; the
/// human-readable name is not retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(u64);

impl Key {
    /// Form a key from an owning scope and an item name.
    pub fn new(scope: ScopeId, name: &str) -> Self {
        Self::from_parts(scope.hash(), hash32(name))
    }

    /// Form a key in the global scope.
    pub fn global(name: &str) -> Self {
        Self::new(ScopeId::ROOT, name)
    }

    pub const fn from_parts(scope_hash: u32, item_hash: u32) -> Self {
        Self(((scope_hash as u64) << 32) | item_hash as u64)
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// The owning scope encoded in the upper half.
    pub const fn scope(&self) -> ScopeId {
        ScopeId::from_hash((self.0 >> 32) as u32)
    }

    /// The item name hash encoded in the lower half.
    pub const fn item_hash(&self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for Key {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
