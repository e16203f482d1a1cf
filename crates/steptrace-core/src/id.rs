//! Stable ID newtypes for loaded script entities.
//!
//! IDs are distinct newtype wrappers over `u32`, so a `FunctionId` cannot be
//! used where a `NamespaceId` is expected.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Function identity within one namespace: the index of its definition in
/// declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

/// Namespace identity, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespaceId(pub u32);

static NEXT_NAMESPACE: AtomicU32 = AtomicU32::new(1);

impl NamespaceId {
    /// Allocates a fresh namespace id.
    pub fn next() -> Self {
        NamespaceId(NEXT_NAMESPACE.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_ids_are_unique() {
        let a = NamespaceId::next();
        let b = NamespaceId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn display_prints_inner_value() {
        assert_eq!(FunctionId(7).to_string(), "7");
        assert_eq!(NamespaceId(3).to_string(), "3");
    }

    #[test]
    fn function_id_serde_roundtrip() {
        let json = serde_json::to_string(&FunctionId(4)).unwrap();
        assert_eq!(json, "4");
        let back: FunctionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FunctionId(4));
    }
}
