//! Entity identifiers.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Identifier of an entity in the live world or the replay world.
///
/// Zero is reserved for "no entity".
#[repr(transparent)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable, Serialize,
    Deserialize,
)]
pub struct EntityId(pub u32);

impl EntityId {
    /// The "no entity" id
    pub const NONE: Self = Self(0);

    /// Creates a new id
    #[must_use]
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw id value
    #[must_use]
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// True for [`EntityId::NONE`]
    #[must_use]
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_id() {
        assert!(EntityId::NONE.is_none());
        assert!(!EntityId::new(7).is_none());
        assert_eq!(EntityId::default(), EntityId::NONE);
    }

    #[test]
    fn test_display() {
        assert_eq!(EntityId::new(42).to_string(), "#42");
    }
}
