//! Shared-ownership handles to engine resources.
//!
//! A handle stored in a packet keeps the resource alive. Copying a packet
//! range into a highlight adds references, dropping a frame releases them.
//! No manual add-ref/release bookkeeping exists anywhere in the crate.

use std::sync::Arc;

/// Kind of engine resource
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Static or skinned geometry
    Geometry,
    /// Material
    Material,
}

#[derive(Debug)]
struct ResourceInfo {
    kind: ResourceKind,
    id: u32,
}

/// Reference-counted handle to an engine resource.
///
/// Two handles compare equal when they name the same resource.
#[derive(Clone, Debug)]
pub struct ResourceHandle(Arc<ResourceInfo>);

impl ResourceHandle {
    /// Creates a handle for the resource `id` of `kind`.
    ///
    /// Id 0 is reserved for "no resource" on the wire.
    #[must_use]
    pub fn new(kind: ResourceKind, id: u32) -> Self {
        Self(Arc::new(ResourceInfo { kind, id }))
    }

    /// Resource kind
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.0.kind
    }

    /// Host resource id
    #[must_use]
    pub fn id(&self) -> u32 {
        self.0.id
    }

    /// Number of live references to this allocation
    #[must_use]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl PartialEq for ResourceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind == other.0.kind && self.0.id == other.0.id
    }
}

impl Eq for ResourceHandle {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_counting() {
        let handle = ResourceHandle::new(ResourceKind::Geometry, 12);
        assert_eq!(handle.ref_count(), 1);
        let copies: Vec<ResourceHandle> = (0..3).map(|_| handle.clone()).collect();
        assert_eq!(handle.ref_count(), 4);
        drop(copies);
        assert_eq!(handle.ref_count(), 1);
    }

    #[test]
    fn test_equality_by_identity() {
        let a = ResourceHandle::new(ResourceKind::Material, 5);
        let b = ResourceHandle::new(ResourceKind::Material, 5);
        let c = ResourceHandle::new(ResourceKind::Geometry, 5);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
