//! Idle slot representation.

use crate::handle::Handle;

/// One idle unit of pool capacity.
///
/// A pool starts with `capacity` empty slots. Acquiring an empty slot runs
/// the factory; acquiring a ready slot hands back the stored handle as-is.
pub enum Slot<R> {
    /// Capacity is available but no resource has been built for it
    Empty,

    /// A constructed handle waiting to be reused
    Ready(Handle<R>),
}

impl<R> Slot<R> {
    /// Whether this slot holds a constructed handle.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl<R> std::fmt::Debug for Slot<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Ready(handle) => f.debug_tuple("Ready").field(handle).finish(),
        }
    }
}
