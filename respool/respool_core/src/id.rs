//! Handle identifiers.
//!
//! A handle receives its identifier the first time a pool hands it out and
//! keeps it for the rest of its life. The identifier is the pool name
//! followed by a random UUID suffix, so identifiers never collide within a
//! process even when pools share a name.
//!
//! # Examples
//!
//! ```
//! use respool_core::id::HandleId;
//!
//! let id = HandleId::generate("primary");
//! assert!(id.as_str().starts_with("primary-"));
//! assert_eq!(id.pool_name(), "primary");
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Identifier of a pooled handle, `<poolName>-<suffix>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleId(String);

impl HandleId {
    /// Generate a fresh identifier for a handle issued by `pool_name`.
    pub fn generate(pool_name: &str) -> Self {
        Self(format!("{}-{}", pool_name, Uuid::new_v4().simple()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The pool-name prefix of this identifier.
    ///
    /// The suffix never contains `-`, so the prefix is everything before the
    /// last separator even when the pool name itself contains dashes.
    pub fn pool_name(&self) -> &str {
        self.0.rsplit_once('-').map_or(&self.0, |(name, _)| name)
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for HandleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for HandleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_is_unique() {
        let ids: HashSet<HandleId> = (0..1000).map(|_| HandleId::generate("db")).collect();
        assert_eq!(ids.len(), 1000, "Generated IDs should be unique");
    }

    #[test]
    fn test_prefix_and_suffix() {
        let id = HandleId::generate("read-replica");
        assert!(id.as_str().starts_with("read-replica-"));
        assert_eq!(id.pool_name(), "read-replica");

        // simple UUID form: 32 hex digits
        let suffix = &id.as_str()["read-replica-".len()..];
        assert_eq!(suffix.len(), 32);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_borrow_as_str_key() {
        let id = HandleId::generate("cache");
        let mut set = HashSet::new();
        set.insert(id.clone());
        assert!(set.contains(id.as_str()));
    }

    #[test]
    fn test_serde_transparent() {
        let id = HandleId::generate("cache");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }
}
