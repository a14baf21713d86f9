//! # Permission Snapshots
//!
//! The point-in-time set of grants held by the current actor, and the
//! [`SnapshotSource`] seam through which decision logic reads it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::identifier::PermissionIdentifier;

/// The complete authorization state of the current actor.
///
/// A snapshot is never mutated in place. Refreshes and local revocations
/// build a new snapshot that replaces the old one wholesale.
///
/// # Example
///
/// ```
/// use console_rbac::PermissionSnapshot;
///
/// let snapshot = PermissionSnapshot::new(["blog.create", "blog.read"], false);
/// assert!(snapshot.is_granted("blog.create"));
/// assert!(!snapshot.is_granted("blog.update"));
/// assert!(!snapshot.is_superadmin());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSnapshot {
    /// Identifiers the actor holds.
    granted: BTreeSet<String>,
    /// Superadmins pass every check.
    is_superadmin: bool,
    /// Every identifier the server knows about.
    #[serde(default)]
    all_known: BTreeSet<String>,
    /// Identifiers every authenticated actor receives.
    #[serde(default)]
    base: BTreeSet<String>,
    /// Store-assigned install counter (0 for hand-built snapshots).
    #[serde(default)]
    version: u64,
}

impl PermissionSnapshot {
    /// Create a snapshot from granted identifiers.
    ///
    /// # Arguments
    ///
    /// * `granted` - The identifiers the actor holds
    /// * `is_superadmin` - Whether every check short-circuits to allow
    pub fn new<I, S>(granted: I, is_superadmin: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            granted: granted.into_iter().map(Into::into).collect(),
            is_superadmin,
            ..Default::default()
        }
    }

    /// The fail-closed snapshot: nothing granted, not a superadmin.
    pub fn deny_all() -> Self {
        Self::default()
    }

    /// A superadmin snapshot with no explicit grants.
    pub fn superadmin() -> Self {
        Self {
            is_superadmin: true,
            ..Default::default()
        }
    }

    /// Set the universe of known identifiers.
    pub fn with_known<I, S>(mut self, known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.all_known = known.into_iter().map(Into::into).collect();
        self
    }

    /// Set the base identifiers.
    pub fn with_base<I, S>(mut self, base: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base = base.into_iter().map(Into::into).collect();
        self
    }

    /// Stamp the snapshot with a store version.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Check whether an identifier is granted verbatim.
    ///
    /// This is the raw membership test. Use the resolver for wildcard,
    /// manage and synonym handling.
    pub fn is_granted(&self, identifier: &str) -> bool {
        self.granted.contains(identifier)
    }

    /// Whether the actor is a superadmin.
    pub fn is_superadmin(&self) -> bool {
        self.is_superadmin
    }

    /// The granted identifiers.
    pub fn granted(&self) -> &BTreeSet<String> {
        &self.granted
    }

    /// The universe of known identifiers.
    pub fn all_known(&self) -> &BTreeSet<String> {
        &self.all_known
    }

    /// The base identifiers.
    pub fn base(&self) -> &BTreeSet<String> {
        &self.base
    }

    /// The store version this snapshot was installed as.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether an identifier appears in the known universe.
    pub fn is_known(&self, identifier: &str) -> bool {
        self.all_known.contains(identifier)
    }

    /// Resources that appear in the known universe.
    ///
    /// Malformed entries in the universe are skipped.
    pub fn known_modules(&self) -> BTreeSet<String> {
        self.all_known
            .iter()
            .filter_map(|s| PermissionIdentifier::parse(s))
            .map(|id| id.resource().to_string())
            .collect()
    }

    /// Actions granted verbatim on `resource`.
    ///
    /// # Example
    ///
    /// ```
    /// use console_rbac::PermissionSnapshot;
    ///
    /// let snapshot = PermissionSnapshot::new(["blog.create", "blog.read", "media.upload"], false);
    /// assert_eq!(snapshot.granted_for("blog"), vec!["create", "read"]);
    /// ```
    pub fn granted_for(&self, resource: &str) -> Vec<&str> {
        self.granted
            .iter()
            .filter_map(|s| {
                let (r, action) = s.rsplit_once('.')?;
                (r == resource && !action.is_empty()).then_some(action)
            })
            .collect()
    }

    /// A copy of this snapshot with `identifiers` removed from the grants.
    ///
    /// Used for pessimistic updates: privileges can be withdrawn locally
    /// before the server confirms, never added. The superadmin flag and the
    /// version are kept; the store restamps the result when installing it.
    pub fn without<I, S>(&self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut next = self.clone();
        for identifier in identifiers {
            next.granted.remove(identifier.as_ref());
        }
        next
    }
}

/// Something that can hand out the current snapshot.
///
/// The snapshot store implements this; tests use a fixed
/// `Arc<PermissionSnapshot>`, or `None` to model a snapshot that is still
/// loading.
pub trait SnapshotSource {
    /// The current snapshot, or `None` while none is available.
    fn snapshot(&self) -> Option<Arc<PermissionSnapshot>>;
}

impl SnapshotSource for Arc<PermissionSnapshot> {
    fn snapshot(&self) -> Option<Arc<PermissionSnapshot>> {
        Some(Arc::clone(self))
    }
}

impl SnapshotSource for Option<Arc<PermissionSnapshot>> {
    fn snapshot(&self) -> Option<Arc<PermissionSnapshot>> {
        self.clone()
    }
}

impl<S: SnapshotSource + ?Sized> SnapshotSource for &S {
    fn snapshot(&self) -> Option<Arc<PermissionSnapshot>> {
        (**self).snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deny_all_is_closed() {
        let snapshot = PermissionSnapshot::deny_all();
        assert!(snapshot.granted().is_empty());
        assert!(!snapshot.is_superadmin());
    }

    #[test]
    fn test_known_modules() {
        let snapshot = PermissionSnapshot::deny_all().with_known([
            "blog.create",
            "blog.read",
            "media.image.upload",
            "broken",
        ]);

        let modules = snapshot.known_modules();
        assert_eq!(modules.len(), 2);
        assert!(modules.contains("blog"));
        assert!(modules.contains("media.image"));
        assert!(snapshot.is_known("blog.read"));
        assert!(!snapshot.is_known("blog.delete"));
    }

    #[test]
    fn test_without_only_removes() {
        let snapshot = PermissionSnapshot::new(["roles.read", "roles.update"], false).with_version(4);
        let revoked = snapshot.without(["roles.update", "roles.delete"]);

        assert!(revoked.is_granted("roles.read"));
        assert!(!revoked.is_granted("roles.update"));
        assert!(!revoked.is_granted("roles.delete"));
        assert_eq!(revoked.granted().len(), 1);
        assert_eq!(revoked.version(), 4);
        // original untouched
        assert!(snapshot.is_granted("roles.update"));
    }

    #[test]
    fn test_snapshot_sources() {
        let fixed = Arc::new(PermissionSnapshot::superadmin());
        assert!(fixed.snapshot().unwrap().is_superadmin());

        let loading: Option<Arc<PermissionSnapshot>> = None;
        assert!(loading.snapshot().is_none());

        let by_ref = &fixed;
        assert!(by_ref.snapshot().is_some());
    }
}
