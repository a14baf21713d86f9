//! # Permission Resolver
//!
//! Decides whether the actor may perform `resource.action` against a
//! snapshot. The free functions are the pure decision logic; [`Resolver`]
//! wraps an injected [`SnapshotSource`] and reports a tri-state
//! [`Decision`] so call sites can tell "still loading" from "denied".

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::actions::synonyms_of;
use crate::identifier::{PermissionIdentifier, MANAGE_ACTIONS, WILDCARD_ACTION};
use crate::snapshot::{PermissionSnapshot, SnapshotSource};

/// Outcome of a permission check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The actor holds the permission.
    Allow,
    /// The actor does not hold the permission.
    Deny,
    /// No snapshot is available yet.
    Indeterminate,
}

impl Decision {
    /// Map a resolved boolean onto `Allow`/`Deny`.
    pub fn from_allowed(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }

    /// Returns `true` only for `Allow`.
    ///
    /// `Indeterminate` is not allowed: gated UI stays hidden until the
    /// snapshot arrives.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Returns `true` for `Deny`.
    pub fn is_denied(&self) -> bool {
        matches!(self, Decision::Deny)
    }

    /// Returns `true` while the snapshot is unavailable.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Decision::Indeterminate)
    }
}

/// Resolve a single identifier against a snapshot.
///
/// Checks, in order:
/// 1. superadmin flag
/// 2. verbatim grant
/// 3. resource wildcard (`blog.*`), on the resource or any parent of it
/// 4. manage bypass (`blog.manage`, `blog.admin`), likewise
/// 5. any synonym of the action (`blog.edit` for `blog.update`)
///
/// A malformed identifier denies.
///
/// # Example
///
/// ```
/// use console_rbac::{evaluate, PermissionSnapshot};
///
/// let snapshot = PermissionSnapshot::new(["blog.create", "media.manage", "roles.edit"], false);
/// assert!(evaluate(&snapshot, "blog.create"));
/// assert!(!evaluate(&snapshot, "blog.update"));
/// assert!(evaluate(&snapshot, "media.upload"));
/// assert!(evaluate(&snapshot, "roles.update"));
/// assert!(!evaluate(&snapshot, "noDotHere"));
/// ```
pub fn evaluate(snapshot: &PermissionSnapshot, identifier: &str) -> bool {
    if snapshot.is_superadmin() {
        return true;
    }

    let Some(id) = PermissionIdentifier::parse(identifier) else {
        tracing::trace!(identifier, "Malformed permission identifier, denying");
        return false;
    };

    if snapshot.is_granted(identifier) {
        return true;
    }

    // `media.*` and `media.manage` also cover `media.image.upload`
    if id.resource_scopes().any(|scope| {
        snapshot.is_granted(&format!("{}.{}", scope, WILDCARD_ACTION))
            || MANAGE_ACTIONS
                .iter()
                .any(|action| snapshot.is_granted(&format!("{}.{}", scope, action)))
    }) {
        return true;
    }

    synonyms_of(id.action())
        .into_iter()
        .any(|action| snapshot.is_granted(&id.with_action(action)))
}

/// Allow if at least one identifier resolves. An empty list denies.
pub fn evaluate_any<I, S>(snapshot: &PermissionSnapshot, identifiers: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    identifiers
        .into_iter()
        .any(|id| evaluate(snapshot, id.as_ref()))
}

/// Allow only if every identifier resolves. An empty list denies.
pub fn evaluate_all<I, S>(snapshot: &PermissionSnapshot, identifiers: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = false;
    for id in identifiers {
        seen = true;
        if !evaluate(snapshot, id.as_ref()) {
            return false;
        }
    }
    seen
}

/// Results computed for one particular snapshot.
#[derive(Default)]
struct Memo {
    snapshot: Option<Arc<PermissionSnapshot>>,
    results: HashMap<String, bool>,
}

impl Memo {
    /// Drop cached results if `current` is not the snapshot they came from.
    fn align(&mut self, current: &Arc<PermissionSnapshot>) {
        let same = self.snapshot.as_ref().is_some_and(|cached| {
            cached.version() == current.version() && Arc::ptr_eq(cached, current)
        });
        if !same {
            self.results.clear();
            self.snapshot = Some(Arc::clone(current));
        }
    }
}

/// Permission checks over an injected snapshot source.
///
/// Single-identifier results are memoized per snapshot version; the memo
/// resets as soon as the source hands out a different snapshot.
///
/// # Example
///
/// ```
/// use console_rbac::{Decision, PermissionSnapshot, Resolver};
/// use std::sync::Arc;
///
/// let resolver = Resolver::new(Arc::new(PermissionSnapshot::new(["blog.read"], false)));
/// assert_eq!(resolver.check("blog.view"), Decision::Allow);
/// assert_eq!(resolver.all_of(["blog.read", "blog.delete"]), Decision::Deny);
///
/// let loading = Resolver::new(None::<Arc<PermissionSnapshot>>);
/// assert_eq!(loading.check("blog.read"), Decision::Indeterminate);
/// ```
pub struct Resolver<S> {
    source: S,
    memo: Mutex<Memo>,
}

impl<S: SnapshotSource> Resolver<S> {
    /// Create a resolver reading from `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            memo: Mutex::new(Memo::default()),
        }
    }

    /// The underlying snapshot source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// May the actor perform `identifier`?
    pub fn check(&self, identifier: &str) -> Decision {
        match self.source.snapshot() {
            Some(snapshot) => self.check_in(&snapshot, identifier),
            None => Decision::Indeterminate,
        }
    }

    /// Check `identifier` against a snapshot the caller already holds.
    ///
    /// Lets a caller that makes several checks for one decision keep them
    /// all on the same snapshot, even if the source swaps in between.
    pub fn check_in(&self, snapshot: &Arc<PermissionSnapshot>, identifier: &str) -> Decision {
        Decision::from_allowed(self.memoized(snapshot, identifier))
    }

    /// Allow if any of `identifiers` is allowed.
    pub fn any_of<I, T>(&self, identifiers: I) -> Decision
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let Some(snapshot) = self.source.snapshot() else {
            return Decision::Indeterminate;
        };
        Decision::from_allowed(
            identifiers
                .into_iter()
                .any(|id| self.memoized(&snapshot, id.as_ref())),
        )
    }

    /// Allow only if all of `identifiers` are allowed.
    pub fn all_of<I, T>(&self, identifiers: I) -> Decision
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let Some(snapshot) = self.source.snapshot() else {
            return Decision::Indeterminate;
        };
        let mut seen = false;
        for id in identifiers {
            seen = true;
            if !self.memoized(&snapshot, id.as_ref()) {
                return Decision::Deny;
            }
        }
        Decision::from_allowed(seen)
    }

    fn memoized(&self, snapshot: &Arc<PermissionSnapshot>, identifier: &str) -> bool {
        let mut memo = self.memo.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        memo.align(snapshot);
        if let Some(&allowed) = memo.results.get(identifier) {
            return allowed;
        }
        let allowed = evaluate(snapshot, identifier);
        memo.results.insert(identifier.to_string(), allowed);
        allowed
    }

    #[cfg(test)]
    fn memo_len(&self) -> usize {
        self.memo
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .results
            .len()
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for Resolver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("source", &self.source)
            .finish()
    }
}
