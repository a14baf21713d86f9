//! # Actions
//!
//! The canonical action synonym table.
//! Every spelling the console or the server uses for an action is listed
//! exactly once here, so the resolver, the route guard and the upload policy
//! all agree on what `edit` or `view` means.

use serde::{Deserialize, Serialize};

/// Canonical actions, each carrying the spellings considered equivalent.
///
/// `manage` and `admin` are deliberately absent: they are not synonyms of
/// any action but the manage-bypass, which grants every action on a resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalAction {
    /// View a single record or browse a listing.
    Read,

    /// Create new records.
    Create,

    /// Modify existing records.
    Update,

    /// Remove records.
    Delete,

    /// Upload or import files.
    Upload,

    /// Download or export data.
    Export,

    /// Publish content to the public site.
    Publish,
}

impl CanonicalAction {
    /// Get the canonical spelling.
    pub fn as_str(&self) -> &'static str {
        self.spellings()[0]
    }

    /// All spellings of this action, canonical spelling first.
    ///
    /// # Example
    ///
    /// ```
    /// use console_rbac::CanonicalAction;
    ///
    /// assert!(CanonicalAction::Update.spellings().contains(&"patch"));
    /// assert_eq!(CanonicalAction::Read.spellings()[0], "read");
    /// ```
    pub fn spellings(&self) -> &'static [&'static str] {
        match self {
            CanonicalAction::Read => &["read", "view", "list", "get", "index", "show"],
            CanonicalAction::Create => &["create", "add", "new", "store"],
            CanonicalAction::Update => &["update", "edit", "change", "put", "patch", "modify"],
            CanonicalAction::Delete => &["delete", "remove", "destroy"],
            CanonicalAction::Upload => &["upload", "import"],
            CanonicalAction::Export => &["export", "download"],
            CanonicalAction::Publish => &["publish"],
        }
    }

    /// Find the canonical action for a spelling.
    ///
    /// Matching is exact: permission identifiers are case-sensitive on the
    /// wire, and so is the synonym lookup.
    ///
    /// # Returns
    ///
    /// `Some(CanonicalAction)` if the spelling belongs to a group, `None` otherwise
    ///
    /// # Example
    ///
    /// ```
    /// use console_rbac::CanonicalAction;
    ///
    /// assert_eq!(CanonicalAction::parse("edit"), Some(CanonicalAction::Update));
    /// assert_eq!(CanonicalAction::parse("view"), Some(CanonicalAction::Read));
    /// assert_eq!(CanonicalAction::parse("manage"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|action| action.spellings().contains(&s))
    }

    /// Get all canonical actions.
    pub fn all() -> Vec<Self> {
        vec![
            CanonicalAction::Read,
            CanonicalAction::Create,
            CanonicalAction::Update,
            CanonicalAction::Delete,
            CanonicalAction::Upload,
            CanonicalAction::Export,
            CanonicalAction::Publish,
        ]
    }
}

/// Every spelling equivalent to `action`, including `action` itself.
///
/// Spellings outside the table only match themselves.
pub fn synonyms_of(action: &str) -> Vec<&str> {
    match CanonicalAction::parse(action) {
        Some(canonical) => canonical.spellings().to_vec(),
        None => vec![action],
    }
}
