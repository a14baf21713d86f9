//! # Permission Identifiers
//!
//! Dotted `resource.action` strings issued by the authorization server.
//! The action is everything after the last dot, so nested resources such
//! as `media.image.upload` parse as resource `media.image`, action `upload`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Action segment used by resource wildcards (`blog.*`).
pub const WILDCARD_ACTION: &str = "*";

/// Actions that grant every other action on their resource.
pub const MANAGE_ACTIONS: [&str; 2] = ["manage", "admin"];

/// A parsed `resource.action` permission identifier.
///
/// Identifiers are compared by exact string equality. Parsing never panics:
/// a string without a dot, with an empty resource or with an empty action
/// simply fails to parse.
///
/// # Example
///
/// ```
/// use console_rbac::PermissionIdentifier;
///
/// let id = PermissionIdentifier::parse("media.image.upload").unwrap();
/// assert_eq!(id.resource(), "media.image");
/// assert_eq!(id.action(), "upload");
/// assert_eq!(id.to_string(), "media.image.upload");
///
/// assert!(PermissionIdentifier::parse("noDotHere").is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionIdentifier {
    resource: String,
    action: String,
}

impl PermissionIdentifier {
    /// Build an identifier from its parts.
    ///
    /// Returns `None` when either part is empty or the action contains a dot.
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Option<Self> {
        let resource = resource.into();
        let action = action.into();
        if resource.is_empty() || action.is_empty() || action.contains('.') {
            return None;
        }
        Some(Self { resource, action })
    }

    /// Parse from the wire form (`"blog.create"`).
    ///
    /// # Returns
    ///
    /// `Some(PermissionIdentifier)` if well formed, `None` otherwise
    pub fn parse(s: &str) -> Option<Self> {
        let (resource, action) = s.rsplit_once('.')?;
        Self::new(resource, action)
    }

    /// The resource wildcard for `resource` (`"<resource>.*"`).
    pub fn wildcard(resource: impl Into<String>) -> Option<Self> {
        Self::new(resource, WILDCARD_ACTION)
    }

    /// The resource part (`"blog"` in `"blog.create"`).
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The action part (`"create"` in `"blog.create"`).
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Whether this is a resource wildcard (`"<resource>.*"`).
    pub fn is_wildcard(&self) -> bool {
        self.action == WILDCARD_ACTION
    }

    /// Whether this is a manage-bypass grant (`.manage` or `.admin`).
    pub fn is_manage(&self) -> bool {
        MANAGE_ACTIONS.contains(&self.action.as_str())
    }

    /// The resource followed by each dotted parent, innermost first.
    ///
    /// ```
    /// use console_rbac::PermissionIdentifier;
    ///
    /// let id = PermissionIdentifier::parse("media.image.upload").unwrap();
    /// assert_eq!(id.resource_scopes().collect::<Vec<_>>(), ["media.image", "media"]);
    /// ```
    pub fn resource_scopes(&self) -> impl Iterator<Item = &str> {
        std::iter::successors(Some(self.resource.as_str()), |scope| {
            scope.rsplit_once('.').map(|(parent, _)| parent)
        })
        .filter(|scope| !scope.is_empty())
    }

    /// The same resource with a different action.
    pub fn with_action(&self, action: &str) -> String {
        format!("{}.{}", self.resource, action)
    }
}

impl fmt::Display for PermissionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.action)
    }
}

impl std::str::FromStr for PermissionIdentifier {
    type Err = MalformedIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| MalformedIdentifier(s.to_string()))
    }
}

impl TryFrom<String> for PermissionIdentifier {
    type Error = MalformedIdentifier;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PermissionIdentifier> for String {
    fn from(id: PermissionIdentifier) -> Self {
        id.to_string()
    }
}

/// A permission string without the `resource.action` shape.
///
/// Only surfaced by the fallible conversions; resolution treats malformed
/// identifiers as a plain denial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedIdentifier(pub String);

impl fmt::Display for MalformedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed permission identifier: {:?}", self.0)
    }
}

impl std::error::Error for MalformedIdentifier {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_parsing() {
        let id = PermissionIdentifier::parse("blog.create").unwrap();
        assert_eq!(id.resource(), "blog");
        assert_eq!(id.action(), "create");

        let nested = PermissionIdentifier::parse("media.video.upload").unwrap();
        assert_eq!(nested.resource(), "media.video");
        assert_eq!(nested.action(), "upload");
    }

    #[test]
    fn test_malformed_identifiers() {
        assert!(PermissionIdentifier::parse("noDotHere").is_none());
        assert!(PermissionIdentifier::parse(".create").is_none());
        assert!(PermissionIdentifier::parse("blog.").is_none());
        assert!(PermissionIdentifier::parse("").is_none());
        assert!(PermissionIdentifier::parse(".").is_none());
        assert!("noDotHere".parse::<PermissionIdentifier>().is_err());
    }

    #[test]
    fn test_wildcard_and_manage() {
        let wildcard = PermissionIdentifier::wildcard("blog").unwrap();
        assert_eq!(wildcard.to_string(), "blog.*");
        assert!(wildcard.is_wildcard());

        assert!(PermissionIdentifier::parse("roles.manage").unwrap().is_manage());
        assert!(PermissionIdentifier::parse("roles.admin").unwrap().is_manage());
        assert!(!PermissionIdentifier::parse("roles.read").unwrap().is_manage());
    }

    #[test]
    fn test_resource_scopes() {
        let id = PermissionIdentifier::parse("media.image.upload").unwrap();
        assert_eq!(id.resource_scopes().collect::<Vec<_>>(), vec!["media.image", "media"]);

        let flat = PermissionIdentifier::parse("blog.create").unwrap();
        assert_eq!(flat.resource_scopes().collect::<Vec<_>>(), vec!["blog"]);
    }

    #[test]
    fn test_with_action() {
        let id = PermissionIdentifier::parse("real_estate.update").unwrap();
        assert_eq!(id.with_action("edit"), "real_estate.edit");
    }

    #[test]
    fn test_serde_as_string() {
        let id: PermissionIdentifier = serde_json::from_str("\"portfolio.update\"").unwrap();
        assert_eq!(id.resource(), "portfolio");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"portfolio.update\"");

        assert!(serde_json::from_str::<PermissionIdentifier>("\"portfolio\"").is_err());
    }
}
