//! # Route Rules
//!
//! The ordered path-pattern → required-permission table that gates whole
//! pages. Rules are tried in table order and the first match is
//! authoritative; rules are never combined.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{RouteError, RouteResult};

/// Action required when a rule names a module but no action.
pub const DEFAULT_ACTION: &str = "read";

/// Declarative form of a route rule.
///
/// This is what the built-in table and JSON route tables are written in;
/// [`RouteRuleTable::new`] compiles the patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRuleDef {
    /// Stable rule id (referenced by self-service exceptions and denials).
    pub id: String,
    /// Regex tested against the normalized path. Anchor it yourself.
    pub path_pattern: String,
    /// Module whose permission is required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_module: Option<String>,
    /// Action required on the module (`read` when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_action: Option<String>,
    /// Only superadmins may enter, whatever their grants.
    #[serde(default)]
    pub require_superadmin: bool,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

impl RouteRuleDef {
    /// Start a rule definition.
    pub fn new(id: impl Into<String>, path_pattern: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path_pattern: path_pattern.into(),
            required_module: None,
            required_action: None,
            require_superadmin: false,
            description: String::new(),
        }
    }

    /// Require `module.action`.
    pub fn requires(mut self, module: impl Into<String>, action: impl Into<String>) -> Self {
        self.required_module = Some(module.into());
        self.required_action = Some(action.into());
        self
    }

    /// Require `module.read`.
    pub fn requires_module(mut self, module: impl Into<String>) -> Self {
        self.required_module = Some(module.into());
        self
    }

    /// Restrict the route to superadmins.
    pub fn superadmin_only(mut self) -> Self {
        self.require_superadmin = true;
        self
    }

    /// Attach a description.
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A compiled route rule.
#[derive(Debug, Clone)]
pub struct RouteRule {
    def: RouteRuleDef,
    pattern: Regex,
}

impl RouteRule {
    /// Compile a rule definition.
    pub fn compile(def: RouteRuleDef) -> RouteResult<Self> {
        let pattern = Regex::new(&def.path_pattern).map_err(|e| RouteError::InvalidPattern {
            rule_id: def.id.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { def, pattern })
    }

    /// The rule id.
    pub fn id(&self) -> &str {
        &self.def.id
    }

    /// The rule definition.
    pub fn definition(&self) -> &RouteRuleDef {
        &self.def
    }

    /// The module whose permission is required, if any.
    pub fn required_module(&self) -> Option<&str> {
        self.def.required_module.as_deref()
    }

    /// The required action, defaulting to `read`.
    pub fn required_action(&self) -> &str {
        self.def.required_action.as_deref().unwrap_or(DEFAULT_ACTION)
    }

    /// Whether only superadmins may enter.
    pub fn requires_superadmin(&self) -> bool {
        self.def.require_superadmin
    }

    /// The description.
    pub fn description(&self) -> &str {
        &self.def.description
    }

    /// The permission identifier this rule requires (`module.action`).
    ///
    /// `None` when the rule names no module: such a rule only needs an
    /// available snapshot (or superadmin, when flagged).
    pub fn required_permission(&self) -> Option<String> {
        self.required_module()
            .map(|module| format!("{}.{}", module, self.required_action()))
    }

    /// Test the rule against an already normalized path.
    pub fn is_match(&self, normalized_path: &str) -> bool {
        self.pattern.is_match(normalized_path)
    }

    /// Capture groups of the pattern against an already normalized path.
    pub fn captures<'p>(&self, normalized_path: &'p str) -> Option<Captures<'p>> {
        self.pattern.captures(normalized_path)
    }

    /// Whether the pattern declares a named capture group.
    pub fn has_capture(&self, name: &str) -> bool {
        self.pattern.capture_names().flatten().any(|n| n == name)
    }
}

/// Strip the query string and fragment, and trailing slashes except for root.
///
/// # Example
///
/// ```
/// use console_routes::normalize_path;
///
/// assert_eq!(normalize_path("/admin/blog/?page=2"), "/admin/blog");
/// assert_eq!(normalize_path("/"), "/");
/// assert_eq!(normalize_path(""), "/");
/// ```
pub fn normalize_path(path: &str) -> String {
    let end = path.find(|c| c == '?' || c == '#').unwrap_or(path.len());
    let trimmed = path[..end].trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// An ordered, first-match-wins list of route rules.
#[derive(Debug, Clone)]
pub struct RouteRuleTable {
    rules: Vec<RouteRule>,
}

impl RouteRuleTable {
    /// Compile a table from definitions, keeping their order.
    ///
    /// # Errors
    ///
    /// Fails on the first invalid pattern or duplicate id.
    pub fn new<I>(defs: I) -> RouteResult<Self>
    where
        I: IntoIterator<Item = RouteRuleDef>,
    {
        let mut seen = HashSet::new();
        let mut rules = Vec::new();
        for def in defs {
            if !seen.insert(def.id.clone()) {
                return Err(RouteError::DuplicateRuleId(def.id));
            }
            rules.push(RouteRule::compile(def)?);
        }
        Ok(Self { rules })
    }

    /// Decode a JSON array of rule definitions.
    ///
    /// # Example
    ///
    /// ```
    /// use console_routes::RouteRuleTable;
    ///
    /// let table = RouteRuleTable::from_json(r#"[
    ///     {"id": "reports", "path_pattern": "^/admin/reports(/.*)?$", "required_module": "reports"}
    /// ]"#).unwrap();
    /// let rule = table.first_match("/admin/reports/42?tab=raw").unwrap();
    /// assert_eq!(rule.required_permission().as_deref(), Some("reports.read"));
    /// ```
    pub fn from_json(json: &str) -> RouteResult<Self> {
        let defs: Vec<RouteRuleDef> = serde_json::from_str(json)?;
        Self::new(defs)
    }

    /// The admin console's built-in table.
    pub fn admin_console() -> RouteResult<Self> {
        Self::new(admin_console_rules())
    }

    /// The first rule matching `path`, after normalization.
    pub fn first_match(&self, path: &str) -> Option<&RouteRule> {
        let normalized = normalize_path(path);
        self.match_normalized(&normalized)
    }

    /// The first rule matching an already normalized path.
    pub fn match_normalized(&self, normalized_path: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|rule| rule.is_match(normalized_path))
    }

    /// Look a rule up by id.
    pub fn get(&self, id: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|rule| rule.id() == id)
    }

    /// The rules in table order.
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Get the count of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Rule definitions for the admin console, most specific first.
pub fn admin_console_rules() -> Vec<RouteRuleDef> {
    vec![
        // Administrators
        // Superadmins edit any account; others only their own (self-service)
        RouteRuleDef::new("admin-profile-edit", r"^/admin/admins/(?P<id>[^/]+)/edit$")
            .requires("admins", "update")
            .superadmin_only()
            .described("Edit an administrator account"),
        RouteRuleDef::new("admins", r"^/admin/admins(/.*)?$")
            .requires_module("admins")
            .superadmin_only()
            .described("Administrator accounts"),
        // Roles and permissions
        RouteRuleDef::new("permissions", r"^/admin/permissions(/.*)?$")
            .requires_module("permissions")
            .superadmin_only()
            .described("Permission table"),
        RouteRuleDef::new("roles-create", r"^/admin/roles/create$")
            .requires("roles", "create")
            .described("Create a role"),
        RouteRuleDef::new("roles-edit", r"^/admin/roles/[^/]+/edit$")
            .requires("roles", "update")
            .described("Edit a role and its permissions"),
        RouteRuleDef::new("roles", r"^/admin/roles(/.*)?$")
            .requires_module("roles")
            .described("Roles"),
        // Content
        RouteRuleDef::new("blog-create", r"^/admin/blog/create$")
            .requires("blog", "create")
            .described("Write a blog post"),
        RouteRuleDef::new("blog-edit", r"^/admin/blog/[^/]+/edit$")
            .requires("blog", "update")
            .described("Edit a blog post"),
        RouteRuleDef::new("blog", r"^/admin/blog(/.*)?$")
            .requires_module("blog")
            .described("Blog posts"),
        RouteRuleDef::new("portfolio-create", r"^/admin/portfolio/create$")
            .requires("portfolio", "create")
            .described("Add a portfolio entry"),
        RouteRuleDef::new("portfolio-edit", r"^/admin/portfolio/[^/]+/edit$")
            .requires("portfolio", "update")
            .described("Edit a portfolio entry"),
        RouteRuleDef::new("portfolio", r"^/admin/portfolio(/.*)?$")
            .requires_module("portfolio")
            .described("Portfolio"),
        RouteRuleDef::new("real-estate-create", r"^/admin/real-estate/create$")
            .requires("real_estate", "create")
            .described("Add a real-estate listing"),
        RouteRuleDef::new("real-estate-edit", r"^/admin/real-estate/[^/]+/edit$")
            .requires("real_estate", "update")
            .described("Edit a real-estate listing"),
        RouteRuleDef::new("real-estate", r"^/admin/real-estate(/.*)?$")
            .requires_module("real_estate")
            .described("Real-estate listings"),
        // Media
        RouteRuleDef::new("media-upload", r"^/admin/media/upload$")
            .requires("media", "upload")
            .described("Upload to the media library"),
        RouteRuleDef::new("media", r"^/admin/media(/.*)?$")
            .requires_module("media")
            .described("Media library"),
        // Settings
        RouteRuleDef::new("settings", r"^/admin/settings(/.*)?$")
            .requires("settings", "manage")
            .described("Site settings"),
        // Everything else under /admin only needs a signed-in actor
        RouteRuleDef::new("admin-area", r"^/admin(/.*)?$").described("Dashboard and other admin pages"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/admin/blog"), "/admin/blog");
        assert_eq!(normalize_path("/admin/blog/"), "/admin/blog");
        assert_eq!(normalize_path("/admin/blog//"), "/admin/blog");
        assert_eq!(normalize_path("/admin/blog?page=2&q=x"), "/admin/blog");
        assert_eq!(normalize_path("/admin/blog/?page=2"), "/admin/blog");
        assert_eq!(normalize_path("/admin/blog#top"), "/admin/blog");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/?next=/admin"), "/");
        assert_eq!(normalize_path(""), "/");
    }

    #[test]
    fn test_default_action_is_read() {
        let rule = RouteRule::compile(RouteRuleDef::new("blog", "^/admin/blog$").requires_module("blog"))
            .unwrap();
        assert_eq!(rule.required_action(), "read");
        assert_eq!(rule.required_permission().as_deref(), Some("blog.read"));

        let open = RouteRule::compile(RouteRuleDef::new("open", "^/admin$")).unwrap();
        assert_eq!(open.required_permission(), None);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = RouteRuleTable::new(vec![RouteRuleDef::new("bad", "^/admin/(unclosed$")]).unwrap_err();
        assert!(matches!(err, RouteError::InvalidPattern { ref rule_id, .. } if rule_id == "bad"));
        assert_eq!(err.error_code(), "INVALID_PATTERN");
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = RouteRuleTable::new(vec![
            RouteRuleDef::new("blog", "^/a$"),
            RouteRuleDef::new("blog", "^/b$"),
        ])
        .unwrap_err();
        assert!(matches!(err, RouteError::DuplicateRuleId(ref id) if id == "blog"));
    }

    #[test]
    fn test_first_match_wins() {
        let broad = RouteRuleDef::new("reports", r"^/admin/reports(/.*)?$").requires_module("reports");
        let narrow = RouteRuleDef::new("reports-export", r"^/admin/reports/export$")
            .requires("reports", "export");

        let broad_first = RouteRuleTable::new(vec![broad.clone(), narrow.clone()]).unwrap();
        assert_eq!(broad_first.first_match("/admin/reports/export").unwrap().id(), "reports");

        let narrow_first = RouteRuleTable::new(vec![narrow, broad]).unwrap();
        assert_eq!(
            narrow_first.first_match("/admin/reports/export").unwrap().id(),
            "reports-export"
        );
    }

    #[test]
    fn test_no_match_is_none() {
        let table = RouteRuleTable::admin_console().unwrap();
        assert!(table.first_match("/login").is_none());
        assert!(table.first_match("/").is_none());
        assert!(table.first_match("/administrators").is_none());
    }

    #[test]
    fn test_admin_console_table() {
        let table = RouteRuleTable::admin_console().unwrap();
        let expect = |path: &str, id: &str, permission: Option<&str>| {
            let rule = table.first_match(path).unwrap();
            assert_eq!(rule.id(), id, "path {}", path);
            assert_eq!(rule.required_permission().as_deref(), permission, "path {}", path);
        };

        expect("/admin/blog", "blog", Some("blog.read"));
        expect("/admin/blog/create", "blog-create", Some("blog.create"));
        expect("/admin/blog/12/edit/", "blog-edit", Some("blog.update"));
        expect("/admin/real-estate/create", "real-estate-create", Some("real_estate.create"));
        expect("/admin/media/upload", "media-upload", Some("media.upload"));
        expect("/admin/roles/create", "roles-create", Some("roles.create"));
        expect("/admin/admins/7/edit", "admin-profile-edit", Some("admins.update"));
        expect("/admin/admins", "admins", Some("admins.read"));
        expect("/admin", "admin-area", None);
        expect("/admin/", "admin-area", None);

        assert!(table.get("admins").unwrap().requires_superadmin());
        assert!(table.get("admin-profile-edit").unwrap().requires_superadmin());
        assert!(table.get("admin-profile-edit").unwrap().has_capture("id"));
    }

    #[test]
    fn test_from_json_defaults() {
        let table = RouteRuleTable::from_json(
            r#"[{"id": "admins", "path_pattern": "^/admin/admins$", "required_module": "admin", "require_superadmin": true}]"#,
        )
        .unwrap();
        let rule = table.get("admins").unwrap();
        assert!(rule.requires_superadmin());
        assert_eq!(rule.required_action(), "read");
        assert_eq!(rule.description(), "");

        assert!(matches!(
            RouteRuleTable::from_json("{not json"),
            Err(RouteError::Json(_))
        ));
    }
}
