//! Route guard
//!
//! Matches a path against the rule table and asks the resolver whether the
//! actor may enter. The guard is a three-state machine: `Loading` until a
//! snapshot is available, then `Allowed` or `Denied`. Snapshot fetch errors
//! are not visible here; they simply keep the guard in `Loading`.

use console_rbac::{Resolver, SnapshotSource};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RouteError, RouteResult};
use crate::rules::{normalize_path, RouteRule, RouteRuleTable};

/// Why a route was allowed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AllowReason {
    /// No rule matched.
    Public,
    /// The matched rule requires no particular permission.
    Authenticated,
    /// The actor holds the required permission.
    Permission,
    /// The actor is a superadmin.
    Superadmin,
    /// The actor is editing their own record.
    SelfService,
}

/// Why a route was denied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenialReason {
    /// The route is reserved to superadmins.
    SuperadminOnly,
    /// The actor lacks the rule's permission.
    MissingPermission {
        /// The identifier that was checked (`module.action`).
        permission: String,
        /// The rule's module.
        module: String,
        /// The rule's action.
        action: String,
    },
}

/// A denied navigation, with enough detail for the access-denied view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Denial {
    /// The rule that matched.
    pub rule_id: String,
    /// The normalized path.
    pub path: String,
    /// What was missing.
    pub reason: DenialReason,
}

impl Denial {
    /// Stable reason code (`"superadmin-only"` or `"missing-permission"`).
    pub fn reason_code(&self) -> &'static str {
        match self.reason {
            DenialReason::SuperadminOnly => "superadmin-only",
            DenialReason::MissingPermission { .. } => "missing-permission",
        }
    }

    /// The missing permission, when the denial is a permission denial.
    pub fn missing_permission(&self) -> Option<&str> {
        match &self.reason {
            DenialReason::MissingPermission { permission, .. } => Some(permission),
            DenialReason::SuperadminOnly => None,
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            DenialReason::SuperadminOnly => {
                write!(f, "{} is restricted to superadmins (rule {})", self.path, self.rule_id)
            }
            DenialReason::MissingPermission { permission, .. } => write!(
                f,
                "{} requires permission {} (rule {})",
                self.path, permission, self.rule_id
            ),
        }
    }
}

/// Guard state for one navigation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GuardState {
    /// A rule matched but no snapshot is available yet.
    Loading,
    /// A rule matched and its check failed.
    Denied(Denial),
    /// No rule matched, or the matched rule's check passed.
    Allowed {
        /// Why entry was granted.
        reason: AllowReason,
    },
}

impl GuardState {
    /// Returns `true` if the children may render.
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardState::Allowed { .. })
    }

    /// Returns `true` if the access-denied view should render.
    pub fn is_denied(&self) -> bool {
        matches!(self, GuardState::Denied(_))
    }

    /// Returns `true` while waiting for the snapshot.
    pub fn is_loading(&self) -> bool {
        matches!(self, GuardState::Loading)
    }

    fn allowed(reason: AllowReason) -> Self {
        GuardState::Allowed { reason }
    }
}

/// Lets an actor through one rule when the path names their own record.
///
/// Exceptions are an explicit list; nothing is inferred from path shapes.
/// A listed rule opens for the actor's own record even when it is
/// superadmin-only or the actor lacks the rule's permission. Every other
/// record on that rule stays closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfServiceException {
    /// The rule the exception applies to.
    pub rule_id: String,
    /// Named capture group in the rule's pattern holding the record id.
    pub id_param: String,
}

impl SelfServiceException {
    /// Create an exception.
    pub fn new(rule_id: impl Into<String>, id_param: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            id_param: id_param.into(),
        }
    }

    /// The admin console's exceptions: administrators may edit their own
    /// profile without `admins.update`.
    pub fn admin_console() -> Vec<Self> {
        vec![Self::new("admin-profile-edit", "id")]
    }
}

/// Who is navigating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    /// The id of the actor's own record, when known.
    pub actor_id: Option<String>,
}

impl ActorContext {
    /// An actor with a known record id.
    pub fn new(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: Some(actor_id.into()),
        }
    }

    /// An actor whose record id is unknown.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Page-level access decisions.
///
/// # Example
///
/// ```
/// use console_rbac::PermissionSnapshot;
/// use console_routes::{GuardState, RouteGuard};
/// use std::sync::Arc;
///
/// let snapshot = Arc::new(PermissionSnapshot::new(["blog.read"], false));
/// let guard = RouteGuard::admin_console(snapshot).unwrap();
///
/// assert!(guard.route_decision("/admin/blog?page=3").is_allowed());
/// assert!(guard.route_decision("/admin/blog/create").is_denied());
/// assert!(guard.route_decision("/login").is_allowed());
/// ```
#[derive(Debug)]
pub struct RouteGuard<S> {
    resolver: Resolver<S>,
    table: RouteRuleTable,
    exceptions: Vec<SelfServiceException>,
    actor: ActorContext,
}

impl<S: SnapshotSource> RouteGuard<S> {
    /// A guard over `table` with no self-service exceptions.
    pub fn new(source: S, table: RouteRuleTable) -> Self {
        Self {
            resolver: Resolver::new(source),
            table,
            exceptions: Vec::new(),
            actor: ActorContext::default(),
        }
    }

    /// The admin console's built-in table and self-service exceptions.
    pub fn admin_console(source: S) -> RouteResult<Self> {
        Self::new(source, RouteRuleTable::admin_console()?)
            .with_self_service(SelfServiceException::admin_console())
    }

    /// Install self-service exceptions.
    ///
    /// # Errors
    ///
    /// Every exception must name a rule in the table whose pattern has the
    /// named capture group.
    pub fn with_self_service<I>(mut self, exceptions: I) -> RouteResult<Self>
    where
        I: IntoIterator<Item = SelfServiceException>,
    {
        let exceptions: Vec<_> = exceptions.into_iter().collect();
        for exception in &exceptions {
            let rule = self
                .table
                .get(&exception.rule_id)
                .ok_or_else(|| RouteError::UnknownRule(exception.rule_id.clone()))?;
            if !rule.has_capture(&exception.id_param) {
                return Err(RouteError::MissingCapture {
                    rule_id: exception.rule_id.clone(),
                    param: exception.id_param.clone(),
                });
            }
        }
        self.exceptions = exceptions;
        Ok(self)
    }

    /// Set the navigating actor.
    pub fn with_actor(mut self, actor: ActorContext) -> Self {
        self.actor = actor;
        self
    }

    /// The resolver the guard consults.
    pub fn resolver(&self) -> &Resolver<S> {
        &self.resolver
    }

    /// The rule table.
    pub fn table(&self) -> &RouteRuleTable {
        &self.table
    }

    /// Decide whether the actor may enter `path`.
    ///
    /// The snapshot is read once; every check of one navigation runs
    /// against that same snapshot.
    pub fn route_decision(&self, path: &str) -> GuardState {
        let normalized = normalize_path(path);
        let Some(rule) = self.table.match_normalized(&normalized) else {
            return GuardState::allowed(AllowReason::Public);
        };

        let Some(snapshot) = self.resolver.source().snapshot() else {
            return GuardState::Loading;
        };

        if snapshot.is_superadmin() {
            return GuardState::allowed(AllowReason::Superadmin);
        }

        if rule.requires_superadmin() {
            if self.is_own_record(rule, &normalized) {
                return GuardState::allowed(AllowReason::SelfService);
            }
            let denial = Denial {
                rule_id: rule.id().to_string(),
                path: normalized,
                reason: DenialReason::SuperadminOnly,
            };
            tracing::debug!(rule_id = %denial.rule_id, path = %denial.path, "Route restricted to superadmins");
            return GuardState::Denied(denial);
        }

        let (Some(module), Some(permission)) = (rule.required_module(), rule.required_permission())
        else {
            return GuardState::allowed(AllowReason::Authenticated);
        };

        if self.resolver.check_in(&snapshot, &permission).is_allowed() {
            return GuardState::allowed(AllowReason::Permission);
        }
        if self.is_own_record(rule, &normalized) {
            return GuardState::allowed(AllowReason::SelfService);
        }

        tracing::debug!(
            rule_id = rule.id(),
            path = %normalized,
            permission = %permission,
            "Route denied"
        );
        GuardState::Denied(Denial {
            rule_id: rule.id().to_string(),
            path: normalized,
            reason: DenialReason::MissingPermission {
                module: module.to_string(),
                action: rule.required_action().to_string(),
                permission,
            },
        })
    }

    /// Whether `rule` carries a self-service exception and the path names
    /// the actor's own record.
    fn is_own_record(&self, rule: &RouteRule, normalized_path: &str) -> bool {
        let Some(actor_id) = self.actor.actor_id.as_deref().filter(|id| !id.is_empty()) else {
            return false;
        };
        self.exceptions
            .iter()
            .filter(|exception| exception.rule_id == rule.id())
            .any(|exception| {
                rule.captures(normalized_path)
                    .and_then(|caps| caps.name(&exception.id_param).map(|m| m.as_str() == actor_id))
                    .unwrap_or(false)
            })
    }
}
