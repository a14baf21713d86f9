//! # Console Routes
//!
//! Page-level access control for the admin console.
//!
//! ## Overview
//!
//! - **Rules**: an ordered table of path patterns, each naming the module and
//!   action a page needs, or restricting it to superadmins
//! - **Guard**: matches the current path and asks the resolver, producing
//!   `Loading`, `Denied` or `Allowed`
//! - **Self-service exceptions**: an explicit list of rules where an actor
//!   may open their own record without the rule's permission, even on a
//!   superadmin-only rule
//!
//! ## Matching
//!
//! ```text
//! "/admin/blog/12/edit/?tab=seo"
//!     -> normalize       "/admin/blog/12/edit"
//!     -> first match     rule "blog-edit" (blog.update)
//!     -> resolver        allow / deny
//! no rule matched        -> public
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use console_rbac::PermissionSnapshot;
//! use console_routes::{DenialReason, GuardState, RouteGuard};
//! use std::sync::Arc;
//!
//! let snapshot = Arc::new(PermissionSnapshot::new(["admins.read"], false));
//! let guard = RouteGuard::admin_console(snapshot).unwrap();
//!
//! match guard.route_decision("/admin/admins") {
//!     GuardState::Denied(denial) => assert_eq!(denial.reason, DenialReason::SuperadminOnly),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

pub mod error;
pub mod guard;
pub mod rules;

pub use error::{RouteError, RouteResult};
pub use guard::{
    ActorContext, AllowReason, Denial, DenialReason, GuardState, RouteGuard, SelfServiceException,
};
pub use rules::{admin_console_rules, normalize_path, RouteRule, RouteRuleDef, RouteRuleTable};
