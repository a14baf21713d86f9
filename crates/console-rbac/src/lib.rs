//! # Console RBAC
//!
//! Client-side permission resolution for the admin console.
//!
//! ## Overview
//!
//! The console-rbac crate handles:
//! - **Identifiers**: dotted `resource.action` strings issued by the server
//! - **Actions**: the canonical synonym table (`edit` is `update`)
//! - **Snapshots**: the actor's point-in-time grants plus the superadmin flag
//! - **Resolution**: wildcard, manage-bypass and synonym aware checks
//! - **Upload policy**: which identifiers allow an upload in which context
//!
//! ## Resolution Order
//!
//! ```text
//! superadmin                 -> allow
//! "blog.update" granted      -> allow
//! "blog.*" granted           -> allow
//! "blog.manage"/"blog.admin" -> allow
//! "blog.edit" granted        -> allow (synonym)
//! otherwise                  -> deny
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use console_rbac::{Decision, PermissionSnapshot, Resolver, UploadContext, UploadGate};
//! use std::sync::Arc;
//!
//! let snapshot = Arc::new(PermissionSnapshot::new(["blog.create", "media.manage"], false));
//!
//! let resolver = Resolver::new(snapshot.clone());
//! assert_eq!(resolver.check("blog.create"), Decision::Allow);
//! assert_eq!(resolver.check("blog.update"), Decision::Deny);
//! assert_eq!(resolver.any_of(["blog.update", "blog.create"]), Decision::Allow);
//!
//! let uploads = UploadGate::new(snapshot);
//! assert!(uploads.can_upload_in_context(UploadContext::MediaLibrary).is_allowed());
//! ```

pub mod actions;
pub mod identifier;
pub mod resolver;
pub mod snapshot;
pub mod upload;

// Re-export main types for convenience
pub use actions::{synonyms_of, CanonicalAction};
pub use identifier::{MalformedIdentifier, PermissionIdentifier};
pub use resolver::{evaluate, evaluate_all, evaluate_any, Decision, Resolver};
pub use snapshot::{PermissionSnapshot, SnapshotSource};
pub use upload::{UploadContext, UploadGate, UploadPolicy};
