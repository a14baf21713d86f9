//! # Upload Policy
//!
//! Decides whether the actor may upload a file in a given usage context.
//! Uploading into the shared media library needs a media permission, while
//! uploading media embedded in another entity follows that entity's
//! create/update permissions.
//!
//! The context table is plain data: new contexts are registered on the
//! policy and never require changes to the resolver.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::resolver::{evaluate_any, Decision};
use crate::snapshot::{PermissionSnapshot, SnapshotSource};

/// Where an upload happens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UploadContext {
    /// The shared media library.
    MediaLibrary,
    /// Media attached to a portfolio entry.
    Portfolio,
    /// Media embedded in a blog post.
    Blog,
    /// Media attached to a real-estate listing.
    RealEstate,
}

impl UploadContext {
    /// Get the wire name of the context.
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadContext::MediaLibrary => "media_library",
            UploadContext::Portfolio => "portfolio",
            UploadContext::Blog => "blog",
            UploadContext::RealEstate => "real_estate",
        }
    }

    /// Parse a context from its wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "media_library" => Some(UploadContext::MediaLibrary),
            "portfolio" => Some(UploadContext::Portfolio),
            "blog" => Some(UploadContext::Blog),
            "real_estate" => Some(UploadContext::RealEstate),
            _ => None,
        }
    }

    /// Get all built-in contexts.
    pub fn all() -> Vec<Self> {
        vec![
            UploadContext::MediaLibrary,
            UploadContext::Portfolio,
            UploadContext::Blog,
            UploadContext::RealEstate,
        ]
    }
}

impl AsRef<str> for UploadContext {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Context name → identifiers of which any one grants the upload.
///
/// # Example
///
/// ```
/// use console_rbac::{PermissionSnapshot, UploadContext, UploadPolicy};
///
/// let policy = UploadPolicy::default();
/// let editor = PermissionSnapshot::new(["blog.update"], false);
///
/// assert!(policy.can_upload_in_context(&editor, UploadContext::Blog));
/// assert!(!policy.can_upload_in_context(&editor, UploadContext::MediaLibrary));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPolicy {
    rules: BTreeMap<String, Vec<String>>,
}

impl UploadPolicy {
    /// A policy with no contexts registered.
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    /// The admin console's contexts.
    pub fn admin_console() -> Self {
        let mut policy = Self::empty();
        policy
            .register(
                UploadContext::MediaLibrary,
                [
                    "media.upload",
                    "media.image.upload",
                    "media.video.upload",
                    "media.audio.upload",
                    "media.document.upload",
                ],
            )
            .register(UploadContext::Portfolio, ["portfolio.create", "portfolio.update"])
            .register(UploadContext::Blog, ["blog.create", "blog.update"])
            .register(
                UploadContext::RealEstate,
                ["real_estate.create", "real_estate.update"],
            );
        policy
    }

    /// Register or replace a context.
    ///
    /// # Arguments
    ///
    /// * `context` - Context name (a built-in [`UploadContext`] or any string)
    /// * `any_of` - Identifiers of which any one grants the upload
    pub fn register<C, I, S>(&mut self, context: C, any_of: I) -> &mut Self
    where
        C: AsRef<str>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.insert(
            context.as_ref().to_string(),
            any_of.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Identifiers relevant to `context`, if registered.
    pub fn requirements(&self, context: impl AsRef<str>) -> Option<&[String]> {
        self.rules.get(context.as_ref()).map(Vec::as_slice)
    }

    /// Registered context names.
    pub fn contexts(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// May the actor upload in `context`?
    ///
    /// Superadmins may upload anywhere; for everyone else an unregistered
    /// context denies.
    pub fn can_upload_in_context(
        &self,
        snapshot: &PermissionSnapshot,
        context: impl AsRef<str>,
    ) -> bool {
        if snapshot.is_superadmin() {
            return true;
        }
        match self.requirements(context.as_ref()) {
            Some(identifiers) => evaluate_any(snapshot, identifiers),
            None => {
                tracing::debug!(context = context.as_ref(), "Unregistered upload context");
                false
            }
        }
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::admin_console()
    }
}

/// Tri-state upload decisions over an injected snapshot source.
#[derive(Debug)]
pub struct UploadGate<S> {
    source: S,
    policy: UploadPolicy,
}

impl<S: SnapshotSource> UploadGate<S> {
    /// Gate uploads with the admin console's policy.
    pub fn new(source: S) -> Self {
        Self::with_policy(source, UploadPolicy::default())
    }

    /// Gate uploads with a custom policy.
    pub fn with_policy(source: S, policy: UploadPolicy) -> Self {
        Self { source, policy }
    }

    /// The policy in use.
    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// May the actor upload in `context`? `Indeterminate` while loading.
    pub fn can_upload_in_context(&self, context: impl AsRef<str>) -> Decision {
        match self.source.snapshot() {
            Some(snapshot) => {
                Decision::from_allowed(self.policy.can_upload_in_context(&snapshot, context))
            }
            None => Decision::Indeterminate,
        }
    }
}
