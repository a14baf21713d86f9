//! # Console Session
//!
//! Holds the signed-in actor's permission snapshot for the admin console.
//!
//! ## Overview
//!
//! - **Store**: fetches the snapshot, caches it under a [`CachePolicy`],
//!   and swaps it atomically so readers never see a partial update
//! - **Client**: the snapshot endpoint's wire format and the HTTP fetcher
//! - **Retry**: bounded exponential backoff for transient failures
//! - **Config**: endpoint, timeout, retry budget and cache policy from the
//!   environment
//!
//! ## Lifecycle
//!
//! ```text
//! Empty --load()--> Ready --invalidate()--> Empty
//!   |                 |
//!   +--fetch error--> Failed (no snapshot, everything gated stays hidden)
//! ```
//!
//! A role or permission change confirmed by the server is reported with
//! [`SnapshotStore::notify_mutation`]; the next `load()` refetches. Grants
//! can be withdrawn locally ahead of confirmation with
//! [`SnapshotStore::revoke_locally`], never added.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use console_rbac::{Decision, Resolver};
//! use console_session::{SessionConfig, SnapshotStore};
//!
//! # async fn example() -> Result<(), console_session::StoreError> {
//! let store = SnapshotStore::from_config(&SessionConfig::from_env())?;
//! store.load().await?;
//!
//! let resolver = Resolver::new(store.clone());
//! if resolver.check("blog.create") == Decision::Allow {
//!     // show the "new post" button
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod retry;
pub mod store;

pub use client::{HttpSnapshotFetcher, KnownPermissions, SnapshotFetcher, SnapshotResponse};
pub use config::{CachePolicy, ConfigError, ServiceEndpoint, SessionConfig};
pub use error::{StoreError, StoreResult};
pub use retry::{with_retry_if, RetryConfig};
pub use store::{AuthorizationMutation, SnapshotStore, StoreStatus};
