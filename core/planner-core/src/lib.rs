//! # planner-core
//!
//! Client-side state core for the course planner: who is signed in, which
//! session they hold, and cached copies of the courses, sections, schedules
//! and filters the server owns.
//!
//! ## Design Principles
//!
//! - **Server first**: mutations touch local state only after the server
//!   confirms them. Nothing is applied speculatively.
//! - **Explicit wiring**: every component is constructed once by
//!   [`PlannerClient`] and receives its collaborators by reference.
//! - **Explicit credentials**: the session id travels in a [`RequestContext`]
//!   snapshotted when an operation starts.
//! - **Graceful degradation**: missing or corrupt credential files load as
//!   empty; failed writes are logged, not fatal.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use planner_core::{PlannerClient, StorageConfig};
//!
//! let client = PlannerClient::open(StorageConfig::default())?;
//! client.initialize();
//! client.identity().authenticate(&request).await?;
//! client.schedules().create("Fall").await?;
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod caches;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod guard;
pub mod identity;
pub mod session;
pub mod status;
pub mod storage;
pub mod transport;

#[cfg(test)]
mod integration_tests;

pub use caches::{CourseCache, FilterCache, Keyed, ResourceList, ScheduleCache, SectionCache};
pub use client::PlannerClient;
pub use config::ClientConfig;
pub use credentials::{CredentialRecord, CredentialStore, KeyValueStore};
pub use error::{PlannerError, Result, StatusKind};
pub use events::{IdentityEvent, IdentityEvents, IdentityListener};
pub use guard::{guard, GuardDecision, RouteAccess};
pub use identity::IdentityManager;
pub use session::{SessionManager, SessionRecord, SessionState};
pub use status::OperationStatus;
pub use storage::StorageConfig;
pub use transport::{ApiClient, HttpTransport, RequestContext, Transport};
#[cfg(any(test, feature = "test-helpers"))]
pub use transport::{MockTransport, RecordedCall};

/// Locks `mutex`, recovering the data if a previous holder panicked. Every
/// critical section here leaves its state consistent before it can panic.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
