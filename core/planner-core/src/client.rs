//! PlannerClient - the composition root.
//!
//! Builds exactly one of each component and hands them shared references to
//! each other: one transport, one credential store, one identity event bus,
//! then the session and identity managers and the four caches. Nothing is
//! looked up globally; whoever holds the client holds the whole graph.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use planner_core::{PlannerClient, RouteAccess};
//!
//! let client = PlannerClient::open(StorageConfig::default())?;
//! client.initialize();
//! if client.is_authenticated() {
//!     client.schedules().fetch_all().await?;
//! }
//! ```

use std::sync::Arc;

use crate::caches::{CourseCache, FilterCache, ScheduleCache, SectionCache};
use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::events::IdentityEvents;
use crate::guard::{guard, GuardDecision, RouteAccess};
use crate::identity::IdentityManager;
use crate::session::SessionManager;
use crate::storage::StorageConfig;
use crate::transport::{ApiClient, HttpTransport, Transport};

pub struct PlannerClient {
    config: ClientConfig,
    credentials: Arc<CredentialStore>,
    events: Arc<IdentityEvents>,
    session: Arc<SessionManager>,
    identity: Arc<IdentityManager>,
    courses: CourseCache,
    sections: SectionCache,
    schedules: ScheduleCache,
    filters: FilterCache,
}

impl PlannerClient {
    /// Production wiring: file-backed credentials under `storage` and an
    /// HTTP transport configured from `config.toml` plus the environment.
    pub fn open(storage: StorageConfig) -> Result<Self> {
        let config = ClientConfig::load(&storage)?;
        Self::open_with_config(storage, config)
    }

    pub fn open_with_config(storage: StorageConfig, config: ClientConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        tracing::debug!(base_url = %transport.base_url(), root = %storage.root().display(), "Opening planner client");
        let credentials = Arc::new(CredentialStore::open(&storage.credentials_file()));
        Ok(Self::with_transport(transport, credentials, config))
    }

    /// Wires the component graph around an arbitrary transport. Used by
    /// tests with a scripted transport and an in-memory credential store.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        credentials: Arc<CredentialStore>,
        config: ClientConfig,
    ) -> Self {
        let api = ApiClient::new(transport);
        let events = Arc::new(IdentityEvents::new());

        let session = Arc::new(SessionManager::new(
            api.clone(),
            credentials.clone(),
            config.session_ttl(),
        ));
        let identity = Arc::new(IdentityManager::new(
            api.clone(),
            credentials.clone(),
            session.clone(),
        ));
        events.subscribe(identity.clone());
        events.subscribe(session.clone());

        let courses = CourseCache::new(api.clone(), session.clone());
        let sections = SectionCache::new(api.clone(), session.clone());
        let filters = FilterCache::new(api.clone(), session.clone());
        let schedules = ScheduleCache::new(api, session.clone(), identity.clone(), events.clone());

        Self {
            config,
            credentials,
            events,
            session,
            identity,
            courses,
            sections,
            schedules,
            filters,
        }
    }

    /// Rehydrates the session and identity from persisted credentials.
    /// Must run before [`is_authenticated`](Self::is_authenticated) is trusted.
    pub fn initialize(&self) {
        self.session.initialize();
        self.identity.initialize();
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_authenticated()
    }

    /// Initializes, then decides whether a route with `access` may be shown.
    pub fn navigate(&self, access: RouteAccess) -> GuardDecision {
        self.initialize();
        let decision = guard(access, self.is_authenticated());
        if let GuardDecision::Redirect(path) = &decision {
            tracing::debug!(?access, redirect = %path, "Navigation redirected");
        }
        decision
    }

    /// Ends the remote session (best effort), then forgets the identity.
    /// The identity is cleared even when ending the session fails.
    pub async fn sign_out(&self) -> Result<()> {
        let ended = self.session.end().await;
        self.identity.logout();
        ended
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn events(&self) -> &IdentityEvents {
        &self.events
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn identity(&self) -> &IdentityManager {
        &self.identity
    }

    pub fn courses(&self) -> &CourseCache {
        &self.courses
    }

    pub fn sections(&self) -> &SectionCache {
        &self.sections
    }

    pub fn schedules(&self) -> &ScheduleCache {
        &self.schedules
    }

    pub fn filters(&self) -> &FilterCache {
        &self.filters
    }
}
