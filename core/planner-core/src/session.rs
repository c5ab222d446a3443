//! Session lifecycle against the remote Session service.
//!
//! ```text
//! NoSession ──start/adopt──► Active ──end──► Ended
//!     ▲                        │ │
//!     └──probe fails/invalid───┘ └─(client-side expiry passes)──► Expired
//! ```
//!
//! The session id is the ambient credential: every request issued by any
//! component carries whatever id this manager holds when the operation
//! starts (see [`SessionManager::context`]).
//!
//! The server never reports an expiry. The client assumes a fixed validity
//! window (`session_ttl_hours`, 24 by default) from the moment of start/extend.
//!
//! Remote failures leave local state as it was, except for [`probe`], which
//! fails closed: any doubt about validity invalidates the local session.
//!
//! [`probe`]: SessionManager::probe

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use planner_protocol::{
    Endpoint, SessionIdRequest, SessionResponse, StartSessionRequest, SuccessResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::events::{IdentityEvent, IdentityListener};
use crate::lock;
use crate::status::OperationStatus;
use crate::transport::{ApiClient, RequestContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Active,
    Expired,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "_id")]
    pub id: String,
    /// Empty until an owned resource reveals the real user id.
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "expiryTime")]
    pub expiry: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SessionInner {
    session_id: Option<String>,
    /// Absent after a restart until the next start/extend: only the id is
    /// persisted.
    record: Option<SessionRecord>,
    ended: bool,
}

pub struct SessionManager {
    api: ApiClient,
    credentials: Arc<CredentialStore>,
    ttl: TimeDelta,
    inner: Mutex<SessionInner>,
    status: OperationStatus,
}

impl SessionManager {
    pub fn new(api: ApiClient, credentials: Arc<CredentialStore>, ttl: TimeDelta) -> Self {
        Self {
            api,
            credentials,
            ttl,
            inner: Mutex::new(SessionInner::default()),
            status: OperationStatus::new(),
        }
    }

    /// Rehydrates the session id persisted by a previous run.
    pub fn initialize(&self) {
        let session_id = self.credentials.load().session_id;
        let mut inner = lock(&self.inner);
        if inner.session_id.is_none() {
            inner.session_id = session_id.filter(|id| !id.is_empty());
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Observers
    // ─────────────────────────────────────────────────────────────────────

    pub fn session_id(&self) -> Option<String> {
        lock(&self.inner).session_id.clone()
    }

    pub fn current_session(&self) -> Option<SessionRecord> {
        lock(&self.inner).record.clone()
    }

    pub fn is_session_active(&self) -> bool {
        let inner = lock(&self.inner);
        inner.session_id.is_some() && inner.record.is_some()
    }

    pub fn state(&self) -> SessionState {
        self.state_at(Utc::now())
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        let inner = lock(&self.inner);
        match (&inner.session_id, &inner.record) {
            (None, _) if inner.ended => SessionState::Ended,
            (None, _) => SessionState::NoSession,
            (Some(_), Some(record)) if record.expiry <= now => SessionState::Expired,
            (Some(_), _) => SessionState::Active,
        }
    }

    /// The ambient credential for a request starting now.
    pub fn context(&self) -> RequestContext {
        RequestContext::with_session(lock(&self.inner).session_id.as_deref())
    }

    pub fn status(&self) -> &OperationStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status.is_loading()
    }

    pub fn last_error(&self) -> Option<String> {
        self.status.last_error()
    }

    pub fn clear_error(&self) {
        self.status.clear_error();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    pub async fn start(&self, user_id: &str) -> Result<String> {
        self.status
            .track("start session", async {
                let request = StartSessionRequest {
                    u: user_id.to_string(),
                };
                let response: SessionResponse = self
                    .api
                    .call(&self.context(), Endpoint::StartSession, &request)
                    .await?;
                self.install(&response.session, user_id);
                tracing::info!(session_id = %response.session, "Session started");
                Ok(response.session)
            })
            .await
    }

    /// Takes over a session id obtained elsewhere (authentication). The owner
    /// is unknown at this point, so `user_id` stays empty.
    pub fn adopt(&self, session_id: &str) {
        self.install(session_id, "");
        tracing::info!(session_id = %session_id, "Session adopted");
    }

    fn install(&self, session_id: &str, user_id: &str) {
        {
            let mut inner = lock(&self.inner);
            inner.session_id = Some(session_id.to_string());
            inner.record = Some(SessionRecord {
                id: session_id.to_string(),
                user_id: user_id.to_string(),
                expiry: Utc::now() + self.ttl,
            });
            inner.ended = false;
        }
        if let Err(err) = self.credentials.save_session_id(session_id) {
            tracing::warn!(error = %err, "Failed to persist session id");
        }
    }

    /// Ends the held session. Returns immediately, without a remote call,
    /// when no session id is held.
    pub async fn end(&self) -> Result<()> {
        let Some(session_id) = self.session_id() else {
            return Ok(());
        };

        self.status
            .track("end session", async {
                let request = SessionIdRequest {
                    s: session_id.clone(),
                };
                self.api
                    .call_ack(&self.context(), Endpoint::EndSession, &request)
                    .await?;

                let cleared = {
                    let mut inner = lock(&self.inner);
                    let still_current = inner.session_id.as_deref() == Some(session_id.as_str());
                    if still_current {
                        inner.session_id = None;
                        inner.record = None;
                        inner.ended = true;
                    }
                    still_current
                };
                if cleared {
                    if let Err(err) = self.credentials.clear_session_id() {
                        tracing::warn!(error = %err, "Failed to clear persisted session id");
                    }
                    tracing::info!(session_id = %session_id, "Session ended");
                } else {
                    tracing::debug!(session_id = %session_id, "Session rotated while ending");
                }
                Ok(())
            })
            .await
    }

    /// Asks the server whether the held session is still usable.
    ///
    /// Never fails: a transport error or an explicit "invalid" answer both
    /// clear the local session and return `false`.
    pub async fn probe(&self) -> bool {
        let Some(session_id) = self.session_id() else {
            return false;
        };

        let outcome = self
            .status
            .track("use session", async {
                let request = SessionIdRequest {
                    s: session_id.clone(),
                };
                let response: SuccessResponse = self
                    .api
                    .call(&self.context(), Endpoint::UseSession, &request)
                    .await?;
                Ok(response.success)
            })
            .await;

        match outcome {
            Ok(true) => true,
            Ok(false) | Err(_) => {
                self.invalidate(&session_id);
                false
            }
        }
    }

    fn invalidate(&self, session_id: &str) {
        let cleared = {
            let mut inner = lock(&self.inner);
            let still_current = inner.session_id.as_deref() == Some(session_id);
            if still_current {
                inner.session_id = None;
                inner.record = None;
                inner.ended = false;
            }
            still_current
        };
        if cleared {
            if let Err(err) = self.credentials.clear_session_id() {
                tracing::warn!(error = %err, "Failed to clear persisted session id");
            }
            tracing::info!(session_id = %session_id, "Session invalidated");
        }
    }

    /// Rotates the session id and restarts the validity window. Returns the
    /// new id, or `None` when there was no session to extend.
    pub async fn extend(&self) -> Result<Option<String>> {
        let Some(session_id) = self.session_id() else {
            return Ok(None);
        };

        self.status
            .track("extend session", async {
                let request = SessionIdRequest { s: session_id };
                let response: SessionResponse = self
                    .api
                    .call(&self.context(), Endpoint::ExtendSession, &request)
                    .await?;

                // Id and expiry change under one lock: no observer can pair
                // the old id with the new expiry.
                {
                    let mut inner = lock(&self.inner);
                    let user_id = inner
                        .record
                        .as_ref()
                        .map(|record| record.user_id.clone())
                        .unwrap_or_default();
                    inner.session_id = Some(response.session.clone());
                    inner.record = Some(SessionRecord {
                        id: response.session.clone(),
                        user_id,
                        expiry: Utc::now() + self.ttl,
                    });
                    inner.ended = false;
                }
                if let Err(err) = self.credentials.save_session_id(&response.session) {
                    tracing::warn!(error = %err, "Failed to persist rotated session id");
                }
                tracing::info!(session_id = %response.session, "Session extended");
                Ok(Some(response.session))
            })
            .await
    }

    /// Administrative bulk expiry on the server. Local state is untouched.
    pub async fn expire_all(&self) -> Result<bool> {
        self.status
            .track("expire sessions", async {
                let response: SuccessResponse = self
                    .api
                    .call(&self.context(), Endpoint::ExpireSessions, &json!({}))
                    .await?;
                Ok(response.success)
            })
            .await
    }
}

impl IdentityListener for SessionManager {
    fn on_identity_event(&self, event: &IdentityEvent) {
        let IdentityEvent::OwnerIdentityObserved { owner_id } = event;
        let mut inner = lock(&self.inner);
        if let Some(record) = inner.record.as_mut() {
            if record.user_id.is_empty() {
                tracing::info!(owner_id = %owner_id, "Back-filling session owner");
                record.user_id = owner_id.clone();
            }
        }
    }
}
