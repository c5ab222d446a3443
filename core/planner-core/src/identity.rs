//! Authenticated identity: the user snapshot, its token, and the rules that
//! keep them consistent with the session and with what the server reveals.
//!
//! Authentication only returns a session id, so the snapshot starts out with
//! that id as a placeholder user id. The first owned resource the server
//! returns carries the real id; [`IdentityManager::reconcile`] swaps it in.
//! The server's ownership field always wins over the client's guess.
//!
//! Operations are single-flight from the caller's side: there is no internal
//! deduplication of concurrent identical calls.

use std::sync::{Arc, Mutex};

use planner_protocol::{
    AuthenticateRequest, AuthenticateResponse, ConfirmRequest, Endpoint, RegisterRequest,
    RegisterResponse, SuccessResponse, UserSnapshot,
};

use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::events::{IdentityEvent, IdentityListener};
use crate::lock;
use crate::session::SessionManager;
use crate::status::OperationStatus;
use crate::transport::ApiClient;

#[derive(Debug, Default)]
struct IdentityInner {
    user: Option<UserSnapshot>,
    token: Option<String>,
}

pub struct IdentityManager {
    api: ApiClient,
    credentials: Arc<CredentialStore>,
    session: Arc<SessionManager>,
    inner: Mutex<IdentityInner>,
    status: OperationStatus,
}

impl IdentityManager {
    pub fn new(
        api: ApiClient,
        credentials: Arc<CredentialStore>,
        session: Arc<SessionManager>,
    ) -> Self {
        Self {
            api,
            credentials,
            session,
            inner: Mutex::new(IdentityInner::default()),
            status: OperationStatus::new(),
        }
    }

    /// Rehydrates token and snapshot from the credential store. Only a
    /// complete pair is restored; half of one is ignored.
    pub fn initialize(&self) {
        let record = self.credentials.load();
        let mut inner = lock(&self.inner);
        match (record.token, record.user) {
            (Some(token), Some(user)) => {
                inner.token = Some(token);
                inner.user = Some(user);
            }
            (token, user) => {
                if token.is_some() || user.is_some() {
                    tracing::debug!("Ignoring partial persisted identity");
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Observers
    // ─────────────────────────────────────────────────────────────────────

    pub fn is_authenticated(&self) -> bool {
        let inner = lock(&self.inner);
        inner.user.is_some() && inner.token.is_some()
    }

    pub fn current_user(&self) -> Option<UserSnapshot> {
        lock(&self.inner).user.clone()
    }

    pub fn current_user_id(&self) -> Option<String> {
        lock(&self.inner).user.as_ref().map(|user| user.id.clone())
    }

    pub fn token(&self) -> Option<String> {
        lock(&self.inner).token.clone()
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
    // Operations
    // ─────────────────────────────────────────────────────────────────────

    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse> {
        self.status
            .track("register", async {
                let response: RegisterResponse = self
                    .api
                    .call(&self.session.context(), Endpoint::Register, request)
                    .await?;

                let token = if response.token.is_empty() {
                    response.user.clone()
                } else {
                    response.token.clone()
                };
                let user = UserSnapshot {
                    id: response.user.clone(),
                    username: request.username.clone(),
                    email: request.email.clone(),
                    confirmed: false,
                };
                self.set_identity(token, user);
                tracing::info!(username = %request.username, "Registered");
                Ok(response)
            })
            .await
    }

    /// Authenticates and adopts the returned session. The session id doubles
    /// as the provisional user id until reconciliation.
    pub async fn authenticate(&self, request: &AuthenticateRequest) -> Result<AuthenticateResponse> {
        self.status
            .track("authenticate", async {
                let response: AuthenticateResponse = self
                    .api
                    .call(&self.session.context(), Endpoint::Authenticate, request)
                    .await?;

                self.session.adopt(&response.session);
                let user = UserSnapshot {
                    id: response.session.clone(),
                    username: request.username.clone(),
                    email: String::new(),
                    confirmed: true,
                };
                self.set_identity(response.session.clone(), user);
                tracing::info!(username = %request.username, "Authenticated");
                Ok(response)
            })
            .await
    }

    /// Returns the server's verdict; the local snapshot's `confirmed` flag
    /// takes that value without re-fetching the user.
    pub async fn confirm_email(&self, request: &ConfirmRequest) -> Result<bool> {
        self.status
            .track("confirm email", async {
                let response: SuccessResponse = self
                    .api
                    .call(&self.session.context(), Endpoint::Confirm, request)
                    .await?;

                let updated = {
                    let mut inner = lock(&self.inner);
                    let IdentityInner { user, token } = &mut *inner;
                    match (user.as_mut(), token.as_ref()) {
                        (Some(user), Some(token)) => {
                            user.confirmed = response.success;
                            Some((token.clone(), user.clone()))
                        }
                        _ => None,
                    }
                };
                if let Some((token, user)) = updated {
                    self.persist(&token, &user);
                }
                Ok(response.success)
            })
            .await
    }

    /// Forgets the identity locally. Does not end the remote session.
    pub fn logout(&self) {
        {
            let mut inner = lock(&self.inner);
            inner.user = None;
            inner.token = None;
        }
        if let Err(err) = self.credentials.clear_identity() {
            tracing::warn!(error = %err, "Failed to clear persisted identity");
        }
        tracing::info!("Logged out");
    }

    /// Replaces the provisional user id with the server-attributed owner.
    /// Returns whether anything changed; a repeat with the same owner is a
    /// no-op.
    pub fn reconcile(&self, owner_id: &str) -> bool {
        if owner_id.is_empty() {
            return false;
        }

        let corrected = {
            let mut inner = lock(&self.inner);
            let IdentityInner { user, token } = &mut *inner;
            match user.as_mut() {
                Some(user) if user.id != owner_id => {
                    tracing::info!(
                        provisional_id = %user.id,
                        owner_id = %owner_id,
                        "Reconciling user id with server-attributed owner"
                    );
                    user.id = owner_id.to_string();
                    Some((token.clone(), user.clone()))
                }
                _ => None,
            }
        };

        match corrected {
            Some((Some(token), user)) => {
                self.persist(&token, &user);
                true
            }
            Some((None, _)) => true,
            None => false,
        }
    }

    fn set_identity(&self, token: String, user: UserSnapshot) {
        self.persist(&token, &user);
        let mut inner = lock(&self.inner);
        inner.token = Some(token);
        inner.user = Some(user);
    }

    fn persist(&self, token: &str, user: &UserSnapshot) {
        if let Err(err) = self.credentials.save_identity(token, user) {
            tracing::warn!(error = %err, "Failed to persist identity");
        }
    }
}

impl IdentityListener for IdentityManager {
    fn on_identity_event(&self, event: &IdentityEvent) {
        let IdentityEvent::OwnerIdentityObserved { owner_id } = event;
        self.reconcile(owner_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use chrono::TimeDelta;
    use serde_json::json;

    struct Fixture {
        transport: Arc<MockTransport>,
        credentials: Arc<CredentialStore>,
        session: Arc<SessionManager>,
        identity: IdentityManager,
    }

    fn fixture() -> Fixture {
        let transport = Arc::new(MockTransport::new());
        let credentials = Arc::new(CredentialStore::in_memory());
        let api = ApiClient::new(transport.clone());
        let session = Arc::new(SessionManager::new(
            api.clone(),
            credentials.clone(),
            TimeDelta::hours(24),
        ));
        let identity = IdentityManager::new(api, credentials.clone(), session.clone());
        Fixture {
            transport,
            credentials,
            session,
            identity,
        }
    }

    fn login_request() -> AuthenticateRequest {
        AuthenticateRequest {
            username: "alice".to_string(),
            password: "x".to_string(),
        }
    }

    #[tokio::test]
    async fn authenticate_uses_session_as_placeholder_id() {
        let f = fixture();
        f.transport
            .respond(Endpoint::Authenticate, json!({"session": "sess-1"}));

        f.identity.authenticate(&login_request()).await.unwrap();

        assert!(f.identity.is_authenticated());
        let user = f.identity.current_user().unwrap();
        assert_eq!(
            user,
            UserSnapshot {
                id: "sess-1".to_string(),
                username: "alice".to_string(),
                email: String::new(),
                confirmed: true,
            }
        );
        assert_eq!(f.session.session_id().as_deref(), Some(user.id.as_str()));
        let record = f.session.current_session().unwrap();
        assert_eq!(record.id, "sess-1");
        assert_eq!(record.user_id, "");

        let persisted = f.credentials.load();
        assert_eq!(persisted.user, Some(user));
        assert_eq!(persisted.token.as_deref(), Some("sess-1"));
        assert_eq!(persisted.session_id.as_deref(), Some("sess-1"));
    }

    #[tokio::test]
    async fn failed_authenticate_leaves_identity_untouched() {
        let f = fixture();
        f.transport
            .respond(Endpoint::Authenticate, json!({"error": "Invalid credentials"}));

        let err = f.identity.authenticate(&login_request()).await.unwrap_err();

        assert_eq!(err.to_string(), "Invalid credentials");
        assert!(!f.identity.is_authenticated());
        assert_eq!(f.session.session_id(), None);
        assert_eq!(
            f.identity.last_error().as_deref(),
            Some("Invalid credentials")
        );
        assert!(f.credentials.load().is_empty());
    }

    #[tokio::test]
    async fn register_creates_unconfirmed_snapshot() {
        let f = fixture();
        f.transport.respond(
            Endpoint::Register,
            json!({"user": "user-7", "token": "tok-7"}),
        );

        f.identity
            .register(&RegisterRequest {
                username: "bob".to_string(),
                password: "pw".to_string(),
                email: "bob@example.edu".to_string(),
            })
            .await
            .unwrap();

        let user = f.identity.current_user().unwrap();
        assert_eq!(user.id, "user-7");
        assert_eq!(user.email, "bob@example.edu");
        assert!(!user.confirmed);
        assert_eq!(f.identity.token().as_deref(), Some("tok-7"));
        assert_eq!(f.credentials.load().token.as_deref(), Some("tok-7"));
    }

    #[tokio::test]
    async fn register_without_token_falls_back_to_user_id() {
        let f = fixture();
        f.transport
            .respond(Endpoint::Register, json!({"user": "user-7"}));

        f.identity
            .register(&RegisterRequest {
                username: "bob".to_string(),
                password: "pw".to_string(),
                email: String::new(),
            })
            .await
            .unwrap();

        assert_eq!(f.identity.token().as_deref(), Some("user-7"));
    }

    #[tokio::test]
    async fn confirm_email_flips_flag_locally() {
        let f = fixture();
        f.transport.respond(
            Endpoint::Register,
            json!({"user": "user-7", "token": "tok-7"}),
        );
        f.transport
            .respond(Endpoint::Confirm, json!({"success": true}));
        f.identity
            .register(&RegisterRequest {
                username: "bob".to_string(),
                password: "pw".to_string(),
                email: "bob@example.edu".to_string(),
            })
            .await
            .unwrap();

        let confirmed = f
            .identity
            .confirm_email(&ConfirmRequest {
                username: "bob".to_string(),
                token: "123456".to_string(),
            })
            .await
            .unwrap();

        assert!(confirmed);
        assert!(f.identity.current_user().unwrap().confirmed);
        assert!(f.credentials.load().user.unwrap().confirmed);
        // No re-fetch of the user.
        assert_eq!(f.transport.call_count(), 2);
    }

    #[tokio::test]
    async fn reconcile_is_idempotent() {
        let f = fixture();
        f.transport
            .respond(Endpoint::Authenticate, json!({"session": "sess-1"}));
        f.identity.authenticate(&login_request()).await.unwrap();

        assert!(f.identity.reconcile("user-42"));
        let after_first = (f.identity.current_user(), f.credentials.load());

        assert!(!f.identity.reconcile("user-42"));
        assert_eq!((f.identity.current_user(), f.credentials.load()), after_first);
        assert_eq!(f.identity.current_user_id().as_deref(), Some("user-42"));
    }

    #[test]
    fn reconcile_without_identity_does_nothing() {
        let f = fixture();
        assert!(!f.identity.reconcile("user-42"));
        assert_eq!(f.identity.current_user(), None);
        assert!(f.credentials.load().is_empty());
    }

    #[test]
    fn initialize_requires_both_token_and_user() {
        let f = fixture();
        f.credentials.save_session_id("sess-1").unwrap();
        f.credentials
            .save(&crate::credentials::CredentialRecord {
                token: Some("tok".to_string()),
                user: None,
                session_id: None,
            })
            .unwrap();

        f.identity.initialize();
        assert!(!f.identity.is_authenticated());
        assert_eq!(f.identity.token(), None);
    }

    #[test]
    fn initialize_restores_complete_identity() {
        let f = fixture();
        let user = UserSnapshot {
            id: "user-42".to_string(),
            username: "alice".to_string(),
            email: String::new(),
            confirmed: true,
        };
        f.credentials.save_identity("tok", &user).unwrap();

        f.identity.initialize();
        assert!(f.identity.is_authenticated());
        assert_eq!(f.identity.current_user(), Some(user));
    }

    #[tokio::test]
    async fn logout_twice_is_safe() {
        let f = fixture();
        f.transport
            .respond(Endpoint::Authenticate, json!({"session": "sess-1"}));
        f.identity.authenticate(&login_request()).await.unwrap();

        f.identity.logout();
        f.identity.logout();

        assert!(!f.identity.is_authenticated());
        let record = f.credentials.load();
        assert_eq!(record.token, None);
        assert_eq!(record.user, None);
        // Ending the session is a separate responsibility.
        assert_eq!(record.session_id.as_deref(), Some("sess-1"));
        assert_eq!(f.transport.calls_to(Endpoint::EndSession).len(), 0);
    }
}
