//! Cross-component coverage: identity, session and caches wired together
//! through `PlannerClient` the way the CLI uses them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use planner_protocol::{AuthenticateRequest, Endpoint, UserSnapshot};
use serde_json::{json, Value};
use tempfile::tempdir;

use crate::client::PlannerClient;
use crate::config::ClientConfig;
use crate::credentials::{CredentialRecord, CredentialStore};
use crate::session::SessionState;
use crate::transport::MockTransport;

fn wired() -> (Arc<MockTransport>, Arc<CredentialStore>, PlannerClient) {
    let transport = Arc::new(MockTransport::new());
    let credentials = Arc::new(CredentialStore::in_memory());
    let client =
        PlannerClient::with_transport(transport.clone(), credentials.clone(), ClientConfig::default());
    client.initialize();
    (transport, credentials, client)
}

fn alice_login() -> AuthenticateRequest {
    AuthenticateRequest {
        username: "alice".to_string(),
        password: "x".to_string(),
    }
}

fn schedule_body(id: &str, owner: &str, name: &str) -> Value {
    json!({"s": {"id": id, "owner": owner, "name": name, "sectionIds": []}})
}

async fn signed_in() -> (Arc<MockTransport>, Arc<CredentialStore>, PlannerClient) {
    let (transport, credentials, client) = wired();
    transport.respond(Endpoint::Authenticate, json!({"session": "sess-1"}));
    client.identity().authenticate(&alice_login()).await.unwrap();
    (transport, credentials, client)
}

#[test]
fn test_credential_save_then_load_round_trips() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("credentials.json");
    let records = [
        CredentialRecord::default(),
        CredentialRecord {
            token: Some("tok".to_string()),
            user: Some(UserSnapshot {
                id: "user-42".to_string(),
                username: "alice".to_string(),
                email: "alice@example.edu".to_string(),
                confirmed: false,
            }),
            session_id: Some("sess-1".to_string()),
        },
        CredentialRecord {
            token: None,
            user: None,
            session_id: Some("sess-2".to_string()),
        },
    ];

    let store = CredentialStore::open(&path);
    for record in &records {
        store.save(record).unwrap();
        assert_eq!(&store.load(), record);
        // A fresh handle on the same file sees the same record.
        assert_eq!(&CredentialStore::open(&path).load(), record);
    }
}

#[tokio::test]
async fn test_authenticate_adopts_session_as_provisional_identity() {
    let (transport, credentials, client) = signed_in().await;

    assert!(client.is_authenticated());
    let user = client.identity().current_user().unwrap();
    assert_eq!(client.session().session_id().as_deref(), Some(user.id.as_str()));
    assert_eq!(credentials.load().session_id.as_deref(), Some("sess-1"));
    assert_eq!(
        transport.calls_to(Endpoint::Authenticate)[0].body,
        json!({"username": "alice", "password": "x"})
    );
}

#[tokio::test]
async fn test_authenticate_then_create_schedule_reconciles_identity() {
    let (transport, credentials, client) = wired();
    transport.respond(Endpoint::Authenticate, json!({"session": "sess-1"}));

    let before = Utc::now();
    client.identity().authenticate(&alice_login()).await.unwrap();
    let after = Utc::now();

    assert_eq!(
        client.identity().current_user(),
        Some(UserSnapshot {
            id: "sess-1".to_string(),
            username: "alice".to_string(),
            email: String::new(),
            confirmed: true,
        })
    );
    let record = client.session().current_session().unwrap();
    assert_eq!(record.id, "sess-1");
    assert_eq!(record.user_id, "");
    assert!(record.expiry >= before + TimeDelta::hours(24));
    assert!(record.expiry <= after + TimeDelta::hours(24));

    transport.respond(
        Endpoint::CreateSchedule,
        schedule_body("sch-1", "user-42", "Fall"),
    );
    client.schedules().create("Fall").await.unwrap();

    // The request still carried the provisional id and the ambient session.
    let call = &transport.calls_to(Endpoint::CreateSchedule)[0];
    assert_eq!(call.body, json!({"userId": "sess-1", "name": "Fall"}));
    assert_eq!(call.session_id.as_deref(), Some("sess-1"));

    assert_eq!(client.identity().current_user_id().as_deref(), Some("user-42"));
    assert_eq!(client.session().current_session().unwrap().user_id, "user-42");
    assert_eq!(client.schedules().count(), 1);
    let mine: Vec<_> = client
        .schedules()
        .user_schedules()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(mine, vec!["sch-1"]);
    assert_eq!(credentials.load().user.unwrap().id, "user-42");
}

#[tokio::test]
async fn test_reconciliation_is_idempotent() {
    let (transport, credentials, client) = signed_in().await;
    transport.respond(Endpoint::CreateSchedule, schedule_body("sch-1", "user-42", "Fall"));
    transport.respond(Endpoint::CreateSchedule, schedule_body("sch-2", "user-42", "Spring"));

    client.schedules().create("Fall").await.unwrap();
    let user_after_first = client.identity().current_user();
    let session_after_first = client.session().current_session();
    let persisted_after_first = credentials.load();

    client.schedules().create("Spring").await.unwrap();

    assert_eq!(client.identity().current_user(), user_after_first);
    assert_eq!(client.session().current_session(), session_after_first);
    assert_eq!(credentials.load(), persisted_after_first);
    assert!(!client.identity().reconcile("user-42"));
}

#[tokio::test]
async fn test_reconciled_id_survives_unrelated_operations() {
    let (transport, _credentials, client) = signed_in().await;
    transport.respond(Endpoint::CreateSchedule, schedule_body("sch-1", "user-42", "Fall"));
    client.schedules().create("Fall").await.unwrap();

    transport.respond(Endpoint::GetAllSchedules, json!([]));
    transport.respond(Endpoint::UseSession, json!({"success": true}));
    transport.respond(Endpoint::ExtendSession, json!({"session": "sess-2"}));
    transport.respond(Endpoint::GetAllCourses, json!([]));
    client.schedules().fetch_all().await.unwrap();
    assert!(client.session().probe().await);
    client.session().extend().await.unwrap();
    client.courses().fetch_all().await.unwrap();
    client.initialize();

    assert_eq!(client.identity().current_user_id().as_deref(), Some("user-42"));
    let record = client.session().current_session().unwrap();
    assert_eq!(record.id, "sess-2");
    assert_eq!(record.user_id, "user-42");
}

#[tokio::test]
async fn test_every_cache_resets_on_malformed_list() {
    let (transport, _credentials, client) = signed_in().await;
    let malformed = json!({"unexpected": true});
    transport.respond(Endpoint::GetAllCourses, malformed.clone());
    transport.respond(Endpoint::GetAllSections, malformed.clone());
    transport.respond(Endpoint::GetAllSchedules, malformed.clone());
    transport.respond(Endpoint::GetFilteredCourses, malformed.clone());
    transport.respond(Endpoint::GetActiveTags, malformed);

    client.courses().fetch_all().await.unwrap();
    client.sections().fetch_all().await.unwrap();
    client.schedules().fetch_all().await.unwrap();
    client.filters().fetch_filtered_courses().await.unwrap();
    assert!(client.filters().last_error().is_some());
    client.filters().fetch_active_tags().await.unwrap();

    assert_eq!(client.courses().count(), 0);
    assert!(client.courses().last_error().is_some());
    assert_eq!(client.sections().count(), 0);
    assert!(client.sections().last_error().is_some());
    assert_eq!(client.schedules().count(), 0);
    assert!(client.schedules().last_error().is_some());
    assert_eq!(client.filters().filtered_course_count(), 0);
    assert_eq!(client.filters().active_tag_count(), 0);
    assert!(client.filters().last_error().is_some());
}

#[tokio::test]
async fn test_end_without_session_makes_no_call() {
    let (transport, _credentials, client) = wired();

    client.session().end().await.unwrap();

    assert_eq!(transport.call_count(), 0);
    assert_eq!(client.session().state(), SessionState::NoSession);
}

#[tokio::test]
async fn test_probe_transport_error_fails_closed() {
    let (transport, credentials, client) = signed_in().await;
    transport.fail_unreachable(Endpoint::UseSession, "connection refused");

    assert!(!client.session().probe().await);

    assert_eq!(client.session().session_id(), None);
    assert_eq!(client.session().state(), SessionState::NoSession);
    assert_eq!(credentials.load().session_id, None);
    assert_eq!(
        client.session().last_error().as_deref(),
        Some("connection refused")
    );
}

#[tokio::test]
async fn test_logout_twice_is_safe() {
    let (_transport, credentials, client) = signed_in().await;

    client.identity().logout();
    client.identity().logout();

    assert!(!client.is_authenticated());
    let record = credentials.load();
    assert_eq!(record.token, None);
    assert_eq!(record.user, None);
    // Logout forgets the identity only; the session is ended separately.
    assert_eq!(record.session_id.as_deref(), Some("sess-1"));
}

#[tokio::test(start_paused = true)]
async fn test_interleaved_creations_converge_on_server_owner() {
    let (transport, credentials, client) = signed_in().await;
    transport.respond_after(
        Endpoint::CreateSchedule,
        schedule_body("sch-1", "user-42", "Fall"),
        Duration::from_millis(50),
    );
    transport.respond_after(
        Endpoint::CreateSchedule,
        schedule_body("sch-2", "user-42", "Spring"),
        Duration::from_millis(10),
    );

    let (fall, spring) = tokio::join!(
        client.schedules().create("Fall"),
        client.schedules().create("Spring"),
    );
    fall.unwrap();
    spring.unwrap();

    // Both requests left before either response reconciled the identity.
    for call in transport.calls_to(Endpoint::CreateSchedule) {
        assert_eq!(call.body["userId"], json!("sess-1"));
    }
    // Completion order was Spring then Fall; the list reflects that.
    let ids: Vec<_> = client
        .schedules()
        .schedules()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec!["sch-2", "sch-1"]);
    assert_eq!(client.schedules().user_schedules().len(), 2);
    assert_eq!(client.identity().current_user_id().as_deref(), Some("user-42"));
    assert_eq!(credentials.load().user.unwrap().id, "user-42");
    assert!(!client.schedules().is_loading());
}

#[tokio::test]
async fn test_session_expires_client_side() {
    let (_transport, _credentials, client) = signed_in().await;
    let expiry = client.session().current_session().unwrap().expiry;

    assert_eq!(
        client.session().state_at(expiry - TimeDelta::minutes(1)),
        SessionState::Active
    );
    assert_eq!(
        client.session().state_at(expiry + TimeDelta::seconds(1)),
        SessionState::Expired
    );
}
