mod support;

use std::time::Duration;

use adminsession_core::api::ApiError;
use adminsession_core::storage::{CREDENTIAL_KEY, IDENTITY_KEY};
use adminsession_core::{Credential, KeyValueStore, Origin, Route, Scope, Session, SessionService};
use support::MockBackend;
use tokio::sync::watch;

const INTERVAL: Duration = Duration::from_secs(50 * 60);

async fn until_logged_out(mut rx: watch::Receiver<Session>) {
    tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|s| !s.authenticated))
        .await
        .expect("tab did not log out")
        .expect("session store closed");
}

/// Two tabs of one origin sharing a remembered session
async fn two_tabs() -> (Origin, SessionService, SessionService) {
    let origin = Origin::in_memory();
    let tab_a = SessionService::new(MockBackend::new(), origin.open_tab());
    tab_a.initialize();
    tab_a.login("ada@example.com", "secret", true).await.unwrap();

    let tab_b = SessionService::new(MockBackend::new(), origin.open_tab());
    assert!(tab_b.initialize().authenticated);
    (origin, tab_a, tab_b)
}

#[tokio::test]
async fn test_logout_in_one_tab_logs_out_the_other() {
    let (_origin, tab_a, tab_b) = two_tabs().await;
    let _a_tasks = tab_a.spawn_background(INTERVAL);
    let _b_tasks = tab_b.spawn_background(INTERVAL);

    let b_sessions = tab_b.subscribe();
    tab_a.logout();

    until_logged_out(b_sessions).await;
    assert_eq!(tab_b.route(), Route::Login { error: None });
    assert!(!tab_a.is_authenticated());
}

#[tokio::test]
async fn test_credential_removal_alone_logs_out_other_tabs() {
    let (origin, tab_a, tab_b) = two_tabs().await;
    let _b_tasks = tab_b.spawn_background(INTERVAL);
    let third = SessionService::new(MockBackend::new(), origin.open_tab());
    assert!(third.initialize().authenticated);
    let _third_tasks = third.spawn_background(INTERVAL);

    let b_sessions = tab_b.subscribe();
    let third_sessions = third.subscribe();

    // Storage cleared directly, no signal broadcast
    tab_a.tab().persistent().remove(CREDENTIAL_KEY).unwrap();

    until_logged_out(b_sessions).await;
    until_logged_out(third_sessions).await;
}

#[tokio::test]
async fn test_unrelated_storage_changes_are_ignored() {
    let (_origin, tab_a, tab_b) = two_tabs().await;
    let _b_tasks = tab_b.spawn_background(INTERVAL);

    let persistent = tab_a.tab().persistent();
    persistent.remove(IDENTITY_KEY).unwrap();
    persistent.set(CREDENTIAL_KEY, "\"rotated\"").unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(tab_b.is_authenticated());
}

#[tokio::test]
async fn test_own_logout_signal_is_not_echoed() {
    let origin = Origin::in_memory();
    let backend = MockBackend::new();
    let service = SessionService::new(backend.clone(), origin.open_tab());
    service.initialize();
    let _tasks = service.spawn_background(INTERVAL);

    service.logout();
    service.login("ada@example.com", "secret", true).await.unwrap();

    // A stale echo of the earlier signal would log this tab out again
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(service.is_authenticated());
}

#[tokio::test]
async fn test_tabs_without_listener_are_unaffected() {
    let (_origin, tab_a, tab_b) = two_tabs().await;

    tab_a.logout();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // The listener belongs to the mounted page; none is running in tab B
    assert!(tab_b.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_failure_in_one_tab_logs_out_all_tabs() {
    let origin = Origin::in_memory();
    let failing = MockBackend::new();
    let tab_a = SessionService::new(failing.clone(), origin.open_tab());
    tab_a.initialize();
    tab_a.login("ada@example.com", "secret", true).await.unwrap();

    let tab_b = SessionService::new(MockBackend::new(), origin.open_tab());
    assert!(tab_b.initialize().authenticated);

    let _a_tasks = tab_a.spawn_background(INTERVAL);
    // Tab B refreshes less often so tab A's failure comes first
    let _b_tasks = tab_b.spawn_background(INTERVAL * 10);
    failing.fail_refresh(ApiError::Unauthorized("expired".into()));

    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;

    assert!(!tab_a.is_authenticated());
    assert!(!tab_b.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_stays_in_scope_chosen_at_login() {
    let origin = Origin::in_memory();
    let tab_a = SessionService::new(MockBackend::new(), origin.open_tab());
    tab_a.initialize();
    tab_a.login("ada@example.com", "secret", false).await.unwrap();

    // Tab B remembers its session, flipping the shared preference
    let tab_b = SessionService::new(MockBackend::new(), origin.open_tab());
    tab_b.initialize();
    tab_b.login("ada@example.com", "secret", true).await.unwrap();
    assert_eq!(tab_a.storage().selected_scope(), Scope::Persistent);

    let _a_tasks = tab_a.spawn_background(INTERVAL);
    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;

    assert_eq!(tab_a.snapshot().credential, Some(Credential::new("token-1")));
    assert_eq!(
        tab_a.tab().transient().get(CREDENTIAL_KEY).unwrap().as_deref(),
        Some("\"token-1\"")
    );
    // Tab B's remembered session is untouched
    assert_eq!(
        tab_a.tab().persistent().get(CREDENTIAL_KEY).unwrap().as_deref(),
        Some("\"token-0\"")
    );
    assert!(tab_a.is_authenticated());
    assert!(tab_b.is_authenticated());

    // A new tab restores tab B's session, not a mix of both
    let restored = SessionService::new(MockBackend::new(), origin.open_tab()).initialize();
    assert_eq!(restored.credential, Some(Credential::new("token-0")));
}
