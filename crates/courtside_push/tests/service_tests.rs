
use std::time::Duration;

use chrono::Utc;
use courtside_common::{AuthSession, NotificationPayload, PermissionStatus};
use courtside_push::storage::keys;
use courtside_push::{
    InactiveReason, MemoryStore, NavigationIntent, PushError, PushEvent, RefreshOutcome,
    ServiceOptions, ServiceState, UpdateReason,
};
use fixtures::{
    access_session, eventually, harness, harness_with, options, store_registered, stored, within,
    FakePlatform, TOKEN_A, TOKEN_B,
};

#[tokio::test]
async fn test_initialize_twice_registers_once() {
    let h = harness(FakePlatform::granted(TOKEN_A));

    assert_eq!(h.service.initialize().await.unwrap(), TOKEN_A);
    assert_eq!(h.service.initialize().await.unwrap(), TOKEN_A);

    assert_eq!(h.registry.count("register"), 1);
    assert_eq!(h.platform.issued(), 1);
    assert_eq!(h.service.state(), ServiceState::Active);
    assert_eq!(h.service.current_token().as_deref(), Some(TOKEN_A));

    let registration = h.service.registration_state();
    assert_eq!(registration.last_registered_token.as_deref(), Some(TOKEN_A));
    assert!(registration.last_registered_at.is_some());
}

#[tokio::test]
async fn test_concurrent_initialize_registers_once() {
    let h = harness(FakePlatform::granted(TOKEN_A));

    let (first, second) = tokio::join!(h.service.initialize(), h.service.initialize());
    assert_eq!(first.unwrap(), TOKEN_A);
    assert_eq!(second.unwrap(), TOKEN_A);
    assert_eq!(h.registry.count("register"), 1);
}

#[tokio::test]
async fn test_initialize_persists_identity_and_registration() {
    let h = harness(FakePlatform::granted(TOKEN_A));
    h.service.initialize().await.unwrap();

    let identity = h.service.device_identity().unwrap();
    assert_eq!(stored(&h.store, keys::DEVICE_ID).await, Some(identity.id.clone()));
    assert_eq!(stored(&h.store, keys::PUSH_TOKEN).await.as_deref(), Some(TOKEN_A));
    assert_eq!(stored(&h.store, keys::REGISTERED_TOKEN).await.as_deref(), Some(TOKEN_A));
    assert!(stored(&h.store, keys::REGISTERED_AT).await.is_some());

    let calls = h.registry.calls();
    assert_eq!(calls[0].device_id, identity.id);
    assert_eq!(calls[0].token, TOKEN_A);
}

#[tokio::test]
async fn test_cold_start_with_fresh_registration_skips_register() {
    let store = store_registered(TOKEN_A, Utc::now() - chrono::Duration::hours(1));
    let h = harness_with(FakePlatform::granted(TOKEN_A), store, options());

    assert_eq!(h.service.initialize().await.unwrap(), TOKEN_A);
    assert!(h.registry.calls().is_empty());
    assert!(h.service.is_active());
    assert_eq!(
        h.service.device_identity().map(|identity| identity.id),
        Some("ios_iPhone15,2_seeded".to_string())
    );
}

#[tokio::test]
async fn test_cold_start_with_rotated_token_registers() {
    let store = store_registered(TOKEN_A, Utc::now() - chrono::Duration::hours(1));
    let h = harness_with(FakePlatform::granted(TOKEN_B), store, options());

    h.service.initialize().await.unwrap();
    let calls = h.registry.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].operation, "register");
    assert_eq!(calls[0].token, TOKEN_B);
}

#[tokio::test]
async fn test_token_change_issues_one_update() {
    let store = store_registered(TOKEN_A, Utc::now() - chrono::Duration::hours(1));
    let h = harness_with(FakePlatform::granted(TOKEN_A), store, options());
    h.service.initialize().await.unwrap();

    h.platform.set_token(TOKEN_B);
    let outcome = h
        .service
        .update_token_if_needed(&access_session())
        .await
        .unwrap();

    assert_eq!(outcome, RefreshOutcome::Updated(UpdateReason::TokenChanged));
    let calls = h.registry.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].operation, "update");
    assert_eq!(calls[0].token, TOKEN_B);
    assert_eq!(
        h.service.registration_state().last_registered_token.as_deref(),
        Some(TOKEN_B)
    );
    assert_eq!(h.service.current_token().as_deref(), Some(TOKEN_B));
    assert_eq!(stored(&h.store, keys::REGISTERED_TOKEN).await.as_deref(), Some(TOKEN_B));
    assert_eq!(stored(&h.store, keys::PUSH_TOKEN).await.as_deref(), Some(TOKEN_B));
}

#[tokio::test]
async fn test_stale_registration_sends_heartbeat() {
    let options = ServiceOptions {
        staleness_window: chrono::Duration::milliseconds(200),
        ..options()
    };
    let store = store_registered(TOKEN_A, Utc::now());
    let h = harness_with(FakePlatform::granted(TOKEN_A), store, options);
    h.service.initialize().await.unwrap();
    assert!(h.registry.calls().is_empty());

    tokio::time::sleep(Duration::from_millis(300)).await;
    let outcome = h
        .service
        .update_token_if_needed(&access_session())
        .await
        .unwrap();

    assert_eq!(outcome, RefreshOutcome::Updated(UpdateReason::Heartbeat));
    let calls = h.registry.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].operation, "update");
    assert_eq!(calls[0].token, TOKEN_A);
}

#[tokio::test]
async fn test_fresh_unchanged_token_makes_no_call() {
    let store = store_registered(TOKEN_A, Utc::now() - chrono::Duration::hours(1));
    let h = harness_with(FakePlatform::granted(TOKEN_A), store, options());
    h.service.initialize().await.unwrap();

    let outcome = h
        .service
        .update_token_if_needed(&access_session())
        .await
        .unwrap();

    assert_eq!(outcome, RefreshOutcome::Skipped);
    assert!(h.registry.calls().is_empty());
}

#[tokio::test]
async fn test_failed_update_leaves_registration_untouched() {
    let store = store_registered(TOKEN_A, Utc::now() - chrono::Duration::hours(1));
    let h = harness_with(FakePlatform::granted(TOKEN_A), store, options());
    h.service.initialize().await.unwrap();
    let before = h.service.registration_state();

    h.platform.set_token(TOKEN_B);
    h.registry.set_failing(true);
    let err = h
        .service
        .update_token_if_needed(&access_session())
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(h.service.registration_state(), before);

    // The next check retries with the new token.
    h.registry.set_failing(false);
    assert_eq!(
        h.service
            .update_token_if_needed(&access_session())
            .await
            .unwrap(),
        RefreshOutcome::Updated(UpdateReason::TokenChanged)
    );
    assert_eq!(h.registry.count("update"), 2);
}

#[tokio::test]
async fn test_malformed_platform_token_is_rejected_locally() {
    let h = harness(FakePlatform::granted("not-a-token"));

    let err = h.service.initialize().await.unwrap_err();
    assert!(matches!(err, PushError::MalformedToken(_)));
    assert!(h.registry.calls().is_empty());
    assert_eq!(
        h.service.state(),
        ServiceState::Inactive(InactiveReason::TokenUnavailable)
    );
}

#[tokio::test]
async fn test_update_requires_active_service_and_session() {
    let h = harness(FakePlatform::granted(TOKEN_A));
    assert!(matches!(
        h.service.update_token_if_needed(&access_session()).await,
        Err(PushError::NotActive)
    ));

    h.service.initialize().await.unwrap();
    assert!(matches!(
        h.service.update_token_if_needed(&AuthSession::new("")).await,
        Err(PushError::Unauthenticated(_))
    ));
}

#[tokio::test]
async fn test_permission_denied_leaves_service_inactive() {
    let h = harness(FakePlatform::undetermined(TOKEN_A, PermissionStatus::Denied));

    let err = h.service.initialize().await.unwrap_err();
    assert!(matches!(err, PushError::PermissionDenied));
    assert_eq!(
        h.service.state(),
        ServiceState::Inactive(InactiveReason::PermissionDenied)
    );
    assert!(!h.service.is_active());
    assert_eq!(stored(&h.store, keys::PERMISSION_DENIED).await.as_deref(), Some("true"));
    assert!(h.registry.calls().is_empty());

    // The app re-offers the prompt later and the user accepts.
    h.platform.set_permission(PermissionStatus::Granted);
    assert_eq!(h.service.initialize().await.unwrap(), TOKEN_A);
    assert!(h.service.is_active());
    assert_eq!(stored(&h.store, keys::PERMISSION_DENIED).await, None);
}

#[tokio::test]
async fn test_unsupported_device_never_prompts() {
    let h = harness(FakePlatform::undetermined(TOKEN_A, PermissionStatus::Granted).unsupported());

    assert!(matches!(
        h.service.initialize().await,
        Err(PushError::Unsupported)
    ));
    assert_eq!(h.platform.prompts(), 0);
    assert_eq!(
        h.service.state(),
        ServiceState::Inactive(InactiveReason::Unsupported)
    );
}

#[tokio::test]
async fn test_missing_project_id_is_a_configuration_error() {
    let options = ServiceOptions {
        project_id: None,
        ..options()
    };
    let h = harness_with(FakePlatform::granted(TOKEN_A), MemoryStore::new(), options);

    let err = h.service.initialize().await.unwrap_err();
    assert!(matches!(err, PushError::Config(_)));
    assert_eq!(h.platform.issued(), 0);
    assert_eq!(
        h.service.state(),
        ServiceState::Inactive(InactiveReason::Configuration)
    );
}

#[tokio::test]
async fn test_initialize_without_session_is_inactive() {
    let h = harness(FakePlatform::granted(TOKEN_A));
    h.session.clear();

    assert!(matches!(
        h.service.initialize().await,
        Err(PushError::Unauthenticated(_))
    ));
    assert_eq!(
        h.service.state(),
        ServiceState::Inactive(InactiveReason::Unauthenticated)
    );
    assert!(h.registry.calls().is_empty());
}

#[tokio::test]
async fn test_failed_register_can_be_retried() {
    let h = harness(FakePlatform::granted(TOKEN_A));
    h.registry.set_failing(true);

    assert!(h.service.initialize().await.is_err());
    assert_eq!(
        h.service.state(),
        ServiceState::Inactive(InactiveReason::RegistrationFailed)
    );
    assert!(!h.service.registration_state().is_registered());
    assert_eq!(stored(&h.store, keys::REGISTERED_TOKEN).await, None);

    h.registry.set_failing(false);
    h.service.initialize().await.unwrap();
    assert!(h.service.is_active());
    assert_eq!(h.registry.count("register"), 2);
}

#[tokio::test]
async fn test_cleanup_is_idempotent() {
    let h = harness(FakePlatform::granted(TOKEN_A));
    h.service.cleanup();
    assert_eq!(h.service.state(), ServiceState::Uninitialized);

    h.service.initialize().await.unwrap();
    h.service.cleanup();
    h.service.cleanup();

    assert_eq!(h.service.state(), ServiceState::Uninitialized);
    assert!(h.service.current_token().is_none());
    assert!(matches!(
        h.service.update_token_if_needed(&access_session()).await,
        Err(PushError::NotActive)
    ));
}

#[tokio::test]
async fn test_reinitialize_after_cleanup_uses_persisted_registration() {
    let h = harness(FakePlatform::granted(TOKEN_A));
    h.service.initialize().await.unwrap();
    h.service.cleanup();

    h.service.initialize().await.unwrap();
    assert!(h.service.is_active());
    assert_eq!(h.registry.count("register"), 1);
}

#[tokio::test]
async fn test_refresh_result_after_cleanup_is_discarded() {
    let store = store_registered(TOKEN_A, Utc::now() - chrono::Duration::hours(1));
    let h = harness_with(FakePlatform::granted(TOKEN_A), store, options());
    h.service.initialize().await.unwrap();

    h.platform.set_token(TOKEN_B);
    let gate = h.registry.hold();
    let session = access_session();

    let refresh = h.service.update_token_if_needed(&session);
    let teardown = async {
        assert!(eventually(|| h.registry.count("update") == 1).await);
        h.service.cleanup();
        gate.notify_one();
    };
    let (outcome, ()) = within(async { tokio::join!(refresh, teardown) }).await;

    assert_eq!(outcome.unwrap(), RefreshOutcome::Discarded);
    assert_eq!(h.service.state(), ServiceState::Uninitialized);
    assert_eq!(stored(&h.store, keys::REGISTERED_TOKEN).await.as_deref(), Some(TOKEN_A));
}

#[tokio::test]
async fn test_launch_notification_is_routed_on_initialize() {
    let platform = FakePlatform::granted(TOKEN_A)
        .with_launch_notification(NotificationPayload::new("event_reminder").with_event("12"));
    let h = harness(platform);
    let mut events = h.service.subscribe();

    h.service.initialize().await.unwrap();

    assert_eq!(
        within(events.recv()).await.unwrap(),
        PushEvent::Navigate(NavigationIntent::EventDetail {
            event_id: "12".into()
        })
    );
}

#[tokio::test]
async fn test_taps_and_foreground_deliveries_reach_subscribers() {
    let h = harness(FakePlatform::granted(TOKEN_A));
    h.service.initialize().await.unwrap();
    let mut events = h.service.subscribe();

    let delivered = NotificationPayload::new("admin_message");
    h.platform.deliver(delivered.clone());
    assert_eq!(within(events.recv()).await.unwrap(), PushEvent::Received(delivered));

    // Unknown kinds produce no navigation; the next tap still goes through.
    h.platform.tap(NotificationPayload::new("unknown_x"));
    h.platform.tap(NotificationPayload::new("group_created").with_group("7"));
    assert_eq!(
        within(events.recv()).await.unwrap(),
        PushEvent::Navigate(NavigationIntent::GroupDetail {
            group_id: "7".into()
        })
    );
}

#[tokio::test]
async fn test_listeners_stop_after_cleanup() {
    let h = harness(FakePlatform::granted(TOKEN_A));
    h.service.initialize().await.unwrap();
    let mut events = h.service.subscribe();
    h.service.cleanup();

    // Give the aborted listener a chance to run if it were still alive.
    tokio::task::yield_now().await;
    h.platform.tap(NotificationPayload::new("group_created").with_group("7"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(events.try_recv().is_err());
}
