//! Push notification orchestrator.
//!
//! [`NotificationService`] owns the lifecycle of one device session:
//!
//! ```text
//! Uninitialized --initialize ok--> Active --cleanup--> Uninitialized
//! Uninitialized --initialize err--> Inactive --initialize ok--> Active
//! ```
//!
//! Shared state sits behind a `std::sync::Mutex` that is never held across
//! an `.await`. Every completion re-checks the session epoch, which
//! `cleanup` bumps, so results that resolve after teardown are dropped
//! instead of written.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use courtside_common::{
    create_client, AuthSession, BoxFuture, KeyValueStore, NotificationEvent, NotificationPayload,
    PushPlatform, SessionProvider,
};
use courtside_config::{
    AppConfig, PushConfig, DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_STALENESS_WINDOW_SECS,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

use crate::api::ensure_session;
use crate::error::{ErrorKind, PushError};
use crate::identity::{DeviceIdentity, DeviceIdentityStore};
use crate::inbox::{AdminNotification, NotificationApi, NotificationRecord, SendReceipt};
use crate::registry::{RegistryClient, TokenRegistry};
use crate::router::{NavigationIntent, TapRouter};
use crate::scheduler::{
    decide_operation, Operation, RefreshScheduler, RefreshTarget, Trigger, UpdateReason,
};
use crate::session::SharedSession;
use crate::state::{self, PushTokenRecord, RegistrationState};
use crate::subscriptions::SubscriptionSet;
use crate::token::{PushToken, TokenAcquirer};

const EVENT_CAPACITY: usize = 64;

/// Timing and platform settings of the service.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub project_id: Option<String>,
    pub refresh_interval: Duration,
    pub staleness_window: chrono::Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            project_id: None,
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            staleness_window: chrono::Duration::seconds(DEFAULT_STALENESS_WINDOW_SECS as i64),
        }
    }
}

impl ServiceOptions {
    /// Zero durations fall back to the defaults.
    pub fn from_config(config: &PushConfig) -> Self {
        let defaults = Self::default();

        let refresh_interval = if config.refresh_interval_secs == 0 {
            warn!("push.refresh_interval_secs is 0, using the default");
            defaults.refresh_interval
        } else {
            Duration::from_secs(config.refresh_interval_secs)
        };

        let staleness_window = match i64::try_from(config.staleness_window_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .and_then(chrono::Duration::try_seconds)
        {
            Some(window) => window,
            None => {
                warn!(
                    "push.staleness_window_secs {} is not usable, using the default",
                    config.staleness_window_secs
                );
                defaults.staleness_window
            }
        };

        Self {
            project_id: config.project_id().map(str::to_string),
            refresh_interval,
            staleness_window,
        }
    }
}

/// Why push is unavailable for this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InactiveReason {
    PermissionDenied,
    Unsupported,
    Configuration,
    Unauthenticated,
    TokenUnavailable,
    RegistrationFailed,
}

impl From<&PushError> for InactiveReason {
    fn from(err: &PushError) -> Self {
        match err {
            PushError::PermissionDenied => InactiveReason::PermissionDenied,
            PushError::Unsupported => InactiveReason::Unsupported,
            PushError::Config(_) => InactiveReason::Configuration,
            PushError::Unauthenticated(_) => InactiveReason::Unauthenticated,
            PushError::TokenUnavailable(_) | PushError::MalformedToken(_) => {
                InactiveReason::TokenUnavailable
            }
            _ => InactiveReason::RegistrationFailed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Uninitialized,
    Active,
    Inactive(InactiveReason),
}

/// Result of a refresh check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Token unchanged and registration fresh; no network call.
    Skipped,
    Registered,
    Updated(UpdateReason),
    /// The call finished after teardown or was overtaken by a newer one;
    /// nothing was committed.
    Discarded,
}

/// Events for the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// A notification arrived while the app was in the foreground.
    Received(NotificationPayload),
    /// The user tapped a notification that points somewhere.
    Navigate(NavigationIntent),
}

struct Shared {
    state: ServiceState,
    epoch: u64,
    identity: Option<DeviceIdentity>,
    token: Option<PushTokenRecord>,
    registration: RegistrationState,
    subscriptions: SubscriptionSet,
}

struct Inner {
    platform: Arc<dyn PushPlatform>,
    store: Arc<dyn KeyValueStore>,
    registry: Arc<dyn TokenRegistry>,
    inbox: Option<NotificationApi>,
    sessions: Arc<dyn SessionProvider>,
    identity: DeviceIdentityStore,
    acquirer: TokenAcquirer,
    router: TapRouter,
    options: ServiceOptions,
    init_lock: tokio::sync::Mutex<()>,
    shared: Mutex<Shared>,
    events: broadcast::Sender<PushEvent>,
}

/// Push notification service for one device session.
///
/// Construct one per session and share it behind an `Arc`. Dropping the
/// service stops its listeners and timers.
pub struct NotificationService {
    inner: Arc<Inner>,
}

/// Builder for [`NotificationService`].
pub struct NotificationServiceBuilder {
    platform: Arc<dyn PushPlatform>,
    store: Arc<dyn KeyValueStore>,
    registry: Option<Arc<dyn TokenRegistry>>,
    inbox: Option<NotificationApi>,
    sessions: Option<Arc<dyn SessionProvider>>,
    options: ServiceOptions,
}

impl NotificationServiceBuilder {
    pub fn registry(mut self, registry: Arc<dyn TokenRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn inbox(mut self, inbox: NotificationApi) -> Self {
        self.inbox = Some(inbox);
        self
    }

    pub fn sessions(mut self, sessions: Arc<dyn SessionProvider>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn options(mut self, options: ServiceOptions) -> Self {
        self.options = options;
        self
    }

    /// Fails when no registry was supplied.
    pub fn build(self) -> Result<NotificationService, PushError> {
        let registry = self
            .registry
            .ok_or_else(|| PushError::Config("a token registry is required".to_string()))?;
        let sessions = self
            .sessions
            .unwrap_or_else(|| Arc::new(SharedSession::new()));

        let identity = DeviceIdentityStore::new(self.store.clone(), self.platform.clone());
        let acquirer = TokenAcquirer::new(
            self.platform.clone(),
            self.store.clone(),
            self.options.project_id.clone(),
        );
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(NotificationService {
            inner: Arc::new(Inner {
                platform: self.platform,
                store: self.store,
                registry,
                inbox: self.inbox,
                sessions,
                identity,
                acquirer,
                router: TapRouter::new(),
                options: self.options,
                init_lock: tokio::sync::Mutex::new(()),
                shared: Mutex::new(Shared {
                    state: ServiceState::Uninitialized,
                    epoch: 0,
                    identity: None,
                    token: None,
                    registration: RegistrationState::default(),
                    subscriptions: SubscriptionSet::new(),
                }),
                events,
            }),
        })
    }
}

impl NotificationService {
    pub fn builder(
        platform: Arc<dyn PushPlatform>,
        store: Arc<dyn KeyValueStore>,
    ) -> NotificationServiceBuilder {
        NotificationServiceBuilder {
            platform,
            store,
            registry: None,
            inbox: None,
            sessions: None,
            options: ServiceOptions::default(),
        }
    }

    /// Wires the HTTP registry and inbox clients from configuration.
    ///
    /// A missing project id is not an error here: `initialize` reports it.
    pub fn from_config(
        config: &AppConfig,
        platform: Arc<dyn PushPlatform>,
        store: Arc<dyn KeyValueStore>,
        sessions: Arc<dyn SessionProvider>,
    ) -> Result<Self, PushError> {
        config
            .api
            .validate()
            .map_err(|issue| PushError::Config(issue.to_string()))?;
        let client = create_client(config.api.timeout_secs)?;

        Self::builder(platform, store)
            .registry(Arc::new(RegistryClient::with_client(
                client.clone(),
                &config.api.base_url,
            )))
            .inbox(NotificationApi::with_client(client, &config.api.base_url))
            .sessions(sessions)
            .options(ServiceOptions::from_config(&config.push))
            .build()
    }

    /// Starts push for this session and returns the active token.
    ///
    /// Resolves the device identity, acquires a token, registers it unless
    /// the persisted registration already covers it, then arms the listeners
    /// and refresh triggers and routes the notification the app was opened
    /// from. Calling it while active returns the current token without side
    /// effects. Any failure leaves the service `Inactive`; a later call may
    /// try again.
    pub async fn initialize(&self) -> Result<String, PushError> {
        let _serialized = self.inner.init_lock.lock().await;

        let epoch = {
            let shared = self.inner.shared();
            if shared.state == ServiceState::Active {
                if let Some(record) = &shared.token {
                    debug!("Push notifications already active");
                    return Ok(record.token.clone());
                }
            }
            shared.epoch
        };

        let identity = self.inner.identity.get_or_create().await;
        match self.inner.activate(epoch, identity).await {
            Ok(token) => {
                self.inner.route_launch_notification().await;
                Ok(token)
            }
            Err(err) => {
                self.inner.deactivate(epoch, &err);
                Err(err)
            }
        }
    }

    /// Re-fetches the token and updates the backend if it changed or the
    /// registration went stale.
    pub async fn update_token_if_needed(
        &self,
        session: &AuthSession,
    ) -> Result<RefreshOutcome, PushError> {
        self.inner.refresh_with(session).await
    }

    /// Sends an admin notification. Errors carry the backend's message.
    pub async fn send_admin_notification(
        &self,
        notification: &AdminNotification,
        session: &AuthSession,
    ) -> Result<SendReceipt, PushError> {
        self.inner
            .inbox()?
            .send_admin_notification(notification, session)
            .await
    }

    pub async fn mark_notification_as_read(
        &self,
        notification_id: &str,
        session: &AuthSession,
    ) -> Result<(), PushError> {
        self.inner.inbox()?.mark_read(notification_id, session).await
    }

    pub async fn notification_history(
        &self,
        page_number: u32,
        page_size: u32,
        session: &AuthSession,
    ) -> Result<Vec<NotificationRecord>, PushError> {
        self.inner
            .inbox()?
            .history(page_number, page_size, session)
            .await
    }

    pub async fn delete_notification(
        &self,
        notification_id: &str,
        session: &AuthSession,
    ) -> Result<(), PushError> {
        self.inner.inbox()?.delete(notification_id, session).await
    }

    /// Stops listeners and timers and returns to `Uninitialized`.
    ///
    /// In-flight calls are not cancelled; their results are discarded.
    /// Safe to call any number of times.
    pub fn cleanup(&self) {
        let mut shared = self.inner.shared();
        let was = shared.state;

        shared.epoch = shared.epoch.wrapping_add(1);
        shared.subscriptions.dispose();
        shared.state = ServiceState::Uninitialized;
        shared.identity = None;
        shared.token = None;
        shared.registration = RegistrationState::default();

        if was != ServiceState::Uninitialized {
            info!("Push notifications cleaned up (was {:?})", was);
        }
    }

    pub fn state(&self) -> ServiceState {
        self.inner.shared().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == ServiceState::Active
    }

    pub fn current_token(&self) -> Option<String> {
        self.inner.shared().token.as_ref().map(|record| record.token.clone())
    }

    pub fn registration_state(&self) -> RegistrationState {
        self.inner.shared().registration.clone()
    }

    pub fn device_identity(&self) -> Option<DeviceIdentity> {
        self.inner.shared().identity.clone()
    }

    /// Permission helpers for re-offering the prompt.
    pub fn token_acquirer(&self) -> &TokenAcquirer {
        &self.inner.acquirer
    }

    /// Receives notifications delivered in the foreground and tap navigation.
    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.inner.events.subscribe()
    }
}

impl Drop for NotificationService {
    fn drop(&mut self) {
        self.inner.shared().subscriptions.dispose();
    }
}

impl Inner {
    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn inbox(&self) -> Result<&NotificationApi, PushError> {
        self.inbox
            .as_ref()
            .ok_or_else(|| PushError::Config("notification API is not configured".to_string()))
    }

    fn emit(&self, event: PushEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    async fn activate(
        self: &Arc<Self>,
        epoch: u64,
        identity: DeviceIdentity,
    ) -> Result<String, PushError> {
        let token = self.acquirer.acquire().await.into_result()?;
        let token = PushToken::parse(&token)?.into_inner();

        let now = Utc::now();
        let previous = state::load_token_record(self.store.as_ref()).await;
        let record = PushTokenRecord::observe(previous.as_ref(), &token, now);
        if previous.as_ref() != Some(&record) {
            state::save_token_record(self.store.as_ref(), &record).await;
        }

        let mut registration = state::load_registration(self.store.as_ref()).await;
        let covered = registration.last_registered_token.as_deref() == Some(token.as_str())
            && !registration.is_stale(now, self.options.staleness_window);

        if covered {
            debug!("Persisted registration is current; skipping register");
        } else {
            let session = self.usable_session()?;
            self.registry
                .register(&token, &identity, self.platform.device_platform(), &session)
                .await?;
            registration = RegistrationState::confirmed(&token, now);
        }

        let mut subscriptions = SubscriptionSet::new();
        // Subscribe before sampling so no transition falls in between.
        let app_state = self.platform.subscribe_app_state();
        RefreshScheduler::arm(
            Arc::downgrade(self),
            app_state,
            self.platform.current_app_state(),
            self.options.refresh_interval,
            &mut subscriptions,
        );
        subscriptions.spawn(
            "notification listener",
            listen_for_notifications(Arc::downgrade(self), self.platform.subscribe_notifications()),
        );

        {
            let mut shared = self.shared();
            if shared.epoch != epoch {
                subscriptions.dispose();
                info!("Push session ended during initialization; discarding result");
                return Err(PushError::SessionEnded);
            }
            shared.state = ServiceState::Active;
            shared.identity = Some(identity.clone());
            shared.token = Some(record);
            shared.registration = registration.clone();
            shared.subscriptions.dispose();
            shared.subscriptions = subscriptions;
        }

        if !covered {
            state::save_registration(self.store.as_ref(), &registration).await;
        }
        info!("Push notifications active for device {}", identity.id);
        Ok(token)
    }

    fn deactivate(&self, epoch: u64, err: &PushError) {
        let reason = InactiveReason::from(err);
        {
            let mut shared = self.shared();
            if shared.epoch != epoch || shared.state == ServiceState::Active {
                return;
            }
            shared.state = ServiceState::Inactive(reason);
        }

        match err.kind() {
            ErrorKind::Configuration => error!("Push notifications disabled: {}", err),
            ErrorKind::Permission => info!("Push notifications unavailable: {}", err),
            _ => warn!("Push notification setup failed: {}", err),
        }
    }

    fn usable_session(&self) -> Result<AuthSession, PushError> {
        let session = self
            .sessions
            .current_session()
            .ok_or_else(|| PushError::Unauthenticated("no signed-in session".to_string()))?;
        ensure_session(&session)?;
        Ok(session)
    }

    async fn refresh_with(&self, session: &AuthSession) -> Result<RefreshOutcome, PushError> {
        let (epoch, identity) = {
            let shared = self.shared();
            match (&shared.state, &shared.identity) {
                (ServiceState::Active, Some(identity)) => (shared.epoch, identity.clone()),
                _ => return Err(PushError::NotActive),
            }
        };
        ensure_session(session)?;

        let token = self.acquirer.refetch().await.into_result()?;
        let token = PushToken::parse(&token)?.into_inner();
        let started = Utc::now();

        let (registration, record, rotated) = {
            let mut shared = self.shared();
            if shared.epoch != epoch {
                return Ok(RefreshOutcome::Discarded);
            }
            let record = PushTokenRecord::observe(shared.token.as_ref(), &token, started);
            let rotated = shared.token.as_ref() != Some(&record);
            shared.token = Some(record.clone());
            (shared.registration.clone(), record, rotated)
        };
        if rotated {
            info!("Platform rotated the push token");
            state::save_token_record(self.store.as_ref(), &record).await;
        }

        let operation =
            decide_operation(&registration, &token, started, self.options.staleness_window);
        let platform = self.platform.device_platform();
        let outcome = match operation {
            Operation::Skip => {
                debug!("Push registration is current; nothing to do");
                return Ok(RefreshOutcome::Skipped);
            }
            Operation::Register => {
                self.registry
                    .register(&token, &identity, platform, session)
                    .await?;
                RefreshOutcome::Registered
            }
            Operation::Update(reason) => {
                self.registry
                    .update(&token, &identity, platform, session)
                    .await?;
                RefreshOutcome::Updated(reason)
            }
        };

        let (committed, outcome) = {
            let mut shared = self.shared();
            if shared.epoch != epoch || shared.state != ServiceState::Active {
                info!("Push session ended during refresh; discarding result");
                return Ok(RefreshOutcome::Discarded);
            }

            let overtaken = shared
                .registration
                .last_registered_at
                .is_some_and(|at| at > started);
            if overtaken
                && shared.registration.last_registered_token.as_deref() == Some(token.as_str())
            {
                return Ok(outcome);
            }

            if overtaken {
                // A later call confirmed another token, but this one may have
                // reached the backend last. Force the next check to re-assert.
                shared.registration.last_registered_at = None;
                (shared.registration.clone(), RefreshOutcome::Discarded)
            } else {
                shared.registration = RegistrationState::confirmed(&token, started);
                (shared.registration.clone(), outcome)
            }
        };

        state::save_registration(self.store.as_ref(), &committed).await;
        if outcome == RefreshOutcome::Discarded {
            warn!("Out-of-order registry response; scheduled a re-check");
        } else {
            info!("Push token refresh finished: {:?}", outcome);
        }
        Ok(outcome)
    }

    async fn route_launch_notification(&self) {
        match self.platform.last_notification_response().await {
            Ok(Some(payload)) => {
                debug!("App was opened from a notification");
                self.handle_tap(&payload);
            }
            Ok(None) => {}
            Err(err) => warn!("Could not read the launch notification: {}", err),
        }
    }

    fn handle_tap(&self, payload: &NotificationPayload) {
        let intent = self.router.route(payload);
        if !intent.is_none() {
            self.emit(PushEvent::Navigate(intent));
        }
    }
}

impl RefreshTarget for Inner {
    fn refresh(&self, trigger: Trigger) -> BoxFuture<'_, (), PushError> {
        Box::pin(async move {
            let session = self.usable_session()?;
            let outcome = self.refresh_with(&session).await?;
            debug!("{} refresh: {:?}", trigger, outcome);
            Ok(())
        })
    }
}

async fn listen_for_notifications(
    inner: std::sync::Weak<Inner>,
    mut notifications: broadcast::Receiver<NotificationEvent>,
) {
    loop {
        let event = match notifications.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Dropped {} notification events", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        let Some(inner) = inner.upgrade() else {
            break;
        };

        match event {
            NotificationEvent::Received(payload) => {
                debug!("Notification received in foreground: {}", payload.kind);
                inner.emit(PushEvent::Received(payload));
            }
            NotificationEvent::Responded(payload) => inner.handle_tap(&payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_fall_back_on_zero() {
        let config = PushConfig {
            project_id: Some("  ".into()),
            refresh_interval_secs: 0,
            staleness_window_secs: 0,
        };
        let options = ServiceOptions::from_config(&config);
        assert!(options.project_id.is_none());
        assert_eq!(options.refresh_interval, Duration::from_secs(3600));
        assert_eq!(options.staleness_window, chrono::Duration::hours(12));
    }

    #[test]
    fn test_inactive_reason_mapping() {
        assert_eq!(
            InactiveReason::from(&PushError::PermissionDenied),
            InactiveReason::PermissionDenied
        );
        assert_eq!(
            InactiveReason::from(&PushError::Config("push.project_id".into())),
            InactiveReason::Configuration
        );
        assert_eq!(
            InactiveReason::from(&PushError::Http {
                status: 500,
                message: "boom".into()
            }),
            InactiveReason::RegistrationFailed
        );
    }
}
