//! When to re-check the push token, and whether a check needs the backend.
//!
//! [`decide_operation`] is the whole policy and is pure. [`RefreshScheduler`]
//! only decides *when* to ask: on every transition into the foreground and
//! on a fixed interval. The two triggers run as independent tasks and may
//! overlap; a redundant update is absorbed by the backend's upsert.

use std::fmt;
use std::sync::Weak;
use std::time::Duration;

use chrono::{DateTime, Utc};
use courtside_common::{AppStatus, BoxFuture};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::error::{ErrorKind, PushError};
use crate::state::RegistrationState;
use crate::subscriptions::SubscriptionSet;

/// Why an `update` call is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateReason {
    /// The platform handed out a different token.
    TokenChanged,
    /// Same token, but the last confirmation is older than the staleness window.
    Heartbeat,
}

/// Registry call warranted by the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Register,
    Update(UpdateReason),
    Skip,
}

/// Picks the registry call for `current_token` given what the backend is
/// believed to hold.
///
/// * nothing registered yet: `Register`
/// * token differs from the registered one: `Update(TokenChanged)`
/// * unknown or older than `staleness_window` last confirmation: `Update(Heartbeat)`
/// * otherwise: `Skip`
pub fn decide_operation(
    state: &RegistrationState,
    current_token: &str,
    now: DateTime<Utc>,
    staleness_window: chrono::Duration,
) -> Operation {
    match state.last_registered_token.as_deref() {
        None => Operation::Register,
        Some(registered) if registered != current_token => {
            Operation::Update(UpdateReason::TokenChanged)
        }
        Some(_) if state.is_stale(now, staleness_window) => {
            Operation::Update(UpdateReason::Heartbeat)
        }
        Some(_) => Operation::Skip,
    }
}

/// What caused a refresh check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Foreground,
    Periodic,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Foreground => f.write_str("foreground"),
            Trigger::Periodic => f.write_str("periodic"),
        }
    }
}

/// Whatever runs the refresh path when a trigger fires.
pub trait RefreshTarget: Send + Sync + 'static {
    fn refresh(&self, trigger: Trigger) -> BoxFuture<'_, (), PushError>;
}

/// Arms the foreground and periodic triggers.
pub struct RefreshScheduler;

impl RefreshScheduler {
    /// Spawns both trigger tasks into `subscriptions`.
    ///
    /// `current` is the app state at arming time; the first foreground
    /// transition is measured against it. The tasks hold only a weak handle
    /// to `target` and stop on their own once it is dropped.
    pub fn arm<T: RefreshTarget>(
        target: Weak<T>,
        app_state: broadcast::Receiver<AppStatus>,
        current: AppStatus,
        period: Duration,
        subscriptions: &mut SubscriptionSet,
    ) {
        subscriptions.spawn(
            "foreground trigger",
            foreground_trigger(target.clone(), app_state, current),
        );
        subscriptions.spawn("periodic trigger", periodic_trigger(target, period));
    }
}

async fn foreground_trigger<T: RefreshTarget>(
    target: Weak<T>,
    mut app_state: broadcast::Receiver<AppStatus>,
    mut previous: AppStatus,
) {
    loop {
        let status = match app_state.recv().await {
            Ok(status) => status,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Missed {} app state transitions", skipped);
                continue;
            }
            Err(RecvError::Closed) => {
                debug!("App state stream closed; foreground trigger stopped");
                break;
            }
        };

        let entered_foreground = status == AppStatus::Active && previous != AppStatus::Active;
        previous = status;
        if !entered_foreground {
            trace!("App state changed to {:?}", status);
            continue;
        }

        if !fire(&target, Trigger::Foreground).await {
            break;
        }
    }
}

async fn periodic_trigger<T: RefreshTarget>(target: Weak<T>, period: Duration) {
    // The first check is one full period after arming.
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if !fire(&target, Trigger::Periodic).await {
            break;
        }
    }
}

/// Runs one refresh. Returns false once the target is gone.
async fn fire<T: RefreshTarget>(target: &Weak<T>, trigger: Trigger) -> bool {
    let Some(target) = target.upgrade() else {
        debug!("Push service dropped; {} trigger stopped", trigger);
        return false;
    };

    debug!("Running {} token refresh check", trigger);
    match target.refresh(trigger).await {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::Precondition => {
            debug!("Skipped {} token refresh: {}", trigger, err);
        }
        Err(err) => warn!("{} token refresh failed: {}", trigger, err),
    }
    true
}
