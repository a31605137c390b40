// In-memory session holder for the refresh triggers.

use std::sync::{Arc, RwLock};

use courtside_common::{AuthSession, SessionProvider};
use tracing::warn;

/// [`SessionProvider`] fed by the login layer.
///
/// Cloning shares the same slot, so the auth code keeps one clone and hands
/// another to the push service.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    slot: Arc<RwLock<Option<AuthSession>>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(session: AuthSession) -> Self {
        let shared = Self::new();
        shared.set(session);
        shared
    }

    pub fn set(&self, session: AuthSession) {
        match self.slot.write() {
            Ok(mut slot) => *slot = Some(session),
            Err(_) => warn!("Session slot poisoned; sign-in not recorded"),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = None;
        }
    }
}

impl SessionProvider for SharedSession {
    fn current_session(&self) -> Option<AuthSession> {
        self.slot.read().ok().and_then(|slot| slot.clone())
    }
}
