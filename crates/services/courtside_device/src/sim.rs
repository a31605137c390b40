//! In-process stand-in for a phone's notification platform.
//!
//! The terminal plays the OS: it moves the app between foreground and
//! background, rotates the push token and taps notifications.

use std::sync::Mutex;

use courtside_common::{
    AppStatus, BoxFuture, CourtsideError, DevicePlatform, NotificationEvent, NotificationPayload,
    PermissionStatus, PushPlatform,
};
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

pub struct SimulatedPlatform {
    platform: DevicePlatform,
    model: Option<String>,
    permission: Mutex<PermissionStatus>,
    grant_on_prompt: bool,
    token: Mutex<String>,
    launch: Mutex<Option<NotificationPayload>>,
    current: Mutex<AppStatus>,
    app_state: broadcast::Sender<AppStatus>,
    notifications: broadcast::Sender<NotificationEvent>,
}

impl SimulatedPlatform {
    pub fn new(platform: DevicePlatform, model: Option<String>, grant_on_prompt: bool) -> Self {
        let (app_state, _) = broadcast::channel(16);
        let (notifications, _) = broadcast::channel(16);
        Self {
            platform,
            model,
            permission: Mutex::new(PermissionStatus::Undetermined),
            grant_on_prompt,
            token: Mutex::new(fresh_token()),
            launch: Mutex::new(None),
            current: Mutex::new(AppStatus::Active),
            app_state,
            notifications,
        }
    }

    /// Pretends the app was opened by tapping `payload`.
    pub fn launched_from(&self, payload: NotificationPayload) {
        if let Ok(mut launch) = self.launch.lock() {
            *launch = Some(payload);
        }
    }

    pub fn set_app_state(&self, status: AppStatus) {
        info!("App is now {:?}", status);
        if let Ok(mut current) = self.current.lock() {
            *current = status;
        }
        let _ = self.app_state.send(status);
    }

    /// Issues a new token, as the OS does after a reset or reinstall.
    pub fn rotate_token(&self) -> String {
        let token = fresh_token();
        if let Ok(mut current) = self.token.lock() {
            *current = token.clone();
        }
        info!("Platform rotated the push token");
        token
    }

    pub fn deliver(&self, payload: NotificationPayload) {
        let _ = self.notifications.send(NotificationEvent::Received(payload));
    }

    pub fn tap(&self, payload: NotificationPayload) {
        let _ = self.notifications.send(NotificationEvent::Responded(payload));
    }

    fn current_permission(&self) -> PermissionStatus {
        self.permission
            .lock()
            .map(|status| *status)
            .unwrap_or(PermissionStatus::Undetermined)
    }
}

fn fresh_token() -> String {
    format!("ExponentPushToken[{}]", Uuid::new_v4().simple())
}

fn poisoned() -> CourtsideError {
    courtside_common::platform_error("simulated platform state poisoned")
}

impl PushPlatform for SimulatedPlatform {
    fn device_platform(&self) -> DevicePlatform {
        self.platform
    }

    fn device_model(&self) -> Result<Option<String>, CourtsideError> {
        Ok(self.model.clone())
    }

    fn is_push_supported(&self) -> bool {
        true
    }

    fn permission_status(&self) -> BoxFuture<'_, PermissionStatus, CourtsideError> {
        let status = self.current_permission();
        Box::pin(async move { Ok(status) })
    }

    fn request_permission(&self) -> BoxFuture<'_, PermissionStatus, CourtsideError> {
        let answer = if self.grant_on_prompt {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };
        info!("Permission prompt answered: {:?}", answer);
        let result = self
            .permission
            .lock()
            .map(|mut status| {
                *status = answer;
                answer
            })
            .map_err(|_| poisoned());
        Box::pin(async move { result })
    }

    fn issue_token(&self, project_id: &str) -> BoxFuture<'_, String, CourtsideError> {
        info!("Issuing push token for project {}", project_id);
        let token = self.token.lock().map(|t| t.clone()).map_err(|_| poisoned());
        Box::pin(async move { token })
    }

    fn last_notification_response(
        &self,
    ) -> BoxFuture<'_, Option<NotificationPayload>, CourtsideError> {
        let launch = self
            .launch
            .lock()
            .map(|mut launch| launch.take())
            .map_err(|_| poisoned());
        Box::pin(async move { launch })
    }

    fn current_app_state(&self) -> AppStatus {
        self.current
            .lock()
            .map(|status| *status)
            .unwrap_or(AppStatus::Active)
    }

    fn subscribe_app_state(&self) -> broadcast::Receiver<AppStatus> {
        self.app_state.subscribe()
    }

    fn subscribe_notifications(&self) -> broadcast::Receiver<NotificationEvent> {
        self.notifications.subscribe()
    }
}

/// A line typed at the simulator prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Foreground,
    Background,
    Rotate,
    Tap(String, Option<String>),
    Deliver(String),
    Refresh,
    Init,
    Status,
    History,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err("empty command".to_string());
        };

        let command = match verb {
            "fg" => Command::Foreground,
            "bg" => Command::Background,
            "rotate" => Command::Rotate,
            "tap" => {
                let kind = words
                    .next()
                    .ok_or_else(|| "usage: tap <kind> [id]".to_string())?;
                Command::Tap(kind.to_string(), words.next().map(str::to_string))
            }
            "deliver" => {
                let kind = words
                    .next()
                    .ok_or_else(|| "usage: deliver <kind>".to_string())?;
                Command::Deliver(kind.to_string())
            }
            "refresh" => Command::Refresh,
            "init" => Command::Init,
            "status" => Command::Status,
            "history" => Command::History,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("unknown command {:?}", other)),
        };
        Ok(command)
    }
}

/// Builds the payload for `tap <kind> [id]`. Group-flavoured kinds get the
/// id as `groupId`, everything else as `eventId`.
pub fn tap_payload(kind: &str, id: Option<&str>) -> NotificationPayload {
    let payload = NotificationPayload::new(kind);
    match id {
        Some(id) if kind.starts_with("group") || kind.starts_with("join") => payload.with_group(id),
        Some(id) => payload.with_event(id),
        None => payload,
    }
}

pub const HELP: &str = "\
commands:
  fg | bg             move the app to the foreground / background
  rotate              issue a new push token
  tap <kind> [id]     tap a notification
  deliver <kind>      deliver a notification while in the foreground
  refresh             run a token refresh check now
  init                (re)initialize push
  status              show push state
  history             list the first page of notifications
  quit";
