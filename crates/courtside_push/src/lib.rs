//! Push-notification device identity and token lifecycle for Courtside
//!
//! This crate keeps a device's push registration on the Courtside backend in
//! sync with the token the platform hands out, and turns notification taps
//! into navigation intents for the UI.
//!
//! # Features
//!
//! - A stable device identifier that survives token rotation
//! - Permission prompt and token acquisition through a platform seam
//! - Register/update calls against the backend token registry
//! - Foreground and periodic refresh triggers with heartbeat re-registration
//! - Tap routing to event and group screens
//! - Admin broadcast and inbox endpoints
//!
//! # Usage
//!
//! Add the crate to your dependencies:
//!
//! ```toml
//! [dependencies]
//! courtside-push = { version = "0.1.0" }
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use courtside_common::{KeyValueStore, PushPlatform};
//! use courtside_push::{JsonFileStore, NotificationService, SharedSession};
//!
//! async fn start(platform: Arc<dyn PushPlatform>) -> Result<(), Box<dyn std::error::Error>> {
//!     let config = courtside_config::load_config()?;
//!     let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open("device.json").await?);
//!     let session = SharedSession::new();
//!
//!     let service =
//!         NotificationService::from_config(&config, platform, store, Arc::new(session))?;
//!     let token = service.initialize().await?;
//!     println!("registered {}", token);
//!
//!     service.cleanup();
//!     Ok(())
//! }
//! ```

mod api;
pub mod error;
pub mod identity;
pub mod inbox;
pub mod registry;
pub mod router;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod state;
pub mod storage;
pub mod subscriptions;
pub mod token;

pub use error::{ErrorKind, PushError};
pub use identity::{DeviceIdentity, DeviceIdentityStore, PlatformTag};
pub use inbox::{
    AdminNotification, NotificationApi, NotificationRecord, RecipientScope, SendReceipt,
};
pub use registry::{RegistrationPayload, RegistryClient, TokenRegistry};
pub use router::{NavigationIntent, NotificationKind, TapRouter};
pub use scheduler::{
    decide_operation, Operation, RefreshScheduler, RefreshTarget, Trigger, UpdateReason,
};
pub use service::{
    InactiveReason, NotificationService, NotificationServiceBuilder, PushEvent, RefreshOutcome,
    ServiceOptions, ServiceState,
};
pub use session::SharedSession;
pub use state::{PushTokenRecord, RegistrationState};
pub use storage::{JsonFileStore, MemoryStore};
pub use subscriptions::SubscriptionSet;
pub use token::{is_valid_token, Acquisition, PushToken, TokenAcquirer, UnavailableReason};
