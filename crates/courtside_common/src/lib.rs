// --- File: crates/courtside_common/src/lib.rs ---

// Declare modules within this crate
pub mod error; // Error handling
pub mod http; // HTTP utilities
pub mod logging; // Logging utilities
pub mod models; // Shared data structures
pub mod services; // Collaborator abstractions

// Re-export error types and utilities for easier access
pub use error::{auth_error, platform_error, storage_error, CourtsideError};

// Re-export HTTP utilities for easier access
pub use http::{bearer, client::create_client, endpoint};

// Re-export logging utilities for easier access
pub use logging::{init, init_with_file, init_with_level, log_error, log_result};

pub use models::{
    ApiResponse, AppStatus, AuthSession, DevicePlatform, NotificationEvent, NotificationPayload,
    PermissionStatus,
};
pub use services::{BoxFuture, KeyValueStore, PushPlatform, SessionProvider};

// This crate holds what the Courtside crates share: errors, logging setup,
// the HTTP client factory, wire models and the traits behind which the
// platform, storage and session live.
