// --- File: crates/courtside_common/src/http.rs ---

// Include the client module
pub mod client;

/// Joins the backend base URL and an API path with exactly one slash.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Formats a bearer credential for the `Authorization` header.
pub fn bearer(access_token: &str) -> String {
    format!("Bearer {}", access_token)
}
