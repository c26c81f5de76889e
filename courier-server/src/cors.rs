//! Cross-origin policy
//!
//! Only the deployed frontends may call the API from a browser.

use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

/// Origins allowed to make cross-origin requests
pub const ALLOWED_ORIGINS: [&str; 3] = [
    "http://email.techfellowhomegroup8.net",
    "http://ec2-23-22-195-194.compute-1.amazonaws.com",
    "http://23.22.195.194",
];

/// Build the CORS layer for a fixed origin list
pub fn cors_layer<S: AsRef<str>>(origins: &[S]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.as_ref().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = o.as_ref(), "CORS: ignoring unparsable origin");
                None
            }
        })
        .collect();

    tracing::info!("CORS: Restricting to {} origin(s)", origins.len());

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::OPTIONS,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any)
}
