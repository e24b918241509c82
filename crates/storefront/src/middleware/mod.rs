//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers
//! 5. Session layer (tower-sessions, in-memory store)
//! 6. Route authorization gate (needs the session)

pub mod auth;
pub mod gate;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    OptionalToken, RequireToken, clear_session_token, current_token, set_session_token,
};
pub use gate::route_gate_middleware;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
