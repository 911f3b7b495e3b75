//! HTTP and websocket surface for Stayline guest access.
//!
//! # Routes
//!
//! | Method | Path | Caller |
//! |--------|------|--------|
//! | GET | `/health` | load balancer |
//! | GET | `/api/v1/hotels/:hotel/guest/context` | guest |
//! | POST | `/api/v1/hotels/:hotel/guest/chat` | guest |
//! | POST | `/api/v1/hotels/:hotel/guest/orders` | guest |
//! | POST | `/api/v1/realtime/auth` | guest or staff |
//! | GET | `/api/v1/realtime/ws` | any websocket client |
//!
//! # Request Flow
//!
//! ```text
//! HTTP request
//!   → correlation middleware (X-Correlation-ID in, span, header out)
//!   → extractors (GuestToken / StaffBearer / CorrelationId)
//!   → stayline-auth service
//!   → AppError mapping on failure
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod relay;
pub mod state;

pub use error::AppError;
pub use extractors::{CorrelationId, GUEST_TOKEN_HEADER, GuestToken, StaffBearer};
pub use middleware::{CORRELATION_ID_HEADER, propagate_correlation_id};
pub use relay::{RelayHub, spawn_bus_pump};
pub use state::{AppState, Backend};

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Build the application router.
pub fn router<B: Backend>(state: AppState<B>) -> Router {
    let guest = Router::new()
        .route("/context", get(handlers::guest::get_context::<B>))
        .route("/chat", post(handlers::guest::send_chat::<B>))
        .route("/orders", post(handlers::guest::place_order::<B>));

    let realtime = Router::new()
        .route("/auth", post(handlers::realtime::authorize_channel::<B>))
        .route("/ws", get(handlers::realtime::websocket::<B>));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1/hotels/:hotel/guest", guest)
        .nest("/api/v1/realtime", realtime)
        .layer(axum::middleware::from_fn(propagate_correlation_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
