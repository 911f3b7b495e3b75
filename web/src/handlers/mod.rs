//! HTTP request handlers.

pub mod guest;
pub mod health;
pub mod realtime;

pub use health::health_check;
