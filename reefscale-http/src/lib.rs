//! The autoscaler's control-plane HTTP client base: digest authentication,
//! a shared rate limiter, pagination, and the error taxonomy every caller
//! matches on.

pub mod client;
pub mod digest;
pub mod error;
pub mod media;
pub mod pagination;
pub mod rate_limiter;

pub use client::{ApiClient, Credentials};
pub use error::ControlPlaneError;
pub use rate_limiter::{RateLimiter, RATE_MAX, RATE_WINDOW};
