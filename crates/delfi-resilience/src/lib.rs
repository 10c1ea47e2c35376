//! Fault-tolerance primitives for the Delfi query gateway.
//!
//! A circuit breaker shields the LLM dependency from repeated failures,
//! and a dual rate limiter bounds concurrent database and LLM work.
//! Both are plain shared objects constructed once at startup; nothing
//! here is a global.

pub mod circuit_breaker;
pub mod rate_limiter;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use rate_limiter::{RateLimiter, RatePermit, SlotTimeout};
