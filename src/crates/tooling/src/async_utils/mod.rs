//! Async helpers: bounded retry and deadlines

pub mod retry;
pub mod timeout;

pub use retry::{with_retry_if, RetryPolicy};
pub use timeout::{with_timeout, TimeoutError};
