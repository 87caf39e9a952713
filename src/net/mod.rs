//! Asynchronous message fabric: a bounded port pool plus per-party peer endpoints.

pub mod peer;
pub mod port_pool;
