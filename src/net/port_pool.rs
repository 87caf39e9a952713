//! Process-wide (or per-test) bounded set of free TCP ports.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;
use rand::seq::IteratorRandom;
use tracing::warn;

use crate::error::PoolError;

/// Default inclusive port range used by the global pool.
pub const DEFAULT_MIN_PORT: u16 = 6100;
pub const DEFAULT_MAX_PORT: u16 = 6200;

struct Inner {
    free: HashSet<u16>,
    min: u16,
    max: u16,
}

/// A mutex-guarded set of free ports in `[min, max]`.
#[derive(Clone)]
pub struct PortPool {
    inner: Arc<Mutex<Inner>>,
}

impl PortPool {
    pub fn new(min: u16, max: u16) -> Self {
        let free = (min..=max).collect();
        Self { inner: Arc::new(Mutex::new(Inner { free, min, max })) }
    }

    /// The process-wide default pool, initialized lazily on first use.
    pub fn global() -> &'static PortPool {
        static GLOBAL: OnceCell<PortPool> = OnceCell::new();
        GLOBAL.get_or_init(|| PortPool::new(DEFAULT_MIN_PORT, DEFAULT_MAX_PORT))
    }

    /// Removes and returns a uniformly random free port.
    ///
    /// # Errors
    /// Returns [`PoolError::Exhausted`] when no port is free.
    pub fn acquire(&self) -> Result<PortGuard, PoolError> {
        let mut guard = self.inner.lock().expect("port pool mutex poisoned");
        let port = guard.free.iter().copied().choose(&mut rand::thread_rng()).ok_or(PoolError::Exhausted)?;
        guard.free.remove(&port);
        drop(guard);
        Ok(PortGuard { pool: self.clone(), port: Some(port) })
    }

    /// Returns `port` to the free set. Out-of-range ports are ignored with a warning.
    pub fn release(&self, port: u16) {
        let mut guard = self.inner.lock().expect("port pool mutex poisoned");
        if port < guard.min || port > guard.max {
            warn!(port, "ignoring release of out-of-range port");
            return;
        }
        guard.free.insert(port);
    }

    /// Number of ports currently free. Used by tests to assert port conservation.
    pub fn free_count(&self) -> usize {
        self.inner.lock().expect("port pool mutex poisoned").free.len()
    }
}

/// RAII guard that releases its port back to the pool on drop, even on panic/early return —
/// mirrors the teacher's `ClearOnDrop` pattern in `net/transport.rs`.
pub struct PortGuard {
    pool: PortPool,
    port: Option<u16>,
}

impl PortGuard {
    pub fn port(&self) -> u16 {
        self.port.expect("port guard used after release")
    }
}

impl Drop for PortGuard {
    fn drop(&mut self) {
        if let Some(port) = self.port.take() {
            self.pool.release(port);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_release_conserves_free_count() {
        let pool = PortPool::new(7000, 7009);
        let before = pool.free_count();
        {
            let _guard = pool.acquire().unwrap();
            assert_eq!(pool.free_count(), before - 1);
        }
        assert_eq!(pool.free_count(), before);
    }

    #[test]
    fn exhaustion_is_an_error() {
        let pool = PortPool::new(7100, 7100);
        let guard = pool.acquire().unwrap();
        assert!(matches!(pool.acquire(), Err(PoolError::Exhausted)));
        drop(guard);
        assert!(pool.acquire().is_ok());
    }

    #[test]
    fn release_of_out_of_range_port_is_ignored() {
        let pool = PortPool::new(7200, 7201);
        let before = pool.free_count();
        pool.release(9999);
        assert_eq!(pool.free_count(), before);
    }
}
