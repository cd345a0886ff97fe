//! Fixed-size connection pool with blocking handoff (§4.1).
//!
//! The pool is sized once at construction. `acquire()` blocks until a
//! connection is free; `release()` (driven by `PooledConnection::drop`)
//! wakes exactly one waiter. Connections are interchangeable — there is no
//! per-connection affinity.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::error::{Error, Result};

/// A single pooled resource. Implementations own one live SQL connection;
/// validity is asserted by the caller, not polled by the pool itself.
pub trait PoolConnection: Send + 'static {}

impl<T: Send + 'static> PoolConnection for T {}

/// A fixed-size pool of interchangeable connections.
pub struct ConnectionPool<T: PoolConnection> {
    idle: Mutex<VecDeque<T>>,
    notify: Notify,
    capacity: usize,
}

impl<T: PoolConnection> ConnectionPool<T> {
    /// Build a pool from a already-constructed set of connections.
    /// Fails with [`Error::Config`] if the set is empty — an empty pool
    /// can never satisfy `acquire()`.
    pub fn new(connections: Vec<T>) -> Result<Arc<Self>> {
        if connections.is_empty() {
            return Err(Error::config("connection pool requires at least one connection"));
        }
        let capacity = connections.len();
        Ok(Arc::new(Self {
            idle: Mutex::new(connections.into_iter().collect()),
            notify: Notify::new(),
            capacity,
        }))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().expect("pool mutex poisoned").len()
    }

    /// Block until a connection is available, then hand it out.
    pub async fn acquire(self: &Arc<Self>) -> PooledConnection<T> {
        loop {
            if let Some(conn) = self.idle.lock().expect("pool mutex poisoned").pop_front() {
                return PooledConnection {
                    pool: Arc::clone(self),
                    conn: Some(conn),
                };
            }
            self.notify.notified().await;
        }
    }

    fn release(&self, conn: T) {
        self.idle.lock().expect("pool mutex poisoned").push_back(conn);
        self.notify.notify_one();
    }
}

/// A connection on loan from a [`ConnectionPool`]. Returned automatically on
/// drop.
pub struct PooledConnection<T: PoolConnection> {
    pool: Arc<ConnectionPool<T>>,
    conn: Option<T>,
}

impl<T: PoolConnection> Deref for PooledConnection<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.conn.as_ref().expect("connection taken before drop")
    }
}

impl<T: PoolConnection> DerefMut for PooledConnection<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.conn.as_mut().expect("connection taken before drop")
    }
}

impl<T: PoolConnection> Drop for PooledConnection<T> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn rejects_empty_pool() {
        let result = ConnectionPool::<u32>::new(vec![]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn acquire_blocks_until_release() {
        let pool = ConnectionPool::new(vec![1u32]).unwrap();
        let first = pool.acquire().await;
        assert_eq!(pool.idle_count(), 0);

        let pool2 = Arc::clone(&pool);
        let waiter = tokio::spawn(async move {
            let conn = pool2.acquire().await;
            *conn
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(first);

        let got = waiter.await.unwrap();
        assert_eq!(got, 1);
    }

    #[tokio::test]
    async fn release_wakes_exactly_one_waiter() {
        let pool = ConnectionPool::new(vec![1u32]).unwrap();
        let held = pool.acquire().await;

        let woken = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let pool = Arc::clone(&pool);
            let woken = Arc::clone(&woken);
            handles.push(tokio::spawn(async move {
                let conn = pool.acquire().await;
                woken.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                drop(conn);
            }));
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(woken.load(Ordering::SeqCst), 0);
        drop(held);

        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(woken.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn connections_are_interchangeable() {
        let pool = ConnectionPool::new(vec![1u32, 2, 3]).unwrap();
        let a = pool.acquire().await;
        let b = pool.acquire().await;
        let c = pool.acquire().await;
        let mut seen = vec![*a, *b, *c];
        seen.sort();
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
