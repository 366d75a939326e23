// Copyright 2025-2026 Maurice S. Barnum
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bounded pool of exclusively-owned connections.
//!
//! Capacity is enforced with a semaphore: a caller first takes a permit, then
//! either reuses an idle connection or creates a new one.  Waiting for a
//! permit is how contention shows up; `acquire` never fails because the pool
//! is busy.  The permit travels with the [`PooledConnection`] and is returned
//! together with the connection when the guard is released or dropped, so
//! every exit path of a worker gives its connection back.

use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use async_trait::async_trait;
use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::Semaphore;
use tracing::debug;
use tracing::warn;

use crate::Error;
use crate::Result;
use crate::connection::Connection;

#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    type Connection: Connection;

    /// Create connection number `id`.  Ids are unique and count up from zero.
    async fn create(&self, id: usize) -> Result<Self::Connection>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub created: usize,
    pub idle: usize,
    pub checked_out: usize,
    pub max_checked_out: usize,
    pub acquires: usize,
    pub releases: usize,
    pub closed: bool,
}

mod inner {
    use super::{Arc, Mutex, Semaphore};

    #[derive(Debug)]
    pub(super) struct State<C> {
        pub(super) idle: Vec<C>,
        pub(super) next_id: usize,
        pub(super) created: usize,
        pub(super) checked_out: usize,
        /// Reserved slots whose connection is still being created
        pub(super) pending: usize,
        pub(super) max_checked_out: usize,
        pub(super) acquires: usize,
        pub(super) releases: usize,
        pub(super) closed: bool,
    }

    pub(super) struct Inner<F, C> {
        pub(super) factory: F,
        pub(super) capacity: usize,
        pub(super) permits: Arc<Semaphore>,
        pub(super) state: Mutex<State<C>>,
    }

    impl<C> State<C> {
        pub(super) fn check_out(&mut self) {
            self.acquires += 1;
            self.checked_out += 1;
            self.max_checked_out = self.max_checked_out.max(self.checked_out);
        }
    }

    impl<F, C> Inner<F, C> {
        pub(super) fn new(factory: F, capacity: usize) -> Self {
            Self {
                factory,
                capacity,
                permits: Arc::new(Semaphore::new(capacity)),
                state: Mutex::new(State {
                    idle: Vec::with_capacity(capacity),
                    next_id: 0,
                    created: 0,
                    checked_out: 0,
                    pending: 0,
                    max_checked_out: 0,
                    acquires: 0,
                    releases: 0,
                    closed: false,
                }),
            }
        }
    }
} // mod inner

type Inner<F> = inner::Inner<F, <F as ConnectionFactory>::Connection>;
type State<F> = inner::State<<F as ConnectionFactory>::Connection>;

pub struct ConnectionPool<F: ConnectionFactory> {
    inner: Arc<Inner<F>>,
}

impl<F: ConnectionFactory> Clone for ConnectionPool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    pub fn new(factory: F, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidConfig(
                "pool capacity must be at least 1".to_string(),
            ));
        }
        debug!(capacity, "connection pool created");
        Ok(Self {
            inner: Arc::new(inner::Inner::new(factory, capacity)),
        })
    }

    fn state(&self) -> MutexGuard<'_, State<F>> {
        // State stays consistent across a panic: every update is a single step.
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state();
        PoolStats {
            capacity: self.inner.capacity,
            created: state.created,
            idle: state.idle.len(),
            checked_out: state.checked_out,
            max_checked_out: state.max_checked_out,
            acquires: state.acquires,
            releases: state.releases,
            closed: state.closed,
        }
    }

    /// Check out a connection, waiting for one to be released if the pool is
    /// at capacity.  Fails only if the pool has been shut down or a new
    /// connection cannot be created.
    pub async fn acquire(&self) -> Result<PooledConnection<F>> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| Error::PoolClosed)?;

        // Check out under the lock; a new connection is created outside of it
        // and only counts as checked out once it exists.
        let reserved = {
            let mut state = self.state();
            if state.closed {
                return Err(Error::PoolClosed);
            }
            match state.idle.pop() {
                Some(conn) => {
                    state.check_out();
                    Ok(conn)
                }
                None => {
                    let id = state.next_id;
                    state.next_id += 1;
                    state.pending += 1;
                    Err(id)
                }
            }
        };

        // From here on the guard undoes the reservation, even if creation is
        // cancelled.
        let mut guard = PooledConnection {
            conn: None,
            pool: self.clone(),
            _permit: permit,
        };
        guard.conn = Some(match reserved {
            Ok(conn) => conn,
            Err(id) => {
                let conn = self
                    .inner
                    .factory
                    .create(id)
                    .await
                    .inspect_err(|err| warn!(id, %err, "connection creation failed"))?;
                debug!(id, "connection created");
                let mut state = self.state();
                state.pending -= 1;
                state.created += 1;
                state.check_out();
                conn
            }
        });
        Ok(guard)
    }

    /// Return a connection to the idle set.  Dropping the guard does the same.
    pub fn release(&self, conn: PooledConnection<F>) {
        drop(conn);
    }

    fn abandon(&self) {
        self.state().pending -= 1;
    }

    fn check_in(&self, conn: F::Connection) {
        let mut state = self.state();
        state.checked_out -= 1;
        state.releases += 1;
        if state.closed {
            // Too late to close it cleanly; the connection is simply dropped.
            warn!("connection released after pool shutdown");
            return;
        }
        state.idle.push(conn);
    }

    /// Create connections up front until `n` (at most the capacity) exist
    pub async fn prewarm(&self, n: usize) -> Result<()> {
        let n = n.min(self.inner.capacity);
        let mut held = Vec::with_capacity(n);
        while self.stats().created < n {
            held.push(self.acquire().await?);
        }
        drop(held);
        debug!(created = n, "connection pool prewarmed");
        Ok(())
    }

    /// Close every connection.  All connections must have been released.
    pub async fn shutdown(&self) -> Result<()> {
        let idle = {
            let mut state = self.state();
            if state.closed {
                return Err(Error::PoolClosed);
            }
            let outstanding = state.checked_out + state.pending;
            if outstanding > 0 {
                return Err(Error::ConnectionsOutstanding(outstanding));
            }
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        self.inner.permits.close();

        let count = idle.len();
        let mut first_err = None;
        for conn in idle {
            if let Err(err) = conn.close().await {
                warn!(%err, "connection close failed");
                first_err.get_or_insert(err);
            }
        }
        debug!(closed = count, "connection pool shut down");
        first_err.map_or(Ok(()), Err)
    }
}

/// A checked-out connection, exclusively owned until it goes back to the pool
pub struct PooledConnection<F: ConnectionFactory> {
    conn: Option<F::Connection>,
    pool: ConnectionPool<F>,
    // Released after the connection is back in the idle set
    _permit: OwnedSemaphorePermit,
}

impl<F: ConnectionFactory> Deref for PooledConnection<F> {
    type Target = F::Connection;

    fn deref(&self) -> &Self::Target {
        // Set before the guard is handed out, taken only by `drop`.
        self.conn.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<F: ConnectionFactory> DerefMut for PooledConnection<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<F: ConnectionFactory> Drop for PooledConnection<F> {
    fn drop(&mut self) {
        match self.conn.take() {
            Some(conn) => self.pool.check_in(conn),
            None => self.pool.abandon(),
        }
    }
}
