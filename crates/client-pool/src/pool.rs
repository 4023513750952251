//! Bounded pool of network clients
//!
//! Capacity is enforced by a tokio `Semaphore` with `max_connections` permits.
//! Every checked-out client holds one permit inside its `PooledClient` guard,
//! so dropping the guard in any task wakes the next waiter. Bookkeeping
//! (idle list, counters, generation) lives under a single `std::sync::Mutex`
//! that is never held across an await.
//!
//! Reset and close bump the generation. A guard from an older generation
//! discards its client on drop instead of returning it to the idle list.
//! Reset hands the semaphore a fresh permit for every discarded checkout, and
//! the stale guard forgets its own permit, so the semaphore never holds more
//! than `max_connections` permits in total.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::client::{ClientFactory, NetworkConfig};
use crate::error::{Error, Result};

/// Default upper bound on live clients.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Default bound on how long `acquire` waits for a free client.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(300);

/// Pool sizing and wait bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: usize,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::InvalidConfig(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.acquire_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "acquire_timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Consistent snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub idle: usize,
    pub in_use: usize,
    pub max: usize,
    pub requests_served: u64,
}

struct IdleClient<C> {
    id: u64,
    client: C,
}

struct PoolState<C> {
    idle: Vec<IdleClient<C>>,
    in_use: usize,
    requests_served: u64,
    generation: u64,
    next_id: u64,
    closed: bool,
}

impl<C> PoolState<C> {
    fn stats(&self, max: usize) -> PoolStats {
        PoolStats {
            total: self.idle.len() + self.in_use,
            idle: self.idle.len(),
            in_use: self.in_use,
            max,
            requests_served: self.requests_served,
        }
    }

    // Count a checkout and hand back the generation it belongs to.
    fn check_out(&mut self) -> u64 {
        self.in_use += 1;
        self.requests_served += 1;
        metrics::gauge!("client_pool_in_use").set(self.in_use as f64);
        self.generation
    }

    // Drop every handle and start a new generation. Returns the number of
    // checkouts that were abandoned.
    fn clear(&mut self) -> usize {
        let abandoned = self.in_use;
        self.idle.clear();
        self.in_use = 0;
        self.requests_served = 0;
        self.generation += 1;
        metrics::gauge!("client_pool_in_use").set(0.0);
        abandoned
    }
}

struct Shared<F: ClientFactory> {
    factory: F,
    network: NetworkConfig,
    config: PoolConfig,
    state: Mutex<PoolState<F::Client>>,
    semaphore: Arc<Semaphore>,
}

impl<F: ClientFactory> Shared<F> {
    fn lock(&self) -> MutexGuard<'_, PoolState<F::Client>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Bounded, lazily-filled pool of clients built by `F`.
///
/// Cloning is cheap and every clone shares the same pool.
pub struct ClientPool<F: ClientFactory> {
    inner: Arc<Shared<F>>,
}

impl<F: ClientFactory> Clone for ClientPool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F: ClientFactory> std::fmt::Debug for ClientPool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientPool")
            .field("network", &self.inner.network)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<F: ClientFactory> ClientPool<F> {
    /// Create an empty pool. Clients are built on demand.
    pub fn new(factory: F, network: NetworkConfig, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        info!(
            max_connections = config.max_connections,
            acquire_timeout_secs = config.acquire_timeout.as_secs_f64(),
            endpoint = %network.endpoint,
            chain_id = %network.chain_id,
            "client pool initialized"
        );
        Ok(Self {
            inner: Arc::new(Shared {
                semaphore: Arc::new(Semaphore::new(config.max_connections)),
                factory,
                network,
                config,
                state: Mutex::new(PoolState {
                    idle: Vec::new(),
                    in_use: 0,
                    requests_served: 0,
                    generation: 0,
                    next_id: 0,
                    closed: false,
                }),
            }),
        })
    }

    /// Sizing and wait bounds the pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Network every client in this pool talks to.
    pub fn network(&self) -> &NetworkConfig {
        &self.inner.network
    }

    /// Check out a client, waiting up to the configured acquire timeout.
    pub async fn acquire(&self) -> Result<PooledClient<F>> {
        self.acquire_timeout(self.inner.config.acquire_timeout).await
    }

    /// Check out a client, waiting at most `timeout` for one to free up.
    ///
    /// Idle clients are reused before new ones are created. Dropping the
    /// returned future while it waits leaves the pool untouched.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<PooledClient<F>> {
        let started = Instant::now();
        if self.inner.lock().closed {
            metrics::counter!("client_pool_acquire_total", "outcome" => "closed").increment(1);
            return Err(Error::PoolClosed);
        }

        let permit = match tokio::time::timeout(
            timeout,
            self.inner.semaphore.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                metrics::counter!("client_pool_acquire_total", "outcome" => "closed")
                    .increment(1);
                return Err(Error::PoolClosed);
            }
            Err(_) => {
                warn!(
                    max_connections = self.inner.config.max_connections,
                    timeout_secs = timeout.as_secs_f64(),
                    "client pool exhausted"
                );
                metrics::counter!("client_pool_acquire_total", "outcome" => "timeout")
                    .increment(1);
                return Err(Error::ResourceExhausted {
                    max_connections: self.inner.config.max_connections,
                    timeout,
                });
            }
        };

        {
            let mut state = self.inner.lock();
            if state.closed {
                return Err(Error::PoolClosed);
            }
            if let Some(IdleClient { id, client }) = state.idle.pop() {
                let generation = state.check_out();
                debug!(client_id = id, in_use = state.in_use, "reusing idle client");
                metrics::counter!("client_pool_acquire_total", "outcome" => "reused")
                    .increment(1);
                record_wait(started);
                return Ok(self.guard(id, generation, client, permit));
            }
        }

        // The permit reserves capacity while the factory runs.
        let client = match self.inner.factory.create(&self.inner.network).await {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, endpoint = %self.inner.network.endpoint, "client creation failed");
                metrics::counter!("client_pool_acquire_total", "outcome" => "error")
                    .increment(1);
                return Err(match e {
                    Error::Network(_) | Error::Request { .. } => e,
                    other => Error::Network(other.to_string()),
                });
            }
        };

        let mut state = self.inner.lock();
        if state.closed {
            debug!("pool closed during client creation, discarding client");
            return Err(Error::PoolClosed);
        }
        let id = state.next_id;
        state.next_id += 1;
        let generation = state.check_out();
        info!(
            client_id = id,
            total = state.idle.len() + state.in_use,
            max = self.inner.config.max_connections,
            "created client"
        );
        metrics::counter!("client_pool_connections_created_total").increment(1);
        metrics::counter!("client_pool_acquire_total", "outcome" => "created").increment(1);
        drop(state);
        record_wait(started);
        Ok(self.guard(id, generation, client, permit))
    }

    fn guard(
        &self,
        id: u64,
        generation: u64,
        client: F::Client,
        permit: OwnedSemaphorePermit,
    ) -> PooledClient<F> {
        PooledClient {
            client: Some(client),
            id,
            generation,
            permit: Some(permit),
            pool: self.inner.clone(),
        }
    }

    /// Snapshot of the counters, taken under the state lock.
    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats(self.inner.config.max_connections)
    }

    /// Discard every client and zero the counters. The pool stays usable and
    /// the next acquire can build a new client right away; clients still
    /// checked out are dropped when their guards are.
    pub fn reset(&self) {
        let mut state = self.inner.lock();
        if state.closed {
            return;
        }
        let idle = state.idle.len();
        let abandoned = state.clear();
        // Stale guards forget their permits on drop.
        self.inner.semaphore.add_permits(abandoned);
        info!(idle, abandoned, "client pool reset");
    }

    /// Discard every client and refuse all further acquires, including ones
    /// already waiting. Calling it again is a no-op.
    pub fn close(&self) {
        {
            let mut state = self.inner.lock();
            if state.closed {
                debug!("client pool already closed");
                return;
            }
            state.closed = true;
            let idle = state.idle.len();
            let abandoned = state.clear();
            info!(idle, abandoned, "client pool closed");
        }
        self.inner.semaphore.close();
    }

    /// Whether [`ClientPool::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

fn record_wait(started: Instant) {
    metrics::histogram!("client_pool_acquire_wait_seconds").record(started.elapsed().as_secs_f64());
}

/// A checked-out client. Returns to the pool on drop.
pub struct PooledClient<F: ClientFactory> {
    client: Option<F::Client>,
    id: u64,
    generation: u64,
    permit: Option<OwnedSemaphorePermit>,
    pool: Arc<Shared<F>>,
}

impl<F: ClientFactory> PooledClient<F> {
    /// Pool-assigned handle id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Return the client to the pool now.
    pub fn release(self) {}
}

impl<F: ClientFactory> Deref for PooledClient<F> {
    type Target = F::Client;

    fn deref(&self) -> &F::Client {
        self.client.as_ref().expect("client is present until drop")
    }
}

impl<F: ClientFactory> DerefMut for PooledClient<F> {
    fn deref_mut(&mut self) -> &mut F::Client {
        self.client.as_mut().expect("client is present until drop")
    }
}

impl<F: ClientFactory> std::fmt::Debug for PooledClient<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledClient")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl<F: ClientFactory> Drop for PooledClient<F> {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        let mut state = self.pool.lock();
        if state.closed {
            debug!(client_id = self.id, "discarding client from closed pool");
        } else if state.generation != self.generation {
            // Reset already replaced this permit.
            if let Some(permit) = self.permit.take() {
                permit.forget();
            }
            debug!(client_id = self.id, "discarding client from previous generation");
        } else {
            state.in_use -= 1;
            state.idle.push(IdleClient {
                id: self.id,
                client,
            });
            metrics::gauge!("client_pool_in_use").set(state.in_use as f64);
            debug!(client_id = self.id, idle = state.idle.len(), "client released");
        }
        drop(state);
        // Release capacity only after the client is back on the idle list.
        drop(self.permit.take());
    }
}
