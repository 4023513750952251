//! Bounded pool of network clients
//!
//! `ClientPool` hands out `PooledClient` guards backed by a `ClientFactory`.
//! `LcdClientFactory` builds HTTP clients for a Secret Network LCD endpoint.

pub mod client;
pub mod error;
pub mod pool;

pub use client::{ClientFactory, LcdClient, LcdClientFactory, NetworkConfig};
pub use error::{Error, Result};
pub use pool::{
    ClientPool, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_MAX_CONNECTIONS, PoolConfig, PoolStats,
    PooledClient,
};
