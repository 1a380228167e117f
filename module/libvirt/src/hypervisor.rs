//! Hypervisor access seam of the libvirt module.
//!
//! The adapter talks to its hypervisor exclusively through these traits, so
//! tests and agent development can substitute the in-memory backend from
//! [`crate::mock`].

use async_trait::async_trait;
use thiserror::Error;

/// Authoritative domain lifecycle states, as reported by the hypervisor.
///
/// Richer than the ON/OFF abstraction the module exposes; the reduction
/// rule lives with the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainState {
    NoState,
    Running,
    Blocked,
    Paused,
    ShuttingDown,
    ShutOff,
    Crashed,
    Suspended,
}

#[derive(Debug, Error)]
pub enum HypervisorError {
    /// Failed to open the hypervisor connection. Fatal: the module must
    /// refuse to start.
    #[error("failed to connect to hypervisor: {0}")]
    Connection(String),

    /// Domain enumeration failed.
    #[error("failed to enumerate domains: {0}")]
    Lookup(String),

    /// No domain carries the requested name, exactly or case-insensitively.
    #[error("domain {0:?} not found")]
    DomainNotFound(String),

    /// A per-domain accessor failed.
    #[error("failed to query domain: {0}")]
    Query(String),

    /// A lifecycle operation failed.
    #[error("domain lifecycle operation failed: {0}")]
    Operation(String),
}

/// A hypervisor connection.
///
/// Exactly one instance exists per module; it is opened at module
/// initialization and torn down when the module is dropped.
#[async_trait]
pub trait Hypervisor: Send + Sync + 'static {
    type Domain: DomainRef;

    /// Enumerate all domains known to the hypervisor, active and defined.
    async fn list_domains(&self) -> Result<Vec<Self::Domain>, HypervisorError>;

    /// Exact-name lookup. `Ok(None)` when no domain carries this name.
    async fn lookup_by_name(&self, name: &str)
        -> Result<Option<Self::Domain>, HypervisorError>;
}

/// Handle to a single domain.
#[async_trait]
pub trait DomainRef: Send + Sync {
    fn name(&self) -> Result<String, HypervisorError>;

    async fn state(&self) -> Result<DomainState, HypervisorError>;

    /// Start the domain. Fire-and-forget: returns once the hypervisor has
    /// accepted the request, without waiting for the transition.
    async fn start(&self) -> Result<(), HypervisorError>;

    /// Force the domain off. Fire-and-forget, like [`DomainRef::start`].
    async fn stop(&self) -> Result<(), HypervisorError>;
}
