//! Libvirt-backed hypervisor client.

use async_trait::async_trait;
use tracing::info;
use virt::connect::Connect;
use virt::domain::Domain;
use virt::sys;

use crate::hypervisor::{DomainRef, DomainState, Hypervisor, HypervisorError};

/// Hypervisor client holding a single libvirt connection.
///
/// Common URIs:
/// - `qemu:///system` - system-level QEMU/KVM
/// - `qemu:///session` - user session QEMU
/// - `qemu+ssh://user@host/system` - remote via SSH
pub struct LibvirtConnection {
    conn: Connect,
}

impl LibvirtConnection {
    /// Open a connection to the libvirt daemon at `uri`.
    pub fn open(uri: &str) -> Result<Self, HypervisorError> {
        let conn = Connect::open(Some(uri))
            .map_err(|err| HypervisorError::Connection(err.to_string()))?;
        info!(uri = %uri, "connected to libvirt");
        Ok(LibvirtConnection { conn })
    }
}

fn domain_state(state: sys::virDomainState) -> DomainState {
    match state {
        sys::VIR_DOMAIN_RUNNING => DomainState::Running,
        sys::VIR_DOMAIN_BLOCKED => DomainState::Blocked,
        sys::VIR_DOMAIN_PAUSED => DomainState::Paused,
        sys::VIR_DOMAIN_SHUTDOWN => DomainState::ShuttingDown,
        sys::VIR_DOMAIN_SHUTOFF => DomainState::ShutOff,
        sys::VIR_DOMAIN_CRASHED => DomainState::Crashed,
        sys::VIR_DOMAIN_PMSUSPENDED => DomainState::Suspended,
        _ => DomainState::NoState,
    }
}

#[async_trait]
impl Hypervisor for LibvirtConnection {
    type Domain = LibvirtDomain;

    async fn list_domains(&self) -> Result<Vec<LibvirtDomain>, HypervisorError> {
        let domains = self
            .conn
            .list_all_domains(0)
            .map_err(|err| HypervisorError::Lookup(err.to_string()))?;
        Ok(domains.into_iter().map(LibvirtDomain).collect())
    }

    async fn lookup_by_name(
        &self,
        name: &str,
    ) -> Result<Option<LibvirtDomain>, HypervisorError> {
        // Libvirt reports a missing domain as an error. Treat any failure of
        // the exact lookup as "not found"; a broken connection then surfaces
        // from the enumeration fallback instead.
        match Domain::lookup_by_name(&self.conn, name) {
            Ok(domain) => Ok(Some(LibvirtDomain(domain))),
            Err(_) => Ok(None),
        }
    }
}

/// Handle to a single libvirt domain.
pub struct LibvirtDomain(Domain);

#[async_trait]
impl DomainRef for LibvirtDomain {
    fn name(&self) -> Result<String, HypervisorError> {
        self.0
            .get_name()
            .map_err(|err| HypervisorError::Query(err.to_string()))
    }

    async fn state(&self) -> Result<DomainState, HypervisorError> {
        let (state, _reason) = self
            .0
            .get_state()
            .map_err(|err| HypervisorError::Query(err.to_string()))?;
        Ok(domain_state(state))
    }

    async fn start(&self) -> Result<(), HypervisorError> {
        self.0
            .create()
            .map(|_| ())
            .map_err(|err| HypervisorError::Operation(err.to_string()))
    }

    async fn stop(&self) -> Result<(), HypervisorError> {
        self.0
            .destroy()
            .map_err(|err| HypervisorError::Operation(err.to_string()))
    }
}
