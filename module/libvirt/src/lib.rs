//! VMLink libvirt module.
//!
//! Mirrors the domains of a libvirt daemon as switch entities on the
//! automation bus: every domain is advertised as one ON/OFF switch, status
//! polls reduce each domain's lifecycle state to that two-value abstraction,
//! and inbound switch commands are forwarded as start / destroy operations.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use vmlink_rs::api::agent_module::{
    ControlDescriptor, ControlMap, ControlMessage, ControlType, EntityStatus, StatusMap,
    SwitchCommand, SwitchState,
};
use vmlink_rs::config::ModuleBaseConfig;
use vmlink_rs::module::Module;

use crate::hypervisor::{DomainRef, DomainState, Hypervisor, HypervisorError};
use crate::libvirt::LibvirtConnection;

pub mod hypervisor;
pub mod libvirt;
pub mod mock;

/// Module name, leading command topic segment and control name prefix.
pub const MODULE_NAME: &str = "libvirt";

const CONTROL_ICON: &str = "mdi:server";

/// Configuration of the libvirt module.
#[derive(Deserialize, Debug, Clone)]
pub struct LibvirtModuleConfig {
    /// Base configuration, identical across all modules:
    pub base: ModuleBaseConfig,

    pub libvirt: LibvirtConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LibvirtConfig {
    /// Connection URI of the libvirt daemon to manage.
    #[serde(default = "default_uri")]
    pub uri: String,
}

fn default_uri() -> String {
    "qemu:///system".to_string()
}

/// The domain-state reconciliation and control adapter.
pub struct LibvirtModule<H: Hypervisor> {
    hypervisor: H,

    /// Last known state per domain name. Merged on every poll; entries are
    /// never evicted, so a vanished domain keeps its last observed state.
    domains: Mutex<StatusMap>,
}

impl LibvirtModule<LibvirtConnection> {
    /// Open the module against the configured libvirt endpoint.
    ///
    /// A connection failure here is fatal: the error propagates to the host
    /// and the module must not be registered.
    pub fn connect(config: &LibvirtConfig) -> Result<Self, HypervisorError> {
        Ok(LibvirtModule::new(LibvirtConnection::open(&config.uri)?))
    }
}

impl<H: Hypervisor> LibvirtModule<H> {
    pub fn new(hypervisor: H) -> Self {
        LibvirtModule {
            hypervisor,
            domains: Mutex::new(StatusMap::new()),
        }
    }

    /// Resolve a domain by name: exact lookup first, then a linear scan
    /// comparing lower-cased names, first match wins.
    async fn resolve_domain(&self, name: &str) -> Result<H::Domain, HypervisorError> {
        if let Some(domain) = self.hypervisor.lookup_by_name(name).await? {
            return Ok(domain);
        }

        let lowered = name.to_lowercase();
        for domain in self.hypervisor.list_domains().await? {
            match domain.name() {
                Ok(candidate) if candidate.to_lowercase() == lowered => return Ok(domain),
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "skipping domain with unreadable name");
                }
            }
        }

        Err(HypervisorError::DomainNotFound(name.to_string()))
    }

    async fn apply_command(
        &self,
        name: &str,
        command: SwitchCommand,
    ) -> Result<(), HypervisorError> {
        let domain = self.resolve_domain(name).await?;
        let state = domain.state().await?;

        match command {
            SwitchCommand::On if state == DomainState::Running => {
                info!(domain = %name, "domain is already running");
            }
            SwitchCommand::On => {
                info!(domain = %name, "starting domain");
                domain.start().await?;
            }
            SwitchCommand::Off if state == DomainState::ShutOff => {
                info!(domain = %name, "domain is already stopped");
            }
            SwitchCommand::Off => {
                info!(domain = %name, "stopping domain");
                domain.stop().await?;
            }
        }

        Ok(())
    }
}

fn reduce_state(state: DomainState) -> SwitchState {
    match state {
        DomainState::Running | DomainState::Paused => SwitchState::On,
        _ => SwitchState::Off,
    }
}

fn switch_descriptor(name: &str) -> ControlDescriptor {
    ControlDescriptor {
        control_type: ControlType::Switch,
        icon: CONTROL_ICON.to_string(),
        command_topic: format!("{MODULE_NAME}/{name}/command"),
        state_on: SwitchState::On.as_str().to_string(),
        state_off: SwitchState::Off.as_str().to_string(),
        value_template: format!("{{{{ value_json.get('{name}', {{}}).get('state') }}}}"),
    }
}

/// Strip the module prefix off a control name, yielding the domain name.
fn domain_name_of_control(control: &str) -> &str {
    control
        .strip_prefix(MODULE_NAME)
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(control)
}

#[async_trait]
impl<H: Hypervisor> Module for LibvirtModule<H> {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    async fn poll(&self) -> StatusMap {
        let mut domains = self.domains.lock().await;

        match self.hypervisor.list_domains().await {
            Ok(list) => {
                for domain in list {
                    let name = match domain.name() {
                        Ok(name) => name,
                        Err(err) => {
                            warn!(error = %err, "failed to read domain name");
                            continue;
                        }
                    };
                    match domain.state().await {
                        Ok(state) => {
                            domains.insert(
                                name,
                                EntityStatus {
                                    state: reduce_state(state),
                                },
                            );
                        }
                        Err(err) => {
                            warn!(domain = %name, error = %err, "failed to query domain state");
                        }
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to enumerate domains, reporting last known state");
            }
        }

        domains.clone()
    }

    async fn handle_control(&self, msg: &ControlMessage) {
        let Some(control) = msg.topic.last() else {
            warn!(topic = ?msg.topic, "control message carries no control name");
            return;
        };
        let domain_name = domain_name_of_control(control);

        // Unrecognized payloads are dropped without effect.
        let Some(command) = SwitchCommand::parse(&msg.payload) else {
            return;
        };

        if let Err(err) = self.apply_command(domain_name, command).await {
            warn!(
                domain = %domain_name,
                command = %msg.payload,
                error = %err,
                "failed to control domain"
            );
        }
    }

    async fn exposed_controls(&self) -> ControlMap {
        let mut controls = ControlMap::new();

        match self.hypervisor.list_domains().await {
            Ok(list) => {
                for domain in list {
                    match domain.name() {
                        Ok(name) => {
                            controls
                                .insert(format!("{MODULE_NAME}_{name}"), switch_descriptor(&name));
                        }
                        Err(err) => {
                            warn!(error = %err, "failed to read domain name");
                        }
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to enumerate domains");
            }
        }

        controls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHypervisor;

    #[test]
    fn control_names_strip_the_module_prefix() {
        assert_eq!(domain_name_of_control("libvirt_Web01"), "Web01");
        assert_eq!(domain_name_of_control("Web01"), "Web01");
        assert_eq!(domain_name_of_control("libvirt_"), "");
    }

    #[test]
    fn module_config_parses_with_defaults() {
        let config: LibvirtModuleConfig = toml::from_str(
            r#"
            [base]
            module_id = "e5e7258e-c18b-471d-bc03-8385495b29e4"
            poll_interval = "30s"

            [libvirt]
            "#,
        )
        .unwrap();
        assert_eq!(config.libvirt.uri, "qemu:///system");
        assert_eq!(
            config.base.poll_interval,
            std::time::Duration::from_secs(30)
        );
    }

    #[test]
    fn module_config_accepts_a_custom_uri() {
        let config: LibvirtModuleConfig = toml::from_str(
            r#"
            [base]
            module_id = "e5e7258e-c18b-471d-bc03-8385495b29e4"
            poll_interval = "1m"

            [libvirt]
            uri = "qemu:///session"
            "#,
        )
        .unwrap();
        assert_eq!(config.libvirt.uri, "qemu:///session");
    }

    #[tokio::test]
    async fn resolution_prefers_the_exact_name() {
        let hypervisor = MockHypervisor::new();
        hypervisor.add_domain("web01", DomainState::Running);
        hypervisor.add_domain("Web01", DomainState::ShutOff);
        let module = LibvirtModule::new(hypervisor);

        let domain = module.resolve_domain("Web01").await.unwrap();
        assert_eq!(domain.state().await.unwrap(), DomainState::ShutOff);
    }

    #[tokio::test]
    async fn resolution_falls_back_to_case_insensitive_match() {
        let hypervisor = MockHypervisor::new();
        hypervisor.add_domain("WebServer", DomainState::Running);
        let module = LibvirtModule::new(hypervisor);

        let domain = module.resolve_domain("webserver").await.unwrap();
        assert_eq!(domain.name().unwrap(), "WebServer");
    }

    #[tokio::test]
    async fn resolution_of_unknown_name_fails() {
        let hypervisor = MockHypervisor::new();
        hypervisor.add_domain("WebServer", DomainState::Running);
        let module = LibvirtModule::new(hypervisor);

        match module.resolve_domain("database").await {
            Err(HypervisorError::DomainNotFound(name)) => assert_eq!(name, "database"),
            other => panic!("expected DomainNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolution_propagates_enumeration_failures() {
        let hypervisor = MockHypervisor::new();
        hypervisor.fail_enumeration(true);
        let module = LibvirtModule::new(hypervisor);

        assert!(matches!(
            module.resolve_domain("webserver").await,
            Err(HypervisorError::Lookup(_))
        ));
    }
}
