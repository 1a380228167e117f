//! In-memory hypervisor backend for tests and agent development.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::hypervisor::{DomainRef, DomainState, Hypervisor, HypervisorError};

/// Recorded lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOp {
    Start(String),
    Stop(String),
}

#[derive(Debug, Clone)]
struct MockDomainSpec {
    name: String,
    state: DomainState,
    fail_state_query: bool,
    fail_lifecycle_ops: bool,
}

#[derive(Debug, Default)]
struct MockState {
    domains: Vec<MockDomainSpec>,
    ops: Vec<MockOp>,
    fail_enumeration: bool,
}

/// Scriptable hypervisor backend.
///
/// Lifecycle operations are applied to the domain table (`start` moves a
/// domain to `Running`, `stop` to `ShutOff`) and recorded for assertion, so
/// command idempotence is observable through re-read state.
#[derive(Debug, Default, Clone)]
pub struct MockHypervisor {
    state: Arc<Mutex<MockState>>,
}

impl MockHypervisor {
    pub fn new() -> Self {
        MockHypervisor::default()
    }

    pub fn add_domain(&self, name: &str, state: DomainState) {
        self.state.lock().unwrap().domains.push(MockDomainSpec {
            name: name.to_string(),
            state,
            fail_state_query: false,
            fail_lifecycle_ops: false,
        });
    }

    /// Add a domain whose state query always fails.
    pub fn add_unqueryable_domain(&self, name: &str) {
        self.state.lock().unwrap().domains.push(MockDomainSpec {
            name: name.to_string(),
            state: DomainState::NoState,
            fail_state_query: true,
            fail_lifecycle_ops: false,
        });
    }

    /// Make lifecycle operations against `name` fail.
    pub fn fail_lifecycle_ops(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(spec) = state.domains.iter_mut().find(|spec| spec.name == name) {
            spec.fail_lifecycle_ops = true;
        }
    }

    pub fn remove_domain(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .domains
            .retain(|spec| spec.name != name);
    }

    pub fn set_state(&self, name: &str, new_state: DomainState) {
        let mut state = self.state.lock().unwrap();
        if let Some(spec) = state.domains.iter_mut().find(|spec| spec.name == name) {
            spec.state = new_state;
        }
    }

    /// Make subsequent domain enumerations fail.
    pub fn fail_enumeration(&self, fail: bool) {
        self.state.lock().unwrap().fail_enumeration = fail;
    }

    /// Lifecycle operations recorded so far, in issue order.
    pub fn operations(&self) -> Vec<MockOp> {
        self.state.lock().unwrap().ops.clone()
    }
}

#[async_trait]
impl Hypervisor for MockHypervisor {
    type Domain = MockDomain;

    async fn list_domains(&self) -> Result<Vec<MockDomain>, HypervisorError> {
        let state = self.state.lock().unwrap();
        if state.fail_enumeration {
            return Err(HypervisorError::Lookup(
                "enumeration failure injected".to_string(),
            ));
        }
        Ok(state
            .domains
            .iter()
            .map(|spec| MockDomain {
                state: self.state.clone(),
                name: spec.name.clone(),
            })
            .collect())
    }

    async fn lookup_by_name(
        &self,
        name: &str,
    ) -> Result<Option<MockDomain>, HypervisorError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .domains
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| MockDomain {
                state: self.state.clone(),
                name: spec.name.clone(),
            }))
    }
}

/// Handle to a mock domain. State is re-read from the shared table on every
/// query.
#[derive(Debug)]
pub struct MockDomain {
    state: Arc<Mutex<MockState>>,
    name: String,
}

impl MockDomain {
    fn apply(&self, target: DomainState, op: MockOp) -> Result<(), HypervisorError> {
        let mut state = self.state.lock().unwrap();
        let idx = state
            .domains
            .iter()
            .position(|spec| spec.name == self.name)
            .ok_or_else(|| {
                HypervisorError::Operation(format!("domain {:?} vanished", self.name))
            })?;
        if state.domains[idx].fail_lifecycle_ops {
            return Err(HypervisorError::Operation(
                "lifecycle failure injected".to_string(),
            ));
        }
        state.domains[idx].state = target;
        state.ops.push(op);
        Ok(())
    }
}

#[async_trait]
impl DomainRef for MockDomain {
    fn name(&self) -> Result<String, HypervisorError> {
        Ok(self.name.clone())
    }

    async fn state(&self) -> Result<DomainState, HypervisorError> {
        let state = self.state.lock().unwrap();
        let spec = state
            .domains
            .iter()
            .find(|spec| spec.name == self.name)
            .ok_or_else(|| {
                HypervisorError::Query(format!("domain {:?} vanished", self.name))
            })?;
        if spec.fail_state_query {
            return Err(HypervisorError::Query(
                "state query failure injected".to_string(),
            ));
        }
        Ok(spec.state)
    }

    async fn start(&self) -> Result<(), HypervisorError> {
        self.apply(DomainState::Running, MockOp::Start(self.name.clone()))
    }

    async fn stop(&self) -> Result<(), HypervisorError> {
        self.apply(DomainState::ShutOff, MockOp::Stop(self.name.clone()))
    }
}
