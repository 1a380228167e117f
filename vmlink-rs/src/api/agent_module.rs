//! Types used in the interface between the agent core and module
//! components.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// -- Status ---------------------------------------------------------------------------------------

/// Reduced two-value state of a switch entity.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SwitchState {
    On,
    Off,
}

impl SwitchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwitchState::On => "ON",
            SwitchState::Off => "OFF",
        }
    }
}

/// Status payload published for a single entity.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityStatus {
    pub state: SwitchState,
}

/// Status payload of a whole module, keyed by entity name.
pub type StatusMap = HashMap<String, EntityStatus>;

// -- Control --------------------------------------------------------------------------------------

/// Command payload accepted by switch entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchCommand {
    On,
    Off,
}

impl SwitchCommand {
    /// Parse an inbound command payload, case-insensitively. Payloads other
    /// than "ON" / "OFF" yield `None` and must be dropped without effect.
    pub fn parse(payload: &str) -> Option<Self> {
        match payload.to_uppercase().as_str() {
            "ON" => Some(SwitchCommand::On),
            "OFF" => Some(SwitchCommand::Off),
            _ => None,
        }
    }
}

/// Control invocation routed from the bus to a module.
///
/// The topic carries the routing segments as received, with the control
/// name in the last segment.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ControlMessage {
    pub topic: Vec<String>,
    pub payload: String,
}

// -- Control advertisement ------------------------------------------------------------------------

/// How the bus should render a control.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControlType {
    Switch,
}

/// Advertisement describing how the bus should render and route one
/// control. Regenerated on every request, never persisted.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ControlDescriptor {
    #[serde(rename = "type")]
    pub control_type: ControlType,
    pub icon: String,

    /// Topic the bus publishes command payloads to.
    pub command_topic: String,

    pub state_on: String,
    pub state_off: String,

    /// Expression the bus evaluates to read this control's state out of the
    /// module status payload.
    pub value_template: String,
}

/// Control advertisements of a whole module, keyed by prefixed control name.
pub type ControlMap = HashMap<String, ControlDescriptor>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_state_uses_upper_case_tokens() {
        assert_eq!(serde_json::to_string(&SwitchState::On).unwrap(), "\"ON\"");
        assert_eq!(serde_json::to_string(&SwitchState::Off).unwrap(), "\"OFF\"");
    }

    #[test]
    fn entity_status_wire_shape() {
        let status = EntityStatus {
            state: SwitchState::On,
        };
        assert_eq!(
            serde_json::to_string(&status).unwrap(),
            r#"{"state":"ON"}"#
        );
    }

    #[test]
    fn switch_command_parses_case_insensitively() {
        assert_eq!(SwitchCommand::parse("ON"), Some(SwitchCommand::On));
        assert_eq!(SwitchCommand::parse("on"), Some(SwitchCommand::On));
        assert_eq!(SwitchCommand::parse("Off"), Some(SwitchCommand::Off));
        assert_eq!(SwitchCommand::parse("toggle"), None);
        assert_eq!(SwitchCommand::parse(""), None);
    }

    #[test]
    fn control_type_serializes_under_the_type_key() {
        let descriptor = ControlDescriptor {
            control_type: ControlType::Switch,
            icon: "mdi:server".to_string(),
            command_topic: "libvirt/web01/command".to_string(),
            state_on: "ON".to_string(),
            state_off: "OFF".to_string(),
            value_template: String::new(),
        };
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["type"], "switch");
    }
}
