use async_trait::async_trait;

use crate::api::agent_module::{ControlMap, ControlMessage, StatusMap};

/// Agent interface for control modules.
///
/// The agent core serializes calls into a module: [`Module::poll`],
/// [`Module::handle_control`] and [`Module::exposed_controls`] are never
/// issued concurrently against the same instance. Modules hold no background
/// tasks or timers and do not reconnect to their backends; a failed backend
/// surfaces as logged per-call failures until the agent restarts the module.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// Name under which the agent registers this module. Also the leading
    /// segment of the module's command topics.
    fn name(&self) -> &str;

    /// Gather the current status of every entity owned by this module.
    ///
    /// Best-effort: entities whose backend query fails are skipped, and a
    /// failed enumeration yields the last known status instead of an error.
    /// The returned map is a snapshot; later polls do not mutate it.
    async fn poll(&self) -> StatusMap;

    /// Handle a control command routed to this module.
    ///
    /// Never fails outward: unrecognized payloads are dropped, and backend
    /// failures are logged with the entity name and command.
    async fn handle_control(&self, msg: &ControlMessage);

    /// Advertise the controls this module exposes, keyed by prefixed
    /// control name. Best-effort in the same way as [`Module::poll`].
    async fn exposed_controls(&self) -> ControlMap;
}
