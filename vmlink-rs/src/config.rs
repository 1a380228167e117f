use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

/// Base configuration object for every module.
///
/// Modules should expose this object under the `base` path in their
/// configuration. For instance, for a TOML configuration file:
///
/// ```toml
/// [base]
/// module_id = "e5e7258e-c18b-471d-bc03-8385495b29e4"
/// poll_interval = "30s"
///
/// [other_section]
/// hello = "world"
/// ```
#[derive(Deserialize, Debug, Clone)]
pub struct ModuleBaseConfig {
    pub module_id: Uuid,

    /// Interval between two status polls of this module.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}
