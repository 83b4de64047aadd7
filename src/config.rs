/// Wallet manager configuration
///
/// Controls the unit selected for a fresh wallet store and the version
/// written when the storage schema is initialized.

use crate::types::DEFAULT_UNIT;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Unit made active when the store is first initialized
    pub default_unit: String,
    /// Version recorded under the schema version key
    pub schema_version: String,
}

impl ManagerConfig {
    pub fn with_default_unit(mut self, unit: impl Into<String>) -> Self {
        self.default_unit = unit.into();
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_unit: DEFAULT_UNIT.to_string(),
            schema_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
