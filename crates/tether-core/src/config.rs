//! Manager configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConstraintError;

/// Maximum given to entities created without an explicit one.
pub const DEFAULT_MAX: i32 = 100;

/// Settings for a [`ConstraintManager`](crate::manager::ConstraintManager).
///
/// Every field has a default, so a partial JSON object (or `{}`) is a valid
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Maximum used by `create_entity_default`.
    pub default_max: i32,
    /// Initial value of the shifting policy.
    pub shifting_allowed: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            default_max: DEFAULT_MAX,
            shifting_allowed: true,
        }
    }
}

impl ManagerConfig {
    /// Rejects a negative default maximum.
    pub fn validate(&self) -> Result<(), ConstraintError> {
        if self.default_max < 0 {
            return Err(ConstraintError::ValueOutOfRange {
                value: 0,
                max: self.default_max,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config: ManagerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ManagerConfig::default());
        assert_eq!(config.default_max, 100);
        assert!(config.shifting_allowed);
    }

    #[test]
    fn partial_object_overrides_one_field() {
        let config: ManagerConfig =
            serde_json::from_str(r#"{"shifting_allowed": false}"#).unwrap();
        assert!(!config.shifting_allowed);
        assert_eq!(config.default_max, DEFAULT_MAX);
    }

    #[test]
    fn negative_default_max_is_invalid() {
        let config = ManagerConfig {
            default_max: -1,
            ..ManagerConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(ManagerConfig::default().validate().is_ok());
    }
}
