//! Construction-time configuration for a [`World`](crate::world::World).
//!
//! ```
//! use orrery_ecs::config::EcsConfig;
//!
//! let config = EcsConfig::from_json_str(r#"{ "max_components": 8 }"#).unwrap();
//! assert_eq!(config.max_components, 8);
//! assert_eq!(config.initial_entity_capacity, 0);
//! ```

use serde::{Deserialize, Serialize};

use crate::signature::MAX_COMPONENTS;
use crate::EcsError;

/// Sizing parameters for a world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EcsConfig {
    /// Maximum number of distinct component types, i.e. the signature
    /// width in use. Must be in `1..=MAX_COMPONENTS`.
    pub max_components: usize,
    /// Entity slots to reserve up front.
    pub initial_entity_capacity: usize,
}

impl Default for EcsConfig {
    /// Full signature width, no preallocation.
    fn default() -> Self {
        Self {
            max_components: MAX_COMPONENTS,
            initial_entity_capacity: 0,
        }
    }
}

impl EcsConfig {
    /// Check that the values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if `max_components` is zero or
    /// exceeds [`MAX_COMPONENTS`].
    pub fn validate(&self) -> Result<(), EcsError> {
        if self.max_components == 0 || self.max_components > MAX_COMPONENTS {
            return Err(EcsError::InvalidConfig {
                reason: format!(
                    "max_components must be in 1..={MAX_COMPONENTS}, got {}",
                    self.max_components
                ),
            });
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration. Missing fields take their
    /// default values.
    ///
    /// # Errors
    ///
    /// [`EcsError::ConfigParse`] for malformed JSON or unknown fields,
    /// [`EcsError::InvalidConfig`] for out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self, EcsError> {
        let config: EcsConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = EcsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_components, 64);
    }

    #[test]
    fn out_of_range_width_is_rejected() {
        for width in [0, MAX_COMPONENTS + 1] {
            let config = EcsConfig {
                max_components: width,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(EcsError::InvalidConfig { .. })
            ));
        }
    }

    #[test]
    fn json_errors_are_config_errors() {
        assert!(matches!(
            EcsConfig::from_json_str("{ not json"),
            Err(EcsError::ConfigParse(_))
        ));
        assert!(matches!(
            EcsConfig::from_json_str(r#"{ "max_entities": 3 }"#),
            Err(EcsError::ConfigParse(_))
        ));
        assert!(matches!(
            EcsConfig::from_json_str(r#"{ "max_components": 0 }"#),
            Err(EcsError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn json_round_trip() {
        let config = EcsConfig {
            max_components: 16,
            initial_entity_capacity: 1024,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(EcsConfig::from_json_str(&json).unwrap(), config);
    }
}
