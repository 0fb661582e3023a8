//! Registry configuration

use serde::{Deserialize, Serialize};

/// Tuning for an [`EternalLedger`](crate::EternalLedger) instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Notifications buffered per subscriber before slow receivers lag
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_event_capacity() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.event_capacity, 1024);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: RegistryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.event_capacity, 1024);
    }
}
