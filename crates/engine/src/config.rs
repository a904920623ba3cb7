use std::env;

use tracing::warn;

pub const INVENTORY_CAPACITY_ENV_VAR: &str = "SIGNAL_LOST_INVENTORY_CAPACITY";
pub const DEFAULT_INVENTORY_CAPACITY: u32 = 20;
pub const DEFAULT_FREQUENCY_EPSILON: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// Maximum total quantity across all held items.
    pub inventory_capacity: u32,
    /// Two frequencies closer than this (MHz) are the same log entry.
    pub frequency_epsilon: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inventory_capacity: DEFAULT_INVENTORY_CAPACITY,
            frequency_epsilon: DEFAULT_FREQUENCY_EPSILON,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = env::var(INVENTORY_CAPACITY_ENV_VAR) {
            match parse_capacity(&raw) {
                Some(capacity) => config.inventory_capacity = capacity,
                None => warn!(
                    var = INVENTORY_CAPACITY_ENV_VAR,
                    value = %raw,
                    "config_value_ignored"
                ),
            }
        }
        config
    }

    pub fn with_inventory_capacity(mut self, capacity: u32) -> Self {
        self.inventory_capacity = capacity;
        self
    }
}

fn parse_capacity(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|value| *value > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_must_be_positive_integer() {
        assert_eq!(parse_capacity(" 12 "), Some(12));
        assert_eq!(parse_capacity("0"), None);
        assert_eq!(parse_capacity("lots"), None);
    }

    #[test]
    fn builder_overrides_capacity_only() {
        let config = SessionConfig::default().with_inventory_capacity(3);
        assert_eq!(config.inventory_capacity, 3);
        assert_eq!(config.frequency_epsilon, DEFAULT_FREQUENCY_EPSILON);
    }
}
