//! Configuration for the transaction publisher.

use crate::error::{BumperError, BumperResult};
use serde::Deserialize;

/// Default number of confirmations requested from the chain notifier.
pub const DEFAULT_NUM_CONFS: u32 = 1;

/// Default buffer of each subscriber's result channel.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 1;

/// Default label attached to published sweep transactions.
pub const DEFAULT_PUBLISH_LABEL: &str = "sweeper-tx";

/// Runtime configuration for [`crate::TxPublisher`].
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PublisherConfig {
    /// Confirmations after which a sweep counts as confirmed.
    pub num_confs: u32,

    /// Capacity of each request's result channel. Must be at least 1 so the
    /// first result is always deliverable without blocking.
    pub subscriber_capacity: usize,

    /// Label handed to the wallet with every publish.
    pub publish_label: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            num_confs: DEFAULT_NUM_CONFS,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            publish_label: DEFAULT_PUBLISH_LABEL.to_string(),
        }
    }
}

impl PublisherConfig {
    /// Checks the configuration is usable.
    pub fn validate(&self) -> BumperResult<()> {
        if self.num_confs == 0 {
            return Err(BumperError::InvalidConfig(
                "num_confs must be at least 1".to_string(),
            ));
        }
        if self.subscriber_capacity == 0 {
            return Err(BumperError::InvalidConfig(
                "subscriber_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PublisherConfig::default();
        assert_eq!(config.num_confs, 1);
        assert_eq!(config.subscriber_capacity, 1);
        assert_eq!(config.publish_label, "sweeper-tx");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: PublisherConfig =
            serde_json::from_str(r#"{ "subscriber_capacity": 4 }"#).unwrap();
        assert_eq!(config.subscriber_capacity, 4);
        assert_eq!(config.num_confs, DEFAULT_NUM_CONFS);
        assert_eq!(config.publish_label, DEFAULT_PUBLISH_LABEL);
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = PublisherConfig {
            num_confs: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(BumperError::InvalidConfig(_))
        ));

        let config = PublisherConfig {
            subscriber_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(BumperError::InvalidConfig(_))
        ));
    }
}
