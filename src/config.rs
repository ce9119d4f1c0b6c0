//! Configuration for the ledger

use serde::{Deserialize, Serialize};

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Confirmation depth at which an on-chain entry becomes Settled
    pub confirmation_threshold: u32,

    /// Channel configuration
    pub channels: ChannelConfig,

    /// Read-side configuration
    pub view: ViewConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            confirmation_threshold: 6,
            channels: ChannelConfig::default(),
            view: ViewConfig::default(),
        }
    }
}

/// Channel sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Bounded mailbox capacity for the apply loop (backpressure)
    pub mailbox_capacity: usize,

    /// Broadcast buffer for change notifications; slow subscribers that
    /// fall further behind than this observe a lagged stream error
    pub notify_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1024,
            notify_capacity: 256,
        }
    }
}

/// Read-side limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Hard cap on page size; larger requests are clamped
    pub max_page_size: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self { max_page_size: 100 }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(threshold) = std::env::var("LEDGER_CONFIRMATION_THRESHOLD") {
            config.confirmation_threshold = threshold
                .parse()
                .map_err(|_| crate::Error::Config("Invalid LEDGER_CONFIRMATION_THRESHOLD".to_string()))?;
        }

        if let Ok(capacity) = std::env::var("LEDGER_MAILBOX_CAPACITY") {
            config.channels.mailbox_capacity = capacity
                .parse()
                .map_err(|_| crate::Error::Config("Invalid LEDGER_MAILBOX_CAPACITY".to_string()))?;
        }

        if let Ok(size) = std::env::var("LEDGER_MAX_PAGE_SIZE") {
            config.view.max_page_size = size
                .parse()
                .map_err(|_| crate::Error::Config("Invalid LEDGER_MAX_PAGE_SIZE".to_string()))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check field constraints
    pub fn validate(&self) -> crate::Result<()> {
        if self.confirmation_threshold == 0 {
            return Err(crate::Error::Config(
                "confirmation_threshold must be at least 1".to_string(),
            ));
        }
        if self.channels.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "mailbox_capacity must be at least 1".to_string(),
            ));
        }
        if self.channels.notify_capacity == 0 {
            return Err(crate::Error::Config(
                "notify_capacity must be at least 1".to_string(),
            ));
        }
        if self.view.max_page_size == 0 {
            return Err(crate::Error::Config(
                "max_page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.confirmation_threshold, 6);
        assert_eq!(config.channels.mailbox_capacity, 1024);
        assert_eq!(config.view.max_page_size, 100);
        config.validate().unwrap();
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "confirmation_threshold = 3\n\n\
             [channels]\nmailbox_capacity = 64\nnotify_capacity = 16\n\n\
             [view]\nmax_page_size = 25\n"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.confirmation_threshold, 3);
        assert_eq!(config.channels.mailbox_capacity, 64);
        assert_eq!(config.view.max_page_size, 25);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let mut config = Config::default();
        config.confirmation_threshold = 0;
        assert!(config.validate().is_err());
    }
}
