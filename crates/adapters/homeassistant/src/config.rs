//! Home Assistant connection configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the Home Assistant host.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HomeAssistantConfig {
    /// Base URL of the instance, without the `/api` suffix.
    pub base_url: String,
    /// Long-lived access token.
    pub token: String,
    /// Sensor whose attributes carry tasks, preferences and presets.
    pub monitor_entity: String,
    /// How often states and the monitor sensor are re-read, in seconds.
    pub poll_interval_secs: u64,
}

impl HomeAssistantConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for HomeAssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "http://homeassistant.local:8123".to_string(),
            token: String::new(),
            monitor_entity: "sensor.quick_timer_monitor".to_string(),
            poll_interval_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_have_sensible_defaults() {
        let config = HomeAssistantConfig::default();
        assert_eq!(config.base_url, "http://homeassistant.local:8123");
        assert!(config.token.is_empty());
        assert_eq!(config.monitor_entity, "sensor.quick_timer_monitor");
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            base_url = "https://ha.example.com"
            token = "abc"
            monitor_entity = "sensor.timers"
            poll_interval_secs = 2
        "#;
        let config: HomeAssistantConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.base_url, "https://ha.example.com");
        assert_eq!(config.token, "abc");
        assert_eq!(config.monitor_entity, "sensor.timers");
        assert_eq!(config.poll_interval_secs, 2);
    }

    #[test]
    fn should_use_defaults_for_missing_fields() {
        let config: HomeAssistantConfig = toml::from_str(r#"token = "xyz""#).unwrap();
        assert_eq!(config.token, "xyz");
        assert_eq!(config.poll_interval_secs, 5);
    }
}
