//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `quicktimer.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use quicktimer_adapter_homeassistant::HomeAssistantConfig;
use quicktimer_adapter_virtual::MoreInfoLayout;
use quicktimer_app::panel::PanelConfig;
use quicktimer_app::runtime::RuntimeConfig;
use quicktimer_app::services::timer_card::TimerCardConfig;
use quicktimer_domain::id::EntityId;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which host the daemon talks to.
    pub host: HostConfig,
    /// Home Assistant connection, used in `homeassistant` mode.
    pub homeassistant: HomeAssistantConfig,
    /// Simulated detail view, used in `virtual` mode.
    pub demo: DemoConfig,
    /// Engine timings.
    pub engine: EngineConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Dashboard timer widgets.
    pub cards: Vec<TimerCardConfig>,
}

/// Host selection.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub mode: HostMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostMode {
    /// In-process simulated host.
    #[default]
    Virtual,
    /// A Home Assistant instance over REST.
    HomeAssistant,
}

/// What the virtual host shows at startup.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Entity whose detail view opens at startup, if any.
    pub open_entity: Option<String>,
    /// How the simulated detail view nests the entity id.
    pub layout: DemoLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemoLayout {
    #[default]
    Dialog,
    Content,
    History,
}

impl From<DemoLayout> for MoreInfoLayout {
    fn from(layout: DemoLayout) -> Self {
        match layout {
            DemoLayout::Dialog => Self::Dialog,
            DemoLayout::Content => Self::Content,
            DemoLayout::History => Self::History,
        }
    }
}

/// Engine timings and limits.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Delay between mount-point lookups, in milliseconds.
    pub retry_interval_ms: u64,
    /// Lookups per detail-view request.
    pub max_retries: u32,
    /// Countdown refresh period, in milliseconds.
    pub tick_interval_ms: u64,
    /// Recency history entries kept per entity.
    pub history_limit: usize,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `quicktimer.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// result does not validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("quicktimer.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("QUICKTIMER_HOST_MODE") {
            match val.as_str() {
                "virtual" => self.host.mode = HostMode::Virtual,
                "homeassistant" => self.host.mode = HostMode::HomeAssistant,
                _ => {}
            }
        }
        if let Ok(val) = std::env::var("QUICKTIMER_HA_URL") {
            self.homeassistant.base_url = val;
        }
        if let Ok(val) = std::env::var("QUICKTIMER_HA_TOKEN") {
            self.homeassistant.token = val;
        }
        if let Ok(val) = std::env::var("QUICKTIMER_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.tick_interval_ms == 0 || self.engine.retry_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "tick and retry intervals must be non-zero".to_string(),
            ));
        }
        if self.engine.max_retries == 0 {
            return Err(ConfigError::Validation(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.host.mode == HostMode::HomeAssistant {
            if self.homeassistant.token.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "homeassistant mode needs an access token".to_string(),
                ));
            }
            if self.homeassistant.poll_interval_secs == 0 {
                return Err(ConfigError::Validation(
                    "poll_interval_secs must be non-zero".to_string(),
                ));
            }
        }
        if let Some(index) = self
            .cards
            .iter()
            .position(|card| card.targets.is_empty() && card.entity.is_none())
        {
            return Err(ConfigError::Validation(format!(
                "card {index} has neither targets nor an entity"
            )));
        }
        self.demo_entity()?;
        Ok(())
    }

    /// Engine settings as the runtime expects them.
    #[must_use]
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            panel: PanelConfig {
                max_retries: self.engine.max_retries,
                retry_interval: Duration::from_millis(self.engine.retry_interval_ms),
                tick_interval: Duration::from_millis(self.engine.tick_interval_ms),
            },
            history_limit: self.engine.history_limit,
        }
    }

    /// The entity the virtual host opens at startup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when the id is malformed.
    pub fn demo_entity(&self) -> Result<Option<EntityId>, ConfigError> {
        self.demo
            .open_entity
            .as_deref()
            .map(|id| {
                EntityId::new(id)
                    .map_err(|err| ConfigError::Validation(format!("demo.open_entity: {err}")))
            })
            .transpose()
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            open_entity: Some("light.living_room".to_string()),
            layout: DemoLayout::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 100,
            max_retries: 30,
            tick_interval_ms: 1000,
            history_limit: quicktimer_domain::preferences::DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "quicktimerd=info,quicktimer=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.host.mode, HostMode::Virtual);
        assert_eq!(config.engine.max_retries, 30);
        assert_eq!(config.engine.retry_interval_ms, 100);
        assert_eq!(config.engine.tick_interval_ms, 1000);
        assert_eq!(config.engine.history_limit, 10);
        assert_eq!(config.logging.filter, "quicktimerd=info,quicktimer=info");
        assert!(config.cards.is_empty());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.engine.max_retries, 30);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = r#"
            [host]
            mode = "homeassistant"

            [homeassistant]
            base_url = "http://10.0.0.2:8123"
            token = "secret"
            poll_interval_secs = 2

            [demo]
            layout = "history"

            [engine]
            retry_interval_ms = 50
            max_retries = 5
            tick_interval_ms = 500
            history_limit = 3

            [logging]
            filter = "debug"

            [[cards]]
            label = "Coffee"
            targets = [{ entity_id = "switch.coffee_maker", service = "switch.turn_off" }]

            [[cards]]
            entity = "fan.bedroom"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.host.mode, HostMode::HomeAssistant);
        assert_eq!(config.homeassistant.base_url, "http://10.0.0.2:8123");
        assert_eq!(config.homeassistant.poll_interval_secs, 2);
        assert_eq!(config.demo.layout, DemoLayout::History);
        assert_eq!(config.engine.max_retries, 5);
        assert_eq!(config.engine.history_limit, 3);
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.cards.len(), 2);
        assert_eq!(config.cards[0].label.as_deref(), Some("Coffee"));
        assert_eq!(
            config.cards[1].entity.as_ref().map(EntityId::as_str),
            Some("fan.bedroom")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.host.mode, HostMode::Virtual);
    }

    #[test]
    fn should_accept_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn should_reject_zero_tick_interval() {
        let mut config = Config::default();
        config.engine.tick_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_retries() {
        let mut config = Config::default();
        config.engine.max_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_require_token_in_homeassistant_mode() {
        let mut config = Config::default();
        config.host.mode = HostMode::HomeAssistant;
        assert!(config.validate().is_err());

        config.homeassistant.token = "abc".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_reject_card_without_targets() {
        let mut config = Config::default();
        config.cards.push(TimerCardConfig::default());
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid configuration: card 0 has neither targets nor an entity"
        );
    }

    #[test]
    fn should_reject_malformed_demo_entity() {
        let mut config = Config::default();
        config.demo.open_entity = Some("kitchen".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_build_runtime_config_from_engine_settings() {
        let mut config = Config::default();
        config.engine.tick_interval_ms = 250;
        let runtime = config.runtime_config();
        assert_eq!(runtime.panel.tick_interval, Duration::from_millis(250));
        assert_eq!(runtime.panel.retry_interval, Duration::from_millis(100));
        assert_eq!(runtime.history_limit, 10);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
