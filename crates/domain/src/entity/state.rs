//! Entity state — the current state value the host reports for an entity.

use serde::{Deserialize, Serialize};

/// Operational state of an entity.
///
/// The host uses free-form strings; the common ones get their own variant
/// and anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityState {
    On,
    Off,
    #[default]
    Unknown,
    Unavailable,
    Other(String),
}

impl EntityState {
    /// Whether the entity is reachable (anything but [`Unavailable`](Self::Unavailable)).
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Unknown => "unknown",
            Self::Unavailable => "unavailable",
            Self::Other(value) => value,
        }
    }
}

impl From<String> for EntityState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "on" => Self::On,
            "off" => Self::Off,
            "unknown" => Self::Unknown,
            "unavailable" => Self::Unavailable,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for EntityState {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<EntityState> for String {
    fn from(value: EntityState) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for EntityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_report_available_when_state_is_on() {
        assert!(EntityState::On.is_available());
    }

    #[test]
    fn should_report_unavailable_when_state_is_unavailable() {
        assert!(!EntityState::Unavailable.is_available());
    }

    #[test]
    fn should_default_to_unknown() {
        assert_eq!(EntityState::default(), EntityState::Unknown);
    }

    #[test]
    fn should_keep_unrecognised_states_verbatim() {
        let state = EntityState::from("playing");
        assert_eq!(state, EntityState::Other("playing".to_string()));
        assert_eq!(state.to_string(), "playing");
    }

    #[test]
    fn should_deserialize_plain_strings() {
        let state: EntityState = serde_json::from_str("\"off\"").unwrap();
        assert_eq!(state, EntityState::Off);
        let json = serde_json::to_string(&EntityState::Other("heat".to_string())).unwrap();
        assert_eq!(json, "\"heat\"");
    }
}
