//! Typed string identifiers.
//!
//! The host names entities with `domain.object_id` strings and the backend
//! keys tasks with arbitrary strings. A task key may coincide with an entity
//! id, so both convert into each other's namespace without loss.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

macro_rules! define_key {
    ($(#[doc = $doc:expr])* $name:ident, $validate:path) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a string.
            ///
            /// # Errors
            ///
            /// Returns a [`ValidationError`] when the string is not a valid identifier.
            pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
                let value = value.into();
                $validate(&value)?;
                Ok(Self(value))
            }

            /// Borrow the inner string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

fn validate_entity_id(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyId);
    }
    match value.split_once('.') {
        Some((domain, object)) if !domain.is_empty() && !object.is_empty() => Ok(()),
        _ => Err(ValidationError::MalformedEntityId(value.to_string())),
    }
}

fn validate_task_key(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyId);
    }
    Ok(())
}

define_key!(
    /// Host entity identifier such as `light.kitchen`.
    EntityId,
    validate_entity_id
);

define_key!(
    /// Key of one scheduled task in the backend registry.
    TaskKey,
    validate_task_key
);

impl EntityId {
    /// The domain part (`light` for `light.kitchen`).
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(domain, _)| domain)
    }

    /// The object part (`kitchen` for `light.kitchen`).
    #[must_use]
    pub fn object_id(&self) -> &str {
        self.0.split_once('.').map_or("", |(_, object)| object)
    }
}

impl TaskKey {
    /// Generate a fresh widget-scoped key (`qt_` followed by 8 hex chars).
    #[must_use]
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("qt_{}", &uuid[..8]))
    }
}

impl From<&EntityId> for TaskKey {
    fn from(entity_id: &EntityId) -> Self {
        Self(entity_id.0.clone())
    }
}

impl From<EntityId> for TaskKey {
    fn from(entity_id: EntityId) -> Self {
        Self(entity_id.0)
    }
}
