//! Service catalog — the operations the host declares, per domain.
//!
//! Examples: `light.turn_on`, `cover.set_cover_position`,
//! `climate.set_hvac_mode`. The catalog is read-only input; the
//! [`capability`](crate::capability) module turns it into what a panel shows.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Every declared operation, keyed by domain then by operation name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceCatalog(HashMap<String, BTreeMap<String, ServiceDefinition>>);

/// One domain's block as the REST `/api/services` endpoint lists it.
#[derive(Debug, Clone, Deserialize)]
pub struct DomainServices {
    pub domain: String,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceDefinition>,
}

impl ServiceCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from the list form used by the REST API.
    #[must_use]
    pub fn from_domains(domains: Vec<DomainServices>) -> Self {
        Self(
            domains
                .into_iter()
                .map(|block| (block.domain, block.services))
                .collect(),
        )
    }

    /// Declare (or replace) one operation.
    pub fn insert(
        &mut self,
        domain: impl Into<String>,
        operation: impl Into<String>,
        definition: ServiceDefinition,
    ) {
        self.0
            .entry(domain.into())
            .or_default()
            .insert(operation.into(), definition);
    }

    /// All operations of a domain, sorted by name.
    #[must_use]
    pub fn domain(&self, domain: &str) -> Option<&BTreeMap<String, ServiceDefinition>> {
        self.0.get(domain)
    }

    /// Look up `domain.operation`.
    #[must_use]
    pub fn get(&self, service_id: &str) -> Option<&ServiceDefinition> {
        let (domain, operation) = split_service(service_id).ok()?;
        self.0.get(domain)?.get(operation)
    }

    #[must_use]
    pub fn contains(&self, service_id: &str) -> bool {
        self.get(service_id).is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Split `domain.operation` into its halves.
///
/// # Errors
///
/// Returns [`ValidationError::MalformedService`] when either half is missing.
pub fn split_service(service_id: &str) -> Result<(&str, &str), ValidationError> {
    match service_id.split_once('.') {
        Some((domain, operation)) if !domain.is_empty() && !operation.is_empty() => {
            Ok((domain, operation))
        }
        _ => Err(ValidationError::MalformedService(service_id.to_string())),
    }
}

/// A declared operation and its parameter schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSchema>,
}

impl ServiceDefinition {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, field: FieldSchema) -> Self {
        self.fields.insert(key.into(), field);
        self
    }
}

/// Raw schema of one parameter, or of a group of parameters when
/// `fields` is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FieldFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Nested fields: this entry is a group, not a parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, FieldSchema>>,
}

impl FieldSchema {
    #[must_use]
    pub fn with_selector(mut self, selector: serde_json::Value) -> Self {
        self.selector = Some(selector);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: FieldFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Applicability predicate attached to a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    /// OR across entries, AND within a list entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_features: Vec<FeatureRequirement>,
    /// Every named attribute must intersect its allowed values.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attribute: HashMap<String, Vec<serde_json::Value>>,
}

/// One `supported_features` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureRequirement {
    Flag(u64),
    AllOf(Vec<u64>),
}

impl FeatureRequirement {
    /// Whether `flags` carries every bit this entry asks for.
    #[must_use]
    pub fn is_satisfied_by(&self, flags: u64) -> bool {
        match self {
            Self::Flag(bit) => flags & bit != 0,
            Self::AllOf(bits) => bits.iter().all(|bit| flags & bit != 0),
        }
    }
}
