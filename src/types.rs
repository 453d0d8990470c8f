//! Common types used throughout catalog-harvest
//!
//! This module contains shared type definitions, type aliases,
//! and small JSON helpers used across multiple modules.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

// ============================================================================
// Catalog Entities
// ============================================================================

/// A top-level collection container (e.g. a show) owning many child records
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentEntity {
    /// Unique, stable identifier
    pub alias: String,
    /// Human-readable name
    pub display_name: String,
}

impl ParentEntity {
    /// Create a new parent entity
    pub fn new(alias: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            display_name: display_name.into(),
        }
    }

    /// Build a parent from a listing entry, falling back to the alias for the name
    pub fn from_listing(item: &Value, alias_field: &str, name_field: &str) -> Option<Self> {
        let alias = item.get(alias_field)?.as_str()?.trim();
        if alias.is_empty() {
            return None;
        }
        let name = item
            .get(name_field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(alias);
        Some(Self::new(alias, name))
    }
}

/// One raw child record as returned by the API
///
/// The parent reference is attached by the walker; the upstream payload never
/// carries it in a form the extractor relies on.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// Owning parent, when the walker was driving a parent's children
    pub parent: Option<ParentEntity>,
    /// API-defined fields
    pub fields: JsonObject,
}

impl RawRecord {
    /// Wrap an API item; non-object items become an empty record
    pub fn new(item: Value, parent: Option<ParentEntity>) -> Self {
        let fields = match item {
            Value::Object(map) => map,
            _ => JsonObject::new(),
        };
        Self { parent, fields }
    }

    /// Get a raw field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Get a field as a non-empty string
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

// ============================================================================
// Sort Order
// ============================================================================

/// Sort order for parent listing passes
///
/// Written in YAML as `default`, as a bare sort value (`-name`), or as
/// `{param: -name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SortOrderRepr", into = "SortOrderRepr")]
pub enum SortOrder {
    /// Upstream default order (no sort parameter sent)
    Default,
    /// Explicit sort parameter value (e.g. "-name")
    Param(String),
}

/// Accepted YAML forms of a [`SortOrder`]
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SortOrderRepr {
    Name(String),
    Param { param: String },
}

impl From<SortOrderRepr> for SortOrder {
    fn from(repr: SortOrderRepr) -> Self {
        match repr {
            SortOrderRepr::Name(name) if name == "default" => Self::Default,
            SortOrderRepr::Name(param) | SortOrderRepr::Param { param } => Self::Param(param),
        }
    }
}

impl From<SortOrder> for SortOrderRepr {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Default => Self::Name("default".to_string()),
            SortOrder::Param(param) => Self::Param { param },
        }
    }
}

impl SortOrder {
    /// Query parameter value for this order, if any
    pub fn param(&self) -> Option<&str> {
        match self {
            Self::Default => None,
            Self::Param(value) => Some(value.as_str()),
        }
    }

    /// Short label for logging
    pub fn label(&self) -> &str {
        self.param().unwrap_or("default")
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// `base + attempt * step`
    #[default]
    Linear,
    /// `base * 2^attempt`
    Exponential,
}

// ============================================================================
// JSON Path Helpers
// ============================================================================

/// Walk a dotted path (`metadata.resultset.count`) into a JSON value
pub fn extract_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() {
        return Some(value);
    }

    let mut current = value;
    for part in path.split('.') {
        match current {
            Value::Object(map) => {
                current = map.get(part)?;
            }
            _ => return None,
        }
    }

    Some(current)
}

/// Extract a scalar at a dotted path as a string
pub fn extract_string(value: &Value, path: &str) -> Option<String> {
    match extract_path(value, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Extract a non-negative integer at a dotted path (numbers or numeric strings)
pub fn extract_u64(value: &Value, path: &str) -> Option<u64> {
    match extract_path(value, path)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
