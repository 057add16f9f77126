//! Core value types shared by the catalog, resolver and gateway seam

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Gateway object identifier, the stable primary key of a live entity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Goid(String);

impl Goid {
    /// Create a goid, returning None for blank input
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Gateway-style goid for a counter value: 32 zero-padded hex digits
    pub(crate) fn generated(counter: u64) -> Self {
        Self(format!("{counter:032x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Goid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content fingerprint of an entity's significant fields
///
/// Produced outside the engine (by the bundle producer or the gateway) and
/// only ever compared here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Wrap a freshly computed digest
    pub(crate) fn from_digest(hex: String) -> Self {
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Typed value of one entity property
///
/// Anything that is not a string, integer, boolean or list of strings is kept
/// verbatim as opaque JSON (policy bodies, certificate chains, module blobs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    String(String),
    StringList(Vec<String>),
    Opaque(serde_json::Value),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Render the value as key text, used by identity rules and references
    ///
    /// Blank strings and non-scalar values have no key text.
    pub fn key_text(&self) -> Option<String> {
        match self {
            Self::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Self::Int(i) => Some(i.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::String(s) => f.write_str(s),
            Self::StringList(items) => write!(f, "[{}]", items.join(", ")),
            Self::Opaque(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        Self::StringList(value)
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Opaque(value)
    }
}

/// Named properties of an entity, ordered by field name
pub type Properties = BTreeMap<String, PropertyValue>;

/// Build a property map from `(name, value)` pairs
pub fn properties<I, K, V>(pairs: I) -> Properties
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<PropertyValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Per-entity mutation directive (`EntityMutationAction` on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationAction {
    /// Create when missing, update when drifted
    #[default]
    NewOrUpdate,
    /// Create when missing, never touch an existing entity
    NewOrExisting,
    /// Always create, even when a match exists
    AlwaysCreateNew,
    /// Skip the entity entirely
    Ignore,
    /// Remove the matching live entity
    Delete,
}

impl MutationAction {
    pub const ALL: [Self; 5] = [
        Self::NewOrUpdate,
        Self::NewOrExisting,
        Self::AlwaysCreateNew,
        Self::Ignore,
        Self::Delete,
    ];

    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewOrUpdate => "NEW_OR_UPDATE",
            Self::NewOrExisting => "NEW_OR_EXISTING",
            Self::AlwaysCreateNew => "ALWAYS_CREATE_NEW",
            Self::Ignore => "IGNORE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationAction {
    type Err = UnknownWireValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownWireValue {
                enumeration: "EntityMutationAction",
                value: s.to_string(),
            })
    }
}

/// Outcome of applying one entity (`EntityMutationStatus` on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationStatus {
    None,
    Created,
    Updated,
    Deleted,
    UsedExisting,
    Ignored,
    Error,
}

impl MutationStatus {
    pub const ALL: [Self; 7] = [
        Self::None,
        Self::Created,
        Self::Updated,
        Self::Deleted,
        Self::UsedExisting,
        Self::Ignored,
        Self::Error,
    ];

    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Deleted => "DELETED",
            Self::UsedExisting => "USED_EXISTING",
            Self::Ignored => "IGNORED",
            Self::Error => "ERROR",
        }
    }

    /// Whether the outcome mutated live state
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Deleted)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for MutationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationStatus {
    type Err = UnknownWireValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| UnknownWireValue {
                enumeration: "EntityMutationStatus",
                value: s.to_string(),
            })
    }
}

/// A wire enumeration value this client does not know
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized {enumeration} value '{value}'")]
pub struct UnknownWireValue {
    pub enumeration: &'static str,
    pub value: String,
}

/// One field-level value in a status record's source or target list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameValue {
    pub name: String,
    pub value: PropertyValue,
}

impl NameValue {
    pub fn new(name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Status of one submitted entity, as returned by a batch call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedStatus {
    pub action: MutationAction,
    pub status: MutationStatus,
    pub description: String,
    /// Bundle-side values of the fields involved
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<NameValue>,
    /// Live-side values of the fields involved
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target: Vec<NameValue>,
}

impl DetailedStatus {
    pub fn new(
        action: MutationAction,
        status: MutationStatus,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action,
            status,
            description: description.into(),
            source: Vec::new(),
            target: Vec::new(),
        }
    }

    pub fn error(action: MutationAction, description: impl Into<String>) -> Self {
        Self::new(action, MutationStatus::Error, description)
    }

    /// Attach field-level diffs
    pub fn with_diff(mut self, source: Vec<NameValue>, target: Vec<NameValue>) -> Self {
        self.source = source;
        self.target = target;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goid_rejects_blank() {
        assert!(Goid::new("").is_none());
        assert!(Goid::new("   ").is_none());
        assert_eq!(Goid::new("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_wire_values_round_trip() {
        for action in MutationAction::ALL {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
            assert_eq!(action.as_str().parse::<MutationAction>().unwrap(), action);
        }
        for status in MutationStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            let back: MutationStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn test_unknown_wire_value_is_reported() {
        let err = "MERGE".parse::<MutationAction>().unwrap_err();
        assert_eq!(err.value, "MERGE");
        assert!(err.to_string().contains("EntityMutationAction"));
        assert!("PENDING".parse::<MutationStatus>().is_err());
    }

    #[test]
    fn test_property_value_shapes() {
        let v: PropertyValue = serde_json::from_str("\"x\"").unwrap();
        assert_eq!(v, PropertyValue::String("x".into()));
        let v: PropertyValue = serde_json::from_str("8443").unwrap();
        assert_eq!(v, PropertyValue::Int(8443));
        let v: PropertyValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, PropertyValue::Bool(true));
        let v: PropertyValue = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert_eq!(v, PropertyValue::StringList(vec!["a".into(), "b".into()]));
        let v: PropertyValue = serde_json::from_str(r#"{"xml":"<policy/>"}"#).unwrap();
        assert!(matches!(v, PropertyValue::Opaque(_)));
        let v: PropertyValue = serde_json::from_str("1.5").unwrap();
        assert!(matches!(v, PropertyValue::Opaque(_)));
    }

    #[test]
    fn test_key_text() {
        assert_eq!(PropertyValue::from("a").key_text().as_deref(), Some("a"));
        assert_eq!(PropertyValue::from(" ").key_text(), None);
        assert_eq!(PropertyValue::from(42_i64).key_text().as_deref(), Some("42"));
        assert_eq!(PropertyValue::from(vec!["a".to_string()]).key_text(), None);
    }
}
