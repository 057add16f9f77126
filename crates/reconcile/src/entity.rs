//! Desired and live entity records
//!
//! Both sides of a reconciliation expose the same accessors through the
//! [`Entity`] trait, so matching and drift detection work on either.

use crate::catalog::{Catalog, Kind, NaturalKey};
use crate::types::{Checksum, Goid, MutationAction, Properties, PropertyValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity and checksum accessors shared by desired and live records
pub trait Entity {
    fn kind(&self) -> Kind;

    fn goid(&self) -> Option<&Goid>;

    fn checksum(&self) -> Option<&Checksum>;

    fn properties(&self) -> &Properties;

    /// Natural key under the catalog's identity rule for this kind
    fn natural_key(&self, catalog: &Catalog) -> Option<NaturalKey> {
        catalog.natural_key(self.kind(), self.properties())
    }

    fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties().get(name)
    }
}

/// One desired entity from a bundle
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub kind: Kind,
    pub goid: Option<Goid>,
    pub checksum: Option<Checksum>,
    /// Explicit mutation directive; None means the default
    pub action: Option<MutationAction>,
    pub properties: Properties,
}

impl EntityRecord {
    pub fn new(kind: Kind, properties: Properties) -> Self {
        Self {
            kind,
            goid: None,
            checksum: None,
            action: None,
            properties,
        }
    }

    pub fn with_goid(mut self, goid: Goid) -> Self {
        self.goid = Some(goid);
        self
    }

    pub fn with_checksum(mut self, checksum: Checksum) -> Self {
        self.checksum = Some(checksum);
        self
    }

    pub fn with_action(mut self, action: MutationAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Directive in effect, defaulting to NEW_OR_UPDATE
    pub fn effective_action(&self) -> MutationAction {
        self.action.unwrap_or_default()
    }
}

impl Entity for EntityRecord {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn goid(&self) -> Option<&Goid> {
        self.goid.as_ref()
    }

    fn checksum(&self) -> Option<&Checksum> {
        self.checksum.as_ref()
    }

    fn properties(&self) -> &Properties {
        &self.properties
    }
}

/// One entity as it currently exists on the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveEntity {
    pub kind: Kind,
    pub goid: Goid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Checksum>,
    #[serde(default)]
    pub properties: Properties,
}

impl Entity for LiveEntity {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn goid(&self) -> Option<&Goid> {
        Some(&self.goid)
    }

    fn checksum(&self) -> Option<&Checksum> {
        self.checksum.as_ref()
    }

    fn properties(&self) -> &Properties {
        &self.properties
    }
}

/// How an entity is named in reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityRef {
    pub kind: Kind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goid: Option<Goid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<NaturalKey>,
}

impl EntityRef {
    pub fn of(entity: &impl Entity, catalog: &Catalog) -> Self {
        Self {
            kind: entity.kind(),
            goid: entity.goid().cloned(),
            key: entity.natural_key(catalog),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.key, &self.goid) {
            (Some(key), _) => write!(f, "{} [{}]", self.kind, key),
            (None, Some(goid)) => write!(f, "{} [goid={}]", self.kind, goid),
            (None, None) => write!(f, "{} [unidentified]", self.kind),
        }
    }
}
