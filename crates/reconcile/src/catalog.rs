//! Entity catalog - the static registry of gateway entity kinds
//!
//! Every kind declares how its entities are identified (natural key fields),
//! which fields carry no weight when detecting drift, which other kinds its
//! fields point at, and which kinds must otherwise be applied before it.
//! The orderer derives the application order from these declarations.

use crate::types::{Checksum, Properties, PropertyValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

macro_rules! gateway_kinds {
    ($($variant:ident => $key:literal),+ $(,)?) => {
        /// One gateway entity type
        ///
        /// Variant order is the declaration order used to break ties when
        /// ordering kinds for application.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum Kind {
            $(
                #[serde(rename = $key)]
                $variant,
            )+
        }

        impl Kind {
            /// All kinds in declaration order
            pub const ALL: &'static [Kind] = &[$(Kind::$variant),+];

            /// Bundle key for this kind, e.g. `trustedCerts`
            pub fn key(&self) -> &'static str {
                match self {
                    $(Kind::$variant => $key,)+
                }
            }
        }
    };
}

gateway_kinds! {
    ClusterProperties => "clusterProperties",
    Folders => "folders",
    Secrets => "secrets",
    Keys => "keys",
    RevocationCheckPolicies => "revocationCheckPolicies",
    TrustedCerts => "trustedCerts",
    PasswordPolicies => "passwordPolicies",
    AdministrativeUserAccountProperties => "administrativeUserAccountProperties",
    ServiceResolutionConfigs => "serviceResolutionConfigs",
    ServerModuleFiles => "serverModuleFiles",
    CustomKeyValues => "customKeyValues",
    Schemas => "schemas",
    Dtds => "dtds",
    LogSinks => "logSinks",
    AuditConfigurations => "auditConfigurations",
    HttpConfigurations => "httpConfigurations",
    ListenPorts => "listenPorts",
    ActiveConnectors => "activeConnectors",
    EmailListeners => "emailListeners",
    JdbcConnections => "jdbcConnections",
    CassandraConnections => "cassandraConnections",
    JmsDestinations => "jmsDestinations",
    KerberosConfigs => "kerberosConfigs",
    SiteminderConfigs => "siteminderConfigs",
    InternalIdps => "internalIdps",
    Fips => "fips",
    Ldaps => "ldaps",
    SimpleLdaps => "simpleLdaps",
    InternalGroups => "internalGroups",
    InternalUsers => "internalUsers",
    FipGroups => "fipGroups",
    FipUsers => "fipUsers",
    PolicyFragments => "policyFragments",
    EncassConfigs => "encassConfigs",
    GlobalPolicies => "globalPolicies",
    BackgroundTaskPolicies => "backgroundTaskPolicies",
    ScheduledTasks => "scheduledTasks",
    Policies => "policies",
    Services => "services",
    WebApiServices => "webApiServices",
    SoapServices => "soapServices",
    InternalWebApiServices => "internalWebApiServices",
    InternalSoapServices => "internalSoapServices",
    PolicyBackedServices => "policyBackedServices",
    GenericEntities => "genericEntities",
    Roles => "roles",
}

impl Kind {
    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Kind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::Error::UnknownKind(s.to_string()))
    }
}

/// Fields that together form a kind's natural key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityRule(pub &'static [&'static str]);

impl IdentityRule {
    pub fn fields(&self) -> &'static [&'static str] {
        self.0
    }

    /// Extract the natural key from a property map
    ///
    /// Returns None when any key field is absent or blank: such an entity
    /// can only ever be treated as new.
    pub fn key_of(&self, props: &Properties) -> Option<NaturalKey> {
        let mut parts = Vec::with_capacity(self.0.len());
        for field in self.0 {
            let text = props.get(*field)?.key_text()?;
            parts.push(((*field).to_string(), text));
        }
        if parts.is_empty() {
            return None;
        }
        Some(NaturalKey(parts))
    }
}

/// Kind-specific human-meaningful identity, as ordered `(field, value)` pairs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey(Vec<(String, String)>);

impl NaturalKey {
    pub fn parts(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn value_of(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        f.write_str(&rendered.join(", "))
    }
}

impl Serialize for NaturalKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A field holding the natural key of an entity of another kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    /// Field on the referencing entity
    pub field: &'static str,
    /// Kind being referenced
    pub target: Kind,
    /// Field on the referenced entity that the value must equal
    pub target_field: &'static str,
}

impl Reference {
    pub const fn new(field: &'static str, target: Kind, target_field: &'static str) -> Self {
        Self {
            field,
            target,
            target_field,
        }
    }
}

/// Identity and dependency rules for one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSpec {
    pub identity: IdentityRule,
    /// Fields that have no effect on the mutation (read-only or derived)
    pub no_effect: &'static [&'static str],
    /// Checked cross-kind references
    pub references: &'static [Reference],
    /// Kinds that must be applied first without a checkable field link
    pub after: &'static [Kind],
}

impl KindSpec {
    pub const fn new(identity: &'static [&'static str]) -> Self {
        Self {
            identity: IdentityRule(identity),
            no_effect: &[],
            references: &[],
            after: &[],
        }
    }

    pub const fn masking(self, no_effect: &'static [&'static str]) -> Self {
        Self { no_effect, ..self }
    }

    pub const fn referencing(self, references: &'static [Reference]) -> Self {
        Self { references, ..self }
    }

    pub const fn after(self, after: &'static [Kind]) -> Self {
        Self { after, ..self }
    }

    /// Whether a field participates in drift detection
    pub fn is_significant(&self, field: &str) -> bool {
        !self.no_effect.contains(&field)
    }

    /// Properties with the no-effect fields masked out
    pub fn significant<'a>(&self, props: &'a Properties) -> BTreeMap<&'a str, &'a PropertyValue> {
        props
            .iter()
            .filter(|(name, _)| self.is_significant(name))
            .map(|(name, value)| (name.as_str(), value))
            .collect()
    }

    /// Fingerprint of the significant fields
    ///
    /// blake3 over the canonical JSON of the masked property map. Engines
    /// never call this on their own; it exists for producers and gateways.
    pub fn checksum(&self, props: &Properties) -> Checksum {
        // String-keyed maps of serializable values always serialize.
        let canonical = serde_json::to_vec(&self.significant(props)).unwrap_or_default();
        Checksum::from_digest(blake3::hash(&canonical).to_hex().to_string())
    }

    /// Kinds this kind depends on: reference targets plus explicit prerequisites
    pub fn prerequisites(&self, own: Kind) -> Vec<Kind> {
        let mut kinds: Vec<Kind> = self
            .references
            .iter()
            .map(|r| r.target)
            .chain(self.after.iter().copied())
            .filter(|k| *k != own)
            .collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}

const NAME: &[&str] = &["name"];
const IN_FOLDER: &[&str] = &["folderPath", "name"];

const FOLDER_REF: &[Reference] = &[Reference::new("folderPath", Kind::Folders, "name")];
const SECRET_REF: &[Reference] = &[Reference::new("securePasswordName", Kind::Secrets, "name")];
const KEY_REF: &[Reference] = &[Reference::new("keyAlias", Kind::Keys, "alias")];
const REVOCATION_REF: &[Reference] = &[Reference::new(
    "revocationCheckPolicyName",
    Kind::RevocationCheckPolicies,
    "name",
)];
const JMS_REFS: &[Reference] = &[
    Reference::new("securePasswordName", Kind::Secrets, "name"),
    Reference::new("keyAlias", Kind::Keys, "alias"),
];
const FIP_REF: &[Reference] = &[Reference::new("providerName", Kind::Fips, "name")];
const FRAGMENT_REF: &[Reference] = &[Reference::new("policyName", Kind::PolicyFragments, "name")];
const TASK_POLICY_REF: &[Reference] = &[Reference::new(
    "policyName",
    Kind::BackgroundTaskPolicies,
    "name",
)];
const CERT_FIELDS: &[&str] = &["subjectDn", "issuerDn", "serialNumber", "notBefore", "notAfter"];

/// Built-in rules for a kind
pub fn builtin_spec(kind: Kind) -> KindSpec {
    match kind {
        Kind::ClusterProperties => KindSpec::new(NAME),
        Kind::Folders => KindSpec::new(NAME),
        Kind::Secrets => KindSpec::new(NAME),
        Kind::Keys => KindSpec::new(&["keystoreId", "alias"]).masking(CERT_FIELDS),
        Kind::RevocationCheckPolicies => KindSpec::new(NAME),
        Kind::TrustedCerts => KindSpec::new(&["thumbprintSha1"])
            .masking(CERT_FIELDS)
            .referencing(REVOCATION_REF),
        Kind::PasswordPolicies => KindSpec::new(NAME),
        Kind::AdministrativeUserAccountProperties => KindSpec::new(NAME),
        Kind::ServiceResolutionConfigs => KindSpec::new(NAME),
        Kind::ServerModuleFiles => {
            KindSpec::new(NAME).masking(&["moduleSha256", "signerSubjectDn"])
        }
        Kind::CustomKeyValues => KindSpec::new(&["key"]),
        Kind::Schemas => KindSpec::new(&["systemId"]),
        Kind::Dtds => KindSpec::new(&["systemId"]),
        Kind::LogSinks => KindSpec::new(NAME),
        Kind::AuditConfigurations => KindSpec::new(NAME),
        Kind::HttpConfigurations => KindSpec::new(&["host", "port"]).referencing(KEY_REF),
        Kind::ListenPorts => KindSpec::new(NAME).referencing(KEY_REF),
        Kind::ActiveConnectors => KindSpec::new(NAME).referencing(KEY_REF),
        Kind::EmailListeners => KindSpec::new(NAME).referencing(SECRET_REF),
        Kind::JdbcConnections => KindSpec::new(NAME).referencing(SECRET_REF),
        Kind::CassandraConnections => KindSpec::new(NAME).referencing(SECRET_REF),
        Kind::JmsDestinations => KindSpec::new(&["name", "direction", "providerType"])
            .referencing(JMS_REFS),
        Kind::KerberosConfigs => KindSpec::new(NAME),
        Kind::SiteminderConfigs => KindSpec::new(NAME).referencing(SECRET_REF),
        Kind::InternalIdps => KindSpec::new(NAME),
        Kind::Fips => KindSpec::new(NAME).after(&[Kind::TrustedCerts]),
        Kind::Ldaps => KindSpec::new(NAME)
            .referencing(SECRET_REF)
            .after(&[Kind::TrustedCerts]),
        Kind::SimpleLdaps => KindSpec::new(NAME).after(&[Kind::TrustedCerts]),
        Kind::InternalGroups => KindSpec::new(NAME).after(&[Kind::InternalIdps]),
        Kind::InternalUsers => KindSpec::new(&["login"])
            .masking(&["lastLogin", "passwordExpiry"])
            .after(&[Kind::InternalIdps, Kind::InternalGroups]),
        Kind::FipGroups => KindSpec::new(&["providerName", "name"])
            .referencing(FIP_REF),
        Kind::FipUsers => KindSpec::new(&["providerName", "login"])
            .referencing(FIP_REF)
            .after(&[Kind::FipGroups]),
        Kind::PolicyFragments => KindSpec::new(IN_FOLDER).referencing(FOLDER_REF),
        Kind::EncassConfigs => KindSpec::new(NAME).referencing(FRAGMENT_REF),
        Kind::GlobalPolicies => KindSpec::new(IN_FOLDER)
            .referencing(FOLDER_REF)
            .after(&[Kind::PolicyFragments, Kind::EncassConfigs]),
        Kind::BackgroundTaskPolicies => KindSpec::new(IN_FOLDER)
            .referencing(FOLDER_REF)
            .after(&[Kind::PolicyFragments, Kind::EncassConfigs]),
        Kind::ScheduledTasks => KindSpec::new(NAME).referencing(TASK_POLICY_REF),
        Kind::Policies => KindSpec::new(IN_FOLDER)
            .referencing(FOLDER_REF)
            .after(&[Kind::PolicyFragments, Kind::EncassConfigs]),
        Kind::Services
        | Kind::WebApiServices
        | Kind::SoapServices
        | Kind::InternalWebApiServices
        | Kind::InternalSoapServices => KindSpec::new(IN_FOLDER)
            .masking(&["resolutionPath"])
            .referencing(FOLDER_REF)
            .after(&[
                Kind::PolicyFragments,
                Kind::EncassConfigs,
                Kind::ServiceResolutionConfigs,
            ]),
        Kind::PolicyBackedServices => KindSpec::new(NAME).after(&[Kind::Policies]),
        Kind::GenericEntities => KindSpec::new(NAME),
        Kind::Roles => KindSpec::new(NAME).after(&[
            Kind::Folders,
            Kind::InternalUsers,
            Kind::InternalGroups,
            Kind::FipUsers,
            Kind::FipGroups,
        ]),
    }
}

/// Registry of kind rules, seeded with the built-in catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    specs: Vec<KindSpec>,
}

impl Catalog {
    /// Catalog with the built-in rules for every kind
    pub fn builtin() -> Self {
        Self {
            specs: Kind::ALL.iter().map(|k| builtin_spec(*k)).collect(),
        }
    }

    /// Replace the rules for a kind
    pub fn register(&mut self, kind: Kind, spec: KindSpec) {
        log::debug!("Registering rules for {kind}");
        self.specs[kind.index()] = spec;
    }

    pub fn spec(&self, kind: Kind) -> &KindSpec {
        &self.specs[kind.index()]
    }

    /// Natural key of a property map under a kind's identity rule
    pub fn natural_key(&self, kind: Kind, props: &Properties) -> Option<NaturalKey> {
        self.spec(kind).identity.key_of(props)
    }

    pub fn prerequisites(&self, kind: Kind) -> Vec<Kind> {
        self.spec(kind).prerequisites(kind)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
