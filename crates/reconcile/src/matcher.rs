//! Matching desired entities to live entities
//!
//! Precedence:
//! 1. A non-empty goid present on the gateway is authoritative.
//! 2. Otherwise the kind's natural key. A blank key never matches, and more
//!    than one live entity with the same key is an ambiguity.

use crate::catalog::{Catalog, Kind, NaturalKey};
use crate::entity::{Entity, LiveEntity};
use crate::types::Goid;
use std::collections::HashMap;

/// How a match was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchBasis {
    Goid,
    NaturalKey,
}

/// Result of looking up one desired entity
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome<'a> {
    /// No corresponding live entity
    Unmatched,
    /// Exactly one corresponding live entity
    Matched {
        live: &'a LiveEntity,
        basis: MatchBasis,
    },
    /// Several live entities share the desired natural key
    Ambiguous { key: NaturalKey, candidates: usize },
}

impl MatchOutcome<'_> {
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }
}

/// Index over the live entities of one kind
pub struct Matcher<'a> {
    catalog: &'a Catalog,
    kind: Kind,
    by_goid: HashMap<&'a Goid, &'a LiveEntity>,
    by_key: HashMap<NaturalKey, Vec<&'a LiveEntity>>,
}

impl<'a> Matcher<'a> {
    /// Index live entities of `kind`; entities of other kinds are ignored
    pub fn new(catalog: &'a Catalog, kind: Kind, live: &'a [LiveEntity]) -> Self {
        let mut by_goid = HashMap::new();
        let mut by_key: HashMap<NaturalKey, Vec<&'a LiveEntity>> = HashMap::new();

        for entity in live {
            if entity.kind != kind {
                log::debug!(
                    "Ignoring live {} entity {} while indexing {}",
                    entity.kind,
                    entity.goid,
                    kind
                );
                continue;
            }
            by_goid.insert(&entity.goid, entity);
            if let Some(key) = entity.natural_key(catalog) {
                by_key.entry(key).or_default().push(entity);
            }
        }

        Self {
            catalog,
            kind,
            by_goid,
            by_key,
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// Number of indexed live entities
    pub fn len(&self) -> usize {
        self.by_goid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_goid.is_empty()
    }

    /// Find the live counterpart of a desired entity
    pub fn find(&self, desired: &impl Entity) -> MatchOutcome<'a> {
        if let Some(goid) = desired.goid()
            && let Some(&live) = self.by_goid.get(goid)
        {
            return MatchOutcome::Matched {
                live,
                basis: MatchBasis::Goid,
            };
        }

        let Some(key) = desired.natural_key(self.catalog) else {
            return MatchOutcome::Unmatched;
        };

        match self.by_key.get(&key).map(Vec::as_slice) {
            None | Some([]) => MatchOutcome::Unmatched,
            Some(&[live]) => MatchOutcome::Matched {
                live,
                basis: MatchBasis::NaturalKey,
            },
            Some(candidates) => MatchOutcome::Ambiguous {
                candidates: candidates.len(),
                key,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRecord;
    use crate::types::{Properties, properties};

    fn live(kind: Kind, goid: &str, props: Properties) -> LiveEntity {
        LiveEntity {
            kind,
            goid: Goid::new(goid).unwrap(),
            checksum: None,
            properties: props,
        }
    }

    #[test]
    fn test_goid_wins_over_natural_key() {
        let catalog = Catalog::builtin();
        let entities = vec![
            live(Kind::Folders, "g1", properties([("name", "Root/A")])),
            live(Kind::Folders, "g2", properties([("name", "Root/B")])),
        ];
        let matcher = Matcher::new(&catalog, Kind::Folders, &entities);

        // goid points at g2 even though the name says Root/A
        let desired = EntityRecord::new(Kind::Folders, properties([("name", "Root/A")]))
            .with_goid(Goid::new("g2").unwrap());
        match matcher.find(&desired) {
            MatchOutcome::Matched { live, basis } => {
                assert_eq!(live.goid.as_str(), "g2");
                assert_eq!(basis, MatchBasis::Goid);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_goid_falls_back_to_key() {
        let catalog = Catalog::builtin();
        let entities = vec![live(Kind::Folders, "g1", properties([("name", "Root/A")]))];
        let matcher = Matcher::new(&catalog, Kind::Folders, &entities);

        let desired = EntityRecord::new(Kind::Folders, properties([("name", "Root/A")]))
            .with_goid(Goid::new("other-env-goid").unwrap());
        match matcher.find(&desired) {
            MatchOutcome::Matched { live, basis } => {
                assert_eq!(live.goid.as_str(), "g1");
                assert_eq!(basis, MatchBasis::NaturalKey);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_blank_key_is_unmatched() {
        let catalog = Catalog::builtin();
        let entities = vec![live(Kind::Folders, "g1", properties([("name", "")]))];
        let matcher = Matcher::new(&catalog, Kind::Folders, &entities);
        let desired = EntityRecord::new(Kind::Folders, properties([("name", "")]));
        assert_eq!(matcher.find(&desired), MatchOutcome::Unmatched);
    }

    #[test]
    fn test_duplicate_keys_are_ambiguous() {
        let catalog = Catalog::builtin();
        let entities = vec![
            live(Kind::ClusterProperties, "g1", properties([("name", "cluster.host")])),
            live(Kind::ClusterProperties, "g2", properties([("name", "cluster.host")])),
            live(Kind::ClusterProperties, "g3", properties([("name", "cluster.port")])),
        ];
        let matcher = Matcher::new(&catalog, Kind::ClusterProperties, &entities);

        let desired =
            EntityRecord::new(
                Kind::ClusterProperties,
                properties([("name", "cluster.host")]),
            );
        match matcher.find(&desired) {
            MatchOutcome::Ambiguous { key, candidates } => {
                assert_eq!(candidates, 2);
                assert_eq!(key.value_of("name"), Some("cluster.host"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let desired =
            EntityRecord::new(
                Kind::ClusterProperties,
                properties([("name", "cluster.port")]),
            );
        assert!(matcher.find(&desired).is_matched());
    }

    #[test]
    fn test_compound_key_requires_every_part() {
        let catalog = Catalog::builtin();
        let entities = vec![live(
            Kind::JmsDestinations,
            "g1",
            properties([
                ("name", "orders"),
                ("direction", "INBOUND"),
                ("providerType", "TIBCO EMS"),
            ]),
        )];
        let matcher = Matcher::new(&catalog, Kind::JmsDestinations, &entities);

        let outbound = EntityRecord::new(
            Kind::JmsDestinations,
            properties([
                ("name", "orders"),
                ("direction", "OUTBOUND"),
                ("providerType", "TIBCO EMS"),
            ]),
        );
        assert_eq!(matcher.find(&outbound), MatchOutcome::Unmatched);
    }

    #[test]
    fn test_other_kinds_are_not_indexed() {
        let catalog = Catalog::builtin();
        let entities = vec![
            live(Kind::Secrets, "g1", properties([("name", "db")])),
            live(Kind::Folders, "g2", properties([("name", "db")])),
        ];
        let matcher = Matcher::new(&catalog, Kind::Secrets, &entities);
        assert_eq!(matcher.len(), 1);
    }
}
