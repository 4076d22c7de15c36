//! Entity and Relationship data model.
//!
//! Entities are polymorphic over `EntityData`, discriminated by `EntityKind`.
//! All cross-references between entities are expressed as `Relationship` rows,
//! never as pointers held inside an entity — this is what lets the Knowledge
//! Store cascade-delete on TTL prune without walking live object graphs.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status shared by every entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Discovered,
    Verified,
    Exploited,
    Failed,
    Unreachable,
}

/// Discriminant for the polymorphic entity payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Host,
    Port,
    Service,
    Vulnerability,
    WebResource,
    DnsRecord,
    Certificate,
    Credential,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Open,
    Closed,
    Filtered,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebResourceKind {
    Directory,
    File,
    Endpoint,
    Parameter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Password,
    Hash,
    Key,
}

/// Per-kind payload. Kept as an enum (not a trait object) so the Knowledge
/// Store can serialize/deserialize `data_json` without a registry of types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityData {
    Host {
        ip_address: String,
        #[serde(default)]
        hostnames: BTreeSet<String>,
        #[serde(default)]
        os_family: Option<String>,
        #[serde(default)]
        os_version: Option<String>,
        #[serde(default)]
        is_alive: bool,
        #[serde(default)]
        last_seen: Option<DateTime<Utc>>,
        #[serde(default)]
        response_time_ms: Option<f64>,
    },
    Port {
        parent_host_id: String,
        port: u16,
        protocol: Protocol,
        state: PortState,
    },
    Service {
        parent_port_id: String,
        name: String,
        #[serde(default)]
        product: Option<String>,
        #[serde(default)]
        version: Option<String>,
        #[serde(default)]
        banner: Option<String>,
        #[serde(default)]
        cpe: Option<String>,
    },
    Vulnerability {
        affected_id: String,
        identifier: String,
        severity: Severity,
        #[serde(default)]
        cvss: Option<f32>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        exploitable: bool,
        #[serde(default)]
        exploit_available: bool,
        #[serde(default)]
        exploit_verified: bool,
    },
    WebResource {
        parent_service_id: String,
        url: String,
        resource_kind: WebResourceKind,
        #[serde(default)]
        status_code: Option<u16>,
        #[serde(default)]
        content_type: Option<String>,
        #[serde(default)]
        size: Option<u64>,
        #[serde(default)]
        technologies: BTreeSet<String>,
    },
    DnsRecord {
        domain: String,
        record_type: String,
        value: String,
        #[serde(default)]
        resolves_to_host_id: Option<String>,
    },
    Certificate {
        parent_host_id: String,
        common_name: String,
        #[serde(default)]
        sans: BTreeSet<String>,
        issuer: String,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
        #[serde(default)]
        self_signed: bool,
        #[serde(default)]
        expired: bool,
    },
    Credential {
        username: String,
        /// Ciphertext only — see `knowledge::crypto`. Never the raw secret.
        #[serde(default)]
        encrypted_secret: Option<Vec<u8>>,
        credential_kind: CredentialKind,
        context_id: String,
        #[serde(default)]
        valid: bool,
    },
    File {
        parent_host_id: String,
        absolute_path: String,
        #[serde(default)]
        hash: Option<String>,
    },
}

impl EntityData {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityData::Host { .. } => EntityKind::Host,
            EntityData::Port { .. } => EntityKind::Port,
            EntityData::Service { .. } => EntityKind::Service,
            EntityData::Vulnerability { .. } => EntityKind::Vulnerability,
            EntityData::WebResource { .. } => EntityKind::WebResource,
            EntityData::DnsRecord { .. } => EntityKind::DnsRecord,
            EntityData::Certificate { .. } => EntityKind::Certificate,
            EntityData::Credential { .. } => EntityKind::Credential,
            EntityData::File { .. } => EntityKind::File,
        }
    }
}

/// A fully materialized knowledge entity, as stored and returned by queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub discovered_by: String,
    pub discovered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: EntityStatus,
    pub confidence: f32,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub data: EntityData,
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        self.data.kind()
    }

    /// Merge rule used by `upsert_entities`:
    /// 1. higher confidence wins for scalar fields (we take the incoming record wholesale
    ///    when it has strictly higher confidence, else keep `self`'s scalars);
    /// 2. newer `updated_at` wins for mutable status on a confidence tie;
    /// 3. set-valued fields (tags, hostnames, SANs, technologies) are always unioned.
    pub fn merge(mut self, incoming: Entity) -> Entity {
        debug_assert_eq!(self.id, incoming.id);

        let incoming_wins_scalars = incoming.confidence > self.confidence
            || (incoming.confidence == self.confidence && incoming.updated_at >= self.updated_at);

        let merged_tags: BTreeSet<String> =
            self.tags.union(&incoming.tags).cloned().collect();

        let merged_data = merge_data(self.data.clone(), incoming.data.clone(), incoming_wins_scalars);

        let (status, confidence) = if incoming_wins_scalars {
            (incoming.status, incoming.confidence.max(self.confidence))
        } else {
            (self.status, self.confidence)
        };

        self.status = status;
        self.confidence = confidence;
        self.data = merged_data;
        self.tags = merged_tags;
        self.updated_at = self.updated_at.max(incoming.updated_at);
        self
    }
}

/// Merges two payloads of the same kind: every set-valued sub-field (rule 3)
/// is unioned from both sides regardless of which side wins; every other
/// (scalar) sub-field comes entirely from whichever side `incoming_wins_scalars`
/// already picked, so a higher-confidence rescan can actually change a scalar
/// like `Port::state` instead of being silently dropped.
fn merge_data(base: EntityData, incoming: EntityData, incoming_wins_scalars: bool) -> EntityData {
    match (base, incoming) {
        (
            EntityData::Host { hostnames: mut h1, ip_address: ip1, os_family: of1, os_version: ov1, is_alive: alive1, last_seen: seen1, response_time_ms: rt1 },
            EntityData::Host { hostnames: h2, ip_address: ip2, os_family: of2, os_version: ov2, is_alive: alive2, last_seen: seen2, response_time_ms: rt2 },
        ) => {
            h1.extend(h2);
            let last_seen = seen1.max(seen2);
            let (ip_address, os_family, os_version, is_alive, response_time_ms) = if incoming_wins_scalars {
                (ip2, of2, ov2, alive2, rt2)
            } else {
                (ip1, of1, ov1, alive1, rt1)
            };
            EntityData::Host {
                ip_address,
                hostnames: h1,
                os_family,
                os_version,
                is_alive,
                last_seen,
                response_time_ms,
            }
        }
        (
            EntityData::WebResource { technologies: mut t1, parent_service_id: p1, url: u1, resource_kind: rk1, status_code: sc1, content_type: ct1, size: sz1 },
            EntityData::WebResource { technologies: t2, parent_service_id: p2, url: u2, resource_kind: rk2, status_code: sc2, content_type: ct2, size: sz2 },
        ) => {
            t1.extend(t2);
            let (parent_service_id, url, resource_kind, status_code, content_type, size) = if incoming_wins_scalars {
                (p2, u2, rk2, sc2, ct2, sz2)
            } else {
                (p1, u1, rk1, sc1, ct1, sz1)
            };
            EntityData::WebResource {
                parent_service_id,
                url,
                resource_kind,
                status_code,
                content_type,
                size,
                technologies: t1,
            }
        }
        (
            EntityData::Certificate { sans: mut s1, parent_host_id: ph1, common_name: cn1, issuer: is1, not_before: nb1, not_after: na1, self_signed: ss1, expired: ex1 },
            EntityData::Certificate { sans: s2, parent_host_id: ph2, common_name: cn2, issuer: is2, not_before: nb2, not_after: na2, self_signed: ss2, expired: ex2 },
        ) => {
            s1.extend(s2);
            let (parent_host_id, common_name, issuer, not_before, not_after, self_signed, expired) = if incoming_wins_scalars {
                (ph2, cn2, is2, nb2, na2, ss2, ex2)
            } else {
                (ph1, cn1, is1, nb1, na1, ss1, ex1)
            };
            EntityData::Certificate {
                parent_host_id,
                common_name,
                sans: s1,
                issuer,
                not_before,
                not_after,
                self_signed,
                expired,
            }
        }
        // No set-valued sub-fields for this kind: the whole payload comes from
        // whichever side the scalar merge picked.
        (base, incoming) => if incoming_wins_scalars { incoming } else { base },
    }
}

/// Relationship row: `(parent_id, child_id, type)`, cascade-deleted from the parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipType {
    HasPort,
    HasService,
    HasVulnerability,
    HasWebResource,
    ResolvesTo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub parent_id: String,
    pub child_id: String,
    pub relationship_type: RelationshipType,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(confidence: f32, updated_at: DateTime<Utc>, alive: bool) -> Entity {
        Entity {
            id: "host_1_2_3_4".into(),
            discovered_by: "nmap".into(),
            discovered_at: updated_at,
            updated_at,
            status: EntityStatus::Discovered,
            confidence,
            tags: BTreeSet::new(),
            data: EntityData::Host {
                ip_address: "1.2.3.4".into(),
                hostnames: BTreeSet::new(),
                os_family: None,
                os_version: None,
                is_alive: alive,
                last_seen: None,
                response_time_ms: None,
            },
        }
    }

    #[test]
    fn higher_confidence_wins_scalars() {
        let t0 = Utc::now();
        let base = host(0.5, t0, false);
        let incoming = host(0.9, t0, true);
        let merged = base.merge(incoming);
        assert_eq!(merged.confidence, 0.9);
        if let EntityData::Host { is_alive, .. } = merged.data {
            assert!(is_alive);
        } else {
            panic!("wrong kind");
        }
    }

    #[test]
    fn tie_prefers_newer_updated_at() {
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(5);
        let base = host(0.5, t0, false);
        let incoming = host(0.5, t1, true);
        let merged = base.merge(incoming);
        assert!(matches!(merged.data, EntityData::Host { is_alive: true, .. }));
    }

    fn port(confidence: f32, updated_at: DateTime<Utc>, state: PortState) -> Entity {
        Entity {
            id: "port_1_2_3_4_22_tcp".into(),
            discovered_by: "nmap".into(),
            discovered_at: updated_at,
            updated_at,
            status: EntityStatus::Discovered,
            confidence,
            tags: BTreeSet::new(),
            data: EntityData::Port {
                parent_host_id: "host_1_2_3_4".into(),
                port: 22,
                protocol: Protocol::Tcp,
                state,
            },
        }
    }

    #[test]
    fn higher_confidence_rescan_updates_a_scalar_only_field() {
        let t0 = Utc::now();
        let base = port(0.4, t0, PortState::Open);
        let incoming = port(0.9, t0, PortState::Closed);
        let merged = base.merge(incoming);
        assert!(matches!(merged.data, EntityData::Port { state: PortState::Closed, .. }));
    }

    #[test]
    fn lower_confidence_rescan_does_not_overwrite_a_scalar_only_field() {
        let t0 = Utc::now();
        let base = port(0.9, t0, PortState::Open);
        let incoming = port(0.2, t0, PortState::Closed);
        let merged = base.merge(incoming);
        assert!(matches!(merged.data, EntityData::Port { state: PortState::Open, .. }));
    }

    #[test]
    fn lower_confidence_ping_does_not_revive_a_verified_dead_host() {
        let t0 = Utc::now();
        let base = host(0.9, t0, false);
        let incoming = host(0.1, t0, true);
        let merged = base.merge(incoming);
        if let EntityData::Host { is_alive, .. } = merged.data {
            assert!(!is_alive);
        } else {
            panic!("wrong kind");
        }
    }

    #[test]
    fn tags_are_unioned_regardless_of_winner() {
        let t0 = Utc::now();
        let mut base = host(0.9, t0, true);
        base.tags.insert("a".into());
        let mut incoming = host(0.1, t0, false);
        incoming.tags.insert("b".into());
        let merged = base.merge(incoming);
        assert_eq!(merged.tags.len(), 2);
    }
}
