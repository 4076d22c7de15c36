//! Parser for `nmap -sT -p ...` port scans (tool_id `"nmap_port_scan"`).

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use redcell_core::entities::{Entity, EntityData, EntityStatus, PortState, Protocol, Relationship, RelationshipType};
use redcell_core::entity_id;

use crate::helpers;
use crate::parser::{self, Input, OutputParser};

static REPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^Nmap scan report for (?:\S+ \((?P<ip_paren>[\d.:a-fA-F]+)\)|(?P<ip_bare>[\d.:a-fA-F]+))$").unwrap()
});

fn port_state(state: &str) -> PortState {
    match state {
        "open" => PortState::Open,
        "closed" => PortState::Closed,
        "filtered" => PortState::Filtered,
        _ => PortState::Unknown,
    }
}

fn protocol(proto: &str) -> Protocol {
    match proto {
        "udp" => Protocol::Udp,
        _ => Protocol::Tcp,
    }
}

pub struct NmapPortScanParser;

impl OutputParser for NmapPortScanParser {
    fn parse(&self, input: Input<'_>) -> redcell_core::ParseOutput {
        if !input.stdout.contains("Nmap scan report for") {
            return parser::parse_failed();
        }

        let mut entities = Vec::new();
        let mut relationships = Vec::new();
        let mut current_host_id: Option<String> = None;

        for line in input.stdout.lines() {
            let trimmed = line.trim();

            if let Some(caps) = REPORT_RE.captures(trimmed) {
                let ip = caps
                    .name("ip_paren")
                    .or_else(|| caps.name("ip_bare"))
                    .unwrap()
                    .as_str()
                    .to_string();
                let host_id = entity_id::host_id(&ip);
                entities.push(Entity {
                    id: host_id.clone(),
                    discovered_by: "nmap_port_scan".to_string(),
                    discovered_at: Utc::now(),
                    updated_at: Utc::now(),
                    status: EntityStatus::Verified,
                    confidence: 0.8,
                    tags: Default::default(),
                    data: EntityData::Host {
                        ip_address: ip,
                        hostnames: Default::default(),
                        os_family: None,
                        os_version: None,
                        is_alive: true,
                        last_seen: Some(Utc::now()),
                        response_time_ms: None,
                    },
                });
                current_host_id = Some(host_id);
                continue;
            }

            let Some(host_id) = current_host_id.clone() else {
                continue;
            };
            let Some(triple) = helpers::parse_port_line(trimmed) else {
                continue;
            };

            let port_id = entity_id::port_id(&host_id, triple.port, &triple.protocol);
            entities.push(Entity {
                id: port_id.clone(),
                discovered_by: "nmap_port_scan".to_string(),
                discovered_at: Utc::now(),
                updated_at: Utc::now(),
                status: EntityStatus::Discovered,
                confidence: 0.8,
                tags: Default::default(),
                data: EntityData::Port {
                    parent_host_id: host_id.clone(),
                    port: triple.port,
                    protocol: protocol(&triple.protocol),
                    state: port_state(&triple.state),
                },
            });
            relationships.push(Relationship {
                parent_id: host_id,
                child_id: port_id.clone(),
                relationship_type: RelationshipType::HasPort,
                created_at: Utc::now(),
            });

            if let Some(service_name) = triple.service {
                let normalized = helpers::normalize_service_name(&service_name);
                let service_id = entity_id::service_id(&port_id, &normalized);
                entities.push(Entity {
                    id: service_id.clone(),
                    discovered_by: "nmap_port_scan".to_string(),
                    discovered_at: Utc::now(),
                    updated_at: Utc::now(),
                    status: EntityStatus::Discovered,
                    confidence: 0.6,
                    tags: Default::default(),
                    data: EntityData::Service {
                        parent_port_id: port_id.clone(),
                        name: normalized,
                        product: None,
                        version: None,
                        banner: None,
                        cpe: None,
                    },
                });
                relationships.push(Relationship {
                    parent_id: port_id,
                    child_id: service_id,
                    relationship_type: RelationshipType::HasService,
                    created_at: Utc::now(),
                });
            }
        }

        if entities.is_empty() {
            parser::empty_output()
        } else {
            parser::parsed(entities, relationships)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redcell_core::coordinator::ParseInput;
    use redcell_core::knowledge::ParseStatus;

    #[test]
    fn parses_host_ports_and_services_with_relationships() {
        let stdout = "Nmap scan report for 10.0.0.5\n\
Host is up (0.01s latency).\n\
PORT   STATE SERVICE\n\
22/tcp open  ssh\n\
80/tcp open  http\n\
Nmap done: 1 IP address (1 host up) scanned in 1.2 seconds\n";
        let output = NmapPortScanParser.parse(ParseInput {
            target: "10.0.0.5",
            stdout,
            stderr: "",
        });
        assert!(matches!(output.status, ParseStatus::Parsed));
        // 1 host + 2 ports + 2 services
        assert_eq!(output.batch.entities.len(), 5);
        assert_eq!(output.batch.relationships.len(), 4);
    }

    #[test]
    fn non_nmap_output_fails_to_parse() {
        let output = NmapPortScanParser.parse(ParseInput {
            target: "10.0.0.5",
            stdout: "garbage",
            stderr: "",
        });
        assert!(matches!(output.status, ParseStatus::ParseFailed));
    }
}
