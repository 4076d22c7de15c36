//! Parser for `gobuster dir` output (tool_id `"gobuster_dir"`).

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use redcell_core::entities::{Entity, EntityData, EntityStatus, Protocol, PortState, Relationship, RelationshipType, WebResourceKind};
use redcell_core::entity_id;

use crate::parser::{self, Input, OutputParser};

static RESULT_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<path>/\S*)\s+\(Status:\s*(?P<status>\d{3})\)(?:\s+\[Size:\s*(?P<size>\d+)\])?").unwrap());

static BASE_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?P<scheme>https?)://(?P<host>[^/:]+)(?::(?P<port>\d+))?").unwrap());

struct BaseUrl {
    host: String,
    port: u16,
    scheme: String,
}

fn parse_base_url(target: &str) -> Option<BaseUrl> {
    let caps = BASE_URL_RE.captures(target.trim())?;
    let scheme = caps.name("scheme")?.as_str().to_lowercase();
    let host = caps.name("host")?.as_str().to_string();
    let port = caps
        .name("port")
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(if scheme == "https" { 443 } else { 80 });
    Some(BaseUrl { host, port, scheme })
}

fn resource_kind_for(path: &str) -> WebResourceKind {
    if path.ends_with('/') {
        WebResourceKind::Directory
    } else {
        WebResourceKind::File
    }
}

pub struct GobusterParser;

impl OutputParser for GobusterParser {
    fn parse(&self, input: Input<'_>) -> redcell_core::ParseOutput {
        if !RESULT_LINE_RE.is_match(input.stdout) {
            return parser::parse_failed();
        }

        let Some(base) = parse_base_url(input.target) else {
            return parser::parse_failed();
        };

        let host_id = entity_id::host_id(&base.host);
        let port_id = entity_id::port_id(&host_id, base.port, "tcp");
        let service_id = entity_id::service_id(&port_id, &base.scheme);

        let mut entities = vec![
            Entity {
                id: host_id.clone(),
                discovered_by: "gobuster_dir".to_string(),
                discovered_at: Utc::now(),
                updated_at: Utc::now(),
                status: EntityStatus::Discovered,
                confidence: 0.4,
                tags: Default::default(),
                data: EntityData::Host {
                    ip_address: base.host.clone(),
                    hostnames: Default::default(),
                    os_family: None,
                    os_version: None,
                    is_alive: true,
                    last_seen: Some(Utc::now()),
                    response_time_ms: None,
                },
            },
            Entity {
                id: port_id.clone(),
                discovered_by: "gobuster_dir".to_string(),
                discovered_at: Utc::now(),
                updated_at: Utc::now(),
                status: EntityStatus::Discovered,
                confidence: 0.4,
                tags: Default::default(),
                data: EntityData::Port {
                    parent_host_id: host_id.clone(),
                    port: base.port,
                    protocol: Protocol::Tcp,
                    state: PortState::Open,
                },
            },
            Entity {
                id: service_id.clone(),
                discovered_by: "gobuster_dir".to_string(),
                discovered_at: Utc::now(),
                updated_at: Utc::now(),
                status: EntityStatus::Discovered,
                confidence: 0.4,
                tags: Default::default(),
                data: EntityData::Service {
                    parent_port_id: port_id.clone(),
                    name: base.scheme.clone(),
                    product: None,
                    version: None,
                    banner: None,
                    cpe: None,
                },
            },
        ];

        let mut relationships = vec![
            Relationship {
                parent_id: host_id,
                child_id: port_id.clone(),
                relationship_type: RelationshipType::HasPort,
                created_at: Utc::now(),
            },
            Relationship {
                parent_id: port_id,
                child_id: service_id.clone(),
                relationship_type: RelationshipType::HasService,
                created_at: Utc::now(),
            },
        ];

        for line in input.stdout.lines() {
            let Some(caps) = RESULT_LINE_RE.captures(line.trim()) else {
                continue;
            };
            let path = caps.name("path").unwrap().as_str();
            let status_code: u16 = caps.name("status").unwrap().as_str().parse().unwrap_or(0);
            let size: Option<u64> = caps.name("size").and_then(|m| m.as_str().parse().ok());

            let full_url = format!("{}://{}{}", base.scheme, base.host, path);
            let web_id = entity_id::web_resource_id(&service_id, &full_url);

            entities.push(Entity {
                id: web_id.clone(),
                discovered_by: "gobuster_dir".to_string(),
                discovered_at: Utc::now(),
                updated_at: Utc::now(),
                status: EntityStatus::Discovered,
                confidence: 0.5,
                tags: Default::default(),
                data: EntityData::WebResource {
                    parent_service_id: service_id.clone(),
                    url: full_url,
                    resource_kind: resource_kind_for(path),
                    status_code: Some(status_code),
                    content_type: None,
                    size,
                    technologies: Default::default(),
                },
            });
            relationships.push(Relationship {
                parent_id: service_id.clone(),
                child_id: web_id,
                relationship_type: RelationshipType::HasWebResource,
                created_at: Utc::now(),
            });
        }

        parser::parsed(entities, relationships)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redcell_core::coordinator::ParseInput;
    use redcell_core::knowledge::ParseStatus;

    #[test]
    fn parses_discovered_paths_into_web_resources() {
        let stdout = "/admin                (Status: 301) [Size: 178]\n\
/images               (Status: 200) [Size: 4096]\n";
        let output = GobusterParser.parse(ParseInput {
            target: "http://example.com",
            stdout,
            stderr: "",
        });
        assert!(matches!(output.status, ParseStatus::Parsed));
        // host + port + service + 2 web resources
        assert_eq!(output.batch.entities.len(), 5);
    }

    #[test]
    fn non_gobuster_output_fails_to_parse() {
        let output = GobusterParser.parse(ParseInput {
            target: "http://example.com",
            stdout: "no results here",
            stderr: "",
        });
        assert!(matches!(output.status, ParseStatus::ParseFailed));
    }
}
