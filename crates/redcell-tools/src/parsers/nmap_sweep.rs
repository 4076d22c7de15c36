//! Parser for `nmap -sn` host-discovery sweeps (tool_id `"nmap_host_sweep"`).

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

use redcell_core::entities::{Entity, EntityData, EntityStatus};
use redcell_core::entity_id;

use crate::parser::{self, Input, OutputParser};

static REPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^Nmap scan report for (?:(?P<hostname>\S+) \((?P<ip_paren>[\d.:a-fA-F]+)\)|(?P<ip_bare>[\d.:a-fA-F]+))$").unwrap()
});

pub struct NmapSweepParser;

impl OutputParser for NmapSweepParser {
    fn parse(&self, input: Input<'_>) -> redcell_core::ParseOutput {
        if !input.stdout.contains("Nmap scan report for") {
            return parser::parse_failed();
        }

        let mut entities = Vec::new();
        let mut lines = input.stdout.lines().peekable();

        while let Some(line) = lines.next() {
            let Some(caps) = REPORT_RE.captures(line.trim()) else {
                continue;
            };
            let (ip, hostname) = if let Some(ip) = caps.name("ip_paren") {
                (ip.as_str().to_string(), caps.name("hostname").map(|m| m.as_str().to_string()))
            } else {
                (caps.name("ip_bare").unwrap().as_str().to_string(), None)
            };

            let is_alive = lines
                .peek()
                .map(|next| next.to_lowercase().contains("host is up"))
                .unwrap_or(false);

            let mut hostnames = std::collections::BTreeSet::new();
            if let Some(h) = hostname {
                hostnames.insert(h);
            }

            entities.push(Entity {
                id: entity_id::host_id(&ip),
                discovered_by: "nmap_host_sweep".to_string(),
                discovered_at: Utc::now(),
                updated_at: Utc::now(),
                status: if is_alive {
                    EntityStatus::Verified
                } else {
                    EntityStatus::Unreachable
                },
                confidence: 0.7,
                tags: Default::default(),
                data: EntityData::Host {
                    ip_address: ip,
                    hostnames,
                    os_family: None,
                    os_version: None,
                    is_alive,
                    last_seen: Some(Utc::now()),
                    response_time_ms: None,
                },
            });
        }

        if entities.is_empty() {
            parser::empty_output()
        } else {
            parser::parsed(entities, vec![])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redcell_core::coordinator::ParseInput;
    use redcell_core::knowledge::ParseStatus;

    #[test]
    fn parses_multiple_hosts_with_and_without_hostnames() {
        let stdout = "Starting Nmap 7.92\n\
Nmap scan report for 10.0.0.1\n\
Host is up (0.00050s latency).\n\
Nmap scan report for router.lan (10.0.0.254)\n\
Host is up (0.0040s latency).\n\
Nmap done: 256 IP addresses (2 hosts up) scanned in 2.5 seconds\n";
        let output = NmapSweepParser.parse(ParseInput {
            target: "10.0.0.0/24",
            stdout,
            stderr: "",
        });
        assert!(matches!(output.status, ParseStatus::Parsed));
        assert_eq!(output.batch.entities.len(), 2);
    }

    #[test]
    fn non_nmap_output_fails_to_parse() {
        let output = NmapSweepParser.parse(ParseInput {
            target: "10.0.0.0/24",
            stdout: "not nmap output",
            stderr: "",
        });
        assert!(matches!(output.status, ParseStatus::ParseFailed));
    }
}
