//! Parser for `ping` output (bound to `ToolDef::tool_id == "ping"`).

use chrono::Utc;
use redcell_core::entity_id;
use redcell_core::entities::{Entity, EntityData, EntityStatus};

use crate::parser::{self, Input, OutputParser};
use crate::helpers;

pub struct PingParser;

impl OutputParser for PingParser {
    fn parse(&self, input: Input<'_>) -> redcell_core::ParseOutput {
        if !input.stdout.contains("ping statistics") && !input.stdout.contains("packets transmitted") {
            return parser::parse_failed();
        }

        let received = input
            .stdout
            .lines()
            .find_map(|line| {
                let line = line.trim();
                if !line.contains("packets transmitted") {
                    return None;
                }
                line.split(',').find_map(|part| {
                    let part = part.trim();
                    part.strip_suffix(" received")
                        .and_then(|n| n.trim().parse::<u32>().ok())
                })
            })
            .unwrap_or(0);

        let is_alive = received > 0;

        let response_time_ms = input.stdout.lines().find_map(|line| {
            let line = line.trim();
            if !line.starts_with("64 bytes") && !line.contains("time=") {
                return None;
            }
            line.split("time=")
                .nth(1)?
                .split_whitespace()
                .next()?
                .parse::<f64>()
                .ok()
        });

        let ip = helpers::extract_ipv4_addresses(input.target)
            .into_iter()
            .next()
            .unwrap_or_else(|| input.target.to_string());

        let host = Entity {
            id: entity_id::host_id(&ip),
            discovered_by: "ping".to_string(),
            discovered_at: Utc::now(),
            updated_at: Utc::now(),
            status: if is_alive {
                EntityStatus::Verified
            } else {
                EntityStatus::Unreachable
            },
            confidence: 0.6,
            tags: Default::default(),
            data: EntityData::Host {
                ip_address: ip,
                hostnames: Default::default(),
                os_family: None,
                os_version: None,
                is_alive,
                last_seen: Some(Utc::now()),
                response_time_ms,
            },
        };

        parser::parsed(vec![host], vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redcell_core::coordinator::ParseInput;
    use redcell_core::knowledge::ParseStatus;

    #[test]
    fn successful_ping_marks_host_alive_with_rtt() {
        let stdout = "PING 10.0.0.1 (10.0.0.1) 56(84) bytes of data.\n\
64 bytes from 10.0.0.1: icmp_seq=1 ttl=64 time=0.045 ms\n\
\n\
--- 10.0.0.1 ping statistics ---\n\
1 packets transmitted, 1 received, 0% packet loss, time 0ms\n";
        let output = PingParser.parse(ParseInput {
            target: "10.0.0.1",
            stdout,
            stderr: "",
        });
        assert!(matches!(output.status, ParseStatus::Parsed));
        assert_eq!(output.batch.entities.len(), 1);
        if let EntityData::Host { is_alive, response_time_ms, .. } = &output.batch.entities[0].data {
            assert!(*is_alive);
            assert_eq!(*response_time_ms, Some(0.045));
        } else {
            panic!("expected host entity");
        }
    }

    #[test]
    fn all_packets_lost_marks_host_unreachable() {
        let stdout = "PING 10.0.0.9 (10.0.0.9) 56(84) bytes of data.\n\
\n\
--- 10.0.0.9 ping statistics ---\n\
4 packets transmitted, 0 received, 100% packet loss, time 3000ms\n";
        let output = PingParser.parse(ParseInput {
            target: "10.0.0.9",
            stdout,
            stderr: "",
        });
        if let EntityData::Host { is_alive, .. } = &output.batch.entities[0].data {
            assert!(!is_alive);
        } else {
            panic!("expected host entity");
        }
    }

    #[test]
    fn unrecognized_output_fails_to_parse() {
        let output = PingParser.parse(ParseInput {
            target: "10.0.0.1",
            stdout: "command not found",
            stderr: "",
        });
        assert!(matches!(output.status, ParseStatus::ParseFailed));
        assert!(output.batch.entities.is_empty());
    }
}
