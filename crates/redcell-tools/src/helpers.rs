//! Shared parsing helpers: the small, tool-agnostic bits every
//! parser needs so that each tool-specific parser stays a thin translation
//! from raw text to entities.

use once_cell::sync::Lazy;
use regex::Regex;

static IPV4_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)(\.(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)){3}\b").unwrap()
});

static PORT_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<port>\d{1,5})/(?P<proto>tcp|udp)\s+(?P<state>open|closed|filtered)(?:\s+(?P<service>\S+))?").unwrap()
});

/// Pulls every IPv4 literal out of free text, in the order they appear.
pub fn extract_ipv4_addresses(text: &str) -> Vec<String> {
    IPV4_RE.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// One `nmap`-style `PORT/proto STATE service` line, parsed into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortTriple {
    pub port: u16,
    pub protocol: String,
    pub state: String,
    pub service: Option<String>,
}

/// Parses a single `nmap` port-table line such as `80/tcp open http`.
/// Returns `None` for lines that don't match the shape at all (headers,
/// blank lines, summary text).
pub fn parse_port_line(line: &str) -> Option<PortTriple> {
    let caps = PORT_LINE_RE.captures(line.trim())?;
    Some(PortTriple {
        port: caps.name("port")?.as_str().parse().ok()?,
        protocol: caps.name("proto")?.as_str().to_lowercase(),
        state: caps.name("state")?.as_str().to_lowercase(),
        service: caps.name("service").map(|m| m.as_str().to_string()),
    })
}

/// Lowercases a URL and strips exactly one trailing slash, matching
/// `entity_id::web_resource_id`'s own canonicalization so a parser's
/// computed id always agrees with what the store will validate.
pub fn canonicalize_url(url: &str) -> String {
    let lower = url.trim().to_lowercase();
    lower.strip_suffix('/').unwrap_or(&lower).to_string()
}

/// Splits a banner string like `Apache httpd 2.4.41 (Ubuntu)` into
/// whitespace-delimited tokens, dropping empty tokens from repeated spaces.
pub fn tokenize_banner(banner: &str) -> Vec<String> {
    banner.split_whitespace().map(|s| s.to_string()).collect()
}

/// Normalizes a service name the way the registry's entity ids expect:
/// lowercase, internal whitespace collapsed to a single underscore.
pub fn normalize_service_name(name: &str) -> String {
    name.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_all_ipv4_literals() {
        let text = "Host 10.0.0.1 is up. Nmap scan report for 192.168.1.5";
        assert_eq!(extract_ipv4_addresses(text), vec!["10.0.0.1", "192.168.1.5"]);
    }

    #[test]
    fn parses_a_well_formed_port_line() {
        let triple = parse_port_line("80/tcp   open  http").unwrap();
        assert_eq!(triple.port, 80);
        assert_eq!(triple.protocol, "tcp");
        assert_eq!(triple.state, "open");
        assert_eq!(triple.service.as_deref(), Some("http"));
    }

    #[test]
    fn rejects_non_port_lines() {
        assert!(parse_port_line("Nmap done: 1 IP address scanned").is_none());
    }

    #[test]
    fn canonicalize_url_strips_one_trailing_slash_and_lowercases() {
        assert_eq!(canonicalize_url("HTTP://Example.com/Path/"), "http://example.com/path");
    }

    #[test]
    fn normalize_service_name_collapses_whitespace() {
        assert_eq!(normalize_service_name("  Apache   HTTPD "), "apache_httpd");
    }
}
