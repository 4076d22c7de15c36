//! Entity ID Generator.
//!
//! Pure functions mapping a kind and its natural key to a canonical,
//! lowercase string id. No timestamps, randomness, or parser identity may
//! leak into an id — two parsers observing the same natural key must derive
//! the same id so the Knowledge Store can merge them.

use md5::{Digest, Md5};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::StoreError;

fn md5_hex8(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest)[..8].to_string()
}

/// Thin local hex encoder so we don't pull in the `hex` crate for eight bytes.
mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        let mut s = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            s.push_str(&format!("{:02x}", b));
        }
        s
    }
}

/// Host id: `host_<ip with dots/colons replaced by underscores>`.
pub fn host_id(ip_address: &str) -> String {
    let normalized = ip_address.trim().to_lowercase().replace(['.', ':'], "_");
    format!("host_{normalized}")
}

/// Port id: `<host_id>_port_<number>_<proto>`.
pub fn port_id(host_id: &str, port: u16, protocol: &str) -> String {
    format!("{host_id}_port_{port}_{}", protocol.to_lowercase())
}

/// Service id: `<port_id>_service_<name>` with spaces folded to underscores.
pub fn service_id(port_id: &str, name: &str) -> String {
    let slug = name.trim().to_lowercase().replace(' ', "_");
    format!("{port_id}_service_{slug}")
}

/// Vulnerability id: `<service_id>_vuln_<identifier>` with dashes folded to underscores.
pub fn vulnerability_id(service_id: &str, identifier: &str) -> String {
    let slug = identifier.trim().to_lowercase().replace('-', "_");
    format!("{service_id}_vuln_{slug}")
}

/// WebResource id: `<service_id>_web_hash_<first 8 hex of md5(lowercased url, no trailing slash)>`.
pub fn web_resource_id(service_id: &str, url: &str) -> String {
    let mut normalized = url.trim().to_lowercase();
    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }
    format!("{service_id}_web_hash_{}", md5_hex8(&normalized))
}

/// DNS record id: `dns_<domain with dots replaced by underscores>`.
pub fn dns_id(domain: &str) -> String {
    let normalized = domain.trim().to_lowercase().replace('.', "_");
    format!("dns_{normalized}")
}

/// Certificate id: `cert_<sha256 fingerprint, lowercase, no colons>`.
pub fn certificate_id(fingerprint: &str) -> String {
    let normalized = fingerprint.trim().to_lowercase().replace(':', "");
    format!("cert_{normalized}")
}

/// Credential id: `cred_<username>_<service_id>`. The raw secret is never part of the id.
pub fn credential_id(username: &str, service_id: &str) -> String {
    format!("cred_{}_{service_id}", username.trim().to_lowercase())
}

/// File id: `file_<host_id>_hash_<first 8 hex of md5(absolute_path)>`.
pub fn file_id(host_id: &str, absolute_path: &str) -> String {
    format!("file_{host_id}_hash_{}", md5_hex8(absolute_path))
}

/// The discriminant used to pick the right validation regex for `validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKindId {
    Host,
    Port,
    Service,
    Vulnerability,
    WebResource,
    Dns,
    Certificate,
    Credential,
    File,
}

static HOST_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^host_[a-z0-9_]+$").unwrap());
static PORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^host_[a-z0-9_]+_port_[0-9]+_(tcp|udp)$").unwrap());
static SERVICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^host_[a-z0-9_]+_port_[0-9]+_(tcp|udp)_service_[a-z0-9_]+$").unwrap());
static VULN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^.+_vuln_[a-z0-9_]+$").unwrap());
static WEB_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^.+_web_hash_[0-9a-f]{8}$").unwrap());
static DNS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^dns_[a-z0-9_]+$").unwrap());
static CERT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^cert_[0-9a-f]+$").unwrap());
static CRED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^cred_[a-z0-9_.\-]+_.+$").unwrap());
static FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^file_host_[a-z0-9_]+_hash_[0-9a-f]{8}$").unwrap());

/// Validates that `id` matches the canonical shape for `kind`, returning
/// `StoreError::InvalidId` on mismatch.
pub fn validate(kind: EntityKindId, id: &str) -> Result<(), StoreError> {
    let re = match kind {
        EntityKindId::Host => &*HOST_RE,
        EntityKindId::Port => &*PORT_RE,
        EntityKindId::Service => &*SERVICE_RE,
        EntityKindId::Vulnerability => &*VULN_RE,
        EntityKindId::WebResource => &*WEB_RE,
        EntityKindId::Dns => &*DNS_RE,
        EntityKindId::Certificate => &*CERT_RE,
        EntityKindId::Credential => &*CRED_RE,
        EntityKindId::File => &*FILE_RE,
    };
    if re.is_match(id) {
        Ok(())
    } else {
        Err(StoreError::InvalidId(format!(
            "{id} does not match the canonical shape for {kind:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_id_replaces_dots_and_colons() {
        assert_eq!(host_id("192.168.1.1"), "host_192_168_1_1");
        assert_eq!(host_id("fe80::1"), "host_fe80__1");
    }

    #[test]
    fn host_id_is_pure() {
        assert_eq!(host_id("10.0.0.5"), host_id("10.0.0.5"));
    }

    #[test]
    fn port_and_service_ids_chain() {
        let h = host_id("192.168.1.10");
        let p = port_id(&h, 22, "TCP");
        assert_eq!(p, "host_192_168_1_10_port_22_tcp");
        let s = service_id(&p, "OpenSSH");
        assert_eq!(s, "host_192_168_1_10_port_22_tcp_service_openssh");
        validate(EntityKindId::Host, &h).unwrap();
        validate(EntityKindId::Port, &p).unwrap();
        validate(EntityKindId::Service, &s).unwrap();
    }

    #[test]
    fn web_resource_id_ignores_trailing_slash_and_case() {
        let svc = "host_1_2_3_4_port_80_tcp_service_http";
        let a = web_resource_id(svc, "http://Example.com/admin/");
        let b = web_resource_id(svc, "http://example.com/admin");
        assert_eq!(a, b);
    }

    #[test]
    fn credential_id_excludes_secret() {
        let id = credential_id("Admin", "host_1_service_ssh");
        assert_eq!(id, "cred_admin_host_1_service_ssh");
        assert!(!id.contains("hunter2"));
    }

    #[test]
    fn invalid_id_rejected() {
        assert!(validate(EntityKindId::Host, "not_a_host").is_err());
        assert!(validate(EntityKindId::Port, "host_1_port_99999_tcp").is_ok());
    }
}
