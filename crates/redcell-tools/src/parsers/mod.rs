//! Tool-specific parsers, one module per bound `tool_id`.

pub mod generic;
pub mod gobuster;
pub mod nmap_portscan;
pub mod nmap_sweep;
pub mod ping;

use std::collections::HashMap;
use std::sync::Arc;

use redcell_core::OutputParser;

/// Builds the full tool_id -> parser map the Coordinator is constructed
/// with. Tools with no dedicated parser fall back to `GenericParser`.
pub fn default_registry() -> HashMap<&'static str, Arc<dyn OutputParser>> {
    let mut map: HashMap<&'static str, Arc<dyn OutputParser>> = HashMap::new();
    map.insert("ping", Arc::new(ping::PingParser));
    map.insert("nmap_host_sweep", Arc::new(nmap_sweep::NmapSweepParser));
    map.insert("nmap_port_scan", Arc::new(nmap_portscan::NmapPortScanParser));
    map.insert("gobuster_dir", Arc::new(gobuster::GobusterParser));

    for tool_id in [
        "nikto_scan",
        "dig_lookup",
        "whois_lookup",
        "curl_fetch",
        "hydra_bruteforce",
        "sqlmap_exploit",
    ] {
        map.insert(tool_id, Arc::new(generic::GenericParser));
    }

    map
}
