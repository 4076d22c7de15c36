//! Tool Registry: the single static source of truth mapping an
//! `IntentKind` to the tool that carries it out. No other component may
//! fabricate a tool name or argv template.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::intent::IntentKind;
use crate::policy::{RiskLevel, Tactic};

/// Binaries this system is permitted to ever spawn. Anything else
/// is rejected at registry load — enforced by `assert_allowlisted` below and
/// exercised in the module's tests.
pub const ALLOWED_BINARIES: &[&str] = &[
    "ping", "nmap", "gobuster", "nikto", "dirb", "hydra", "sqlmap", "whois", "dig", "nslookup",
    "curl", "wget",
];

/// An argument template with exactly one `{value}` placeholder, keyed by a
/// named parameter.
#[derive(Debug, Clone)]
pub struct ArgTemplate {
    pub param: &'static str,
    pub template: &'static str,
}

/// Static description of how to invoke one tool for one intent.
#[derive(Debug, Clone)]
pub struct ToolDef {
    pub intent: IntentKind,
    pub binary: &'static str,
    pub base_args: &'static [&'static str],
    pub arg_templates: &'static [ArgTemplate],
    pub risk: RiskLevel,
    pub tactic: Tactic,
    pub requires_root: bool,
    pub creates_persistent_change: bool,
    /// Tool identifier used for the parser binding, ExecutionRecord.tool_id, and
    /// planner history queries (`has_tool_executed`, etc).
    pub tool_id: &'static str,
    /// When true, the Command Builder does not append `target` as a trailing
    /// positional argument — the registry's templates already embed it.
    pub target_embedded: bool,
}

fn assert_allowlisted(binary: &str) {
    debug_assert!(
        ALLOWED_BINARIES.contains(&binary),
        "ToolDef names a binary outside the allowlist: {binary}"
    );
}

static REGISTRY: Lazy<HashMap<IntentKind, ToolDef>> = Lazy::new(|| {
    let defs = vec![
        ToolDef {
            intent: IntentKind::Ping,
            binary: "ping",
            base_args: &[],
            arg_templates: &[ArgTemplate {
                param: "count",
                template: "-c {value}",
            }],
            risk: RiskLevel::Low,
            tactic: Tactic::PassiveLookup,
            requires_root: false,
            creates_persistent_change: false,
            tool_id: "ping",
            target_embedded: false,
        },
        ToolDef {
            intent: IntentKind::HostDiscovery,
            binary: "nmap",
            base_args: &["-sn"],
            arg_templates: &[],
            risk: RiskLevel::Low,
            tactic: Tactic::HostDiscovery,
            requires_root: false,
            creates_persistent_change: false,
            tool_id: "nmap_host_sweep",
            target_embedded: false,
        },
        ToolDef {
            intent: IntentKind::PortScan,
            binary: "nmap",
            base_args: &["-sT"],
            arg_templates: &[
                ArgTemplate {
                    param: "ports",
                    template: "-p {value}",
                },
                ArgTemplate {
                    param: "timing",
                    template: "-T{value}",
                },
            ],
            risk: RiskLevel::Medium,
            tactic: Tactic::ServiceEnumeration,
            requires_root: false,
            creates_persistent_change: false,
            tool_id: "nmap_port_scan",
            target_embedded: false,
        },
        ToolDef {
            intent: IntentKind::DirectoryEnum,
            binary: "gobuster",
            base_args: &["dir"],
            arg_templates: &[
                ArgTemplate {
                    param: "wordlist",
                    template: "-w {value}",
                },
                ArgTemplate {
                    param: "extensions",
                    template: "-x {value}",
                },
            ],
            risk: RiskLevel::Medium,
            tactic: Tactic::WebEnumeration,
            requires_root: false,
            creates_persistent_change: false,
            tool_id: "gobuster_dir",
            target_embedded: true,
        },
        ToolDef {
            intent: IntentKind::WebVulnScan,
            binary: "nikto",
            base_args: &[],
            arg_templates: &[ArgTemplate {
                param: "tuning",
                template: "-Tuning {value}",
            }],
            risk: RiskLevel::Medium,
            tactic: Tactic::VulnerabilityScan,
            requires_root: false,
            creates_persistent_change: false,
            tool_id: "nikto_scan",
            target_embedded: true,
        },
        ToolDef {
            intent: IntentKind::DnsLookup,
            binary: "dig",
            base_args: &[],
            arg_templates: &[ArgTemplate {
                param: "record_type",
                template: "{value}",
            }],
            risk: RiskLevel::Low,
            tactic: Tactic::PassiveLookup,
            requires_root: false,
            creates_persistent_change: false,
            tool_id: "dig_lookup",
            target_embedded: false,
        },
        ToolDef {
            intent: IntentKind::WhoisLookup,
            binary: "whois",
            base_args: &[],
            arg_templates: &[],
            risk: RiskLevel::Low,
            tactic: Tactic::PassiveLookup,
            requires_root: false,
            creates_persistent_change: false,
            tool_id: "whois_lookup",
            target_embedded: false,
        },
        ToolDef {
            intent: IntentKind::FetchUrl,
            binary: "curl",
            base_args: &["-sS"],
            arg_templates: &[ArgTemplate {
                param: "method",
                template: "-X {value}",
            }],
            risk: RiskLevel::Low,
            tactic: Tactic::PassiveLookup,
            requires_root: false,
            creates_persistent_change: false,
            tool_id: "curl_fetch",
            target_embedded: true,
        },
        ToolDef {
            intent: IntentKind::CredentialBruteForce,
            binary: "hydra",
            base_args: &[],
            arg_templates: &[
                ArgTemplate {
                    param: "userlist",
                    template: "-L {value}",
                },
                ArgTemplate {
                    param: "passlist",
                    template: "-P {value}",
                },
                ArgTemplate {
                    param: "service",
                    template: "{value}",
                },
            ],
            risk: RiskLevel::High,
            tactic: Tactic::CredentialBruteForce,
            requires_root: false,
            creates_persistent_change: false,
            tool_id: "hydra_bruteforce",
            target_embedded: false,
        },
        ToolDef {
            intent: IntentKind::ExploitWeakness,
            binary: "sqlmap",
            base_args: &["--batch"],
            arg_templates: &[ArgTemplate {
                param: "url",
                template: "-u {value}",
            }],
            risk: RiskLevel::High,
            tactic: Tactic::ExploitWeakness,
            requires_root: false,
            creates_persistent_change: false,
            tool_id: "sqlmap_exploit",
            target_embedded: true,
        },
    ];

    for def in &defs {
        assert_allowlisted(def.binary);
    }

    defs.into_iter().map(|d| (d.intent, d)).collect()
});

/// Looks up the `ToolDef` bound to an intent kind. The registry is exhaustive
/// over `IntentKind::all()`, so this only returns `None` if that invariant is
/// broken by a future edit (guarded by the `registry_covers_every_intent` test).
pub fn lookup(kind: IntentKind) -> Option<&'static ToolDef> {
    REGISTRY.get(&kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_intent() {
        for kind in IntentKind::all() {
            assert!(lookup(*kind).is_some(), "missing ToolDef for {kind:?}");
        }
    }

    #[test]
    fn every_binary_is_allowlisted() {
        for kind in IntentKind::all() {
            let def = lookup(*kind).unwrap();
            assert!(ALLOWED_BINARIES.contains(&def.binary));
        }
    }

    #[test]
    fn templates_carry_exactly_one_value_placeholder() {
        for kind in IntentKind::all() {
            let def = lookup(*kind).unwrap();
            for tmpl in def.arg_templates {
                assert_eq!(tmpl.template.matches("{value}").count(), 1);
            }
        }
    }
}
