//! Command Builder: turns a resolved `Intent` plus its bound
//! `ToolDef` into a validated argv. Never consults the network, the
//! filesystem, or the Knowledge Store — pure syntax and safety checks.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::BuildError;
use crate::intent::Intent;
use crate::registry::ToolDef;

const MAX_ARG_BYTES: usize = 1024;
const MAX_ARGV_LEN: usize = 64;

/// A fully-built, unreviewed command. Still subject to the Execution
/// Policy's confirmation gate and the Execution Manager's runtime wrapping
/// before it is ever spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalCommand {
    pub binary: String,
    pub argv: Vec<String>,
}

static IPV4_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)(\.(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)){3}$").unwrap()
});

static HOSTNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)*$")
        .unwrap()
});

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?i)https?://[^\s]+$").unwrap());

static CONTROL_OR_SHELL_METACHAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x1f\x7f;&|`$(){}<>\\\n\r]").unwrap());

fn is_ipv6(s: &str) -> bool {
    s.parse::<std::net::Ipv6Addr>().is_ok()
}

/// Validates a target string against the allowed shapes (IPv4, IPv6,
/// RFC1123 hostname, or a URL already scoped by `ToolDef::target_embedded`
/// templates). Rejection never depends on DNS — only syntax.
fn validate_target(target: &str) -> Result<(), BuildError> {
    if target.is_empty() || target.len() > MAX_ARG_BYTES {
        return Err(BuildError::CommandBuildError(format!(
            "target length {} outside 1..={MAX_ARG_BYTES}",
            target.len()
        )));
    }
    if CONTROL_OR_SHELL_METACHAR_RE.is_match(target) {
        return Err(BuildError::CommandBuildError(
            "target contains a control character or shell metacharacter".to_string(),
        ));
    }
    if IPV4_RE.is_match(target) || is_ipv6(target) || HOSTNAME_RE.is_match(target) || URL_RE.is_match(target) {
        return Ok(());
    }
    Err(BuildError::CommandBuildError(format!(
        "target '{target}' is not a recognized IPv4/IPv6/hostname/URL"
    )))
}

fn validate_arg(arg: &str) -> Result<(), BuildError> {
    if arg.len() > MAX_ARG_BYTES {
        return Err(BuildError::CommandBuildError(format!(
            "argument exceeds {MAX_ARG_BYTES} bytes"
        )));
    }
    if arg.as_bytes().contains(&0) {
        return Err(BuildError::CommandBuildError(
            "argument contains a null byte".to_string(),
        ));
    }
    if CONTROL_OR_SHELL_METACHAR_RE.is_match(arg) {
        return Err(BuildError::CommandBuildError(
            "argument contains a control character or shell metacharacter".to_string(),
        ));
    }
    Ok(())
}

/// Builds the final argv for `tool` against `intent`. Algorithm:
/// base_args, then each bound parameter template with its `{value}`
/// substituted, then the target appended unless `target_embedded` is set
/// (in which case a template already carried it).
pub fn build_command(tool: &ToolDef, intent: &Intent) -> Result<FinalCommand, BuildError> {
    validate_target(&intent.target)?;

    let mut argv: Vec<String> = tool.base_args.iter().map(|s| s.to_string()).collect();

    for template in tool.arg_templates {
        let Some(value) = intent.params.get(template.param) else {
            continue;
        };
        validate_arg(value)?;
        let rendered = template.template.replace("{value}", value);
        for part in rendered.split_whitespace() {
            validate_arg(part)?;
            argv.push(part.to_string());
        }
    }

    if !tool.target_embedded {
        argv.push(intent.target.clone());
    } else {
        let embedded_here = argv.iter().any(|a| a.contains(intent.target.as_str()));
        if !embedded_here {
            argv.push(intent.target.clone());
        }
    }

    if argv.len() > MAX_ARGV_LEN {
        return Err(BuildError::CommandBuildError(format!(
            "argv length {} exceeds the {MAX_ARGV_LEN} cap",
            argv.len()
        )));
    }

    Ok(FinalCommand {
        binary: tool.binary.to_string(),
        argv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentKind;
    use crate::registry;
    use std::collections::HashMap;

    fn intent(kind: IntentKind, target: &str, params: &[(&str, &str)]) -> Intent {
        Intent {
            kind,
            target: target.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            rationale: String::new(),
        }
    }

    #[test]
    fn ping_builds_with_count_template() {
        let tool = registry::lookup(IntentKind::Ping).unwrap();
        let i = intent(IntentKind::Ping, "10.0.0.1", &[("count", "4")]);
        let cmd = build_command(tool, &i).unwrap();
        assert_eq!(cmd.binary, "ping");
        assert_eq!(cmd.argv, vec!["-c", "4", "10.0.0.1"]);
    }

    #[test]
    fn rejects_target_with_shell_metacharacters() {
        let tool = registry::lookup(IntentKind::Ping).unwrap();
        let i = intent(IntentKind::Ping, "10.0.0.1; rm -rf /", &[]);
        assert!(build_command(tool, &i).is_err());
    }

    #[test]
    fn accepts_ipv6_target() {
        let tool = registry::lookup(IntentKind::HostDiscovery).unwrap();
        let i = intent(IntentKind::HostDiscovery, "::1", &[]);
        assert!(build_command(tool, &i).is_ok());
    }

    #[test]
    fn target_embedded_tools_append_target_once() {
        let tool = registry::lookup(IntentKind::FetchUrl).unwrap();
        let i = intent(IntentKind::FetchUrl, "http://example.com/a", &[]);
        let cmd = build_command(tool, &i).unwrap();
        let occurrences = cmd.argv.iter().filter(|a| a.contains("example.com")).count();
        assert_eq!(occurrences, 1);
    }

    #[test]
    fn rejects_a_template_parameter_with_shell_metacharacters() {
        let tool = registry::lookup(IntentKind::DnsLookup).unwrap();
        let i = intent(IntentKind::DnsLookup, "example.com", &[("record_type", "A;touch /tmp/x")]);
        assert!(build_command(tool, &i).is_err());
    }

    #[test]
    fn unknown_param_is_silently_ignored_not_injected() {
        let tool = registry::lookup(IntentKind::Ping).unwrap();
        let mut params = HashMap::new();
        params.insert("evil".to_string(), "--flag".to_string());
        let i = Intent {
            kind: IntentKind::Ping,
            target: "10.0.0.1".to_string(),
            params,
            rationale: String::new(),
        };
        let cmd = build_command(tool, &i).unwrap();
        assert!(!cmd.argv.iter().any(|a| a == "--flag"));
    }
}
