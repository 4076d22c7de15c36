//! Intent Resolver: a typed `Intent` produced by a constrained LLM
//! call. The `IntentKind` set is closed and published to the collaborator's
//! prompt; the resolver response is rejected if it names tools or argv.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Closed vocabulary of intents the system can act on. Adding a kind here is
/// a deliberate, reviewed change — it is also published verbatim to the LLM
/// collaborator's prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentKind {
    Ping,
    HostDiscovery,
    PortScan,
    DirectoryEnum,
    WebVulnScan,
    DnsLookup,
    WhoisLookup,
    FetchUrl,
    CredentialBruteForce,
    ExploitWeakness,
}

impl IntentKind {
    pub fn all() -> &'static [IntentKind] {
        &[
            IntentKind::Ping,
            IntentKind::HostDiscovery,
            IntentKind::PortScan,
            IntentKind::DirectoryEnum,
            IntentKind::WebVulnScan,
            IntentKind::DnsLookup,
            IntentKind::WhoisLookup,
            IntentKind::FetchUrl,
            IntentKind::CredentialBruteForce,
            IntentKind::ExploitWeakness,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Ping => "PING",
            IntentKind::HostDiscovery => "HOST_DISCOVERY",
            IntentKind::PortScan => "PORT_SCAN",
            IntentKind::DirectoryEnum => "DIRECTORY_ENUM",
            IntentKind::WebVulnScan => "WEB_VULN_SCAN",
            IntentKind::DnsLookup => "DNS_LOOKUP",
            IntentKind::WhoisLookup => "WHOIS_LOOKUP",
            IntentKind::FetchUrl => "FETCH_URL",
            IntentKind::CredentialBruteForce => "CREDENTIAL_BRUTE_FORCE",
            IntentKind::ExploitWeakness => "EXPLOIT_WEAKNESS",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<IntentKind> {
        IntentKind::all().iter().find(|k| k.as_str() == s).copied()
    }
}

/// Typed representation of a resolved user goal. Carries no tool name or argv —
/// that synthesis happens downstream in the Tool Registry / Command Builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    pub target: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
    #[serde(default)]
    pub rationale: String,
}

/// The LLM provider collaborator's single capability:
/// `resolve_intent(text) -> Intent JSON`. Implementations own the prompt
/// construction and the one-shot, no-retry contract.
#[async_trait]
pub trait IntentResolver: Send + Sync {
    async fn resolve_intent(&self, text: &str) -> Result<Intent, InputError>;
}

/// Parses and validates a raw JSON response from the LLM collaborator into an
/// `Intent`, rejecting any payload that smuggles in tool names or argv.
pub fn parse_intent_response(raw: &str) -> Result<Intent, InputError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| InputError::IntentSchemaViolation(e.to_string()))?;

    for forbidden in ["tool", "binary", "argv", "command"] {
        if value.get(forbidden).is_some() {
            return Err(InputError::IntentSchemaViolation(format!(
                "response names a '{forbidden}' field; Intent must not carry tool/argv"
            )));
        }
    }

    let kind_str = value
        .get("kind")
        .and_then(|v| v.as_str())
        .ok_or_else(|| InputError::IntentSchemaViolation("missing 'kind'".into()))?;
    let kind = IntentKind::from_str_opt(kind_str)
        .ok_or_else(|| InputError::UnknownIntent(kind_str.to_string()))?;

    let target = value
        .get("target")
        .and_then(|v| v.as_str())
        .ok_or_else(|| InputError::IntentSchemaViolation("missing 'target'".into()))?
        .to_string();

    let params: HashMap<String, String> = value
        .get("params")
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    let rationale = value
        .get("rationale")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    Ok(Intent {
        kind,
        target,
        params,
        rationale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_intent() {
        let raw = r#"{"kind":"PING","target":"192.168.1.1","params":{"count":"4"},"rationale":"user asked to ping 4 times"}"#;
        let intent = parse_intent_response(raw).unwrap();
        assert_eq!(intent.kind, IntentKind::Ping);
        assert_eq!(intent.target, "192.168.1.1");
        assert_eq!(intent.params.get("count").unwrap(), "4");
    }

    #[test]
    fn rejects_response_naming_a_tool() {
        let raw = r#"{"kind":"PING","target":"1.1.1.1","tool":"ping"}"#;
        assert!(matches!(
            parse_intent_response(raw),
            Err(InputError::IntentSchemaViolation(_))
        ));
    }

    #[test]
    fn rejects_unknown_intent_kind() {
        let raw = r#"{"kind":"DROP_TABLES","target":"1.1.1.1"}"#;
        assert!(matches!(
            parse_intent_response(raw),
            Err(InputError::UnknownIntent(_))
        ));
    }
}
