//! Execution Policy: the tactic-level allow/deny/confirm matrix
//! and the persistent-change gate.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::registry::ToolDef;

/// Coarse risk classification carried on a `ToolDef`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// An intent category with its own policy classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tactic {
    PassiveLookup,
    HostDiscovery,
    ServiceEnumeration,
    WebEnumeration,
    VulnerabilityScan,
    CredentialBruteForce,
    ExploitWeakness,
}

/// Outcome of applying `ExecutionPolicy` to an `Intent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    AllowAuto,
    AllowWithConfirmation(String),
    Deny(String),
}

/// The tactic-level allow/deny/confirm matrix. `allow_persistent_changes` is
/// `false` everywhere in this version; it's a plain field rather than a
/// `const` so a future version can flip it without an API break, but
/// nothing in this codebase ever sets it to `true`.
#[derive(Debug, Clone)]
pub struct ExecutionPolicy {
    allow_persistent_changes: bool,
    confirm_before_tactics: HashSet<Tactic>,
    blocked_tactics: HashSet<Tactic>,
    per_tactic_risk_cap: std::collections::HashMap<Tactic, RiskLevel>,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        let mut confirm_before_tactics = HashSet::new();
        confirm_before_tactics.insert(Tactic::ExploitWeakness);
        confirm_before_tactics.insert(Tactic::CredentialBruteForce);

        Self {
            allow_persistent_changes: false,
            confirm_before_tactics,
            blocked_tactics: HashSet::new(),
            per_tactic_risk_cap: std::collections::HashMap::new(),
        }
    }
}

impl ExecutionPolicy {
    pub fn allow_persistent_changes(&self) -> bool {
        self.allow_persistent_changes
    }

    /// Adds a tactic to the permanently-blocked set. There is no corresponding
    /// "unblock" call from outside this module — callers build the policy they want
    /// once, at startup.
    pub fn with_blocked_tactic(mut self, tactic: Tactic) -> Self {
        self.blocked_tactics.insert(tactic);
        self
    }

    pub fn with_risk_cap(mut self, tactic: Tactic, cap: RiskLevel) -> Self {
        self.per_tactic_risk_cap.insert(tactic, cap);
        self
    }

    /// Applies the policy to a tool-bound decision. `tool` carries the
    /// `creates_persistent_change`, `tactic`, and `risk` fields the decision
    /// depends on.
    pub fn decide(&self, tool: &ToolDef) -> PolicyDecision {
        if tool.creates_persistent_change && !self.allow_persistent_changes {
            return PolicyDecision::Deny(
                "tool creates a persistent change; disallowed while allow_persistent_changes=false"
                    .to_string(),
            );
        }

        if self.blocked_tactics.contains(&tool.tactic) {
            return PolicyDecision::Deny(format!("tactic {:?} is blocked", tool.tactic));
        }

        if let Some(cap) = self.per_tactic_risk_cap.get(&tool.tactic) {
            if tool.risk > *cap {
                return PolicyDecision::Deny(format!(
                    "tool risk {:?} exceeds the cap {:?} for tactic {:?}",
                    tool.risk, cap, tool.tactic
                ));
            }
        }

        if self.confirm_before_tactics.contains(&tool.tactic) {
            return PolicyDecision::AllowWithConfirmation(format!(
                "tactic {:?} always requires confirmation",
                tool.tactic
            ));
        }

        PolicyDecision::AllowAuto
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentKind;
    use crate::registry;

    #[test]
    fn exploit_and_bruteforce_never_allow_auto() {
        let policy = ExecutionPolicy::default();
        for kind in [IntentKind::ExploitWeakness, IntentKind::CredentialBruteForce] {
            let tool = registry::lookup(kind).unwrap();
            let decision = policy.decide(tool);
            assert!(matches!(
                decision,
                PolicyDecision::AllowWithConfirmation(_) | PolicyDecision::Deny(_)
            ));
        }
    }

    #[test]
    fn ping_allows_auto_under_default_policy() {
        let policy = ExecutionPolicy::default();
        let tool = registry::lookup(IntentKind::Ping).unwrap();
        assert_eq!(policy.decide(tool), PolicyDecision::AllowAuto);
    }

    #[test]
    fn blocked_tactic_is_denied_even_without_persistent_change() {
        let policy = ExecutionPolicy::default().with_blocked_tactic(Tactic::HostDiscovery);
        let tool = registry::lookup(IntentKind::HostDiscovery).unwrap();
        assert!(matches!(policy.decide(tool), PolicyDecision::Deny(_)));
    }
}
