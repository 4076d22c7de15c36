//! Policy Gate: the single place an `Intent` is checked against
//! the Execution Policy before a command is ever built. No component
//! downstream of this gate re-derives a policy decision.

use crate::error::PolicyError;
use crate::intent::Intent;
use crate::policy::{ExecutionPolicy, PolicyDecision};
use crate::registry::{self, ToolDef};

/// The outcome of gating one intent: either a bound tool ready for the
/// Command Builder, or a typed rejection.
pub struct GateOutcome {
    pub tool: &'static ToolDef,
    pub requires_confirmation: bool,
    pub reason: Option<String>,
}

/// Resolves `intent.kind` to its `ToolDef` and applies `policy` to it.
/// `Deny` surfaces as `PolicyError::PolicyDenied`; an intent kind with no
/// registered tool is an `ExecutionError::ToolNotFound` condition one layer
/// up, but since the gate only deals in policy outcomes it is reported here
/// as a denial naming the missing tool.
pub fn evaluate(policy: &ExecutionPolicy, intent: &Intent) -> Result<GateOutcome, PolicyError> {
    let tool = registry::lookup(intent.kind).ok_or_else(|| {
        PolicyError::PolicyDenied(format!("no tool registered for intent {:?}", intent.kind))
    })?;

    match policy.decide(tool) {
        PolicyDecision::AllowAuto => Ok(GateOutcome {
            tool,
            requires_confirmation: false,
            reason: None,
        }),
        PolicyDecision::AllowWithConfirmation(reason) => {
            tracing::info!(target: "redcell::policy_gate", tool_id = tool.tool_id, %reason, "confirmation required");
            Ok(GateOutcome {
                tool,
                requires_confirmation: true,
                reason: Some(reason),
            })
        }
        PolicyDecision::Deny(reason) => {
            tracing::warn!(target: "redcell::policy_gate", tool_id = tool.tool_id, %reason, "intent denied");
            Err(PolicyError::PolicyDenied(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentKind;
    use std::collections::HashMap;

    fn intent(kind: IntentKind) -> Intent {
        Intent {
            kind,
            target: "10.0.0.1".to_string(),
            params: HashMap::new(),
            rationale: String::new(),
        }
    }

    #[test]
    fn auto_allowed_intent_needs_no_confirmation() {
        let policy = ExecutionPolicy::default();
        let outcome = evaluate(&policy, &intent(IntentKind::Ping)).unwrap();
        assert!(!outcome.requires_confirmation);
    }

    #[test]
    fn exploit_weakness_requires_confirmation() {
        let policy = ExecutionPolicy::default();
        let outcome = evaluate(&policy, &intent(IntentKind::ExploitWeakness)).unwrap();
        assert!(outcome.requires_confirmation);
        assert!(outcome.reason.is_some());
    }

    #[test]
    fn denied_tactic_surfaces_as_policy_error() {
        let policy = ExecutionPolicy::default()
            .with_blocked_tactic(crate::policy::Tactic::HostDiscovery);
        let result = evaluate(&policy, &intent(IntentKind::HostDiscovery));
        assert!(matches!(result, Err(PolicyError::PolicyDenied(_))));
    }
}
