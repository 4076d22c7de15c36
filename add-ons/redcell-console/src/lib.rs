//! redcell-console: builds the Coordinator the binary drives. Split out of
//! `main.rs` so construction can be exercised without a terminal attached.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use redcell_core::{Coordinator, EngineConfig, ExecutionPolicy, KnowledgeStore};
use redcell_core::execution_manager::ExecutionManager;

/// Wires a Coordinator against a fresh or existing Knowledge Store at
/// `store_path`, using the default tool parser registry from
/// `redcell-tools` and the default (conservative) Execution Policy.
pub fn build_coordinator(store_path: &Path) -> Result<Arc<Coordinator>, Box<dyn std::error::Error>> {
    let store = Arc::new(KnowledgeStore::open(store_path)?);
    let config = EngineConfig::default();
    let execution_manager = Arc::new(
        ExecutionManager::new(config.session_log_root.clone())
            .with_probe_ttl(std::time::Duration::from_secs(config.runtime_probe_ttl_secs)),
    );
    let parsers: HashMap<&'static str, Arc<dyn redcell_core::OutputParser>> =
        redcell_tools::default_registry();
    let coordinator = Coordinator::new(ExecutionPolicy::default(), store, execution_manager, parsers)
        .with_default_timeout(std::time::Duration::from_secs(config.default_timeout_secs))
        .with_config(&config);
    Ok(Arc::new(coordinator))
}

/// A handful of canned intents to step through from the console's keyboard
/// loop, covering a low-risk (ping), a confirm-gated (exploit), and a
/// passive-lookup (whois) tactic.
pub fn demo_intents() -> Vec<redcell_core::Intent> {
    use redcell_core::IntentKind;
    use std::collections::HashMap as Map;

    vec![
        redcell_core::Intent {
            kind: IntentKind::Ping,
            target: "127.0.0.1".to_string(),
            params: {
                let mut m = Map::new();
                m.insert("count".to_string(), "2".to_string());
                m
            },
            rationale: "demo: check loopback liveness".to_string(),
        },
        redcell_core::Intent {
            kind: IntentKind::WhoisLookup,
            target: "example.com".to_string(),
            params: Map::new(),
            rationale: "demo: passive registration lookup".to_string(),
        },
    ]
}
