//! Execution Manager: decides whether a command runs natively or
//! inside a container runtime, and prepares the concrete argv the Process
//! Runner will spawn. Probes the runtime once, caches the result, and
//! re-probes on TTL expiry.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::process::Command;

use crate::command_builder::FinalCommand;
use crate::error::ExternalError;

const DEFAULT_PROBE_TTL: Duration = Duration::from_secs(60);

/// Where a prepared command will actually run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    /// A container runtime (docker/podman) is available and preferred.
    Container,
    /// No container runtime; the binary runs directly on the host.
    Native,
    /// No container runtime and this process does not run as root; a
    /// `requires_root` command cannot be escalated here and `prepare`
    /// refuses it outright rather than silently degrade.
    NativeRestricted,
}

/// A command ready to hand to the Process Runner, with any container or
/// privilege-escalation wrapping already applied.
#[derive(Debug, Clone)]
pub struct PreparedCommand {
    pub binary: String,
    pub argv: Vec<String>,
    pub temp_output_dir: PathBuf,
}

struct ProbeCache {
    mode: RuntimeMode,
    probed_at: Instant,
}

/// Caches the outcome of probing for a container runtime so repeated
/// invocations in one session don't each pay a subprocess spawn (default
/// TTL 60s).
pub struct ExecutionManager {
    container_binary: &'static str,
    probe_ttl: Duration,
    cache: Mutex<Option<ProbeCache>>,
    output_root: PathBuf,
}

impl ExecutionManager {
    pub fn new(output_root: PathBuf) -> Self {
        Self {
            container_binary: "docker",
            probe_ttl: DEFAULT_PROBE_TTL,
            cache: Mutex::new(None),
            output_root,
        }
    }

    pub fn with_probe_ttl(mut self, ttl: Duration) -> Self {
        self.probe_ttl = ttl;
        self
    }

    /// Detects the current runtime mode, honoring the cache unless it has
    /// expired. A probe failure degrades to `Native` rather than erroring —
    /// the absence of a container runtime is an expected environment, not a
    /// fault.
    pub async fn detect_mode(&self) -> RuntimeMode {
        {
            let guard = self.cache.lock().expect("execution manager cache poisoned");
            if let Some(cached) = guard.as_ref() {
                if cached.probed_at.elapsed() < self.probe_ttl {
                    return cached.mode;
                }
            }
        }

        let mode = self.probe_runtime().await;
        let mut guard = self.cache.lock().expect("execution manager cache poisoned");
        *guard = Some(ProbeCache {
            mode,
            probed_at: Instant::now(),
        });
        mode
    }

    async fn probe_runtime(&self) -> RuntimeMode {
        let container_available = Command::new(self.container_binary)
            .arg("info")
            .output()
            .await
            .map(|out| out.status.success())
            .unwrap_or(false);

        let mode = if container_available {
            RuntimeMode::Container
        } else if Self::running_as_privileged() {
            RuntimeMode::Native
        } else {
            RuntimeMode::NativeRestricted
        };
        tracing::info!(target: "redcell::execution_manager", mode = ?mode, "runtime probe");
        mode
    }

    #[cfg(unix)]
    fn running_as_privileged() -> bool {
        // SAFETY: geteuid takes no arguments and has no failure mode.
        unsafe { libc::geteuid() == 0 }
    }

    #[cfg(not(unix))]
    fn running_as_privileged() -> bool {
        true
    }

    /// Wraps `command` for the detected runtime and allocates a fresh
    /// per-invocation output directory. `requires_root` mirrors
    /// `ToolDef::requires_root`: under `Native` it gets an OS
    /// privilege-escalation wrapper (`sudo`), under `NativeRestricted` there
    /// is no such wrapper available and the invocation is refused outright
    /// rather than silently escalated.
    pub async fn prepare(
        &self,
        command: &FinalCommand,
        requires_root: bool,
    ) -> Result<PreparedCommand, ExternalError> {
        let mode = self.detect_mode().await;

        if requires_root && mode == RuntimeMode::NativeRestricted {
            return Err(ExternalError::PrivilegeUnavailable {
                tool_id: command.binary.clone(),
            });
        }

        let execution_id = uuid::Uuid::new_v4();
        let temp_output_dir = self.output_root.join(execution_id.to_string());
        tokio::fs::create_dir_all(&temp_output_dir)
            .await
            .map_err(|e| ExternalError::RuntimeProbeFailed(e.to_string()))?;

        let (binary, argv) = match mode {
            RuntimeMode::Container => {
                let mut wrapped = vec![
                    "run".to_string(),
                    "--rm".to_string(),
                    "--network".to_string(),
                    "host".to_string(),
                    format!("redcell-tools/{}", command.binary),
                ];
                wrapped.extend(command.argv.iter().cloned());
                (self.container_binary.to_string(), wrapped)
            }
            RuntimeMode::Native if requires_root => {
                let mut wrapped = vec![command.binary.clone()];
                wrapped.extend(command.argv.iter().cloned());
                ("sudo".to_string(), wrapped)
            }
            RuntimeMode::Native | RuntimeMode::NativeRestricted => {
                (command.binary.clone(), command.argv.clone())
            }
        };

        Ok(PreparedCommand {
            binary,
            argv,
            temp_output_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn probe_cache_is_reused_within_ttl() {
        let manager = ExecutionManager::new(std::env::temp_dir())
            .with_probe_ttl(Duration::from_secs(300));
        let first = manager.detect_mode().await;
        let second = manager.detect_mode().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn prepare_allocates_a_fresh_output_dir_per_call() {
        let manager = ExecutionManager::new(std::env::temp_dir());
        let command = FinalCommand {
            binary: "ping".to_string(),
            argv: vec!["-c".to_string(), "1".to_string(), "10.0.0.1".to_string()],
        };
        let first = manager.prepare(&command, false).await.unwrap();
        let second = manager.prepare(&command, false).await.unwrap();
        assert_ne!(first.temp_output_dir, second.temp_output_dir);
    }

    fn manager_pinned_to(mode: RuntimeMode) -> ExecutionManager {
        let manager = ExecutionManager::new(std::env::temp_dir()).with_probe_ttl(Duration::from_secs(300));
        *manager.cache.lock().expect("cache poisoned") = Some(ProbeCache {
            mode,
            probed_at: Instant::now(),
        });
        manager
    }

    #[tokio::test]
    async fn native_restricted_refuses_a_root_requiring_command() {
        let manager = manager_pinned_to(RuntimeMode::NativeRestricted);
        let command = FinalCommand {
            binary: "nmap".to_string(),
            argv: vec!["-sS".to_string(), "10.0.0.1".to_string()],
        };
        let result = manager.prepare(&command, true).await;
        assert!(matches!(result, Err(ExternalError::PrivilegeUnavailable { .. })));
    }

    #[tokio::test]
    async fn native_wraps_a_root_requiring_command_in_sudo() {
        let manager = manager_pinned_to(RuntimeMode::Native);
        let command = FinalCommand {
            binary: "nmap".to_string(),
            argv: vec!["-sS".to_string(), "10.0.0.1".to_string()],
        };
        let prepared = manager.prepare(&command, true).await.unwrap();
        assert_eq!(prepared.binary, "sudo");
        assert_eq!(prepared.argv[0], "nmap");
    }
}
