mod directory;
mod error;
mod pidfile;
mod probe;
mod process;

pub use directory::ToolDirectory;
pub use error::SupervisorError;
pub use pidfile::PidFile;
pub use probe::LivenessProbe;
pub use process::ToolProcess;

use crate::config::ToolDescriptor;
use crate::domain::types::ToolState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Timing knobs for process lifecycle handling. Defaults match the intended
/// production cadence; tests tighten them.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Pause between spawn and the first health probe.
    pub start_grace: Duration,
    /// Timeout for a single liveness probe.
    pub probe_timeout: Duration,
    /// How long a tool gets to exit after a graceful termination request.
    pub stop_grace: Duration,
    /// How long a tool gets to exit after a forced kill.
    pub kill_grace: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            start_grace: Duration::from_secs(1),
            probe_timeout: Duration::from_secs(1),
            stop_grace: Duration::from_secs(5),
            kill_grace: Duration::from_secs(2),
        }
    }
}

/// Point-in-time view of one tool, as reported by `status`/`statuses`.
#[derive(Debug, Clone)]
pub struct ToolStatus {
    pub name: String,
    pub state: ToolState,
    pub pid: Option<u32>,
    pub port: u16,
    pub last_health: Option<DateTime<Utc>>,
}

struct ToolEntry {
    state: ToolState,
    process: Option<ToolProcess>,
    last_health: Option<DateTime<Utc>>,
}

impl ToolEntry {
    fn new() -> Self {
        Self {
            state: ToolState::Stopped,
            process: None,
            last_health: None,
        }
    }
}

/// Owns the tool-name → process table. All mutation happens under a per-tool
/// async mutex, held across the full start/stop sequence, so concurrent
/// operations on one tool serialize and collapse into a single live process.
pub struct ProcessSupervisor {
    tools: Vec<ToolDescriptor>,
    entries: HashMap<String, Arc<Mutex<ToolEntry>>>,
    pid_file: PidFile,
    options: SupervisorOptions,
    http: reqwest::Client,
}

impl ProcessSupervisor {
    pub fn new(tools: Vec<ToolDescriptor>, pid_file: PidFile) -> Self {
        Self::with_options(tools, pid_file, SupervisorOptions::default())
    }

    pub fn with_options(
        tools: Vec<ToolDescriptor>,
        pid_file: PidFile,
        options: SupervisorOptions,
    ) -> Self {
        let entries = tools
            .iter()
            .map(|tool| (tool.name.clone(), Arc::new(Mutex::new(ToolEntry::new()))))
            .collect();
        Self {
            tools,
            entries,
            pid_file,
            options,
            http: reqwest::Client::new(),
        }
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    fn entry(&self, name: &str) -> Result<Arc<Mutex<ToolEntry>>, SupervisorError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| SupervisorError::UnknownTool {
                tool: name.to_string(),
            })
    }

    /// Re-attach to tool servers recorded by a previous invocation. Records
    /// whose PID no longer exists are scrubbed; live ones are adopted as
    /// `Running` (signal-level control only).
    pub async fn recover(&self) {
        for (name, pid) in self.pid_file.snapshot() {
            let Some(entry_arc) = self.entries.get(&name) else {
                debug!(tool = %name, pid, "PID record for unconfigured tool; scrubbing");
                self.pid_file.remove(&name);
                continue;
            };
            let mut entry = entry_arc.lock().await;
            if entry.process.is_some() {
                continue;
            }
            if probe::pid_alive(pid) {
                info!(tool = %name, pid, "adopted tool server from PID file");
                entry.state = ToolState::Running;
                entry.process = Some(ToolProcess::adopt(pid));
            } else {
                debug!(tool = %name, pid, "stale PID record; scrubbing");
                self.pid_file.remove(&name);
            }
        }
    }

    /// Start a tool server. No-op success when it is already starting or
    /// running; the per-tool lock is held across spawn + grace + probe, so a
    /// concurrent start blocks and then observes the terminal state.
    pub async fn start(&self, name: &str) -> Result<ToolStatus, SupervisorError> {
        let descriptor = self
            .descriptor(name)
            .cloned()
            .ok_or_else(|| SupervisorError::UnknownTool {
                tool: name.to_string(),
            })?;
        let entry_arc = self.entry(name)?;
        let mut entry = entry_arc.lock().await;

        match entry.state {
            ToolState::Starting | ToolState::Running => {
                debug!(tool = name, "start requested but tool is already active");
                return Ok(self.snapshot(&descriptor, &entry));
            }
            ToolState::Stopping => {
                // A failed stop left an unkillable process behind; starting
                // another instance would violate the one-process-per-tool
                // invariant.
                warn!(tool = name, "start refused while a failed stop is pending");
                return Ok(self.snapshot(&descriptor, &entry));
            }
            ToolState::Stopped | ToolState::Dead => {}
        }

        // A dead entry may still hold a live-but-unhealthy process; it must
        // be gone before another instance binds the same port.
        if let Some(mut leftover) = entry.process.take() {
            if leftover.is_alive() {
                let pid = leftover.pid();
                warn!(tool = name, pid, "clearing unhealthy leftover process before restart");
                if let Err(survivor) = leftover
                    .shutdown(self.options.kill_grace, self.options.kill_grace)
                    .await
                {
                    entry.process = Some(survivor);
                    return Err(SupervisorError::StopFailed {
                        tool: name.to_string(),
                        pid,
                    });
                }
            }
            self.pid_file.remove(name);
        }

        let process = match ToolProcess::spawn(&descriptor) {
            Ok(process) => process,
            Err(source) => {
                entry.state = ToolState::Stopped;
                error!(tool = name, %source, "failed to spawn tool server");
                return Err(SupervisorError::SpawnFailed {
                    tool: name.to_string(),
                    source,
                });
            }
        };
        let pid = process.pid();
        entry.state = ToolState::Starting;
        entry.process = Some(process);
        self.pid_file.record(name, pid);
        info!(tool = name, pid, "tool server spawned; waiting for health");

        sleep(self.options.start_grace).await;
        let alive = LivenessProbe::for_tool(&descriptor, pid)
            .is_alive(&self.http, self.options.probe_timeout)
            .await;

        if alive {
            entry.state = ToolState::Running;
            entry.last_health = Some(Utc::now());
            info!(tool = name, pid, "tool server is healthy");
            Ok(self.snapshot(&descriptor, &entry))
        } else {
            entry.state = ToolState::Dead;
            if !probe::pid_alive(pid) {
                entry.process = None;
                self.pid_file.remove(name);
            }
            warn!(tool = name, pid, "tool server failed its startup health check");
            Err(SupervisorError::HealthCheckFailed {
                tool: name.to_string(),
            })
        }
    }

    /// Stop a tool server. No-op success when already stopped, or dead with
    /// no surviving process. A failed stop leaves the entry in `Stopping`
    /// with its record intact so a retry re-enters the termination path.
    pub async fn stop(&self, name: &str) -> Result<ToolStatus, SupervisorError> {
        let descriptor = self
            .descriptor(name)
            .cloned()
            .ok_or_else(|| SupervisorError::UnknownTool {
                tool: name.to_string(),
            })?;
        let entry_arc = self.entry(name)?;
        let mut entry = entry_arc.lock().await;

        match entry.state {
            ToolState::Stopped => {
                self.pid_file.remove(name);
                return Ok(self.snapshot(&descriptor, &entry));
            }
            ToolState::Dead => {
                let still_alive = entry
                    .process
                    .as_mut()
                    .map(ToolProcess::is_alive)
                    .unwrap_or(false);
                if !still_alive {
                    entry.process = None;
                    entry.state = ToolState::Stopped;
                    self.pid_file.remove(name);
                    return Ok(self.snapshot(&descriptor, &entry));
                }
                // Dead but the process lingers: fall through to termination.
            }
            ToolState::Starting | ToolState::Running | ToolState::Stopping => {}
        }

        let Some(process) = entry.process.take() else {
            entry.state = ToolState::Stopped;
            self.pid_file.remove(name);
            return Ok(self.snapshot(&descriptor, &entry));
        };

        entry.state = ToolState::Stopping;
        let pid = process.pid();
        info!(tool = name, pid, "stopping tool server");

        match process
            .shutdown(self.options.stop_grace, self.options.kill_grace)
            .await
        {
            Ok(()) => {
                entry.state = ToolState::Stopped;
                entry.last_health = None;
                self.pid_file.remove(name);
                info!(tool = name, pid, "tool server stopped");
                Ok(self.snapshot(&descriptor, &entry))
            }
            Err(survivor) => {
                entry.process = Some(survivor);
                error!(tool = name, pid, "tool server survived forced kill");
                Err(SupervisorError::StopFailed {
                    tool: name.to_string(),
                    pid,
                })
            }
        }
    }

    /// Current state of one tool, backed by a fresh liveness check rather
    /// than the cached state.
    pub async fn status(&self, name: &str) -> Result<ToolStatus, SupervisorError> {
        let descriptor = self
            .descriptor(name)
            .cloned()
            .ok_or_else(|| SupervisorError::UnknownTool {
                tool: name.to_string(),
            })?;
        let entry_arc = self.entry(name)?;
        let mut entry = entry_arc.lock().await;

        if matches!(entry.state, ToolState::Starting | ToolState::Running) {
            // Check the process first (this also reaps an exited owned
            // child), then let the configured probe judge responsiveness.
            let process_alive = entry
                .process
                .as_mut()
                .map(ToolProcess::is_alive)
                .unwrap_or(false);
            let alive = match (process_alive, entry.process.as_ref().map(ToolProcess::pid)) {
                (true, Some(pid)) => {
                    LivenessProbe::for_tool(&descriptor, pid)
                        .is_alive(&self.http, self.options.probe_timeout)
                        .await
                }
                _ => false,
            };
            if alive {
                entry.last_health = Some(Utc::now());
            } else {
                warn!(tool = name, "tool server no longer responds; marking dead");
                self.mark_dead(name, &mut entry);
            }
        }

        Ok(self.snapshot(&descriptor, &entry))
    }

    /// Status of every configured tool, in configured order.
    pub async fn statuses(&self) -> Vec<ToolStatus> {
        let mut statuses = Vec::with_capacity(self.tools.len());
        for tool in &self.tools {
            if let Ok(status) = self.status(&tool.name).await {
                statuses.push(status);
            }
        }
        statuses
    }

    /// Names of tools currently observed running, in configured order. Uses
    /// the cheap process-level check; an exited process is detected here
    /// (lazily) and the entry flipped to `Dead`.
    pub async fn list_running(&self) -> Vec<String> {
        let mut running = Vec::new();
        for tool in &self.tools {
            if self.check_running(&tool.name).await {
                running.push(tool.name.clone());
            }
        }
        running
    }

    async fn check_running(&self, name: &str) -> bool {
        let Some(entry_arc) = self.entries.get(name) else {
            return false;
        };
        let mut entry = entry_arc.lock().await;
        if entry.state != ToolState::Running {
            return false;
        }
        let alive = entry
            .process
            .as_mut()
            .map(ToolProcess::is_alive)
            .unwrap_or(false);
        if !alive {
            warn!(tool = name, "tool server process disappeared; marking dead");
            self.mark_dead(name, &mut entry);
        }
        alive
    }

    fn mark_dead(&self, name: &str, entry: &mut ToolEntry) {
        entry.state = ToolState::Dead;
        let gone = entry
            .process
            .as_ref()
            .map(|process| !probe::pid_alive(process.pid()))
            .unwrap_or(true);
        if gone {
            entry.process = None;
            self.pid_file.remove(name);
        }
    }

    fn snapshot(&self, descriptor: &ToolDescriptor, entry: &ToolEntry) -> ToolStatus {
        ToolStatus {
            name: descriptor.name.clone(),
            state: entry.state,
            pid: entry.process.as_ref().map(ToolProcess::pid),
            port: descriptor.port,
            last_health: entry.last_health,
        }
    }
}

#[async_trait]
impl ToolDirectory for ProcessSupervisor {
    async fn running_tools(&self) -> Vec<ToolDescriptor> {
        let mut descriptors = Vec::new();
        for tool in &self.tools {
            if self.check_running(&tool.name).await {
                descriptors.push(tool.clone());
            }
        }
        descriptors
    }

    async fn find_running(&self, name: &str) -> Option<ToolDescriptor> {
        if self.check_running(name).await {
            self.descriptor(name).cloned()
        } else {
            None
        }
    }
}
