use crate::config::ToolDescriptor;
use reqwest::Client;
use std::time::Duration;
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};
use tracing::debug;

/// A liveness check with two interchangeable strategies: a network probe
/// against the tool's health endpoint, or an OS-level process-existence
/// check. The network probe is selected whenever a health endpoint is
/// configured.
#[derive(Debug, Clone)]
pub enum LivenessProbe {
    Http { url: String },
    Process { pid: u32 },
}

impl LivenessProbe {
    pub fn for_tool(descriptor: &ToolDescriptor, pid: u32) -> Self {
        match descriptor.health_url() {
            Some(url) => LivenessProbe::Http { url },
            None => LivenessProbe::Process { pid },
        }
    }

    pub async fn is_alive(&self, http: &Client, timeout: Duration) -> bool {
        match self {
            LivenessProbe::Http { url } => {
                let alive = http_alive(http, url, timeout).await;
                if !alive {
                    debug!(url = url.as_str(), "HTTP liveness probe failed");
                }
                alive
            }
            LivenessProbe::Process { pid } => pid_alive(*pid),
        }
    }
}

async fn http_alive(client: &Client, url: &str, timeout: Duration) -> bool {
    match client.get(url).timeout(timeout).send().await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

/// OS-level "does this PID exist" check. A zombie still occupies its PID but
/// is not serving anything, so it counts as dead.
pub fn pid_alive(pid: u32) -> bool {
    let target = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    match system.process(target) {
        Some(process) => process.status() != ProcessStatus::Zombie,
        None => false,
    }
}
