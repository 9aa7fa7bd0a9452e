use super::probe;
use crate::config::ToolDescriptor;
use std::io;
use std::time::Duration;
use sysinfo::{Pid, ProcessesToUpdate, Signal, System};
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One tool-server child process. `Owned` wraps a child spawned by this
/// supervisor; `Adopted` is a PID recovered from the durable record, where
/// only signal-level control is available.
pub enum ToolProcess {
    Owned { child: Child, pid: u32 },
    Adopted { pid: u32 },
}

impl ToolProcess {
    /// Spawn the tool server with the descriptor's environment layered over
    /// the inherited one (descriptor values override ambient ones).
    pub fn spawn(descriptor: &ToolDescriptor) -> io::Result<Self> {
        let mut command = Command::new(&descriptor.command);
        command
            .args(&descriptor.args)
            .envs(&descriptor.env)
            .kill_on_drop(false);
        let child = command.spawn()?;
        let pid = child
            .id()
            .ok_or_else(|| io::Error::other("child exited before its pid could be read"))?;
        Ok(ToolProcess::Owned { child, pid })
    }

    pub fn adopt(pid: u32) -> Self {
        ToolProcess::Adopted { pid }
    }

    pub fn pid(&self) -> u32 {
        match self {
            ToolProcess::Owned { pid, .. } => *pid,
            ToolProcess::Adopted { pid } => *pid,
        }
    }

    /// Cheap liveness check. Reaps an owned child that has already exited.
    pub fn is_alive(&mut self) -> bool {
        match self {
            ToolProcess::Owned { child, pid } => match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(pid = *pid, %status, "tool server exited");
                    false
                }
                Ok(None) => true,
                Err(_) => probe::pid_alive(*pid),
            },
            ToolProcess::Adopted { pid } => probe::pid_alive(*pid),
        }
    }

    /// Request graceful termination, wait up to `grace`, escalate to a forced
    /// kill, wait up to `kill_grace`. Returns the process back to the caller
    /// when even the forced kill leaves it alive.
    pub async fn shutdown(self, grace: Duration, kill_grace: Duration) -> Result<(), Self> {
        match self {
            ToolProcess::Owned { mut child, pid } => {
                terminate(pid);
                if timeout(grace, child.wait()).await.is_ok() {
                    return Ok(());
                }
                warn!(pid, "tool server ignored termination request; killing");
                let _ = child.start_kill();
                match timeout(kill_grace, child.wait()).await {
                    Ok(_) => Ok(()),
                    Err(_) => Err(ToolProcess::Owned { child, pid }),
                }
            }
            ToolProcess::Adopted { pid } => {
                terminate(pid);
                if wait_for_exit(pid, grace).await {
                    return Ok(());
                }
                warn!(pid, "adopted tool server ignored termination request; killing");
                force_kill(pid);
                if wait_for_exit(pid, kill_grace).await {
                    Ok(())
                } else {
                    Err(ToolProcess::Adopted { pid })
                }
            }
        }
    }
}

/// Platform-appropriate termination request: a Term signal where the platform
/// supports signals, a forceful kill elsewhere.
fn terminate(pid: u32) {
    let target = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    if let Some(process) = system.process(target) {
        if process.kill_with(Signal::Term).is_none() {
            process.kill();
        }
    }
}

fn force_kill(pid: u32) {
    let target = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    if let Some(process) = system.process(target) {
        process.kill();
    }
}

async fn wait_for_exit(pid: u32, deadline: Duration) -> bool {
    let started = tokio::time::Instant::now();
    loop {
        if !probe::pid_alive(pid) {
            return true;
        }
        if started.elapsed() >= deadline {
            return false;
        }
        sleep(EXIT_POLL_INTERVAL).await;
    }
}
