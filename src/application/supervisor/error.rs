use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("tool '{tool}' is not configured")]
    UnknownTool { tool: String },
    #[error("failed to spawn tool server '{tool}': {source}")]
    SpawnFailed {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("tool server '{tool}' failed its health check after startup")]
    HealthCheckFailed { tool: String },
    #[error("tool server '{tool}' (pid {pid}) survived forced kill; manual intervention required")]
    StopFailed { tool: String, pid: u32 },
}
