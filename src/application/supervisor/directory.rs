use crate::config::ToolDescriptor;
use async_trait::async_trait;

/// The supervisor's published view of which tools are currently running.
/// The context pipeline reads this seam instead of holding the supervisor
/// directly, so it can be exercised against a fixed directory in tests.
#[async_trait]
pub trait ToolDirectory: Send + Sync {
    /// Descriptors of tools currently observed running, in configured order.
    async fn running_tools(&self) -> Vec<ToolDescriptor>;

    /// The descriptor for `name`, if that tool is currently running.
    async fn find_running(&self, name: &str) -> Option<ToolDescriptor>;
}
