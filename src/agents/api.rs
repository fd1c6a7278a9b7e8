use async_trait::async_trait;

use crate::agents::types::{Agent, MessageRole, Run, SortOrder, Thread, ThreadMessage};
use crate::errors::ParlanceError;

/// Boundary trait for the remote agent service.
///
/// The gateway programs against this seam. [`HttpAgentsClient`] is the
/// production implementation; tests substitute recording fakes.
///
/// [`HttpAgentsClient`]: crate::agents::http::HttpAgentsClient
#[async_trait]
pub trait AgentsApi: Send + Sync {
    /// Fetch agent metadata. Doubles as the connectivity probe.
    async fn get_agent(&self, agent_id: &str) -> Result<Agent, ParlanceError>;

    /// Open a fresh conversation thread.
    async fn create_thread(&self) -> Result<Thread, ParlanceError>;

    /// Fetch an existing thread, verifying it is still live on the service.
    async fn get_thread(&self, thread_id: &str) -> Result<Thread, ParlanceError>;

    /// Append a message to a thread.
    async fn create_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<ThreadMessage, ParlanceError>;

    /// Execute the agent against a thread and wait until the run reaches a
    /// terminal status or the implementation's run budget elapses, whichever
    /// comes first. The returned run carries the last observed status.
    async fn create_and_process_run(
        &self,
        thread_id: &str,
        agent_id: &str,
    ) -> Result<Run, ParlanceError>;

    /// List up to `limit` messages from a thread in the given order.
    async fn list_messages(
        &self,
        thread_id: &str,
        order: SortOrder,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, ParlanceError>;
}
