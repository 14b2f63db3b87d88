use async_trait::async_trait;

use crate::agent::stateless_llm::LlmError;
use crate::agent::transcript::Transcript;
use crate::schema::{DataSet, GuardResult};
use crate::tool_server::ToolServerError;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    ToolServer(#[from] ToolServerError),

    #[error("model output did not match the expected structure: {0}")]
    StructuredOutput(String),

    #[error("model kept calling tools after {0} rounds")]
    ToolRoundLimit(u32),
}

/// Result of one model agent run: final text plus everything exchanged on the way.
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub output: String,
    pub transcript: Transcript,
}

/// Labels a free-text query as a greeting, an off-topic request, or one to pass on.
#[async_trait]
pub trait GuardClassifier: Send + Sync {
    /// Classify `user_input`. The dataset is deliberately not part of the input.
    async fn classify(&self, user_input: &str) -> Result<GuardResult, AgentError>;
}

/// Answers in-scope queries, calling at most the registered tools.
#[async_trait]
pub trait ModelRunner: Send + Sync {
    async fn run(&self, user_input: &str, data_set: DataSet) -> Result<AgentRun, AgentError>;
}
