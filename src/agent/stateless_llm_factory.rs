use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::agent::stateless_llm::openai_compatible_llm::OpenAICompatibleLLM;
use crate::agent::stateless_llm::StatelessLLMInterface;
use crate::config::LlmConfig;

/// Factory for creating stateless LLM instances
pub struct StatelessLLMFactory;

impl StatelessLLMFactory {
    /// Create an LLM based on the configuration.
    ///
    /// # Arguments
    /// * `config` - LLM configuration section
    /// * `model` - Model identifier for this agent
    pub fn create_llm(config: &LlmConfig, model: &str) -> Result<Arc<dyn StatelessLLMInterface>> {
        info!("Initializing LLM: {} ({})", config.llm_provider, model);

        match config.llm_provider.as_str() {
            "openai_llm" | "openai_compatible_llm" => {
                Ok(Arc::new(OpenAICompatibleLLM::new(config, model.to_string())?))
            }
            other => Err(anyhow::anyhow!("Unsupported LLM provider: {}", other)),
        }
    }
}
