use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::agent::agents::guard_agent::GuardAgent;
use crate::agent::agents::model_agent::ModelAgent;
use crate::agent::agents::{GuardClassifier, ModelRunner};
use crate::agent::stateless_llm_factory::StatelessLLMFactory;
use crate::config::Config;
use crate::tool_server::ToolServer;

/// Factory for creating agent instances
pub struct AgentFactory;

impl AgentFactory {
    /// Create the guardrail agent.
    pub fn create_guard(config: &Config) -> Result<Arc<dyn GuardClassifier>> {
        info!("Initializing agent: guard");
        let llm = StatelessLLMFactory::create_llm(&config.llm_config, config.guard_model())?;
        Ok(Arc::new(GuardAgent::new(
            llm,
            config.agent_config.guard_instructions.clone(),
        )))
    }

    /// Create the model agent, wired to the shared tool server.
    ///
    /// # Arguments
    /// * `config` - Full service configuration
    /// * `tool_server` - Tool server the agent opens a session on per run
    pub fn create_model_agent(
        config: &Config,
        tool_server: Arc<dyn ToolServer>,
    ) -> Result<Arc<dyn ModelRunner>> {
        info!("Initializing agent: model");
        let llm = StatelessLLMFactory::create_llm(&config.llm_config, config.model_agent_model())?;
        let agent_config = &config.agent_config;
        Ok(Arc::new(ModelAgent::new(
            llm,
            tool_server,
            agent_config.model_instructions.clone(),
            agent_config.tools.clone(),
            agent_config.max_tool_rounds,
            agent_config.max_response_chars,
        )))
    }
}
