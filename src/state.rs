use std::sync::Arc;

use crate::agent::agent_factory::AgentFactory;
use crate::agent::agents::{GuardClassifier, ModelRunner};
use crate::agent::tool_extractor::ToolExtraction;
use crate::config::Config;
use crate::tool_server::{McpToolServer, ToolServer};

/// Everything the handlers need, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub guard: Arc<dyn GuardClassifier>,
    pub model_agent: Arc<dyn ModelRunner>,
    pub tool_server: Arc<dyn ToolServer>,
    pub tool_extraction: ToolExtraction,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let tool_server: Arc<dyn ToolServer> = Arc::new(McpToolServer::new(&config.mcp_config));
        let guard = AgentFactory::create_guard(&config)?;
        let model_agent = AgentFactory::create_model_agent(&config, tool_server.clone())?;

        Ok(Self::with_agents(config, guard, model_agent, tool_server))
    }

    /// Assemble state from already-built agents.
    pub fn with_agents(
        config: Config,
        guard: Arc<dyn GuardClassifier>,
        model_agent: Arc<dyn ModelRunner>,
        tool_server: Arc<dyn ToolServer>,
    ) -> Self {
        let tool_extraction = config.agent_config.tool_extraction;
        Self {
            config: Arc::new(config),
            guard,
            model_agent,
            tool_server,
            tool_extraction,
        }
    }
}
