use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::agent::instructions::{GUARD_INSTRUCTIONS, MODEL_INSTRUCTIONS};
use crate::agent::tool_extractor::ToolExtraction;

/// Config files looked for in the working directory when `CONFIG_PATH` is unset.
pub const DEFAULT_CONFIG_FILES: [&str; 3] = ["conf.yaml", "conf.yml", "conf.json"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub system_config: SystemConfig,
    pub llm_config: LlmConfig,
    pub mcp_config: McpConfig,
    pub agent_config: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub host: String,
    pub port: u16,
    /// `tracing` filter directive, used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Append logs to this file as well as stdout.
    pub log_file: Option<String>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            log_filter: "mlguard_api=info,tower_http=info".to_string(),
            log_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub llm_provider: String,
    pub base_url: String,
    pub llm_api_key: String,
    pub model: String,
    pub organization_id: Option<String>,
    pub project_id: Option<String>,
    pub temperature: Option<f32>,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_provider: "openai_llm".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            llm_api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            organization_id: None,
            project_id: None,
            temperature: None,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    pub url: String,
    pub client_name: String,
    pub request_timeout_secs: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8001/mcp/".to_string(),
            client_name: "mlguard-api".to_string(),
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Overrides `llm_config.model` for the guard.
    pub guard_model: Option<String>,
    /// Overrides `llm_config.model` for the model agent.
    pub model_agent_model: Option<String>,
    pub guard_instructions: String,
    pub model_instructions: String,
    pub tools: Vec<String>,
    pub max_tool_rounds: u32,
    pub max_response_chars: usize,
    pub tool_extraction: ToolExtraction,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            guard_model: None,
            model_agent_model: None,
            guard_instructions: GUARD_INSTRUCTIONS.to_string(),
            model_instructions: MODEL_INSTRUCTIONS.to_string(),
            tools: vec![
                "mcp_f1_score_tool".to_string(),
                "mcp_shap_summary_tool".to_string(),
            ],
            max_tool_rounds: 5,
            max_response_chars: 500,
            tool_extraction: ToolExtraction::FirstMatch,
        }
    }
}

impl Config {
    /// Load a config file. `.json` files are read as JSON, anything else as YAML.
    /// `${VAR}` placeholders are replaced from the environment before parsing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        let content = substitute_env_vars(&content);

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let config = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON configuration: {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML configuration: {}", path.display()))?
        };
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Find and load the configuration: `CONFIG_PATH`, then the default file
    /// names, then built-in defaults with environment overrides.
    pub fn discover() -> Result<Self> {
        if let Ok(path) = std::env::var("CONFIG_PATH") {
            return Self::load(path);
        }

        if let Some(path) = DEFAULT_CONFIG_FILES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
        {
            return Self::load(path);
        }

        info!("No configuration file found, using defaults and environment");
        Ok(Self::from_env())
    }

    /// Defaults overridden by `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `MCP_SERVER_URL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.llm_config.llm_api_key = key;
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.llm_config.base_url = url;
        }
        if let Ok(url) = std::env::var("MCP_SERVER_URL") {
            config.mcp_config.url = url;
        }
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.system_config.port == 0 {
            anyhow::bail!("system_config.port must be non-zero");
        }
        if self.llm_config.llm_api_key.trim().is_empty() || self.llm_config.llm_api_key.contains("${") {
            anyhow::bail!("llm_config.llm_api_key is not set (set OPENAI_API_KEY)");
        }
        if self.llm_config.base_url.trim().is_empty() {
            anyhow::bail!("llm_config.base_url must not be empty");
        }
        if self.mcp_config.url.trim().is_empty() {
            anyhow::bail!("mcp_config.url must not be empty");
        }
        if self.agent_config.tools.is_empty() {
            anyhow::bail!("agent_config.tools must name at least one tool");
        }
        if self.agent_config.max_response_chars == 0 {
            anyhow::bail!("agent_config.max_response_chars must be non-zero");
        }
        Ok(())
    }

    pub fn guard_model(&self) -> &str {
        self.agent_config
            .guard_model
            .as_deref()
            .unwrap_or(&self.llm_config.model)
    }

    pub fn model_agent_model(&self) -> &str {
        self.agent_config
            .model_agent_model
            .as_deref()
            .unwrap_or(&self.llm_config.model)
    }
}

/// Replace `${VAR_NAME}` with the variable's value; unknown variables are left as is.
pub fn substitute_env_vars(content: &str) -> String {
    let pattern = match Regex::new(r"\$\{(\w+)\}") {
        Ok(pattern) => pattern,
        Err(_) => return content.to_string(),
    };
    pattern
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| {
                debug!("Environment variable {} is not set", var_name);
                caps[0].to_string()
            })
        })
        .into_owned()
}
