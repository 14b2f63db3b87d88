use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::agent_interface::{AgentError, AgentRun, ModelRunner};
use crate::agent::instructions::dataset_prompt;
use crate::agent::stateless_llm::{
    ChatMessage, ChatRequest, StatelessLLMInterface, ToolCall, ToolDefinition,
};
use crate::agent::transcript::{MessagePart, Transcript};
use crate::schema::DataSet;
use crate::tool_server::{ToolServer, ToolSession};

/// Agent that answers F1 / SHAP requests by calling tools on the MCP server.
pub struct ModelAgent {
    llm: Arc<dyn StatelessLLMInterface>,
    tool_server: Arc<dyn ToolServer>,
    instructions: String,
    tool_registry: Vec<String>,
    max_tool_rounds: u32,
    max_response_chars: usize,
}

impl ModelAgent {
    /// Initialize the agent.
    ///
    /// # Arguments
    /// * `llm` - The LLM to use
    /// * `tool_server` - Where tool sessions are opened, one per run
    /// * `instructions` - Static system prompt
    /// * `tool_registry` - Names of the server tools the model may see
    /// * `max_tool_rounds` - How many rounds of tool execution a run may take
    /// * `max_response_chars` - Hard cap on the final answer length
    pub fn new(
        llm: Arc<dyn StatelessLLMInterface>,
        tool_server: Arc<dyn ToolServer>,
        instructions: String,
        tool_registry: Vec<String>,
        max_tool_rounds: u32,
        max_response_chars: usize,
    ) -> Self {
        info!(
            "ModelAgent initialized: model={}, tool_server={}, tools={:?}",
            llm.model_name(),
            tool_server.endpoint(),
            tool_registry
        );
        Self {
            llm,
            tool_server,
            instructions,
            tool_registry,
            max_tool_rounds,
            max_response_chars,
        }
    }

    async fn run_in_session(
        &self,
        session: &dyn ToolSession,
        user_input: &str,
        data_set: DataSet,
    ) -> Result<AgentRun, AgentError> {
        let tools = self.visible_tools(session).await?;
        let tool_names: HashSet<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        let dataset_prompt = dataset_prompt(data_set);

        let mut transcript = Transcript::new();
        transcript.push_request(vec![
            MessagePart::SystemPrompt {
                content: self.instructions.clone(),
            },
            MessagePart::SystemPrompt {
                content: dataset_prompt.clone(),
            },
            MessagePart::UserPrompt {
                content: user_input.to_string(),
            },
        ]);

        let mut messages = vec![
            ChatMessage::system(self.instructions.clone()),
            ChatMessage::system(dataset_prompt),
            ChatMessage::user(user_input),
        ];

        let mut rounds = 0;
        loop {
            let completion = self
                .llm
                .chat_completion(ChatRequest {
                    messages: messages.clone(),
                    tools: tools.clone(),
                    response_format: None,
                })
                .await?;

            transcript.push_response(response_parts(&completion.content, &completion.tool_calls));

            if completion.tool_calls.is_empty() {
                let output = completion.content.unwrap_or_default();
                return Ok(AgentRun {
                    output: self.enforce_length(output),
                    transcript,
                });
            }

            if rounds == self.max_tool_rounds {
                return Err(AgentError::ToolRoundLimit(self.max_tool_rounds));
            }
            rounds += 1;

            messages.push(ChatMessage::Assistant {
                content: completion.content.clone(),
                tool_calls: completion.tool_calls.clone(),
            });

            let mut results = Vec::with_capacity(completion.tool_calls.len());
            for call in &completion.tool_calls {
                let part = self.execute_call(session, &tool_names, call).await?;
                messages.push(ChatMessage::Tool {
                    tool_call_id: call.id.clone(),
                    content: part_as_tool_message(&part),
                });
                results.push(part);
            }
            transcript.push_request(results);
        }
    }

    /// Tools offered by the server, narrowed to the registry.
    async fn visible_tools(&self, session: &dyn ToolSession) -> Result<Vec<ToolDefinition>, AgentError> {
        let advertised = session.list_tools().await?;

        for name in &self.tool_registry {
            if !advertised.iter().any(|t| &t.name == name) {
                warn!("Tool server does not advertise registered tool {}", name);
            }
        }

        Ok(advertised
            .into_iter()
            .filter(|t| self.tool_registry.iter().any(|name| name == &t.name))
            .map(|t| ToolDefinition {
                name: t.name,
                description: t.description,
                parameters: t.input_schema,
            })
            .collect())
    }

    async fn execute_call(
        &self,
        session: &dyn ToolSession,
        tool_names: &HashSet<&str>,
        call: &ToolCall,
    ) -> Result<MessagePart, AgentError> {
        let tool_name = call.function.name.clone();
        let tool_call_id = call.id.clone();

        if !tool_names.contains(tool_name.as_str()) {
            warn!("Model requested unknown tool {}", tool_name);
            return Ok(MessagePart::RetryPrompt {
                content: format!("Unknown tool name: {tool_name}"),
                tool_name,
                tool_call_id,
            });
        }

        let arguments = match parse_arguments(&call.function.arguments) {
            Ok(arguments) => arguments,
            Err(reason) => {
                warn!("Invalid arguments for {}: {}", tool_name, reason);
                return Ok(MessagePart::RetryPrompt {
                    content: reason,
                    tool_name,
                    tool_call_id,
                });
            }
        };

        debug!(tool = %tool_name, args = ?arguments, "Calling tool");
        let outcome = session.call_tool(&tool_name, arguments).await?;

        if outcome.is_error {
            warn!("Tool {} reported an error", tool_name);
            return Ok(MessagePart::RetryPrompt {
                content: value_as_text(&outcome.content),
                tool_name,
                tool_call_id,
            });
        }

        Ok(MessagePart::ToolReturn {
            tool_name,
            content: outcome.content,
            tool_call_id,
        })
    }

    fn enforce_length(&self, output: String) -> String {
        if output.chars().count() <= self.max_response_chars {
            return output;
        }
        warn!(
            "Model response exceeded {} characters; truncating",
            self.max_response_chars
        );
        output.chars().take(self.max_response_chars).collect()
    }
}

#[async_trait]
impl ModelRunner for ModelAgent {
    async fn run(&self, user_input: &str, data_set: DataSet) -> Result<AgentRun, AgentError> {
        info!(data_set = %data_set, "Model agent run started");
        let session = self.tool_server.connect().await?;

        let outcome = self.run_in_session(session.as_ref(), user_input, data_set).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close tool server session: {}", e);
        }
        outcome
    }
}

fn response_parts(content: &Option<String>, tool_calls: &[ToolCall]) -> Vec<MessagePart> {
    let mut parts = Vec::with_capacity(tool_calls.len() + 1);
    if let Some(text) = content.as_ref().filter(|t| !t.is_empty()) {
        parts.push(MessagePart::Text {
            content: text.clone(),
        });
    }
    for call in tool_calls {
        parts.push(MessagePart::ToolCall {
            tool_name: call.function.name.clone(),
            args: serde_json::from_str(&call.function.arguments)
                .unwrap_or_else(|_| Value::String(call.function.arguments.clone())),
            tool_call_id: call.id.clone(),
        });
    }
    parts
}

fn parse_arguments(raw: &str) -> Result<Map<String, Value>, String> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("Tool arguments must be a JSON object, got: {other}")),
        Err(e) => Err(format!("Tool arguments are not valid JSON: {e}")),
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn part_as_tool_message(part: &MessagePart) -> String {
    match part {
        MessagePart::ToolReturn { content, .. } => value_as_text(content),
        MessagePart::RetryPrompt { content, .. } => format!("{content}\n\nFix the errors and try again."),
        _ => String::new(),
    }
}
