use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::stateless_llm_interface::{
    ChatCompletion, ChatMessage, ChatRequest, LlmError, StatelessLLMInterface, ToolCall,
};
use crate::config::LlmConfig;

/// OpenAI compatible LLM implementation over the Chat Completions API.
pub struct OpenAICompatibleLLM {
    model: String,
    base_url: String,
    api_key: String,
    organization_id: Option<String>,
    project_id: Option<String>,
    temperature: Option<f32>,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

impl OpenAICompatibleLLM {
    /// Build a client from the LLM section of the configuration.
    ///
    /// # Arguments
    /// * `config` - Provider endpoint, credentials and sampling settings
    /// * `model` - Model identifier; agents may override the configured default
    pub fn new(config: &LlmConfig, model: String) -> Result<Self, LlmError> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        info!(
            "Initialized OpenAICompatibleLLM: model={}, base_url={}",
            model, base_url
        );

        Ok(Self {
            model,
            base_url,
            api_key: config.llm_api_key.clone(),
            organization_id: config.organization_id.clone(),
            project_id: config.project_id.clone(),
            temperature: config.temperature,
            timeout,
            client,
        })
    }

    fn build_body<'a>(&'a self, request: &'a ChatRequest) -> CompletionBody<'a> {
        let tools = request
            .tools
            .iter()
            .map(|tool| {
                let mut function = serde_json::Map::new();
                function.insert("name".into(), Value::String(tool.name.clone()));
                if let Some(description) = &tool.description {
                    function.insert("description".into(), Value::String(description.clone()));
                }
                function.insert("parameters".into(), tool.parameters.clone());
                serde_json::json!({ "type": "function", "function": function })
            })
            .collect();

        let response_format = request.response_format.as_ref().map(|format| {
            serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name": format.name,
                    "schema": format.schema,
                    "strict": format.strict
                }
            })
        });

        CompletionBody {
            model: &self.model,
            messages: &request.messages,
            tools,
            response_format,
            temperature: self.temperature,
        }
    }

    fn map_send_error(&self, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout(self.timeout)
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl StatelessLLMInterface for OpenAICompatibleLLM {
    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatCompletion, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(&request);

        let mut builder = self.client.post(&url).bearer_auth(&self.api_key).json(&body);
        if let Some(org) = &self.organization_id {
            builder = builder.header("OpenAI-Organization", org);
        }
        if let Some(project) = &self.project_id {
            builder = builder.header("OpenAI-Project", project);
        }

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending chat completion"
        );
        let response = builder.send().await.map_err(|e| self.map_send_error(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            return Err(match status.as_u16() {
                401 | 403 => LlmError::Auth(text),
                429 => LlmError::RateLimit(text),
                400..=499 => LlmError::InvalidRequest(text),
                code => LlmError::Api { status: code, body: text },
            });
        }

        let parsed: CompletionResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::Parsing(format!("{e}: {text}")))?;
        let choice = parsed.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;

        Ok(ChatCompletion {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls.unwrap_or_default(),
            finish_reason: choice.finish_reason,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::stateless_llm::{ResponseFormat, ToolDefinition};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_llm(base_url: &str) -> OpenAICompatibleLLM {
        let config = LlmConfig {
            base_url: format!("{base_url}/v1/"),
            llm_api_key: "sk-test".into(),
            organization_id: Some("org-test".into()),
            ..LlmConfig::default()
        };
        OpenAICompatibleLLM::new(&config, "gpt-4o-mini".into()).unwrap()
    }

    #[tokio::test]
    async fn returns_text_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("openai-organization", "org-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {"role": "assistant", "content": "Hello!"},
                    "finish_reason": "stop"
                }]
            })))
            .mount(&server)
            .await;

        let llm = test_llm(&server.uri());
        let completion = llm
            .chat_completion(ChatRequest {
                messages: vec![ChatMessage::user("hi")],
                ..ChatRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(completion.content.as_deref(), Some("Hello!"));
        assert!(completion.tool_calls.is_empty());
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn sends_tools_and_parses_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "tools": [{
                    "type": "function",
                    "function": {"name": "mcp_f1_score_tool"}
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_abc",
                            "type": "function",
                            "function": {"name": "mcp_f1_score_tool", "arguments": "{\"data_dir\":\"digits\"}"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            })))
            .mount(&server)
            .await;

        let llm = test_llm(&server.uri());
        let completion = llm
            .chat_completion(ChatRequest {
                messages: vec![ChatMessage::user("What is the F1 score?")],
                tools: vec![ToolDefinition {
                    name: "mcp_f1_score_tool".into(),
                    description: Some("Macro F1".into()),
                    parameters: json!({"type": "object"}),
                }],
                response_format: None,
            })
            .await
            .unwrap();

        assert_eq!(completion.content, None);
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].id, "call_abc");
        assert_eq!(completion.tool_calls[0].function.name, "mcp_f1_score_tool");
    }

    #[tokio::test]
    async fn sends_json_schema_response_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "response_format": {
                    "type": "json_schema",
                    "json_schema": {"name": "GuardResult", "strict": true}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {"content": "{\"type\":\"proceed\",\"message\":\"\"}"},
                    "finish_reason": "stop"
                }]
            })))
            .mount(&server)
            .await;

        let llm = test_llm(&server.uri());
        let completion = llm
            .chat_completion(ChatRequest {
                messages: vec![ChatMessage::user("shap plot please")],
                tools: vec![],
                response_format: Some(ResponseFormat {
                    name: "GuardResult".into(),
                    schema: json!({"type": "object"}),
                    strict: true,
                }),
            })
            .await
            .unwrap();

        assert_eq!(
            completion.content.as_deref(),
            Some("{\"type\":\"proceed\",\"message\":\"\"}")
        );
    }

    #[tokio::test]
    async fn maps_error_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let llm = test_llm(&server.uri());
        let request = ChatRequest {
            messages: vec![ChatMessage::user("hi")],
            ..ChatRequest::default()
        };

        let err = llm.chat_completion(request.clone()).await.unwrap_err();
        assert!(matches!(err, LlmError::Auth(ref body) if body == "bad key"));

        let err = llm.chat_completion(request).await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let llm = test_llm(&server.uri());
        let err = llm
            .chat_completion(ChatRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }
}
