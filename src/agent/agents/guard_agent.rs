use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::agent_interface::{AgentError, GuardClassifier};
use crate::agent::stateless_llm::{ChatMessage, ChatRequest, ResponseFormat, StatelessLLMInterface};
use crate::schema::GuardResult;

/// Guardrail agent: one structured completion per query, no tools.
pub struct GuardAgent {
    llm: Arc<dyn StatelessLLMInterface>,
    instructions: String,
}

impl GuardAgent {
    pub fn new(llm: Arc<dyn StatelessLLMInterface>, instructions: String) -> Self {
        info!("GuardAgent initialized with model {}", llm.model_name());
        Self { llm, instructions }
    }

    fn build_request(&self, user_input: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![
                ChatMessage::system(self.instructions.clone()),
                ChatMessage::user(user_input),
            ],
            tools: Vec::new(),
            response_format: Some(ResponseFormat {
                name: "GuardResult".to_string(),
                schema: GuardResult::json_schema(),
                strict: true,
            }),
        }
    }
}

#[async_trait]
impl GuardClassifier for GuardAgent {
    async fn classify(&self, user_input: &str) -> Result<GuardResult, AgentError> {
        let completion = self.llm.chat_completion(self.build_request(user_input)).await?;

        let content = completion
            .content
            .ok_or_else(|| AgentError::StructuredOutput("completion had no content".to_string()))?;
        debug!("Guard raw output: {}", content);

        let verdict: GuardResult = serde_json::from_str(content.trim())
            .map_err(|e| AgentError::StructuredOutput(format!("{e}: {content}")))?;

        info!(guard_type = %verdict.kind, "Guard verdict");
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::instructions::GUARD_INSTRUCTIONS;
    use crate::agent::stateless_llm::{ChatCompletion, LlmError};
    use crate::schema::GuardKind;
    use std::sync::Mutex;

    /// Returns a canned reply and records what it was asked.
    struct CannedLlm {
        reply: Mutex<Option<Result<ChatCompletion, LlmError>>>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl CannedLlm {
        fn replying(content: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(Ok(ChatCompletion {
                    content: content.map(str::to_string),
                    ..ChatCompletion::default()
                }))),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(err: LlmError) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(Err(err))),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl StatelessLLMInterface for CannedLlm {
        async fn chat_completion(&self, request: ChatRequest) -> Result<ChatCompletion, LlmError> {
            self.seen.lock().unwrap().push(request);
            self.reply.lock().unwrap().take().expect("single reply")
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn parses_greeting_verdict() {
        let llm = CannedLlm::replying(Some(
            r#"{"type":"greeting","message":"Hi! Ask me about F1 scores or SHAP plots."}"#,
        ));
        let guard = GuardAgent::new(llm.clone(), GUARD_INSTRUCTIONS.to_string());

        let verdict = guard.classify("Hello there!").await.unwrap();
        assert_eq!(verdict.kind, GuardKind::Greeting);
        assert!(verdict.message.contains("F1"));
    }

    #[tokio::test]
    async fn sends_only_the_query_with_a_schema() {
        let llm = CannedLlm::replying(Some(r#"{"type":"proceed","message":""}"#));
        let guard = GuardAgent::new(llm.clone(), GUARD_INSTRUCTIONS.to_string());

        let verdict = guard.classify("What is the F1 score of the model?").await.unwrap();
        assert!(verdict.is_proceed());

        let seen = llm.seen.lock().unwrap();
        let request = &seen[0];
        assert_eq!(
            request.messages,
            vec![
                ChatMessage::system(GUARD_INSTRUCTIONS),
                ChatMessage::user("What is the F1 score of the model?"),
            ]
        );
        assert!(request.tools.is_empty());
        let format = request.response_format.as_ref().unwrap();
        assert_eq!(format.name, "GuardResult");
        assert!(format.strict);
    }

    #[tokio::test]
    async fn malformed_output_is_a_structured_output_error() {
        let llm = CannedLlm::replying(Some("I think this is a greeting"));
        let guard = GuardAgent::new(llm, GUARD_INSTRUCTIONS.to_string());

        let err = guard.classify("hey").await.unwrap_err();
        assert!(matches!(err, AgentError::StructuredOutput(_)));
    }

    #[tokio::test]
    async fn unknown_label_is_rejected() {
        let llm = CannedLlm::replying(Some(r#"{"type":"maybe","message":""}"#));
        let guard = GuardAgent::new(llm, GUARD_INSTRUCTIONS.to_string());

        assert!(guard.classify("hmm").await.is_err());
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let llm = CannedLlm::failing(LlmError::Network("connection refused".into()));
        let guard = GuardAgent::new(llm, GUARD_INSTRUCTIONS.to_string());

        let err = guard.classify("What is the F1 score?").await.unwrap_err();
        assert!(matches!(err, AgentError::Llm(LlmError::Network(_))));
        assert!(err.to_string().contains("connection refused"));
    }
}
