use serde::Serialize;
use serde_json::Value;

/// One part of a message exchanged during an agent run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "part_kind", rename_all = "kebab-case")]
pub enum MessagePart {
    SystemPrompt {
        content: String,
    },
    UserPrompt {
        content: String,
    },
    Text {
        content: String,
    },
    /// The model asked for a tool to be invoked.
    ToolCall {
        tool_name: String,
        args: Value,
        tool_call_id: String,
    },
    /// A tool ran and returned `content`.
    ToolReturn {
        tool_name: String,
        content: Value,
        tool_call_id: String,
    },
    /// A tool call could not be honoured; the reason is fed back to the model.
    RetryPrompt {
        tool_name: String,
        content: String,
        tool_call_id: String,
    },
}

/// Who produced a message: requests go to the model, responses come from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    Request,
    Response,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMessage {
    pub kind: MessageKind,
    pub parts: Vec<MessagePart>,
}

/// Ordered log of everything sent to and received from the model in one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Transcript {
    messages: Vec<ModelMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_request(&mut self, parts: Vec<MessagePart>) {
        self.messages.push(ModelMessage {
            kind: MessageKind::Request,
            parts,
        });
    }

    pub fn push_response(&mut self, parts: Vec<MessagePart>) {
        self.messages.push(ModelMessage {
            kind: MessageKind::Response,
            parts,
        });
    }

    pub fn all_messages(&self) -> &[ModelMessage] {
        &self.messages
    }

    /// All parts in transcript order.
    pub fn parts(&self) -> impl Iterator<Item = &MessagePart> {
        self.messages.iter().flat_map(|m| m.parts.iter())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
