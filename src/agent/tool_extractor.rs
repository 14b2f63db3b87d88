use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::transcript::{MessagePart, Transcript};

/// Which tool the model agent used and what it returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolFinding {
    pub tool_used: Option<String>,
    pub tool_output: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
#[error("could not parse agent result: {0}")]
pub struct ExtractError(String);

/// How tool name and tool output are matched up in a transcript.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolExtraction {
    /// First tool call name and first tool return content, scanned independently.
    /// With several tool calls in one run the two may come from different calls.
    #[default]
    FirstMatch,
    /// First tool call name and the return carrying that call's id.
    Paired,
}

impl ToolExtraction {
    pub fn extract(&self, transcript: &Transcript) -> Result<ToolFinding, ExtractError> {
        match self {
            ToolExtraction::FirstMatch => extract_tool_info(transcript),
            ToolExtraction::Paired => extract_paired_tool_info(transcript),
        }
    }
}

/// Extract the first tool call name and the first returned content from an agent run.
pub fn extract_tool_info(transcript: &Transcript) -> Result<ToolFinding, ExtractError> {
    let mut finding = ToolFinding::default();

    for part in transcript.parts() {
        match part {
            MessagePart::ToolCall { tool_name, .. } if finding.tool_used.is_none() => {
                finding.tool_used = Some(checked_name(tool_name)?.to_string());
            }
            MessagePart::ToolReturn { content, .. } if finding.tool_output.is_none() => {
                finding.tool_output = Some(content.clone());
            }
            _ => {}
        }
        if finding.tool_used.is_some() && finding.tool_output.is_some() {
            break;
        }
    }

    Ok(finding)
}

/// Extract the first tool call and the output of that same call.
pub fn extract_paired_tool_info(transcript: &Transcript) -> Result<ToolFinding, ExtractError> {
    let first_call = transcript.parts().find_map(|part| match part {
        MessagePart::ToolCall {
            tool_name,
            tool_call_id,
            ..
        } => Some((tool_name, tool_call_id)),
        _ => None,
    });

    let Some((tool_name, call_id)) = first_call else {
        return Ok(ToolFinding::default());
    };
    let tool_name = checked_name(tool_name)?;
    if call_id.is_empty() {
        return Err(ExtractError(format!(
            "tool call to `{tool_name}` has no call id to pair with"
        )));
    }

    let tool_output = transcript.parts().find_map(|part| match part {
        MessagePart::ToolReturn {
            tool_call_id,
            content,
            ..
        } if tool_call_id == call_id => Some(content.clone()),
        _ => None,
    });

    Ok(ToolFinding {
        tool_used: Some(tool_name.to_string()),
        tool_output,
    })
}

fn checked_name(name: &str) -> Result<&str, ExtractError> {
    if name.trim().is_empty() {
        return Err(ExtractError("tool call part without a tool name".to_string()));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, id: &str) -> MessagePart {
        MessagePart::ToolCall {
            tool_name: name.into(),
            args: json!({"data_dir": "iris"}),
            tool_call_id: id.into(),
        }
    }

    fn ret(name: &str, id: &str, content: Value) -> MessagePart {
        MessagePart::ToolReturn {
            tool_name: name.into(),
            content,
            tool_call_id: id.into(),
        }
    }

    fn two_tool_transcript() -> Transcript {
        // Both calls in one response, results returned in reverse order.
        let mut t = Transcript::new();
        t.push_request(vec![MessagePart::UserPrompt {
            content: "F1 and SHAP please".into(),
        }]);
        t.push_response(vec![
            call("mcp_f1_score_tool", "call_1"),
            call("mcp_shap_summary_tool", "call_2"),
        ]);
        t.push_request(vec![
            ret("mcp_shap_summary_tool", "call_2", json!("iVBORw0KGgo=")),
            ret("mcp_f1_score_tool", "call_1", json!(0.97)),
        ]);
        t.push_response(vec![MessagePart::Text {
            content: "Done.".into(),
        }]);
        t
    }

    #[test]
    fn no_tool_calls_leaves_both_fields_empty() {
        let mut t = Transcript::new();
        t.push_request(vec![MessagePart::UserPrompt {
            content: "What can you do?".into(),
        }]);
        t.push_response(vec![MessagePart::Text {
            content: "Could you clarify?".into(),
        }]);

        assert_eq!(extract_tool_info(&t).unwrap(), ToolFinding::default());
        assert_eq!(extract_paired_tool_info(&t).unwrap(), ToolFinding::default());
    }

    #[test]
    fn single_call_is_found() {
        let mut t = Transcript::new();
        t.push_response(vec![call("mcp_f1_score_tool", "call_1")]);
        t.push_request(vec![ret("mcp_f1_score_tool", "call_1", json!(0.9642))]);

        let finding = extract_tool_info(&t).unwrap();
        assert_eq!(finding.tool_used.as_deref(), Some("mcp_f1_score_tool"));
        assert_eq!(finding.tool_output, Some(json!(0.9642)));
    }

    #[test]
    fn first_match_scans_name_and_output_independently() {
        let finding = extract_tool_info(&two_tool_transcript()).unwrap();

        assert_eq!(finding.tool_used.as_deref(), Some("mcp_f1_score_tool"));
        assert_eq!(finding.tool_output, Some(json!("iVBORw0KGgo=")));
    }

    #[test]
    fn paired_mode_matches_by_call_id() {
        let finding = extract_paired_tool_info(&two_tool_transcript()).unwrap();

        assert_eq!(finding.tool_used.as_deref(), Some("mcp_f1_score_tool"));
        assert_eq!(finding.tool_output, Some(json!(0.97)));
    }

    #[test]
    fn retry_prompts_are_not_tool_output() {
        let mut t = Transcript::new();
        t.push_response(vec![call("mcp_shap_summary_tool", "call_1")]);
        t.push_request(vec![MessagePart::RetryPrompt {
            tool_name: "mcp_shap_summary_tool".into(),
            content: "dataset not found".into(),
            tool_call_id: "call_1".into(),
        }]);

        let finding = extract_tool_info(&t).unwrap();
        assert_eq!(finding.tool_used.as_deref(), Some("mcp_shap_summary_tool"));
        assert_eq!(finding.tool_output, None);
    }

    #[test]
    fn falsy_first_output_is_still_kept() {
        let mut t = Transcript::new();
        t.push_response(vec![call("mcp_f1_score_tool", "a"), call("mcp_f1_score_tool", "b")]);
        t.push_request(vec![
            ret("mcp_f1_score_tool", "a", json!(0.0)),
            ret("mcp_f1_score_tool", "b", json!(0.8)),
        ]);

        assert_eq!(extract_tool_info(&t).unwrap().tool_output, Some(json!(0.0)));
    }

    #[test]
    fn nameless_tool_call_is_a_parse_error() {
        let mut t = Transcript::new();
        t.push_response(vec![call("  ", "call_1")]);

        assert!(extract_tool_info(&t).is_err());
        assert!(ToolExtraction::Paired.extract(&t).is_err());
    }
}
