//! Question tool — surfaces a structured clarifying question to the user.
//!
//! No network or storage involved: the validated question payload is echoed
//! as the terminal output and the client renders it as an interactive prompt.

use async_trait::async_trait;
use periscope_core::error::ToolError;
use periscope_core::tool::{Tool, ToolContext, ToolEvent, ToolEventStream};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct QuestionInput {
    question: String,
    #[serde(default)]
    options: Vec<QuestionOption>,
    #[serde(default)]
    allow_multiple: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct QuestionOption {
    label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

pub struct QuestionTool;

#[async_trait]
impl Tool for QuestionTool {
    fn name(&self) -> &str {
        "question"
    }

    fn description(&self) -> &str {
        "Ask the user a clarifying question, optionally with predefined options. \
         Use when the request is ambiguous and a wrong guess would waste a search."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to ask the user"
                },
                "options": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "label": { "type": "string" },
                            "description": { "type": "string" }
                        },
                        "required": ["label"]
                    }
                },
                "allow_multiple": {
                    "type": "boolean",
                    "default": false
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(
        &self,
        arguments: Value,
        ctx: ToolContext,
    ) -> Result<ToolEventStream, ToolError> {
        let input: QuestionInput = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        if input.question.trim().is_empty() {
            return Err(ToolError::InvalidArguments("empty question".into()));
        }

        let (tx, rx) = mpsc::channel(2);
        tokio::spawn(async move {
            let payload = serde_json::to_value(&input).unwrap_or(Value::Null);
            let _ = tx
                .send(ToolEvent::InputAvailable {
                    call_id: ctx.call_id.clone(),
                    input: payload.clone(),
                })
                .await;
            let _ = tx
                .send(ToolEvent::OutputAvailable {
                    call_id: ctx.call_id,
                    output: payload,
                })
                .await;
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn question_echoes_structured_payload() {
        let tool = QuestionTool;
        let mut stream = tool
            .execute(
                json!({
                    "question": "Which Rust edition?",
                    "options": [
                        {"label": "2021"},
                        {"label": "2024", "description": "latest"}
                    ]
                }),
                ToolContext::detached("call_1"),
            )
            .await
            .unwrap();

        let _ = stream.recv().await.unwrap();
        match stream.recv().await.unwrap() {
            ToolEvent::OutputAvailable { output, .. } => {
                assert_eq!(output["question"], "Which Rust edition?");
                assert_eq!(output["options"][1]["label"], "2024");
            }
            other => panic!("unexpected terminal {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_question_rejected() {
        let tool = QuestionTool;
        let err = tool
            .execute(json!({"question": ""}), ToolContext::detached("c"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
