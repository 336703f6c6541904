//! Todo tools — the researcher's working plan.
//!
//! `todoWrite` replaces the plan, `todoRead` returns it. The plan is
//! per-run scratch state shared through a [`TodoStore`]; it is surfaced to
//! the client through the streamed tool parts, not persisted on its own.

use async_trait::async_trait;
use periscope_core::error::ToolError;
use periscope_core::tool::{Tool, ToolContext, ToolEvent, ToolEventStream};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    #[serde(default = "new_todo_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub status: TodoStatus,
}

fn new_todo_id() -> String {
    Uuid::new_v4().to_string()
}

/// Shared plan state for one researcher run.
#[derive(Default)]
pub struct TodoStore {
    items: Mutex<Vec<TodoItem>>,
}

impl TodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole plan.
    pub fn write(&self, items: Vec<TodoItem>) {
        *self.items.lock().unwrap() = items;
    }

    pub fn read(&self) -> Vec<TodoItem> {
        self.items.lock().unwrap().clone()
    }
}

#[derive(Debug, Deserialize)]
struct TodoWriteInput {
    todos: Vec<TodoItem>,
}

pub struct TodoWriteTool {
    store: Arc<TodoStore>,
}

impl TodoWriteTool {
    pub fn new(store: Arc<TodoStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for TodoWriteTool {
    fn name(&self) -> &str {
        "todoWrite"
    }

    fn description(&self) -> &str {
        "Write the research plan as a todo list. Replaces the current plan. \
         Draft a plan before searching when the task has multiple angles."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "title": { "type": "string" },
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "completed"]
                            }
                        },
                        "required": ["title"]
                    }
                }
            },
            "required": ["todos"]
        })
    }

    async fn execute(
        &self,
        arguments: Value,
        ctx: ToolContext,
    ) -> Result<ToolEventStream, ToolError> {
        let input: TodoWriteInput = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        self.store.write(input.todos.clone());

        let (tx, rx) = mpsc::channel(2);
        tokio::spawn(async move {
            let todos = serde_json::to_value(&input.todos).unwrap_or(Value::Null);
            let _ = tx
                .send(ToolEvent::InputAvailable {
                    call_id: ctx.call_id.clone(),
                    input: json!({"todos": todos}),
                })
                .await;
            let _ = tx
                .send(ToolEvent::OutputAvailable {
                    call_id: ctx.call_id,
                    output: json!({"todos": todos, "count": input.todos.len()}),
                })
                .await;
        });
        Ok(rx)
    }
}

pub struct TodoReadTool {
    store: Arc<TodoStore>,
}

impl TodoReadTool {
    pub fn new(store: Arc<TodoStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for TodoReadTool {
    fn name(&self) -> &str {
        "todoRead"
    }

    fn description(&self) -> &str {
        "Read the current research plan."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(
        &self,
        _arguments: Value,
        ctx: ToolContext,
    ) -> Result<ToolEventStream, ToolError> {
        let todos = self.store.read();
        let (tx, rx) = mpsc::channel(2);
        tokio::spawn(async move {
            let _ = tx
                .send(ToolEvent::InputAvailable {
                    call_id: ctx.call_id.clone(),
                    input: json!({}),
                })
                .await;
            let _ = tx
                .send(ToolEvent::OutputAvailable {
                    call_id: ctx.call_id,
                    output: json!({"todos": todos}),
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
    async fn write_then_read_roundtrip() {
        let store = Arc::new(TodoStore::new());
        let write = TodoWriteTool::new(Arc::clone(&store));
        let read = TodoReadTool::new(Arc::clone(&store));

        let mut stream = write
            .execute(
                json!({"todos": [
                    {"title": "Survey crates", "status": "in_progress"},
                    {"title": "Compare benchmarks"}
                ]}),
                ToolContext::detached("c1"),
            )
            .await
            .unwrap();
        let _ = stream.recv().await.unwrap();
        match stream.recv().await.unwrap() {
            ToolEvent::OutputAvailable { output, .. } => assert_eq!(output["count"], 2),
            other => panic!("unexpected {other:?}"),
        }

        let mut stream = read
            .execute(json!({}), ToolContext::detached("c2"))
            .await
            .unwrap();
        let _ = stream.recv().await.unwrap();
        match stream.recv().await.unwrap() {
            ToolEvent::OutputAvailable { output, .. } => {
                assert_eq!(output["todos"][0]["title"], "Survey crates");
                assert_eq!(output["todos"][1]["status"], "pending");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn write_replaces_previous_plan() {
        let store = Arc::new(TodoStore::new());
        store.write(vec![TodoItem {
            id: "old".into(),
            title: "Old plan".into(),
            status: TodoStatus::Pending,
        }]);

        let write = TodoWriteTool::new(Arc::clone(&store));
        let mut stream = write
            .execute(
                json!({"todos": [{"title": "New plan"}]}),
                ToolContext::detached("c"),
            )
            .await
            .unwrap();
        while stream.recv().await.is_some() {}

        let items = store.read();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "New plan");
    }

    #[tokio::test]
    async fn malformed_todos_rejected() {
        let store = Arc::new(TodoStore::new());
        let write = TodoWriteTool::new(store);
        let err = write
            .execute(json!({"todos": "not a list"}), ToolContext::detached("c"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
