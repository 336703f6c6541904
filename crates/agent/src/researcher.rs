//! The researcher — a bounded step loop over the model runtime.
//!
//! Each step asks the runtime for one generation round, executes any tool
//! calls it requested (awaiting each tool's full event sequence), folds the
//! results back into the context, and continues until the model stops
//! calling tools, the mode's step budget runs out, or the run is aborted.

use crate::mode::{ModePlan, SearchMode};
use periscope_core::error::{Error, RuntimeError};
use periscope_core::event::{DomainEvent, EventBus};
use periscope_core::message::Message;
use periscope_core::part::{
    DYNAMIC_TOOL_PREFIX, DynamicToolPart, Part, ToolName, ToolOrigin, ToolPart, ToolState,
};
use periscope_core::runtime::{ModelMessage, ModelRuntime, RequestedToolCall, StepRequest, ToolChoice};
use periscope_core::tool::{ToolContext, ToolEvent, ToolRegistry};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// The researcher agent.
pub struct Researcher {
    runtime: Arc<dyn ModelRuntime>,
    tools: Arc<ToolRegistry>,
    event_bus: Arc<EventBus>,
}

impl Researcher {
    /// Construct the researcher from a runtime factory.
    ///
    /// A factory failure is fatal and propagates — there is no silent
    /// fallback model.
    pub fn new<F>(
        runtime_factory: F,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Result<Self, Error>
    where
        F: FnOnce() -> Result<Arc<dyn ModelRuntime>, RuntimeError>,
    {
        let runtime = runtime_factory()?;
        Ok(Self {
            runtime,
            tools,
            event_bus,
        })
    }

    /// Run a full generation over `history` under `mode`.
    ///
    /// Parts are pushed to `sink` as they materialize (when present) and
    /// the final part sequence is returned for persistence. Aborting
    /// preserves whatever was already emitted.
    pub async fn run(
        &self,
        history: &[Message],
        mode: SearchMode,
        abort: watch::Receiver<bool>,
        sink: Option<mpsc::Sender<Part>>,
    ) -> Result<Vec<Part>, Error> {
        let plan = ModePlan::for_mode(mode, sink.is_some());
        let registry = plan.tool_registry(&self.tools);
        let definitions = registry.definitions();

        info!(
            mode = mode.as_str(),
            max_steps = plan.max_steps,
            history = history.len(),
            "Starting researcher run"
        );

        let mut context: Vec<ModelMessage> =
            history.iter().flat_map(ModelMessage::from_message).collect();
        let mut parts: Vec<Part> = Vec::new();

        for step in 0..plan.max_steps {
            let tool_choice = if step == 0 {
                plan.force_first_tool
                    .map(|name| ToolChoice::Tool(name.to_string()))
            } else {
                None
            };

            let request = StepRequest {
                system_prompt: plan.system_prompt.clone(),
                messages: context.clone(),
                tools: definitions.clone(),
                tool_choice,
                abort: abort.clone(),
            };

            let output = tokio::select! {
                _ = aborted(&abort) => {
                    debug!(step, "Run aborted before step");
                    return Ok(parts);
                }
                result = self.runtime.step(request) => result?,
            };

            self.emit(&mut parts, &sink, Part::StepStart).await;

            if !output.text.is_empty() {
                self.emit(
                    &mut parts,
                    &sink,
                    Part::Text {
                        text: output.text.clone(),
                    },
                )
                .await;
            }

            context.push(ModelMessage::Assistant {
                content: output.text.clone(),
                tool_calls: output.tool_calls.clone(),
            });

            if output.tool_calls.is_empty() {
                self.event_bus.publish(DomainEvent::StepCompleted {
                    step,
                    tool_calls: 0,
                    timestamp: chrono::Utc::now(),
                });
                debug!(step, "Run complete: no further tool calls");
                break;
            }

            for call in &output.tool_calls {
                let pending = part_for_call(call);
                if let Some(sink) = &sink {
                    let _ = sink.send(pending.clone()).await;
                }

                let started = std::time::Instant::now();
                let finished = match self
                    .execute_call(&registry, call, &abort, &pending)
                    .await
                {
                    Some(part) => part,
                    None => {
                        // Aborted mid-call: keep the partial part as-is.
                        parts.push(pending);
                        return Ok(parts);
                    }
                };
                let duration_ms = started.elapsed().as_millis() as u64;

                let success = part_state(&finished) == Some(ToolState::OutputAvailable);
                self.event_bus.publish(DomainEvent::ToolExecuted {
                    tool_name: call.name.clone(),
                    success,
                    duration_ms,
                    timestamp: chrono::Utc::now(),
                });

                context.push(tool_result_message(call, &finished));
                self.emit(&mut parts, &sink, finished).await;
            }

            self.event_bus.publish(DomainEvent::StepCompleted {
                step,
                tool_calls: output.tool_calls.len(),
                timestamp: chrono::Utc::now(),
            });
        }

        Ok(parts)
    }

    async fn emit(&self, parts: &mut Vec<Part>, sink: &Option<mpsc::Sender<Part>>, part: Part) {
        if let Some(sink) = sink {
            let _ = sink.send(part.clone()).await;
        }
        parts.push(part);
    }

    /// Execute one tool call, consuming its full event sequence.
    ///
    /// Returns the terminal-state part, or `None` if the run was aborted
    /// mid-call. A tool failure never aborts the surrounding loop; it
    /// becomes an `output-error` part.
    async fn execute_call(
        &self,
        registry: &ToolRegistry,
        call: &RequestedToolCall,
        abort: &watch::Receiver<bool>,
        pending: &Part,
    ) -> Option<Part> {
        let ctx = ToolContext::new(&call.id, abort.clone());
        let mut stream = match registry
            .execute(&call.name, call.arguments.clone(), ctx)
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool invocation rejected");
                return Some(finish_with_error(pending, e.to_string()));
            }
        };

        let mut terminal: Option<ToolEvent> = None;
        loop {
            let event = tokio::select! {
                _ = aborted(abort) => return None,
                event = stream.recv() => event,
            };
            match event {
                None => break,
                Some(event) if event.is_terminal() => terminal = Some(event),
                Some(_) => {}
            }
        }

        Some(match terminal {
            Some(ToolEvent::OutputAvailable { output, .. }) => finish_with_output(pending, output),
            Some(ToolEvent::OutputError { message, .. }) => finish_with_error(pending, message),
            _ => {
                warn!(tool = %call.name, "Tool stream ended without a terminal event");
                finish_with_error(pending, "tool produced no terminal event".to_string())
            }
        })
    }
}

/// Resolves once the abort signal fires; pends forever if it no longer can.
async fn aborted(abort: &watch::Receiver<bool>) {
    let mut rx = abort.clone();
    if *rx.borrow() {
        return;
    }
    while rx.changed().await.is_ok() {
        if *rx.borrow() {
            return;
        }
    }
    std::future::pending::<()>().await
}

/// The `input-available` part for a requested call: statically registered
/// names get a tool part, anything else coalesces into a dynamic part.
fn part_for_call(call: &RequestedToolCall) -> Part {
    match ToolName::parse(&call.name).filter(|n| *n != ToolName::Unknown) {
        Some(name) => Part::Tool(ToolPart::input_available(
            name,
            &call.id,
            call.arguments.clone(),
        )),
        None => {
            let origin = if call.name.starts_with(DYNAMIC_TOOL_PREFIX) {
                ToolOrigin::Mcp
            } else {
                ToolOrigin::Dynamic
            };
            Part::DynamicTool(DynamicToolPart {
                tool_name: call.name.clone(),
                origin,
                call_id: call.id.clone(),
                state: ToolState::InputAvailable,
                input: Some(call.arguments.clone()),
                output: None,
                error_text: None,
            })
        }
    }
}

fn finish_with_output(pending: &Part, output: serde_json::Value) -> Part {
    match pending {
        Part::Tool(tp) => Part::Tool(tp.clone().with_output(output)),
        Part::DynamicTool(dp) => {
            let mut dp = dp.clone();
            dp.state = ToolState::OutputAvailable;
            dp.output = Some(output);
            dp.error_text = None;
            Part::DynamicTool(dp)
        }
        other => other.clone(),
    }
}

fn finish_with_error(pending: &Part, message: String) -> Part {
    match pending {
        Part::Tool(tp) => Part::Tool(tp.clone().with_error(message)),
        Part::DynamicTool(dp) => {
            let mut dp = dp.clone();
            dp.state = ToolState::OutputError;
            dp.output = None;
            dp.error_text = Some(message);
            Part::DynamicTool(dp)
        }
        other => other.clone(),
    }
}

fn part_state(part: &Part) -> Option<ToolState> {
    match part {
        Part::Tool(tp) => Some(tp.state),
        Part::DynamicTool(dp) => Some(dp.state),
        _ => None,
    }
}

/// Fold a finished tool call back into the model context, in call order.
fn tool_result_message(call: &RequestedToolCall, finished: &Part) -> ModelMessage {
    let content = match finished {
        Part::Tool(tp) => match tp.state {
            ToolState::OutputAvailable => tp.output.clone().unwrap_or_default(),
            _ => serde_json::json!({"error": tp.error_text}),
        },
        Part::DynamicTool(dp) => match dp.state {
            ToolState::OutputAvailable => dp.output.clone().unwrap_or_default(),
            _ => serde_json::json!({"error": dp.error_text}),
        },
        _ => serde_json::Value::Null,
    };
    ModelMessage::ToolResult {
        call_id: call.id.clone(),
        content,
    }
}
