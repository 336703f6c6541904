//! Bidirectional mapping between message parts and their flattened row shape.
//!
//! `encode` turns an in-memory part sequence into rows ready for insertion;
//! `decode` reconstructs parts from persisted rows. The mapping is an
//! explicit variant-keyed dispatch — one arm per type tag — so adding a tool
//! is a registry entry, not a schema-wide change.
//!
//! Validation failures on encode (a malformed tool-call event) drop the
//! offending part and continue. Corruption on decode (a tool row whose state
//! is null or outside the closed set) is fatal.

use crate::row::PartRow;
use periscope_core::error::CodecError;
use periscope_core::message::MessageId;
use periscope_core::part::{
    DYNAMIC_TOOL_PREFIX, DynamicToolPart, Part, ToolName, ToolOrigin, ToolPart, ToolState,
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

fn json_text(value: &Value) -> Option<String> {
    serde_json::to_string(value).ok()
}

fn parse_json(text: &Option<String>) -> Option<Value> {
    text.as_ref().and_then(|t| serde_json::from_str(t).ok())
}

/// Encode a part sequence into rows for `message_id`.
///
/// Transient step-tracking parts are dropped; malformed tool-call events are
/// logged and dropped; every surviving row is re-assigned a dense zero-based
/// `order` reflecting its final position.
pub fn encode(parts: &[Part], message_id: &MessageId) -> Vec<PartRow> {
    // Join maps for bare tool-result events: call id -> name / args from the
    // preceding call event in the same batch.
    let mut call_names: HashMap<&str, String> = HashMap::new();
    let mut call_args: HashMap<&str, Value> = HashMap::new();
    for part in parts {
        match part {
            Part::ToolCall {
                call_id: Some(id),
                tool_name: Some(name),
                args,
            } => {
                call_names.insert(id, name.clone());
                if let Some(args) = args {
                    call_args.insert(id, args.clone());
                }
            }
            Part::Tool(tp) => {
                call_names.insert(&tp.call_id, tp.name.as_str().to_string());
                if let Some(input) = &tp.input {
                    call_args.insert(&tp.call_id, input.clone());
                }
            }
            Part::DynamicTool(dp) => {
                call_names.insert(&dp.call_id, dp.tool_name.clone());
                if let Some(input) = &dp.input {
                    call_args.insert(&dp.call_id, input.clone());
                }
            }
            _ => {}
        }
    }

    let mut rows: Vec<PartRow> = Vec::with_capacity(parts.len());
    for part in parts {
        if let Some(row) = encode_one(part, message_id, &call_names, &call_args) {
            rows.push(row);
        }
    }

    // Dense zero-based order over the surviving rows; dropped entries must
    // not leave gaps.
    for (index, row) in rows.iter_mut().enumerate() {
        row.order = index as i64;
    }
    rows
}

fn base_row(part_type: impl Into<String>, message_id: &MessageId) -> PartRow {
    PartRow {
        id: Uuid::new_v4().to_string(),
        message_id: message_id.to_string(),
        order: 0,
        part_type: part_type.into(),
        created_at: chrono::Utc::now().to_rfc3339(),
        ..PartRow::default()
    }
}

fn encode_one(
    part: &Part,
    message_id: &MessageId,
    call_names: &HashMap<&str, String>,
    call_args: &HashMap<&str, Value>,
) -> Option<PartRow> {
    match part {
        Part::Text { text } => {
            let mut row = base_row("text", message_id);
            row.text_content = Some(text.clone());
            Some(row)
        }

        Part::Reasoning { text } => {
            let mut row = base_row("reasoning", message_id);
            row.reasoning_content = Some(text.clone());
            Some(row)
        }

        Part::File {
            media_type,
            filename,
            url,
        } => {
            let mut row = base_row("file", message_id);
            row.file_media_type = Some(media_type.clone());
            row.file_filename = Some(filename.clone());
            row.file_url = Some(url.clone());
            Some(row)
        }

        Part::SourceUrl {
            source_id,
            url,
            title,
        } => {
            let mut row = base_row("source-url", message_id);
            row.source_url_source_id = Some(source_id.clone());
            row.source_url_url = Some(url.clone());
            row.source_url_title = Some(title.clone());
            Some(row)
        }

        Part::SourceDocument {
            source_id,
            media_type,
            title,
            filename,
        } => {
            let mut row = base_row("source-document", message_id);
            row.source_document_source_id = Some(source_id.clone());
            row.source_document_media_type = Some(media_type.clone());
            row.source_document_title = Some(title.clone());
            row.source_document_filename = filename.clone();
            Some(row)
        }

        Part::Tool(tp) => Some(encode_tool_part(tp, message_id)),

        Part::DynamicTool(dp) => Some(encode_dynamic_part(dp, message_id)),

        Part::Data {
            prefix,
            id,
            content,
        } => {
            let mut row = base_row(format!("data-{prefix}"), message_id);
            row.data_prefix = Some(prefix.clone());
            row.data_id = id.clone();
            row.data_content = json_text(content);
            Some(row)
        }

        Part::StepStart => Some(base_row("step-start", message_id)),

        // Transient step tracking carries no durable state.
        Part::StepResult | Part::StepContinue | Part::StepFinish => None,

        Part::ToolCall {
            call_id,
            tool_name,
            args,
        } => {
            let (Some(call_id), Some(tool_name), Some(args)) = (call_id, tool_name, args) else {
                warn!(
                    call_id = call_id.as_deref().unwrap_or("<missing>"),
                    tool_name = tool_name.as_deref().unwrap_or("<missing>"),
                    "Dropping malformed tool-call part"
                );
                return None;
            };
            Some(encode_named_call(
                tool_name,
                call_id,
                Some(args.clone()),
                None,
                message_id,
            ))
        }

        Part::ToolResult { call_id, output } => {
            let Some(name) = call_names.get(call_id.as_str()) else {
                // Recoverable: a result with no matching call in the batch
                // persists under the reserved fallback identity.
                warn!(call_id = %call_id, "Tool result has no matching call; mapping to tool-unknown");
                let mut row = base_row("tool-unknown", message_id);
                row.tool_call_id = Some(call_id.clone());
                row.tool_state = Some(ToolState::OutputAvailable.as_str().into());
                return Some(row);
            };
            Some(encode_named_call(
                name,
                call_id,
                call_args.get(call_id.as_str()).cloned(),
                Some(output.clone()),
                message_id,
            ))
        }
    }
}

/// Row for a call/result pair addressed by a raw tool name string.
///
/// Known names take their dedicated column pair; namespaced or otherwise
/// unregistered names coalesce into the dynamic row shape.
fn encode_named_call(
    tool_name: &str,
    call_id: &str,
    input: Option<Value>,
    output: Option<Value>,
    message_id: &MessageId,
) -> PartRow {
    let state = if output.is_some() {
        ToolState::OutputAvailable
    } else {
        ToolState::InputAvailable
    };

    if let Some(name) = ToolName::parse(tool_name).filter(|n| *n != ToolName::Unknown) {
        return encode_tool_part(
            &ToolPart {
                name,
                call_id: call_id.to_string(),
                state,
                input,
                output,
                error_text: None,
            },
            message_id,
        );
    }

    let origin = if tool_name.starts_with(DYNAMIC_TOOL_PREFIX) {
        ToolOrigin::Mcp
    } else {
        ToolOrigin::Dynamic
    };
    encode_dynamic_part(
        &DynamicToolPart {
            tool_name: tool_name.to_string(),
            origin,
            call_id: call_id.to_string(),
            state,
            input,
            output,
            error_text: None,
        },
        message_id,
    )
}

fn encode_tool_part(tp: &ToolPart, message_id: &MessageId) -> PartRow {
    let mut row = base_row(format!("tool-{}", tp.name), message_id);
    row.tool_call_id = Some(tp.call_id.clone());
    row.tool_state = Some(tp.state.as_str().into());
    row.tool_error_text = tp.error_text.clone();

    let input = tp.input.as_ref().and_then(json_text);
    let output = tp.output.as_ref().and_then(json_text);
    match tp.name {
        ToolName::Search => {
            row.tool_search_input = input;
            row.tool_search_output = output;
        }
        ToolName::Fetch => {
            row.tool_fetch_input = input;
            row.tool_fetch_output = output;
        }
        ToolName::Question => {
            row.tool_question_input = input;
            row.tool_question_output = output;
        }
        ToolName::TodoWrite => {
            row.tool_todo_write_input = input;
            row.tool_todo_write_output = output;
        }
        ToolName::TodoRead => {
            row.tool_todo_read_input = input;
            row.tool_todo_read_output = output;
        }
        // No payload columns exist for a tool that was never registered.
        ToolName::Unknown => {}
    }
    row
}

fn encode_dynamic_part(dp: &DynamicToolPart, message_id: &MessageId) -> PartRow {
    let mut row = base_row("tool-dynamic", message_id);
    row.tool_call_id = Some(dp.call_id.clone());
    row.tool_state = Some(dp.state.as_str().into());
    row.tool_error_text = dp.error_text.clone();
    row.dynamic_tool_name = Some(dp.tool_name.clone());
    row.dynamic_tool_origin = Some(dp.origin.as_str().into());
    row.dynamic_tool_input = dp.input.as_ref().and_then(json_text);
    row.dynamic_tool_output = dp.output.as_ref().and_then(json_text);
    row
}

/// Decode persisted rows back into parts.
///
/// Rows are expected in ascending `order`. A tool row with a null state, or
/// a state outside the closed set, is corruption and fails the whole decode.
pub fn decode(rows: &[PartRow]) -> Result<Vec<Part>, CodecError> {
    rows.iter().map(decode_one).collect()
}

fn decode_one(row: &PartRow) -> Result<Part, CodecError> {
    match row.part_type.as_str() {
        "text" => Ok(Part::Text {
            text: row.text_content.clone().unwrap_or_default(),
        }),

        "reasoning" => Ok(Part::Reasoning {
            text: row.reasoning_content.clone().unwrap_or_default(),
        }),

        "file" => Ok(Part::File {
            media_type: row.file_media_type.clone().unwrap_or_default(),
            filename: row.file_filename.clone().unwrap_or_default(),
            url: row.file_url.clone().unwrap_or_default(),
        }),

        "source-url" => Ok(Part::SourceUrl {
            source_id: row.source_url_source_id.clone().unwrap_or_default(),
            url: row.source_url_url.clone().unwrap_or_default(),
            title: row.source_url_title.clone().unwrap_or_default(),
        }),

        "source-document" => Ok(Part::SourceDocument {
            source_id: row.source_document_source_id.clone().unwrap_or_default(),
            media_type: row.source_document_media_type.clone().unwrap_or_default(),
            title: row.source_document_title.clone().unwrap_or_default(),
            filename: row.source_document_filename.clone(),
        }),

        "step-start" => Ok(Part::StepStart),

        "tool-dynamic" => {
            let state = decode_state(row)?;
            let (input, output, error_text) = surface_fields(
                state,
                parse_json(&row.dynamic_tool_input),
                parse_json(&row.dynamic_tool_output),
                row.tool_error_text.clone(),
            );
            Ok(Part::DynamicTool(DynamicToolPart {
                tool_name: row.dynamic_tool_name.clone().unwrap_or_default(),
                origin: row
                    .dynamic_tool_origin
                    .as_deref()
                    .and_then(ToolOrigin::parse)
                    .unwrap_or(ToolOrigin::Dynamic),
                call_id: row.tool_call_id.clone().unwrap_or_default(),
                state,
                input,
                output,
                error_text,
            }))
        }

        other => {
            if let Some(suffix) = other.strip_prefix("tool-") {
                if let Some(name) = ToolName::parse(suffix) {
                    return decode_tool_row(row, name);
                }
            }
            if let Some(suffix) = other.strip_prefix("data-") {
                return Ok(Part::Data {
                    prefix: row
                        .data_prefix
                        .clone()
                        .unwrap_or_else(|| suffix.to_string()),
                    id: row.data_id.clone(),
                    content: parse_json(&row.data_content).unwrap_or(Value::Null),
                });
            }
            // A type tag this build does not know: pass it through rather
            // than failing the whole message.
            Ok(Part::Data {
                prefix: other.to_string(),
                id: row.data_id.clone(),
                content: parse_json(&row.data_content).unwrap_or(Value::Null),
            })
        }
    }
}

fn decode_tool_row(row: &PartRow, name: ToolName) -> Result<Part, CodecError> {
    let state = decode_state(row)?;
    let (raw_input, raw_output) = match name {
        ToolName::Search => (&row.tool_search_input, &row.tool_search_output),
        ToolName::Fetch => (&row.tool_fetch_input, &row.tool_fetch_output),
        ToolName::Question => (&row.tool_question_input, &row.tool_question_output),
        ToolName::TodoWrite => (&row.tool_todo_write_input, &row.tool_todo_write_output),
        ToolName::TodoRead => (&row.tool_todo_read_input, &row.tool_todo_read_output),
        ToolName::Unknown => (&None, &None),
    };
    let (input, output, error_text) = surface_fields(
        state,
        parse_json(raw_input),
        parse_json(raw_output),
        row.tool_error_text.clone(),
    );
    Ok(Part::Tool(ToolPart {
        name,
        call_id: row.tool_call_id.clone().unwrap_or_default(),
        state,
        input,
        output,
        error_text,
    }))
}

fn decode_state(row: &PartRow) -> Result<ToolState, CodecError> {
    let raw = row.tool_state.as_deref().ok_or_else(|| {
        CodecError::MalformedPart(format!(
            "tool row {} ({}) has null state",
            row.id, row.part_type
        ))
    })?;
    ToolState::parse(raw).ok_or_else(|| {
        CodecError::MalformedPart(format!(
            "tool row {} ({}) has state '{raw}' outside the closed set",
            row.id, row.part_type
        ))
    })
}

/// State decides which of input/output/error_text surface on decode.
fn surface_fields(
    state: ToolState,
    input: Option<Value>,
    output: Option<Value>,
    error_text: Option<String>,
) -> (Option<Value>, Option<Value>, Option<String>) {
    match state {
        ToolState::InputStreaming | ToolState::InputAvailable => (input, None, None),
        ToolState::OutputAvailable => (input, output, None),
        ToolState::OutputError => (input, None, error_text),
    }
}
