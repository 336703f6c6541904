//! The flattened relational shape of a message part.
//!
//! One statically-shaped row holds every part variant: shared columns plus
//! nullable variant-specific column groups. Known tools each get their own
//! input/output column pair; dynamically-named tools collapse into the
//! `dynamic_tool_*` group since the schema cannot grow a column set per
//! runtime-discovered name.

use sqlx::FromRow;

/// A single row of the `parts` table.
#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct PartRow {
    pub id: String,
    pub message_id: String,
    /// Dense, zero-based position within the owning message.
    pub order: i64,
    /// Type tag, e.g. `text`, `tool-search`, `tool-dynamic`, `data-weather`.
    #[sqlx(rename = "type")]
    pub part_type: String,

    // text / reasoning
    pub text_content: Option<String>,
    pub reasoning_content: Option<String>,

    // file
    pub file_media_type: Option<String>,
    pub file_filename: Option<String>,
    pub file_url: Option<String>,

    // source-url
    pub source_url_source_id: Option<String>,
    pub source_url_url: Option<String>,
    pub source_url_title: Option<String>,

    // source-document
    pub source_document_source_id: Option<String>,
    pub source_document_media_type: Option<String>,
    pub source_document_title: Option<String>,
    pub source_document_filename: Option<String>,

    // shared tool columns
    pub tool_call_id: Option<String>,
    pub tool_state: Option<String>,
    pub tool_error_text: Option<String>,

    // per-tool input/output payloads (JSON text)
    pub tool_search_input: Option<String>,
    pub tool_search_output: Option<String>,
    pub tool_fetch_input: Option<String>,
    pub tool_fetch_output: Option<String>,
    pub tool_question_input: Option<String>,
    pub tool_question_output: Option<String>,
    pub tool_todo_write_input: Option<String>,
    pub tool_todo_write_output: Option<String>,
    pub tool_todo_read_input: Option<String>,
    pub tool_todo_read_output: Option<String>,

    // dynamic tool (identity is data, not schema shape)
    pub dynamic_tool_name: Option<String>,
    pub dynamic_tool_origin: Option<String>,
    pub dynamic_tool_input: Option<String>,
    pub dynamic_tool_output: Option<String>,

    // generic data passthrough
    pub data_prefix: Option<String>,
    pub data_id: Option<String>,
    pub data_content: Option<String>,

    pub provider_metadata: Option<String>,
    pub created_at: String,
}

impl PartRow {
    /// Column list for INSERT statements, in bind order.
    pub const COLUMNS: &'static str = r#"id, message_id, "order", type,
        text_content, reasoning_content,
        file_media_type, file_filename, file_url,
        source_url_source_id, source_url_url, source_url_title,
        source_document_source_id, source_document_media_type,
        source_document_title, source_document_filename,
        tool_call_id, tool_state, tool_error_text,
        tool_search_input, tool_search_output,
        tool_fetch_input, tool_fetch_output,
        tool_question_input, tool_question_output,
        tool_todo_write_input, tool_todo_write_output,
        tool_todo_read_input, tool_todo_read_output,
        dynamic_tool_name, dynamic_tool_origin,
        dynamic_tool_input, dynamic_tool_output,
        data_prefix, data_id, data_content,
        provider_metadata, created_at"#;

    /// Number of columns in [`Self::COLUMNS`].
    pub const COLUMN_COUNT: usize = 38;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_list_matches_count() {
        let listed = PartRow::COLUMNS.split(',').count();
        assert_eq!(listed, PartRow::COLUMN_COUNT);
    }
}
