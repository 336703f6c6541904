//! SQLite chat store.
//!
//! Uses a single SQLite database file with four tables:
//! - `chats`    — conversation roots with owner and visibility
//! - `messages` — ordered messages per chat
//! - `parts`    — flattened part rows (see [`crate::row::PartRow`])
//! - `feedback` — append-only product feedback
//!
//! Cascade deletes flow chat → messages → parts. Check constraints enforce
//! per-variant required-field presence at the row level, beneath the codec.
//! Every read/write is authorized against the chat's owner, or read-only
//! against `public` visibility.

use crate::codec;
use crate::row::PartRow;
use chrono::{DateTime, Utc};
use periscope_core::error::{Error, StorageError};
use periscope_core::message::{
    Chat, ChatId, Feedback, Message, MessageId, Role, UserId, Visibility,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// A SQLite-backed store for chats, messages, parts, and feedback.
pub struct ChatStore {
    pool: SqlitePool,
}

impl ChatStore {
    /// Create a new store from a file path.
    ///
    /// The database and all tables are created automatically.
    /// Pass `":memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StorageError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("Chat store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chats (
                id          TEXT PRIMARY KEY,
                created_at  TEXT NOT NULL,
                title       TEXT NOT NULL,
                user_id     TEXT NOT NULL,
                visibility  TEXT NOT NULL DEFAULT 'private'
                            CHECK (visibility IN ('private', 'public'))
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("chats table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id          TEXT PRIMARY KEY,
                chat_id     TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
                role        TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                metadata    TEXT NOT NULL DEFAULT '{}',
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS parts (
                id          TEXT PRIMARY KEY,
                message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                "order"     INTEGER NOT NULL,
                type        TEXT NOT NULL,
                text_content                TEXT,
                reasoning_content           TEXT,
                file_media_type             TEXT,
                file_filename               TEXT,
                file_url                    TEXT,
                source_url_source_id        TEXT,
                source_url_url              TEXT,
                source_url_title            TEXT,
                source_document_source_id   TEXT,
                source_document_media_type  TEXT,
                source_document_title       TEXT,
                source_document_filename    TEXT,
                tool_call_id                TEXT,
                tool_state                  TEXT,
                tool_error_text             TEXT,
                tool_search_input           TEXT,
                tool_search_output          TEXT,
                tool_fetch_input            TEXT,
                tool_fetch_output           TEXT,
                tool_question_input         TEXT,
                tool_question_output        TEXT,
                tool_todo_write_input       TEXT,
                tool_todo_write_output      TEXT,
                tool_todo_read_input        TEXT,
                tool_todo_read_output       TEXT,
                dynamic_tool_name           TEXT,
                dynamic_tool_origin         TEXT,
                dynamic_tool_input          TEXT,
                dynamic_tool_output         TEXT,
                data_prefix                 TEXT,
                data_id                     TEXT,
                data_content                TEXT,
                provider_metadata           TEXT,
                created_at                  TEXT NOT NULL,
                CHECK (tool_state IS NULL OR tool_state IN
                    ('input-streaming', 'input-available', 'output-available', 'output-error')),
                CHECK (type != 'text' OR text_content IS NOT NULL),
                CHECK (type != 'reasoning' OR reasoning_content IS NOT NULL),
                CHECK (type != 'file' OR file_url IS NOT NULL),
                CHECK (type != 'source-url' OR source_url_url IS NOT NULL),
                CHECK (type NOT LIKE 'tool-%' OR
                    (tool_call_id IS NOT NULL AND tool_state IS NOT NULL)),
                CHECK (type != 'tool-dynamic' OR
                    (dynamic_tool_name IS NOT NULL AND dynamic_tool_origin IS NOT NULL)),
                CHECK (type NOT LIKE 'data-%' OR data_content IS NOT NULL)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("parts table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feedback (
                id          TEXT PRIMARY KEY,
                user_id     TEXT,
                sentiment   TEXT NOT NULL CHECK (sentiment IN ('positive', 'negative')),
                message     TEXT NOT NULL,
                page_url    TEXT NOT NULL,
                user_agent  TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("feedback table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_chat_created
             ON messages(chat_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("messages index: {e}")))?;

        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_parts_message_order
             ON parts(message_id, "order")"#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("parts index: {e}")))?;

        debug!("Chat store migrations complete");
        Ok(())
    }

    // --- access policy ---

    async fn chat_owner(
        &self,
        chat_id: &ChatId,
    ) -> Result<Option<(UserId, Visibility)>, StorageError> {
        let row = sqlx::query("SELECT user_id, visibility FROM chats WHERE id = ?")
            .bind(chat_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("chat lookup: {e}")))?;

        Ok(row.map(|r| {
            let user_id: String = r.get("user_id");
            let visibility: String = r.get("visibility");
            (
                UserId(user_id),
                Visibility::parse(&visibility).unwrap_or(Visibility::Private),
            )
        }))
    }

    async fn require_read(&self, accessor: &UserId, chat_id: &ChatId) -> Result<(), StorageError> {
        match self.chat_owner(chat_id).await? {
            None => Err(StorageError::QueryFailed(format!(
                "chat not found: {chat_id}"
            ))),
            Some((owner, _)) if owner == *accessor => Ok(()),
            Some((_, Visibility::Public)) => Ok(()),
            Some(_) => Err(StorageError::AccessDenied {
                user_id: accessor.to_string(),
                action: "read".into(),
                chat_id: chat_id.to_string(),
            }),
        }
    }

    async fn require_write(&self, accessor: &UserId, chat_id: &ChatId) -> Result<(), StorageError> {
        match self.chat_owner(chat_id).await? {
            None => Err(StorageError::QueryFailed(format!(
                "chat not found: {chat_id}"
            ))),
            Some((owner, _)) if owner == *accessor => Ok(()),
            Some(_) => Err(StorageError::AccessDenied {
                user_id: accessor.to_string(),
                action: "write".into(),
                chat_id: chat_id.to_string(),
            }),
        }
    }

    // --- chats ---

    pub async fn create_chat(&self, chat: &Chat) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO chats (id, created_at, title, user_id, visibility)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(chat.id.as_str())
        .bind(chat.created_at.to_rfc3339())
        .bind(&chat.title)
        .bind(chat.user_id.as_str())
        .bind(chat.visibility.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("create chat: {e}")))?;
        Ok(())
    }

    pub async fn chat_exists(&self, chat_id: &ChatId) -> Result<bool, StorageError> {
        Ok(self.chat_owner(chat_id).await?.is_some())
    }

    pub async fn get_chat(
        &self,
        accessor: &UserId,
        chat_id: &ChatId,
    ) -> Result<Option<Chat>, StorageError> {
        let row = sqlx::query("SELECT * FROM chats WHERE id = ?")
            .bind(chat_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("get chat: {e}")))?;

        let Some(row) = row else { return Ok(None) };
        let chat = row_to_chat(&row)?;
        if chat.user_id != *accessor && chat.visibility != Visibility::Public {
            return Err(StorageError::AccessDenied {
                user_id: accessor.to_string(),
                action: "read".into(),
                chat_id: chat_id.to_string(),
            });
        }
        Ok(Some(chat))
    }

    pub async fn set_title(
        &self,
        accessor: &UserId,
        chat_id: &ChatId,
        title: &str,
    ) -> Result<(), StorageError> {
        self.require_write(accessor, chat_id).await?;
        sqlx::query("UPDATE chats SET title = ? WHERE id = ?")
            .bind(title)
            .bind(chat_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("set title: {e}")))?;
        Ok(())
    }

    pub async fn set_visibility(
        &self,
        accessor: &UserId,
        chat_id: &ChatId,
        visibility: Visibility,
    ) -> Result<(), StorageError> {
        self.require_write(accessor, chat_id).await?;
        sqlx::query("UPDATE chats SET visibility = ? WHERE id = ?")
            .bind(visibility.as_str())
            .bind(chat_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("set visibility: {e}")))?;
        Ok(())
    }

    pub async fn list_chats(&self, accessor: &UserId) -> Result<Vec<Chat>, StorageError> {
        let rows = sqlx::query("SELECT * FROM chats WHERE user_id = ? ORDER BY created_at DESC")
            .bind(accessor.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("list chats: {e}")))?;
        rows.iter().map(row_to_chat).collect()
    }

    // --- messages & parts ---

    /// Persist a message and its parts, replacing any existing row with the
    /// same message id. Parts are re-encoded and re-ordered densely.
    pub async fn upsert_message(
        &self,
        accessor: &UserId,
        message: &Message,
    ) -> Result<(), StorageError> {
        self.require_write(accessor, &message.chat_id).await?;

        let rows = codec::encode(&message.parts, &message.id);
        let metadata = serde_json::to_string(&message.metadata)
            .map_err(|e| StorageError::QueryFailed(format!("metadata: {e}")))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::QueryFailed(format!("begin: {e}")))?;

        // REPLACE deletes any old message row, cascading its parts away.
        sqlx::query(
            "INSERT OR REPLACE INTO messages (id, chat_id, role, metadata, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(message.id.as_str())
        .bind(message.chat_id.as_str())
        .bind(message.role.as_str())
        .bind(&metadata)
        .bind(message.created_at.to_rfc3339())
        .bind(message.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("upsert message: {e}")))?;

        // The REPLACE above cascades old parts away, but only when it hit a
        // conflict; clear explicitly so re-encoded parts never accumulate.
        sqlx::query("DELETE FROM parts WHERE message_id = ?")
            .bind(message.id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("clear parts: {e}")))?;

        let placeholders = vec!["?"; PartRow::COLUMN_COUNT].join(", ");
        let insert = format!(
            "INSERT INTO parts ({}) VALUES ({placeholders})",
            PartRow::COLUMNS
        );
        for row in &rows {
            bind_part_row(sqlx::query(&insert), row)
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::QueryFailed(format!("insert part: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::QueryFailed(format!("commit: {e}")))?;

        debug!(
            message_id = %message.id,
            parts = rows.len(),
            "Persisted message"
        );
        Ok(())
    }

    /// Load a chat's full message history in order, parts decoded.
    pub async fn load_messages(
        &self,
        accessor: &UserId,
        chat_id: &ChatId,
    ) -> Result<Vec<Message>, Error> {
        self.require_read(accessor, chat_id).await?;

        let message_rows = sqlx::query(
            "SELECT * FROM messages WHERE chat_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(chat_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("load messages: {e}")))?;

        let mut messages = Vec::with_capacity(message_rows.len());
        for row in &message_rows {
            let mut message = row_to_message(row, chat_id)?;
            let part_rows: Vec<PartRow> = sqlx::query_as(
                r#"SELECT * FROM parts WHERE message_id = ? ORDER BY "order" ASC"#,
            )
            .bind(message.id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("load parts: {e}")))?;

            message.parts = codec::decode(&part_rows)?;
            messages.push(message);
        }
        Ok(messages)
    }

    /// Merge keys into a message's metadata map.
    ///
    /// The only mutation a message supports once its parts are written.
    pub async fn merge_message_metadata(
        &self,
        accessor: &UserId,
        chat_id: &ChatId,
        message_id: &MessageId,
        updates: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), StorageError> {
        self.require_write(accessor, chat_id).await?;

        let row = sqlx::query("SELECT metadata FROM messages WHERE id = ? AND chat_id = ?")
            .bind(message_id.as_str())
            .bind(chat_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("read metadata: {e}")))?
            .ok_or_else(|| {
                StorageError::QueryFailed(format!("message not found: {message_id}"))
            })?;

        let raw: String = row.get("metadata");
        let mut metadata: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&raw).unwrap_or_default();
        for (key, value) in updates {
            metadata.insert(key.clone(), value.clone());
        }
        let merged = serde_json::to_string(&metadata)
            .map_err(|e| StorageError::QueryFailed(format!("metadata: {e}")))?;

        sqlx::query("UPDATE messages SET metadata = ?, updated_at = ? WHERE id = ?")
            .bind(&merged)
            .bind(Utc::now().to_rfc3339())
            .bind(message_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("merge metadata: {e}")))?;
        Ok(())
    }

    /// Delete the given messages (and, by cascade, their parts).
    pub async fn delete_messages(
        &self,
        accessor: &UserId,
        chat_id: &ChatId,
        ids: &[MessageId],
    ) -> Result<(), StorageError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.require_write(accessor, chat_id).await?;

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql =
            format!("DELETE FROM messages WHERE chat_id = ? AND id IN ({placeholders})");
        let mut query = sqlx::query(&sql).bind(chat_id.as_str());
        for id in ids {
            query = query.bind(id.as_str());
        }
        query
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(format!("delete messages: {e}")))?;
        Ok(())
    }

    // --- feedback ---

    pub async fn save_feedback(&self, feedback: &Feedback) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO feedback (id, user_id, sentiment, message, page_url, user_agent, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&feedback.id)
        .bind(feedback.user_id.as_ref().map(|u| u.as_str()))
        .bind(feedback.sentiment.as_str())
        .bind(&feedback.message)
        .bind(&feedback.page_url)
        .bind(&feedback.user_agent)
        .bind(feedback.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("save feedback: {e}")))?;
        Ok(())
    }
}

fn parse_timestamp(raw: &str, field: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::QueryFailed(format!("bad {field} timestamp: {e}")))
}

fn row_to_chat(row: &sqlx::sqlite::SqliteRow) -> Result<Chat, StorageError> {
    let visibility: String = row.get("visibility");
    Ok(Chat {
        id: ChatId(row.get("id")),
        created_at: parse_timestamp(row.get::<String, _>("created_at").as_str(), "chat")?,
        title: row.get("title"),
        user_id: UserId(row.get("user_id")),
        visibility: Visibility::parse(&visibility).unwrap_or(Visibility::Private),
    })
}

fn row_to_message(
    row: &sqlx::sqlite::SqliteRow,
    chat_id: &ChatId,
) -> Result<Message, StorageError> {
    let role: String = row.get("role");
    let metadata: String = row.get("metadata");
    Ok(Message {
        id: MessageId(row.get("id")),
        chat_id: chat_id.clone(),
        role: Role::parse(&role)
            .ok_or_else(|| StorageError::QueryFailed(format!("bad role: {role}")))?,
        parts: Vec::new(),
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
        created_at: parse_timestamp(row.get::<String, _>("created_at").as_str(), "message")?,
        updated_at: parse_timestamp(row.get::<String, _>("updated_at").as_str(), "message")?,
    })
}

fn bind_part_row<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    row: &'q PartRow,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(&row.id)
        .bind(&row.message_id)
        .bind(row.order)
        .bind(&row.part_type)
        .bind(&row.text_content)
        .bind(&row.reasoning_content)
        .bind(&row.file_media_type)
        .bind(&row.file_filename)
        .bind(&row.file_url)
        .bind(&row.source_url_source_id)
        .bind(&row.source_url_url)
        .bind(&row.source_url_title)
        .bind(&row.source_document_source_id)
        .bind(&row.source_document_media_type)
        .bind(&row.source_document_title)
        .bind(&row.source_document_filename)
        .bind(&row.tool_call_id)
        .bind(&row.tool_state)
        .bind(&row.tool_error_text)
        .bind(&row.tool_search_input)
        .bind(&row.tool_search_output)
        .bind(&row.tool_fetch_input)
        .bind(&row.tool_fetch_output)
        .bind(&row.tool_question_input)
        .bind(&row.tool_question_output)
        .bind(&row.tool_todo_write_input)
        .bind(&row.tool_todo_write_output)
        .bind(&row.tool_todo_read_input)
        .bind(&row.tool_todo_read_output)
        .bind(&row.dynamic_tool_name)
        .bind(&row.dynamic_tool_origin)
        .bind(&row.dynamic_tool_input)
        .bind(&row.dynamic_tool_output)
        .bind(&row.data_prefix)
        .bind(&row.data_id)
        .bind(&row.data_content)
        .bind(&row.provider_metadata)
        .bind(&row.created_at)
}
