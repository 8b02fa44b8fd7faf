// ABOUTME: Persistent conversation and message storage for the chat service using SQLite.
// ABOUTME: Pairs are stored normalized so either participant order resolves to one conversation.
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use portal_chat_core::model::ordered_pair;
use portal_chat_core::{Conversation, Message, MessageBody, MessageKind};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

const CONVERSATION_COLUMNS: &str = "id, participant_a, participant_b, created_at";
const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, receiver_id, content, kind, action, created_at, read_at";

/// Fixed-width UTC timestamps so text ordering matches time ordering
fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_conversation(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    let created_at: String = row.get(3)?;
    Ok(Conversation {
        id: row.get(0)?,
        participant_a: row.get(1)?,
        participant_b: row.get(2)?,
        created_at: parse_timestamp(3, &created_at)?,
    })
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    let kind: String = row.get(5)?;
    let kind: MessageKind = kind
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
    let body = MessageBody::from_parts(kind, row.get(4)?, row.get(6)?)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
    let created_at: String = row.get(7)?;
    let read_at: Option<String> = row.get(8)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        body,
        created_at: parse_timestamp(7, &created_at)?,
        read_at: read_at.map(|raw| parse_timestamp(8, &raw)).transpose()?,
    })
}

fn query_message(db: &Connection, message_id: &str) -> Result<Option<Message>> {
    let sql = format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS);
    let message = db
        .query_row(&sql, params![message_id], row_to_message)
        .optional()
        .context("Failed to query message")?;
    Ok(message)
}

#[derive(Clone)]
pub struct ChatStore {
    db: Arc<Mutex<Connection>>,
}

impl ChatStore {
    /// Open (or create) `chat.db` inside `data_dir`
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        Self::open(data_dir.as_ref().join("chat.db"))
    }

    /// Open (or create) the database file at `db_path`, creating its parent directory
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create data directory")?;
        }

        let conn = Connection::open(db_path).context("Failed to open SQLite database")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                participant_a TEXT NOT NULL,
                participant_b TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (participant_a, participant_b)
            )",
            [],
        )?;

        // seq breaks ties between messages created in the same microsecond
        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                sender_id TEXT NOT NULL,
                receiver_id TEXT NOT NULL,
                content TEXT NOT NULL,
                kind TEXT NOT NULL,
                action TEXT,
                created_at TEXT NOT NULL,
                read_at TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation
             ON messages (conversation_id, created_at, seq)",
            [],
        )?;

        tracing::info!(db = %db_path.display(), "ChatStore initialized");

        Ok(ChatStore {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))
    }

    /// Return the conversation for the unordered pair, creating it if absent.
    /// The bool is true when this call created the row.
    pub fn get_or_create_conversation(
        &self,
        first: &str,
        second: &str,
    ) -> Result<(Conversation, bool)> {
        let (participant_a, participant_b) = ordered_pair(first, second);
        let db = self.conn()?;

        let inserted = db.execute(
            "INSERT INTO conversations (id, participant_a, participant_b, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (participant_a, participant_b) DO NOTHING",
            params![
                uuid::Uuid::new_v4().to_string(),
                participant_a,
                participant_b,
                format_timestamp(&Utc::now()),
            ],
        )?;

        let sql = format!(
            "SELECT {} FROM conversations WHERE participant_a = ?1 AND participant_b = ?2",
            CONVERSATION_COLUMNS
        );
        let conversation = db
            .query_row(&sql, params![participant_a, participant_b], row_to_conversation)
            .context("Failed to read conversation after upsert")?;

        if inserted > 0 {
            tracing::info!(
                conversation_id = %conversation.id,
                participant_a = %participant_a,
                participant_b = %participant_b,
                "Conversation created"
            );
        }

        Ok((conversation, inserted > 0))
    }

    pub fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        let db = self.conn()?;
        let sql = format!("SELECT {} FROM conversations WHERE id = ?1", CONVERSATION_COLUMNS);
        let conversation = db.query_row(&sql, params![conversation_id], row_to_conversation);

        match conversation {
            Ok(c) => Ok(Some(c)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All conversations the participant belongs to, oldest first
    pub fn list_conversations_for(&self, participant_id: &str) -> Result<Vec<Conversation>> {
        let db = self.conn()?;
        let sql = format!(
            "SELECT {} FROM conversations
             WHERE participant_a = ?1 OR participant_b = ?1
             ORDER BY created_at ASC",
            CONVERSATION_COLUMNS
        );
        let mut stmt = db.prepare(&sql)?;
        let conversations = stmt
            .query_map(params![participant_id], row_to_conversation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(conversations)
    }

    /// Append a message. The caller has already checked membership.
    pub fn insert_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        receiver_id: &str,
        body: &MessageBody,
    ) -> Result<Message> {
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            body: body.clone(),
            created_at: Utc::now(),
            read_at: None,
        };

        let db = self.conn()?;
        db.execute(
            "INSERT INTO messages
                (id, conversation_id, sender_id, receiver_id, content, kind, action, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                message.id,
                message.conversation_id,
                message.sender_id,
                message.receiver_id,
                message.content(),
                message.kind().to_string(),
                message.action().map(|a| a.as_str()),
                format_timestamp(&message.created_at),
            ],
        )
        .context("Failed to insert message")?;

        Ok(message)
    }

    /// Full history of a conversation in server order
    pub fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let db = self.conn()?;
        let sql = format!(
            "SELECT {} FROM messages WHERE conversation_id = ?1 ORDER BY created_at ASC, seq ASC",
            MESSAGE_COLUMNS
        );
        let mut stmt = db.prepare(&sql)?;
        let messages = stmt
            .query_map(params![conversation_id], row_to_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    pub fn get_message(&self, message_id: &str) -> Result<Option<Message>> {
        let db = self.conn()?;
        query_message(&db, message_id)
    }

    /// Set `read_at` if it is still unset; the first acknowledgment wins.
    /// Returns the stored message, or None for an unknown id.
    pub fn mark_read(&self, message_id: &str, at: DateTime<Utc>) -> Result<Option<Message>> {
        let db = self.conn()?;
        let updated = db.execute(
            "UPDATE messages SET read_at = ?2 WHERE id = ?1 AND read_at IS NULL",
            params![message_id, format_timestamp(&at)],
        )?;
        if updated > 0 {
            tracing::debug!(message_id = %message_id, "Message marked read");
        }
        query_message(&db, message_id)
    }
}
