//! SQLite store — sites, streams, topics, messages, unread markers,
//! scan cursors, cached summaries.

pub mod queries;
pub mod types;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

use crate::api::{Message, RegisterState};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sites (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT UNIQUE NOT NULL,
  url TEXT NOT NULL,
  last_sync TEXT
);

CREATE TABLE IF NOT EXISTS streams (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  site_id INTEGER NOT NULL REFERENCES sites(id),
  stream_id INTEGER NOT NULL,
  name TEXT NOT NULL,
  UNIQUE(site_id, stream_id)
);

CREATE TABLE IF NOT EXISTS topics (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  stream_id INTEGER NOT NULL REFERENCES streams(id),
  name TEXT NOT NULL,
  last_message_id INTEGER,
  UNIQUE(stream_id, name)
);

CREATE TABLE IF NOT EXISTS messages (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  topic_id INTEGER NOT NULL REFERENCES topics(id),
  message_id INTEGER NOT NULL,
  sender_name TEXT NOT NULL,
  sender_email TEXT NOT NULL,
  content TEXT NOT NULL,
  content_text TEXT NOT NULL,
  timestamp INTEGER NOT NULL,
  raw_json TEXT,
  UNIQUE(topic_id, message_id)
);

-- Current unread state, fully replaced on every reconcile
CREATE TABLE IF NOT EXISTS unread_messages (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  site_id INTEGER NOT NULL REFERENCES sites(id),
  message_id INTEGER NOT NULL,
  stream_id INTEGER,
  stream_name TEXT,
  topic_name TEXT,
  UNIQUE(site_id, message_id)
);

-- Whole-account scan progress, per site and sync mode
CREATE TABLE IF NOT EXISTS sync_cursors (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  site_id INTEGER NOT NULL REFERENCES sites(id),
  mode TEXT NOT NULL,
  oldest_scanned_message_id INTEGER NOT NULL,
  UNIQUE(site_id, mode)
);

CREATE TABLE IF NOT EXISTS summaries (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  topic_id INTEGER NOT NULL UNIQUE REFERENCES topics(id),
  summary_text TEXT NOT NULL,
  importance TEXT NOT NULL,
  urgency TEXT NOT NULL,
  key_points TEXT,
  action_items TEXT,
  participants TEXT,
  last_message_id INTEGER NOT NULL,
  created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_topic ON messages(topic_id);
CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(timestamp);
CREATE INDEX IF NOT EXISTS idx_unread_site ON unread_messages(site_id);
CREATE INDEX IF NOT EXISTS idx_streams_site ON streams(site_id);
CREATE INDEX IF NOT EXISTS idx_topics_stream ON topics(stream_id);

-- Full-text index over message plain text, kept in sync by triggers
CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
  content_text, content='messages', content_rowid='id'
);
CREATE TRIGGER IF NOT EXISTS messages_fts_insert AFTER INSERT ON messages BEGIN
  INSERT INTO messages_fts(rowid, content_text) VALUES (new.id, new.content_text);
END;
CREATE TRIGGER IF NOT EXISTS messages_fts_delete AFTER DELETE ON messages BEGIN
  INSERT INTO messages_fts(messages_fts, rowid, content_text)
  VALUES ('delete', old.id, old.content_text);
END;
";

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Store { conn })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Store { conn })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Sites ---

    /// Get or create a site row, returning its id.
    pub fn get_or_create_site(&mut self, name: &str, url: &str) -> rusqlite::Result<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row("SELECT id FROM sites WHERE name = ?1", params![name], |r| {
                r.get(0)
            })
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }
        self.conn.execute(
            "INSERT INTO sites (name, url) VALUES (?1, ?2)",
            params![name, url],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn site_id(&self, name: &str) -> rusqlite::Result<Option<i64>> {
        self.conn
            .query_row("SELECT id FROM sites WHERE name = ?1", params![name], |r| {
                r.get(0)
            })
            .optional()
    }

    pub fn site_last_sync(&self, name: &str) -> rusqlite::Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT last_sync FROM sites WHERE name = ?1",
                params![name],
                |r| r.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten())
    }

    /// Stamp the site's last successful pass. Callers invoke this only
    /// after every planned conversation has been attempted.
    pub fn update_site_last_sync(&mut self, site_id: i64) -> rusqlite::Result<()> {
        self.conn.execute(
            "UPDATE sites SET last_sync = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), site_id],
        )?;
        Ok(())
    }

    // --- Streams / topics (conversations) ---

    /// Find-or-create a stream row, refreshing the display name.
    pub fn get_or_create_stream(
        &mut self,
        site_id: i64,
        stream_id: i64,
        name: &str,
    ) -> rusqlite::Result<i64> {
        get_or_create_stream(&self.conn, site_id, stream_id, name)
    }

    /// Find-or-create a topic row. The watermark starts unset.
    pub fn get_or_create_topic(&mut self, stream_db_id: i64, name: &str) -> rusqlite::Result<i64> {
        get_or_create_topic(&self.conn, stream_db_id, name)
    }

    /// Current watermark for a topic, None when nothing is stored yet.
    pub fn watermark_of(&self, topic_db_id: i64) -> rusqlite::Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT last_message_id FROM topics WHERE id = ?1",
                params![topic_db_id],
                |r| r.get::<_, Option<i64>>(0),
            )
            .optional()?
            .flatten())
    }

    // --- Messages ---

    /// Insert a batch of messages, ignoring exact duplicates, and advance
    /// the topic watermark to the batch maximum. Atomic: the inserts and
    /// the watermark advance commit together or not at all.
    pub fn merge_messages(
        &mut self,
        topic_db_id: i64,
        messages: &[Message],
    ) -> rusqlite::Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO messages
                 (topic_id, message_id, sender_name, sender_email,
                  content, content_text, timestamp, raw_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for msg in messages {
                inserted += stmt.execute(params![
                    topic_db_id,
                    msg.id,
                    msg.sender_name,
                    msg.sender_email,
                    msg.content,
                    msg.content_text,
                    msg.timestamp,
                    msg.raw.to_string(),
                ])?;
            }
        }
        if let Some(max_id) = messages.iter().map(|m| m.id).max() {
            tx.execute(
                "UPDATE topics
                 SET last_message_id = MAX(COALESCE(last_message_id, 0), ?1)
                 WHERE id = ?2",
                params![max_id, topic_db_id],
            )?;
        }
        tx.commit()?;
        Ok(inserted)
    }

    // --- Unread markers ---

    /// Replace the site's unread markers with the freshly reported set and
    /// lazily create any conversation referenced by it. Atomic; a reader
    /// never observes a half-updated unread set.
    pub fn reconcile_unread(
        &mut self,
        site_id: i64,
        state: &RegisterState,
    ) -> rusqlite::Result<()> {
        let names = state.stream_names();
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM unread_messages WHERE site_id = ?1",
            params![site_id],
        )?;
        for group in &state.stream_unreads {
            let stream_name = names
                .get(&group.stream_id)
                .cloned()
                .unwrap_or_else(|| format!("stream_{}", group.stream_id));
            let stream_db_id = get_or_create_stream(&tx, site_id, group.stream_id, &stream_name)?;
            get_or_create_topic(&tx, stream_db_id, &group.topic)?;
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO unread_messages
                 (site_id, message_id, stream_id, stream_name, topic_name)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for msg_id in &group.unread_message_ids {
                stmt.execute(params![
                    site_id,
                    msg_id,
                    group.stream_id,
                    stream_name,
                    group.topic
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    // --- Scan cursors ---

    /// The oldest message id already scanned for a (site, mode) pair.
    pub fn scan_cursor(&self, site_id: i64, mode: &str) -> rusqlite::Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT oldest_scanned_message_id FROM sync_cursors
                 WHERE site_id = ?1 AND mode = ?2",
                params![site_id, mode],
                |r| r.get(0),
            )
            .optional()
    }

    /// Advance the scan cursor. Callers do this only after the scanned
    /// conversations' messages are durably stored.
    pub fn update_scan_cursor(
        &mut self,
        site_id: i64,
        mode: &str,
        oldest_message_id: i64,
    ) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO sync_cursors (site_id, mode, oldest_scanned_message_id)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(site_id, mode) DO UPDATE SET oldest_scanned_message_id = ?3",
            params![site_id, mode, oldest_message_id],
        )?;
        Ok(())
    }

    // --- Summaries ---

    /// Save or replace the cached summary for a topic.
    #[allow(clippy::too_many_arguments)]
    pub fn save_summary(
        &mut self,
        topic_id: i64,
        summary_text: &str,
        importance: &str,
        urgency: &str,
        last_message_id: i64,
        key_points: Option<&str>,
        action_items: Option<&str>,
        participants: Option<&str>,
    ) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO summaries
             (topic_id, summary_text, importance, urgency, last_message_id,
              key_points, action_items, participants, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(topic_id) DO UPDATE SET
                summary_text = excluded.summary_text,
                importance = excluded.importance,
                urgency = excluded.urgency,
                last_message_id = excluded.last_message_id,
                key_points = excluded.key_points,
                action_items = excluded.action_items,
                participants = excluded.participants,
                created_at = excluded.created_at",
            params![
                topic_id,
                summary_text,
                importance,
                urgency,
                last_message_id,
                key_points,
                action_items,
                participants,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

fn get_or_create_stream(
    conn: &Connection,
    site_id: i64,
    stream_id: i64,
    name: &str,
) -> rusqlite::Result<i64> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM streams WHERE site_id = ?1 AND stream_id = ?2",
            params![site_id, stream_id],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        // Display name may have changed remotely
        conn.execute(
            "UPDATE streams SET name = ?1 WHERE id = ?2",
            params![name, id],
        )?;
        return Ok(id);
    }
    conn.execute(
        "INSERT INTO streams (site_id, stream_id, name) VALUES (?1, ?2, ?3)",
        params![site_id, stream_id, name],
    )?;
    Ok(conn.last_insert_rowid())
}

fn get_or_create_topic(conn: &Connection, stream_db_id: i64, name: &str) -> rusqlite::Result<i64> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM topics WHERE stream_id = ?1 AND name = ?2",
            params![stream_db_id, name],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    conn.execute(
        "INSERT INTO topics (stream_id, name) VALUES (?1, ?2)",
        params![stream_db_id, name],
    )?;
    Ok(conn.last_insert_rowid())
}
