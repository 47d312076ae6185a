//! Read-side store queries: summaries, thread listings, full-text search,
//! triage rows.

use rusqlite::{OptionalExtension, params};

use super::Store;
use super::types::*;

impl Store {
    pub fn total_unread(&self, site_id: i64) -> rusqlite::Result<i64> {
        self.conn().query_row(
            "SELECT COUNT(*) FROM unread_messages WHERE site_id = ?1",
            params![site_id],
            |r| r.get(0),
        )
    }

    /// Unread counts grouped by stream then topic.
    pub fn unread_summary(&self, site_id: i64) -> rusqlite::Result<Vec<StreamUnreadSummary>> {
        let mut stmt = self.conn().prepare(
            "SELECT stream_name, stream_id, topic_name, COUNT(*) AS count
             FROM unread_messages
             WHERE site_id = ?1
             GROUP BY stream_name, stream_id, topic_name
             ORDER BY stream_name, topic_name",
        )?;
        let rows = stmt.query_map(params![site_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, i64>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, i64>(3)?,
            ))
        })?;

        let mut summary: Vec<StreamUnreadSummary> = Vec::new();
        for row in rows {
            let (stream_name, stream_id, topic_name, count) = row?;
            match summary.last_mut() {
                Some(entry) if entry.stream_name == stream_name => {
                    entry.topics.push(TopicUnreadCount { topic_name, count });
                    entry.total += count;
                }
                _ => summary.push(StreamUnreadSummary {
                    stream_name,
                    stream_id,
                    topics: vec![TopicUnreadCount { topic_name, count }],
                    total: count,
                }),
            }
        }
        Ok(summary)
    }

    /// Topics currently carrying unread markers, with the marked ids.
    /// This is the sync plan's source of truth.
    pub fn unread_topics(&self, site_id: i64) -> rusqlite::Result<Vec<UnreadTopicRow>> {
        let mut stmt = self.conn().prepare(
            "SELECT stream_id, stream_name, topic_name, message_id
             FROM unread_messages
             WHERE site_id = ?1
             ORDER BY stream_name, topic_name, message_id",
        )?;
        let rows = stmt.query_map(params![site_id], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, i64>(3)?,
            ))
        })?;

        let mut topics: Vec<UnreadTopicRow> = Vec::new();
        for row in rows {
            let (stream_id, stream_name, topic_name, message_id) = row?;
            match topics.last_mut() {
                Some(entry)
                    if entry.stream_id == stream_id && entry.topic_name == topic_name =>
                {
                    entry.message_ids.push(message_id);
                }
                _ => topics.push(UnreadTopicRow {
                    stream_id,
                    stream_name,
                    topic_name,
                    message_ids: vec![message_id],
                }),
            }
        }
        Ok(topics)
    }

    /// Unread message ids for one topic.
    pub fn unread_ids_for_topic(
        &self,
        site_id: i64,
        stream_name: &str,
        topic_name: &str,
    ) -> rusqlite::Result<Vec<i64>> {
        let mut stmt = self.conn().prepare(
            "SELECT message_id FROM unread_messages
             WHERE site_id = ?1 AND stream_name = ?2 AND topic_name = ?3
             ORDER BY message_id",
        )?;
        let rows = stmt.query_map(params![site_id, stream_name, topic_name], |r| r.get(0))?;
        rows.collect()
    }

    /// All stored messages for a topic, oldest first.
    pub fn topic_messages(
        &self,
        site_id: i64,
        stream_name: &str,
        topic_name: &str,
    ) -> rusqlite::Result<Vec<StoredMessage>> {
        let mut stmt = self.conn().prepare(
            "SELECT m.message_id, m.sender_name, m.sender_email,
                    m.content, m.content_text, m.timestamp
             FROM messages m
             JOIN topics t ON m.topic_id = t.id
             JOIN streams s ON t.stream_id = s.id
             WHERE s.site_id = ?1 AND s.name = ?2 AND t.name = ?3
             ORDER BY m.message_id ASC",
        )?;
        let rows = stmt.query_map(params![site_id, stream_name, topic_name], |r| {
            Ok(StoredMessage {
                message_id: r.get(0)?,
                sender_name: r.get(1)?,
                sender_email: r.get(2)?,
                content: r.get(3)?,
                content_text: r.get(4)?,
                timestamp: r.get(5)?,
            })
        })?;
        rows.collect()
    }

    /// Stored messages for a topic paired with their unread status.
    pub fn topic_messages_with_unread(
        &self,
        site_id: i64,
        stream_name: &str,
        topic_name: &str,
    ) -> rusqlite::Result<Vec<(StoredMessage, bool)>> {
        let unread: std::collections::HashSet<i64> = self
            .unread_ids_for_topic(site_id, stream_name, topic_name)?
            .into_iter()
            .collect();
        let messages = self.topic_messages(site_id, stream_name, topic_name)?;
        Ok(messages
            .into_iter()
            .map(|m| {
                let is_unread = unread.contains(&m.message_id);
                (m, is_unread)
            })
            .collect())
    }

    pub fn all_streams(&self, site_id: i64) -> rusqlite::Result<Vec<StreamRow>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, stream_id, name FROM streams WHERE site_id = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map(params![site_id], |r| {
            Ok(StreamRow {
                id: r.get(0)?,
                stream_id: r.get(1)?,
                name: r.get(2)?,
            })
        })?;
        rows.collect()
    }

    pub fn stream_by_name(
        &self,
        site_id: i64,
        stream_name: &str,
    ) -> rusqlite::Result<Option<StreamRow>> {
        self.conn()
            .query_row(
                "SELECT id, stream_id, name FROM streams WHERE site_id = ?1 AND name = ?2",
                params![site_id, stream_name],
                |r| {
                    Ok(StreamRow {
                        id: r.get(0)?,
                        stream_id: r.get(1)?,
                        name: r.get(2)?,
                    })
                },
            )
            .optional()
    }

    pub fn topics_for_stream(&self, stream_db_id: i64) -> rusqlite::Result<Vec<TopicRow>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, name, last_message_id FROM topics WHERE stream_id = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map(params![stream_db_id], |r| {
            Ok(TopicRow {
                id: r.get(0)?,
                name: r.get(1)?,
                last_message_id: r.get(2)?,
            })
        })?;
        rows.collect()
    }

    pub fn topic_by_names(
        &self,
        site_id: i64,
        stream_name: &str,
        topic_name: &str,
    ) -> rusqlite::Result<Option<TopicRow>> {
        self.conn()
            .query_row(
                "SELECT t.id, t.name, t.last_message_id
                 FROM topics t
                 JOIN streams s ON t.stream_id = s.id
                 WHERE s.site_id = ?1 AND s.name = ?2 AND t.name = ?3",
                params![site_id, stream_name, topic_name],
                |r| {
                    Ok(TopicRow {
                        id: r.get(0)?,
                        name: r.get(1)?,
                        last_message_id: r.get(2)?,
                    })
                },
            )
            .optional()
    }

    pub fn topic_has_messages(
        &self,
        site_id: i64,
        stream_name: &str,
        topic_name: &str,
    ) -> rusqlite::Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM messages m
                 JOIN topics t ON m.topic_id = t.id
                 JOIN streams s ON t.stream_id = s.id
                 WHERE s.site_id = ?1 AND s.name = ?2 AND t.name = ?3
                 LIMIT 1",
                params![site_id, stream_name, topic_name],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Per-stream totals for the channels listing.
    pub fn channels_summary(&self, site_id: i64) -> rusqlite::Result<Vec<ChannelSummary>> {
        let mut stmt = self.conn().prepare(
            "SELECT
                s.name AS stream_name,
                s.stream_id,
                COUNT(DISTINCT t.id) AS topic_count,
                COUNT(m.id) AS message_count,
                (SELECT COUNT(*) FROM unread_messages u
                 WHERE u.site_id = ?1 AND u.stream_name = s.name) AS unread_count
             FROM streams s
             LEFT JOIN topics t ON t.stream_id = s.id
             LEFT JOIN messages m ON m.topic_id = t.id
             WHERE s.site_id = ?1
             GROUP BY s.id, s.name, s.stream_id
             ORDER BY s.name",
        )?;
        let rows = stmt.query_map(params![site_id], |r| {
            Ok(ChannelSummary {
                stream_name: r.get(0)?,
                stream_id: r.get(1)?,
                topic_count: r.get(2)?,
                message_count: r.get(3)?,
                unread_count: r.get(4)?,
            })
        })?;
        rows.collect()
    }

    /// Per-topic totals for one stream, most recently active first.
    pub fn topics_summary(
        &self,
        site_id: i64,
        stream_name: &str,
    ) -> rusqlite::Result<Vec<TopicSummary>> {
        let mut stmt = self.conn().prepare(
            "SELECT
                t.name AS topic_name,
                COUNT(m.id) AS message_count,
                (SELECT COUNT(*) FROM unread_messages u
                 WHERE u.site_id = ?1 AND u.stream_name = ?2
                   AND u.topic_name = t.name) AS unread_count,
                MAX(m.timestamp) AS last_message_time
             FROM topics t
             JOIN streams s ON t.stream_id = s.id
             LEFT JOIN messages m ON m.topic_id = t.id
             WHERE s.site_id = ?1 AND s.name = ?2
             GROUP BY t.id, t.name
             ORDER BY last_message_time DESC",
        )?;
        let rows = stmt.query_map(params![site_id, stream_name], |r| {
            Ok(TopicSummary {
                topic_name: r.get(0)?,
                message_count: r.get(1)?,
                unread_count: r.get(2)?,
                last_message_time: r.get(3)?,
            })
        })?;
        rows.collect()
    }

    /// Keyword search over stored message text (FTS5), newest first.
    pub fn search(
        &self,
        site_id: i64,
        query: &str,
        limit: usize,
    ) -> rusqlite::Result<Vec<SearchHit>> {
        let mut stmt = self.conn().prepare(
            "SELECT s.name, t.name, m.sender_name, m.timestamp,
                    snippet(messages_fts, 0, '[', ']', '…', 12)
             FROM messages_fts
             JOIN messages m ON m.id = messages_fts.rowid
             JOIN topics t ON m.topic_id = t.id
             JOIN streams s ON t.stream_id = s.id
             WHERE s.site_id = ?1 AND messages_fts MATCH ?2
             ORDER BY m.timestamp DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![site_id, query, limit as i64], |r| {
            Ok(SearchHit {
                stream_name: r.get(0)?,
                topic_name: r.get(1)?,
                sender_name: r.get(2)?,
                timestamp: r.get(3)?,
                snippet: r.get(4)?,
            })
        })?;
        rows.collect()
    }

    // --- Summaries ---

    pub fn summary_of(&self, topic_id: i64) -> rusqlite::Result<Option<SummaryRow>> {
        self.conn()
            .query_row(
                "SELECT summary_text, importance, urgency, key_points,
                        action_items, participants, last_message_id, created_at
                 FROM summaries WHERE topic_id = ?1",
                params![topic_id],
                |r| {
                    Ok(SummaryRow {
                        summary_text: r.get(0)?,
                        importance: r.get(1)?,
                        urgency: r.get(2)?,
                        key_points: r.get(3)?,
                        action_items: r.get(4)?,
                        participants: r.get(5)?,
                        last_message_id: r.get(6)?,
                        created_at: r.get(7)?,
                    })
                },
            )
            .optional()
    }

    /// A summary is stale once the topic watermark has moved past it.
    pub fn is_summary_stale(&self, topic_id: i64) -> rusqlite::Result<bool> {
        let row: Option<(i64, Option<i64>)> = self
            .conn()
            .query_row(
                "SELECT su.last_message_id, t.last_message_id
                 FROM summaries su
                 JOIN topics t ON su.topic_id = t.id
                 WHERE su.topic_id = ?1",
                params![topic_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        match row {
            None => Ok(true),
            Some((summary_msg, topic_msg)) => Ok(Some(summary_msg) != topic_msg),
        }
    }

    /// Topics with summary data for triage, most important first.
    pub fn topics_for_triage(
        &self,
        site_id: i64,
        unread_only: bool,
    ) -> rusqlite::Result<Vec<TriageRow>> {
        let sql = if unread_only {
            "SELECT s.name, t.name, t.id, t.last_message_id,
                    su.summary_text, su.importance, su.urgency, su.last_message_id,
                    COUNT(u.id)
             FROM unread_messages u
             JOIN streams s ON u.stream_name = s.name AND s.site_id = ?1
             JOIN topics t ON t.stream_id = s.id AND t.name = u.topic_name
             LEFT JOIN summaries su ON su.topic_id = t.id
             WHERE u.site_id = ?1
             GROUP BY t.id
             ORDER BY su.importance DESC, su.urgency DESC, COUNT(u.id) DESC"
        } else {
            "SELECT s.name, t.name, t.id, t.last_message_id,
                    su.summary_text, su.importance, su.urgency, su.last_message_id,
                    (SELECT COUNT(*) FROM unread_messages u
                     WHERE u.site_id = ?1 AND u.stream_name = s.name
                       AND u.topic_name = t.name)
             FROM topics t
             JOIN streams s ON t.stream_id = s.id
             LEFT JOIN summaries su ON su.topic_id = t.id
             WHERE s.site_id = ?1
             ORDER BY su.importance DESC, su.urgency DESC"
        };
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params![site_id], |r| {
            Ok(TriageRow {
                stream_name: r.get(0)?,
                topic_name: r.get(1)?,
                topic_id: r.get(2)?,
                topic_last_msg: r.get(3)?,
                summary_text: r.get(4)?,
                importance: r.get(5)?,
                urgency: r.get(6)?,
                summary_last_msg: r.get(7)?,
                unread_count: r.get(8)?,
            })
        })?;
        rows.collect()
    }
}
