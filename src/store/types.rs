//! Row types returned by store queries.

/// A message as persisted, in normalized form.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub message_id: i64,
    pub sender_name: String,
    pub sender_email: String,
    pub content: String,
    pub content_text: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct StreamRow {
    pub id: i64,
    pub stream_id: i64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct TopicRow {
    pub id: i64,
    pub name: String,
    /// Watermark: the newest message id durably stored for this topic.
    pub last_message_id: Option<i64>,
}

/// One topic carrying unread markers, with the marked message ids.
#[derive(Debug, Clone)]
pub struct UnreadTopicRow {
    pub stream_id: i64,
    pub stream_name: String,
    pub topic_name: String,
    pub message_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct TopicUnreadCount {
    pub topic_name: String,
    pub count: i64,
}

/// Unread counts for one stream, grouped by topic.
#[derive(Debug, Clone)]
pub struct StreamUnreadSummary {
    pub stream_name: String,
    pub stream_id: i64,
    pub topics: Vec<TopicUnreadCount>,
    pub total: i64,
}

#[derive(Debug, Clone)]
pub struct ChannelSummary {
    pub stream_name: String,
    pub stream_id: i64,
    pub topic_count: i64,
    pub message_count: i64,
    pub unread_count: i64,
}

#[derive(Debug, Clone)]
pub struct TopicSummary {
    pub topic_name: String,
    pub message_count: i64,
    pub unread_count: i64,
    pub last_message_time: Option<i64>,
}

/// One full-text search hit with enough context to display.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub stream_name: String,
    pub topic_name: String,
    pub sender_name: String,
    pub timestamp: i64,
    pub snippet: String,
}

/// A cached AI summary. List fields are stored as JSON arrays.
#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub summary_text: String,
    pub importance: String,
    pub urgency: String,
    pub key_points: Option<String>,
    pub action_items: Option<String>,
    pub participants: Option<String>,
    pub last_message_id: i64,
    pub created_at: String,
}

/// One topic as seen by triage: identity, watermark, unread count, and the
/// cached summary if any.
#[derive(Debug, Clone)]
pub struct TriageRow {
    pub stream_name: String,
    pub topic_name: String,
    pub topic_id: i64,
    pub topic_last_msg: Option<i64>,
    pub summary_text: Option<String>,
    pub importance: Option<String>,
    pub urgency: Option<String>,
    pub summary_last_msg: Option<i64>,
    pub unread_count: i64,
}
