//! Shared test fixtures and helpers.

#![allow(dead_code)]

use serde_json::{Value, json};

use zulite::api::Message;

/// Build a normalized message for store-level tests.
pub fn message(id: i64, sender: &str, content: &str, timestamp: i64) -> Message {
    Message {
        id,
        sender_name: sender.to_string(),
        sender_email: format!("{}@example.com", sender.to_lowercase()),
        content: content.to_string(),
        content_text: content.to_string(),
        timestamp,
        raw: json!({"id": id, "content": content}),
    }
}

/// Wire-format message payload, as the server would return it.
pub fn wire_message(id: i64, sender: &str, content: &str) -> Value {
    json!({
        "id": id,
        "sender_full_name": sender,
        "sender_email": format!("{}@example.com", sender.to_lowercase()),
        "content": content,
        "timestamp": 1_700_000_000 + id,
    })
}

/// Register response body with one subscribed stream and the given unread
/// message ids in one topic.
pub fn register_body(
    stream_id: i64,
    stream_name: &str,
    topic: &str,
    unread_ids: &[i64],
) -> String {
    json!({
        "result": "success",
        "msg": "",
        "unread_msgs": {
            "streams": [{
                "stream_id": stream_id,
                "topic": topic,
                "unread_message_ids": unread_ids,
            }],
            "pms": [],
            "huddles": [],
            "mentions": [],
            "count": unread_ids.len(),
        },
        "subscriptions": [{
            "stream_id": stream_id,
            "name": stream_name,
            "is_muted": false,
        }],
    })
    .to_string()
}

/// Register response with no unread messages and no subscriptions.
pub fn empty_register_body() -> String {
    json!({
        "result": "success",
        "msg": "",
        "unread_msgs": {"streams": [], "pms": [], "huddles": [], "mentions": [], "count": 0},
        "subscriptions": [],
    })
    .to_string()
}

/// Messages response body.
pub fn messages_body(messages: &[Value], found_newest: bool) -> String {
    json!({
        "result": "success",
        "msg": "",
        "messages": messages,
        "found_newest": found_newest,
    })
    .to_string()
}

/// The narrow query value the client sends for a stream/topic pair.
pub fn topic_narrow(stream: &str, topic: &str) -> String {
    json!([
        {"operator": "stream", "operand": stream},
        {"operator": "topic", "operand": topic},
    ])
    .to_string()
}

/// The narrow query value the client sends when scanning its own messages.
pub fn sender_narrow(email: &str) -> String {
    json!([{"operator": "sender", "operand": email}]).to_string()
}
