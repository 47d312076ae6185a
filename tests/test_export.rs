//! Export writers: JSON and Markdown layout, filename sanitizing, mtime.

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use zulite::export::{write_json, write_markdown};
use zulite::store::types::StoredMessage;

fn stored(id: i64, sender: &str, content: &str, timestamp: i64) -> StoredMessage {
    StoredMessage {
        message_id: id,
        sender_name: sender.to_string(),
        sender_email: format!("{}@example.com", sender.to_lowercase()),
        content: content.to_string(),
        content_text: content.to_string(),
        timestamp,
    }
}

#[test]
fn test_json_export_layout() {
    let tmp = TempDir::new().unwrap();
    let messages = vec![
        stored(1, "Alice", "first message", 1_700_000_000),
        stored(2, "Bob", "second message", 1_700_000_100),
    ];

    let path = write_json(tmp.path(), "mysite", "General Chat", "Roadmap: 2026?", &messages, &[2])
        .unwrap();

    // Path components are sanitized
    assert!(path.ends_with("mysite/general-chat/roadmap-2026.json"));
    assert!(path.exists());

    let data: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(data["site"], "mysite");
    assert_eq!(data["stream"], "General Chat");
    assert_eq!(data["topic"], "Roadmap: 2026?");
    assert_eq!(data["message_count"], 2);
    assert_eq!(data["unread_count"], 1);
    assert_eq!(data["unread_message_ids"], serde_json::json!([2]));
    assert_eq!(data["messages"][0]["id"], 1);
    assert_eq!(data["messages"][0]["sender"], "Alice");
    assert_eq!(data["messages"][1]["content"], "second message");
}

#[test]
fn test_markdown_export_layout() {
    let tmp = TempDir::new().unwrap();
    let messages = vec![
        stored(1, "Alice", "first message", 1_700_000_000),
        stored(2, "Bob", "second message", 1_700_000_100),
    ];

    let path =
        write_markdown(tmp.path(), "mysite", "general", "welcome", &messages, &[2]).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("# general > welcome\n"));
    assert!(content.contains("Site: mysite"));
    assert!(content.contains("Messages: 2"));
    assert!(content.contains("Unread: 1"));
    assert!(content.contains("## Alice"));
    assert!(content.contains("## [UNREAD] Bob"));
    assert!(content.contains("first message"));
    assert!(content.contains("second message"));
}

#[test]
fn test_export_overwrites_previous_file() {
    let tmp = TempDir::new().unwrap();
    let first = vec![stored(1, "Alice", "v1", 1_700_000_000)];
    let second = vec![
        stored(1, "Alice", "v1", 1_700_000_000),
        stored(2, "Bob", "v2", 1_700_000_100),
    ];

    let path1 = write_json(tmp.path(), "s", "general", "welcome", &first, &[]).unwrap();
    let path2 = write_json(tmp.path(), "s", "general", "welcome", &second, &[]).unwrap();

    assert_eq!(path1, path2);
    let data: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path2).unwrap()).unwrap();
    assert_eq!(data["message_count"], 2);
}

#[cfg(unix)]
#[test]
fn test_export_mtime_matches_last_message() {
    let tmp = TempDir::new().unwrap();
    let last_ts = 1_700_000_100;
    let messages = vec![
        stored(1, "Alice", "first", 1_700_000_000),
        stored(2, "Bob", "last", last_ts),
    ];

    let path = write_markdown(tmp.path(), "s", "general", "welcome", &messages, &[]).unwrap();

    let mtime = std::fs::metadata(&path)
        .unwrap()
        .modified()
        .unwrap()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    assert!(
        (mtime - last_ts).abs() < 2,
        "mtime {} should be close to {}",
        mtime,
        last_ts
    );
}
