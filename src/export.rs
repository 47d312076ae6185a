//! Export stored threads — full ordered message list plus the current
//! unread ids — to JSON or Markdown files.

use anyhow::{Result, bail};
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::browse::{require_site_id, resolve_site_name};
use crate::resolve;
use crate::store::Store;
use crate::store::types::StoredMessage;
use crate::util::{format_timestamp, iso_timestamp, sanitize_filename};

/// zulite export [STREAM [TOPIC]] [-s SITE] [-f json|markdown]
pub fn run(
    stream: Option<&str>,
    topic: Option<&str>,
    site: Option<&str>,
    format: &str,
) -> Result<()> {
    let site_name = resolve_site_name(site)?;
    let store = Store::open(&resolve::db_file())?;
    let site_id = require_site_id(&store, &site_name)?;

    // unread ids keyed by (stream, topic), attached to each exported file
    let mut unread_by_topic: HashMap<(String, String), Vec<i64>> = HashMap::new();
    for t in store.unread_topics(site_id)? {
        unread_by_topic.insert((t.stream_name.clone(), t.topic_name.clone()), t.message_ids);
    }

    match (stream, topic) {
        (Some(stream_name), Some(topic_name)) => {
            export_one(
                &store,
                site_id,
                &site_name,
                stream_name,
                topic_name,
                format,
                &unread_by_topic,
            )?;
        }
        (Some(stream_name), None) => {
            let Some(stream_row) = store.stream_by_name(site_id, stream_name)? else {
                eprintln!("Stream '{}' not found. Available streams:", stream_name);
                for s in store.all_streams(site_id)? {
                    eprintln!("  - {}", s.name);
                }
                bail!("unknown stream: {}", stream_name);
            };
            let topics = store.topics_for_stream(stream_row.id)?;
            println!("Exporting {} topics from #{}...", topics.len(), stream_name);
            for t in topics {
                export_one(
                    &store,
                    site_id,
                    &site_name,
                    stream_name,
                    &t.name,
                    format,
                    &unread_by_topic,
                )?;
            }
        }
        (None, _) => {
            let streams = store.all_streams(site_id)?;
            if streams.is_empty() {
                bail!("No streams found. Run 'sync' first.");
            }
            println!("Exporting all stored messages for {}...", site_name);
            let mut total_topics = 0;
            for s in &streams {
                let topics = store.topics_for_stream(s.id)?;
                total_topics += topics.len();
                for t in topics {
                    export_one(
                        &store,
                        site_id,
                        &site_name,
                        &s.name,
                        &t.name,
                        format,
                        &unread_by_topic,
                    )?;
                }
            }
            println!("Exported {} topics.", total_topics);
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn export_one(
    store: &Store,
    site_id: i64,
    site_name: &str,
    stream_name: &str,
    topic_name: &str,
    format: &str,
    unread_by_topic: &HashMap<(String, String), Vec<i64>>,
) -> Result<()> {
    let messages = store.topic_messages(site_id, stream_name, topic_name)?;
    if messages.is_empty() {
        println!("  Skipping empty topic: #{} > {}", stream_name, topic_name);
        return Ok(());
    }

    let key = (stream_name.to_string(), topic_name.to_string());
    let unread_ids = unread_by_topic.get(&key).cloned().unwrap_or_default();

    let export_root = resolve::export_dir();
    let path = if format == "markdown" {
        write_markdown(
            &export_root,
            site_name,
            stream_name,
            topic_name,
            &messages,
            &unread_ids,
        )?
    } else {
        write_json(
            &export_root,
            site_name,
            stream_name,
            topic_name,
            &messages,
            &unread_ids,
        )?
    };
    println!(
        "  Exported: #{} > {} ({} messages) -> {}",
        stream_name,
        topic_name,
        messages.len(),
        path.display()
    );
    Ok(())
}

fn topic_file(
    export_root: &Path,
    site_name: &str,
    stream_name: &str,
    topic_name: &str,
    ext: &str,
) -> Result<PathBuf> {
    let dir = export_root
        .join(sanitize_filename(site_name))
        .join(sanitize_filename(stream_name));
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join(format!("{}.{}", sanitize_filename(topic_name), ext)))
}

/// Write one topic as a JSON document.
pub fn write_json(
    export_root: &Path,
    site_name: &str,
    stream_name: &str,
    topic_name: &str,
    messages: &[StoredMessage],
    unread_ids: &[i64],
) -> Result<PathBuf> {
    let path = topic_file(export_root, site_name, stream_name, topic_name, "json")?;
    let data = serde_json::json!({
        "site": site_name,
        "stream": stream_name,
        "topic": topic_name,
        "messages": messages.iter().map(|m| serde_json::json!({
            "id": m.message_id,
            "sender": m.sender_name,
            "sender_email": m.sender_email,
            "timestamp": iso_timestamp(m.timestamp),
            "content": m.content,
            "content_text": m.content_text,
        })).collect::<Vec<_>>(),
        "unread_count": unread_ids.len(),
        "unread_message_ids": unread_ids,
        "exported_at": Utc::now().to_rfc3339(),
        "message_count": messages.len(),
    });
    std::fs::write(&path, serde_json::to_string_pretty(&data)?)?;
    let _ = set_mtime(&path, messages.last().map(|m| m.timestamp).unwrap_or(0));
    Ok(path)
}

/// Write one topic as a Markdown document.
pub fn write_markdown(
    export_root: &Path,
    site_name: &str,
    stream_name: &str,
    topic_name: &str,
    messages: &[StoredMessage],
    unread_ids: &[i64],
) -> Result<PathBuf> {
    let path = topic_file(export_root, site_name, stream_name, topic_name, "md")?;
    let unread_set: std::collections::HashSet<i64> = unread_ids.iter().copied().collect();

    let mut lines = vec![
        format!("# {} > {}", stream_name, topic_name),
        String::new(),
        format!("Site: {}", site_name),
        format!("Exported: {}", Utc::now().to_rfc3339()),
        format!("Messages: {}", messages.len()),
        format!("Unread: {}", unread_ids.len()),
        String::new(),
        "---".to_string(),
        String::new(),
    ];

    for msg in messages {
        let status = if unread_set.contains(&msg.message_id) {
            "[UNREAD] "
        } else {
            ""
        };
        lines.push(format!("## {}{}", status, msg.sender_name));
        lines.push(format!("*{}*", format_timestamp(msg.timestamp)));
        lines.push(String::new());
        lines.push(msg.content_text.clone());
        lines.push(String::new());
        lines.push("---".to_string());
        lines.push(String::new());
    }

    std::fs::write(&path, lines.join("\n"))?;
    let _ = set_mtime(&path, messages.last().map(|m| m.timestamp).unwrap_or(0));
    Ok(path)
}

/// Set file mtime to the thread's last message timestamp.
fn set_mtime(path: &Path, ts: i64) -> Result<()> {
    if ts <= 0 {
        return Ok(());
    }
    #[cfg(unix)]
    {
        use std::ffi::CString;
        let path_c = CString::new(path.to_string_lossy().as_bytes())?;
        let atime = path
            .metadata()?
            .accessed()?
            .duration_since(std::time::UNIX_EPOCH)?
            .as_secs() as i64;
        let times = libc::utimbuf {
            actime: atime,
            modtime: ts,
        };
        unsafe {
            libc::utime(path_c.as_ptr(), &times);
        }
    }
    Ok(())
}
