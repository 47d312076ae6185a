//! AI thread summarization — shell out to the claude CLI with a JSON
//! schema, cache results in the store.

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;
use std::io::Write;
use std::process::{Command, Stdio};

use crate::browse::{require_site_id, resolve_site_name};
use crate::resolve;
use crate::store::Store;
use crate::store::types::{StoredMessage, SummaryRow};
use crate::util::format_timestamp;

pub const DEFAULT_MODEL: &str = "sonnet";

/// Threads longer than this send only their tail to the model.
const MAX_MESSAGES: usize = 200;

const SUMMARY_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "summary": {"type": "string", "description": "2-4 sentence summary of the discussion"},
    "importance": {"type": "string", "enum": ["high", "medium", "low"]},
    "urgency": {"type": "string", "enum": ["high", "medium", "low"]},
    "key_points": {"type": "array", "items": {"type": "string"}},
    "action_items": {"type": "array", "items": {"type": "string"}},
    "participants": {
      "type": "array",
      "items": {
        "type": "object",
        "properties": {"name": {"type": "string"}, "count": {"type": "integer"}},
        "required": ["name", "count"]
      }
    }
  },
  "required": ["summary", "importance", "urgency"]
}"#;

const PROMPT: &str = "Analyze this Zulip thread. Summarize and classify importance/urgency.

importance: high = directly affects user, blocks work, or requires action; medium = useful discussion; low = informational only
urgency: high = needs attention today; medium = this week; low = no time pressure

Thread:
";

#[derive(Debug, Clone)]
pub struct Summary {
    pub summary: String,
    pub importance: String,
    pub urgency: String,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
    pub participants: Vec<Value>,
}

/// Format a thread for model input.
fn format_messages(messages: &[StoredMessage]) -> String {
    let mut lines = Vec::new();
    for msg in messages {
        lines.push(format!(
            "[{}] {}:",
            format_timestamp(msg.timestamp),
            msg.sender_name
        ));
        lines.push(msg.content_text.clone());
        lines.push(String::new());
    }
    lines.join("\n")
}

/// Extract the first balanced JSON object from free-form text.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0;
    for (i, c) in text[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Generate a structured summary for one thread via `claude -p`.
pub fn generate_summary(messages: &[StoredMessage], model: &str) -> Result<Summary> {
    let (tail, truncation_note) = if messages.len() > MAX_MESSAGES {
        let omitted = messages.len() - MAX_MESSAGES;
        (
            &messages[messages.len() - MAX_MESSAGES..],
            format!(
                "[Note: Thread has {} messages. Showing last {}; {} earlier messages omitted.]\n\n",
                messages.len(),
                MAX_MESSAGES,
                omitted
            ),
        )
    } else {
        (messages, String::new())
    };

    let input = format!("{}\n{}{}", PROMPT, truncation_note, format_messages(tail));

    let mut child = Command::new("claude")
        .args([
            "-p",
            "--model",
            model,
            "--tools",
            "",
            "--mcp-config",
            "{}",
            "--strict-mcp-config",
            "--output-format",
            "json",
            "--json-schema",
            SUMMARY_SCHEMA,
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("failed to run 'claude' (is the Claude Code CLI installed?)")?;

    // Prompt goes over stdin to dodge argument length limits
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input.as_bytes())?;
    }
    let output = child.wait_with_output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = if stderr.trim().is_empty() {
            String::from_utf8_lossy(&output.stdout)
                .chars()
                .take(500)
                .collect::<String>()
        } else {
            stderr.trim().to_string()
        };
        bail!("claude failed (exit {:?}): {}", output.status.code(), detail);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_summary(stdout.trim())
}

/// Parse the claude wrapper JSON, preferring `structured_output` and
/// falling back to a JSON object embedded in the result text.
fn parse_summary(response: &str) -> Result<Summary> {
    let data: Value = match serde_json::from_str::<Value>(response) {
        Ok(wrapper) => {
            if wrapper
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false)
            {
                bail!(
                    "claude error: {}",
                    wrapper
                        .get("result")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                );
            }
            match wrapper.get("structured_output") {
                Some(v) if !v.is_null() => v.clone(),
                _ => {
                    let text = wrapper
                        .get("result")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    let json_str = extract_json(text)
                        .ok_or_else(|| anyhow!("no structured output in response"))?;
                    serde_json::from_str(json_str)?
                }
            }
        }
        Err(_) => {
            let json_str = extract_json(response)
                .ok_or_else(|| anyhow!("could not parse JSON from response"))?;
            serde_json::from_str(json_str)?
        }
    };

    let summary = data
        .get("summary")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("missing required field: summary"))?
        .to_string();
    let importance = enum_or(&data, "importance", "medium");
    let urgency = enum_or(&data, "urgency", "low");

    Ok(Summary {
        summary,
        importance,
        urgency,
        key_points: string_list(&data, "key_points"),
        action_items: string_list(&data, "action_items"),
        participants: data
            .get("participants")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
    })
}

fn enum_or(data: &Value, field: &str, fallback: &str) -> String {
    match data.get(field).and_then(Value::as_str) {
        Some(v @ ("high" | "medium" | "low")) => v.to_string(),
        _ => fallback.to_string(),
    }
}

fn string_list(data: &Value, field: &str) -> Vec<String> {
    data.get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// zulite summary [STREAM [TOPIC]] [-s SITE] [--force] [--model M]
pub fn run(
    stream: Option<&str>,
    topic: Option<&str>,
    site: Option<&str>,
    force: bool,
    model: &str,
) -> Result<()> {
    let site_name = resolve_site_name(site)?;
    let mut store = Store::open(&resolve::db_file())?;
    let site_id = require_site_id(&store, &site_name)?;

    match (stream, topic) {
        (Some(stream_name), Some(topic_name)) => {
            summarize_single(&mut store, site_id, stream_name, topic_name, model, force)
        }
        (Some(stream_name), None) => {
            let topics: Vec<String> = store
                .topics_summary(site_id, stream_name)?
                .into_iter()
                .map(|t| t.topic_name)
                .collect();
            if topics.is_empty() {
                println!("No topics found in #{}.", stream_name);
                return Ok(());
            }
            summarize_batch(&mut store, site_id, stream_name, &topics, model, force)
        }
        (None, _) => {
            let channels = store.channels_summary(site_id)?;
            if channels.is_empty() {
                println!("No channels downloaded. Run 'sync' first.");
                return Ok(());
            }
            let mut generated_any = false;
            for ch in channels {
                let topics: Vec<String> = store
                    .topics_summary(site_id, &ch.stream_name)?
                    .into_iter()
                    .map(|t| t.topic_name)
                    .collect();
                if !topics.is_empty() {
                    summarize_batch(&mut store, site_id, &ch.stream_name, &topics, model, force)?;
                    generated_any = true;
                }
            }
            if !generated_any {
                println!("No topics downloaded. Run 'sync' first.");
            }
            Ok(())
        }
    }
}

fn summarize_single(
    store: &mut Store,
    site_id: i64,
    stream_name: &str,
    topic_name: &str,
    model: &str,
    force: bool,
) -> Result<()> {
    let Some(topic) = store.topic_by_names(site_id, stream_name, topic_name)? else {
        bail!("Topic not found: #{} > {}", stream_name, topic_name);
    };

    let existing = store.summary_of(topic.id)?;
    let stale = store.is_summary_stale(topic.id)?;

    if let Some(ref row) = existing {
        if !stale && !force {
            display_summary(stream_name, topic_name, row, topic.last_message_id);
            return Ok(());
        }
    }

    let messages = store.topic_messages(site_id, stream_name, topic_name)?;
    if messages.is_empty() {
        bail!("No messages found for #{} > {}.", stream_name, topic_name);
    }

    let status = if force {
        "Regenerating summary"
    } else if stale && existing.is_some() {
        "Updating stale summary"
    } else {
        "Generating summary"
    };
    println!(
        "{} for #{} > {} ({} messages)...",
        status,
        stream_name,
        topic_name,
        messages.len()
    );
    println!();

    let result = match generate_summary(&messages, model) {
        Ok(r) => r,
        Err(err) => {
            eprintln!("Error generating summary: {:#}", err);
            if let Some(ref row) = existing {
                println!();
                println!("Showing cached summary:");
                display_summary(stream_name, topic_name, row, topic.last_message_id);
            }
            return Err(err);
        }
    };

    save(store, topic.id, topic.last_message_id, &result)?;
    if let Some(row) = store.summary_of(topic.id)? {
        display_summary(stream_name, topic_name, &row, topic.last_message_id);
    }
    Ok(())
}

fn summarize_batch(
    store: &mut Store,
    site_id: i64,
    stream_name: &str,
    topic_names: &[String],
    model: &str,
    force: bool,
) -> Result<()> {
    let mut to_process = Vec::new();
    for topic_name in topic_names {
        let Some(topic) = store.topic_by_names(site_id, stream_name, topic_name)? else {
            continue;
        };
        if store.summary_of(topic.id)?.is_some() && !force {
            continue;
        }
        to_process.push((topic_name.clone(), topic));
    }

    if to_process.is_empty() {
        println!(
            "All {} topics in #{} already have summaries.",
            topic_names.len(),
            stream_name
        );
        return Ok(());
    }

    println!("Processing {} topics...", to_process.len());
    println!();

    let mut generated = 0;
    let mut skipped = 0;
    let total = to_process.len();
    for (i, (topic_name, topic)) in to_process.into_iter().enumerate() {
        print!("[{}/{}] #{} > {}... ", i + 1, total, stream_name, topic_name);
        std::io::stdout().flush().ok();

        let messages = store.topic_messages(site_id, stream_name, &topic_name)?;
        if messages.is_empty() {
            println!("(no messages)");
            skipped += 1;
            continue;
        }

        match generate_summary(&messages, model) {
            Ok(result) => {
                save(store, topic.id, topic.last_message_id, &result)?;
                println!("{}/{} ({})", result.importance, result.urgency, model);
                generated += 1;
            }
            Err(err) => {
                println!("error: {:#}", err);
                skipped += 1;
            }
        }
    }

    println!();
    let mut status = format!("Generated {} summaries", generated);
    if skipped > 0 {
        status.push_str(&format!(", {} skipped", skipped));
    }
    println!("{}", status);
    Ok(())
}

pub(crate) fn save(
    store: &mut Store,
    topic_id: i64,
    last_message_id: Option<i64>,
    result: &Summary,
) -> Result<()> {
    store.save_summary(
        topic_id,
        &result.summary,
        &result.importance,
        &result.urgency,
        last_message_id.unwrap_or(0),
        Some(&serde_json::to_string(&result.key_points)?),
        Some(&serde_json::to_string(&result.action_items)?),
        Some(&serde_json::to_string(&result.participants)?),
    )?;
    Ok(())
}

/// Print a formatted summary.
pub(crate) fn display_summary(
    stream_name: &str,
    topic_name: &str,
    summary: &SummaryRow,
    current_last_msg: Option<i64>,
) {
    println!("#{} > {}", stream_name, topic_name);
    println!("{}", "=".repeat(70));
    println!(
        "IMPORTANCE: {}  |  URGENCY: {}",
        summary.importance.to_uppercase(),
        summary.urgency.to_uppercase()
    );

    let stale_note = match current_last_msg {
        Some(current) if summary.last_message_id != current => {
            " [stale - new messages since summary]"
        }
        _ => "",
    };
    println!("Generated: {}{}", summary.created_at, stale_note);
    println!();

    println!("SUMMARY");
    println!("{}", "-".repeat(40));
    println!("{}", summary.summary_text);
    println!();

    print_json_list("KEY POINTS", summary.key_points.as_deref());
    print_json_list("ACTION ITEMS", summary.action_items.as_deref());

    if let Some(raw) = summary.participants.as_deref() {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw) {
            if !items.is_empty() {
                println!("PARTICIPANTS");
                println!("{}", "-".repeat(40));
                for p in items {
                    match (p.get("name"), p.get("count")) {
                        (Some(name), Some(count)) => println!(
                            "- {} ({} messages)",
                            name.as_str().unwrap_or("Unknown"),
                            count
                        ),
                        _ => println!("- {}", p),
                    }
                }
                println!();
            }
        }
    }
}

fn print_json_list(title: &str, raw: Option<&str>) {
    let Some(raw) = raw else { return };
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw) else {
        return;
    };
    if items.is_empty() {
        return;
    }
    println!("{}", title);
    println!("{}", "-".repeat(40));
    for item in items {
        println!("- {}", item.as_str().unwrap_or_default());
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json(r#"{"a": 1}"#), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn test_extract_json_embedded() {
        let text = r#"Here you go: {"a": {"b": 2}} trailing"#;
        assert_eq!(extract_json(text), Some(r#"{"a": {"b": 2}}"#));
    }

    #[test]
    fn test_extract_json_none() {
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn test_parse_summary_structured_output() {
        let response = r#"{
            "is_error": false,
            "structured_output": {
                "summary": "A discussion.",
                "importance": "high",
                "urgency": "low",
                "key_points": ["one", "two"]
            }
        }"#;
        let summary = parse_summary(response).unwrap();
        assert_eq!(summary.summary, "A discussion.");
        assert_eq!(summary.importance, "high");
        assert_eq!(summary.key_points, vec!["one", "two"]);
    }

    #[test]
    fn test_parse_summary_invalid_enum_falls_back() {
        let response = r#"{
            "structured_output": {
                "summary": "x", "importance": "critical", "urgency": "whenever"
            }
        }"#;
        let summary = parse_summary(response).unwrap();
        assert_eq!(summary.importance, "medium");
        assert_eq!(summary.urgency, "low");
    }

    #[test]
    fn test_parse_summary_result_text_fallback() {
        let response = r#"{
            "result": "Sure! {\"summary\": \"y\", \"importance\": \"low\", \"urgency\": \"low\"}"
        }"#;
        let summary = parse_summary(response).unwrap();
        assert_eq!(summary.summary, "y");
        assert_eq!(summary.importance, "low");
    }

    #[test]
    fn test_parse_summary_error_flag() {
        let response = r#"{"is_error": true, "result": "over quota"}"#;
        assert!(parse_summary(response).is_err());
    }
}
