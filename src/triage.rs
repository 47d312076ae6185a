//! Triage — filter and group threads by AI-classified importance/urgency.

use anyhow::Result;
use std::io::Write;

use crate::browse::{require_site_id, resolve_site_name};
use crate::resolve;
use crate::store::Store;
use crate::store::types::TriageRow;
use crate::summarize;

fn rank(level: Option<&str>) -> u8 {
    match level {
        Some("high") => 3,
        Some("medium") => 2,
        Some("low") => 1,
        _ => 0,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    site: Option<&str>,
    all: bool,
    importance_filter: Option<&str>,
    urgency_filter: Option<&str>,
    generate_missing: bool,
    model: &str,
    limit: Option<usize>,
) -> Result<()> {
    let site_name = resolve_site_name(site)?;
    let mut store = Store::open(&resolve::db_file())?;
    let site_id = require_site_id(&store, &site_name)?;
    let unread_only = !all;

    let mut topics = store.topics_for_triage(site_id, unread_only)?;
    if topics.is_empty() {
        if unread_only {
            println!("No unread topics found.");
        } else {
            println!("No topics found.");
        }
        return Ok(());
    }

    if generate_missing {
        generate_for_missing(&mut store, site_id, &mut topics, model, limit)?;
    }

    // Apply minimum-level filters
    let filtered: Vec<&TriageRow> = topics
        .iter()
        .filter(|t| {
            if importance_filter.is_some()
                && rank(t.importance.as_deref()) < rank(importance_filter)
            {
                return false;
            }
            if urgency_filter.is_some() && rank(t.urgency.as_deref()) < rank(urgency_filter) {
                return false;
            }
            true
        })
        .collect();

    let high_urgent: Vec<_> = filtered
        .iter()
        .filter(|t| t.importance.as_deref() == Some("high") && t.urgency.as_deref() == Some("high"))
        .collect();
    let high_other: Vec<_> = filtered
        .iter()
        .filter(|t| t.importance.as_deref() == Some("high") && t.urgency.as_deref() != Some("high"))
        .collect();
    let medium: Vec<_> = filtered
        .iter()
        .filter(|t| t.importance.as_deref() == Some("medium"))
        .collect();
    let low: Vec<_> = filtered
        .iter()
        .filter(|t| t.importance.as_deref() == Some("low"))
        .collect();
    let no_summary: Vec<_> = filtered.iter().filter(|t| t.importance.is_none()).collect();

    let summarized = filtered.len() - no_summary.len();
    let scope = if unread_only {
        "unread threads"
    } else {
        "threads"
    };
    println!("Triage: {} {} ({} summarized)", filtered.len(), scope, summarized);
    println!("{}", "=".repeat(70));

    print_section(
        &format!("HIGH IMPORTANCE + HIGH URGENCY ({})", high_urgent.len()),
        &high_urgent,
    );
    print_section(&format!("HIGH IMPORTANCE ({})", high_other.len()), &high_other);
    print_section(&format!("MEDIUM IMPORTANCE ({})", medium.len()), &medium);

    let show_low = importance_filter.is_none() || importance_filter == Some("low");
    if show_low {
        print_section(&format!("LOW IMPORTANCE ({})", low.len()), &low);
    }

    if !no_summary.is_empty() {
        println!();
        println!("NOT YET SUMMARIZED ({})", no_summary.len());
        println!("{}", "-".repeat(40));
        for t in &no_summary {
            let unread = if t.unread_count > 0 {
                format!(" [{} unread]", t.unread_count)
            } else {
                String::new()
            };
            println!("#{} > {}{}", t.stream_name, t.topic_name, unread);
        }
    }

    if !show_low && !low.is_empty() {
        println!();
        println!("[{} low-importance threads hidden]", low.len());
    }
    Ok(())
}

fn print_section(title: &str, topics: &[&&TriageRow]) {
    if topics.is_empty() {
        return;
    }
    println!();
    println!("{}", title);
    println!("{}", "-".repeat(40));
    for t in topics {
        print_topic_line(t);
    }
}

fn print_topic_line(t: &TriageRow) {
    let unread = if t.unread_count > 0 {
        format!(" [{} unread]", t.unread_count)
    } else {
        String::new()
    };
    let stale = match (t.summary_last_msg, t.topic_last_msg) {
        (Some(s), Some(l)) if s != l => " [stale]",
        _ => "",
    };
    println!("#{} > {}{}{}", t.stream_name, t.topic_name, unread, stale);
    if let Some(ref text) = t.summary_text {
        let line = if text.chars().count() > 100 {
            let head: String = text.chars().take(97).collect();
            format!("{}...", head)
        } else {
            text.clone()
        };
        println!("  {}", line);
    }
}

/// Generate summaries for topics that have none, updating the rows in
/// place so the listing below reflects them.
fn generate_for_missing(
    store: &mut Store,
    site_id: i64,
    topics: &mut [TriageRow],
    model: &str,
    limit: Option<usize>,
) -> Result<()> {
    let missing: Vec<usize> = topics
        .iter()
        .enumerate()
        .filter(|(_, t)| t.summary_text.is_none())
        .map(|(i, _)| i)
        .take(limit.unwrap_or(usize::MAX))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    println!("Generating summaries for {} threads...", missing.len());
    println!();

    let total = missing.len();
    for (n, idx) in missing.into_iter().enumerate() {
        let (stream_name, topic_name, topic_id, topic_last_msg) = {
            let t = &topics[idx];
            (
                t.stream_name.clone(),
                t.topic_name.clone(),
                t.topic_id,
                t.topic_last_msg,
            )
        };
        print!("[{}/{}] #{} > {}... ", n + 1, total, stream_name, topic_name);
        std::io::stdout().flush().ok();

        let messages = store.topic_messages(site_id, &stream_name, &topic_name)?;
        if messages.is_empty() {
            println!("(no messages)");
            continue;
        }

        match summarize::generate_summary(&messages, model) {
            Ok(result) => {
                summarize::save(store, topic_id, topic_last_msg, &result)?;
                println!("{}/{} ({})", result.importance, result.urgency, model);
                let t = &mut topics[idx];
                t.summary_text = Some(result.summary);
                t.importance = Some(result.importance);
                t.urgency = Some(result.urgency);
                t.summary_last_msg = topic_last_msg;
            }
            Err(err) => println!("error: {:#}", err),
        }
    }
    println!();
    Ok(())
}
