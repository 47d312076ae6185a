//! Read-only listings over the local replica: channels, topics, messages,
//! full-text search, configured sites.

use anyhow::{Result, anyhow, bail};

use crate::credentials;
use crate::resolve;
use crate::store::Store;
use crate::util::format_timestamp;

/// Resolve the site name argument against the config.
pub(crate) fn resolve_site_name(site: Option<&str>) -> Result<String> {
    let config = credentials::load_config(None)?;
    match site {
        Some(name) => {
            credentials::get_site(&config, name)?;
            Ok(name.to_string())
        }
        None => credentials::default_site(&config),
    }
}

/// Look up the site's store id, failing with a hint to sync first.
pub(crate) fn require_site_id(store: &Store, name: &str) -> Result<i64> {
    store
        .site_id(name)?
        .ok_or_else(|| anyhow!("No data found for site '{}'. Run 'sync' first.", name))
}

/// zulite channels [-s SITE]
pub fn run_channels(site: Option<&str>) -> Result<()> {
    let name = resolve_site_name(site)?;
    let store = Store::open(&resolve::db_file())?;
    let site_id = require_site_id(&store, &name)?;

    let channels = store.channels_summary(site_id)?;
    if channels.is_empty() {
        println!("No channels downloaded for {}. Run 'sync' first.", name);
        return Ok(());
    }

    println!("Downloaded channels for {}:", name);
    println!();
    for ch in &channels {
        let unread = if ch.unread_count > 0 {
            format!(" ({} unread)", ch.unread_count)
        } else {
            String::new()
        };
        println!("#{}{}", ch.stream_name, unread);
        println!("  {} topics, {} messages", ch.topic_count, ch.message_count);
    }
    Ok(())
}

/// zulite topics STREAM [-s SITE]
pub fn run_topics(stream_name: &str, site: Option<&str>) -> Result<()> {
    let name = resolve_site_name(site)?;
    let store = Store::open(&resolve::db_file())?;
    let site_id = require_site_id(&store, &name)?;

    if store.stream_by_name(site_id, stream_name)?.is_none() {
        eprintln!("Channel '{}' not found. Available channels:", stream_name);
        for ch in store.channels_summary(site_id)? {
            eprintln!("  - {}", ch.stream_name);
        }
        bail!("unknown channel: {}", stream_name);
    }

    let topics = store.topics_summary(site_id, stream_name)?;
    if topics.is_empty() {
        println!("No topics downloaded for #{}.", stream_name);
        return Ok(());
    }

    println!("#{} - {} topics:", stream_name, topics.len());
    println!();
    for topic in &topics {
        let unread = if topic.unread_count > 0 {
            format!(" ({} unread)", topic.unread_count)
        } else {
            String::new()
        };
        println!("  {}{}", topic.topic_name, unread);
        println!("    {} messages", topic.message_count);
    }
    Ok(())
}

/// zulite messages STREAM TOPIC [-s SITE]
pub fn run_messages(stream_name: &str, topic_name: &str, site: Option<&str>) -> Result<()> {
    let name = resolve_site_name(site)?;
    let store = Store::open(&resolve::db_file())?;
    let site_id = require_site_id(&store, &name)?;

    let messages = store.topic_messages_with_unread(site_id, stream_name, topic_name)?;
    if messages.is_empty() {
        eprintln!("No messages found for #{} > {}.", stream_name, topic_name);
        bail!("either the topic doesn't exist or it hasn't been synced");
    }

    let unread_count = messages.iter().filter(|(_, unread)| *unread).count();
    println!("#{} > {}", stream_name, topic_name);
    println!("{} messages ({} unread)", messages.len(), unread_count);
    println!();
    println!("{}", "=".repeat(60));

    for (msg, is_unread) in &messages {
        let status = if *is_unread { "[UNREAD] " } else { "" };
        println!();
        println!(
            "{}{} ({})",
            status,
            msg.sender_name,
            format_timestamp(msg.timestamp)
        );
        println!("{}", "-".repeat(40));
        println!("{}", msg.content_text);
        println!();
    }
    Ok(())
}

/// zulite search QUERY [-s SITE] [-n LIMIT]
pub fn run_search(query: &str, site: Option<&str>, limit: usize) -> Result<()> {
    let name = resolve_site_name(site)?;
    let store = Store::open(&resolve::db_file())?;
    let site_id = require_site_id(&store, &name)?;

    let hits = store.search(site_id, query, limit)?;
    if hits.is_empty() {
        println!("No matches for '{}'.", query);
        return Ok(());
    }

    println!("{} match(es) for '{}':", hits.len(), query);
    println!();
    for hit in &hits {
        println!(
            "#{} > {}  {} ({})",
            hit.stream_name,
            hit.topic_name,
            hit.sender_name,
            format_timestamp(hit.timestamp)
        );
        println!("  {}", hit.snippet);
    }
    Ok(())
}

/// zulite sites
pub fn run_sites() -> Result<()> {
    let config = credentials::load_config(None)?;
    let default = credentials::default_site(&config)?;
    let store = Store::open(&resolve::db_file())?;

    println!("Configured sites:");
    for (name, site) in &config.sites {
        let marker = if *name == default { " (default)" } else { "" };
        let last_sync = store
            .site_last_sync(name)?
            .map(|ts| format!(", last sync {}", ts))
            .unwrap_or_default();
        println!("  - {}{} [{}{}]", name, marker, site.url, last_sync);
    }
    Ok(())
}
