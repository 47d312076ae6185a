//! Per-site sync pass: discover unread state, plan from the store, run the
//! paginated fetch loop per conversation, finalize.

use anyhow::{Result, anyhow};
use std::collections::HashSet;

use crate::api::{ApiError, Client, PAGE_SIZE};
use crate::store::Store;

use super::types::{SiteReport, SkipReason, SkippedTopic};

/// Scan-cursor mode key for participation discovery.
const MODE_MINE: &str = "mine";

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub verbose: bool,
    pub limit: Option<usize>,
    /// Messages requested per page. Tests shrink this.
    pub page_size: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            verbose: false,
            limit: None,
            page_size: PAGE_SIZE,
        }
    }
}

/// A conversation-scoped failure, or one that must abort the site pass.
enum TopicError {
    Skip(SkipReason),
    Fatal(anyhow::Error),
}

/// Sync conversations that currently carry unread messages.
///
/// Auth failure or an unreachable register endpoint aborts the pass;
/// everything after Discover is isolated per conversation.
pub fn sync_unread(
    store: &mut Store,
    client: &Client,
    site_name: &str,
    opts: &SyncOptions,
) -> Result<SiteReport> {
    println!("Syncing unread from {}...", client.base_url());

    let state = register(client, site_name)?;
    let site_id = store.get_or_create_site(site_name, client.base_url())?;
    store.reconcile_unread(site_id, &state)?;

    // Plan from the store, not the raw response: what was just committed
    // is the single source of truth from here on.
    let mut plan = store.unread_topics(site_id)?;
    let mut report = SiteReport::new(site_name);

    if plan.is_empty() {
        println!("No unread messages to sync.");
        store.update_site_last_sync(site_id)?;
        return Ok(report);
    }

    if let Some(limit) = opts.limit {
        println!(
            "Found {} topics with unread messages (limiting to {}).",
            plan.len(),
            limit
        );
        plan.truncate(limit);
    } else {
        println!("Found {} topics with unread messages.", plan.len());
    }

    let total = plan.len();
    for (i, topic) in plan.iter().enumerate() {
        let stream_db_id =
            store.get_or_create_stream(site_id, topic.stream_id, &topic.stream_name)?;
        let topic_db_id = store.get_or_create_topic(stream_db_id, &topic.topic_name)?;
        let watermark = store.watermark_of(topic_db_id)?;

        // Short-circuit: everything marked unread is already stored.
        let max_unread = topic.message_ids.iter().copied().max().unwrap_or(0);
        if watermark.map(|w| max_unread <= w).unwrap_or(false) {
            if opts.verbose {
                println!(
                    "[{}/{}] #{} > {}... up to date",
                    i + 1,
                    total,
                    topic.stream_name,
                    topic.topic_name
                );
            }
            report.topics_synced += 1;
            continue;
        }

        if opts.verbose {
            println!(
                "[{}/{}] #{} > {}...",
                i + 1,
                total,
                topic.stream_name,
                topic.topic_name
            );
        }

        match fetch_topic(
            store,
            client,
            topic_db_id,
            &topic.stream_name,
            &topic.topic_name,
            watermark,
            opts,
        ) {
            Ok(inserted) => {
                report.topics_synced += 1;
                report.new_messages += inserted;
                if opts.verbose {
                    println!("  Stored {} new messages", inserted);
                }
            }
            Err(TopicError::Skip(reason)) => {
                eprintln!(
                    "  Skipping #{} > {}: {}",
                    topic.stream_name, topic.topic_name, reason
                );
                report.skipped.push(SkippedTopic {
                    stream_name: topic.stream_name.clone(),
                    topic_name: topic.topic_name.clone(),
                    reason,
                });
            }
            Err(TopicError::Fatal(err)) => return Err(err),
        }
    }

    store.update_site_last_sync(site_id)?;
    print_completion("Unread sync", &report);
    Ok(report)
}

/// Sync every topic of every non-muted subscribed stream.
pub fn sync_all(
    store: &mut Store,
    client: &Client,
    site_name: &str,
    opts: &SyncOptions,
) -> Result<SiteReport> {
    println!("Syncing all from {}...", client.base_url());

    let state = register(client, site_name)?;
    let site_id = store.get_or_create_site(site_name, client.base_url())?;
    store.reconcile_unread(site_id, &state)?;

    let streams: Vec<_> = state
        .subscriptions
        .iter()
        .filter(|s| !s.is_muted)
        .collect();
    let mut report = SiteReport::new(site_name);

    if streams.is_empty() {
        println!("No subscribed streams found.");
        store.update_site_last_sync(site_id)?;
        return Ok(report);
    }
    println!("Found {} subscribed streams.", streams.len());

    'streams: for stream in streams {
        if opts.verbose {
            println!("\n#{}...", stream.name);
        }
        let topics = match client.stream_topics(stream.stream_id) {
            Ok(t) => t,
            Err(ApiError::Auth(reason)) => {
                return Err(anyhow!("authentication failed for {}: {}", site_name, reason));
            }
            Err(err) => {
                eprintln!("  Skipping #{}: {}", stream.name, err);
                report.skipped.push(SkippedTopic {
                    stream_name: stream.name.clone(),
                    topic_name: "*".to_string(),
                    reason: SkipReason::Transient(err.to_string()),
                });
                continue;
            }
        };

        let stream_db_id = store.get_or_create_stream(site_id, stream.stream_id, &stream.name)?;

        for topic in topics {
            if opts
                .limit
                .map(|l| report.topics_synced >= l)
                .unwrap_or(false)
            {
                break 'streams;
            }

            let topic_db_id = store.get_or_create_topic(stream_db_id, &topic.name)?;
            let watermark = store.watermark_of(topic_db_id)?;

            // The topic listing names its newest id; skip topics we
            // already cover without a message request.
            if watermark.map(|w| w >= topic.max_id).unwrap_or(false) {
                continue;
            }

            if opts.verbose {
                println!("  [{}] {}...", report.topics_synced + 1, topic.name);
            }

            match fetch_topic(
                store,
                client,
                topic_db_id,
                &stream.name,
                &topic.name,
                watermark,
                opts,
            ) {
                Ok(inserted) => {
                    report.topics_synced += 1;
                    report.new_messages += inserted;
                }
                Err(TopicError::Skip(reason)) => {
                    eprintln!("  Skipping #{} > {}: {}", stream.name, topic.name, reason);
                    report.skipped.push(SkippedTopic {
                        stream_name: stream.name.clone(),
                        topic_name: topic.name.clone(),
                        reason,
                    });
                }
                Err(TopicError::Fatal(err)) => return Err(err),
            }
        }
    }

    store.update_site_last_sync(site_id)?;
    print_completion("Full sync", &report);
    Ok(report)
}

/// Sync conversations the account has participated in, discovered by
/// scanning authored messages backwards from the saved cursor.
pub fn sync_mine(
    store: &mut Store,
    client: &Client,
    site_name: &str,
    opts: &SyncOptions,
) -> Result<SiteReport> {
    println!("Syncing my topics from {}...", client.base_url());

    let site_id = store.get_or_create_site(site_name, client.base_url())?;
    let saved_cursor = store.scan_cursor(site_id, MODE_MINE)?;

    if opts.verbose {
        if saved_cursor.is_some() {
            println!("Continuing scan from previous checkpoint...");
        } else {
            println!("Scanning your message history...");
        }
    }

    let mut to_sync: Vec<(i64, String, String)> = Vec::new();
    let mut seen: HashSet<(i64, String)> = HashSet::new();
    let mut oldest_scanned = None;
    let mut before = saved_cursor;
    let mut reached_end = false;

    'scan: loop {
        let page = match client.authored_page(before, opts.page_size) {
            Ok(p) => p,
            Err(ApiError::Auth(reason)) => {
                return Err(anyhow!("authentication failed for {}: {}", site_name, reason));
            }
            Err(err) => return Err(anyhow!("history scan failed: {}", err)),
        };

        if let Some(oldest) = page.oldest_scanned {
            oldest_scanned = Some(oldest_scanned.map_or(oldest, |o: i64| o.min(oldest)));
        }

        for r in &page.refs {
            let key = (r.stream_id, r.topic.clone());
            if !seen.insert(key) {
                continue;
            }
            if store.topic_has_messages(site_id, &r.stream_name, &r.topic)? {
                continue;
            }
            if opts.verbose {
                println!("  Found: #{} > {}", r.stream_name, r.topic);
            }
            to_sync.push((r.stream_id, r.stream_name.clone(), r.topic.clone()));
            if opts.limit.map(|l| to_sync.len() >= l).unwrap_or(false) {
                break 'scan;
            }
        }

        if page.found_oldest || page.oldest_scanned.is_none() {
            reached_end = true;
            break;
        }
        before = page.oldest_scanned;
    }

    let mut report = SiteReport::new(site_name);

    if to_sync.is_empty() {
        if let Some(oldest) = oldest_scanned {
            store.update_scan_cursor(site_id, MODE_MINE, oldest)?;
        }
        let status = if reached_end {
            "All my topics synced."
        } else {
            "No new un-synced topics found."
        };
        println!("{}", status);
        store.update_site_last_sync(site_id)?;
        return Ok(report);
    }

    println!("Found {} topics to sync.", to_sync.len());

    let total = to_sync.len();
    for (i, (stream_id, stream_name, topic_name)) in to_sync.iter().enumerate() {
        if opts.verbose {
            println!("[{}/{}] #{} > {}...", i + 1, total, stream_name, topic_name);
        }
        let stream_db_id = store.get_or_create_stream(site_id, *stream_id, stream_name)?;
        let topic_db_id = store.get_or_create_topic(stream_db_id, topic_name)?;
        let watermark = store.watermark_of(topic_db_id)?;

        match fetch_topic(
            store, client, topic_db_id, stream_name, topic_name, watermark, opts,
        ) {
            Ok(inserted) => {
                report.topics_synced += 1;
                report.new_messages += inserted;
                if opts.verbose {
                    println!("  Stored {} messages", inserted);
                }
            }
            Err(TopicError::Skip(reason)) => {
                eprintln!("  Skipping #{} > {}: {}", stream_name, topic_name, reason);
                report.skipped.push(SkippedTopic {
                    stream_name: stream_name.clone(),
                    topic_name: topic_name.clone(),
                    reason,
                });
            }
            Err(TopicError::Fatal(err)) => return Err(err),
        }
    }

    // Advance the scan checkpoint only once the scanned conversations are
    // durably stored; a failed fetch keeps the cursor back so the topic is
    // rediscovered next pass.
    let had_failures = report
        .skipped
        .iter()
        .any(|s| !matches!(s.reason, SkipReason::Vanished(_)));
    if !had_failures {
        if let Some(oldest) = oldest_scanned {
            store.update_scan_cursor(site_id, MODE_MINE, oldest)?;
        }
    }

    store.update_site_last_sync(site_id)?;
    print_completion("My topics sync", &report);
    Ok(report)
}

fn register(client: &Client, site_name: &str) -> Result<crate::api::RegisterState> {
    match client.register() {
        Ok(state) => Ok(state),
        Err(ApiError::Auth(reason)) => {
            Err(anyhow!("authentication failed for {}: {}", site_name, reason))
        }
        Err(err) => Err(anyhow!("register failed for {}: {}", site_name, err)),
    }
}

/// Drive the paginated fetch loop for one conversation, merging each page
/// atomically and advancing the anchor monotonically.
///
/// The server's `found_newest` flag is authoritative for termination; a
/// short page only ends the loop when the flag is absent. An empty page
/// always ends it.
fn fetch_topic(
    store: &mut Store,
    client: &Client,
    topic_db_id: i64,
    stream_name: &str,
    topic_name: &str,
    watermark: Option<i64>,
    opts: &SyncOptions,
) -> std::result::Result<usize, TopicError> {
    let mut anchor = watermark;
    let mut inserted_total = 0;
    let mut fetched_total = 0;

    loop {
        let page = match client.fetch_page(stream_name, topic_name, anchor, opts.page_size) {
            Ok(page) => page,
            Err(ApiError::Auth(reason)) => {
                return Err(TopicError::Fatal(anyhow!("authentication failed: {}", reason)));
            }
            Err(ApiError::NotFound(reason)) => {
                return Err(TopicError::Skip(SkipReason::Vanished(reason)));
            }
            Err(err) => return Err(TopicError::Skip(SkipReason::Transient(err.to_string()))),
        };

        if page.messages.is_empty() {
            break;
        }

        let page_len = page.messages.len();
        let page_max = page.messages.last().map(|m| m.id);

        inserted_total += store
            .merge_messages(topic_db_id, &page.messages)
            .map_err(|e| TopicError::Skip(SkipReason::Store(e.to_string())))?;
        fetched_total += page_len;

        if opts.verbose && fetched_total > page_len {
            println!("  Fetched {} messages...", fetched_total);
        }

        if let Some(max) = page_max {
            anchor = Some(anchor.map_or(max, |a| a.max(max)));
        }

        match page.found_newest {
            Some(true) => break,
            Some(false) => {}
            None => {
                if page_len < opts.page_size {
                    break;
                }
            }
        }
    }

    Ok(inserted_total)
}

fn print_completion(label: &str, report: &SiteReport) {
    println!(
        "{} complete. {} new messages from {} topics.",
        label, report.new_messages, report.topics_synced
    );
    if !report.skipped.is_empty() {
        println!("Skipped {} topic(s):", report.skipped.len());
        for skip in &report.skipped {
            println!(
                "  #{} > {}: {}",
                skip.stream_name, skip.topic_name, skip.reason
            );
        }
    }
}
