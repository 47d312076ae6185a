//! Unread summary — refresh the unread state from the server, then print
//! the per-stream/per-topic table.

use anyhow::Result;

use crate::api::Client;
use crate::credentials::{self, resolve_api_key};
use crate::resolve;
use crate::store::Store;

/// zulite unread [-s SITE] [-a]
pub fn run(site: Option<&str>, all: bool) -> Result<()> {
    let config = credentials::load_config(None)?;
    let names = credentials::select_sites(&config, site, all)?;
    let mut store = Store::open(&resolve::db_file())?;

    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            println!();
        }
        show_site(&mut store, &config, name)?;
    }
    Ok(())
}

fn show_site(store: &mut Store, config: &credentials::Config, name: &str) -> Result<()> {
    let site = credentials::get_site(config, name)?;
    let api_key = resolve_api_key(site)?;
    let client = Client::new(&site.url, &site.email, &api_key);

    println!("Fetching unread messages from {}...", client.base_url());

    let state = client.register()?;
    let site_id = store.get_or_create_site(name, client.base_url())?;
    store.reconcile_unread(site_id, &state)?;

    let total = store.total_unread(site_id)?;
    let summary = store.unread_summary(site_id)?;

    println!();
    println!("{} - {} unread messages", client.base_url(), total);
    println!();

    if summary.is_empty() {
        println!("  No unread messages in streams.");
    } else {
        for stream in &summary {
            println!("#{} ({} unread)", stream.stream_name, stream.total);
            for topic in &stream.topics {
                println!("  └─ {} ({})", topic.topic_name, topic.count);
            }
        }
    }

    // DMs and mentions are reported for display but not persisted;
    // stream conversations are the sync unit.
    if state.pm_unread_count > 0 {
        println!();
        println!("Direct messages: {} unread", state.pm_unread_count);
    }
    if state.mention_count > 0 {
        println!();
        println!("Mentions: {} unread", state.mention_count);
    }
    Ok(())
}
