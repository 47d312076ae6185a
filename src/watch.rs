//! Sync polling daemon — runs an unread pass across all configured sites
//! on an interval.

use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::api::Client;
use crate::credentials::{self, resolve_api_key};
use crate::resolve;
use crate::store::Store;
use crate::sync::engine::{self, SyncOptions};

/// Desktop notification (best-effort).
fn notify(title: &str, body: &str) {
    #[cfg(target_os = "macos")]
    {
        let _ = std::process::Command::new("osascript")
            .arg("-e")
            .arg(format!(
                "display notification \"{}\" with title \"{}\"",
                body, title
            ))
            .output();
    }
    #[cfg(target_os = "linux")]
    {
        let _ = std::process::Command::new("notify-send")
            .arg(title)
            .arg(body)
            .output();
    }
}

/// One pass over every configured site. Returns messages newly stored.
fn poll_once(notify_enabled: bool) -> usize {
    let config = match credentials::load_config(None) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            return 0;
        }
    };
    let mut store = match Store::open(&resolve::db_file()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open store: {:#}", e);
            return 0;
        }
    };

    let opts = SyncOptions::default();
    let mut new_messages = 0;

    for (name, site) in &config.sites {
        println!("\n=== Site: {} ({}) ===", name, site.url);
        let api_key = match resolve_api_key(site) {
            Ok(k) => k,
            Err(e) => {
                eprintln!("  Error resolving credentials for {}: {:#}", name, e);
                continue;
            }
        };
        let client = Client::new(&site.url, &site.email, &api_key);
        match engine::sync_unread(&mut store, &client, name, &opts) {
            Ok(report) => new_messages += report.new_messages,
            Err(e) => {
                eprintln!("  Error syncing {}: {:#}", name, e);
                continue;
            }
        }
    }

    if new_messages > 0 {
        println!("\n{} new message(s) stored", new_messages);
        if notify_enabled {
            notify("zulite", &format!("{} new message(s)", new_messages));
        }
    } else {
        println!("\nNo new messages");
    }

    new_messages
}

/// zulite watch [--interval N]
#[tokio::main]
pub async fn run(interval_override: Option<u64>) -> Result<()> {
    let config = credentials::load_config(None)?;
    let watch = config.watch.clone().unwrap_or_default();
    let interval = interval_override.unwrap_or(watch.poll_interval);

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    // Handle Ctrl-C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        println!("\nReceived signal, shutting down...");
        shutdown_clone.store(true, Ordering::Relaxed);
    });

    println!("zulite watch: polling every {}s (Ctrl-C to stop)", interval);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        // Sync work is blocking I/O
        let notify_enabled = watch.notify;
        tokio::task::spawn_blocking(move || {
            poll_once(notify_enabled);
        })
        .await?;

        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        tokio::time::sleep(tokio::time::Duration::from_secs(interval)).await;
    }

    println!("zulite watch: stopped");
    Ok(())
}
