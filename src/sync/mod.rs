//! Zulip sync — replicate unread state and thread contents into the local
//! store, one site at a time.

pub mod engine;
pub mod types;

use anyhow::{Result, bail};

use crate::api::Client;
use crate::credentials::{self, resolve_api_key};
use crate::resolve;
use crate::store::Store;

use self::engine::SyncOptions;
use self::types::SiteReport;

/// Which discovery paths to run for each site.
#[derive(Debug, Clone, Copy, Default)]
pub struct Modes {
    pub unread: bool,
    pub mine: bool,
    pub all: bool,
}

impl Modes {
    pub fn any(&self) -> bool {
        self.unread || self.mine || self.all
    }
}

/// zulite sync [--unread|--mine|--all] [-s SITE] [-a] [-n LIMIT] [-v]
///
/// Every requested site is attempted; a failure in one site never stops
/// the rest, but any failure makes the whole run exit non-zero.
pub fn run(
    modes: Modes,
    site: Option<&str>,
    all_sites: bool,
    verbose: bool,
    limit: Option<usize>,
) -> Result<()> {
    if !modes.any() {
        print_usage();
        return Ok(());
    }

    let config = credentials::load_config(None)?;
    let names = credentials::select_sites(&config, site, all_sites)?;
    let mut store = Store::open(&resolve::db_file())?;
    let opts = SyncOptions {
        verbose,
        limit,
        ..Default::default()
    };

    let mut failures: Vec<String> = Vec::new();

    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            println!();
        }
        if names.len() > 1 {
            println!("=== Site: {} ===", name);
        }
        if let Err(err) = sync_site(&mut store, &config, name, modes, &opts) {
            eprintln!("Error syncing {}: {:#}", name, err);
            failures.push(name.clone());
        }
    }

    if !failures.is_empty() {
        bail!("sync failed for: {}", failures.join(", "));
    }
    Ok(())
}

/// Run the requested modes for one site against one client.
fn sync_site(
    store: &mut Store,
    config: &credentials::Config,
    name: &str,
    modes: Modes,
    opts: &SyncOptions,
) -> Result<Vec<SiteReport>> {
    let site = credentials::get_site(config, name)?;
    let api_key = resolve_api_key(site)?;
    let client = Client::new(&site.url, &site.email, &api_key);

    let mut reports = Vec::new();
    if modes.all {
        reports.push(engine::sync_all(store, &client, name, opts)?);
        return Ok(reports);
    }
    if modes.unread {
        reports.push(engine::sync_unread(store, &client, name, opts)?);
    }
    if modes.mine {
        if modes.unread {
            println!();
        }
        reports.push(engine::sync_mine(store, &client, name, opts)?);
    }
    Ok(reports)
}

fn print_usage() {
    println!("Usage: zulite sync [--all | --unread | --mine] [-s SITE] [-v] [-n LIMIT]");
    println!();
    println!("Modes:");
    println!("  --all      Sync everything (all topics from all subscribed streams)");
    println!("  --unread   Sync threads with unread messages");
    println!("  --mine     Sync threads I've participated in");
    println!();
    println!("Options:");
    println!("  -s, --site   Zulip site to sync");
    println!("  -a           Sync all configured sites");
    println!("  -v           Show detailed progress");
    println!("  -n LIMIT     Limit number of topics to sync");
}
