use anyhow::Result;
use clap::Parser;

use zulite::cli::{Cli, Commands};
use zulite::sync::Modes;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            site,
            url,
            email,
            api_key,
            api_key_cmd,
            force,
        } => zulite::init::run(site.as_deref(), &url, &email, &api_key, &api_key_cmd, force),
        Commands::Unread { site, all } => zulite::unread::run(site.as_deref(), all),
        Commands::Sync {
            unread,
            mine,
            sync_all,
            site,
            all_sites,
            verbose,
            limit,
        } => zulite::sync::run(
            Modes {
                unread,
                mine,
                all: sync_all,
            },
            site.as_deref(),
            all_sites,
            verbose,
            limit,
        ),
        Commands::Export {
            stream,
            topic,
            site,
            format,
        } => zulite::export::run(
            stream.as_deref(),
            topic.as_deref(),
            site.as_deref(),
            &format,
        ),
        Commands::Channels { site } => zulite::browse::run_channels(site.as_deref()),
        Commands::Topics { stream, site } => zulite::browse::run_topics(&stream, site.as_deref()),
        Commands::Messages {
            stream,
            topic,
            site,
        } => zulite::browse::run_messages(&stream, &topic, site.as_deref()),
        Commands::Search { query, site, limit } => {
            zulite::browse::run_search(&query, site.as_deref(), limit)
        }
        Commands::Sites => zulite::browse::run_sites(),
        Commands::Summary {
            stream,
            topic,
            site,
            force,
            model,
        } => zulite::summarize::run(
            stream.as_deref(),
            topic.as_deref(),
            site.as_deref(),
            force,
            &model,
        ),
        Commands::Triage {
            site,
            all,
            importance,
            urgency,
            generate_missing,
            model,
            limit,
        } => zulite::triage::run(
            site.as_deref(),
            all,
            importance.as_deref(),
            urgency.as_deref(),
            generate_missing,
            &model,
            limit,
        ),
        Commands::Watch { interval } => zulite::watch::run(interval),
        Commands::Help { filter } => zulite::help::run(filter.as_deref()),
    }
}
