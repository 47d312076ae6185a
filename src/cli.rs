use clap::{Parser, Subcommand};

use crate::summarize::DEFAULT_MODEL;

#[derive(Parser)]
#[command(
    name = "zulite",
    version,
    about = "Sync Zulip unread threads into a local SQLite replica, browse and export offline",
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory and starter config
    Init {
        /// Site name (default: derived from the URL)
        #[arg(long)]
        site: Option<String>,

        /// Zulip instance URL, e.g. https://example.zulipchat.com
        #[arg(long)]
        url: String,

        /// Account email address
        #[arg(long)]
        email: String,

        /// API key (from the Zulip personal settings page)
        #[arg(long, default_value = "")]
        api_key: String,

        /// Shell command that prints the API key
        #[arg(long, default_value = "")]
        api_key_cmd: String,

        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Show unread message summary
    Unread {
        /// Zulip site
        #[arg(short, long)]
        site: Option<String>,

        /// Show all configured sites
        #[arg(short, long)]
        all: bool,
    },

    /// Download threads (specify --all, --unread, or --mine)
    Sync {
        /// Sync threads with unread messages
        #[arg(long)]
        unread: bool,

        /// Sync threads I've participated in
        #[arg(long)]
        mine: bool,

        /// Sync everything (all topics from all subscribed streams)
        #[arg(long = "all")]
        sync_all: bool,

        /// Zulip site to sync
        #[arg(short, long)]
        site: Option<String>,

        /// Sync all configured sites
        #[arg(short = 'a', long = "all-sites")]
        all_sites: bool,

        /// Show detailed progress
        #[arg(short, long)]
        verbose: bool,

        /// Limit number of topics to sync
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Export stored messages
    Export {
        /// Channel/stream name (if omitted, export all)
        stream: Option<String>,

        /// Topic name (if omitted, export all topics in channel)
        topic: Option<String>,

        /// Zulip site
        #[arg(short, long)]
        site: Option<String>,

        /// Output format
        #[arg(short = 'f', long, default_value = "json", value_parser = ["json", "markdown"])]
        format: String,
    },

    /// List downloaded channels
    Channels {
        /// Zulip site
        #[arg(short, long)]
        site: Option<String>,
    },

    /// List topics in a channel
    Topics {
        /// Channel/stream name
        stream: String,

        /// Zulip site
        #[arg(short, long)]
        site: Option<String>,
    },

    /// Show messages in a topic
    Messages {
        /// Channel/stream name
        stream: String,

        /// Topic name
        topic: String,

        /// Zulip site
        #[arg(short, long)]
        site: Option<String>,
    },

    /// Full-text search over stored messages
    Search {
        /// Search query (FTS5 syntax)
        query: String,

        /// Zulip site
        #[arg(short, long)]
        site: Option<String>,

        /// Maximum number of hits
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// List configured Zulip sites
    Sites,

    /// Generate AI summaries for topics without them
    Summary {
        /// Channel/stream name (if omitted, process all channels)
        stream: Option<String>,

        /// Topic name (if omitted, process all topics in channel)
        topic: Option<String>,

        /// Zulip site
        #[arg(short, long)]
        site: Option<String>,

        /// Regenerate even if already summarized
        #[arg(short, long)]
        force: bool,

        /// Claude model
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,
    },

    /// Filter threads by AI-classified importance
    Triage {
        /// Zulip site
        #[arg(short, long)]
        site: Option<String>,

        /// Include all threads (not just unread)
        #[arg(short, long)]
        all: bool,

        /// Filter by minimum importance
        #[arg(long, value_parser = ["high", "medium", "low"])]
        importance: Option<String>,

        /// Filter by minimum urgency
        #[arg(long, value_parser = ["high", "medium", "low"])]
        urgency: Option<String>,

        /// Generate summaries for threads without them
        #[arg(long)]
        generate_missing: bool,

        /// Claude model
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,

        /// Limit number of summaries to generate
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Sync polling daemon
    Watch {
        /// Poll interval in seconds
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Show command reference
    Help {
        /// Filter commands by name
        filter: Option<String>,
    },
}
