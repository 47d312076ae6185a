//! Command reference for zulite.

use anyhow::Result;

const COMMANDS: &[(&str, &str)] = &[
    ("init --url URL --email EMAIL", "Create the data dir and config"),
    ("unread [-s SITE] [-a]", "Show unread message summary"),
    ("sync --unread", "Sync threads with unread messages"),
    ("sync --mine", "Sync threads I've participated in"),
    ("sync --all", "Sync all topics from all subscribed streams"),
    ("export [STREAM [TOPIC]] [-f FMT]", "Export stored threads to JSON or Markdown"),
    ("channels [-s SITE]", "List downloaded channels"),
    ("topics STREAM [-s SITE]", "List topics in a channel"),
    ("messages STREAM TOPIC", "Show messages in a topic"),
    ("search QUERY [-n LIMIT]", "Full-text search over stored messages"),
    ("sites", "List configured Zulip sites"),
    ("summary [STREAM [TOPIC]]", "Generate AI summaries for topics"),
    ("triage [--importance L] [--urgency L]", "Filter threads by AI classification"),
    ("watch [--interval N]", "Poll and sync on an interval"),
    ("help", "Show this reference"),
];

const DEV_COMMANDS: &[(&str, &str)] = &[
    ("cargo test", "Run tests"),
    ("cargo clippy", "Lint"),
    ("cargo fmt", "Format"),
];

pub fn run(filter: Option<&str>) -> Result<()> {
    if let Some(filter) = filter {
        if filter != "--dev" {
            let all_cmds: Vec<(&str, &str)> = COMMANDS
                .iter()
                .chain(DEV_COMMANDS.iter())
                .copied()
                .collect();
            let matches: Vec<_> = all_cmds
                .iter()
                .filter(|(name, _)| name.contains(filter))
                .copied()
                .collect();
            if matches.is_empty() {
                println!("No command matching '{}'", filter);
                std::process::exit(1);
            }
            print_table(&matches);
            return Ok(());
        }
    }

    println!("zulite commands\n");
    print_table(COMMANDS);

    if filter == Some("--dev") || filter.is_none() {
        println!("\ndev commands\n");
        print_table(DEV_COMMANDS);
    }

    Ok(())
}

fn print_table(rows: &[(&str, &str)]) {
    let name_w = rows.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
    for (name, desc) in rows {
        println!("  {:<width$}  {}", name, desc, width = name_w);
    }
}
