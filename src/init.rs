//! Initialize the data directory and starter config.

use anyhow::{Result, bail};

use crate::resolve;

/// Derive a site name from its URL, e.g.
/// https://leanprover.zulipchat.com -> leanprover.
fn site_name_from_url(url: &str) -> String {
    let host = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or("");
    let label = host.split('.').next().unwrap_or("");
    if label.is_empty() {
        "main".to_string()
    } else {
        label.to_string()
    }
}

/// zulite init --url URL --email EMAIL [--api-key K | --api-key-cmd CMD]
pub fn run(
    site: Option<&str>,
    url: &str,
    email: &str,
    api_key: &str,
    api_key_cmd: &str,
    force: bool,
) -> Result<()> {
    if api_key.is_empty() && api_key_cmd.is_empty() {
        bail!("Provide --api-key or --api-key-cmd");
    }

    let data_dir = resolve::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let config_path = resolve::config_file();
    if config_path.exists() && !force {
        bail!(
            "Config already exists at {} (use --force to overwrite)",
            config_path.display()
        );
    }

    let name = site
        .map(String::from)
        .unwrap_or_else(|| site_name_from_url(url));

    let mut content = format!(
        "[sites.{}]\nurl = \"{}\"\nemail = \"{}\"\n",
        name,
        url.trim_end_matches('/'),
        email
    );
    if !api_key.is_empty() {
        content.push_str(&format!("api_key = \"{}\"\n", api_key));
    }
    if !api_key_cmd.is_empty() {
        content.push_str(&format!("api_key_cmd = \"{}\"\n", api_key_cmd));
    }
    content.push_str("default = true\n");

    std::fs::write(&config_path, content)?;

    println!("Created {}", config_path.display());
    println!("Data directory: {}", data_dir.display());
    println!();
    println!("Next: run 'zulite unread' or 'zulite sync --unread'");
    Ok(())
}
