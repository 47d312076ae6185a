//! Site configuration — parse .zulite.toml with per-site API credentials.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::resolve;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    /// Base URL of the Zulip instance, without trailing slash.
    #[serde(default)]
    pub url: String,
    pub email: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_key_cmd: String,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    #[serde(default)]
    pub notify: bool,
}

fn default_poll_interval() -> u64 {
    300
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: 300,
            notify: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub sites: BTreeMap<String, Site>,
    #[serde(default)]
    pub watch: Option<WatchConfig>,
}

/// Load .zulite.toml from a given path or the resolved location.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.map(PathBuf::from).unwrap_or_else(resolve::config_file);
    if !path.exists() {
        bail!(
            ".zulite.toml not found at {}.\nRun 'zulite init' to create it.",
            path.display()
        );
    }
    let content = std::fs::read_to_string(&path)?;
    let mut config: Config = toml::from_str(&content)?;
    for (name, site) in &mut config.sites {
        if site.url.is_empty() {
            bail!("Site '{}' has no url", name);
        }
        site.url = site.url.trim_end_matches('/').to_string();
    }
    Ok(config)
}

/// Resolve the API key: inline value if set, else run api_key_cmd.
pub fn resolve_api_key(site: &Site) -> Result<String> {
    if !site.api_key.is_empty() {
        return Ok(site.api_key.clone());
    }
    if !site.api_key_cmd.is_empty() {
        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(&site.api_key_cmd)
            .output()?;
        if !output.status.success() {
            bail!(
                "api_key_cmd failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
    }
    bail!("Site {:?} has no api_key or api_key_cmd", site.email)
}

/// Return the name of the default site: the one flagged `default = true`,
/// else the first configured site.
pub fn default_site(config: &Config) -> Result<String> {
    for (name, site) in &config.sites {
        if site.default {
            return Ok(name.clone());
        }
    }
    let name = config
        .sites
        .keys()
        .next()
        .ok_or_else(|| anyhow::anyhow!("No sites configured"))?;
    Ok(name.clone())
}

/// Look up one site by name, failing with the list of known sites.
pub fn get_site<'a>(config: &'a Config, name: &str) -> Result<&'a Site> {
    match config.sites.get(name) {
        Some(site) => Ok(site),
        None => bail!(
            "Unknown site: {}\nAvailable: {}",
            name,
            config.sites.keys().cloned().collect::<Vec<_>>().join(", ")
        ),
    }
}

/// Resolve the list of site names to operate on.
///
/// `all` wins over an explicit name; no name means the default site.
pub fn select_sites(config: &Config, site: Option<&str>, all: bool) -> Result<Vec<String>> {
    if all {
        return Ok(config.sites.keys().cloned().collect());
    }
    let name = match site {
        Some(s) => {
            get_site(config, s)?;
            s.to_string()
        }
        None => default_site(config)?,
    };
    Ok(vec![name])
}
