//! Path resolution for zulite data and config.
//!
//! Resolution order for the data directory:
//!   1. ZULITE_DATA environment variable
//!   2. Platform data dir (e.g. ~/.local/share/zulite)
//!   3. ./zulite-data as a last resort

use directories::ProjectDirs;
use std::path::PathBuf;

/// Return the data directory path.
pub fn data_dir() -> PathBuf {
    if let Ok(env) = std::env::var("ZULITE_DATA") {
        if !env.is_empty() {
            return PathBuf::from(env);
        }
    }
    if let Some(dirs) = ProjectDirs::from("", "", "zulite") {
        return dirs.data_dir().to_path_buf();
    }
    PathBuf::from("zulite-data")
}

// --- Derived helpers: data paths ---

pub fn db_file() -> PathBuf {
    data_dir().join("zulite.db")
}

pub fn export_dir() -> PathBuf {
    data_dir().join("export")
}

// --- Derived helpers: config paths ---

/// Resolve the config file path: ZULITE_CONFIG, then .zulite.toml in the
/// data dir, then zulite.toml there.
pub fn config_file() -> PathBuf {
    if let Ok(env) = std::env::var("ZULITE_CONFIG") {
        if !env.is_empty() {
            return PathBuf::from(env);
        }
    }
    let dir = data_dir();
    let dotfile = dir.join(".zulite.toml");
    if dotfile.exists() {
        return dotfile;
    }
    let plain = dir.join("zulite.toml");
    if plain.exists() {
        return plain;
    }
    // Default to .zulite.toml (for creation)
    dotfile
}
