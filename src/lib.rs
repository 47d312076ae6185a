//! zulite — local Zulip message sync and unread management.
//!
//! Replicates unread state and thread contents from one or more Zulip
//! sites into a SQLite database, incrementally: every pass transfers only
//! messages newer than each conversation's stored watermark.

pub mod api;
pub mod browse;
pub mod cli;
pub mod credentials;
pub mod export;
pub mod help;
pub mod init;
pub mod resolve;
pub mod store;
pub mod summarize;
pub mod sync;
pub mod triage;
pub mod unread;
pub mod util;
pub mod watch;
