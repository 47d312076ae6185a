//! Sync pass outcome types: per-conversation skips and per-site reports.

use std::fmt;

/// Why one conversation was skipped without aborting the pass.
#[derive(Debug, Clone)]
pub enum SkipReason {
    /// The conversation no longer exists remotely. Not an error.
    Vanished(String),
    /// Retries exhausted on a transient failure.
    Transient(String),
    /// The local store refused the batch.
    Store(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Vanished(reason) => write!(f, "gone remotely ({})", reason),
            SkipReason::Transient(reason) => write!(f, "{}", reason),
            SkipReason::Store(reason) => write!(f, "store error: {}", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkippedTopic {
    pub stream_name: String,
    pub topic_name: String,
    pub reason: SkipReason,
}

/// Outcome of one completed per-site pass. Skips are non-fatal; a report
/// existing at all means the pass ran to the end.
#[derive(Debug, Clone, Default)]
pub struct SiteReport {
    pub site: String,
    pub topics_synced: usize,
    pub new_messages: usize,
    pub skipped: Vec<SkippedTopic>,
}

impl SiteReport {
    pub fn new(site: &str) -> Self {
        SiteReport {
            site: site.to_string(),
            ..Default::default()
        }
    }
}
