//! Session log discovery and parsing

mod codex;
mod session;

pub use codex::{CodexParser, DEFAULT_FALLBACK_MODEL};
pub use session::{ResolvedModel, SessionState};

use crate::types::{Result, UsageEvent};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Trait for parsing per-session usage logs
pub trait SessionLogParser: Send + Sync {
    /// Parser name (e.g., "codex")
    fn name(&self) -> &str;

    /// Root directory scanned for session files
    fn data_dir(&self) -> &Path;

    /// Session file extension, matched case-insensitively (e.g., "jsonl")
    fn file_extension(&self) -> &str;

    /// Parse a single session file and return its usage events in file order
    fn parse_file(&self, path: &Path) -> Result<Vec<UsageEvent>>;

    /// Session id: path relative to the data dir, `/`-separated, extension stripped
    fn session_id(&self, path: &Path) -> String {
        let relative = path.strip_prefix(self.data_dir()).unwrap_or(path);
        let joined = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let suffix_len = self.file_extension().len() + 1;
        let lower = joined.to_ascii_lowercase();
        if lower.ends_with(&format!(".{}", self.file_extension().to_ascii_lowercase()))
            && joined.len() >= suffix_len
        {
            joined[..joined.len() - suffix_len].to_string()
        } else {
            joined
        }
    }

    /// Collect all session files at any depth below the data dir.
    /// A missing or unreadable directory yields no files.
    fn collect_files(&self) -> Vec<PathBuf> {
        let escaped = glob::Pattern::escape(&self.data_dir().to_string_lossy());
        let pattern = format!("{}/**/*.{}", escaped, self.file_extension());
        let options = glob::MatchOptions {
            case_sensitive: false,
            ..Default::default()
        };

        glob::glob_with(&pattern, options)
            .map(|paths| {
                paths
                    .filter_map(|e| e.ok())
                    .filter(|p| p.is_file())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Parse all files in parallel using rayon, then merge into one
    /// timestamp-ordered stream
    fn parse_all(&self) -> Vec<UsageEvent> {
        let files = self.collect_files();
        debug!(
            parser = self.name(),
            files = files.len(),
            "collected session files"
        );
        self.parse_files(&files)
    }

    /// Parse the given files in parallel; unreadable files are skipped.
    fn parse_files(&self, files: &[PathBuf]) -> Vec<UsageEvent> {
        let mut events: Vec<UsageEvent> = files
            .par_iter()
            .flat_map(|f| match self.parse_file(f) {
                Ok(events) => events,
                Err(e) => {
                    warn!(path = %f.display(), error = %e, "failed to parse session file");
                    Vec::new()
                }
            })
            .collect();

        sort_events(&mut events);
        events
    }
}

/// Global order: timestamp, then session id. Stable, so a session's events
/// with equal timestamps keep their file order.
pub fn sort_events(events: &mut [UsageEvent]) {
    events.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
}
