//! Codex CLI rollout JSONL parser

use crate::types::{RawUsageSnapshot, Result, UsageEvent, WrappedError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::session::SessionState;
use super::SessionLogParser;

/// Default model when a session never names one
pub const DEFAULT_FALLBACK_MODEL: &str = "gpt-5";

/// Codex JSONL line
#[derive(Deserialize)]
struct CodexJsonLine<'a> {
    #[serde(rename = "type")]
    line_type: &'a str,
    #[serde(default, borrow)]
    timestamp: Option<&'a str>,
    #[serde(default)]
    payload: Option<CodexPayload>,
}

#[derive(Deserialize)]
struct CodexPayload {
    #[serde(rename = "type", default)]
    payload_type: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    metadata: Option<CodexMetadata>,
    #[serde(default)]
    info: Option<CodexInfo>,
}

#[derive(Deserialize)]
struct CodexInfo {
    #[serde(default)]
    total_token_usage: Option<CodexTokenUsage>,
    #[serde(default)]
    last_token_usage: Option<CodexTokenUsage>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    model_name: Option<String>,
    #[serde(default)]
    metadata: Option<CodexMetadata>,
}

#[derive(Deserialize)]
struct CodexMetadata {
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct CodexTokenUsage {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default, alias = "cache_read_input_tokens")]
    cached_input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
    #[serde(default)]
    reasoning_output_tokens: Option<u64>,
    #[serde(default)]
    total_tokens: Option<u64>,
}

impl CodexTokenUsage {
    fn snapshot(&self) -> RawUsageSnapshot {
        RawUsageSnapshot::new(
            self.input_tokens.unwrap_or(0),
            self.cached_input_tokens.unwrap_or(0),
            self.output_tokens.unwrap_or(0),
            self.reasoning_output_tokens.unwrap_or(0),
            self.total_tokens.unwrap_or(0),
        )
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
}

impl CodexPayload {
    /// First non-empty model name, most specific location first
    fn embedded_model(&self) -> Option<String> {
        if let Some(info) = &self.info {
            let from_info = non_empty(info.model.as_ref())
                .or_else(|| non_empty(info.model_name.as_ref()))
                .or_else(|| non_empty(info.metadata.as_ref().and_then(|m| m.model.as_ref())));
            if from_info.is_some() {
                return from_info;
            }
        }
        non_empty(self.model.as_ref())
            .or_else(|| non_empty(self.metadata.as_ref().and_then(|m| m.model.as_ref())))
    }
}

/// Usage data extracted from a token_count event
struct TokenCountData {
    timestamp: DateTime<Utc>,
    last: Option<RawUsageSnapshot>,
    total: Option<RawUsageSnapshot>,
    model: Option<String>,
}

/// Result of parsing a single line
enum ParseResult {
    Skip,
    Model(String),
    TokenCount(TokenCountData),
}

/// Parser for Codex CLI session logs
pub struct CodexParser {
    data_dir: PathBuf,
    fallback_model: String,
}

impl CodexParser {
    /// Create a new parser with default data directory (~/.codex/sessions/)
    pub fn new() -> Self {
        let home = directories::BaseDirs::new()
            .map(|d| d.home_dir().to_path_buf())
            .unwrap_or_else(|| {
                tracing::warn!("could not determine home directory");
                PathBuf::from(".")
            });
        Self::with_data_dir(home.join(".codex").join("sessions"))
    }

    /// Create a parser with a custom sessions directory
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
        }
    }

    pub fn with_fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = model.into();
        self
    }

    /// Parse a single JSONL line
    fn parse_line(&self, line: &mut [u8]) -> ParseResult {
        if line.is_empty() {
            return ParseResult::Skip;
        }

        let data: CodexJsonLine = match simd_json::from_slice(line) {
            Ok(d) => d,
            Err(_) => return ParseResult::Skip,
        };

        let payload = match &data.payload {
            Some(p) => p,
            None => return ParseResult::Skip,
        };

        if data.line_type == "turn_context" {
            return match payload.embedded_model() {
                Some(model) => ParseResult::Model(model),
                None => ParseResult::Skip,
            };
        }

        if data.line_type != "event_msg" {
            return ParseResult::Skip;
        }

        if payload.payload_type.as_deref() != Some("token_count") {
            return ParseResult::Skip;
        }

        let raw_timestamp = match data.timestamp {
            Some(t) if !t.is_empty() => t,
            _ => return ParseResult::Skip,
        };

        let info = match &payload.info {
            Some(i) => i,
            None => return ParseResult::Skip,
        };

        let timestamp = match DateTime::parse_from_rfc3339(raw_timestamp) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(_) => {
                debug!(
                    timestamp = raw_timestamp,
                    "invalid timestamp, skipping entry"
                );
                return ParseResult::Skip;
            }
        };

        ParseResult::TokenCount(TokenCountData {
            timestamp,
            last: info
                .last_token_usage
                .as_ref()
                .map(CodexTokenUsage::snapshot),
            total: info
                .total_token_usage
                .as_ref()
                .map(CodexTokenUsage::snapshot),
            model: payload.embedded_model(),
        })
    }

    /// Fold the lines of one session into usage events
    pub fn parse_lines<I, S>(&self, session_id: &str, lines: I) -> Vec<UsageEvent>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut state = SessionState::new();
        let mut events = Vec::new();

        for line in lines {
            let trimmed = line.as_ref().trim_ascii();
            if trimmed.is_empty() {
                continue;
            }

            let mut line_bytes = trimmed.to_vec();
            match self.parse_line(&mut line_bytes) {
                ParseResult::Skip => {}
                ParseResult::Model(m) => state.observe_context_model(&m),
                ParseResult::TokenCount(data) => {
                    let delta = match state.delta(data.last, data.total) {
                        Some(d) => d,
                        None => continue,
                    };

                    // Skip zero-delta events
                    if delta.is_zero() {
                        continue;
                    }

                    let resolved =
                        state.resolve_model(data.model.as_deref(), &self.fallback_model);
                    events.push(UsageEvent::new(
                        session_id,
                        data.timestamp,
                        resolved.name,
                        resolved.is_fallback,
                        delta,
                    ));
                }
            }
        }

        events
    }
}

impl Default for CodexParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLogParser for CodexParser {
    fn name(&self) -> &str {
        "codex"
    }

    fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn file_extension(&self) -> &str {
        "jsonl"
    }

    fn parse_file(&self, path: &Path) -> Result<Vec<UsageEvent>> {
        let file = File::open(path).map_err(WrappedError::Io)?;
        let reader = BufReader::new(file);
        let session_id = self.session_id(path);

        let lines = reader.split(b'\n').map_while(|line| match line {
            Ok(l) => Some(l),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "stopped reading session file");
                None
            }
        });

        Ok(self.parse_lines(&session_id, lines))
    }
}
