//! Per-session scan state
//!
//! One `SessionState` lives for the duration of a single file scan. It tracks
//! the active model and the last cumulative usage snapshot so that usage
//! records reporting only running totals can be turned into deltas.

use crate::types::{RawUsageSnapshot, TokenDelta};

/// Where the session's current model name came from
#[derive(Debug, Clone, PartialEq, Eq)]
enum ModelSource {
    /// No model seen yet
    Unknown,
    /// Named by a context record or a usage payload
    Known(String),
    /// Configured fallback; sticks until a real model name appears
    Fallback(String),
}

/// Model attributed to one usage event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub name: String,
    pub is_fallback: bool,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    model: ModelSource,
    previous_totals: Option<RawUsageSnapshot>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            model: ModelSource::Unknown,
            previous_totals: None,
        }
    }

    /// A context record named a model
    pub fn observe_context_model(&mut self, model: &str) {
        self.model = ModelSource::Known(model.to_string());
    }

    /// Compute the delta for a usage record.
    ///
    /// An explicit incremental snapshot wins. Otherwise the cumulative snapshot
    /// is differenced against the previous one (zero baseline for the first).
    /// The cumulative snapshot is remembered whenever present.
    pub fn delta(
        &mut self,
        last: Option<RawUsageSnapshot>,
        total: Option<RawUsageSnapshot>,
    ) -> Option<TokenDelta> {
        let raw = match (last, total) {
            (Some(last), _) => Some(last),
            (None, Some(total)) => {
                let baseline = self.previous_totals.unwrap_or_default();
                Some(total.saturating_delta(&baseline))
            }
            (None, None) => None,
        };

        if total.is_some() {
            self.previous_totals = total;
        }

        raw.map(RawUsageSnapshot::to_delta)
    }

    /// Pick the model for a usage record.
    ///
    /// A model embedded in the record becomes the session model. Without one,
    /// the tracked model is used; with nothing tracked the fallback is applied
    /// and the session stays on it.
    pub fn resolve_model(&mut self, embedded: Option<&str>, fallback: &str) -> ResolvedModel {
        if let Some(name) = embedded {
            self.model = ModelSource::Known(name.to_string());
            return ResolvedModel {
                name: name.to_string(),
                is_fallback: false,
            };
        }

        match &self.model {
            ModelSource::Known(name) => ResolvedModel {
                name: name.clone(),
                is_fallback: false,
            },
            ModelSource::Fallback(name) => ResolvedModel {
                name: name.clone(),
                is_fallback: true,
            },
            ModelSource::Unknown => {
                self.model = ModelSource::Fallback(fallback.to_string());
                ResolvedModel {
                    name: fallback.to_string(),
                    is_fallback: true,
                }
            }
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
