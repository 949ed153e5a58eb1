//! Type definitions for codex-wrapped

mod error;
mod summary;
mod usage;

pub use error::*;
pub use summary::*;
pub use usage::*;
