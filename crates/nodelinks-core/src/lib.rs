//! Core library for nodelinks: one shared npm dependency store linked into many projects,
//! registry mirror ranking, and the settings that tie them together.
//! Used by the CLI binary; every component takes its catalog and settings as parameters.

pub mod backend;
pub mod catalog;
pub mod config;
pub mod error_handling;
pub mod http_client;
pub mod link;
pub mod probe;
pub mod prompt;
pub mod rank;
pub mod safety;
pub mod store;
pub mod utils;

// Re-export main API for CLI
pub use backend::{ListOutcome, NpmBackend, TopLevelPackage};
pub use catalog::{Catalog, Mirror, Resolved};
pub use config::{Settings, SettingsStore};
pub use error_handling::{NodelinksError, Result};
pub use link::{create_link, remove_link, LinkOutcome};
pub use probe::{probe, LatencyRating, ProbeResult};
pub use prompt::{Prompt, StdinPrompt};
pub use rank::{rank_all, RankedEntry, Ranking, Selector};
pub use safety::is_dangerous;
pub use utils::{log, log_error, tool_home};
