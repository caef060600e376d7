//! Configuration to acknowledge user preferences as well as set defaults.
//!
//! Specifically, we try to find a jurisia.toml, and if present we load settings from there.
//! This covers the cache thresholds, the assistant endpoint and where records are kept.

use facet::Facet;
use std::fs;
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "jurisia.toml";

#[derive(Facet, Clone, Debug)]
/// User preferences loaded from jurisia.toml or falling back to defaults.
pub struct Config {
    #[facet(default = 100)]
    /// Maximum line width for text wrapping in the chat pane.
    pub wrap_width: usize,
    #[facet(default = 10_000)]
    /// Documents longer than this (in chars) are rescanned at most every `large_doc_interval_secs`.
    pub large_doc_chars: usize,
    #[facet(default = 15)]
    /// Minimum snapshot age before a large document is rescanned.
    pub large_doc_interval_secs: u64,
    #[facet(default = 2)]
    /// Size changes under this percentage of the document count as small.
    pub small_delta_percent: u32,
    #[facet(default = 20)]
    /// Minimum snapshot age before a small change triggers a rescan.
    pub small_delta_interval_secs: u64,
    #[facet(default = 5000)]
    /// Readers use the cached text while it is younger than this.
    pub fresh_max_age_ms: u64,
    #[facet(default = 50)]
    /// Delay between a forced refresh and its section scan.
    pub section_scan_delay_ms: u64,
    #[facet(default = 120)]
    /// Safety-net cache refresh period.
    pub periodic_refresh_secs: u64,
    #[facet(default = 20)]
    /// Chars of context shown around each candidate when a command is ambiguous.
    pub context_chars: usize,
    #[facet(default = String::new())]
    /// Assistant completion endpoint; empty disables the assistant fallback.
    pub endpoint: String,
    #[facet(default = "JURISIA_API_KEY".to_string())]
    /// Environment variable holding the bearer token for `endpoint`.
    pub api_key_env: String,
    #[facet(default = 60)]
    /// Timeout for one completion request.
    pub request_timeout_secs: u64,
    #[facet(default = String::new())]
    /// Directory for document and interaction records; empty disables persistence.
    pub store_dir: String,
    #[facet(default = "local".to_string())]
    /// User id sent with completion requests and stored with interactions.
    pub user_id: String,
}

impl Config {
    #[must_use]
    /// Load configuration from jurisia.toml if present.
    pub fn load() -> Self {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    #[must_use]
    /// Load configuration from `path`, falling back to defaults when it is missing or invalid.
    pub fn load_from(path: &Path) -> Self {
        if let Ok(contents) = fs::read_to_string(path) {
            match facet_toml::from_str::<Self>(&contents) {
                Ok(config) => return config,
                Err(_) => tracing::warn!("ignoring invalid config {}", path.display()),
            }
        }
        Self::defaults()
    }

    #[must_use]
    /// Built-in defaults.
    ///
    /// # Panics
    ///
    /// Panics if the empty document no longer deserialises, which would mean a field lost its
    /// default.
    pub fn defaults() -> Self {
        facet_toml::from_str::<Self>("").expect("every config field has a default")
    }
}

#[cfg(test)]
#[path = "tests/config.rs"]
mod tests;
