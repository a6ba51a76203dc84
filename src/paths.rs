//! Centralized path and key resolution.
//!
//! The task blob lives under a key derived from the application's bundle
//! identifier (`{bundle}.tasks`). Without one the literal fallback key is used.

use std::path::PathBuf;

pub const DEFAULT_STORE_KEY: &str = "remindr.tasks";

/// Resolve the database path.
/// Falls back to `$HOME/.remindr/remindr.db`.
pub fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(".remindr").join("remindr.db")
}

/// Store key for the current process, from `REMINDR_BUNDLE_ID`.
pub fn store_key() -> String {
    store_key_for(std::env::var("REMINDR_BUNDLE_ID").ok().as_deref())
}

pub fn store_key_for(bundle_id: Option<&str>) -> String {
    match bundle_id.map(str::trim) {
        Some(id) if !id.is_empty() => format!("{id}.tasks"),
        _ => DEFAULT_STORE_KEY.to_string(),
    }
}
