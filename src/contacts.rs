use std::path::Path;

use serde::Deserialize;

use crate::config;
use crate::error::ConfigError;
use crate::model::{ContactInfo, PhoneNumber};

/// A contact as the address book reports it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContactEntry {
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub phone_numbers: Vec<String>,
}

impl ContactEntry {
    fn matches_prefix(&self, prefix: &str) -> bool {
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() {
            return false;
        }
        let full = format!("{} {}", self.given_name, self.family_name).to_lowercase();
        self.given_name.to_lowercase().starts_with(&prefix)
            || self.family_name.to_lowercase().starts_with(&prefix)
            || full.starts_with(&prefix)
    }
}

impl From<&ContactEntry> for ContactInfo {
    /// Snapshots the entry, keeping only its first phone number.
    fn from(entry: &ContactEntry) -> Self {
        ContactInfo::new(
            entry.given_name.clone(),
            entry.family_name.clone(),
            entry.phone_numbers.first().map(PhoneNumber::new),
        )
    }
}

/// Read-only address book lookup.
pub trait ContactDirectory {
    fn find_by_name_prefix(&self, prefix: &str) -> Vec<ContactEntry>;
}

/// Address book loaded from a JSON array of entries.
#[derive(Debug, Clone, Default)]
pub struct JsonDirectory {
    entries: Vec<ContactEntry>,
}

impl JsonDirectory {
    pub fn from_entries(entries: Vec<ContactEntry>) -> Self {
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::from_entries(config::read_json(path)?))
    }
}

impl ContactDirectory for JsonDirectory {
    fn find_by_name_prefix(&self, prefix: &str) -> Vec<ContactEntry> {
        self.entries
            .iter()
            .filter(|e| e.matches_prefix(prefix))
            .cloned()
            .collect()
    }
}
