use std::collections::HashSet;
use std::path::Path;

use super::{CatalogError, CatalogItem, CatalogResult};
use crate::answer::normalize;

/// Persistent list of items that must never be asked.
///
/// Entries are catalog ids or titles, compared in normalized form.
#[derive(Debug, Clone, Default)]
pub struct BanList {
    entries: HashSet<String>,
}

impl BanList {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|e| normalize(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Load from a JSON array of strings. A missing file is an empty list.
    pub fn load(path: &Path) -> CatalogResult<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        let entries: Vec<String> =
            serde_json::from_str(&raw).map_err(|e| CatalogError::Parse(e.to_string()))?;
        tracing::info!("Loaded {} ban list entries from {}", entries.len(), path.display());
        Ok(Self::new(entries))
    }

    pub fn is_banned(&self, item: &CatalogItem) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        self.entries.contains(&normalize(&item.id))
            || item
                .answers()
                .iter()
                .any(|a| self.entries.contains(&normalize(a)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
