//! Catalog sources: where trivia material comes from
//!
//! A catalog is any ranked collection of items (a game database dump, a media
//! database, a quiz-question bank). The sampler only ever asks two things of
//! it: how many items satisfy a filter, and which item sits at a given rank.

mod banlist;
pub mod ranked;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::answer::normalize;
use crate::types::{CatalogId, QuestionSpec, SortOrder, ALL_CATEGORIES};

pub use banlist::BanList;
pub use ranked::RankedCatalog;

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur while querying a catalog
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Rate limited or temporarily failing; worth retrying
    #[error("Catalog temporarily unavailable: {0}")]
    Transient(String),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    #[error("Catalog data could not be parsed: {0}")]
    Parse(String),

    #[error("Catalog I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CatalogError::Transient(_))
    }
}

/// One raw candidate record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    pub id: CatalogId,
    pub title: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Top-level medium, e.g. "anime" or "manga"
    #[serde(default)]
    pub medium: Option<String>,
    /// Sub-type within the medium, e.g. "tv", "movie", "oneshot"
    #[serde(default)]
    pub kind: Option<String>,
    /// Genre or theme tags
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Long-form description used for quizbowl clues
    #[serde(default)]
    pub synopsis: Option<String>,
    /// Rating, used when sorting by rating instead of popularity
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub adult: bool,
}

impl CatalogItem {
    /// Every known display name, canonical title first, without duplicates
    pub fn answers(&self) -> Vec<String> {
        let mut answers: Vec<String> = Vec::with_capacity(self.aliases.len() + 1);
        for name in std::iter::once(&self.title).chain(self.aliases.iter()) {
            let trimmed = name.trim();
            if !trimmed.is_empty() && !answers.iter().any(|a| a == trimmed) {
                answers.push(trimmed.to_string());
            }
        }
        answers
    }

    /// Adult items are never asked, whatever the catalog says about them
    pub fn is_adult(&self) -> bool {
        self.adult
            || self
                .answers()
                .iter()
                .any(|a| a.to_lowercase().contains("hentai"))
    }
}

/// Category restriction for a session, in normalized tokens
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CategoryFilter {
    /// Empty means unrestricted
    pub tokens: Vec<String>,
    /// Invert: eligible items match none of the tokens
    pub exclude: bool,
}

impl CategoryFilter {
    pub fn new<I, S>(tokens: I, exclude: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = tokens
            .into_iter()
            .map(|t| normalize(t.as_ref()))
            .filter(|t| !t.is_empty())
            .collect();

        if normalized.iter().any(|t| t == ALL_CATEGORIES) {
            normalized.clear();
        }
        normalized.sort();
        normalized.dedup();

        Self {
            tokens: normalized,
            exclude,
        }
    }

    pub fn from_spec(spec: &QuestionSpec) -> Self {
        Self::new(&spec.categories, spec.exclude_categories)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// A source of trivia material
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Name of this catalog, for logging
    fn name(&self) -> &str;

    /// Number of items satisfying the filter in the given order
    async fn probe_size(&self, filter: &CategoryFilter, order: SortOrder) -> CatalogResult<usize>;

    /// Item at a 1-based rank among those satisfying the filter.
    ///
    /// `Ok(None)` means the rank is no longer valid (the catalog shifted).
    async fn fetch_candidate(
        &self,
        filter: &CategoryFilter,
        order: SortOrder,
        rank: usize,
    ) -> CatalogResult<Option<CatalogItem>>;
}
