//! In-memory ranked catalog loaded from a JSON dump
//!
//! The file is a JSON array of [`CatalogItem`]s ordered by popularity, most
//! popular first. Game databases, media databases and quiz-question banks
//! all fit this shape.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;

use super::{CatalogError, CatalogItem, CatalogResult, CatalogSource, CategoryFilter};
use crate::answer::normalize;
use crate::types::SortOrder;

pub struct RankedCatalog {
    name: String,
    /// Popularity order
    items: Vec<CatalogItem>,
    /// Indices into `items`, best rated first
    by_rating: Vec<usize>,
    /// Normalized media and kinds present in the catalog. Category tokens in
    /// this set filter by type; anything else filters by tag.
    type_tokens: HashSet<String>,
}

impl RankedCatalog {
    pub fn new(name: impl Into<String>, items: Vec<CatalogItem>) -> Self {
        let mut by_rating: Vec<usize> = (0..items.len()).collect();
        // Unrated items sink to the bottom, ties keep popularity order
        by_rating.sort_by(|&a, &b| {
            let sa = items[a].score.unwrap_or(f64::NEG_INFINITY);
            let sb = items[b].score.unwrap_or(f64::NEG_INFINITY);
            sb.total_cmp(&sa)
        });

        let type_tokens = items
            .iter()
            .flat_map(|i| i.medium.iter().chain(i.kind.iter()))
            .map(|t| normalize(t))
            .filter(|t| !t.is_empty())
            .collect();

        Self {
            name: name.into(),
            items,
            by_rating,
            type_tokens,
        }
    }

    pub fn load(path: &Path) -> CatalogResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let items: Vec<CatalogItem> =
            serde_json::from_str(&raw).map_err(|e| CatalogError::Parse(e.to_string()))?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "catalog".to_string());

        tracing::info!("Loaded catalog {} with {} items", name, items.len());
        Ok(Self::new(name, items))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn ordered(&self, order: SortOrder) -> Box<dyn Iterator<Item = &CatalogItem> + '_> {
        match order {
            SortOrder::Popularity => Box::new(self.items.iter()),
            SortOrder::Rating => Box::new(self.by_rating.iter().map(|&i| &self.items[i])),
        }
    }

    fn matches(&self, item: &CatalogItem, filter: &CategoryFilter) -> bool {
        if filter.is_unrestricted() {
            return true;
        }

        let item_types: Vec<String> = item
            .medium
            .iter()
            .chain(item.kind.iter())
            .map(|t| normalize(t))
            .collect();
        let item_tags: Vec<String> = item.tags.iter().map(|t| normalize(t)).collect();

        if filter.exclude {
            return !filter
                .tokens
                .iter()
                .any(|t| item_types.contains(t) || item_tags.contains(t));
        }

        let (types, tags): (Vec<&String>, Vec<&String>) = filter
            .tokens
            .iter()
            .partition(|t| self.type_tokens.contains(*t));

        let type_ok = types.is_empty() || types.iter().any(|t| item_types.contains(*t));
        let tag_ok = tags.is_empty() || tags.iter().any(|t| item_tags.contains(*t));
        type_ok && tag_ok
    }
}

#[async_trait]
impl CatalogSource for RankedCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe_size(&self, filter: &CategoryFilter, order: SortOrder) -> CatalogResult<usize> {
        Ok(self
            .ordered(order)
            .filter(|item| self.matches(item, filter))
            .count())
    }

    async fn fetch_candidate(
        &self,
        filter: &CategoryFilter,
        order: SortOrder,
        rank: usize,
    ) -> CatalogResult<Option<CatalogItem>> {
        if rank == 0 {
            return Ok(None);
        }
        Ok(self
            .ordered(order)
            .filter(|item| self.matches(item, filter))
            .nth(rank - 1)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, medium: &str, kind: &str, tags: &[&str], score: Option<f64>) -> CatalogItem {
        CatalogItem {
            id: id.to_string(),
            title: format!("Title {}", id),
            aliases: Vec::new(),
            medium: Some(medium.to_string()),
            kind: Some(kind.to_string()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            image_url: None,
            synopsis: None,
            score,
            adult: false,
        }
    }

    fn catalog() -> RankedCatalog {
        RankedCatalog::new(
            "test",
            vec![
                item("a", "anime", "tv", &["Action"], Some(7.0)),
                item("b", "anime", "movie", &["Drama"], Some(9.0)),
                item("c", "manga", "oneshot", &["Action", "Comedy"], None),
                item("d", "manga", "manga", &["Slice of Life"], Some(8.0)),
            ],
        )
    }

    #[tokio::test]
    async fn test_unrestricted_probe() {
        let c = catalog();
        let all = CategoryFilter::new(["all"], false);
        assert_eq!(c.probe_size(&all, SortOrder::Popularity).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_type_and_tag_filters() {
        let c = catalog();

        let anime = CategoryFilter::new(["anime"], false);
        assert_eq!(c.probe_size(&anime, SortOrder::Popularity).await.unwrap(), 2);

        // Types OR'ed, tags OR'ed, groups AND'ed
        let action_anime = CategoryFilter::new(["anime", "oneshot", "action"], false);
        assert_eq!(c.probe_size(&action_anime, SortOrder::Popularity).await.unwrap(), 2);

        let unknown = CategoryFilter::new(["mecha"], false);
        assert_eq!(c.probe_size(&unknown, SortOrder::Popularity).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_exclude_inverts_filter() {
        let c = catalog();
        let no_manga = CategoryFilter::new(["manga"], true);
        assert_eq!(c.probe_size(&no_manga, SortOrder::Popularity).await.unwrap(), 2);

        let no_action = CategoryFilter::new(["action"], true);
        let first = c
            .fetch_candidate(&no_action, SortOrder::Popularity, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.id, "b");
    }

    #[tokio::test]
    async fn test_rating_order() {
        let c = catalog();
        let all = CategoryFilter::default();
        let ids: Vec<String> = ranked_ids(&c, &all, SortOrder::Rating).await;
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
    }

    #[tokio::test]
    async fn test_out_of_range_rank() {
        let c = catalog();
        let all = CategoryFilter::default();
        assert!(c
            .fetch_candidate(&all, SortOrder::Popularity, 0)
            .await
            .unwrap()
            .is_none());
        assert!(c
            .fetch_candidate(&all, SortOrder::Popularity, 5)
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_load_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("videogames.json");
        std::fs::write(
            &path,
            r#"[{"id": "1", "title": "Chrono Trigger", "aliases": ["chrono-trigger"], "kind": "rpg"}]"#,
        )
        .unwrap();

        let c = RankedCatalog::load(&path).unwrap();
        assert_eq!(c.name(), "videogames");
        assert_eq!(c.len(), 1);
    }

    async fn ranked_ids(c: &RankedCatalog, filter: &CategoryFilter, order: SortOrder) -> Vec<String> {
        let size = c.probe_size(filter, order).await.unwrap();
        let mut ids = Vec::new();
        for rank in 1..=size {
            ids.push(c.fetch_candidate(filter, order, rank).await.unwrap().unwrap().id);
        }
        ids
    }
}
