//! Question sampling
//!
//! Draws ranks from a catalog with a Gaussian whose mean and spread grow with
//! the session difficulty and with the size of the filtered catalog, rejects
//! unsuitable or already-asked items, and materializes the survivors into
//! questions. The production task runs ahead of the round loop and feeds it
//! through the question queue.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::answer::normalize;
use crate::catalog::{BanList, CatalogItem, CatalogResult, CatalogSource, CategoryFilter};
use crate::queue::QuestionProducer;
use crate::types::{CatalogId, Prompt, Question, QuestionMode, QuestionSpec};

/// Gaussian draws per question before falling back to a walk over untried ranks
pub const MAX_DRAWS_PER_QUESTION: usize = 200;
/// Gaussian rerolls before falling back to a uniform rank
const MAX_REROLLS: usize = 1000;
/// Clue words that are never blanked out
const CENSOR_WHITELIST: [&str; 2] = ["the", "and"];
pub const CENSOR_PLACEHOLDER: &str = "____";

pub const EXHAUSTED_MESSAGE: &str =
    "No eligible items for this combination of categories and difficulty.";

/// Result type for sampling
pub type SamplerResult<T> = Result<T, SamplerError>;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum SamplerError {
    /// The session cannot get any more questions out of the catalog
    #[error("{0}")]
    Exhausted(String),
}

/// Why a drawn candidate was thrown back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Adult,
    Banned,
    MissingImage,
    MissingSynopsis,
    NoAnswers,
}

/// Retry settings for transient catalog failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Initial delay, doubled after every failed attempt
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Run a catalog operation, retrying transient failures with exponential backoff.
///
/// Non-transient failures, and transient ones that outlast the policy, exhaust
/// the session.
async fn retry_transient<T, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> SamplerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CatalogResult<T>>,
{
    let mut delay = policy.backoff;
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.attempts => {
                attempt += 1;
                tracing::warn!(
                    "{} failed ({}), retry {}/{} in {:?}",
                    what,
                    e,
                    attempt,
                    policy.attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            Err(e) => {
                tracing::error!("{} failed: {}", what, e);
                return Err(SamplerError::Exhausted(EXHAUSTED_MESSAGE.to_string()));
            }
        }
    }
}

/// Width unit of the rank distribution for a catalog of `bound` eligible items.
///
/// Grows with the logarithm of the catalog size so the same difficulty picks
/// comparably deep on large and small catalogs.
pub fn rank_scale(bound: usize) -> f64 {
    let n = bound as f64;
    (n.sqrt() * n.ln() / 3.0).max(1.0)
}

/// Draw a 1-based rank in `[1, bound]`; higher difficulty goes deeper into the tail
pub fn draw_rank<R: Rng + ?Sized>(rng: &mut R, bound: usize, difficulty: u8) -> usize {
    if bound <= 1 {
        return 1;
    }

    let scale = rank_scale(bound);
    let diff = f64::from(difficulty.max(1));
    let mean = scale * (diff - 1.0);
    let std_dev = scale * diff / 2.0;

    if let Ok(normal) = Normal::new(mean, std_dev) {
        for _ in 0..MAX_REROLLS {
            let rank = normal.sample(rng).round();
            if rank >= 1.0 && rank <= bound as f64 {
                return rank as usize;
            }
        }
    }
    rng.random_range(1..=bound)
}

/// Blank every clue word that gives an answer away
pub fn censor_clue(answers: &[String], clue: &str) -> String {
    let to_replace: HashSet<String> = answers
        .iter()
        .flat_map(|a| a.split_whitespace().map(normalize))
        .filter(|t| !t.is_empty())
        .collect();

    clue.split_whitespace()
        .map(|word| {
            let raw = normalize(word);
            if word.len() > 2
                && to_replace.contains(&raw)
                && !CENSOR_WHITELIST.contains(&raw.as_str())
            {
                CENSOR_PLACEHOLDER
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Shuffle the letters of each word independently.
///
/// A word with more than one distinct letter never comes back unchanged.
pub fn scramble<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    text.split_whitespace()
        .map(|word| {
            let original: Vec<char> = word.chars().collect();
            let distinct: HashSet<&char> = original.iter().collect();
            let mut shuffled = original.clone();
            shuffled.shuffle(rng);
            while distinct.len() > 1 && shuffled == original {
                shuffled.shuffle(rng);
            }
            shuffled.into_iter().collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Draws questions for one session
pub struct QuestionSampler {
    catalog: Arc<dyn CatalogSource>,
    spec: QuestionSpec,
    filter: CategoryFilter,
    banlist: Arc<BanList>,
    retry: RetryPolicy,
    /// Size of the filtered catalog, probed once per session
    bound: Option<usize>,
    /// Dedup set: ids already produced this session
    seen: HashSet<CatalogId>,
    /// Ids known to be unusable this session
    rejected: HashSet<CatalogId>,
    /// Ranks already fetched this session
    visited: HashSet<usize>,
}

impl QuestionSampler {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        spec: QuestionSpec,
        banlist: Arc<BanList>,
        retry: RetryPolicy,
    ) -> Self {
        let filter = CategoryFilter::from_spec(&spec);
        Self {
            catalog,
            spec,
            filter,
            banlist,
            retry,
            bound: None,
            seen: HashSet::new(),
            rejected: HashSet::new(),
            visited: HashSet::new(),
        }
    }

    /// Ids produced so far this session
    pub fn seen(&self) -> &HashSet<CatalogId> {
        &self.seen
    }

    async fn bound(&mut self) -> SamplerResult<usize> {
        if let Some(bound) = self.bound {
            return Ok(bound);
        }

        let catalog = &self.catalog;
        let filter = &self.filter;
        let order = self.spec.order;
        let bound = retry_transient(self.retry, "Catalog size probe", move || {
            catalog.probe_size(filter, order)
        })
        .await?;

        tracing::info!(
            "Catalog {} has {} eligible items for {:?} (exclude={})",
            self.catalog.name(),
            bound,
            self.filter.tokens,
            self.filter.exclude
        );

        if bound == 0 {
            return Err(SamplerError::Exhausted(EXHAUSTED_MESSAGE.to_string()));
        }
        self.bound = Some(bound);
        Ok(bound)
    }

    async fn fetch(&self, rank: usize) -> SamplerResult<Option<CatalogItem>> {
        let catalog = &self.catalog;
        let filter = &self.filter;
        let order = self.spec.order;
        retry_transient(self.retry, "Catalog fetch", move || {
            catalog.fetch_candidate(filter, order, rank)
        })
        .await
    }

    /// Draw, vet and materialize the next question.
    ///
    /// Gaussian draws come first. Once the draw budget is spent, the ranks not
    /// tried yet are walked in random order, so the session is only exhausted
    /// when every rank has been tried.
    pub async fn next_question(&mut self) -> SamplerResult<Question> {
        let bound = self.bound().await?;

        for _ in 0..MAX_DRAWS_PER_QUESTION {
            if self.visited.len() >= bound {
                break;
            }

            let rank = draw_rank(&mut rand::rng(), bound, self.spec.difficulty);
            if self.visited.contains(&rank) {
                continue;
            }
            if let Some(question) = self.consider(rank).await? {
                return Ok(question);
            }
        }

        let mut untried: Vec<usize> = (1..=bound)
            .filter(|rank| !self.visited.contains(rank))
            .collect();
        if !untried.is_empty() {
            tracing::debug!(
                "Draw budget spent, walking {} untried ranks of {}",
                untried.len(),
                self.catalog.name()
            );
        }
        untried.shuffle(&mut rand::rng());
        for rank in untried {
            if let Some(question) = self.consider(rank).await? {
                return Ok(question);
            }
        }

        tracing::warn!(
            "Gave up drawing from {} after {} asked and {} rejected items",
            self.catalog.name(),
            self.seen.len(),
            self.rejected.len()
        );
        Err(SamplerError::Exhausted(EXHAUSTED_MESSAGE.to_string()))
    }

    /// Fetch the item at `rank` and keep it if it is new and usable
    async fn consider(&mut self, rank: usize) -> SamplerResult<Option<Question>> {
        self.visited.insert(rank);
        let Some(item) = self.fetch(rank).await? else {
            tracing::debug!("Rank {} no longer valid, rerolling", rank);
            return Ok(None);
        };

        if self.seen.contains(&item.id) || self.rejected.contains(&item.id) {
            return Ok(None);
        }

        match self.materialize(&item) {
            Ok(question) => {
                tracing::debug!("Produced question from {} (rank {})", item.id, rank);
                self.seen.insert(item.id);
                Ok(Some(question))
            }
            Err(reason) => {
                tracing::debug!("Rejected {} ({:?})", item.id, reason);
                self.rejected.insert(item.id);
                Ok(None)
            }
        }
    }

    /// Turn a catalog item into a question for the session's mode
    pub fn materialize(&self, item: &CatalogItem) -> Result<Question, Rejection> {
        if item.is_adult() {
            return Err(Rejection::Adult);
        }
        if self.banlist.is_banned(item) {
            return Err(Rejection::Banned);
        }

        let answers = item.answers();
        let Some(canonical) = answers.first() else {
            return Err(Rejection::NoAnswers);
        };

        let prompt = match self.spec.mode {
            QuestionMode::Image => match item.image_url.as_deref() {
                Some(url) if !url.trim().is_empty() => Prompt::Image {
                    url: url.to_string(),
                },
                _ => return Err(Rejection::MissingImage),
            },
            QuestionMode::Quizbowl => match item.synopsis.as_deref() {
                Some(text) if !text.trim().is_empty() => Prompt::Progressive {
                    text: censor_clue(&answers, text),
                },
                _ => return Err(Rejection::MissingSynopsis),
            },
            QuestionMode::Anagram => Prompt::Anagram {
                scrambled: scramble(canonical, &mut rand::rng()),
            },
        };

        Ok(Question {
            source_id: item.id.clone(),
            prompt,
            answers,
        })
    }

    /// Produce `rounds` questions into the queue in the background.
    ///
    /// Stops early on cancellation, on exhaustion (after telling the consumer),
    /// or once the consumer is gone.
    pub fn spawn_production(
        mut self,
        room: &str,
        rounds: usize,
        producer: QuestionProducer,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let span = tracing::info_span!("tquestions", room = %room);

        tokio::spawn(
            async move {
                for _ in 0..rounds {
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            tracing::debug!("Question production cancelled");
                            return;
                        }
                        next = self.next_question() => next,
                    };

                    match next {
                        Ok(question) => {
                            if !producer.push(question) {
                                return;
                            }
                        }
                        Err(SamplerError::Exhausted(reason)) => {
                            producer.exhausted(reason);
                            return;
                        }
                    }
                }
                tracing::debug!("Produced all {} questions", rounds);
            }
            .instrument(span),
        )
    }
}
