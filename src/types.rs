use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Opaque ID types for type safety
pub type RoomId = String;
pub type SessionId = String;
pub type CatalogId = String;
/// Normalized user identity (see [`crate::answer::normalize`])
pub type UserId = String;

pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 15;
pub const DEFAULT_DIFFICULTY: u8 = 3;
pub const DEFAULT_ROUNDS: usize = 10;
pub const DEFAULT_AUTOSKIP_SECS: u64 = 15;
/// Anagrams take longer to solve, so the default timer is stretched
pub const ANAGRAM_AUTOSKIP_SECS: u64 = 45;
/// Category token meaning "no restriction"
pub const ALL_CATEGORIES: &str = "all";

/// Clamp a requested difficulty into the supported range
pub fn clamp_difficulty(diff: i64) -> u8 {
    diff.clamp(MIN_DIFFICULTY as i64, MAX_DIFFICULTY as i64) as u8
}

/// What the room is shown for a question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Prompt {
    /// Illustration of the item (cover art, key visual)
    Image { url: String },
    /// Long-form clue, read out word by word
    Progressive {
        #[serde(default, skip_serializing_if = "String::is_empty")]
        text: String,
    },
    /// Canonical answer with each word's letters shuffled
    Anagram { scrambled: String },
}

impl Prompt {
    /// The prompt as first shown to the room. A progressive clue is withheld
    /// here and only arrives through the reveal.
    pub fn announced(&self) -> Prompt {
        match self {
            Prompt::Progressive { .. } => Prompt::Progressive {
                text: String::new(),
            },
            other => other.clone(),
        }
    }
}

/// A materialized question. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    /// Catalog identifier, used for dedup
    pub source_id: CatalogId,
    pub prompt: Prompt,
    /// Accepted answers; the first one is canonical
    pub answers: Vec<String>,
}

impl Question {
    pub fn canonical_answer(&self) -> &str {
        self.answers.first().map(String::as_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionMode {
    #[default]
    Image,
    Quizbowl,
    Anagram,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Popularity,
    Rating,
}

/// Session configuration, fixed for the lifetime of a session
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionSpec {
    pub rounds: usize,
    /// Clamped into `MIN_DIFFICULTY..=MAX_DIFFICULTY` when the session starts
    pub difficulty: u8,
    /// Normalized category tokens; `["all"]` means unrestricted
    pub categories: Vec<String>,
    /// Match everything NOT in `categories` instead
    pub exclude_categories: bool,
    pub order: SortOrder,
    /// `None` disables the autoskip timer
    pub autoskip: Option<Duration>,
    pub mode: QuestionMode,
    pub exact: bool,
}

impl Default for QuestionSpec {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
            difficulty: DEFAULT_DIFFICULTY,
            categories: vec![ALL_CATEGORIES.to_string()],
            exclude_categories: false,
            order: SortOrder::Popularity,
            autoskip: Some(Duration::from_secs(DEFAULT_AUTOSKIP_SECS)),
            mode: QuestionMode::Image,
            exact: false,
        }
    }
}

impl QuestionSpec {
    pub fn with_difficulty(mut self, diff: i64) -> Self {
        self.difficulty = clamp_difficulty(diff);
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens: Vec<String> = categories
            .into_iter()
            .map(|c| crate::answer::normalize(c.as_ref()))
            .filter(|c| !c.is_empty())
            .collect();
        self.categories = if tokens.is_empty() {
            vec![ALL_CATEGORIES.to_string()]
        } else {
            tokens
        };
        self
    }

    /// Autoskip of zero seconds disables the timer
    pub fn with_autoskip_secs(mut self, secs: u64) -> Self {
        self.autoskip = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    /// Anagram rounds require the letters to be unscrambled exactly
    pub fn requires_exact(&self) -> bool {
        self.exact || self.mode == QuestionMode::Anagram
    }

    /// Copy of this spec with the difficulty forced into range
    pub fn clamped(&self) -> Self {
        Self {
            difficulty: clamp_difficulty(self.difficulty as i64),
            ..self.clone()
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.categories.iter().any(|c| c == ALL_CATEGORIES)
    }
}

/// One scoreboard row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreEntry {
    pub user: UserId,
    pub score: u64,
}
