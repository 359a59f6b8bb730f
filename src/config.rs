use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::sampler::RetryPolicy;
use crate::types::RoomId;

/// Runtime configuration for the trivia bot
#[derive(Debug, Clone)]
pub struct TriviaConfig {
    /// Room the console bot plays in
    pub room: RoomId,
    /// The bot's own identity; its guesses count as skips, never as wins
    pub bot_name: String,
    /// Scoreboards and the ban list live here
    pub data_dir: PathBuf,
    /// JSON catalog the questions are drawn from
    pub catalog_path: PathBuf,
    /// Fixed pause before each question is shown
    pub prereveal_delay: Duration,
    /// Interval between words of a progressive reveal
    pub reveal_tick: Duration,
    /// Periodic scoreboard reset; `None` keeps scores forever
    pub reset_period: Option<Duration>,
    pub retry: RetryPolicy,
    /// Entries in the end-of-session leaderboard
    pub leaderboard_size: usize,
    /// Room-wide exact answer matching
    pub exact_answers: bool,
}

impl Default for TriviaConfig {
    fn default() -> Self {
        Self {
            room: "trivia".to_string(),
            bot_name: "triviabot".to_string(),
            data_dir: PathBuf::from("data"),
            catalog_path: PathBuf::from("data/catalog.json"),
            prereveal_delay: Duration::from_secs(3),
            reveal_tick: Duration::from_millis(300),
            reset_period: None,
            retry: RetryPolicy::default(),
            leaderboard_size: 5,
            exact_answers: false,
        }
    }
}

impl TriviaConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let reset_period = env_parse::<u64>("TRIVIA_RESET_HOURS")
            .filter(|&hours| hours > 0)
            .and_then(|hours| match hours.checked_mul(3600) {
                Some(secs) => Some(Duration::from_secs(secs)),
                None => {
                    tracing::warn!("Ignoring out of range TRIVIA_RESET_HOURS={}", hours);
                    None
                }
            });

        let retry = RetryPolicy {
            attempts: env_parse("TRIVIA_FETCH_RETRIES").unwrap_or(defaults.retry.attempts),
            backoff: env_parse("TRIVIA_FETCH_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.backoff),
        };

        Self {
            room: env_string("TRIVIA_ROOM").unwrap_or(defaults.room),
            bot_name: env_string("TRIVIA_BOT_NAME").unwrap_or(defaults.bot_name),
            data_dir: env_string("TRIVIA_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            catalog_path: env_string("TRIVIA_CATALOG")
                .map(PathBuf::from)
                .unwrap_or(defaults.catalog_path),
            prereveal_delay: env_parse("TRIVIA_PREREVEAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.prereveal_delay),
            reveal_tick: env_parse("TRIVIA_REVEAL_TICK_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.reveal_tick),
            reset_period,
            retry,
            leaderboard_size: env_parse("TRIVIA_LEADERBOARD_SIZE")
                .unwrap_or(defaults.leaderboard_size),
            exact_answers: env_string("TRIVIA_EXACT_ANSWERS")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(defaults.exact_answers),
        }
    }

    pub fn banlist_path(&self) -> PathBuf {
        self.data_dir.join("banlist.json")
    }

    pub fn scoreboard_dir(&self) -> PathBuf {
        self.data_dir.join("scoreboards")
    }
}

/// Trimmed value of an env var; unset and blank are the same
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparsable {}={}", key, raw);
            None
        }
    }
}
