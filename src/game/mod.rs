//! Trivia game sessions
//!
//! One [`TriviaGame`] exists per room and owns that room's scoreboard. A
//! session moves it from idle to active: [`TriviaGame::start`] spawns the
//! question production task and the round loop, and returns a
//! [`SessionHandle`] used to cancel the session or await its summary. Guesses,
//! skips and stops come in through the game handle while the loop runs; all
//! output goes out on the announcement channel.

mod round;
mod session;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::answer::normalize;
use crate::catalog::{BanList, CatalogSource};
use crate::config::TriviaConfig;
use crate::protocol::{Announcement, LeaderboardEntry};
use crate::scoreboard::{ScoreStore, Scoreboard, StoreError};
use crate::types::{QuestionSpec, RoomId, ScoreEntry, SessionId, UserId};

pub use round::GuessOutcome;

/// Buffered announcements per subscriber before it starts lagging
const ANNOUNCEMENT_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("A trivia game is already running in {0}.")]
    AlreadyRunning(RoomId),

    #[error("No trivia game in progress.")]
    NotRunning,

    #[error("There is no question to skip right now.")]
    NoQuestion,

    #[error("Scoreboard unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("Trivia session task failed: {0}")]
    SessionFailed(String),
}

/// How a session came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Every round was played
    Completed,
    /// Stopped by an admin
    Cancelled,
    /// The catalog ran out of eligible items
    Exhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub rounds_played: usize,
    pub outcome: SessionOutcome,
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Handle to a running session, returned by [`TriviaGame::start`]
#[derive(Debug)]
pub struct SessionHandle {
    session_id: SessionId,
    cancel: CancellationToken,
    task: JoinHandle<SessionSummary>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.session_id
    }

    /// Stop the session. The scoreboard is still saved and the results posted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to finish, including its cleanup
    pub async fn wait(self) -> Result<SessionSummary, GameError> {
        self.task
            .await
            .map_err(|e| GameError::SessionFailed(e.to_string()))
    }
}

/// State of the session currently running in the room
struct ActiveSession {
    id: SessionId,
    cancel: CancellationToken,
    /// Round counter, 1-based once the first question is out
    round: usize,
    /// The in-flight question, if one is waiting for an answer
    pending: Option<PendingRound>,
}

/// Accepted answers of the in-flight question and the signal that ends its round
struct PendingRound {
    /// Unique per round; timers compare it before acting
    id: u64,
    answers: Vec<String>,
    exact: bool,
    solved: oneshot::Sender<()>,
}

impl PendingRound {
    fn canonical_answer(&self) -> &str {
        self.answers.first().map(String::as_str).unwrap_or_default()
    }
}

struct GameShared {
    room: RoomId,
    config: TriviaConfig,
    catalog: Arc<dyn CatalogSource>,
    banlist: Arc<BanList>,
    store: Arc<dyn ScoreStore>,
    announcements: broadcast::Sender<Announcement>,
    session: RwLock<Option<ActiveSession>>,
    scoreboard: RwLock<Scoreboard>,
    next_round_id: AtomicU64,
}

/// A room's trivia game. Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct TriviaGame {
    inner: Arc<GameShared>,
}

impl TriviaGame {
    /// Create the idle game for a room, loading its persisted scoreboard
    pub async fn open(
        room: impl Into<RoomId>,
        config: TriviaConfig,
        catalog: Arc<dyn CatalogSource>,
        banlist: Arc<BanList>,
        store: Arc<dyn ScoreStore>,
    ) -> Result<Self, GameError> {
        let room = room.into();
        let scoreboard = store.load(&room).await?;
        tracing::info!(
            "Opened trivia for {} on catalog {} ({} scored users)",
            room,
            catalog.name(),
            scoreboard.len()
        );

        let (tx, _rx) = broadcast::channel(ANNOUNCEMENT_CAPACITY);
        Ok(Self {
            inner: Arc::new(GameShared {
                room,
                config,
                catalog,
                banlist,
                store,
                announcements: tx,
                session: RwLock::new(None),
                scoreboard: RwLock::new(scoreboard),
                next_round_id: AtomicU64::new(1),
            }),
        })
    }

    pub fn room(&self) -> &str {
        &self.inner.room
    }

    pub fn config(&self) -> &TriviaConfig {
        &self.inner.config
    }

    /// Receive everything this game publishes from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Announcement> {
        self.inner.announcements.subscribe()
    }

    pub async fn is_active(&self) -> bool {
        self.inner.session.read().await.is_some()
    }

    /// Round counter of the running session
    pub async fn current_round(&self) -> Option<usize> {
        self.inner.session.read().await.as_ref().map(|s| s.round)
    }

    pub async fn session_id(&self) -> Option<SessionId> {
        self.inner.session.read().await.as_ref().map(|s| s.id.clone())
    }

    /// Persisted score of a user in this room
    pub async fn score(&self, user: &str) -> Option<(UserId, u64)> {
        self.inner.scoreboard.read().await.userscore(user)
    }

    /// Top `min(n, 10)` scorers, best first
    pub async fn leaderboard(&self, n: usize) -> Vec<LeaderboardEntry> {
        ranked(self.inner.scoreboard.read().await.leaderboard(n))
    }

    /// Cancel the running session. Cleanup happens on the session task.
    pub async fn stop(&self) -> Result<(), GameError> {
        let session = self.inner.session.read().await;
        let active = session.as_ref().ok_or(GameError::NotRunning)?;
        tracing::info!("Stopping trivia session {} in {}", active.id, self.inner.room);
        active.cancel.cancel();
        Ok(())
    }

    fn publish(&self, announcement: Announcement) {
        // Nobody listening is fine
        let _ = self.inner.announcements.send(announcement);
    }

    fn is_bot(&self, user: &str) -> bool {
        normalize(user) == normalize(&self.inner.config.bot_name)
    }
}

fn ranked(entries: Vec<ScoreEntry>) -> Vec<LeaderboardEntry> {
    entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| LeaderboardEntry {
            rank: i + 1,
            user: e.user,
            score: e.score,
        })
        .collect()
}

/// Session parameters as adjusted by the room before starting
fn effective_spec(spec: QuestionSpec, config: &TriviaConfig) -> QuestionSpec {
    let mut spec = spec.clamped();
    spec.exact |= config.exact_answers;
    spec
}
