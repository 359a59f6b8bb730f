//! Per-room trivia scoreboard
//!
//! Rooms with periodic score decay keep one sentinel row, keyed by
//! [`TIMER_USER`], whose value is the next scheduled reset as a unix
//! timestamp. The sentinel is never a real score: it lives outside the score
//! rows in memory and only appears in the persisted row format.

mod store;

use std::time::Duration;

use crate::answer::normalize;
use crate::types::{ScoreEntry, UserId};

pub use store::{JsonScoreStore, MemoryScoreStore, ScoreStore, StoreError, StoreResult};

/// Reserved identity of the sentinel row. Cannot collide with a normalized user.
pub const TIMER_USER: &str = "T*";
/// Hard cap on leaderboard length
pub const LEADERBOARD_CAP: usize = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scoreboard {
    entries: Vec<ScoreEntry>,
    /// Unix timestamp of the next reset, for rooms with periodic decay
    next_reset: Option<i64>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted rows, pulling out the sentinel row
    pub fn from_rows(rows: Vec<ScoreEntry>) -> Self {
        let mut board = Self::default();
        for row in rows {
            if row.user == TIMER_USER {
                board.next_reset = Some(row.score as i64);
                continue;
            }
            let user = normalize(&row.user);
            if user.is_empty() {
                continue;
            }
            match board.entries.iter_mut().find(|e| e.user == user) {
                Some(existing) => existing.score += row.score,
                None => board.entries.push(ScoreEntry {
                    user,
                    score: row.score,
                }),
            }
        }
        board.sort();
        board
    }

    /// Persisted row format: sentinel first (if any), then scores descending
    pub fn to_rows(&self) -> Vec<ScoreEntry> {
        let mut rows = Vec::with_capacity(self.entries.len() + 1);
        if let Some(ts) = self.next_reset {
            rows.push(ScoreEntry {
                user: TIMER_USER.to_string(),
                score: ts.max(0) as u64,
            });
        }
        let mut sorted = self.entries.clone();
        sort_entries(&mut sorted);
        rows.extend(sorted);
        rows
    }

    pub fn sort(&mut self) {
        sort_entries(&mut self.entries);
    }

    /// Award one point, creating the user's row if needed. Returns the new score.
    ///
    /// Names that normalize to nothing cannot hold a row and get `None`.
    pub fn update_scores(&mut self, user: &str) -> Option<u64> {
        let user = normalize(user);
        if user.is_empty() {
            return None;
        }
        match self.entries.iter_mut().find(|e| e.user == user) {
            Some(entry) => {
                entry.score += 1;
                Some(entry.score)
            }
            None => {
                self.entries.push(ScoreEntry { user, score: 1 });
                Some(1)
            }
        }
    }

    /// Top `min(n, 10)` users, highest score first
    pub fn leaderboard(&self, n: usize) -> Vec<ScoreEntry> {
        let mut sorted = self.entries.clone();
        sort_entries(&mut sorted);
        sorted.truncate(n.min(LEADERBOARD_CAP));
        sorted
    }

    /// `None` when the user has never scored here
    pub fn userscore(&self, user: &str) -> Option<(UserId, u64)> {
        let user = normalize(user);
        self.entries
            .iter()
            .find(|e| e.user == user)
            .map(|e| (e.user.clone(), e.score))
    }

    pub fn next_reset(&self) -> Option<i64> {
        self.next_reset
    }

    /// Wipe scores if the scheduled reset has passed.
    ///
    /// Rooms without a reset period are left alone. The first call in a room
    /// with a period schedules the first reset. Returns whether scores were wiped.
    pub fn apply_reset(&mut self, now: i64, period: Option<Duration>) -> bool {
        let Some(period) = period else {
            return false;
        };
        let period = i64::try_from(period.as_secs()).unwrap_or(i64::MAX);

        match self.next_reset {
            Some(due) if now >= due => {
                tracing::info!("Scoreboard reset was due at {}, wiping {} rows", due, self.entries.len());
                self.entries.clear();
                self.next_reset = Some(now.saturating_add(period));
                true
            }
            Some(_) => false,
            None => {
                self.next_reset = Some(now.saturating_add(period));
                false
            }
        }
    }

    /// Number of scored users (the sentinel does not count)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn sort_entries(entries: &mut [ScoreEntry]) {
    entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.user.cmp(&b.user)));
}
