use crate::types::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Leaderboard row as shown to the room
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user: UserId,
    pub score: u64,
}

/// Messages a trivia game publishes to its room.
///
/// Rendering (plain text, rich markup) is up to whoever consumes the channel;
/// the `Display` impl is the plain-text form used by the console bot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum Announcement {
    SessionStarted {
        session_id: SessionId,
        rounds: usize,
        autoskip_secs: Option<u64>,
    },
    Question {
        round: usize,
        prompt: Prompt,
    },
    /// Progressive reveal of a quizbowl clue; each message carries the text so far
    Reveal {
        round: usize,
        text: String,
    },
    Solved {
        winner: String,
        answer: String,
    },
    /// Nobody got it: autoskip fired or the bot answered its own question
    Unanswered {
        answer: String,
    },
    /// An admin skipped the question
    Skipped {
        answer: String,
    },
    Exhausted {
        reason: String,
    },
    SessionEnded {
        rounds_played: usize,
    },
    Leaderboard {
        title: String,
        entries: Vec<LeaderboardEntry>,
    },
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Announcement::SessionStarted {
                rounds,
                autoskip_secs,
                ..
            } => {
                let timer = autoskip_secs
                    .map(|s| format!(", with a {} second timer", s))
                    .unwrap_or_default();
                write!(
                    f,
                    "Starting a trivia with {} questions{}. Type your answers to guess!",
                    rounds, timer
                )
            }
            Announcement::Question { round, prompt } => match prompt {
                Prompt::Image { url } => write!(f, "Q{}: {}", round, url),
                Prompt::Progressive { .. } => write!(f, "Q{}:", round),
                Prompt::Anagram { scrambled } => write!(f, "Q{}: {}", round, scrambled),
            },
            Announcement::Reveal { text, .. } => write!(f, "{}", text),
            Announcement::Solved { winner, answer } => {
                write!(f, "{} wins. The answer was {}.", winner, answer)
            }
            Announcement::Unanswered { answer } => {
                write!(f, "Question skipped. The answer was {}.", answer)
            }
            Announcement::Skipped { answer } => write!(
                f,
                "Skipping question. A correct answer would have been {}.",
                answer
            ),
            Announcement::Exhausted { reason } => write!(f, "{}", reason),
            Announcement::SessionEnded { .. } => {
                write!(f, "This trivia game has ended. See below for results.")
            }
            Announcement::Leaderboard { title, entries } => {
                write!(f, "{}", title)?;
                for entry in entries {
                    write!(f, "\n{}. {} {} pts", entry.rank, entry.user, entry.score)?;
                }
                Ok(())
            }
        }
    }
}
