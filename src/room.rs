//! A chat room with a trivia game attached
//!
//! Turns chat lines into game calls: `]trivia` and `]anagrams` commands are
//! dispatched (subject to the sender's rank), everything else is a guess.

use tokio::sync::Mutex;

use crate::command::{parse_command, ChatCommand};
use crate::game::{GameError, SessionHandle, SessionSummary, TriviaGame};
use crate::protocol::Announcement;
use crate::types::QuestionSpec;

pub const INVALID_START_MESSAGE: &str = "Invalid parameters. Trivia not started.";
pub const USER_NOT_FOUND_MESSAGE: &str = "User not found.";

/// Room ranks, lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rank {
    Locked,
    Muted,
    Regular,
    Voice,
    PrizeWinner,
    Bot,
    Host,
    Driver,
    Moderator,
    Administrator,
    RoomOwner,
    GlobalStaff,
    GlobalAdmin,
}

impl Rank {
    /// Rank for a user-list prefix symbol
    pub fn from_symbol(symbol: char) -> Option<Self> {
        let rank = match symbol {
            '‽' => Rank::Locked,
            '!' => Rank::Muted,
            ' ' => Rank::Regular,
            '+' => Rank::Voice,
            '^' => Rank::PrizeWinner,
            '*' => Rank::Bot,
            '★' => Rank::Host,
            '%' => Rank::Driver,
            '@' => Rank::Moderator,
            '&' => Rank::Administrator,
            '#' => Rank::RoomOwner,
            '＋' => Rank::GlobalStaff,
            '~' => Rank::GlobalAdmin,
            _ => return None,
        };
        Some(rank)
    }

    /// Authority level in tenths
    pub fn level(self) -> i32 {
        match self {
            Rank::Locked | Rank::Muted => -10,
            Rank::Regular => 0,
            Rank::Voice => 10,
            Rank::PrizeWinner => 11,
            Rank::Bot => 15,
            Rank::Host | Rank::Driver => 20,
            Rank::Moderator => 30,
            Rank::Administrator => 40,
            Rank::RoomOwner => 50,
            Rank::GlobalStaff | Rank::GlobalAdmin => 60,
        }
    }

    pub fn at_least(self, required: Rank) -> bool {
        self.level() >= required.level()
    }

    /// Compare a raw rank symbol. Unknown symbols never qualify.
    pub fn symbol_at_least(symbol: char, required: Rank) -> bool {
        match Rank::from_symbol(symbol) {
            Some(rank) => rank.at_least(required),
            None => {
                tracing::warn!("{:?} is not a supported rank", symbol);
                false
            }
        }
    }
}

/// Split `<rank symbol><name>` as it appears in the user list
pub fn split_rank(name: &str) -> (char, &str) {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if !c.is_alphanumeric() => (c, chars.as_str()),
        _ => (' ', name),
    }
}

/// Split a console line of the form `<sender>: <message>`
pub fn parse_chat_line(line: &str) -> Option<(&str, &str)> {
    let (sender, text) = line.split_once(':')?;
    let text = text.trim();
    if sender.trim().is_empty() || text.is_empty() {
        return None;
    }
    Some((sender, text))
}

pub struct Room {
    game: TriviaGame,
    session: Mutex<Option<SessionHandle>>,
}

impl Room {
    pub fn new(game: TriviaGame) -> Self {
        Self {
            game,
            session: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        self.game.room()
    }

    pub fn game(&self) -> &TriviaGame {
        &self.game
    }

    /// Handle one chat line from `sender` (rank symbol included).
    ///
    /// Returns a direct reply, if any. Game progress is published on the
    /// game's announcement channel instead.
    pub async fn handle_message(&self, sender: &str, text: &str) -> Option<String> {
        let (symbol, user) = split_rank(sender);

        let command = match parse_command(text) {
            Some(command) => command,
            None => {
                self.game.check_guess(user, text).await;
                return None;
            }
        };

        match command {
            Err(e) => {
                tracing::debug!("Bad trivia command from {}: {}", user, e);
                Some(INVALID_START_MESSAGE.to_string())
            }
            Ok(ChatCommand::Start(spec)) => {
                if !Rank::symbol_at_least(symbol, Rank::Driver) {
                    return None;
                }
                self.start(spec).await
            }
            Ok(ChatCommand::Stop) => {
                if !Rank::symbol_at_least(symbol, Rank::Voice) {
                    return None;
                }
                self.stop().await
            }
            Ok(ChatCommand::Skip) => {
                if !Rank::symbol_at_least(symbol, Rank::Voice) {
                    return None;
                }
                if let Err(e) = self.game.skip().await {
                    tracing::debug!("Skip ignored in {}: {}", self.name(), e);
                }
                None
            }
            Ok(ChatCommand::Score(target)) => {
                let target = target.as_deref().unwrap_or(user);
                Some(match self.game.score(target).await {
                    Some((name, score)) => format!("{} has earned {} points in trivia.", name, score),
                    None => USER_NOT_FOUND_MESSAGE.to_string(),
                })
            }
            Ok(ChatCommand::Leaderboard(n)) => {
                let entries = self.game.leaderboard(n).await;
                Some(
                    Announcement::Leaderboard {
                        title: "Trivia Leaderboard".to_string(),
                        entries,
                    }
                    .to_string(),
                )
            }
        }
    }

    async fn start(&self, spec: QuestionSpec) -> Option<String> {
        match self.game.start(spec).await {
            Ok(handle) => {
                *self.session.lock().await = Some(handle);
                None
            }
            Err(e) => Some(e.to_string()),
        }
    }

    async fn stop(&self) -> Option<String> {
        let session = self.session.lock().await;
        match session.as_ref() {
            Some(handle) if !handle.is_finished() => {
                handle.cancel();
                None
            }
            _ => match self.game.stop().await {
                Ok(()) => None,
                Err(e) => Some(e.to_string()),
            },
        }
    }

    /// Wait for the current session, if any, to finish its cleanup
    pub async fn finish(&self) -> Option<Result<SessionSummary, GameError>> {
        let handle = self.session.lock().await.take()?;
        Some(handle.wait().await)
    }
}
