use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{GameError, PendingRound, TriviaGame};
use crate::answer::{check_answer, normalize};
use crate::protocol::Announcement;
use crate::types::{Prompt, Question, QuestionSpec};

/// Result of checking one chat line against the in-flight question
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessOutcome {
    /// No session in this room
    NoGame,
    /// Between rounds
    NoQuestion,
    Wrong,
    /// The guesser's name normalizes to nothing, so the guess cannot score
    Unscorable,
    /// The guesser scored; `score` is their new total
    Correct { answer: String, score: u64 },
    /// The bot answered its own question, which skips it without scoring
    BotAnswered { answer: String },
}

impl GuessOutcome {
    /// Whether the guess ended the round
    pub fn is_correct(&self) -> bool {
        matches!(
            self,
            GuessOutcome::Correct { .. } | GuessOutcome::BotAnswered { .. }
        )
    }
}

impl TriviaGame {
    /// Show one question and wait until it is answered, skipped or timed out.
    ///
    /// Returns false if the session was cancelled first.
    pub(super) async fn play_round(
        &self,
        round: usize,
        question: Question,
        spec: &QuestionSpec,
        cancel: &CancellationToken,
    ) -> bool {
        let round_id = self.inner.next_round_id.fetch_add(1, Ordering::Relaxed);
        let (solved_tx, solved_rx) = oneshot::channel();

        {
            let mut session = self.inner.session.write().await;
            let Some(active) = session.as_mut() else {
                return false;
            };
            active.round = round;
            active.pending = Some(PendingRound {
                id: round_id,
                answers: question.answers.clone(),
                exact: spec.requires_exact(),
                solved: solved_tx,
            });
        }

        tracing::debug!(
            "Round {} asks {} ({}, {} accepted answers)",
            round,
            question.source_id,
            question.canonical_answer(),
            question.answers.len()
        );
        self.publish(Announcement::Question {
            round,
            prompt: question.prompt.announced(),
        });

        let timer: Option<JoinHandle<()>> = match question.prompt {
            Prompt::Progressive { text } => {
                let game = self.clone();
                let tick = self.inner.config.reveal_tick;
                let autoskip = spec.autoskip;
                Some(tokio::spawn(async move {
                    game.reveal(round_id, round, text, tick).await;
                    if let Some(timeout) = autoskip {
                        game.autoskip(round_id, timeout).await;
                    }
                }))
            }
            _ => spec.autoskip.map(|timeout| {
                let game = self.clone();
                tokio::spawn(async move { game.autoskip(round_id, timeout).await })
            }),
        };

        let solved = tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            result = solved_rx => result.is_ok(),
        };

        if let Some(timer) = timer {
            timer.abort();
        }
        self.take_pending(Some(round_id)).await;
        solved
    }

    /// Post a clue word by word, stopping as soon as the round is over
    async fn reveal(&self, round_id: u64, round: usize, text: String, tick: Duration) {
        let mut shown = String::with_capacity(text.len());
        for word in text.split_whitespace() {
            if !self.is_pending(round_id).await {
                return;
            }
            if !shown.is_empty() {
                shown.push(' ');
            }
            shown.push_str(word);
            self.publish(Announcement::Reveal {
                round,
                text: shown.clone(),
            });
            tokio::time::sleep(tick).await;
        }
    }

    /// After `timeout`, answer the question as the bot if it is still the same round
    async fn autoskip(&self, round_id: u64, timeout: Duration) {
        tokio::time::sleep(timeout).await;

        let Some(pending) = self.take_pending(Some(round_id)).await else {
            return;
        };
        let answer = pending.canonical_answer().to_string();
        tracing::debug!("Autoskip fired for round {}", round_id);
        self.publish(Announcement::Unanswered { answer });
        let _ = pending.solved.send(());
    }

    /// Check a chat line from `user` against the in-flight question.
    ///
    /// A correct guess scores for the user and ends the round. A correct
    /// answer from the bot's own identity ends the round without scoring.
    pub async fn check_guess(&self, user: &str, text: &str) -> GuessOutcome {
        if !self.is_bot(user) && normalize(user).is_empty() {
            tracing::debug!("Ignoring guess from unscorable name {:?}", user);
            return GuessOutcome::Unscorable;
        }

        let (pending, answer) = {
            let mut session = self.inner.session.write().await;
            let Some(active) = session.as_mut() else {
                return GuessOutcome::NoGame;
            };
            let matched = match active.pending.as_ref() {
                None => return GuessOutcome::NoQuestion,
                Some(p) => match check_answer(text, &p.answers, p.exact) {
                    None => return GuessOutcome::Wrong,
                    Some(answer) => answer.to_string(),
                },
            };
            match active.pending.take() {
                Some(pending) => (pending, matched),
                None => return GuessOutcome::NoQuestion,
            }
        };

        let outcome = if self.is_bot(user) {
            self.publish(Announcement::Unanswered {
                answer: answer.clone(),
            });
            GuessOutcome::BotAnswered { answer }
        } else {
            let score = self
                .inner
                .scoreboard
                .write()
                .await
                .update_scores(user)
                .unwrap_or_default();
            tracing::info!("{} answered {} ({} points)", user, answer, score);
            self.publish(Announcement::Solved {
                winner: user.to_string(),
                answer: answer.clone(),
            });
            GuessOutcome::Correct { answer, score }
        };

        let _ = pending.solved.send(());
        outcome
    }

    /// Force the in-flight question to end, revealing its canonical answer
    pub async fn skip(&self) -> Result<String, GameError> {
        if !self.is_active().await {
            return Err(GameError::NotRunning);
        }
        let pending = self
            .take_pending(None)
            .await
            .ok_or(GameError::NoQuestion)?;

        let answer = pending.canonical_answer().to_string();
        tracing::info!("Question skipped in {}", self.inner.room);
        self.publish(Announcement::Skipped {
            answer: answer.clone(),
        });
        let _ = pending.solved.send(());
        Ok(answer)
    }

    /// Remove the in-flight question, but only if it belongs to `round_id` when given
    async fn take_pending(&self, round_id: Option<u64>) -> Option<PendingRound> {
        let mut session = self.inner.session.write().await;
        let active = session.as_mut()?;
        match (&active.pending, round_id) {
            (Some(p), Some(id)) if p.id != id => None,
            _ => active.pending.take(),
        }
    }

    async fn is_pending(&self, round_id: u64) -> bool {
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .and_then(|s| s.pending.as_ref())
            .is_some_and(|p| p.id == round_id)
    }
}
