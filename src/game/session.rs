use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::{
    effective_spec, ranked, ActiveSession, GameError, SessionHandle, SessionOutcome,
    SessionSummary, TriviaGame,
};
use crate::protocol::Announcement;
use crate::queue::{question_queue, Produced, QuestionConsumer};
use crate::sampler::{QuestionSampler, EXHAUSTED_MESSAGE};
use crate::types::{QuestionSpec, SessionId};

impl TriviaGame {
    /// Start a session in this room.
    ///
    /// Fails with [`GameError::AlreadyRunning`] if one is active; the running
    /// session is left untouched.
    pub async fn start(&self, spec: QuestionSpec) -> Result<SessionHandle, GameError> {
        let spec = effective_spec(spec, &self.inner.config);
        let session_id: SessionId = ulid::Ulid::new().to_string();
        let cancel = CancellationToken::new();

        {
            let mut session = self.inner.session.write().await;
            if session.is_some() {
                return Err(GameError::AlreadyRunning(self.inner.room.clone()));
            }
            *session = Some(ActiveSession {
                id: session_id.clone(),
                cancel: cancel.clone(),
                round: 0,
                pending: None,
            });
        }

        self.apply_scheduled_reset().await;

        tracing::info!(
            "Starting trivia session {} in {}: {} rounds, difficulty {}, categories {:?}{}, mode {:?}",
            session_id,
            self.inner.room,
            spec.rounds,
            spec.difficulty,
            spec.categories,
            if spec.exclude_categories { " (excluded)" } else { "" },
            spec.mode
        );
        self.publish(Announcement::SessionStarted {
            session_id: session_id.clone(),
            rounds: spec.rounds,
            autoskip_secs: spec.autoskip.map(|d| d.as_secs()),
        });

        let (producer, consumer) = question_queue();
        let sampler = QuestionSampler::new(
            self.inner.catalog.clone(),
            spec.clone(),
            self.inner.banlist.clone(),
            self.inner.config.retry,
        );
        let production =
            sampler.spawn_production(&self.inner.room, spec.rounds, producer, cancel.clone());

        let game = self.clone();
        let token = cancel.clone();
        let sid = session_id.clone();
        let span = tracing::info_span!("trivia", room = %self.inner.room, session = %session_id);
        let task = tokio::spawn(
            async move {
                let (rounds_played, outcome) = game.round_loop(&spec, consumer, &token).await;

                // Production never outlives the session
                token.cancel();
                if let Err(e) = production.await {
                    tracing::error!("Question production task failed: {}", e);
                }

                game.end(sid, rounds_played, outcome).await
            }
            .instrument(span),
        );

        Ok(SessionHandle {
            session_id,
            cancel,
            task,
        })
    }

    /// Wipe the scoreboard if its scheduled reset has passed
    async fn apply_scheduled_reset(&self) {
        let now = chrono::Utc::now().timestamp();
        let mut board = self.inner.scoreboard.write().await;
        if board.apply_reset(now, self.inner.config.reset_period) {
            tracing::info!("Scoreboard for {} was reset", self.inner.room);
        }
    }

    /// Play rounds until the count is reached, the catalog runs dry, or the
    /// session is cancelled. Returns the number of questions shown.
    async fn round_loop(
        &self,
        spec: &QuestionSpec,
        mut queue: QuestionConsumer,
        cancel: &CancellationToken,
    ) -> (usize, SessionOutcome) {
        let mut played = 0;

        while played < spec.rounds {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return (played, SessionOutcome::Cancelled),
                next = queue.next() => next,
            };

            let question = match next {
                Some(Produced::Question(question)) => question,
                Some(Produced::Exhausted(reason)) => {
                    tracing::warn!("Catalog exhausted after {} rounds: {}", played, reason);
                    self.publish(Announcement::Exhausted { reason });
                    return (played, SessionOutcome::Exhausted);
                }
                None => {
                    tracing::error!("Question production stopped without reporting why");
                    self.publish(Announcement::Exhausted {
                        reason: EXHAUSTED_MESSAGE.to_string(),
                    });
                    return (played, SessionOutcome::Exhausted);
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return (played, SessionOutcome::Cancelled),
                _ = tokio::time::sleep(self.inner.config.prereveal_delay) => {}
            }

            played += 1;
            if !self.play_round(played, question, spec, cancel).await {
                return (played, SessionOutcome::Cancelled);
            }
        }

        (played, SessionOutcome::Completed)
    }

    /// Finish the session: persist scores, go idle, post the results.
    ///
    /// Runs for every session however it ended.
    async fn end(
        &self,
        session_id: SessionId,
        rounds_played: usize,
        outcome: SessionOutcome,
    ) -> SessionSummary {
        let leaderboard = {
            let mut board = self.inner.scoreboard.write().await;
            board.sort();
            if let Err(e) = self.inner.store.save(&self.inner.room, &board).await {
                tracing::error!("Failed to save scoreboard for {}: {}", self.inner.room, e);
            }
            ranked(board.leaderboard(self.inner.config.leaderboard_size))
        };

        *self.inner.session.write().await = None;

        tracing::info!(
            "Trivia session {} in {} ended ({:?}) after {} rounds",
            session_id,
            self.inner.room,
            outcome,
            rounds_played
        );
        self.publish(Announcement::SessionEnded { rounds_played });
        self.publish(Announcement::Leaderboard {
            title: "Trivia Leaderboard".to_string(),
            entries: leaderboard.clone(),
        });

        SessionSummary {
            session_id,
            rounds_played,
            outcome,
            leaderboard,
        }
    }
}
