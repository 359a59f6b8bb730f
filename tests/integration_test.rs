use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use triviabot::catalog::{BanList, CatalogItem, CatalogSource, RankedCatalog};
use triviabot::config::TriviaConfig;
use triviabot::game::{SessionOutcome, TriviaGame};
use triviabot::protocol::Announcement;
use triviabot::queue::{question_queue, Produced};
use triviabot::room::{Room, INVALID_START_MESSAGE};
use triviabot::sampler::{QuestionSampler, RetryPolicy, EXHAUSTED_MESSAGE};
use triviabot::scoreboard::{
    JsonScoreStore, MemoryScoreStore, ScoreStore, Scoreboard, LEADERBOARD_CAP, TIMER_USER,
};
use triviabot::types::{QuestionSpec, ScoreEntry};
use tokio_util::sync::CancellationToken;

fn show(id: usize, title: &str) -> CatalogItem {
    CatalogItem {
        id: id.to_string(),
        title: title.to_string(),
        aliases: Vec::new(),
        medium: Some("anime".to_string()),
        kind: Some("tv".to_string()),
        tags: vec!["Drama".to_string()],
        image_url: Some(format!("https://img.example/{}.png", id)),
        synopsis: Some("A long running story".to_string()),
        score: Some(id as f64),
        adult: false,
    }
}

fn numbered_shows(n: usize) -> Vec<CatalogItem> {
    (1..=n).map(|i| show(i, &format!("Series Number {}", i))).collect()
}

fn config() -> TriviaConfig {
    TriviaConfig {
        retry: RetryPolicy {
            attempts: 1,
            backoff: Duration::from_millis(1),
        },
        ..TriviaConfig::default()
    }
}

async fn room_with(items: Vec<CatalogItem>, store: Arc<dyn ScoreStore>) -> Room {
    room_with_config(config(), items, store).await
}

async fn room_with_config(
    config: TriviaConfig,
    items: Vec<CatalogItem>,
    store: Arc<dyn ScoreStore>,
) -> Room {
    let game = TriviaGame::open(
        "animeandmanga",
        config,
        Arc::new(RankedCatalog::new("anime", items)),
        Arc::new(BanList::default()),
        store,
    )
    .await
    .expect("game should open");
    Room::new(game)
}

async fn next_question(rx: &mut broadcast::Receiver<Announcement>) {
    loop {
        if let Announcement::Question { .. } = rx.recv().await.expect("announcement") {
            return;
        }
    }
}

fn drain(rx: &mut broadcast::Receiver<Announcement>) -> Vec<Announcement> {
    let mut out = Vec::new();
    while let Ok(a) = rx.try_recv() {
        out.push(a);
    }
    out
}

/// Nobody answers: every round ends by autoskip and nobody scores
#[tokio::test(start_paused = true)]
async fn test_autoskip_session_without_guesses() {
    let room = room_with(numbered_shows(20), Arc::new(MemoryScoreStore::new())).await;
    let mut rx = room.game().subscribe();
    let started = tokio::time::Instant::now();

    let reply = room
        .handle_message("%host", "]trivia start 3 -autoskip 5")
        .await;
    assert_eq!(reply, None);

    let summary = room.finish().await.expect("session").expect("summary");
    assert_eq!(summary.rounds_played, 3);
    assert_eq!(summary.outcome, SessionOutcome::Completed);
    assert!(summary.leaderboard.is_empty());
    assert!(started.elapsed() >= Duration::from_secs(3 * (3 + 5)));

    let announcements = drain(&mut rx);
    assert!(matches!(
        announcements.first(),
        Some(Announcement::SessionStarted { rounds: 3, autoskip_secs: Some(5), .. })
    ));
    let unanswered = announcements
        .iter()
        .filter(|a| matches!(a, Announcement::Unanswered { .. }))
        .count();
    assert_eq!(unanswered, 3);
    assert!(announcements.contains(&Announcement::SessionEnded { rounds_played: 3 }));
}

/// A correct guess scores immediately and the scoreboard is persisted
#[tokio::test]
async fn test_correct_guess_is_scored_and_saved() {
    let dir = tempfile::tempdir().unwrap();
    let config = TriviaConfig {
        prereveal_delay: Duration::from_millis(10),
        ..config()
    };
    let store = Arc::new(JsonScoreStore::new(dir.path()));
    let room = room_with_config(config, vec![show(1, "Cowboy Bebop")], store.clone()).await;
    let mut rx = room.game().subscribe();

    room.handle_message("@mod", "]trivia start 1").await;
    next_question(&mut rx).await;

    assert_eq!(room.handle_message(" Alice", "Cowboy Bebop!").await, None);
    let summary = room.finish().await.unwrap().unwrap();
    assert_eq!(summary.outcome, SessionOutcome::Completed);
    assert_eq!(summary.leaderboard[0].user, "alice");
    assert_eq!(summary.leaderboard[0].score, 1);

    assert!(drain(&mut rx).contains(&Announcement::Solved {
        winner: "Alice".to_string(),
        answer: "Cowboy Bebop".to_string(),
    }));

    assert_eq!(
        room.handle_message(" alice", "]trivia score").await,
        Some("alice has earned 1 points in trivia.".to_string())
    );
    assert_eq!(
        room.handle_message(" alice", "]trivia score nobody").await,
        Some("User not found.".to_string())
    );
    let leaderboard = room
        .handle_message(" alice", "]trivia leaderboard")
        .await
        .unwrap();
    assert!(leaderboard.contains("1. alice 1 pts"));

    let saved = store.load("animeandmanga").await.unwrap();
    assert_eq!(saved.userscore("alice"), Some(("alice".to_string(), 1)));
}

/// Starting while a session runs is refused and leaves it alone
#[tokio::test(start_paused = true)]
async fn test_double_start_is_rejected() {
    let room = room_with(numbered_shows(10), Arc::new(MemoryScoreStore::new())).await;
    let mut rx = room.game().subscribe();

    room.handle_message("%host", "]trivia start 4 -autoskip 0").await;
    next_question(&mut rx).await;
    let round = room.game().current_round().await;
    assert_eq!(round, Some(1));

    let reply = room
        .handle_message("#owner", "]trivia start 2")
        .await
        .expect("rejection message");
    assert!(reply.contains("already running"));
    assert_eq!(room.game().current_round().await, round);

    assert_eq!(room.handle_message("+voice", "]trivia stop").await, None);
    let summary = room.finish().await.unwrap().unwrap();
    assert_eq!(summary.outcome, SessionOutcome::Cancelled);
    assert_eq!(summary.rounds_played, 1);
    assert!(!room.game().is_active().await);
}

/// Excluding the only type in the catalog leaves nothing to ask
#[tokio::test(start_paused = true)]
async fn test_excluded_categories_exhaust_catalog() {
    let room = room_with(numbered_shows(10), Arc::new(MemoryScoreStore::new())).await;
    let mut rx = room.game().subscribe();

    room.handle_message("%host", "]trivia start -categories tv -excludecats").await;
    let summary = room.finish().await.unwrap().unwrap();

    assert_eq!(summary.outcome, SessionOutcome::Exhausted);
    assert_eq!(summary.rounds_played, 0);
    assert!(summary.leaderboard.is_empty());

    let announcements = drain(&mut rx);
    assert!(announcements.contains(&Announcement::Exhausted {
        reason: EXHAUSTED_MESSAGE.to_string()
    }));
    assert!(announcements.contains(&Announcement::Leaderboard {
        title: "Trivia Leaderboard".to_string(),
        entries: Vec::new(),
    }));
}

#[tokio::test(start_paused = true)]
async fn test_commands_respect_rank() {
    let room = room_with(numbered_shows(5), Arc::new(MemoryScoreStore::new())).await;

    assert_eq!(room.handle_message(" pleb", "]trivia start").await, None);
    assert_eq!(room.handle_message("+voice", "]trivia start").await, None);
    assert!(!room.game().is_active().await);

    assert_eq!(
        room.handle_message("+voice", "]trivia stop").await,
        Some("No trivia game in progress.".to_string())
    );
    assert_eq!(
        room.handle_message("%driver", "]trivia start -bogus").await,
        Some(INVALID_START_MESSAGE.to_string())
    );

    room.handle_message("★host", "]trivia start 2 -autoskip 0").await;
    assert!(room.game().is_active().await);
    // Regular users cannot stop it
    assert_eq!(room.handle_message(" pleb", "]trivia end").await, None);
    assert!(room.game().is_active().await);

    room.handle_message("~admin", "]trivia end").await;
    let summary = room.finish().await.unwrap().unwrap();
    assert_eq!(summary.outcome, SessionOutcome::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_skip_alias_reveals_answer() {
    let room = room_with(vec![show(1, "Mushishi")], Arc::new(MemoryScoreStore::new())).await;
    let mut rx = room.game().subscribe();

    room.handle_message("%host", "]trivia start 1 -autoskip 0").await;
    next_question(&mut rx).await;

    assert_eq!(room.handle_message("+voice", "]skip").await, None);
    room.finish().await.unwrap().unwrap();
    assert!(drain(&mut rx).contains(&Announcement::Skipped {
        answer: "Mushishi".to_string()
    }));
}

#[tokio::test(start_paused = true)]
async fn test_bot_identity_skips_without_scoring() {
    let room = room_with(vec![show(1, "Mushishi")], Arc::new(MemoryScoreStore::new())).await;
    let mut rx = room.game().subscribe();

    room.handle_message("%host", "]trivia start 1 -autoskip 0").await;
    next_question(&mut rx).await;

    room.handle_message("*TriviaBot", "mushishi").await;
    let summary = room.finish().await.unwrap().unwrap();
    assert!(summary.leaderboard.is_empty());
    assert!(drain(&mut rx).contains(&Announcement::Unanswered {
        answer: "Mushishi".to_string()
    }));
}

#[tokio::test(start_paused = true)]
async fn test_anagram_session_requires_exact_answer() {
    let room = room_with(
        vec![show(1, "Fullmetal Alchemist")],
        Arc::new(MemoryScoreStore::new()),
    )
    .await;
    let mut rx = room.game().subscribe();

    room.handle_message("%host", "]anagrams start 1").await;
    let scrambled = loop {
        match rx.recv().await.unwrap() {
            Announcement::Question {
                prompt: triviabot::types::Prompt::Anagram { scrambled },
                ..
            } => break scrambled,
            Announcement::SessionStarted { autoskip_secs, .. } => {
                assert_eq!(autoskip_secs, Some(45));
            }
            _ => {}
        }
    };
    assert_ne!(scrambled, "Fullmetal Alchemist");

    // A prefix is close enough elsewhere, but not for anagrams
    assert!(!room.game().check_guess("eve", "fullmetal").await.is_correct());
    assert!(room
        .game()
        .check_guess("eve", "Fullmetal Alchemist")
        .await
        .is_correct());
    room.finish().await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_elapsed_reset_wipes_scores_on_start() {
    let store = Arc::new(MemoryScoreStore::new());
    let old = Scoreboard::from_rows(vec![
        ScoreEntry {
            user: TIMER_USER.to_string(),
            score: 1,
        },
        ScoreEntry {
            user: "alice".to_string(),
            score: 5,
        },
    ]);
    store.save("animeandmanga", &old).await.unwrap();

    let config = TriviaConfig {
        reset_period: Some(Duration::from_secs(3600)),
        ..config()
    };
    let room = room_with_config(config, numbered_shows(3), store.clone()).await;
    assert_eq!(room.game().score("alice").await, Some(("alice".to_string(), 5)));

    room.handle_message("%host", "]trivia start 1 -autoskip 1").await;
    assert_eq!(room.game().score("alice").await, None);
    room.finish().await.unwrap().unwrap();

    let saved = store.load("animeandmanga").await.unwrap();
    assert!(saved.is_empty());
    assert!(saved.next_reset().unwrap() > 1);
}

#[test]
fn test_leaderboard_is_sorted_and_bounded() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..50 {
        let mut rows: Vec<ScoreEntry> = (0..rng.random_range(0..30))
            .map(|i| ScoreEntry {
                user: format!("user{}", i),
                score: rng.random_range(0..100),
            })
            .collect();
        rows.push(ScoreEntry {
            user: TIMER_USER.to_string(),
            score: 4_000_000_000,
        });
        let board = Scoreboard::from_rows(rows);

        let n = rng.random_range(0..20);
        let top = board.leaderboard(n);
        assert!(top.len() <= n.min(LEADERBOARD_CAP));
        assert!(top.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(top.iter().all(|e| e.user != TIMER_USER));
    }
}

#[test]
fn test_update_scores_is_monotonic() {
    let mut board = Scoreboard::from_rows(vec![ScoreEntry {
        user: "hippo".to_string(),
        score: 7,
    }]);
    for k in 1..=5u64 {
        board.update_scores("Hippo");
        assert_eq!(board.userscore("hippo"), Some(("hippo".to_string(), 7 + k)));
    }
}

#[tokio::test]
async fn test_session_never_repeats_an_item() {
    let catalog: Arc<dyn CatalogSource> = Arc::new(RankedCatalog::new("anime", numbered_shows(30)));
    let spec = QuestionSpec {
        rounds: 30,
        ..QuestionSpec::default()
    }
    .with_difficulty(15);
    let sampler = QuestionSampler::new(
        catalog,
        spec,
        Arc::new(BanList::default()),
        RetryPolicy::default(),
    );

    let (producer, mut consumer) = question_queue();
    let task = sampler.spawn_production("animeandmanga", 30, producer, CancellationToken::new());

    let mut ids = Vec::new();
    while let Some(Produced::Question(question)) = consumer.next().await {
        ids.push(question.source_id);
    }
    task.await.unwrap();

    assert_eq!(ids.len(), 30);
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), ids.len());
}
