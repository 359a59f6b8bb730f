use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use triviabot::catalog::{BanList, RankedCatalog};
use triviabot::config::TriviaConfig;
use triviabot::game::TriviaGame;
use triviabot::room::{parse_chat_line, Room};
use triviabot::scoreboard::JsonScoreStore;

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Logs go to stderr; stdout is the room
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "triviabot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting triviabot...");

    let config = TriviaConfig::from_env();

    let catalog = match RankedCatalog::load(&config.catalog_path) {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            tracing::error!(
                "Failed to load catalog {}: {}",
                config.catalog_path.display(),
                e
            );
            std::process::exit(1);
        }
    };

    let banlist = match BanList::load(&config.banlist_path()) {
        Ok(banlist) => banlist,
        Err(e) => {
            tracing::warn!("Failed to load ban list: {}. Continuing without one.", e);
            BanList::default()
        }
    };

    let store = Arc::new(JsonScoreStore::new(config.scoreboard_dir()));
    let game = match TriviaGame::open(
        config.room.clone(),
        config.clone(),
        catalog,
        Arc::new(banlist),
        store,
    )
    .await
    {
        Ok(game) => game,
        Err(e) => {
            tracing::error!("Failed to open trivia for {}: {}", config.room, e);
            std::process::exit(1);
        }
    };
    let room = Room::new(game);

    // Print everything the game announces
    let mut announcements = room.game().subscribe();
    let room_name = room.name().to_string();
    tokio::spawn(async move {
        loop {
            match announcements.recv().await {
                Ok(announcement) => println!("{}| {}", room_name, announcement),
                Err(RecvError::Lagged(n)) => tracing::warn!("Dropped {} announcements", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    tracing::info!(
        "Playing in {} as {}. Type `<rank><user>: <message>` lines, e.g. `%alice: ]trivia start 5`",
        room.name(),
        config.bot_name
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        };

        match line {
            Ok(Some(line)) => {
                let Some((sender, text)) = parse_chat_line(&line) else {
                    if !line.trim().is_empty() {
                        tracing::warn!("Ignoring line without a sender: {}", line);
                    }
                    continue;
                };
                if let Some(reply) = room.handle_message(sender, text).await {
                    println!("{}| {}", room.name(), reply);
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed to read stdin: {}", e);
                break;
            }
        }
    }

    // Flush scores of a session still in progress
    if room.game().is_active().await {
        if let Err(e) = room.game().stop().await {
            tracing::warn!("Failed to stop trivia session: {}", e);
        }
    }
    if let Some(Err(e)) = room.finish().await {
        tracing::error!("Trivia session did not finish cleanly: {}", e);
    }
}
