//! Scoreboard persistence, keyed by room name

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

use super::Scoreboard;
use crate::answer::normalize;
use crate::types::ScoreEntry;

/// Schema version for scoreboard files
pub const SCOREBOARD_SCHEMA_VERSION: u32 = 1;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Scoreboard I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scoreboard file is malformed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Scoreboard schema version {0} is newer than supported version {SCOREBOARD_SCHEMA_VERSION}")]
    UnsupportedSchema(u32),
}

/// Where scoreboards live between sessions
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Load a room's scoreboard; a room that never played gets an empty one
    async fn load(&self, room: &str) -> StoreResult<Scoreboard>;

    async fn save(&self, room: &str, board: &Scoreboard) -> StoreResult<()>;
}

/// On-disk snapshot of one room's scoreboard
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScoreboardFile {
    schema_version: u32,
    /// ISO8601
    saved_at: String,
    room: String,
    rows: Vec<ScoreEntry>,
}

/// One JSON file per room under a data directory
#[derive(Debug, Clone)]
pub struct JsonScoreStore {
    dir: PathBuf,
}

impl JsonScoreStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, room: &str) -> PathBuf {
        self.dir.join(format!("{}.json", normalize(room)))
    }
}

#[async_trait]
impl ScoreStore for JsonScoreStore {
    async fn load(&self, room: &str) -> StoreResult<Scoreboard> {
        let path = self.path_for(room);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No scoreboard at {}, starting empty", path.display());
                return Ok(Scoreboard::new());
            }
            Err(e) => return Err(e.into()),
        };

        let file: ScoreboardFile = serde_json::from_str(&raw)?;
        if file.schema_version > SCOREBOARD_SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchema(file.schema_version));
        }
        Ok(Scoreboard::from_rows(file.rows))
    }

    async fn save(&self, room: &str, board: &Scoreboard) -> StoreResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let file = ScoreboardFile {
            schema_version: SCOREBOARD_SCHEMA_VERSION,
            saved_at: chrono::Utc::now().to_rfc3339(),
            room: room.to_string(),
            rows: board.to_rows(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        // Write then rename so a crash never leaves a half-written scoreboard
        let path = self.path_for(room);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::info!("Saved scoreboard for {} ({} rows)", room, file.rows.len());
        Ok(())
    }
}

/// Keeps scoreboards in memory only
#[derive(Debug, Default)]
pub struct MemoryScoreStore {
    boards: RwLock<HashMap<String, Vec<ScoreEntry>>>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn load(&self, room: &str) -> StoreResult<Scoreboard> {
        let boards = self.boards.read().await;
        Ok(boards
            .get(&normalize(room))
            .cloned()
            .map(Scoreboard::from_rows)
            .unwrap_or_default())
    }

    async fn save(&self, room: &str, board: &Scoreboard) -> StoreResult<()> {
        self.boards
            .write()
            .await
            .insert(normalize(room), board.to_rows());
        Ok(())
    }
}
