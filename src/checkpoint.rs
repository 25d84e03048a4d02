use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::pipeline::stage::Stage;
use crate::pipeline::state::OutreachState;

const FORMAT_VERSION: u32 = 1;

/// Snapshot written after every stage so an interrupted run can resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub session: String,
    /// Search query the session was started with.
    pub query: String,
    /// Stage to execute on resume.
    pub next_stage: Stage,
    pub state: OutreachState,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(session: &str, query: &str, next_stage: Stage, state: &OutreachState) -> Self {
        Self {
            version: FORMAT_VERSION,
            session: session.to_string(),
            query: query.to_string(),
            next_stage,
            state: state.clone(),
            saved_at: Utc::now(),
        }
    }
}

/// Persistence for checkpoints, keyed by session token.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;
    async fn load(&self, session: &str) -> Result<Option<Checkpoint>>;
    async fn clear(&self, session: &str) -> Result<()>;
}

/// One JSON file per session under a base directory.
pub struct FileCheckpointer {
    base_dir: PathBuf,
}

impl FileCheckpointer {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, session: &str) -> PathBuf {
        let safe: String = session
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.base_dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl Checkpointer for FileCheckpointer {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_dir).await.map_err(|e| {
            AppError::Checkpoint(format!(
                "Failed to create checkpoint dir {}: {e}",
                self.base_dir.display()
            ))
        })?;

        let path = self.path_for(&checkpoint.session);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(checkpoint)?;

        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(
            session = %checkpoint.session,
            stage = %checkpoint.next_stage,
            cursor = checkpoint.state.cursor,
            "Checkpoint saved"
        );
        Ok(())
    }

    async fn load(&self, session: &str) -> Result<Option<Checkpoint>> {
        let path = self.path_for(session);
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let checkpoint: Checkpoint = serde_json::from_slice(&body).map_err(|e| {
            AppError::Checkpoint(format!("Corrupt checkpoint {}: {e}", path.display()))
        })?;
        validate(&checkpoint, &path)?;

        Ok(Some(checkpoint))
    }

    async fn clear(&self, session: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(session)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn validate(checkpoint: &Checkpoint, path: &Path) -> Result<()> {
    if checkpoint.version != FORMAT_VERSION {
        return Err(AppError::Checkpoint(format!(
            "Unsupported checkpoint version {} in {}",
            checkpoint.version,
            path.display()
        )));
    }
    if checkpoint.state.cursor > checkpoint.state.targets.len() {
        return Err(AppError::Checkpoint(format!(
            "Cursor {} out of range for {} targets in {}",
            checkpoint.state.cursor,
            checkpoint.state.targets.len(),
            path.display()
        )));
    }
    Ok(())
}

/// Process-local checkpoints; lost on exit.
#[derive(Default)]
pub struct MemoryCheckpointer {
    entries: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for MemoryCheckpointer {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(checkpoint.session.clone(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, session: &str) -> Result<Option<Checkpoint>> {
        Ok(self.entries.lock().await.get(session).cloned())
    }

    async fn clear(&self, session: &str) -> Result<()> {
        self.entries.lock().await.remove(session);
        Ok(())
    }
}
