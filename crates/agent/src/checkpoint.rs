//! Session checkpoints for resuming an interrupted solve.

use std::collections::HashMap;

use async_trait::async_trait;
use asploop_core::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::controller::{Node, SessionState};

/// Session state plus the node the controller runs next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub state: SessionState,
    pub next: Node,
    pub saved_at: DateTime<Utc>,
}

/// Where checkpoints are kept, keyed by thread id.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Replace the checkpoint for `thread_id`.
    async fn save(&self, thread_id: &str, checkpoint: Checkpoint) -> Result<(), Error>;

    /// The latest checkpoint for `thread_id`, if any.
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, Error>;
}

/// Process-local store. Checkpoints vanish with the process.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.checkpoints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.checkpoints.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, thread_id: &str, checkpoint: Checkpoint) -> Result<(), Error> {
        self.checkpoints
            .write()
            .await
            .insert(thread_id.to_string(), checkpoint);
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, Error> {
        Ok(self.checkpoints.read().await.get(thread_id).cloned())
    }
}
