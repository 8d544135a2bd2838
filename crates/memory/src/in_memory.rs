//! In-memory step store: the default history for an agent.

use async_trait::async_trait;
use convoke_core::error::MemoryError;
use convoke_core::memory::{MemoryStore, Step};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keeps an agent's steps in a Vec behind an async lock.
///
/// Readers get a cloned snapshot, so a UI polling `history()` never blocks
/// the session for longer than the copy.
#[derive(Clone)]
pub struct InMemoryStore {
    steps: Arc<RwLock<Vec<Step>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            steps: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Seed a store with existing steps.
    pub fn with_steps(steps: Vec<Step>) -> Self {
        Self {
            steps: Arc::new(RwLock::new(steps)),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn history(&self) -> Result<Vec<Step>, MemoryError> {
        Ok(self.steps.read().await.clone())
    }

    async fn add_step(&self, step: Step) -> Result<(), MemoryError> {
        self.steps.write().await.push(step);
        Ok(())
    }

    async fn len(&self) -> Result<usize, MemoryError> {
        Ok(self.steps.read().await.len())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.steps.write().await.clear();
        Ok(())
    }
}
