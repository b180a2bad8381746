//! In-memory repository — used by tests and ephemeral runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::archive::model::{ArchiveMessage, TriggerMessage};
use crate::content::model::{Content, User};
use crate::error::DatabaseError;
use crate::store::traits::Repository;

#[derive(Default)]
struct State {
    users: HashMap<String, User>,
    /// Kept in registration order.
    triggers: Vec<TriggerMessage>,
    /// Kept in creation order.
    archives: Vec<ArchiveMessage>,
}

/// Repository backed by process memory. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryRepository {
    state: RwLock<State>,
}

impl InMemoryRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of stored archives across all channels.
    pub async fn archive_count(&self) -> usize {
        self.state.read().await.archives.len()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, DatabaseError> {
        Ok(self.state.read().await.users.get(user_id).cloned())
    }

    async fn create_user(&self, user: &User) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        if state.users.contains_key(&user.user_id) {
            return Err(DatabaseError::Conflict(format!("user {}", user.user_id)));
        }
        state.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        match state.users.get_mut(&user.user_id) {
            Some(stored) => {
                *stored = user.clone();
                Ok(())
            }
            None => Err(DatabaseError::NotFound {
                entity: "user".into(),
                id: user.user_id.clone(),
            }),
        }
    }

    async fn append_content(
        &self,
        user_id: &str,
        content: &Content,
    ) -> Result<User, DatabaseError> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "user".into(),
                id: user_id.to_string(),
            })?;
        user.record(content.clone());
        debug!(user_id, total = user.contents.len(), "Content appended");
        Ok(user.clone())
    }

    async fn list_triggers(&self, channel_id: &str) -> Result<Vec<TriggerMessage>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .triggers
            .iter()
            .filter(|t| t.channel_id == channel_id)
            .cloned()
            .collect())
    }

    async fn create_trigger(
        &self,
        trigger: &TriggerMessage,
    ) -> Result<TriggerMessage, DatabaseError> {
        self.state.write().await.triggers.push(trigger.clone());
        Ok(trigger.clone())
    }

    async fn find_trigger(
        &self,
        channel_id: &str,
        text: &str,
    ) -> Result<Option<TriggerMessage>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .triggers
            .iter()
            .find(|t| t.channel_id == channel_id && t.matches(text))
            .cloned())
    }

    async fn find_archive(
        &self,
        channel_id: &str,
        ts: &str,
    ) -> Result<Option<ArchiveMessage>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .archives
            .iter()
            .find(|a| a.channel_id == channel_id && a.ts == ts)
            .cloned())
    }

    async fn create_archive(
        &self,
        archive: &ArchiveMessage,
    ) -> Result<ArchiveMessage, DatabaseError> {
        let mut state = self.state.write().await;
        if state
            .archives
            .iter()
            .any(|a| a.channel_id == archive.channel_id && a.ts == archive.ts)
        {
            return Err(DatabaseError::Conflict(format!(
                "archive {}/{}",
                archive.channel_id, archive.ts
            )));
        }
        state.archives.push(archive.clone());
        Ok(archive.clone())
    }

    async fn update_archive(
        &self,
        archive: &ArchiveMessage,
    ) -> Result<ArchiveMessage, DatabaseError> {
        let mut state = self.state.write().await;
        let stored = state
            .archives
            .iter_mut()
            .find(|a| a.channel_id == archive.channel_id && a.ts == archive.ts)
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "archive".into(),
                id: format!("{}/{}", archive.channel_id, archive.ts),
            })?;
        stored.message = archive.message.clone();
        stored.trigger_word = archive.trigger_word.clone();
        stored.file_urls = archive.file_urls.clone();
        stored.updated_at = archive.updated_at;
        Ok(stored.clone())
    }

    async fn list_archives(
        &self,
        channel_id: &str,
        trigger_word: &str,
        user_id: &str,
    ) -> Result<Vec<ArchiveMessage>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .archives
            .iter()
            .filter(|a| {
                a.channel_id == channel_id && a.trigger_word == trigger_word && a.user_id == user_id
            })
            .cloned()
            .collect())
    }
}
