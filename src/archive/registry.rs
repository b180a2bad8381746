//! Trigger registry — per-channel keyword registration and lookup.

use std::sync::Arc;

use tracing::{debug, info};

use crate::archive::model::TriggerMessage;
use crate::error::WorkflowError;
use crate::locks::KeyedLocks;
use crate::store::traits::Repository;
use crate::validation::validate_trigger_word;

/// Registers trigger words and finds the one a message matches.
pub struct TriggerRegistry {
    repo: Arc<dyn Repository>,
    channel_locks: KeyedLocks,
}

impl TriggerRegistry {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self {
            repo,
            channel_locks: KeyedLocks::new(),
        }
    }

    /// Register `word` in `channel_id` after syntax and collision checks.
    ///
    /// The collision check and the insert run under the channel's lock so two
    /// concurrent registrations cannot both pass against the same snapshot.
    pub async fn create_trigger(
        &self,
        user_id: &str,
        channel_id: &str,
        word: &str,
    ) -> Result<TriggerMessage, WorkflowError> {
        let _guard = self.channel_locks.lock(channel_id).await;

        let existing: Vec<String> = self
            .repo
            .list_triggers(channel_id)
            .await?
            .into_iter()
            .map(|t| t.trigger_word)
            .collect();

        if let Err(e) = validate_trigger_word(word, &existing) {
            debug!(channel_id, word, error = %e, "Trigger word rejected");
            return Err(e.into());
        }

        let trigger = self
            .repo
            .create_trigger(&TriggerMessage::new(user_id, channel_id, word))
            .await?;

        info!(
            channel_id,
            user_id,
            trigger_word = %trigger.trigger_word,
            "Trigger registered"
        );
        Ok(trigger)
    }

    /// First trigger in registration order whose word occurs in `text`.
    pub async fn find_matching_trigger(
        &self,
        channel_id: &str,
        text: &str,
    ) -> Result<Option<TriggerMessage>, WorkflowError> {
        Ok(self.repo.find_trigger(channel_id, text).await?)
    }

    /// All triggers in a channel, in registration order.
    pub async fn list(&self, channel_id: &str) -> Result<Vec<TriggerMessage>, WorkflowError> {
        Ok(self.repo.list_triggers(channel_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::store::memory::InMemoryRepository;

    fn registry() -> TriggerRegistry {
        TriggerRegistry::new(InMemoryRepository::new())
    }

    #[tokio::test]
    async fn registers_and_finds_trigger() {
        let registry = registry();
        let trigger = registry.create_trigger("U1", "C1", "$retro").await.unwrap();
        assert_eq!(trigger.channel_id, "C1");
        assert_eq!(trigger.user_id, "U1");

        let found = registry
            .find_matching_trigger("C1", "today's $retro notes")
            .await
            .unwrap();
        assert_eq!(found.map(|t| t.id), Some(trigger.id));
    }

    #[tokio::test]
    async fn lookup_is_scoped_to_channel() {
        let registry = registry();
        registry.create_trigger("U1", "C1", "$retro").await.unwrap();
        assert!(
            registry
                .find_matching_trigger("C2", "$retro")
                .await
                .unwrap()
                .is_none()
        );
        // The same word is fine in another channel.
        assert!(registry.create_trigger("U1", "C2", "$retro").await.is_ok());
    }

    #[tokio::test]
    async fn rejects_colliding_word() {
        let registry = registry();
        registry.create_trigger("U1", "C1", "$me").await.unwrap();

        let err = registry.create_trigger("U2", "C1", "$memo").await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Validation(ValidationError::SimilarTrigger { .. })
        ));
        assert_eq!(registry.list("C1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_invalid_syntax_without_writing() {
        let registry = registry();
        for word in ["retro", "$", "$a b"] {
            assert!(matches!(
                registry.create_trigger("U1", "C1", word).await,
                Err(WorkflowError::Validation(_))
            ));
        }
        assert!(registry.list("C1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_registrations_do_not_both_succeed() {
        let registry = Arc::new(registry());
        let a = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.create_trigger("U1", "C1", "$log").await })
        };
        let b = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.create_trigger("U2", "C1", "$logbook").await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(registry.list("C1").await.unwrap().len(), 1);
    }
}
