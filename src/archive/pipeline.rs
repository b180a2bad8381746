//! Archive reconciliation — turns trigger-matching channel messages into
//! archive records, distinguishing new messages from edits.
//!
//! Flow per event:
//! 1. Rewrite mentions to display names
//! 2. Find a matching trigger (no match → no side effects)
//! 3. Create or update the archive keyed by `(channel_id, ts)`; a
//!    redelivery of a stored message stops here with no writes
//! 4. Add a reaction (best-effort, duplicate reactions are fine)
//! 5. Post a threaded acknowledgement (best-effort)
//!
//! The archive write is the source of truth. Dispatcher failures in steps
//! 4 and 5 are logged and never undo it. Once archived, a record is kept
//! even if a later edit removes the trigger word.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::archive::model::{ArchiveKind, ArchiveMessage, ArchiveOutcome, InboundEvent};
use crate::archive::registry::TriggerRegistry;
use crate::archive::resolver::{IdentifierResolver, rewrite_mentions};
use crate::channels::dispatcher::{Dispatcher, ReactionOutcome};
use crate::error::{DatabaseError, WorkflowError};
use crate::locks::KeyedLocks;
use crate::store::traits::Repository;

/// Default reaction added to archived messages.
pub const DEFAULT_REACTION: &str = "round_pushpin";

/// Reconciles inbound channel messages against registered triggers.
pub struct ArchivePipeline {
    repo: Arc<dyn Repository>,
    registry: Arc<TriggerRegistry>,
    resolver: Arc<dyn IdentifierResolver>,
    dispatcher: Arc<dyn Dispatcher>,
    reaction: String,
    message_locks: KeyedLocks,
}

impl ArchivePipeline {
    pub fn new(
        repo: Arc<dyn Repository>,
        registry: Arc<TriggerRegistry>,
        resolver: Arc<dyn IdentifierResolver>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            repo,
            registry,
            resolver,
            dispatcher,
            reaction: DEFAULT_REACTION.to_string(),
            message_locks: KeyedLocks::new(),
        }
    }

    /// Builder: use a different reaction emoji.
    pub fn with_reaction(mut self, reaction: impl Into<String>) -> Self {
        self.reaction = reaction.into();
        self
    }

    /// Process one inbound event.
    ///
    /// Returns `None` when no trigger matches. Repository failures abort
    /// and propagate; dispatcher failures do not.
    pub async fn handle(
        &self,
        event: InboundEvent,
    ) -> Result<Option<ArchiveOutcome>, WorkflowError> {
        let display_text = rewrite_mentions(&event.text, self.resolver.as_ref());

        let Some(trigger) = self
            .registry
            .find_matching_trigger(&event.channel_id, &display_text)
            .await?
        else {
            debug!(
                channel_id = %event.channel_id,
                ts = %event.ts,
                "No trigger matched, ignoring message"
            );
            return Ok(None);
        };

        let (archive, kind) = {
            let key = format!("{}:{}", event.channel_id, event.ts);
            let _guard = self.message_locks.lock(&key).await;
            self.reconcile(&event, display_text, &trigger.trigger_word)
                .await?
        };

        if kind == ArchiveKind::Duplicate {
            debug!(
                channel_id = %archive.channel_id,
                ts = %archive.ts,
                "Redelivered message already archived, skipping"
            );
            return Ok(Some(ArchiveOutcome {
                archive,
                kind,
                ordinal: None,
            }));
        }

        info!(
            channel_id = %archive.channel_id,
            ts = %archive.ts,
            user_id = %archive.user_id,
            trigger_word = %archive.trigger_word,
            kind = ?kind,
            "Message archived"
        );

        self.react(&archive).await;

        let ordinal = match kind {
            ArchiveKind::Created => self.ordinal(&archive).await,
            ArchiveKind::Updated | ArchiveKind::Duplicate => None,
        };

        let reply = compose_reply(&archive, kind, ordinal);
        if let Err(e) = self
            .dispatcher
            .post_message(&archive.channel_id, &reply, Some(&archive.ts))
            .await
        {
            warn!(
                channel_id = %archive.channel_id,
                ts = %archive.ts,
                error = %e,
                "Failed to post archive acknowledgement"
            );
        }

        Ok(Some(ArchiveOutcome {
            archive,
            kind,
            ordinal,
        }))
    }

    /// Create-or-update under the message lock.
    ///
    /// A new message is a creation. A redelivery of a stored message is a
    /// duplicate and writes nothing, so a stale copy arriving after an edit
    /// cannot roll the record back. An edit updates the stored record, or
    /// creates one if the original was never archived.
    async fn reconcile(
        &self,
        event: &InboundEvent,
        display_text: String,
        trigger_word: &str,
    ) -> Result<(ArchiveMessage, ArchiveKind), WorkflowError> {
        let stored = if event.is_edit {
            self.repo.find_archive(&event.channel_id, &event.ts).await?
        } else {
            None
        };
        if let Some(existing) = stored {
            if existing.has_same_content(&display_text, trigger_word, &event.file_urls) {
                return Ok((existing, ArchiveKind::Duplicate));
            }
            let updated = self
                .update_existing(existing, display_text, trigger_word, event)
                .await?;
            return Ok((updated, ArchiveKind::Updated));
        }

        let archive = ArchiveMessage::new(
            &event.channel_id,
            &event.ts,
            display_text,
            &event.user_id,
            trigger_word,
            event.file_urls.clone(),
        );

        match self.repo.create_archive(&archive).await {
            Ok(created) => Ok((created, ArchiveKind::Created)),
            Err(DatabaseError::Conflict(_)) => {
                let existing = self
                    .repo
                    .find_archive(&event.channel_id, &event.ts)
                    .await?
                    .ok_or_else(|| DatabaseError::NotFound {
                        entity: "archive".into(),
                        id: format!("{}/{}", event.channel_id, event.ts),
                    })?;
                Ok((existing, ArchiveKind::Duplicate))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Rank of a freshly created archive among its author's archives for the
    /// same word. The archive is already written, so a failed count only
    /// drops the number from the reply.
    async fn ordinal(&self, archive: &ArchiveMessage) -> Option<usize> {
        match self
            .repo
            .list_archives(&archive.channel_id, &archive.trigger_word, &archive.user_id)
            .await
        {
            Ok(archives) => Some(archives.len()),
            Err(e) => {
                warn!(
                    channel_id = %archive.channel_id,
                    ts = %archive.ts,
                    error = %e,
                    "Failed to count archives, replying without ordinal"
                );
                None
            }
        }
    }

    async fn update_existing(
        &self,
        mut existing: ArchiveMessage,
        display_text: String,
        trigger_word: &str,
        event: &InboundEvent,
    ) -> Result<ArchiveMessage, WorkflowError> {
        existing.apply_edit(
            display_text,
            trigger_word.to_string(),
            event.file_urls.clone(),
        );
        Ok(self.repo.update_archive(&existing).await?)
    }

    async fn react(&self, archive: &ArchiveMessage) {
        match self
            .dispatcher
            .add_reaction(&archive.channel_id, &archive.ts, &self.reaction)
            .await
        {
            Ok(ReactionOutcome::Added) => {}
            Ok(ReactionOutcome::AlreadyReacted) => {
                debug!(ts = %archive.ts, "Reaction already present");
            }
            Err(e) => {
                warn!(
                    channel_id = %archive.channel_id,
                    ts = %archive.ts,
                    error = %e,
                    "Failed to add archive reaction"
                );
            }
        }
    }
}

/// Threaded acknowledgement text. Creations carry the ordinal when known.
pub fn compose_reply(
    archive: &ArchiveMessage,
    kind: ArchiveKind,
    ordinal: Option<usize>,
) -> String {
    match (kind, ordinal) {
        (ArchiveKind::Created, Some(n)) => format!(
            "Saved <@{}>'s `{}` message #{n}. 😉",
            archive.user_id, archive.trigger_word
        ),
        (ArchiveKind::Created, None) => format!(
            "Saved <@{}>'s `{}` message. 😉",
            archive.user_id, archive.trigger_word
        ),
        (ArchiveKind::Updated | ArchiveKind::Duplicate, _) => format!(
            "Updated <@{}>'s `{}` message. 😉",
            archive.user_id, archive.trigger_word
        ),
    }
}
