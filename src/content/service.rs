//! Content workflow — member registration, submissions and passes.
//!
//! Every mutation of a member runs under that member's lock and re-reads
//! the stored record first, so two concurrent requests for the same member
//! validate against the same history they append to.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::channels::dispatcher::Dispatcher;
use crate::content::model::{Category, Content, User};
use crate::content::notify::compose_notification;
use crate::error::{DatabaseError, ValidationError, WorkflowError};
use crate::locks::KeyedLocks;
use crate::store::traits::Repository;
use crate::validation::{normalize_tags, validate_pass_eligibility, validate_url};

/// Pass allowance given to newly registered members.
pub const DEFAULT_PASS_COUNT: u32 = 2;

/// A content submission, already decoded from the caller's payload.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitContentRequest {
    pub username: String,
    pub url: String,
    pub category: Category,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags_raw: String,
}

/// A pass for the current cycle.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitPassRequest {
    pub username: String,
    #[serde(default)]
    pub description: String,
}

pub struct ContentService {
    repo: Arc<dyn Repository>,
    dispatcher: Arc<dyn Dispatcher>,
    user_locks: KeyedLocks,
    default_pass_count: u32,
}

impl ContentService {
    pub fn new(repo: Arc<dyn Repository>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            repo,
            dispatcher,
            user_locks: KeyedLocks::new(),
            default_pass_count: DEFAULT_PASS_COUNT,
        }
    }

    /// Builder: allowance for members registered from now on.
    pub fn with_default_pass_count(mut self, pass_count: u32) -> Self {
        self.default_pass_count = pass_count;
        self
    }

    /// Load a member acting from `channel_id`.
    pub async fn get_user(&self, user_id: &str, channel_id: &str) -> Result<User, WorkflowError> {
        let user = self
            .repo
            .get_user(user_id)
            .await?
            .ok_or(ValidationError::UserNotRegistered)?;
        if user.channel_id != channel_id {
            return Err(ValidationError::NotChannelMember.into());
        }
        Ok(user)
    }

    /// Register a member on first interaction. Returns the stored member
    /// unchanged if one already exists.
    pub async fn register_user(
        &self,
        user_id: &str,
        name: &str,
        channel_id: &str,
    ) -> Result<User, WorkflowError> {
        let _guard = self.user_locks.lock(user_id).await;

        if let Some(existing) = self.repo.get_user(user_id).await? {
            debug!(user_id, "User already registered");
            return Ok(existing);
        }

        let user = User::new(user_id, name, channel_id, self.default_pass_count);
        match self.repo.create_user(&user).await {
            Ok(()) => {
                info!(user_id, channel_id, pass_count = user.pass_count, "User registered");
                Ok(user)
            }
            // Registered through another process between the read and the insert.
            Err(DatabaseError::Conflict(_)) => self
                .repo
                .get_user(user_id)
                .await?
                .ok_or_else(|| {
                    DatabaseError::NotFound {
                        entity: "user".into(),
                        id: user_id.to_string(),
                    }
                    .into()
                }),
            Err(e) => Err(e.into()),
        }
    }

    /// Record a content submission for `user`.
    ///
    /// The URL is checked before anything is written; an invalid URL leaves
    /// the member untouched.
    pub async fn submit_content(
        &self,
        user: &User,
        req: SubmitContentRequest,
    ) -> Result<Content, WorkflowError> {
        validate_url(&req.url)?;

        let _guard = self.user_locks.lock(&user.user_id).await;
        self.current(user).await?;

        let content = Content::submit(
            &user.user_id,
            req.username,
            req.url,
            req.category,
            req.description,
            normalize_tags(&req.tags_raw),
        );
        let updated = self.repo.append_content(&user.user_id, &content).await?;

        info!(
            user_id = %user.user_id,
            category = %req.category,
            total = updated.contents.len(),
            "Content submitted"
        );
        Ok(content)
    }

    /// Record a pass for `user` if the stored history allows it.
    ///
    /// The allowance is only checked here. Replenishing and spending it is
    /// left to the process that owns the cycle bookkeeping.
    pub async fn submit_pass(
        &self,
        user: &User,
        req: SubmitPassRequest,
    ) -> Result<Content, WorkflowError> {
        let _guard = self.user_locks.lock(&user.user_id).await;
        let current = self.current(user).await?;

        if let Err(e) = validate_pass_eligibility(&current) {
            debug!(user_id = %user.user_id, error = %e, "Pass rejected");
            return Err(e.into());
        }

        let content = Content::pass(&user.user_id, req.username, req.description);
        self.repo.append_content(&user.user_id, &content).await?;

        info!(
            user_id = %user.user_id,
            pass_count = current.pass_count,
            "Pass recorded"
        );
        Ok(content)
    }

    /// Post the announcement for `content`. Delivery failures are logged only.
    pub async fn announce(&self, channel_id: &str, content: &Content) {
        let text = compose_notification(content);
        if let Err(e) = self.dispatcher.post_message(channel_id, &text, None).await {
            warn!(
                channel_id,
                user_id = %content.user_id,
                error = %e,
                "Failed to announce content"
            );
        }
    }

    /// Stored copy of `user`, which may be newer than the caller's.
    async fn current(&self, user: &User) -> Result<User, WorkflowError> {
        Ok(self
            .repo
            .get_user(&user.user_id)
            .await?
            .ok_or(ValidationError::UserNotRegistered)?)
    }
}
