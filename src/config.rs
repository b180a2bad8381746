//! Configuration types.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::archive::pipeline::DEFAULT_REACTION;
use crate::channels::slack::DEFAULT_API_BASE;
use crate::content::service::DEFAULT_PASS_COUNT;
use crate::error::ConfigError;

const DEFAULT_DB_PATH: &str = "./data/community-bot.db";
const DEFAULT_PORT: u16 = 3000;

/// Bot configuration, read from the environment at startup.
#[derive(Debug)]
pub struct BotConfig {
    /// Slack bot token (`xoxb-...`).
    pub slack_bot_token: SecretString,
    /// Signing secret used to authenticate inbound requests.
    pub slack_signing_secret: SecretString,
    /// Slack Web API base URL. Overridable for tests.
    pub slack_api_base: String,
    /// libSQL database file.
    pub db_path: PathBuf,
    /// HTTP listen port.
    pub port: u16,
    /// Optional `user_id,name` CSV used to resolve mentions.
    pub users_csv: Option<PathBuf>,
    /// Reaction added to archived messages.
    pub archive_reaction: String,
    /// Pass allowance for newly registered members.
    pub default_pass_count: u32,
}

impl BotConfig {
    /// Build config from environment variables.
    ///
    /// `SLACK_BOT_TOKEN` and `SLACK_SIGNING_SECRET` are required. Everything else has a default, but a
    /// value that is set and fails to parse is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let slack_bot_token = get("SLACK_BOT_TOKEN")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("SLACK_BOT_TOKEN".into()))?;

        let slack_signing_secret = get("SLACK_SIGNING_SECRET")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("SLACK_SIGNING_SECRET".into()))?;

        let port = match get("BOT_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "BOT_PORT".into(),
                message: format!("'{raw}': {e}"),
            })?,
            None => DEFAULT_PORT,
        };

        let default_pass_count = match get("BOT_DEFAULT_PASS_COUNT") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| ConfigError::InvalidValue {
                key: "BOT_DEFAULT_PASS_COUNT".into(),
                message: format!("'{raw}': {e}"),
            })?,
            None => DEFAULT_PASS_COUNT,
        };

        Ok(Self {
            slack_bot_token,
            slack_signing_secret,
            slack_api_base: get("SLACK_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE.into()),
            db_path: get("BOT_DB_PATH")
                .unwrap_or_else(|| DEFAULT_DB_PATH.into())
                .into(),
            port,
            users_csv: get("BOT_USERS_CSV").map(PathBuf::from),
            archive_reaction: get("BOT_ARCHIVE_REACTION")
                .unwrap_or_else(|| DEFAULT_REACTION.into()),
            default_pass_count,
        })
    }
}
