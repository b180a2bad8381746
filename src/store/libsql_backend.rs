//! libSQL backend — async `Repository` implementation.
//!
//! Supports local file and in-memory databases. Member history is stored
//! as a JSON array column and appended with a single `json_insert` write.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::archive::model::{ArchiveMessage, TriggerMessage};
use crate::content::model::{Content, ContentType, User};
use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::Repository;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        migrations::run_migrations(backend.conn()).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        migrations::run_migrations(backend.conn()).await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, DatabaseError> {
    serde_json::from_str(s).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

const USER_COLUMNS: &str = "user_id, name, channel_id, contents, pass_count, before_type";

const TRIGGER_COLUMNS: &str = "id, user_id, channel_id, trigger_word, created_at";

const ARCHIVE_COLUMNS: &str =
    "id, channel_id, ts, message, user_id, trigger_word, file_urls, created_at, updated_at";

/// Map a libsql Row to a User. Column order matches USER_COLUMNS.
fn row_to_user(row: &libsql::Row) -> Result<User, DatabaseError> {
    let read = |e: libsql::Error| DatabaseError::Query(format!("user row parse: {e}"));
    let contents_str: String = row.get(3).map_err(read)?;
    let pass_count: i64 = row.get(4).map_err(read)?;
    let before_type: Option<String> = row.get(5).map_err(read)?;

    let pass_count = u32::try_from(pass_count).map_err(|_| {
        DatabaseError::Serialization(format!("pass_count out of range: {pass_count}"))
    })?;
    let before_type = before_type
        .map(|s| s.parse::<ContentType>())
        .transpose()
        .map_err(DatabaseError::Serialization)?;

    Ok(User {
        user_id: row.get(0).map_err(read)?,
        name: row.get(1).map_err(read)?,
        channel_id: row.get(2).map_err(read)?,
        contents: from_json::<Vec<Content>>(&contents_str)?,
        pass_count,
        before_type,
    })
}

/// Map a libsql Row to a TriggerMessage. Column order matches TRIGGER_COLUMNS.
fn row_to_trigger(row: &libsql::Row) -> Result<TriggerMessage, DatabaseError> {
    let read = |e: libsql::Error| DatabaseError::Query(format!("trigger row parse: {e}"));
    let id_str: String = row.get(0).map_err(read)?;
    let created_str: String = row.get(4).map_err(read)?;

    Ok(TriggerMessage {
        id: Uuid::parse_str(&id_str).map_err(|e| DatabaseError::Serialization(e.to_string()))?,
        user_id: row.get(1).map_err(read)?,
        channel_id: row.get(2).map_err(read)?,
        trigger_word: row.get(3).map_err(read)?,
        created_at: parse_datetime(&created_str),
    })
}

/// Map a libsql Row to an ArchiveMessage. Column order matches ARCHIVE_COLUMNS.
fn row_to_archive(row: &libsql::Row) -> Result<ArchiveMessage, DatabaseError> {
    let read = |e: libsql::Error| DatabaseError::Query(format!("archive row parse: {e}"));
    let id_str: String = row.get(0).map_err(read)?;
    let files_str: String = row.get(6).map_err(read)?;
    let created_str: String = row.get(7).map_err(read)?;
    let updated_str: String = row.get(8).map_err(read)?;

    Ok(ArchiveMessage {
        id: Uuid::parse_str(&id_str).map_err(|e| DatabaseError::Serialization(e.to_string()))?,
        channel_id: row.get(1).map_err(read)?,
        ts: row.get(2).map_err(read)?,
        message: row.get(3).map_err(read)?,
        user_id: row.get(4).map_err(read)?,
        trigger_word: row.get(5).map_err(read)?,
        file_urls: from_json(&files_str)?,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Repository for LibSqlBackend {
    // ── Users ───────────────────────────────────────────────────────

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_user(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_user: {e}"))),
        }
    }

    async fn create_user(&self, user: &User) -> Result<(), DatabaseError> {
        let inserted = self
            .conn()
            .execute(
                &format!(
                    "INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(user_id) DO NOTHING"
                ),
                params![
                    user.user_id.as_str(),
                    user.name.as_str(),
                    user.channel_id.as_str(),
                    to_json(&user.contents)?,
                    i64::from(user.pass_count),
                    opt_text(user.before_type.as_ref().map(ContentType::as_str)),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_user: {e}")))?;

        if inserted == 0 {
            return Err(DatabaseError::Conflict(format!("user {}", user.user_id)));
        }
        debug!(user_id = %user.user_id, "User inserted into DB");
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), DatabaseError> {
        let updated = self
            .conn()
            .execute(
                "UPDATE users SET name = ?1, channel_id = ?2, contents = ?3, pass_count = ?4,
                    before_type = ?5
                 WHERE user_id = ?6",
                params![
                    user.name.as_str(),
                    user.channel_id.as_str(),
                    to_json(&user.contents)?,
                    i64::from(user.pass_count),
                    opt_text(user.before_type.as_ref().map(ContentType::as_str)),
                    user.user_id.as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_user: {e}")))?;

        if updated == 0 {
            return Err(DatabaseError::NotFound {
                entity: "user".into(),
                id: user.user_id.clone(),
            });
        }
        Ok(())
    }

    async fn append_content(
        &self,
        user_id: &str,
        content: &Content,
    ) -> Result<User, DatabaseError> {
        let updated = self
            .conn()
            .execute(
                "UPDATE users SET contents = json_insert(contents, '$[#]', json(?1)),
                    before_type = ?2
                 WHERE user_id = ?3",
                params![to_json(content)?, content.content_type.as_str(), user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("append_content: {e}")))?;

        if updated == 0 {
            return Err(DatabaseError::NotFound {
                entity: "user".into(),
                id: user_id.to_string(),
            });
        }
        debug!(user_id, content_type = %content.content_type, "Content appended in DB");

        self.get_user(user_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "user".into(),
                id: user_id.to_string(),
            })
    }

    // ── Triggers ────────────────────────────────────────────────────

    async fn list_triggers(&self, channel_id: &str) -> Result<Vec<TriggerMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {TRIGGER_COLUMNS} FROM trigger_messages
                     WHERE channel_id = ?1 ORDER BY rowid ASC"
                ),
                params![channel_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_triggers: {e}")))?;

        let mut triggers = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_triggers: {e}")))?
        {
            triggers.push(row_to_trigger(&row)?);
        }
        Ok(triggers)
    }

    async fn create_trigger(
        &self,
        trigger: &TriggerMessage,
    ) -> Result<TriggerMessage, DatabaseError> {
        self.conn()
            .execute(
                &format!("INSERT INTO trigger_messages ({TRIGGER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
                params![
                    trigger.id.to_string(),
                    trigger.user_id.as_str(),
                    trigger.channel_id.as_str(),
                    trigger.trigger_word.as_str(),
                    trigger.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_trigger: {e}")))?;

        debug!(
            channel_id = %trigger.channel_id,
            trigger_word = %trigger.trigger_word,
            "Trigger inserted into DB"
        );
        Ok(trigger.clone())
    }

    async fn find_trigger(
        &self,
        channel_id: &str,
        text: &str,
    ) -> Result<Option<TriggerMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {TRIGGER_COLUMNS} FROM trigger_messages
                     WHERE channel_id = ?1 AND instr(?2, trigger_word) > 0
                     ORDER BY rowid ASC LIMIT 1"
                ),
                params![channel_id, text],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_trigger: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_trigger(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_trigger: {e}"))),
        }
    }

    // ── Archives ────────────────────────────────────────────────────

    async fn find_archive(
        &self,
        channel_id: &str,
        ts: &str,
    ) -> Result<Option<ArchiveMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {ARCHIVE_COLUMNS} FROM archive_messages
                     WHERE channel_id = ?1 AND ts = ?2"
                ),
                params![channel_id, ts],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_archive: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_archive(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_archive: {e}"))),
        }
    }

    async fn create_archive(
        &self,
        archive: &ArchiveMessage,
    ) -> Result<ArchiveMessage, DatabaseError> {
        let inserted = self
            .conn()
            .execute(
                &format!(
                    "INSERT INTO archive_messages ({ARCHIVE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     ON CONFLICT(channel_id, ts) DO NOTHING"
                ),
                params![
                    archive.id.to_string(),
                    archive.channel_id.as_str(),
                    archive.ts.as_str(),
                    archive.message.as_str(),
                    archive.user_id.as_str(),
                    archive.trigger_word.as_str(),
                    to_json(&archive.file_urls)?,
                    archive.created_at.to_rfc3339(),
                    archive.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_archive: {e}")))?;

        if inserted == 0 {
            return Err(DatabaseError::Conflict(format!(
                "archive {}/{}",
                archive.channel_id, archive.ts
            )));
        }
        debug!(channel_id = %archive.channel_id, ts = %archive.ts, "Archive inserted into DB");
        Ok(archive.clone())
    }

    async fn update_archive(
        &self,
        archive: &ArchiveMessage,
    ) -> Result<ArchiveMessage, DatabaseError> {
        let updated = self
            .conn()
            .execute(
                "UPDATE archive_messages
                 SET message = ?1, trigger_word = ?2, file_urls = ?3, updated_at = ?4
                 WHERE channel_id = ?5 AND ts = ?6",
                params![
                    archive.message.as_str(),
                    archive.trigger_word.as_str(),
                    to_json(&archive.file_urls)?,
                    archive.updated_at.to_rfc3339(),
                    archive.channel_id.as_str(),
                    archive.ts.as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_archive: {e}")))?;

        if updated == 0 {
            return Err(DatabaseError::NotFound {
                entity: "archive".into(),
                id: format!("{}/{}", archive.channel_id, archive.ts),
            });
        }

        self.find_archive(&archive.channel_id, &archive.ts)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "archive".into(),
                id: format!("{}/{}", archive.channel_id, archive.ts),
            })
    }

    async fn list_archives(
        &self,
        channel_id: &str,
        trigger_word: &str,
        user_id: &str,
    ) -> Result<Vec<ArchiveMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {ARCHIVE_COLUMNS} FROM archive_messages
                     WHERE channel_id = ?1 AND trigger_word = ?2 AND user_id = ?3
                     ORDER BY rowid ASC"
                ),
                params![channel_id, trigger_word, user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_archives: {e}")))?;

        let mut archives = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_archives: {e}")))?
        {
            archives.push(row_to_archive(&row)?);
        }
        Ok(archives)
    }
}
