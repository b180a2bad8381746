//! Member and content data model.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discriminator for a content record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Submit,
    Pass,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Pass => "pass",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submit" => Ok(Self::Submit),
            "pass" => Ok(Self::Pass),
            other => Err(format!("unknown content type: '{other}'")),
        }
    }
}

/// Fixed set of submission categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    Project,
    TechAndLanguage,
    OrganizationAndCulture,
    JobSearch,
    DailyLife,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Self::Project,
        Self::TechAndLanguage,
        Self::OrganizationAndCulture,
        Self::JobSearch,
        Self::DailyLife,
        Self::Other,
    ];

    /// Label shown in notifications and accepted on input.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Project => "Project",
            Self::TechAndLanguage => "Tech & Language",
            Self::OrganizationAndCulture => "Organization & Culture",
            Self::JobSearch => "Job Search & Career",
            Self::DailyLife => "Daily Life & Thoughts",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown category: '{s}'"))
    }
}

impl TryFrom<String> for Category {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.label().to_string()
    }
}

/// A single submission or pass. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// When the content was recorded.
    pub dt: DateTime<Utc>,
    /// Author identifier.
    pub user_id: String,
    /// Author display handle.
    pub username: String,
    /// Link to the written piece (submit only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    /// Submit only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Free text, may be empty.
    #[serde(default)]
    pub description: String,
    /// Normalized comma-separated tags (submit only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(rename = "type")]
    pub content_type: ContentType,
}

impl Content {
    /// Build a submit record stamped with the current time.
    pub fn submit(
        user_id: impl Into<String>,
        username: impl Into<String>,
        content_url: impl Into<String>,
        category: Category,
        description: impl Into<String>,
        tags: impl Into<String>,
    ) -> Self {
        Self {
            dt: Utc::now(),
            user_id: user_id.into(),
            username: username.into(),
            content_url: Some(content_url.into()),
            category: Some(category),
            description: description.into(),
            tags: Some(tags.into()),
            content_type: ContentType::Submit,
        }
    }

    /// Build a pass record stamped with the current time.
    pub fn pass(
        user_id: impl Into<String>,
        username: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            dt: Utc::now(),
            user_id: user_id.into(),
            username: username.into(),
            content_url: None,
            category: None,
            description: description.into(),
            tags: None,
            content_type: ContentType::Pass,
        }
    }

    /// Tags as a sorted, de-duplicated list with empty entries dropped.
    pub fn tag_list(&self) -> Vec<&str> {
        let Some(tags) = self.tags.as_deref() else {
            return Vec::new();
        };
        tags.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// A channel member and their append-only content history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub name: String,
    /// Channel the member belongs to.
    pub channel_id: String,
    /// Insertion order is significant.
    #[serde(default)]
    pub contents: Vec<Content>,
    /// Remaining pass allowance. Maintained by an external process.
    pub pass_count: u32,
    /// Type of the most recently recorded content, if any.
    #[serde(default)]
    pub before_type: Option<ContentType>,
}

impl User {
    /// Create a member with an empty history.
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        channel_id: impl Into<String>,
        pass_count: u32,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            channel_id: channel_id.into(),
            contents: Vec::new(),
            pass_count,
            before_type: None,
        }
    }

    /// Append a content record and track its type as the most recent one.
    pub fn record(&mut self, content: Content) {
        self.before_type = Some(content.content_type);
        self.contents.push(content);
    }
}
