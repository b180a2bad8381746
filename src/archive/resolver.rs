//! Identifier-to-name resolution for archived message text.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{info, warn};

use crate::error::ConfigError;

/// Matches a user mention token such as `<@U024BE7LH>`.
static MENTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@([A-Z0-9]+)>").expect("valid mention regex"));

/// Maps opaque user identifiers to display names.
pub trait IdentifierResolver: Send + Sync {
    /// Display name for `user_id`, if known.
    fn display_name(&self, user_id: &str) -> Option<String>;

    /// Display name for `user_id`, falling back to the identifier itself.
    fn resolve(&self, user_id: &str) -> String {
        self.display_name(user_id)
            .unwrap_or_else(|| user_id.to_string())
    }
}

/// Replace every `<@ID>` mention in `text` with the resolved display name.
pub fn rewrite_mentions(text: &str, resolver: &dyn IdentifierResolver) -> String {
    MENTION_REGEX
        .replace_all(text, |caps: &Captures<'_>| resolver.resolve(&caps[1]))
        .into_owned()
}

/// Resolver backed by a fixed map.
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    names: HashMap<String, String>,
}

impl MapResolver {
    pub fn new(names: HashMap<String, String>) -> Self {
        Self { names }
    }

    /// Load a `user_id,name` CSV with a header row. Column order is taken
    /// from the header; rows missing either column are skipped. Fields may
    /// be double-quoted to carry commas, with `""` for a literal quote.
    /// Quoted fields cannot span lines.
    pub fn from_csv_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let resolver = Self::from_csv_str(&raw)?;
        info!(path = %path.display(), users = resolver.len(), "Loaded user directory");
        Ok(resolver)
    }

    pub fn from_csv_str(raw: &str) -> Result<Self, ConfigError> {
        let mut lines = raw.lines().filter(|l| !l.trim().is_empty());
        let header = lines.next().map(split_csv_line).unwrap_or_default();

        let column = |name: &str| {
            header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: "users csv".into(),
                    message: format!("missing '{name}' column"),
                })
        };
        let id_col = column("user_id")?;
        let name_col = column("name")?;

        let mut names = HashMap::new();
        for (line_no, line) in lines.enumerate() {
            let fields = split_csv_line(line);
            match (fields.get(id_col), fields.get(name_col)) {
                (Some(id), Some(name)) if !id.is_empty() => {
                    names.insert(id.clone(), name.clone());
                }
                _ => warn!(line = line_no + 2, "Skipping malformed users csv row"),
            }
        }
        Ok(Self { names })
    }

    pub fn insert(&mut self, user_id: impl Into<String>, name: impl Into<String>) {
        self.names.insert(user_id.into(), name.into());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Split one CSV line into trimmed fields, honouring double quotes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field).trim().to_string()),
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}

impl IdentifierResolver for MapResolver {
    fn display_name(&self, user_id: &str) -> Option<String> {
        self.names.get(user_id).cloned()
    }
}
