//! Data models for sprintlog
//!
//! Topics with their ordered links, the append-only update/comment logs,
//! and the fixed set of users who may author them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{StoreError, StoreResult};

/// Team members allowed to author topics, updates and comments
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum User {
    Marek,
    Annika,
    Kurt,
    Gerd,
}

impl User {
    /// All users, in display order
    pub const ALL: [User; 4] = [User::Marek, User::Annika, User::Kurt, User::Gerd];

    /// The stored name
    pub fn as_str(&self) -> &'static str {
        match self {
            User::Marek => "Marek",
            User::Annika => "Annika",
            User::Kurt => "Kurt",
            User::Gerd => "Gerd",
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for User {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        User::ALL
            .into_iter()
            .find(|u| u.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                StoreError::validation(format!(
                    "unknown user '{}' (expected one of: {})",
                    name,
                    User::ALL.map(|u| u.as_str()).join(", ")
                ))
            })
    }
}

/// A labelled URL attached to a topic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicLink {
    pub label: String,
    pub url: String,
}

impl TopicLink {
    /// Build a link, trimming both parts and defaulting the label to the URL
    ///
    /// Fails if the URL is not `http://` or `https://`.
    pub fn new(url: &str, label: &str) -> StoreResult<Self> {
        let url = url.trim();
        validate_url(url)?;
        let label = match label.trim() {
            "" => url,
            l => l,
        };
        Ok(Self {
            label: label.to_string(),
            url: url.to_string(),
        })
    }
}

/// Check a link URL against `^https?://`
pub fn validate_url(url: &str) -> StoreResult<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(StoreError::validation(format!(
            "invalid URL '{}': links must start with http:// or https://",
            url
        )))
    }
}

/// A sprint topic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    /// Surrogate key, assigned by the store
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    /// Free-text category name; may refer to a deleted category
    pub category: Option<String>,
    pub created_by: User,
    pub created_at: DateTime<Utc>,
    /// Links in insertion order
    pub links: Vec<TopicLink>,
    /// Set while the topic is archived
    pub archived_at: Option<DateTime<Utc>>,
}

impl Topic {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    /// Case-insensitive substring match against title or description
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
    }
}

/// Input for creating a topic
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTopic {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub author: Option<User>,
    /// `(label, url)` pairs as entered; rows with a blank URL are dropped
    pub links: Vec<(String, String)>,
}

impl NewTopic {
    pub fn new(title: impl Into<String>, author: User) -> Self {
        Self {
            title: title.into(),
            author: Some(author),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn link(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.links.push((label.into(), url.into()));
        self
    }

    /// Validate and normalize the input
    ///
    /// Returns the trimmed title, the description (blank becomes `None`),
    /// the category and the validated links.
    pub(crate) fn validate(&self) -> StoreResult<ValidTopic> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(StoreError::validation("title is required"));
        }
        let author = self
            .author
            .ok_or_else(|| StoreError::validation("author is required"))?;

        let links = self
            .links
            .iter()
            .filter(|(_, url)| !url.trim().is_empty())
            .map(|(label, url)| TopicLink::new(url, label))
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(ValidTopic {
            title: title.to_string(),
            description: non_blank(self.description.as_deref()),
            category: non_blank(self.category.as_deref()),
            author,
            links,
        })
    }
}

/// A `NewTopic` that passed validation
#[derive(Debug, Clone)]
pub(crate) struct ValidTopic {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub author: User,
    pub links: Vec<TopicLink>,
}

/// Which append-only log an entry belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Update,
    Comment,
}

impl EntryKind {
    pub(crate) fn table(&self) -> &'static str {
        match self {
            EntryKind::Update => "updates",
            EntryKind::Comment => "comments",
        }
    }

    /// Section heading used in exports
    pub fn heading(&self) -> &'static str {
        match self {
            EntryKind::Update => "Updates",
            EntryKind::Comment => "Kommentare",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Update => f.write_str("update"),
            EntryKind::Comment => f.write_str("comment"),
        }
    }
}

/// An immutable update or comment on a topic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub id: i64,
    pub topic_id: i64,
    pub user: User,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A topic together with its logs, newest entries first
#[derive(Debug, Clone, PartialEq)]
pub struct TopicBundle {
    pub topic: Topic,
    pub updates: Vec<Entry>,
    pub comments: Vec<Entry>,
}

/// Trim and map blank strings to `None`
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(title: &str, description: Option<&str>) -> Topic {
        Topic {
            id: 1,
            title: title.to_string(),
            description: description.map(str::to_string),
            category: None,
            created_by: User::Kurt,
            created_at: Utc::now(),
            links: Vec::new(),
            archived_at: None,
        }
    }

    #[test]
    fn test_user_parse() {
        assert_eq!("Annika".parse::<User>().unwrap(), User::Annika);
        assert_eq!(" gerd ".parse::<User>().unwrap(), User::Gerd);
        let err = "Bob".parse::<User>().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("Marek, Annika, Kurt, Gerd"));
    }

    #[test]
    fn test_user_display() {
        assert_eq!(User::Marek.to_string(), "Marek");
        assert_eq!(format!("{}", User::Kurt), "Kurt");
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("http://example.com/a?b=c").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("example.com").is_err());
        assert!(validate_url("HTTPS://example.com").is_err());
        assert!(validate_url("").is_err());
    }

    #[test]
    fn test_link_label_defaults_to_url() {
        let link = TopicLink::new("  https://example.com/doc ", "  ").unwrap();
        assert_eq!(link.url, "https://example.com/doc");
        assert_eq!(link.label, "https://example.com/doc");

        let link = TopicLink::new("https://example.com", "Dossier").unwrap();
        assert_eq!(link.label, "Dossier");
    }

    #[test]
    fn test_new_topic_validation() {
        let ok = NewTopic::new("  Solar Rollout ", User::Kurt)
            .description("   ")
            .category("Privatpersonen")
            .link("", "")
            .link("Ticket", "https://tracker.example/1")
            .validate()
            .unwrap();
        assert_eq!(ok.title, "Solar Rollout");
        assert_eq!(ok.description, None);
        assert_eq!(ok.category.as_deref(), Some("Privatpersonen"));
        assert_eq!(ok.links.len(), 1);
        assert_eq!(ok.links[0].label, "Ticket");

        assert!(NewTopic::new("   ", User::Kurt).validate().is_err());
        assert!(NewTopic::new("Title", User::Kurt)
            .link("bad", "www.example.com")
            .validate()
            .is_err());

        let no_author = NewTopic {
            title: "Title".to_string(),
            ..NewTopic::default()
        };
        assert!(no_author.validate().is_err());
    }

    #[test]
    fn test_matches_text() {
        let t = topic("Wärmepumpen Pilot", Some("Ölheizung ersetzen"));
        assert!(t.matches_text("pilot"));
        assert!(t.matches_text("WÄRME"));
        assert!(t.matches_text("ölhei"));
        assert!(t.matches_text(""));
        assert!(!t.matches_text("solar"));

        let no_desc = topic("Solar", None);
        assert!(no_desc.matches_text("sol"));
        assert!(!no_desc.matches_text("heizung"));
    }

    #[test]
    fn test_entry_kind_labels() {
        assert_eq!(EntryKind::Update.table(), "updates");
        assert_eq!(EntryKind::Comment.heading(), "Kommentare");
        assert_eq!(EntryKind::Comment.to_string(), "comment");
    }

    #[test]
    fn test_topic_serialization() {
        let mut t = topic("Solar", Some("Roof panels"));
        t.links.push(TopicLink::new("https://example.com", "Site").unwrap());
        let json = serde_json::to_string(&t).unwrap();
        let back: Topic = serde_json::from_str(&json).unwrap();
        assert_eq!(t, back);
    }
}
