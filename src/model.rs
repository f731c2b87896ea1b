use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EntryStatus {
    #[default]
    Draft,
    Published,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Draft => "draft",
            EntryStatus::Published => "published",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(EntryStatus::Draft),
            "published" | "publish" => Some(EntryStatus::Published),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Role {
    Administrator,
    Editor,
    Author,
    Contributor,
    #[default]
    Subscriber,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Editor => "editor",
            Role::Author => "author",
            Role::Contributor => "contributor",
            Role::Subscriber => "subscriber",
        }
    }

    pub fn parse_role(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "administrator" | "admin" => Some(Role::Administrator),
            "editor" => Some(Role::Editor),
            "author" => Some(Role::Author),
            "contributor" => Some(Role::Contributor),
            "subscriber" => Some(Role::Subscriber),
            _ => None,
        }
    }

    /// Whether the role may create and edit entries.
    pub fn can_edit_posts(&self) -> bool {
        !matches!(self, Role::Subscriber)
    }
}

/// One FAQ question/answer record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub sequence: i64,
    pub status: EntryStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub role: Role,
}

impl User {
    pub fn can_edit_posts(&self) -> bool {
        self.role.can_edit_posts()
    }
}

/// Fields supplied when creating an entry.
#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    pub title: String,
    pub body: String,
    pub sequence: i64,
    pub status: EntryStatus,
}

#[derive(Debug, Clone)]
pub struct ActionToken {
    pub token: String,
    pub action: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}
