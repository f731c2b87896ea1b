//! Query descriptors and view models used by repositories.
//!
//! Keep these structs focused on the data passed to and returned by queries.
//! Business logic should live in higher layers.

use crate::model::{Category, Entry, EntryStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn parse_direction(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// Structured query for FAQ entries, always ordered by `sequence`.
///
/// `limit: None` is an unbounded page. `category_slug` matches the category
/// with that slug and all of its descendants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryQuery {
    pub status: Option<EntryStatus>,
    pub category_slug: Option<String>,
    pub limit: Option<u32>,
    pub order: SortDirection,
}

impl EntryQuery {
    /// Published entries, every page, ascending `sequence`.
    pub fn published() -> Self {
        Self {
            status: Some(EntryStatus::Published),
            category_slug: None,
            limit: None,
            order: SortDirection::Asc,
        }
    }

    pub fn in_category(mut self, slug: impl Into<String>) -> Self {
        let slug = slug.into();
        self.category_slug = if slug.is_empty() { None } else { Some(slug) };
        self
    }
}

/// Column the admin list can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminOrderBy {
    Title,
    #[default]
    Order,
    Date,
}

impl AdminOrderBy {
    pub fn parse_orderby(s: &str) -> Option<Self> {
        match s {
            "title" => Some(AdminOrderBy::Title),
            "menu_order" | "order" | "sequence" => Some(AdminOrderBy::Order),
            "date" => Some(AdminOrderBy::Date),
            _ => None,
        }
    }

    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            AdminOrderBy::Title => "f.title COLLATE NOCASE",
            AdminOrderBy::Order => "f.sequence",
            AdminOrderBy::Date => "f.created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdminListQuery {
    pub orderby: AdminOrderBy,
    pub order: SortDirection,
}

/// One row of the admin list: the entry plus its categories.
#[derive(Debug, Clone)]
pub struct AdminRow {
    pub entry: Entry,
    pub categories: Vec<Category>,
    /// Creation day, `YYYY/MM/DD`.
    pub date: String,
}
