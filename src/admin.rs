//! Admin list customizations and the duplicate action.
use crate::accordion::parse_leading_int;
use crate::config::Config;
use crate::db::{self, AdminOrderBy, AdminRow, Pool};
use crate::escape::{html_attr, html_text};
use crate::model::{ActionToken, EntryStatus, NewEntry, User};
use anyhow::Result;
use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub const DUPLICATE_ACTION: &str = "duplicate_faq";
pub const LIST_PATH: &str = "edit.php?post_type=faq";

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Security check failed.")]
    SecurityCheckFailed,
    #[error("Sorry, you are not allowed to edit FAQs.")]
    Forbidden,
    #[error("Duplication failed.")]
    DuplicationFailed,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Ordered `(key, html)` pairs shown under a row of the admin list.
pub type RowActions = Vec<(String, String)>;

/// Token action for duplicating entry `entry_id`.
pub fn duplicate_action(entry_id: i64) -> String {
    format!("{DUPLICATE_ACTION}_{entry_id}")
}

/// A single-use token for `action`, bound to `user`. An unexpired token the
/// user already holds for the same action is handed out again, so the table
/// holds at most one live token per user and action.
#[instrument(skip_all, fields(user = %user.login, action = %action))]
pub async fn issue_token(pool: &Pool, user: &User, action: &str, ttl: Duration) -> Result<String> {
    let now = Utc::now();
    db::purge_expired_tokens(pool, now).await?;
    if let Some(live) = db::live_action_token(pool, user.id, action, now).await? {
        debug!("reusing live token");
        return Ok(live.token);
    }
    let token = Uuid::new_v4().simple().to_string();
    db::insert_action_token(
        pool,
        &ActionToken {
            token: token.clone(),
            action: action.to_string(),
            user_id: user.id,
            expires_at: now + ttl,
        },
    )
    .await?;
    Ok(token)
}

/// Consume `token`. Valid only once, only for its action and user, and only
/// before it expires. A token presented by another user stays in place.
#[instrument(skip_all, fields(user = %user.login, action = %action))]
pub async fn verify_token(pool: &Pool, user: &User, action: &str, token: &str) -> Result<bool> {
    let Some(stored) = db::take_action_token(pool, token, action, user.id).await? else {
        return Ok(false);
    };
    Ok(stored.expires_at > Utc::now())
}

/// Longest accepted token lifetime.
const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;

fn token_ttl(cfg: &Config) -> Duration {
    let secs = i64::try_from(cfg.admin.token_ttl_seconds).unwrap_or(MAX_TOKEN_TTL_SECS);
    Duration::seconds(secs.min(MAX_TOKEN_TTL_SECS))
}

/// Add the "Duplicate" link for users allowed to edit entries.
pub async fn row_actions(
    pool: &Pool,
    cfg: &Config,
    user: &User,
    entry_id: i64,
    mut actions: RowActions,
) -> Result<RowActions> {
    if !user.can_edit_posts() {
        return Ok(actions);
    }
    let token = issue_token(pool, user, &duplicate_action(entry_id), token_ttl(cfg)).await?;
    let href = cfg.admin_link(&format!(
        "admin.php?action={DUPLICATE_ACTION}&post={entry_id}&nonce={token}"
    ));
    actions.push((
        "duplicate".to_string(),
        format!(r#"<a href="{}">Duplicate</a>"#, html_attr(&href)),
    ));
    Ok(actions)
}

/// Raw query parameters of a duplicate request.
#[derive(Debug, Clone, Default)]
pub struct DuplicateRequest {
    pub post: Option<String>,
    pub nonce: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicated {
    pub id: i64,
    /// Where the admin is sent after a successful copy.
    pub redirect: String,
}

/// Copy an entry into a new draft: title with suffix, body, sequence and
/// category links.
///
/// The copy and the category links are written separately; a failure after
/// the draft is created leaves the draft in place.
#[instrument(skip_all, fields(user = %user.login))]
pub async fn duplicate_entry(
    pool: &Pool,
    cfg: &Config,
    user: &User,
    request: &DuplicateRequest,
) -> Result<Duplicated, AdminError> {
    let (Some(post), Some(nonce)) = (request.post.as_deref(), request.nonce.as_deref()) else {
        return Err(AdminError::SecurityCheckFailed);
    };
    let source_id = parse_leading_int(post);
    if !verify_token(pool, user, &duplicate_action(source_id), nonce).await? {
        warn!(source_id, "duplicate request with invalid token");
        return Err(AdminError::SecurityCheckFailed);
    }
    if !user.can_edit_posts() {
        return Err(AdminError::Forbidden);
    }

    let source = match db::get_entry(pool, source_id).await {
        Ok(Some(entry)) => entry,
        Ok(None) => {
            warn!(source_id, "duplicate source not found");
            return Err(AdminError::DuplicationFailed);
        }
        Err(err) => {
            warn!(?err, source_id, "failed to load duplicate source");
            return Err(AdminError::DuplicationFailed);
        }
    };

    let copy = NewEntry {
        title: format!("{}{}", source.title, cfg.admin.duplicate_suffix),
        body: source.body.clone(),
        sequence: source.sequence,
        status: EntryStatus::Draft,
    };
    let new_id = match db::insert_entry(pool, &copy).await {
        Ok(id) => id,
        Err(err) => {
            warn!(?err, source_id, "failed to insert duplicate");
            return Err(AdminError::DuplicationFailed);
        }
    };

    match db::entry_category_ids(pool, source_id).await {
        Ok(ids) if !ids.is_empty() => {
            if let Err(err) = db::assign_categories(pool, new_id, &ids).await {
                warn!(?err, source_id, new_id, "failed to copy categories");
            }
        }
        Ok(_) => {}
        Err(err) => warn!(?err, source_id, "failed to read source categories"),
    }

    info!(source_id, new_id, "entry duplicated");
    Ok(Duplicated {
        id: new_id,
        redirect: cfg.admin_link(LIST_PATH),
    })
}

/// Columns of the admin list, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Title,
    Categories,
    Order,
    Date,
}

impl Column {
    pub const ALL: [Column; 4] = [Column::Title, Column::Categories, Column::Order, Column::Date];

    pub fn key(&self) -> &'static str {
        match self {
            Column::Title => "title",
            Column::Categories => "taxonomy-faq_category",
            Column::Order => "menu_order",
            Column::Date => "date",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Column::Title => "Title",
            Column::Categories => "Categories",
            Column::Order => "Order",
            Column::Date => "Date",
        }
    }

    /// Sort key when the column header is clickable.
    pub fn sortable(&self) -> Option<AdminOrderBy> {
        match self {
            Column::Title => Some(AdminOrderBy::Title),
            Column::Categories => None,
            Column::Order => Some(AdminOrderBy::Order),
            Column::Date => Some(AdminOrderBy::Date),
        }
    }

    /// Cell content for `row`, escaped for HTML.
    pub fn content(&self, row: &AdminRow) -> String {
        match self {
            Column::Title => {
                let title = html_text(&row.entry.title);
                match row.entry.status {
                    EntryStatus::Draft => format!("{title} (Draft)"),
                    EntryStatus::Published => title,
                }
            }
            Column::Categories if row.categories.is_empty() => "None".to_string(),
            Column::Categories => row
                .categories
                .iter()
                .map(|c| html_text(&c.name))
                .collect::<Vec<_>>()
                .join(", "),
            Column::Order => row.entry.sequence.to_string(),
            Column::Date => {
                let label = match row.entry.status {
                    EntryStatus::Draft => "Last Modified",
                    EntryStatus::Published => "Published",
                };
                format!("{label} {}", html_text(&row.date))
            }
        }
    }
}

/// Set an entry's `sequence` directly.
#[instrument(skip_all, fields(user = %user.login, entry_id = entry_id, sequence = sequence))]
pub async fn set_sequence(
    pool: &Pool,
    user: &User,
    entry_id: i64,
    sequence: i64,
) -> Result<(), AdminError> {
    if !user.can_edit_posts() {
        return Err(AdminError::Forbidden);
    }
    db::set_entry_sequence(pool, entry_id, sequence).await?;
    Ok(())
}

/// Drag-reorder: entries take `sequence` 0..n in the order given.
#[instrument(skip_all, fields(user = %user.login, count = ids.len()))]
pub async fn reorder(pool: &Pool, user: &User, ids: &[i64]) -> Result<(), AdminError> {
    if !user.can_edit_posts() {
        return Err(AdminError::Forbidden);
    }
    db::reorder_entries(pool, ids).await?;
    Ok(())
}
