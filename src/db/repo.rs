use super::model::{AdminListQuery, AdminRow, EntryQuery};
use crate::escape::slugify;
use crate::model::{ActionToken, Category, Entry, EntryStatus, NewEntry, Role, User};
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, instrument};

pub type Pool = SqlitePool;

const ENTRY_COLUMNS: &str = "f.id, f.title, f.body, f.sequence, f.status";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let options = SqliteConnectOptions::from_str(&normalized)
        .with_context(|| format!("invalid database url {normalized}"))?
        .create_if_missing(true)
        .foreign_keys(true);
    // WAL and stricter durability only make sense for file-backed databases.
    let options = if normalized.starts_with("sqlite::memory") {
        options
    } else {
        options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
    };
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    Ok(pool)
}

/// Expand a leading `~/` in a file-backed SQLite URL and make sure the parent
/// directory exists. In-memory and non-sqlite URLs pass through untouched.
fn prepare_sqlite_url(url: &str) -> String {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return url.to_string();
    };
    if rest.starts_with(":memory") {
        return url.to_string();
    }

    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn entry_from_row(row: &SqliteRow) -> Result<Entry> {
    let id: i64 = row.get("id");
    let status: String = row.get("status");
    let status = EntryStatus::parse_status(&status)
        .ok_or_else(|| anyhow!("entry {} has unknown status {}", id, status))?;
    Ok(Entry {
        id,
        title: row.get("title"),
        body: row.get("body"),
        sequence: row.get("sequence"),
        status,
    })
}

fn category_from_row(row: &SqliteRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        parent_id: row.try_get::<Option<i64>, _>("parent_id").ok().flatten(),
    }
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let id: i64 = row.get("id");
    let role: String = row.get("role");
    let role =
        Role::parse_role(&role).ok_or_else(|| anyhow!("user {} has unknown role {}", id, role))?;
    Ok(User {
        id,
        login: row.get("login"),
        role,
    })
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[instrument(skip_all)]
pub async fn insert_user(pool: &Pool, login: &str, role: Role) -> Result<i64> {
    let login = login.trim();
    if login.is_empty() {
        bail!("user login must be non-empty");
    }
    let rec = sqlx::query("INSERT INTO users (login, role) VALUES (?, ?) RETURNING id")
        .bind(login)
        .bind(role.as_str())
        .fetch_one(pool)
        .await
        .with_context(|| format!("failed to insert user {login}"))?;
    Ok(rec.get("id"))
}

#[instrument(skip_all)]
pub async fn user_by_login(pool: &Pool, login: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT id, login, role FROM users WHERE login = ?")
        .bind(login)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Create a category. The slug is derived from `name` when not supplied.
#[instrument(skip_all)]
pub async fn insert_category(
    pool: &Pool,
    name: &str,
    slug: Option<&str>,
    parent_id: Option<i64>,
) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        bail!("category name must be non-empty");
    }
    let slug = slugify(slug.unwrap_or(name));
    if slug.is_empty() {
        bail!("category slug for {:?} is empty", name);
    }
    let rec = sqlx::query(
        "INSERT INTO faq_categories (name, slug, parent_id) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(name)
    .bind(&slug)
    .bind(parent_id)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert category {slug}"))?;
    Ok(rec.get("id"))
}

#[instrument(skip_all)]
pub async fn category_by_slug(pool: &Pool, slug: &str) -> Result<Option<Category>> {
    let row = sqlx::query("SELECT id, name, slug, parent_id FROM faq_categories WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(category_from_row))
}

/// Replace the category links of an entry.
#[instrument(skip_all)]
pub async fn assign_categories(pool: &Pool, entry_id: i64, category_ids: &[i64]) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM faq_category_links WHERE faq_id = ?")
        .bind(entry_id)
        .execute(&mut *tx)
        .await?;
    for category_id in category_ids {
        sqlx::query("INSERT OR IGNORE INTO faq_category_links (faq_id, category_id) VALUES (?, ?)")
            .bind(entry_id)
            .bind(category_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to link entry {entry_id} to category {category_id}"))?;
    }
    tx.commit().await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn entry_category_ids(pool: &Pool, entry_id: i64) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar(
        "SELECT category_id FROM faq_category_links WHERE faq_id = ? ORDER BY category_id",
    )
    .bind(entry_id)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

#[instrument(skip_all)]
pub async fn entry_categories(pool: &Pool, entry_id: i64) -> Result<Vec<Category>> {
    let rows = sqlx::query(
        "SELECT c.id, c.name, c.slug, c.parent_id FROM faq_categories c \
         JOIN faq_category_links l ON l.category_id = c.id \
         WHERE l.faq_id = ? ORDER BY c.name COLLATE NOCASE, c.id",
    )
    .bind(entry_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(category_from_row).collect())
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[instrument(skip_all)]
pub async fn insert_entry(pool: &Pool, entry: &NewEntry) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO faqs (title, body, sequence, status) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(&entry.title)
    .bind(&entry.body)
    .bind(entry.sequence)
    .bind(entry.status.as_str())
    .fetch_one(pool)
    .await
    .context("failed to insert entry")?;
    Ok(rec.get("id"))
}

#[instrument(skip_all)]
pub async fn get_entry(pool: &Pool, id: i64) -> Result<Option<Entry>> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM faqs f WHERE f.id = ?");
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(entry_from_row).transpose()
}

#[instrument(skip_all)]
pub async fn set_entry_status(pool: &Pool, id: i64, status: EntryStatus) -> Result<()> {
    let res = sqlx::query(
        "UPDATE faqs SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(id)
    .execute(pool)
    .await?;
    if res.rows_affected() == 0 {
        bail!("entry {} not found", id);
    }
    Ok(())
}

#[instrument(skip_all)]
pub async fn set_entry_sequence(pool: &Pool, id: i64, sequence: i64) -> Result<()> {
    let res = sqlx::query(
        "UPDATE faqs SET sequence = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(sequence)
    .bind(id)
    .execute(pool)
    .await?;
    if res.rows_affected() == 0 {
        bail!("entry {} not found", id);
    }
    Ok(())
}

/// Assign `sequence = 0..n` following the order of `ids`. All or nothing.
#[instrument(skip_all)]
pub async fn reorder_entries(pool: &Pool, ids: &[i64]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for (position, id) in ids.iter().enumerate() {
        let res = sqlx::query(
            "UPDATE faqs SET sequence = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(position as i64)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if res.rows_affected() == 0 {
            return Err(anyhow!("entry {} not found", id));
        }
    }
    tx.commit().await?;
    debug!(count = ids.len(), "entries reordered");
    Ok(())
}

/// Run an [`EntryQuery`]. Ties on `sequence` are broken by id so repeated
/// queries return the same order.
#[instrument(skip_all)]
pub async fn query_entries(pool: &Pool, query: &EntryQuery) -> Result<Vec<Entry>> {
    let direction = query.order.as_sql();
    // LIMIT -1 is SQLite's unbounded page.
    let limit = query.limit.map(i64::from).unwrap_or(-1);
    let status = query.status.map(|s| s.as_str());

    let rows = match query.category_slug.as_deref() {
        None => {
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM faqs f \
                 WHERE (? IS NULL OR f.status = ?) \
                 ORDER BY f.sequence {direction}, f.id {direction} LIMIT ?"
            );
            sqlx::query(&sql)
                .bind(status)
                .bind(status)
                .bind(limit)
                .fetch_all(pool)
                .await?
        }
        Some(slug) => {
            let sql = format!(
                "WITH RECURSIVE tree(id) AS ( \
                     SELECT id FROM faq_categories WHERE slug = ? \
                     UNION \
                     SELECT c.id FROM faq_categories c JOIN tree t ON c.parent_id = t.id \
                 ) \
                 SELECT {ENTRY_COLUMNS} FROM faqs f \
                 WHERE (? IS NULL OR f.status = ?) \
                   AND EXISTS ( \
                     SELECT 1 FROM faq_category_links l \
                     WHERE l.faq_id = f.id AND l.category_id IN (SELECT id FROM tree) \
                   ) \
                 ORDER BY f.sequence {direction}, f.id {direction} LIMIT ?"
            );
            sqlx::query(&sql)
                .bind(slug)
                .bind(status)
                .bind(status)
                .bind(limit)
                .fetch_all(pool)
                .await?
        }
    };

    rows.iter().map(entry_from_row).collect()
}

#[instrument(skip_all)]
pub async fn list_entries_for_admin(pool: &Pool, query: &AdminListQuery) -> Result<Vec<AdminRow>> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS}, strftime('%Y/%m/%d', f.created_at) AS created_on \
         FROM faqs f ORDER BY {} {}, f.id {}",
        query.orderby.as_sql(),
        query.order.as_sql(),
        query.order.as_sql(),
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let entry = entry_from_row(row)?;
        let categories = entry_categories(pool, entry.id).await?;
        let date = row
            .try_get::<Option<String>, _>("created_on")?
            .unwrap_or_default();
        out.push(AdminRow {
            entry,
            categories,
            date,
        });
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Action tokens
// ---------------------------------------------------------------------------

#[instrument(skip_all)]
pub async fn insert_action_token(pool: &Pool, token: &ActionToken) -> Result<()> {
    sqlx::query(
        "INSERT INTO action_tokens (token, action, user_id, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&token.token)
    .bind(&token.action)
    .bind(token.user_id)
    .bind(token.expires_at)
    .execute(pool)
    .await
    .context("failed to persist action token")?;
    Ok(())
}

/// Remove and return the token row for `(token, action, user_id)`, if any. A
/// token can be taken at most once, and only by the user it was issued to.
#[instrument(skip_all)]
pub async fn take_action_token(
    pool: &Pool,
    token: &str,
    action: &str,
    user_id: i64,
) -> Result<Option<ActionToken>> {
    let row = sqlx::query(
        "DELETE FROM action_tokens WHERE token = ? AND action = ? AND user_id = ? \
         RETURNING token, action, user_id, expires_at",
    )
    .bind(token)
    .bind(action)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    Ok(Some(ActionToken {
        token: row.get("token"),
        action: row.get("action"),
        user_id: row.get("user_id"),
        expires_at: row.try_get::<DateTime<Utc>, _>("expires_at")?,
    }))
}

/// The latest-expiring token of `user_id` for `action` still valid after
/// `valid_after`.
#[instrument(skip_all)]
pub async fn live_action_token(
    pool: &Pool,
    user_id: i64,
    action: &str,
    valid_after: DateTime<Utc>,
) -> Result<Option<ActionToken>> {
    let row = sqlx::query(
        "SELECT token, action, user_id, expires_at FROM action_tokens \
         WHERE user_id = ? AND action = ? AND expires_at > ? \
         ORDER BY expires_at DESC LIMIT 1",
    )
    .bind(user_id)
    .bind(action)
    .bind(valid_after)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    Ok(Some(ActionToken {
        token: row.get("token"),
        action: row.get("action"),
        user_id: row.get("user_id"),
        expires_at: row.try_get::<DateTime<Utc>, _>("expires_at")?,
    }))
}

#[instrument(skip_all)]
pub async fn purge_expired_tokens(pool: &Pool, now: DateTime<Utc>) -> Result<u64> {
    // Compare in Rust-encoded form: both sides are written by sqlx as RFC 3339.
    let res = sqlx::query("DELETE FROM action_tokens WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::model::{AdminOrderBy, SortDirection};

    async fn setup_pool() -> Pool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    async fn published(pool: &Pool, title: &str, sequence: i64) -> i64 {
        insert_entry(
            pool,
            &NewEntry {
                title: title.into(),
                body: format!("{title} body"),
                sequence,
                status: EntryStatus::Published,
            },
        )
        .await
        .unwrap()
    }

    #[test]
    fn prepare_sqlite_url_passthrough() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(prepare_sqlite_url("postgres://x"), "postgres://x");
    }

    #[test]
    fn prepare_sqlite_url_rebuilds_file_urls() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("nested/faq.db");
        let url = format!("sqlite:{}?mode=rwc", path.display());
        let out = prepare_sqlite_url(&url);
        assert_eq!(out, format!("sqlite://{}?mode=rwc", path.display()));
        assert!(path.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn query_orders_by_sequence_then_id() {
        let pool = setup_pool().await;
        let c = published(&pool, "C", 2).await;
        let a = published(&pool, "A", 0).await;
        let b1 = published(&pool, "B1", 1).await;
        let b2 = published(&pool, "B2", 1).await;

        let entries = query_entries(&pool, &EntryQuery::published()).await.unwrap();
        let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![a, b1, b2, c]);
    }

    #[tokio::test]
    async fn query_skips_drafts_and_honours_limit() {
        let pool = setup_pool().await;
        published(&pool, "one", 0).await;
        published(&pool, "two", 1).await;
        insert_entry(
            &pool,
            &NewEntry {
                title: "draft".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let all = query_entries(&pool, &EntryQuery::published()).await.unwrap();
        assert_eq!(all.len(), 2);

        let mut q = EntryQuery::published();
        q.limit = Some(1);
        let limited = query_entries(&pool, &q).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].title, "one");

        q.limit = None;
        q.status = None;
        assert_eq!(query_entries(&pool, &q).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn category_filter_includes_descendants() {
        let pool = setup_pool().await;
        let billing = insert_category(&pool, "Billing", None, None).await.unwrap();
        let refunds = insert_category(&pool, "Refunds", None, Some(billing)).await.unwrap();
        let other = insert_category(&pool, "Shipping", None, None).await.unwrap();

        let e1 = published(&pool, "invoice", 1).await;
        let e2 = published(&pool, "refund", 0).await;
        let e3 = published(&pool, "parcel", 2).await;
        assign_categories(&pool, e1, &[billing]).await.unwrap();
        assign_categories(&pool, e2, &[refunds]).await.unwrap();
        assign_categories(&pool, e3, &[other]).await.unwrap();

        let got = query_entries(&pool, &EntryQuery::published().in_category("billing"))
            .await
            .unwrap();
        let ids: Vec<i64> = got.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![e2, e1]);

        let got = query_entries(&pool, &EntryQuery::published().in_category("refunds"))
            .await
            .unwrap();
        assert_eq!(got.len(), 1);

        let got = query_entries(&pool, &EntryQuery::published().in_category("nope"))
            .await
            .unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn category_slug_is_derived_and_unique() {
        let pool = setup_pool().await;
        let id = insert_category(&pool, "Account & Login", None, None).await.unwrap();
        let cat = category_by_slug(&pool, "account-login").await.unwrap().unwrap();
        assert_eq!(cat.id, id);
        assert!(insert_category(&pool, "Account Login", None, None).await.is_err());
    }

    #[tokio::test]
    async fn reorder_is_all_or_nothing() {
        let pool = setup_pool().await;
        let a = published(&pool, "a", 5).await;
        let b = published(&pool, "b", 6).await;

        reorder_entries(&pool, &[b, a]).await.unwrap();
        assert_eq!(get_entry(&pool, b).await.unwrap().unwrap().sequence, 0);
        assert_eq!(get_entry(&pool, a).await.unwrap().unwrap().sequence, 1);

        assert!(reorder_entries(&pool, &[a, 9999]).await.is_err());
        assert_eq!(get_entry(&pool, a).await.unwrap().unwrap().sequence, 1);
    }

    #[tokio::test]
    async fn admin_list_sorts_by_requested_column() {
        let pool = setup_pool().await;
        published(&pool, "beta", 1).await;
        published(&pool, "Alpha", 2).await;
        published(&pool, "gamma", 0).await;

        let rows = list_entries_for_admin(
            &pool,
            &AdminListQuery {
                orderby: AdminOrderBy::Title,
                order: SortDirection::Asc,
            },
        )
        .await
        .unwrap();
        let titles: Vec<&str> = rows.iter().map(|r| r.entry.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "beta", "gamma"]);

        let rows = list_entries_for_admin(
            &pool,
            &AdminListQuery {
                orderby: AdminOrderBy::Order,
                order: SortDirection::Desc,
            },
        )
        .await
        .unwrap();
        let seqs: Vec<i64> = rows.iter().map(|r| r.entry.sequence).collect();
        assert_eq!(seqs, vec![2, 1, 0]);
    }

    #[tokio::test]
    async fn action_token_can_be_taken_once() {
        let pool = setup_pool().await;
        let uid = insert_user(&pool, "editor", Role::Editor).await.unwrap();
        let token = ActionToken {
            token: "tok".into(),
            action: "duplicate_faq".into(),
            user_id: uid,
            expires_at: Utc::now() + chrono::Duration::hours(1),
        };
        insert_action_token(&pool, &token).await.unwrap();

        assert!(take_action_token(&pool, "tok", "other", uid)
            .await
            .unwrap()
            .is_none());
        assert!(take_action_token(&pool, "tok", "duplicate_faq", uid + 1)
            .await
            .unwrap()
            .is_none());
        let taken = take_action_token(&pool, "tok", "duplicate_faq", uid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(taken.user_id, uid);
        assert!(take_action_token(&pool, "tok", "duplicate_faq", uid)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn live_token_is_the_latest_unexpired_one() {
        let pool = setup_pool().await;
        let uid = insert_user(&pool, "editor", Role::Editor).await.unwrap();
        let now = Utc::now();
        for (token, hours) in [("old", -1), ("soon", 1), ("late", 5)] {
            insert_action_token(
                &pool,
                &ActionToken {
                    token: token.into(),
                    action: "duplicate_faq_1".into(),
                    user_id: uid,
                    expires_at: now + chrono::Duration::hours(hours),
                },
            )
            .await
            .unwrap();
        }

        let live = live_action_token(&pool, uid, "duplicate_faq_1", now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(live.token, "late");
        assert!(live_action_token(&pool, uid, "duplicate_faq_2", now)
            .await
            .unwrap()
            .is_none());
        assert!(
            live_action_token(&pool, uid, "duplicate_faq_1", now + chrono::Duration::hours(6))
                .await
                .unwrap()
                .is_none()
        );
    }
}
