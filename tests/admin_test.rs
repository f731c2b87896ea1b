use chrono::Duration;
use faq_accordion::admin::{self, AdminError, Column, DuplicateRequest, DUPLICATE_ACTION};
use faq_accordion::config::{self, Config};
use faq_accordion::db::{self, AdminListQuery, AdminOrderBy, SortDirection};
use faq_accordion::model::{EntryStatus, NewEntry, Role, User};
use sqlx::sqlite::SqlitePoolOptions;

async fn setup_pool() -> sqlx::SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

fn cfg() -> Config {
    serde_yaml::from_str(config::example()).unwrap()
}

async fn user(pool: &sqlx::SqlitePool, login: &str, role: Role) -> User {
    db::insert_user(pool, login, role).await.unwrap();
    db::user_by_login(pool, login).await.unwrap().unwrap()
}

async fn entry(pool: &sqlx::SqlitePool, title: &str, sequence: i64) -> i64 {
    db::insert_entry(
        pool,
        &NewEntry {
            title: title.into(),
            body: format!("Answer to {title}"),
            sequence,
            status: EntryStatus::Published,
        },
    )
    .await
    .unwrap()
}

/// Pull the `nonce` query parameter out of a rendered Duplicate link.
fn nonce_of(link: &str) -> String {
    let start = link.find("nonce=").unwrap() + 6;
    link[start..].split('"').next().unwrap().to_string()
}

#[tokio::test]
async fn duplicate_creates_draft_copy_with_categories() {
    let pool = setup_pool().await;
    let cfg = cfg();
    let editor = user(&pool, "ed", Role::Editor).await;
    let general = db::insert_category(&pool, "General", None, None).await.unwrap();
    let billing = db::insert_category(&pool, "Billing", None, None).await.unwrap();
    let source = entry(&pool, "How do refunds work?", 7).await;
    db::assign_categories(&pool, source, &[general, billing]).await.unwrap();

    let action = admin::duplicate_action(source);
    let token = admin::issue_token(&pool, &editor, &action, Duration::hours(1))
        .await
        .unwrap();
    let done = admin::duplicate_entry(
        &pool,
        &cfg,
        &editor,
        &DuplicateRequest {
            post: Some(source.to_string()),
            nonce: Some(token),
        },
    )
    .await
    .unwrap();

    assert_ne!(done.id, source);
    assert_eq!(done.redirect, "/admin/edit.php?post_type=faq");

    let copy = db::get_entry(&pool, done.id).await.unwrap().unwrap();
    assert_eq!(copy.title, "How do refunds work? (Copy)");
    assert_eq!(copy.body, "Answer to How do refunds work?");
    assert_eq!(copy.sequence, 7);
    assert_eq!(copy.status, EntryStatus::Draft);
    assert_eq!(
        db::entry_category_ids(&pool, done.id).await.unwrap(),
        db::entry_category_ids(&pool, source).await.unwrap()
    );

    // Source is untouched.
    let original = db::get_entry(&pool, source).await.unwrap().unwrap();
    assert_eq!(original.title, "How do refunds work?");
    assert_eq!(original.status, EntryStatus::Published);
}

#[tokio::test]
async fn duplicate_rejects_missing_and_reused_tokens() {
    let pool = setup_pool().await;
    let cfg = cfg();
    let editor = user(&pool, "ed", Role::Editor).await;
    let source = entry(&pool, "Q", 0).await;

    let missing = admin::duplicate_entry(
        &pool,
        &cfg,
        &editor,
        &DuplicateRequest {
            post: Some(source.to_string()),
            nonce: None,
        },
    )
    .await;
    assert!(matches!(missing, Err(AdminError::SecurityCheckFailed)));

    let action = admin::duplicate_action(source);
    let token = admin::issue_token(&pool, &editor, &action, Duration::hours(1))
        .await
        .unwrap();
    let no_post = admin::duplicate_entry(
        &pool,
        &cfg,
        &editor,
        &DuplicateRequest {
            post: None,
            nonce: Some(token.clone()),
        },
    )
    .await;
    assert!(matches!(no_post, Err(AdminError::SecurityCheckFailed)));

    let request = DuplicateRequest {
        post: Some(source.to_string()),
        nonce: Some(token),
    };
    admin::duplicate_entry(&pool, &cfg, &editor, &request).await.unwrap();
    let replay = admin::duplicate_entry(&pool, &cfg, &editor, &request).await;
    assert!(matches!(replay, Err(AdminError::SecurityCheckFailed)));
    assert_eq!(replay.unwrap_err().to_string(), "Security check failed.");
}

#[tokio::test]
async fn token_for_one_entry_cannot_duplicate_another() {
    let pool = setup_pool().await;
    let cfg = cfg();
    let editor = user(&pool, "ed", Role::Editor).await;
    let first = entry(&pool, "First", 0).await;
    let second = entry(&pool, "Second", 1).await;

    let action = admin::duplicate_action(first);
    let token = admin::issue_token(&pool, &editor, &action, Duration::hours(1))
        .await
        .unwrap();
    let res = admin::duplicate_entry(
        &pool,
        &cfg,
        &editor,
        &DuplicateRequest {
            post: Some(second.to_string()),
            nonce: Some(token.clone()),
        },
    )
    .await;
    assert!(matches!(res, Err(AdminError::SecurityCheckFailed)));

    // Still good for the entry it was issued for.
    let done = admin::duplicate_entry(
        &pool,
        &cfg,
        &editor,
        &DuplicateRequest {
            post: Some(first.to_string()),
            nonce: Some(token),
        },
    )
    .await
    .unwrap();
    let copy = db::get_entry(&pool, done.id).await.unwrap().unwrap();
    assert_eq!(copy.title, "First (Copy)");
}

#[tokio::test]
async fn tokens_are_bound_to_user_action_and_lifetime() {
    let pool = setup_pool().await;
    let alice = user(&pool, "alice", Role::Editor).await;
    let bob = user(&pool, "bob", Role::Editor).await;

    let token = admin::issue_token(&pool, &alice, DUPLICATE_ACTION, Duration::hours(1))
        .await
        .unwrap();
    assert!(!admin::verify_token(&pool, &bob, DUPLICATE_ACTION, &token).await.unwrap());
    assert!(!admin::verify_token(&pool, &alice, "other_action", &token).await.unwrap());
    // Neither failed attempt used it up.
    assert!(admin::verify_token(&pool, &alice, DUPLICATE_ACTION, &token).await.unwrap());
    assert!(!admin::verify_token(&pool, &alice, DUPLICATE_ACTION, &token).await.unwrap());

    let expired = admin::issue_token(&pool, &alice, DUPLICATE_ACTION, Duration::seconds(-5))
        .await
        .unwrap();
    assert!(!admin::verify_token(&pool, &alice, DUPLICATE_ACTION, &expired).await.unwrap());
}

#[tokio::test]
async fn issuing_reuses_the_live_token_until_it_is_spent() {
    let pool = setup_pool().await;
    let alice = user(&pool, "alice", Role::Editor).await;
    let bob = user(&pool, "bob", Role::Editor).await;

    let first = admin::issue_token(&pool, &alice, "a", Duration::hours(1)).await.unwrap();
    let again = admin::issue_token(&pool, &alice, "a", Duration::hours(1)).await.unwrap();
    assert_eq!(first, again);

    let other_action = admin::issue_token(&pool, &alice, "b", Duration::hours(1)).await.unwrap();
    let other_user = admin::issue_token(&pool, &bob, "a", Duration::hours(1)).await.unwrap();
    assert_ne!(first, other_action);
    assert_ne!(first, other_user);

    assert!(admin::verify_token(&pool, &alice, "a", &first).await.unwrap());
    let fresh = admin::issue_token(&pool, &alice, "a", Duration::hours(1)).await.unwrap();
    assert_ne!(first, fresh);
}

#[tokio::test]
async fn subscribers_cannot_duplicate() {
    let pool = setup_pool().await;
    let cfg = cfg();
    let reader = user(&pool, "reader", Role::Subscriber).await;
    let source = entry(&pool, "Q", 0).await;

    let action = admin::duplicate_action(source);
    let token = admin::issue_token(&pool, &reader, &action, Duration::hours(1))
        .await
        .unwrap();
    let res = admin::duplicate_entry(
        &pool,
        &cfg,
        &reader,
        &DuplicateRequest {
            post: Some(source.to_string()),
            nonce: Some(token),
        },
    )
    .await;
    assert!(matches!(res, Err(AdminError::Forbidden)));
    assert!(db::get_entry(&pool, source + 1).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_of_missing_entry_fails() {
    let pool = setup_pool().await;
    let cfg = cfg();
    let editor = user(&pool, "ed", Role::Editor).await;

    for (post, id) in [("999", 999), ("not-a-number", 0)] {
        let action = admin::duplicate_action(id);
        let token = admin::issue_token(&pool, &editor, &action, Duration::hours(1))
            .await
            .unwrap();
        let res = admin::duplicate_entry(
            &pool,
            &cfg,
            &editor,
            &DuplicateRequest {
                post: Some(post.to_string()),
                nonce: Some(token),
            },
        )
        .await;
        let err = res.unwrap_err();
        assert!(matches!(err, AdminError::DuplicationFailed), "post={post}");
        assert_eq!(err.to_string(), "Duplication failed.");
    }
}

#[tokio::test]
async fn row_actions_link_only_for_editors() {
    let pool = setup_pool().await;
    let cfg = cfg();
    let editor = user(&pool, "ed", Role::Author).await;
    let reader = user(&pool, "reader", Role::Subscriber).await;
    let source = entry(&pool, "Q", 0).await;

    let existing = vec![("edit".to_string(), "<a>Edit</a>".to_string())];
    let actions = admin::row_actions(&pool, &cfg, &editor, source, existing.clone())
        .await
        .unwrap();
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0], existing[0]);
    let (key, link) = &actions[1];
    assert_eq!(key, "duplicate");
    assert!(link.starts_with(&format!(
        r#"<a href="/admin/admin.php?action=duplicate_faq&amp;post={source}&amp;nonce="#
    )));
    assert!(link.ends_with(r#"">Duplicate</a>"#));

    // Rendering the list again hands out the same link.
    let again = admin::row_actions(&pool, &cfg, &editor, source, Vec::new())
        .await
        .unwrap();
    assert_eq!(&again[0].1, link);

    // The token embedded in the link is accepted exactly once.
    let request = DuplicateRequest {
        post: Some(source.to_string()),
        nonce: Some(nonce_of(link)),
    };
    admin::duplicate_entry(&pool, &cfg, &editor, &request).await.unwrap();
    assert!(admin::duplicate_entry(&pool, &cfg, &editor, &request).await.is_err());
    let next = admin::row_actions(&pool, &cfg, &editor, source, Vec::new())
        .await
        .unwrap();
    assert_ne!(nonce_of(&next[0].1), nonce_of(link));

    let unchanged = admin::row_actions(&pool, &cfg, &reader, source, existing.clone())
        .await
        .unwrap();
    assert_eq!(unchanged, existing);
}

#[tokio::test]
async fn ordering_edits_require_capability_and_are_atomic() {
    let pool = setup_pool().await;
    let editor = user(&pool, "ed", Role::Editor).await;
    let reader = user(&pool, "reader", Role::Subscriber).await;
    let a = entry(&pool, "A", 0).await;
    let b = entry(&pool, "B", 1).await;
    let c = entry(&pool, "C", 2).await;

    assert!(matches!(
        admin::set_sequence(&pool, &reader, a, 9).await,
        Err(AdminError::Forbidden)
    ));
    admin::set_sequence(&pool, &editor, a, 9).await.unwrap();
    assert_eq!(db::get_entry(&pool, a).await.unwrap().unwrap().sequence, 9);

    admin::reorder(&pool, &editor, &[c, a, b]).await.unwrap();
    let rows = db::list_entries_for_admin(&pool, &AdminListQuery::default())
        .await
        .unwrap();
    let titles: Vec<&str> = rows.iter().map(|r| r.entry.title.as_str()).collect();
    assert_eq!(titles, vec!["C", "A", "B"]);

    assert!(admin::reorder(&pool, &editor, &[b, 404, a]).await.is_err());
    let rows = db::list_entries_for_admin(&pool, &AdminListQuery::default())
        .await
        .unwrap();
    let titles: Vec<&str> = rows.iter().map(|r| r.entry.title.as_str()).collect();
    assert_eq!(titles, vec!["C", "A", "B"]);
}

#[tokio::test]
async fn admin_list_columns_sort_and_render() {
    let pool = setup_pool().await;
    let general = db::insert_category(&pool, "General", None, None).await.unwrap();
    let b = entry(&pool, "banana", 0).await;
    entry(&pool, "Apple", 5).await;
    db::assign_categories(&pool, b, &[general]).await.unwrap();

    let by_title = AdminListQuery {
        orderby: AdminOrderBy::Title,
        order: SortDirection::Desc,
    };
    let rows = db::list_entries_for_admin(&pool, &by_title).await.unwrap();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| Column::ALL[..3].iter().map(|c| c.content(r)).collect())
        .collect();
    assert_eq!(
        cells,
        vec![
            vec!["banana".to_string(), "General".to_string(), "0".to_string()],
            vec!["Apple".to_string(), "None".to_string(), "5".to_string()],
        ]
    );
    assert!(rows.iter().all(|r| r.date.len() == 10 && r.date.contains('/')));
    assert!(Column::Date.content(&rows[0]).starts_with("Published "));
}
