use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use faq_accordion::admin::{self, Column, DuplicateRequest};
use faq_accordion::config;
use faq_accordion::db::{self, AdminListQuery, AdminOrderBy, Pool, SortDirection};
use faq_accordion::model::{EntryStatus, NewEntry, Role, User};
use faq_accordion::shortcode::{self, Attrs};
use faq_accordion::site::Site;
use faq_accordion::store::SqliteStore;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create or upgrade the database schema
    Migrate,
    /// Create a user
    AddUser {
        login: String,
        /// administrator, editor, author, contributor or subscriber
        #[arg(long, default_value = "editor")]
        role: String,
    },
    /// Create a category
    AddCategory {
        name: String,
        #[arg(long)]
        slug: Option<String>,
        /// Slug of the parent category
        #[arg(long)]
        parent: Option<String>,
    },
    /// Create an entry
    AddEntry {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        body: String,
        /// Read the body from a file instead of --body
        #[arg(long)]
        body_file: Option<PathBuf>,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        sequence: i64,
        /// Category slug; repeat for several
        #[arg(long)]
        category: Vec<String>,
        #[arg(long)]
        publish: bool,
    },
    /// Publish a draft entry
    Publish { id: i64 },
    /// Render the accordion. Takes `key=value` attributes or a whole `[faq_accordion ...]` tag
    Render { attrs: Vec<String> },
    /// Render a page body file, expanding embedded `[faq_accordion]` tags
    Page { path: PathBuf },
    /// Print the admin list
    List {
        /// title, menu_order or date
        #[arg(long, default_value = "menu_order")]
        orderby: String,
        /// asc or desc
        #[arg(long, default_value = "asc")]
        order: String,
    },
    /// Print the row actions of an entry for a user
    RowActions {
        #[arg(long)]
        user: String,
        id: i64,
    },
    /// Duplicate an entry into a new draft
    Duplicate {
        #[arg(long)]
        user: String,
        #[arg(long)]
        post: Option<String>,
        #[arg(long)]
        nonce: Option<String>,
    },
    /// Set the order value of an entry
    SetOrder {
        #[arg(long)]
        user: String,
        id: i64,
        #[arg(allow_hyphen_values = true)]
        sequence: i64,
    },
    /// Reorder entries: ids in their new order, comma separated
    Reorder {
        #[arg(long)]
        user: String,
        #[arg(value_delimiter = ',', required = true)]
        ids: Vec<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    match args.command {
        Command::Migrate => {
            info!("database schema is up to date");
        }
        Command::AddUser { login, role } => {
            let role = Role::parse_role(&role).ok_or_else(|| anyhow!("unknown role {role}"))?;
            let id = db::insert_user(&pool, &login, role).await?;
            println!("{id}");
        }
        Command::AddCategory { name, slug, parent } => {
            let parent_id = match parent {
                Some(slug) => Some(
                    db::category_by_slug(&pool, &slug)
                        .await?
                        .ok_or_else(|| anyhow!("unknown parent category {slug}"))?
                        .id,
                ),
                None => None,
            };
            let id = db::insert_category(&pool, &name, slug.as_deref(), parent_id).await?;
            println!("{id}");
        }
        Command::AddEntry {
            title,
            body,
            body_file,
            sequence,
            category,
            publish,
        } => {
            let body = match body_file {
                Some(path) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?,
                None => body,
            };
            let mut category_ids = Vec::with_capacity(category.len());
            for slug in &category {
                let cat = db::category_by_slug(&pool, slug)
                    .await?
                    .ok_or_else(|| anyhow!("unknown category {slug}"))?;
                category_ids.push(cat.id);
            }
            let status = if publish {
                EntryStatus::Published
            } else {
                EntryStatus::Draft
            };
            let id = db::insert_entry(
                &pool,
                &NewEntry {
                    title,
                    body,
                    sequence,
                    status,
                },
            )
            .await?;
            if !category_ids.is_empty() {
                db::assign_categories(&pool, id, &category_ids).await?;
            }
            println!("{id}");
        }
        Command::Publish { id } => {
            db::set_entry_status(&pool, id, EntryStatus::Published).await?;
        }
        Command::Render { attrs } => {
            let site = Site::init(&cfg)?;
            let store = SqliteStore::new(pool.clone());
            let attrs = embed_attrs(&attrs.join(" "));
            println!("{}", site.render_embed(&store, &attrs).await);
        }
        Command::Page { path } => {
            let site = Site::init(&cfg)?;
            let store = SqliteStore::new(pool.clone());
            let body = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            println!("{}", site.render_page(&store, &body).await);
        }
        Command::List { orderby, order } => {
            let query = AdminListQuery {
                orderby: AdminOrderBy::parse_orderby(&orderby)
                    .ok_or_else(|| anyhow!("cannot sort by {orderby}"))?,
                order: SortDirection::parse_direction(&order)
                    .ok_or_else(|| anyhow!("unknown order {order}"))?,
            };
            print_admin_list(&pool, &query).await?;
        }
        Command::RowActions { user, id } => {
            let user = require_user(&pool, &user).await?;
            if db::get_entry(&pool, id).await?.is_none() {
                bail!("entry {id} not found");
            }
            for (key, html) in admin::row_actions(&pool, &cfg, &user, id, Vec::new()).await? {
                println!("{key}\t{html}");
            }
        }
        Command::Duplicate { user, post, nonce } => {
            let user = require_user(&pool, &user).await?;
            let done = admin::duplicate_entry(&pool, &cfg, &user, &DuplicateRequest { post, nonce })
                .await?;
            println!("{}\t{}", done.id, done.redirect);
        }
        Command::SetOrder { user, id, sequence } => {
            let user = require_user(&pool, &user).await?;
            admin::set_sequence(&pool, &user, id, sequence).await?;
        }
        Command::Reorder { user, ids } => {
            let user = require_user(&pool, &user).await?;
            admin::reorder(&pool, &user, &ids).await?;
        }
    }

    Ok(())
}

/// Attributes from either a whole embed tag or bare `key=value` pairs.
fn embed_attrs(raw: &str) -> Attrs {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        if let Some(tag) = shortcode::scan(trimmed, &[]).into_iter().next() {
            return tag.attrs;
        }
    }
    shortcode::parse_attrs(trimmed)
}

async fn require_user(pool: &Pool, login: &str) -> Result<User> {
    db::user_by_login(pool, login)
        .await?
        .ok_or_else(|| anyhow!("unknown user {login}"))
}

async fn print_admin_list(pool: &Pool, query: &AdminListQuery) -> Result<()> {
    let rows = db::list_entries_for_admin(pool, query).await?;
    let header = Column::ALL
        .iter()
        .map(|c| match c.sortable() {
            Some(key) if key == query.orderby => {
                format!("{} ({})", c.label(), query.order.as_sql())
            }
            _ => c.label().to_string(),
        })
        .collect::<Vec<_>>();
    println!("ID\t{}", header.join("\t"));
    for row in &rows {
        let cells = Column::ALL
            .iter()
            .map(|c| c.content(row))
            .collect::<Vec<_>>();
        println!("{}\t{}", row.entry.id, cells.join("\t"));
    }
    Ok(())
}
