use anyhow::{Context, Result};
use clap::Parser;
use faq_accordion::config::{self, Config};
use faq_accordion::db;
use faq_accordion::escape::html_text;
use faq_accordion::shortcode;
use faq_accordion::site::Site;
use faq_accordion::store::SqliteStore;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(
    about = "Export the FAQ accordion to a standalone HTML page under <data_dir>/html, with its stylesheet and init script."
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Page heading
    #[arg(long, default_value = "Frequently Asked Questions")]
    title: String,

    /// Accordion attributes as `key=value`, e.g. `category=billing active=0`
    attrs: Vec<String>,
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
    run(&cfg, &args.title, &args.attrs.join(" ")).await
}

async fn run(cfg: &Config, title: &str, attrs: &str) -> Result<()> {
    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    // Assets are written next to index.html; the jQuery URLs stay as configured.
    let mut local = cfg.clone();
    local.site.assets_url = "static".to_string();
    let site = Site::init(&local)?;
    let store = SqliteStore::new(pool);

    let accordion = site
        .render_embed(&store, &shortcode::parse_attrs(attrs))
        .await;
    let head = site.assets().render_head()?;
    let footer = site.assets().render_footer()?;

    let out_dir = PathBuf::from(&cfg.app.data_dir).join("html");
    let static_dir = out_dir.join("static");
    tokio::fs::create_dir_all(&static_dir)
        .await
        .with_context(|| format!("failed to create {}", static_dir.display()))?;

    let index_path = out_dir.join("index.html");
    write(&index_path, &render_html(title, &head, &accordion, &footer)).await?;
    write(&static_dir.join("faq.css"), DEFAULT_STYLE).await?;
    write(&static_dir.join("faq.js"), INIT_SCRIPT).await?;

    println!("Wrote {}", index_path.display());
    println!("Index full path: {}", absolute_path(&index_path).display());
    Ok(())
}

async fn write(path: &Path, contents: &str) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

fn render_html(title: &str, head: &str, accordion: &str, footer: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
{head}
  </head>
  <body>
    <header>
      <h1>{title}</h1>
    </header>
    <main>
      {accordion}
    </main>
{footer}
  </body>
</html>"#,
        title = html_text(title),
    )
}

fn absolute_path(p: &Path) -> PathBuf {
    if p.is_absolute() {
        return p.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(p),
        Err(_) => p.to_path_buf(),
    }
}

const DEFAULT_STYLE: &str = r#"
:root {
  color-scheme: light dark;
  --fg: #222;
  --bg: #fff;
  --muted: #666;
  --rule: #ddd;
}

@media (prefers-color-scheme: dark) {
  :root {
    --fg: #eee;
    --bg: #121212;
    --muted: #aaa;
    --rule: #333;
  }
}

html,
body {
  margin: 0;
  padding: 0;
  background: var(--bg);
  color: var(--fg);
  font: 15px/1.6 -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto,
        'Helvetica Neue', Arial, sans-serif;
}

header {
  padding: 16px;
  border-bottom: 1px solid var(--rule);
}

main {
  padding: 16px;
  max-width: 820px;
  margin: 0 auto;
}

.faq-accordion .faq-question {
  position: relative;
  margin: 0;
  padding: 12px 36px 12px 0;
  border-bottom: 1px solid var(--rule);
  cursor: pointer;
  user-select: none;
}

.faq-accordion .faq-indicator {
  position: absolute;
  right: 8px;
  top: 50%;
  width: 10px;
  height: 10px;
  margin-top: -7px;
  border-right: 2px solid var(--muted);
  border-bottom: 2px solid var(--muted);
  transform: rotate(45deg);
  transition: transform 0.2s;
}

.faq-accordion .ui-state-active .faq-indicator {
  margin-top: -2px;
  transform: rotate(-135deg);
}

.faq-accordion .faq-answer {
  padding: 8px 0 16px;
}

.faq-accordion .ui-accordion-header-icon {
  display: none;
}
"#;

const INIT_SCRIPT: &str = r#"jQuery(function ($) {
  $('.faq-accordion').each(function () {
    var el = $(this);
    var raw = el.data('options') || {};
    var active = raw.active === 'false' ? false : parseInt(raw.active, 10);
    var animate = parseInt(raw.animate, 10);
    el.accordion({
      header: '.faq-question',
      collapsible: raw.collapsible !== 'false',
      heightStyle: raw.heightStyle || 'content',
      active: isNaN(active) ? false : active,
      animate: isNaN(animate) ? 400 : animate
    });
  });
});
"#;
