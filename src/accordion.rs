//! The `[faq_accordion]` renderer.
//!
//! Display options arrive as loosely typed string attributes from the embed
//! site. [`DisplayOptions::from_attrs`] turns them into a typed value, falling
//! back to defaults for anything missing or malformed, so a bad attribute never
//! breaks the page that embeds the accordion.
use crate::content::{ContentPipeline, CurrentEntry};
use crate::db::EntryQuery;
use crate::escape::{html_text, json_attr, sanitize_text_field};
use crate::shortcode;
use crate::store::ContentStore;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use tracing::{debug, error, instrument};

/// Name of the embed tag handled by [`render`].
pub const TAG: &str = "faq_accordion";

pub const DEFAULT_ANIMATE_MS: u32 = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeightStyle {
    #[default]
    Content,
    Fill,
    Auto,
}

impl HeightStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeightStyle::Content => "content",
            HeightStyle::Fill => "fill",
            HeightStyle::Auto => "auto",
        }
    }

    pub fn parse_height_style(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "content" => Some(HeightStyle::Content),
            "fill" => Some(HeightStyle::Fill),
            "auto" => Some(HeightStyle::Auto),
            _ => None,
        }
    }
}

/// Requested open panel, before it is checked against the result count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveRequest {
    #[default]
    Closed,
    Index(i64),
}

impl ActiveRequest {
    /// `"false"` keeps every panel closed; anything else is read as an integer
    /// the permissive way (see [`parse_leading_int`]).
    pub fn parse_active(raw: &str) -> Self {
        if raw == "false" {
            ActiveRequest::Closed
        } else {
            ActiveRequest::Index(parse_leading_int(raw))
        }
    }

    pub fn resolve(self, count: usize) -> Active {
        match self {
            ActiveRequest::Closed => Active::Closed,
            ActiveRequest::Index(i) if i >= 0 && (i as u64) < count as u64 => {
                Active::Index(i as usize)
            }
            ActiveRequest::Index(_) => Active::Closed,
        }
    }
}

/// Open panel after validation: always a valid index into the rendered entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Active {
    #[default]
    Closed,
    Index(usize),
}

impl Active {
    /// Wire form read by the client script.
    pub fn to_wire(self) -> String {
        match self {
            Active::Closed => "false".to_string(),
            Active::Index(i) => i.to_string(),
        }
    }
}

/// Per-render accordion configuration. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayOptions {
    pub collapsible: bool,
    pub height_style: HeightStyle,
    pub active: ActiveRequest,
    pub animate: u32,
    /// Sanitized category slug; empty means no filter.
    pub category: String,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            collapsible: true,
            height_style: HeightStyle::Content,
            active: ActiveRequest::Closed,
            animate: DEFAULT_ANIMATE_MS,
            category: String::new(),
        }
    }
}

impl DisplayOptions {
    /// Build options from embed-site attributes. Names match case-insensitively,
    /// unknown names are ignored and unparseable values keep their default.
    pub fn from_attrs<K, V, I>(attrs: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut options = Self::default();
        for (key, value) in attrs {
            let value = value.as_ref();
            match key.as_ref().to_ascii_lowercase().as_str() {
                "collapsible" => {
                    if let Some(b) = parse_bool(value) {
                        options.collapsible = b;
                    }
                }
                "heightstyle" => {
                    if let Some(h) = HeightStyle::parse_height_style(value) {
                        options.height_style = h;
                    }
                }
                "active" => options.active = ActiveRequest::parse_active(value),
                "animate" => {
                    if let Ok(ms) = value.trim().parse::<u32>() {
                        options.animate = ms;
                    }
                }
                "category" => options.category = sanitize_text_field(value),
                _ => {}
            }
        }
        options
    }

    /// Published entries, unbounded, ascending `sequence`, filtered by category.
    pub fn query(&self) -> EntryQuery {
        EntryQuery::published().in_category(self.category.clone())
    }

    /// Normalized option set for `count` rendered entries.
    pub fn payload(&self, count: usize) -> OptionsPayload<'_> {
        OptionsPayload {
            collapsible: if self.collapsible { "true" } else { "false" },
            height_style: self.height_style.as_str(),
            active: self.active.resolve(count).to_wire(),
            animate: self.animate.to_string(),
            category: &self.category,
        }
    }
}

/// JSON object carried in the container's `data-options` attribute. Values
/// are strings, the form the client script reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionsPayload<'a> {
    pub collapsible: &'static str,
    #[serde(rename = "heightStyle")]
    pub height_style: &'static str,
    pub active: String,
    pub animate: String,
    pub category: &'a str,
}

/// How deep accordions may nest through entry bodies. A tag past this depth
/// is left as text.
pub const MAX_EMBED_DEPTH: usize = 2;

/// Collaborators a render needs.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub store: &'a dyn ContentStore,
    pub pipeline: &'a ContentPipeline,
    pub current: &'a CurrentEntry,
    /// Embed tags expanded in rendered bodies.
    pub embeds: &'a [&'a str],
}

/// Render the accordion for raw embed attributes.
pub async fn render<K, V, I>(ctx: &RenderContext<'_>, attrs: I) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
    I: IntoIterator<Item = (K, V)>,
{
    let options = DisplayOptions::from_attrs(attrs);
    render_options(ctx, &options).await
}

/// Render the accordion for already-typed options.
///
/// The current-entry slot points at each entry while its body renders and is
/// restored to its prior value on every return path.
#[instrument(skip_all, fields(category = %options.category))]
pub async fn render_options(ctx: &RenderContext<'_>, options: &DisplayOptions) -> String {
    render_at(ctx, options, 0).await
}

/// Replace the embed tags of `text` with their rendering. Escaped tags become
/// literal text, and a tag that fills a whole `<p>` replaces the paragraph.
pub async fn expand_embeds(ctx: &RenderContext<'_>, text: &str) -> String {
    expand_at(ctx, text, 0).await
}

fn render_at<'a, 'c: 'a>(
    ctx: &'a RenderContext<'c>,
    options: &'a DisplayOptions,
    depth: usize,
) -> BoxFuture<'a, String> {
    async move {
        let scope = ctx.current.scope();

        let entries = match ctx.store.query_entries(&options.query()).await {
            Ok(entries) => entries,
            Err(err) => {
                error!(?err, "faq query failed; rendering as empty");
                Vec::new()
            }
        };
        if entries.is_empty() {
            return no_results(&options.category);
        }

        let payload = options.payload(entries.len());
        let mut out = format!(
            r#"<div class="faq-accordion" data-options="{}">"#,
            json_attr(&payload)
        );
        for entry in &entries {
            scope.enter(entry);
            let mut body = ctx.pipeline.render(entry);
            if depth < MAX_EMBED_DEPTH {
                body = expand_at(ctx, &body, depth + 1).await;
            }
            out.push_str(&format!(
                r#"<h3 class="faq-question">{}<span class="faq-indicator"></span></h3>"#,
                html_text(&entry.title)
            ));
            out.push_str(&format!(r#"<div class="faq-answer">{body}</div>"#));
        }
        out.push_str("</div>");

        debug!(
            count = entries.len(),
            depth,
            active = %payload.active,
            "rendered faq accordion"
        );
        out
    }
    .boxed()
}

fn expand_at<'a, 'c: 'a>(
    ctx: &'a RenderContext<'c>,
    text: &'a str,
    depth: usize,
) -> BoxFuture<'a, String> {
    async move {
        if ctx.embeds.is_empty() {
            return text.to_string();
        }
        let tags = shortcode::scan(text, ctx.embeds);
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for tag in &tags {
            if let Some(literal) = &tag.literal {
                out.push_str(&text[last..tag.start]);
                out.push_str(literal);
                last = tag.end;
                continue;
            }
            if tag.name != TAG {
                continue;
            }
            let (start, end) = match (text[..tag.start].strip_suffix("<p>"), &text[tag.end..]) {
                (Some(before), after) if after.starts_with("</p>") => {
                    (before.len(), tag.end + "</p>".len())
                }
                _ => (tag.start, tag.end),
            };
            out.push_str(&text[last..start]);
            let options = DisplayOptions::from_attrs(&tag.attrs);
            out.push_str(&render_at(ctx, &options, depth).await);
            last = end;
        }
        out.push_str(&text[last..]);
        out
    }
    .boxed()
}

/// Message shown when nothing matches.
pub fn no_results(category: &str) -> String {
    if category.is_empty() {
        "<p>No FAQs found.</p>".to_string()
    } else {
        format!("<p>No FAQs found in category \"{}\".</p>", html_text(category))
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Leading-integer parse: optional whitespace, optional sign, then digits.
/// No digits reads as 0; overflow saturates.
pub fn parse_leading_int(s: &str) -> i64 {
    let t = s.trim_start();
    let (negative, rest) = match t.as_bytes().first() {
        Some(b'-') => (true, &t[1..]),
        Some(b'+') => (false, &t[1..]),
        _ => (false, t),
    };
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let digits = &rest[..end];
    if digits.is_empty() {
        return 0;
    }
    match digits.parse::<i64>() {
        Ok(v) if negative => -v,
        Ok(v) => v,
        Err(_) if negative => i64::MIN,
        Err(_) => i64::MAX,
    }
}
