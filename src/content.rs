//! Entry body rendering and the ambient "current entry" slot.
use crate::model::Entry;
use crate::shortcode::{self, TagMatch};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("valid regex"));
static BLOCK_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^<(?:div|p|h[1-6]|ul|ol|li|dl|table|blockquote|pre|figure|section|article|aside|hr|form|details|address)\b",
    )
    .expect("valid regex")
});

/// Handler for a tag embedded in an entry body. The entry being rendered is
/// passed explicitly.
pub type ShortcodeHandler = Box<dyn Fn(&TagMatch, &Entry) -> String + Send + Sync>;

/// Renders entry bodies: nested tag expansion, then paragraph wrapping.
pub struct ContentPipeline {
    shortcodes: BTreeMap<String, ShortcodeHandler>,
    autop: bool,
}

impl Default for ContentPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContentPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentPipeline")
            .field("shortcodes", &self.shortcodes.keys().collect::<Vec<_>>())
            .field("autop", &self.autop)
            .finish()
    }
}

impl ContentPipeline {
    pub fn new() -> Self {
        Self {
            shortcodes: BTreeMap::new(),
            autop: true,
        }
    }

    pub fn without_autop(mut self) -> Self {
        self.autop = false;
        self
    }

    /// Register a body tag. A later registration under the same name replaces
    /// the earlier one.
    pub fn register<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&TagMatch, &Entry) -> String + Send + Sync + 'static,
    {
        self.shortcodes.insert(name.to_string(), Box::new(handler));
    }

    /// Render `entry.body`. Unregistered tags are left verbatim.
    pub fn render(&self, entry: &Entry) -> String {
        let expanded = if self.shortcodes.is_empty() {
            entry.body.clone()
        } else {
            let names: Vec<&str> = self.shortcodes.keys().map(String::as_str).collect();
            shortcode::replace(&entry.body, &names, |tag| match self.shortcodes.get(&tag.name) {
                Some(handler) => handler(tag, entry),
                None => String::new(),
            })
        };
        if self.autop {
            autop(&expanded)
        } else {
            expanded
        }
    }
}

/// Wrap blank-line separated blocks in `<p>` and turn single newlines into
/// `<br />`. Blocks that already open with a block-level element are kept.
pub fn autop(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    PARAGRAPH_BREAK
        .split(&normalized)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| {
            if BLOCK_START.is_match(block) {
                block.to_string()
            } else {
                format!("<p>{}</p>", block.replace('\n', "<br />\n"))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The entry currently being rendered, for template code that reads it
/// ambiently instead of receiving it as a parameter.
#[derive(Debug, Default)]
pub struct CurrentEntry {
    slot: Mutex<Option<Entry>>,
}

impl CurrentEntry {
    fn lock(&self) -> MutexGuard<'_, Option<Entry>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> Option<Entry> {
        self.lock().clone()
    }

    pub fn id(&self) -> Option<i64> {
        self.lock().as_ref().map(|e| e.id)
    }

    /// Replace the current entry, returning the previous one.
    pub fn replace(&self, entry: Option<Entry>) -> Option<Entry> {
        std::mem::replace(&mut *self.lock(), entry)
    }

    /// Start a scope. The value seen before the call is restored when the
    /// returned guard is dropped, whatever path the caller leaves by.
    pub fn scope(&self) -> CurrentEntryScope<'_> {
        CurrentEntryScope {
            owner: self,
            saved: Some(self.get()),
        }
    }
}

#[must_use = "the previous entry is restored when the scope is dropped"]
pub struct CurrentEntryScope<'a> {
    owner: &'a CurrentEntry,
    saved: Option<Option<Entry>>,
}

impl CurrentEntryScope<'_> {
    /// Point the slot at `entry` for the rest of the scope.
    pub fn enter(&self, entry: &Entry) {
        self.owner.replace(Some(entry.clone()));
    }
}

impl Drop for CurrentEntryScope<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.owner.replace(saved);
        }
    }
}
