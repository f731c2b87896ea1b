//! Embed tags of the form `[name key="value"]` or `[name]content[/name]`.
//!
//! `[[name]]` is an escaped tag and renders as the literal `[name]`.
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Attribute mapping parsed from a tag. Keys are lowercased; positional
/// values are stored under their index ("0", "1", ...).
pub type Attrs = BTreeMap<String, String>;

static OPEN_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([A-Za-z0-9_-]+)((?:\s[^\]]*?)?)\s*(/)?\]").expect("valid regex")
});

static ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?x)
        ([\w-]+)\s*=\s*"([^"]*)"(?:\s|$)
        | ([\w-]+)\s*=\s*'([^']*)'(?:\s|$)
        | ([\w-]+)\s*=\s*([^\s'"]+)(?:\s|$)
        | "([^"]*)"(?:\s|$)
        | '([^']*)'(?:\s|$)
        | (\S+)(?:\s|$)
        "#,
    )
    .expect("valid regex")
});

/// A tag found in a body of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatch {
    /// Byte range of the whole tag, closing tag included.
    pub start: usize,
    pub end: usize,
    pub name: String,
    pub attrs: Attrs,
    /// Enclosed content for `[name]...[/name]` tags.
    pub content: Option<String>,
    /// For `[[name]]` tags: the text to emit in place of the match.
    pub literal: Option<String>,
}

/// Parse the attribute part of a tag.
pub fn parse_attrs(text: &str) -> Attrs {
    let normalized: String = text
        .chars()
        .map(|c| match c {
            '\u{00a0}' | '\u{200b}' => ' ',
            c => c,
        })
        .collect();

    let mut attrs = Attrs::new();
    let mut positional = 0usize;
    for caps in ATTR.captures_iter(&normalized) {
        let named = [(1, 2), (3, 4), (5, 6)]
            .into_iter()
            .find_map(|(k, v)| Some((caps.get(k)?, caps.get(v)?)));
        if let Some((key, value)) = named {
            attrs.insert(key.as_str().to_lowercase(), value.as_str().to_string());
            continue;
        }
        if let Some(value) = [7, 8, 9].into_iter().find_map(|i| caps.get(i)) {
            attrs.insert(positional.to_string(), value.as_str().to_string());
            positional += 1;
        }
    }
    attrs
}

/// Find tags named in `names` (every tag when `names` is empty), in order.
pub fn scan(text: &str, names: &[&str]) -> Vec<TagMatch> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(caps) = OPEN_TAG.captures_at(text, pos) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let name = name.as_str();
        if !names.is_empty() && !names.contains(&name) {
            pos = whole.start() + 1;
            continue;
        }

        let self_closing = caps.get(3).is_some();
        let mut end = whole.end();
        let mut content = None;
        if !self_closing {
            let closing = format!("[/{name}]");
            if let Some(offset) = text[end..].find(&closing) {
                content = Some(text[end..end + offset].to_string());
                end = end + offset + closing.len();
            }
        }

        let escaped = whole.start() > pos
            && text[..whole.start()].ends_with('[')
            && text[end..].starts_with(']');
        let attrs = parse_attrs(caps.get(2).map(|m| m.as_str()).unwrap_or(""));

        let tag = if escaped {
            TagMatch {
                start: whole.start() - 1,
                end: end + 1,
                name: name.to_string(),
                attrs,
                content,
                literal: Some(text[whole.start()..end].to_string()),
            }
        } else {
            TagMatch {
                start: whole.start(),
                end,
                name: name.to_string(),
                attrs,
                content,
                literal: None,
            }
        };
        pos = tag.end;
        out.push(tag);
    }
    out
}

/// Replace every tag named in `names` with the output of `render`.
/// Escaped tags are replaced with their literal text without calling `render`.
pub fn replace<F>(text: &str, names: &[&str], mut render: F) -> String
where
    F: FnMut(&TagMatch) -> String,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for tag in scan(text, names) {
        out.push_str(&text[last..tag.start]);
        match &tag.literal {
            Some(literal) => out.push_str(literal),
            None => out.push_str(&render(&tag)),
        }
        last = tag.end;
    }
    out.push_str(&text[last..]);
    out
}
