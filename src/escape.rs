//! Escaping and sanitizing helpers for markup output.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static SCRIPT_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(?:script|style)\b[^>]*>.*?</(?:script|style)\s*>").expect("valid regex")
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)</?[A-Za-z!][^>]*>").expect("valid regex"));
static PERCENT_OCTET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%[A-Fa-f0-9]{2}").expect("valid regex"));
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("valid regex"));

/// Escape text for an HTML text node.
pub fn html_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a value for a double-quoted HTML attribute.
pub fn html_attr(s: &str) -> String {
    html_text(s)
}

/// Encode `value` as JSON and escape it for an HTML attribute.
pub fn json_attr<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    html_attr(&json)
}

/// Remove every markup tag, dropping `<script>`/`<style>` content entirely.
pub fn strip_tags(s: &str) -> String {
    let without_blocks = SCRIPT_STYLE.replace_all(s, "");
    TAG.replace_all(&without_blocks, "").into_owned()
}

/// Reduce user input to a single line of plain text: no tags, no control
/// characters, no percent-encoded octets, whitespace collapsed and trimmed.
pub fn sanitize_text_field(s: &str) -> String {
    let stripped = strip_tags(s);
    let flattened: String = stripped
        .chars()
        .filter_map(|c| match c {
            '\r' | '\n' | '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();
    let mut out = SPACES.replace_all(&flattened, " ").trim().to_string();
    while PERCENT_OCTET.is_match(&out) {
        out = PERCENT_OCTET.replace_all(&out, "").into_owned();
    }
    out.trim().to_string()
}

/// URL-safe identifier: lowercase alphanumerics separated by single dashes.
pub fn slugify(s: &str) -> String {
    let plain = strip_tags(s);
    let mut slug = String::with_capacity(plain.len());
    let mut pending_dash = false;
    for c in plain.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else if c == '-' || c == '_' || c.is_whitespace() || c.is_ascii_punctuation() {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html_significant_characters() {
        assert_eq!(
            html_text(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#039;s&lt;/a&gt;"
        );
        assert_eq!(html_text("plain"), "plain");
    }

    #[test]
    fn json_attr_is_attribute_safe() {
        let v = serde_json::json!({ "category": "a\"b" });
        let out = json_attr(&v);
        assert!(!out.contains('"'));
        assert_eq!(out, "{&quot;category&quot;:&quot;a\\&quot;b&quot;}");
    }

    #[test]
    fn sanitize_strips_markup_and_controls() {
        assert_eq!(sanitize_text_field("  <b>billing</b>\n\tteam  "), "billing team");
        assert_eq!(sanitize_text_field("a<script>alert(1)</script>b"), "ab");
        assert_eq!(sanitize_text_field("bill\u{0007}ing"), "billing");
        assert_eq!(sanitize_text_field("bill%2Fing"), "billing");
        assert_eq!(sanitize_text_field("%%4141"), "");
        assert_eq!(sanitize_text_field(""), "");
    }

    #[test]
    fn slugify_produces_url_safe_identifiers() {
        assert_eq!(slugify("Billing"), "billing");
        assert_eq!(slugify("  Account & Login  "), "account-login");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
        assert_eq!(slugify("Über Fragen"), "über-fragen");
        assert_eq!(slugify("!!!"), "");
    }
}
