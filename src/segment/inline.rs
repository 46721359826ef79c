//! Inline markdown stripping.
//!
//! Turns a block's source text into the plain string the provider speaks.
//! Emphasis markers, link targets and code ticks are dropped; the words
//! they wrap are kept.

use once_cell::sync::Lazy;
use regex::Regex;

struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

// Patterns are literals below; a failure here is a programming error.
#[allow(clippy::expect_used)]
fn rule(pattern: &str, replacement: &'static str) -> Rule {
    Rule {
        pattern: Regex::new(pattern).expect("inline pattern must compile"),
        replacement,
    }
}

// Order matters: images before links, code before emphasis, autolinks before tags.
static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule(r"`+([^`]+?)`+", "${1}"),
        rule(r"!\[([^\]]*)\]\([^)]*\)", "${1}"),
        rule(r"\[([^\]]+)\]\([^)]*\)", "${1}"),
        rule(r"\[([^\]]+)\]\[[^\]]*\]", "${1}"),
        rule(r"<(https?://[^>\s]+)>", "${1}"),
        rule(r"</?[A-Za-z][^>]*>", ""),
        rule(r"\*\*(.+?)\*\*", "${1}"),
        rule(r"__(.+?)__", "${1}"),
        rule(r"\*([^*\s][^*]*?)\*", "${1}"),
        rule(r"\b_([^_]+?)_\b", "${1}"),
        rule(r"~~(.+?)~~", "${1}"),
        rule(r"\\([\\`*_{}\[\]()#+\-.!|>~])", "${1}"),
        rule(r"\|", " "),
        rule(r"\s+", " "),
    ]
});

/// Strip inline markdown from `source` and collapse whitespace.
pub fn speakable(source: &str) -> String {
    let mut text = source.to_string();
    for rule in RULES.iter() {
        let replaced = rule.pattern.replace_all(&text, rule.replacement);
        if let std::borrow::Cow::Owned(owned) = replaced {
            text = owned;
        }
    }
    text.trim().to_string()
}
