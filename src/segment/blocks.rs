//! Line scanner that flattens markdown into block-level elements.
//!
//! Not a CommonMark parser: it recognizes ATX headings, list items (nesting
//! flattened), blockquotes, fenced code and paragraphs. Anything else ends up
//! in a paragraph, so unrecognized syntax is still spoken.

use once_cell::sync::Lazy;
use regex::Regex;

/// One block-level element in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, text: String, raw: String },
    Paragraph { text: String, raw: String },
    ListItem { text: String, raw: String },
    Quote { text: String, raw: String },
    Code { raw: String },
}

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("block pattern must compile")
}

static HEADING: Lazy<Regex> =
    Lazy::new(|| compile(r"^(#{1,6})(?:[ \t]+(.*?))?(?:[ \t]+#+)?[ \t]*$"));
static LIST_ITEM: Lazy<Regex> = Lazy::new(|| compile(r"^\s*(?:[*+-]|\d{1,9}[.)])[ \t]+(.*)$"));
static QUOTE: Lazy<Regex> = Lazy::new(|| compile(r"^\s*>[ \t]?(.*)$"));
static RULE: Lazy<Regex> = Lazy::new(|| compile(r"^\s*(?:(?:-[ \t]*){3,}|(?:\*[ \t]*){3,}|(?:_[ \t]*){3,})$"));
static TABLE_DELIMITER: Lazy<Regex> =
    Lazy::new(|| compile(r"^\s*\|?\s*:?-+:?\s*(?:\|\s*:?-+:?\s*)+\|?\s*$"));

#[derive(Debug, Clone, Copy, PartialEq)]
enum OpenKind {
    Paragraph,
    ListItem,
    Quote,
}

struct Open<'a> {
    kind: OpenKind,
    raw: Vec<&'a str>,
    text: Vec<String>,
}

#[derive(Default)]
struct Scanner<'a> {
    blocks: Vec<Block>,
    open: Option<Open<'a>>,
}

impl<'a> Scanner<'a> {
    fn flush(&mut self) {
        let Some(open) = self.open.take() else {
            return;
        };
        let text = open.text.join(" ");
        let raw = open.raw.join("\n");
        let block = match open.kind {
            OpenKind::Paragraph => Block::Paragraph { text, raw },
            OpenKind::ListItem => Block::ListItem { text, raw },
            OpenKind::Quote => Block::Quote { text, raw },
        };
        self.blocks.push(block);
    }

    fn start(&mut self, kind: OpenKind, raw: &'a str, text: &str) {
        self.flush();
        self.open = Some(Open {
            kind,
            raw: vec![raw],
            text: vec![text.trim().to_string()],
        });
    }

    fn push_line(&mut self, line: &'a str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            self.flush();
            return;
        }

        if RULE.is_match(line) {
            self.flush();
            return;
        }
        if TABLE_DELIMITER.is_match(line) {
            return;
        }

        if let Some(caps) = HEADING.captures(trimmed) {
            self.flush();
            let level = caps.get(1).map_or(1, |m| m.as_str().len()) as u8;
            let text = caps.get(2).map_or("", |m| m.as_str()).to_string();
            self.blocks.push(Block::Heading {
                level,
                text,
                raw: line.to_string(),
            });
            return;
        }

        if let Some(caps) = LIST_ITEM.captures(line) {
            let text = caps.get(1).map_or("", |m| m.as_str());
            self.start(OpenKind::ListItem, line, text);
            return;
        }

        if let Some(caps) = QUOTE.captures(line) {
            let text = strip_quote_markers(caps.get(1).map_or("", |m| m.as_str()));
            match &mut self.open {
                Some(open) if open.kind == OpenKind::Quote => {
                    open.raw.push(line);
                    if !text.is_empty() {
                        open.text.push(text.to_string());
                    }
                }
                _ => self.start(OpenKind::Quote, line, text),
            }
            return;
        }

        // Plain text continues whatever is open (lazy continuation).
        match &mut self.open {
            Some(open) => {
                open.raw.push(line);
                open.text.push(trimmed.to_string());
            }
            None => self.start(OpenKind::Paragraph, line, trimmed),
        }
    }
}

/// Nested quotes (`> > text`) are flattened into one level.
fn strip_quote_markers(mut text: &str) -> &str {
    loop {
        let trimmed = text.trim_start();
        match trimmed.strip_prefix('>') {
            Some(rest) => text = rest,
            None => return trimmed,
        }
    }
}

fn fence_marker(line: &str) -> Option<&'static str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

/// Scan `source` into blocks in document order.
///
/// An unterminated code fence runs to the end of the input.
pub fn scan(source: &str) -> Vec<Block> {
    let mut scanner = Scanner::default();
    let mut lines = source.lines();

    while let Some(line) = lines.next() {
        if let Some(fence) = fence_marker(line) {
            scanner.flush();
            let mut raw = vec![line];
            for inner in lines.by_ref() {
                raw.push(inner);
                if inner.trim_start().starts_with(fence) {
                    break;
                }
            }
            scanner.blocks.push(Block::Code { raw: raw.join("\n") });
            continue;
        }
        scanner.push_line(line);
    }

    scanner.flush();
    scanner.blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(text: &str) -> Block {
        Block::Paragraph {
            text: text.to_string(),
            raw: text.to_string(),
        }
    }

    #[test]
    fn test_empty_source_has_no_blocks() {
        assert!(scan("").is_empty());
        assert!(scan("\n\n   \n").is_empty());
    }

    #[test]
    fn test_heading_and_paragraph() {
        let blocks = scan("# Title\n\nShort paragraph.");
        assert_eq!(
            blocks,
            vec![
                Block::Heading {
                    level: 1,
                    text: "Title".to_string(),
                    raw: "# Title".to_string(),
                },
                paragraph("Short paragraph."),
            ]
        );
    }

    #[test]
    fn test_heading_levels_and_closing_hashes() {
        let blocks = scan("## Two ##\n### Three\n#### Four\n# C#");
        let levels: Vec<(u8, String)> = blocks
            .into_iter()
            .map(|b| match b {
                Block::Heading { level, text, .. } => (level, text),
                other => panic!("expected heading, got {other:?}"),
            })
            .collect();
        assert_eq!(
            levels,
            vec![
                (2, "Two".to_string()),
                (3, "Three".to_string()),
                (4, "Four".to_string()),
                (1, "C#".to_string()),
            ]
        );
    }

    #[test]
    fn test_hash_without_space_is_paragraph() {
        assert_eq!(scan("#hashtag here"), vec![paragraph("#hashtag here")]);
    }

    #[test]
    fn test_heading_interrupts_paragraph() {
        let blocks = scan("line one\n# Heading\nline two");
        assert_eq!(blocks.len(), 3);
        assert!(matches!(blocks[1], Block::Heading { .. }));
    }

    #[test]
    fn test_paragraph_lines_are_joined() {
        let blocks = scan("first line\nsecond line");
        assert_eq!(
            blocks,
            vec![Block::Paragraph {
                text: "first line second line".to_string(),
                raw: "first line\nsecond line".to_string(),
            }]
        );
    }

    #[test]
    fn test_list_items_are_flattened() {
        let blocks = scan("- one\n  - nested\n* two\n1. three\n2) four");
        let texts: Vec<&str> = blocks
            .iter()
            .map(|b| match b {
                Block::ListItem { text, .. } => text.as_str(),
                other => panic!("expected list item, got {other:?}"),
            })
            .collect();
        assert_eq!(texts, vec!["one", "nested", "two", "three", "four"]);
    }

    #[test]
    fn test_list_item_continuation_line() {
        let blocks = scan("- first part\n  continues here\n- next");
        assert_eq!(
            blocks[0],
            Block::ListItem {
                text: "first part continues here".to_string(),
                raw: "- first part\n  continues here".to_string(),
            }
        );
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_blockquote_lines_merge() {
        let blocks = scan("> quoted line\n> > nested part\nlazy tail");
        assert_eq!(
            blocks,
            vec![Block::Quote {
                text: "quoted line nested part lazy tail".to_string(),
                raw: "> quoted line\n> > nested part\nlazy tail".to_string(),
            }]
        );
    }

    #[test]
    fn test_fenced_code_block() {
        let blocks = scan("```\nprint(1)\n```");
        assert_eq!(
            blocks,
            vec![Block::Code {
                raw: "```\nprint(1)\n```".to_string()
            }]
        );
    }

    #[test]
    fn test_code_fence_keeps_blank_lines_and_markdown_inside() {
        let blocks = scan("text\n~~~python\n# not a heading\n\n- not a bullet\n~~~\nafter");
        assert_eq!(blocks.len(), 3);
        assert!(matches!(&blocks[1], Block::Code { raw } if raw.contains("# not a heading")));
        assert_eq!(blocks[2], paragraph("after"));
    }

    #[test]
    fn test_unterminated_fence_runs_to_end() {
        let blocks = scan("```\nlet x = 1;\n\nmore");
        assert_eq!(blocks.len(), 1);
        assert!(matches!(blocks[0], Block::Code { .. }));
    }

    #[test]
    fn test_rules_and_table_delimiters_are_dropped() {
        let blocks = scan("above\n---\n| a | b |\n|---|:---:|\n| 1 | 2 |\n***");
        assert_eq!(
            blocks,
            vec![
                paragraph("above"),
                Block::Paragraph {
                    text: "| a | b | | 1 | 2 |".to_string(),
                    raw: "| a | b |\n| 1 | 2 |".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_bare_hash_is_empty_heading() {
        assert_eq!(
            scan("#"),
            vec![Block::Heading {
                level: 1,
                text: String::new(),
                raw: "#".to_string(),
            }]
        );
    }
}
