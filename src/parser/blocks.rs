use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*#*$").unwrap());
static BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:(?:-\s*){3,}|(?:\*\s*){3,}|(?:_\s*){3,})$").unwrap());
static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-*+]\s+(.*)$").unwrap());
static DELIMITER_ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\|?\s*:?-{3,}:?\s*(\|\s*:?-{3,}:?\s*)*\|?$").unwrap());
static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
static INLINE_LINKS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static UNDERSCORE_EM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[\s(])_([^_]+)_([\s.,:;)]|$)").unwrap());
static ESCAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\([\\`*_{}\[\]()#+\-.!|<>])").unwrap());

/// One structural element of the reference page, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentBlock {
    ThematicBreak,
    Heading { level: u8, text: String },
    Paragraph { text: String },
    BlockQuote { text: String },
    Table { rows: Vec<Vec<String>> },
    BulletList { items: Vec<String> },
}

/// Turn a markdown rendition of the page into blocks.
///
/// Runs of lines of the same shape (quote, bullet, table, prose) collapse
/// into one block; blank lines end a run.
pub fn classify_lines(markdown: &str) -> Vec<ContentBlock> {
    let lines: Vec<&str> = markdown.lines().map(str::trim).collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if line.is_empty() {
            i += 1;
            continue;
        }

        // ── Thematic break: --- / *** / * * * ──
        if BREAK_RE.is_match(line) {
            blocks.push(ContentBlock::ThematicBreak);
            i += 1;
            continue;
        }

        // ── Heading: #### text ──
        if let Some(caps) = HEADING_RE.captures(line) {
            blocks.push(ContentBlock::Heading {
                level: caps[1].len() as u8,
                text: clean_inline(&caps[2]),
            });
            i += 1;
            continue;
        }

        // ── Block quote: consecutive > lines ──
        if line.starts_with('>') {
            let (quoted, next) = take_run(&lines, i, |l| l.starts_with('>'));
            let text = quoted
                .iter()
                .map(|l| clean_inline(l.trim_start_matches('>').trim()))
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            blocks.push(ContentBlock::BlockQuote { text });
            i = next;
            continue;
        }

        // ── Table: consecutive | lines ──
        if line.starts_with('|') {
            let (rows, next) = take_run(&lines, i, |l| l.starts_with('|'));
            blocks.push(ContentBlock::Table {
                rows: table_body(&rows),
            });
            i = next;
            continue;
        }

        // ── Bullet list: consecutive - / * / + items ──
        if BULLET_RE.is_match(line) {
            let (items, next) = take_run(&lines, i, |l| BULLET_RE.is_match(l));
            let items = items
                .iter()
                .filter_map(|l| BULLET_RE.captures(l).map(|c| clean_inline(&c[1])))
                .collect();
            blocks.push(ContentBlock::BulletList { items });
            i = next;
            continue;
        }

        // ── Paragraph: everything else up to a blank or a differently shaped line ──
        let (prose, next) = take_run(&lines, i, is_prose);
        let next = next.max(i + 1);
        let text = if prose.is_empty() {
            clean_inline(line)
        } else {
            prose.iter().map(|l| clean_inline(l)).collect::<Vec<_>>().join("\n")
        };
        if !text.is_empty() {
            blocks.push(ContentBlock::Paragraph { text });
        }
        i = next;
    }

    blocks
}

fn is_prose(line: &str) -> bool {
    !line.is_empty()
        && !line.starts_with('>')
        && !line.starts_with('|')
        && !BREAK_RE.is_match(line)
        && !HEADING_RE.is_match(line)
        && !BULLET_RE.is_match(line)
}

/// Collect lines from `start` while `keep` holds. Returns them and the next index.
fn take_run<'a>(
    lines: &[&'a str],
    start: usize,
    keep: impl Fn(&str) -> bool,
) -> (Vec<&'a str>, usize) {
    let mut j = start;
    while j < lines.len() && keep(lines[j]) {
        j += 1;
    }
    (lines[start..j].to_vec(), j)
}

/// Body rows of a pipe table. The header and the `---` delimiter row are
/// not data.
fn table_body(lines: &[&str]) -> Vec<Vec<String>> {
    let has_header = lines.get(1).is_some_and(|l| DELIMITER_ROW_RE.is_match(l));
    let body = if has_header { &lines[2..] } else { lines };
    body.iter()
        .filter(|l| !DELIMITER_ROW_RE.is_match(l))
        .map(|l| split_cells(l))
        .collect()
}

fn split_cells(line: &str) -> Vec<String> {
    let inner = line.trim();
    let inner = inner.strip_prefix('|').unwrap_or(inner);
    let inner = match inner.strip_suffix('|') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => inner,
    };

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(clean_inline(&std::mem::take(&mut current))),
            _ => current.push(c),
        }
    }
    cells.push(clean_inline(&current));
    cells
}

/// Strip inline markup: images, links (keeping their text), emphasis,
/// code ticks and backslash escapes.
fn clean_inline(text: &str) -> String {
    let text = IMAGE_RE.replace_all(text, "");
    let text = INLINE_LINKS_RE.replace_all(&text, "$1");
    let text = text.replace("**", "").replace('`', "");
    let text = unwrap_underscore_emphasis(&text);
    let text = remove_star_emphasis(&text);
    let text = ESCAPE_RE.replace_all(&text, "$1");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Unwrap `_word_` spans. A match consumes the separator after its closing
/// `_`, so adjacent spans need another pass.
fn unwrap_underscore_emphasis(text: &str) -> String {
    let mut out = text.to_string();
    loop {
        let next = UNDERSCORE_EM_RE.replace_all(&out, "$1$2$3").into_owned();
        if next == out {
            return out;
        }
        out = next;
    }
}

/// Drop unescaped `*` characters; escaped ones survive for the unescape pass.
fn remove_star_emphasis(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut escaped = false;
    for c in text.chars() {
        if c == '*' && !escaped {
            continue;
        }
        escaped = c == '\\' && !escaped;
        out.push(c);
    }
    out
}
