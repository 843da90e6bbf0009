use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::error::SchemaError;
use super::types::{self, TypeDescriptor};

static ARRAY_OF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)array of ").unwrap());

/// Pointers to other sections of the page that mean nothing out of context.
const BOILERPLATE: &[&str] = &[
    ", see more on currencies",
    " See formatting options for more details.",
    " See Setting up a bot for more details.",
    " See Linking your domain to the bot for more details.",
    " See our self-signed guide for details.",
];

/// Asides about identifier width. The span from `lead_in` up to `until`
/// (or the end of the text) is dropped when `marker` is present.
struct WidthNote {
    marker: &'static str,
    lead_in: &'static str,
    until: Option<&'static str>,
}

const WIDTH_NOTES: &[WidthNote] = &[
    WidthNote {
        marker: "64 bit",
        lead_in: " This identifier",
        until: Some(" Returned"),
    },
    WidthNote {
        marker: "64-bit",
        lead_in: " This number",
        until: None,
    },
];

const OPTIONAL_PREFIX: &str = "Optional. ";
const RETURN_MARKERS: &[&str] = &["is returned", "returns"];

/// Normalize every paragraph of a description. Paragraphs that end up empty
/// are dropped.
pub fn normalize(paragraphs: &[String], method_names: &HashSet<String>) -> Vec<String> {
    paragraphs
        .iter()
        .filter_map(|p| normalize_paragraph(p, method_names))
        .collect()
}

pub fn normalize_paragraph(text: &str, method_names: &HashSet<String>) -> Option<String> {
    // Steps run in a fixed order: later ones look for text produced earlier.
    let mut text = collapse_whitespace(text)
        .replace('<', "{")
        .replace('>', "}");

    for phrase in BOILERPLATE {
        text = text.replace(phrase, "");
    }

    for note in WIDTH_NOTES {
        if text.contains(note.marker) {
            excise_width_note(&mut text, note);
        }
    }

    if let Some(start) = text.find(" More about") {
        text.truncate(start);
    }

    if let Some(start) = text.find(" More info") {
        let tail = text[start..]
            .find('»')
            .map(|i| text[start + i + '»'.len_utf8()..].trim_start().to_string());
        text.truncate(start);
        if let Some(tail) = tail.filter(|t| !t.is_empty()) {
            text.push(' ');
            text.push_str(&tail);
        }
    }

    if let Some(rest) = text.strip_prefix(OPTIONAL_PREFIX) {
        text = rest.to_string();
    }

    let mut text = recase_identifiers(text.trim(), method_names);
    if text.is_empty() {
        return None;
    }
    if !text.ends_with('.') && !text.ends_with(':') {
        text.push('.');
    }
    Some(text)
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = text.trim().replace("\n\n", " ").replace('\n', " ");
    while out.contains("  ") {
        out = out.replace("  ", " ");
    }
    out
}

fn excise_width_note(text: &mut String, note: &WidthNote) {
    let Some(start) = text.find(note.lead_in) else {
        return;
    };
    let end = note
        .until
        .and_then(|until| text[start..].find(until).map(|i| start + i))
        .unwrap_or(text.len());
    text.replace_range(start..end, "");
}

/// Rewrite snake_case words and method names to PascalCase.
pub fn recase_identifiers(text: &str, method_names: &HashSet<String>) -> String {
    text.split(' ')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let snake = w.contains('_') && !w.contains('/');
            if snake || method_names.iter().any(|n| w.starts_with(n.as_str())) {
                to_pascal_case(w)
            } else {
                w.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `message_id` → `MessageId`, `sendMessage` → `SendMessage`.
pub fn to_pascal_case(name: &str) -> String {
    if name.contains('_') {
        name.split('_').map(title_word).collect()
    } else {
        upper_first(name)
    }
}

fn title_word(word: &str) -> String {
    let has_lower = word.chars().any(|c| c.is_lowercase());
    let has_upper = word.chars().any(|c| c.is_uppercase());
    if has_upper && !has_lower {
        // acronym
        return word.to_string();
    }
    capitalize(word, true)
}

fn upper_first(word: &str) -> String {
    capitalize(word, false)
}

/// Upper-case the first letter, leaving any punctuation before it in place.
fn capitalize(word: &str, lower_rest: bool) -> String {
    let mut out = String::with_capacity(word.len());
    let mut seen_letter = false;
    for c in word.chars() {
        if !seen_letter && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            seen_letter = true;
        } else if seen_letter && lower_rest {
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// The fragment of a method description that says what it returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnSentence {
    pub fragment: String,
    pub is_array: bool,
}

/// Find the first `.`-separated fragment mentioning "is returned" or "returns".
pub fn return_sentence(paragraphs: &[String], method: &str) -> Result<ReturnSentence, SchemaError> {
    paragraphs
        .iter()
        .flat_map(|p| p.split('.'))
        .filter(|f| !f.trim().is_empty())
        .find(|f| {
            let lower = f.to_lowercase();
            RETURN_MARKERS.iter().any(|m| lower.contains(m))
        })
        .map(|fragment| ReturnSentence {
            fragment: fragment.to_string(),
            is_array: fragment.to_lowercase().contains("array of"),
        })
        .ok_or_else(|| SchemaError::NoReturnSentence {
            method: method.to_string(),
        })
}

/// A type mentioned in a return sentence, as written and canonicalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnMention {
    pub written: String,
    pub canonical: String,
}

/// Words of the sentence that name a known type (defined or primitive).
pub fn return_mentions(
    sentence: &ReturnSentence,
    is_known: impl Fn(&str) -> bool,
) -> Vec<ReturnMention> {
    let mut mentions: Vec<ReturnMention> = Vec::new();
    for word in sentence.fragment.split_whitespace() {
        let written = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '_');
        if written.is_empty() {
            continue;
        }
        let canonical = types::canonicalize(written, "");
        if is_known(canonical) && !mentions.iter().any(|m| m.canonical == canonical) {
            mentions.push(ReturnMention {
                written: written.to_string(),
                canonical: canonical.to_string(),
            });
        }
    }
    mentions
}

/// One descriptor per mentioned type; all of them are lists when the sentence
/// speaks of an array.
pub fn return_alternatives(
    sentence: &ReturnSentence,
    mentions: &[ReturnMention],
) -> Vec<TypeDescriptor> {
    mentions
        .iter()
        .map(|m| TypeDescriptor {
            base_types: vec![m.canonical.clone()],
            list_depth: usize::from(sentence.is_array),
            optional: false,
        })
        .collect()
}

/// Cosmetic rewrite of the return sentence inside the (normalized)
/// description: type names in canonical form, "array of X objects" → "X list".
pub fn rewrite_return_sentence(paragraphs: &mut [String], mentions: &[ReturnMention]) {
    let Ok(sentence) = return_sentence(paragraphs, "") else {
        return;
    };

    let mut rewritten = sentence.fragment.clone();
    if sentence.is_array {
        rewritten = ARRAY_OF_RE.replace_all(&rewritten, "").into_owned();
    }
    for mention in mentions {
        let Ok(word) = Regex::new(&format!(r"\b{}\b", regex::escape(&mention.written))) else {
            continue;
        };
        let replacement = if sentence.is_array {
            format!("{} list", mention.canonical)
        } else {
            mention.canonical.clone()
        };
        rewritten = word.replace_all(&rewritten, regex::NoExpand(&replacement)).into_owned();
    }
    if sentence.is_array {
        rewritten = rewritten.replace(" objects", "").replace(" an ", " a ");
        let lead = rewritten.len() - rewritten.trim_start().len();
        if rewritten[lead..].starts_with("An ") {
            rewritten.replace_range(lead..lead + 2, "A");
        }
    }

    if let Some(p) = paragraphs.iter_mut().find(|p| p.contains(&sentence.fragment)) {
        *p = p.replacen(&sentence.fragment, &rewritten, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn methods(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn norm(text: &str) -> String {
        normalize_paragraph(text, &HashSet::new()).unwrap()
    }

    #[test]
    fn whitespace_and_brackets() {
        assert_eq!(norm("Text of\n\nthe  message <b>bold</b>"), "Text of the message {b}bold{/b}.");
    }

    #[test]
    fn boilerplate_removed() {
        assert_eq!(
            norm("Mode for parsing entities. See formatting options for more details."),
            "Mode for parsing entities."
        );
        assert_eq!(
            norm("Three-letter ISO 4217 currency code, see more on currencies"),
            "Three-letter ISO 4217 currency code."
        );
    }

    #[test]
    fn width_note_dropped() {
        let raw = "Unique identifier for this chat. This number may have more than 32 significant bits. \
                   But it has at most 52 significant bits, so a signed 64-bit integer is safe.";
        assert_eq!(norm(raw), "Unique identifier for this chat.");
    }

    #[test]
    fn width_note_with_trailing_phrase() {
        let raw = "Identifier of the user. This identifier fits in 64 bit storage. \
                   Returned only in getChat.";
        assert_eq!(norm(raw), "Identifier of the user. Returned only in getChat.");
    }

    #[test]
    fn width_note_without_lead_in_is_left_alone() {
        assert_eq!(norm("A 64-bit value"), "A 64-bit value.");
    }

    #[test]
    fn more_about_truncates() {
        assert_eq!(norm("Type of the chat. More about chats »"), "Type of the chat.");
    }

    #[test]
    fn more_info_keeps_tail_after_glyph() {
        assert_eq!(
            norm("Pass True to protect it. More info on protection » Only for bots."),
            "Pass True to protect it. Only for bots."
        );
        assert_eq!(norm("Bot token. More info"), "Bot token.");
    }

    #[test]
    fn optional_prefix_stripped() {
        assert_eq!(norm("Optional. Sender of the message"), "Sender of the message.");
    }

    #[test]
    fn identifiers_recased() {
        let m = methods(&["getUpdates", "sendMessage"]);
        let raw = "Use reply_to_message_id or call getUpdates, see https://x.y/a_b";
        let out = normalize_paragraph(raw, &m).unwrap();
        assert_eq!(out, "Use ReplyToMessageId or call GetUpdates, see https://x.y/a_b.");

        let out = normalize_paragraph(
            "Pass the (reply_to_message_id) or \"callback_data\" value",
            &HashSet::new(),
        )
        .unwrap();
        assert_eq!(out, "Pass the (ReplyToMessageId) or \"CallbackData\" value.");
    }

    #[test]
    fn colon_ending_kept() {
        assert_eq!(norm("It can be one of:"), "It can be one of:");
    }

    #[test]
    fn empty_paragraphs_dropped() {
        let paragraphs = ["".to_string(), "  \n ".to_string(), "Kept".to_string()];
        let out = normalize(&paragraphs, &HashSet::new());
        assert_eq!(out, vec!["Kept."]);
    }

    #[test]
    fn pascal_case() {
        assert_eq!(to_pascal_case("message_id"), "MessageId");
        assert_eq!(to_pascal_case("sendMessage"), "SendMessage");
        assert_eq!(to_pascal_case("chat_ID"), "ChatID");
        assert_eq!(to_pascal_case("can_SEND_media"), "CanSENDMedia");
        assert_eq!(to_pascal_case(""), "");
        assert_eq!(to_pascal_case("(reply_to_message_id)"), "(ReplyToMessageId)");
        assert_eq!(to_pascal_case("\"sendMessage"), "\"SendMessage");
    }

    #[test]
    fn finds_return_sentence() {
        let desc = vec![
            "Use this method to send text messages.".to_string(),
            "On success, the sent Message is returned.".to_string(),
        ];
        let s = return_sentence(&desc, "sendMessage").unwrap();
        assert_eq!(s.fragment, "On success, the sent Message is returned");
        assert!(!s.is_array);
    }

    #[test]
    fn return_marker_is_case_insensitive() {
        let desc = vec!["Returns True on success.".to_string()];
        assert!(return_sentence(&desc, "close").is_ok());
    }

    #[test]
    fn missing_return_sentence() {
        let desc = vec!["Use this method to do things.".to_string()];
        assert_eq!(
            return_sentence(&desc, "doThings"),
            Err(SchemaError::NoReturnSentence {
                method: "doThings".to_string()
            })
        );
    }

    #[test]
    fn array_return() {
        let desc = vec!["On success, an array of Messages that were sent is returned.".to_string()];
        let s = return_sentence(&desc, "sendMediaGroup").unwrap();
        assert!(s.is_array);

        let mentions = return_mentions(&s, |t| t == "Message");
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].written, "Messages");

        let alts = return_alternatives(&s, &mentions);
        assert_eq!(
            alts,
            vec![TypeDescriptor {
                base_types: vec!["Message".into()],
                list_depth: 1,
                optional: false
            }]
        );
    }

    #[test]
    fn several_return_alternatives() {
        let desc = vec![
            "On success, if the message is not an inline message, the edited Message is returned, otherwise True is returned."
                .to_string(),
        ];
        let s = return_sentence(&desc, "editMessageText").unwrap();
        let mentions = return_mentions(&s, |t| t == "Message" || t == "unit");
        let names: Vec<_> = mentions.iter().map(|m| m.canonical.as_str()).collect();
        assert_eq!(names, vec!["Message", "unit"]);
    }

    #[test]
    fn rewrite_array_sentence() {
        let sentence = "Use this method. On success, an array of Update objects is returned.";
        let mut desc = vec![sentence.to_string()];
        let s = return_sentence(&desc, "getUpdates").unwrap();
        let mentions = return_mentions(&s, |t| t == "Update");
        rewrite_return_sentence(&mut desc, &mentions);
        assert_eq!(desc[0], "Use this method. On success, a Update list is returned.");
    }

    #[test]
    fn rewrite_array_sentence_with_leading_article() {
        let mut desc = vec!["Use this method. An Array of Update objects is returned.".to_string()];
        let s = return_sentence(&desc, "getUpdates").unwrap();
        let mentions = return_mentions(&s, |t| t == "Update");
        rewrite_return_sentence(&mut desc, &mentions);
        assert_eq!(desc[0], "Use this method. A Update list is returned.");
    }

    #[test]
    fn rewrite_plain_sentence() {
        let mut desc = vec!["Returns True on success.".to_string()];
        let s = return_sentence(&desc, "close").unwrap();
        let mentions = return_mentions(&s, |t| t == "unit");
        rewrite_return_sentence(&mut desc, &mentions);
        assert_eq!(desc[0], "Returns unit on success.");
    }
}
