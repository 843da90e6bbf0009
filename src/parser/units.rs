use tracing::debug;

use super::blocks::ContentBlock;
use super::error::SchemaError;

const REQUIRED_YES: &str = "Yes";
const OPTIONAL_MARKER: &str = "Optional.";

/// One raw definition: a type or a method, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub order: usize,
    pub name: String,
    pub description: Vec<String>,
    pub fields: Vec<Field>,
}

/// One table row or one bullet item of a Unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub order: usize,
    pub name: String,
    /// Absent for bullet items and for rows with an empty type cell.
    pub type_text: Option<String>,
    pub required: bool,
    pub description: String,
}

impl Field {
    fn case(order: usize, name: &str) -> Self {
        Field {
            order,
            name: name.to_string(),
            type_text: None,
            required: true,
            description: String::new(),
        }
    }
}

enum State {
    Idle,
    Open(OpenUnit),
}

struct OpenUnit {
    name: String,
    description: Vec<String>,
    fields: Vec<Field>,
    /// Set once a table or bullet list has supplied the fields.
    has_fields: bool,
}

impl OpenUnit {
    fn new(name: &str) -> Self {
        OpenUnit {
            name: name.to_string(),
            description: Vec::new(),
            fields: Vec::new(),
            has_fields: false,
        }
    }
}

/// Groups a block stream into Units.
///
/// A heading whose text has no space opens a Unit; paragraphs and quotes
/// become its description and the first table or bullet list its fields.
/// A thematic break, any heading, or the end of the stream seals it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    definition_level: Option<u8>,
}

impl Classifier {
    /// Any heading level may open a Unit.
    pub fn new() -> Self {
        Classifier::default()
    }

    /// Only headings of `level` open Units. Other headings still seal.
    pub fn with_definition_level(level: u8) -> Self {
        Classifier {
            definition_level: Some(level),
        }
    }

    pub fn classify(&self, blocks: &[ContentBlock]) -> Result<Vec<Unit>, SchemaError> {
        let mut units = Vec::new();
        let mut state = State::Idle;

        for block in blocks {
            state = match (state, block) {
                (State::Idle, ContentBlock::Heading { level, text }) => self.open(*level, text),
                (State::Idle, _) => State::Idle,

                (State::Open(unit), ContentBlock::ThematicBreak) => {
                    seal(unit, &mut units);
                    State::Idle
                }
                (State::Open(unit), ContentBlock::Heading { level, text }) => {
                    seal(unit, &mut units);
                    self.open(*level, text)
                }
                (
                    State::Open(mut unit),
                    ContentBlock::Paragraph { text } | ContentBlock::BlockQuote { text },
                ) => {
                    unit.description.push(text.clone());
                    State::Open(unit)
                }
                (State::Open(mut unit), ContentBlock::Table { rows }) => {
                    if unit.has_fields {
                        debug!(unit = %unit.name, "ignoring extra table");
                    } else {
                        unit.fields = table_fields(&unit.name, rows)?;
                        unit.has_fields = true;
                    }
                    State::Open(unit)
                }
                (State::Open(mut unit), ContentBlock::BulletList { items }) => {
                    if unit.has_fields {
                        debug!(unit = %unit.name, "ignoring extra list");
                    } else {
                        unit.fields = items
                            .iter()
                            .enumerate()
                            .map(|(i, item)| Field::case(i, item))
                            .collect();
                        unit.has_fields = true;
                    }
                    State::Open(unit)
                }
            };
        }

        if let State::Open(unit) = state {
            seal(unit, &mut units);
        }

        Ok(units)
    }

    fn open(&self, level: u8, text: &str) -> State {
        let text = text.trim();
        let level_ok = self.definition_level.map_or(true, |l| l == level);
        if level_ok && !text.is_empty() && !text.contains(' ') {
            State::Open(OpenUnit::new(text))
        } else {
            State::Idle
        }
    }
}

fn seal(unit: OpenUnit, units: &mut Vec<Unit>) {
    debug!(unit = %unit.name, fields = unit.fields.len(), "sealed");
    units.push(Unit {
        order: units.len(),
        name: unit.name,
        description: unit.description,
        fields: unit.fields,
    });
}

/// 3 cells: name, type, description (required unless "Optional.").
/// 4 cells: name, type, required, description.
fn table_fields(unit: &str, rows: &[Vec<String>]) -> Result<Vec<Field>, SchemaError> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| match row.as_slice() {
            [name, type_text, required, description, ..] => Ok(Field {
                order: i,
                name: name.clone(),
                type_text: non_empty(type_text),
                required: required.trim() == REQUIRED_YES,
                description: description.clone(),
            }),
            [name, type_text, description] => Ok(Field {
                order: i,
                name: name.clone(),
                type_text: non_empty(type_text),
                required: !description.trim_start().starts_with(OPTIONAL_MARKER),
                description: description.clone(),
            }),
            _ => Err(SchemaError::MalformedRow {
                unit: unit.to_string(),
                row: i,
                cells: row.len(),
            }),
        })
        .collect()
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(level: u8, text: &str) -> ContentBlock {
        ContentBlock::Heading {
            level,
            text: text.into(),
        }
    }

    fn p(text: &str) -> ContentBlock {
        ContentBlock::Paragraph { text: text.into() }
    }

    fn table(rows: &[&[&str]]) -> ContentBlock {
        ContentBlock::Table {
            rows: rows.iter().map(|r| r.iter().map(|c| c.to_string()).collect()).collect(),
        }
    }

    fn bullets(items: &[&str]) -> ContentBlock {
        ContentBlock::BulletList {
            items: items.iter().map(|i| i.to_string()).collect(),
        }
    }

    #[test]
    fn record_with_three_column_table() {
        let blocks = vec![
            h(4, "Message"),
            table(&[
                &["message_id", "Integer", "Unique message identifier."],
                &["from", "User", "Optional. Sender."],
            ]),
        ];
        let units = Classifier::new().classify(&blocks).unwrap();
        assert_eq!(units.len(), 1);
        let unit = &units[0];
        assert_eq!(unit.name, "Message");
        assert_eq!(unit.fields.len(), 2);
        assert!(unit.fields[0].required);
        assert!(!unit.fields[1].required);
        assert_eq!(unit.fields[1].type_text.as_deref(), Some("User"));
        assert_eq!(unit.fields[1].order, 1);
    }

    #[test]
    fn method_with_four_column_table() {
        let blocks = vec![
            h(4, "sendMessage"),
            p("Use this method to send text messages."),
            table(&[
                &["chat_id", "Integer or String", "Yes", "Target chat."],
                &["text", "String", "Yes", "Text of the message."],
                &["parse_mode", "String", "Optional", "Mode for parsing entities."],
            ]),
        ];
        let units = Classifier::new().classify(&blocks).unwrap();
        let fields = &units[0].fields;
        assert_eq!(units[0].description, vec!["Use this method to send text messages."]);
        assert!(fields[0].required && fields[1].required);
        assert!(!fields[2].required);
        assert_eq!(fields[2].description, "Mode for parsing entities.");
    }

    #[test]
    fn bullet_list_gives_cases() {
        let blocks = vec![
            h(4, "InputMedia"),
            p("This object represents the content of a media message. It should be one of"),
            bullets(&["InputMediaAudio", "InputMediaPhoto"]),
        ];
        let units = Classifier::new().classify(&blocks).unwrap();
        let fields = &units[0].fields;
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].name, "InputMediaPhoto");
        assert!(fields.iter().all(|f| f.type_text.is_none()));
    }

    #[test]
    fn headings_with_spaces_do_not_open() {
        let blocks = vec![h(3, "Getting updates"), p("Dropped."), h(4, "Update"), p("Kept.")];
        let units = Classifier::new().classify(&blocks).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].description, vec!["Kept."]);
    }

    #[test]
    fn closing_heading_opens_next_unit() {
        let blocks = vec![h(4, "User"), p("A user."), h(4, "Chat"), p("A chat.")];
        let units = Classifier::new().classify(&blocks).unwrap();
        let names: Vec<_> = units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["User", "Chat"]);
        assert_eq!(units[0].order, 0);
        assert_eq!(units[1].order, 1);
    }

    #[test]
    fn thematic_break_seals() {
        let blocks = vec![h(4, "Update"), p("An update."), ContentBlock::ThematicBreak, p("Lost.")];
        let units = Classifier::new().classify(&blocks).unwrap();
        assert_eq!(units[0].description, vec!["An update."]);
    }

    #[test]
    fn second_table_ignored() {
        let blocks = vec![
            h(4, "User"),
            table(&[&["id", "Integer", "Identifier."]]),
            table(&[&["other", "String", "Ignored."]]),
            bullets(&["Ignored"]),
        ];
        let units = Classifier::new().classify(&blocks).unwrap();
        assert_eq!(units[0].fields.len(), 1);
        assert_eq!(units[0].fields[0].name, "id");
    }

    #[test]
    fn malformed_row_aborts() {
        let blocks = vec![
            h(4, "User"),
            p("A user."),
            h(4, "Broken"),
            table(&[&["id", "Integer", "Identifier."], &["name", "String"]]),
        ];
        let err = Classifier::new().classify(&blocks).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MalformedRow {
                unit: "Broken".into(),
                row: 1,
                cells: 2
            }
        );
    }

    #[test]
    fn definition_level_restricts_opening() {
        let blocks = vec![h(3, "Stickers"), p("Section prose."), h(4, "Sticker"), p("A sticker.")];
        let any = Classifier::new().classify(&blocks).unwrap();
        assert_eq!(any.len(), 2);

        let h4 = Classifier::with_definition_level(4).classify(&blocks).unwrap();
        assert_eq!(h4.len(), 1);
        assert_eq!(h4[0].name, "Sticker");
    }

    #[test]
    fn h3_seals_even_when_it_cannot_open() {
        let blocks = vec![h(4, "Sticker"), p("A sticker."), h(3, "Inline mode"), p("Prose.")];
        let units = Classifier::with_definition_level(4).classify(&blocks).unwrap();
        assert_eq!(units[0].description, vec!["A sticker."]);
    }

    #[test]
    fn block_quote_joins_description_in_order() {
        let blocks = vec![
            h(4, "getUpdates"),
            p("Returns an Array of Update objects."),
            ContentBlock::BlockQuote {
                text: "Notes\nThis method will not work if an outgoing webhook is set up.".into(),
            },
            table(&[&["offset", "Integer", "Optional", "Identifier of the first update."]]),
        ];
        let units = Classifier::new().classify(&blocks).unwrap();
        assert_eq!(
            units[0].description,
            vec![
                "Returns an Array of Update objects.",
                "Notes\nThis method will not work if an outgoing webhook is set up.",
            ]
        );
        assert_eq!(units[0].fields.len(), 1);
    }

    #[test]
    fn idle_table_is_dropped() {
        let blocks = vec![
            p("Preamble."),
            table(&[&["stray"]]),
            h(3, "Getting updates"),
            table(&[&["a", "b"]]),
            h(4, "User"),
            p("A user."),
        ];
        let units = Classifier::new().classify(&blocks).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].name, "User");
        assert!(units[0].fields.is_empty());
    }

    #[test]
    fn stub_has_no_fields() {
        let blocks = vec![h(4, "CallbackGame"), p("A placeholder.")];
        let units = Classifier::new().classify(&blocks).unwrap();
        assert!(units[0].fields.is_empty());
    }

    #[test]
    fn fresh_state_per_call() {
        let classifier = Classifier::new();
        let blocks = vec![h(4, "User"), p("A user.")];
        let first = classifier.classify(&blocks).unwrap();
        let second = classifier.classify(&blocks).unwrap();
        assert_eq!(first, second);
    }
}
