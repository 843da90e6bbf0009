pub mod blocks;
pub mod describe;
pub mod error;
pub mod schema;
pub mod types;
pub mod units;

use blocks::ContentBlock;
use error::SchemaError;
use schema::Schema;
use units::Classifier;

/// Pipeline: blocks → units → schema.
pub fn process_blocks(
    classifier: &Classifier,
    blocks: &[ContentBlock],
) -> Result<Schema, SchemaError> {
    let units = classifier.classify(blocks)?;
    Ok(schema::assemble(&units))
}

/// Same, starting from the markdown rendition of the page.
pub fn process_page(classifier: &Classifier, markdown: &str) -> Result<Schema, SchemaError> {
    let blocks = blocks::classify_lines(markdown);
    process_blocks(classifier, &blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::schema::SchemaEntity;
    use crate::parser::types::TypeDescriptor;

    fn parse(fixture: &str) -> Schema {
        let md = std::fs::read_to_string(format!("tests/fixtures/{}.md", fixture)).unwrap();
        process_page(&Classifier::with_definition_level(4), &md).unwrap()
    }

    fn find<'a>(schema: &'a Schema, name: &str) -> &'a SchemaEntity {
        schema
            .entities
            .iter()
            .find(|e| e.name() == name)
            .unwrap_or_else(|| panic!("{name} missing"))
    }

    #[test]
    fn botapi_counts() {
        let schema = parse("botapi");
        assert_eq!(schema.type_count(), 9);
        assert_eq!(schema.method_count(), 4);
        assert!(schema.failures.is_empty(), "{:?}", schema.failures);
    }

    #[test]
    fn botapi_section_headings_are_not_units() {
        let schema = parse("botapi");
        assert!(schema.entities.iter().all(|e| e.name() != "Stickers"));
    }

    #[test]
    fn botapi_message_record() {
        let schema = parse("botapi");
        let SchemaEntity::Record { fields, description, .. } = find(&schema, "Message") else {
            panic!("Message should be a record");
        };
        assert_eq!(description, &vec!["This object represents a message.".to_string()]);
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["MessageId", "From", "Date", "Chat", "Photo", "Text"]);
        assert_eq!(fields[0].ty.base_types, vec!["int"]);
        assert!(fields[1].ty.optional);
        assert_eq!(fields[2].ty.base_types, vec!["DateTime"]);
        assert_eq!(fields[4].ty.list_depth, 1);
        assert_eq!(fields[4].ty.base_types, vec!["PhotoSize"]);
    }

    #[test]
    fn botapi_chat_id_is_wide() {
        let schema = parse("botapi");
        let SchemaEntity::Record { fields, .. } = find(&schema, "Chat") else {
            panic!("Chat should be a record");
        };
        assert_eq!(fields[0].ty.base_types, vec!["int64"]);
        assert_eq!(fields[0].description, "Unique identifier for this chat.");
    }

    #[test]
    fn botapi_union_and_stub() {
        let schema = parse("botapi");
        let SchemaEntity::Union { cases, .. } = find(&schema, "InputMedia") else {
            panic!("InputMedia should be a union");
        };
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].description, "Represents a photo to be sent.");
        assert!(matches!(find(&schema, "CallbackGame"), SchemaEntity::Stub { .. }));
    }

    #[test]
    fn botapi_methods() {
        let schema = parse("botapi");
        let SchemaEntity::Method { returns, parameters, .. } = find(&schema, "SendMessage") else {
            panic!("SendMessage should be a method");
        };
        assert_eq!(returns, &vec![TypeDescriptor::named("Message")]);
        assert_eq!(parameters.len(), 3);
        assert!(!parameters[2].required);
        assert!(parameters[2].ty.optional);

        let SchemaEntity::Method { returns, description, .. } = find(&schema, "GetUpdates") else {
            panic!("GetUpdates should be a method");
        };
        assert_eq!(returns[0].list_depth, 1);
        assert_eq!(description.len(), 2);
        assert!(
            description[1].starts_with("Notes 1. This method will not work"),
            "{:?}",
            description
        );

        let SchemaEntity::Method { returns, .. } = find(&schema, "GetMe") else {
            panic!("GetMe should be a method");
        };
        assert_eq!(returns, &vec![TypeDescriptor::named("User")]);

        let SchemaEntity::Method { returns, .. } = find(&schema, "EditMessageText") else {
            panic!("EditMessageText should be a method");
        };
        assert_eq!(returns, &vec![TypeDescriptor::named("Message"), TypeDescriptor::named("unit")]);
    }

    #[test]
    fn botapi_primitives() {
        let schema = parse("botapi");
        for p in ["option", "list", "int", "int64", "DateTime", "string", "bool", "unit"] {
            assert!(schema.primitives.contains(p), "{p} missing");
        }
        assert!(!schema.primitives.contains("Message"));
    }

    #[test]
    fn malformed_page_fails_whole_pass() {
        let md = "#### User\n\n\
                  | Field | Type | Description |\n\
                  | --- | --- | --- |\n\
                  | id | Integer |\n";
        let err = process_page(&Classifier::new(), md).unwrap_err();
        assert!(matches!(err, SchemaError::MalformedRow { row: 0, cells: 2, .. }));
    }
}
