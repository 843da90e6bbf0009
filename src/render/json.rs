//! Structured dump of the schema for other tooling.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::parser::schema::{Schema, SchemaEntity};

#[derive(Serialize)]
struct Export<'a> {
    generated_at: DateTime<Utc>,
    primitives: &'a BTreeSet<String>,
    entities: &'a [SchemaEntity],
}

/// Pretty-printed JSON of the primitives and entities. Failures are not
/// part of the export.
pub fn export(schema: &Schema) -> Result<String> {
    let doc = Export {
        generated_at: Utc::now(),
        primitives: &schema.primitives,
        entities: &schema.entities,
    };
    serde_json::to_string_pretty(&doc).context("Failed to serialize schema")
}
