//! Knowledge-base notes: one markdown file per entity, YAML front matter
//! plus a dataview block, cross-linked through `[[Type]]` references.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

use crate::parser::schema::{Member, Parameter, Schema, SchemaEntity};
use crate::parser::types::TypeDescriptor;

const NOTE_FOOTER: &str = "```dataviewjs\ndv.view('');\n```\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Wipe the note directories and write every note.
    Create,
    /// Only rewrite notes that already exist.
    Update,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct VaultStats {
    pub written: usize,
    pub skipped: usize,
}

#[derive(Serialize)]
struct Note<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<usize>,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<NoteRow<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cases: Vec<NoteRow<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    returns: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<NoteRow<'a>>,
}

#[derive(Serialize)]
struct NoteRow<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    ty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<bool>,
    description: &'a str,
}

impl<'a> NoteRow<'a> {
    fn member(m: &'a Member) -> Self {
        NoteRow {
            name: &m.name,
            ty: type_link(&m.ty),
            required: None,
            description: &m.description,
        }
    }

    fn parameter(p: &'a Parameter) -> Self {
        NoteRow {
            name: &p.name,
            ty: type_link(&p.ty),
            required: Some(p.required),
            description: &p.description,
        }
    }
}

/// `[[A]] or [[B]]`, then ` [[list]]` per list level and ` [[option]]`.
pub fn type_link(ty: &TypeDescriptor) -> String {
    let mut out = ty
        .base_types
        .iter()
        .map(|t| format!("[[{}]]", t))
        .collect::<Vec<_>>()
        .join(" or ");
    for _ in 0..ty.list_depth {
        out.push_str(" [[list]]");
    }
    if ty.optional {
        out.push_str(" [[option]]");
    }
    out.trim_start().to_string()
}

fn note(entity: &SchemaEntity) -> Note<'_> {
    let mut note = Note {
        kind: entity.kind(),
        order: None,
        name: entity.name(),
        description: None,
        fields: Vec::new(),
        cases: Vec::new(),
        returns: None,
        parameters: Vec::new(),
    };
    match entity {
        SchemaEntity::Primitive { .. } => {}
        SchemaEntity::Stub { order, description, .. } => {
            note.order = Some(*order);
            note.description = Some(description.as_slice());
        }
        SchemaEntity::Record {
            order,
            description,
            fields,
            ..
        } => {
            note.order = Some(*order);
            note.description = Some(description.as_slice());
            note.fields = fields.iter().map(NoteRow::member).collect();
        }
        SchemaEntity::Union {
            order,
            description,
            cases,
            ..
        } => {
            note.order = Some(*order);
            note.description = Some(description.as_slice());
            note.cases = cases.iter().map(NoteRow::member).collect();
        }
        SchemaEntity::Method {
            order,
            description,
            returns,
            parameters,
            ..
        } => {
            note.order = Some(*order);
            note.description = Some(description.as_slice());
            note.returns = Some(returns.iter().map(type_link).collect::<Vec<_>>().join(" | "));
            note.parameters = parameters.iter().map(NoteRow::parameter).collect();
        }
    }
    note
}

/// Full text of the note for `entity`.
pub fn render_note(entity: &SchemaEntity) -> Result<String> {
    let yaml = serde_yaml::to_string(&note(entity)).context("Failed to serialize note")?;
    Ok(format!("---\n{}---\n\n{}", yaml, NOTE_FOOTER))
}

/// Directory of the note for `entity`, relative to the vault root.
fn note_dir(entity: &SchemaEntity) -> PathBuf {
    let api = Path::new("Api");
    match entity {
        SchemaEntity::Primitive { .. } => api.join("Types").join("Primitives"),
        SchemaEntity::Stub { .. } => api.join("Types").join("Stubs"),
        SchemaEntity::Record { .. } => api.join("Types").join("Records"),
        SchemaEntity::Union { .. } => api.join("Types").join("Unions"),
        SchemaEntity::Method { .. } => api.join("Methods"),
    }
}

fn all_note_dirs(root: &Path) -> Vec<PathBuf> {
    let api = root.join("Api");
    vec![
        api.join("Types").join("Primitives"),
        api.join("Types").join("Stubs"),
        api.join("Types").join("Records"),
        api.join("Types").join("Unions"),
        api.join("Methods"),
    ]
}

pub struct Vault {
    root: PathBuf,
    mode: Mode,
}

impl Vault {
    pub fn new(root: impl Into<PathBuf>, mode: Mode) -> Self {
        Vault {
            root: root.into(),
            mode,
        }
    }

    pub fn write(&self, schema: &Schema) -> Result<VaultStats> {
        if self.mode == Mode::Create {
            for dir in all_note_dirs(&self.root) {
                if dir.exists() {
                    fs::remove_dir_all(&dir)
                        .with_context(|| format!("Failed to clean {}", dir.display()))?;
                }
                fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }

        let entities: Vec<SchemaEntity> = schema
            .primitive_entities()
            .chain(schema.entities.iter().cloned())
            .collect();

        let pb = ProgressBar::new(entities.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} notes")?
                .progress_chars("=> "),
        );

        let mut stats = VaultStats::default();
        for entity in &entities {
            let path = self
                .root
                .join(note_dir(entity))
                .join(format!("{}.md", entity.name()));
            if self.mode == Mode::Update && !path.exists() {
                stats.skipped += 1;
            } else {
                fs::write(&path, render_note(entity)?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                stats.written += 1;
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!(
            root = %self.root.display(),
            written = stats.written,
            skipped = stats.skipped,
            "vault written"
        );
        Ok(stats)
    }
}
