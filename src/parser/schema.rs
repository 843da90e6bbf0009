use std::collections::{BTreeSet, HashMap, HashSet};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use super::describe::{self, to_pascal_case};
use super::error::{EntityFailure, SchemaError};
use super::types::{self, TypeDescriptor};
use super::units::Unit;

/// Primitives every schema has: the wrappers used to render optional and
/// list types.
pub const BUILTIN_PRIMITIVES: &[&str] = &["option", "list"];

/// A record field or a union case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    pub description: String,
}

/// A method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    pub required: bool,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum SchemaEntity {
    Primitive {
        name: String,
    },
    Stub {
        name: String,
        order: usize,
        description: Vec<String>,
    },
    Record {
        name: String,
        order: usize,
        description: Vec<String>,
        fields: Vec<Member>,
    },
    Union {
        name: String,
        order: usize,
        description: Vec<String>,
        cases: Vec<Member>,
    },
    Method {
        name: String,
        order: usize,
        description: Vec<String>,
        /// Alternatives; more than one when the return sentence names several types.
        returns: Vec<TypeDescriptor>,
        parameters: Vec<Parameter>,
    },
}

impl SchemaEntity {
    pub fn name(&self) -> &str {
        match self {
            SchemaEntity::Primitive { name }
            | SchemaEntity::Stub { name, .. }
            | SchemaEntity::Record { name, .. }
            | SchemaEntity::Union { name, .. }
            | SchemaEntity::Method { name, .. } => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SchemaEntity::Primitive { .. } => "Primitive",
            SchemaEntity::Stub { .. } => "Stub",
            SchemaEntity::Record { .. } => "Record",
            SchemaEntity::Union { .. } => "Union",
            SchemaEntity::Method { .. } => "Method",
        }
    }
}

/// Everything `assemble` produced for one batch of Units.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    /// Defined types and methods in declaration order.
    pub entities: Vec<SchemaEntity>,
    pub primitives: BTreeSet<String>,
    pub failures: Vec<EntityFailure>,
}

impl Schema {
    pub fn type_count(&self) -> usize {
        self.entities
            .iter()
            .filter(|e| !matches!(e, SchemaEntity::Method { .. }))
            .count()
    }

    pub fn method_count(&self) -> usize {
        self.entities
            .iter()
            .filter(|e| matches!(e, SchemaEntity::Method { .. }))
            .count()
    }

    pub fn primitive_entities(&self) -> impl Iterator<Item = SchemaEntity> + '_ {
        self.primitives
            .iter()
            .map(|name| SchemaEntity::Primitive { name: name.clone() })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Stub,
    Record,
    Union,
    Method,
}

/// Methods start lower-case; types are stubs without fields, unions when
/// the first field has no type, records otherwise.
fn shape(unit: &Unit) -> Shape {
    if unit.name.chars().next().is_some_and(char::is_lowercase) {
        Shape::Method
    } else if unit.fields.is_empty() {
        Shape::Stub
    } else if unit.fields[0].type_text.is_none() {
        Shape::Union
    } else {
        Shape::Record
    }
}

/// Per-Unit work that needs no global knowledge beyond the name sets.
struct Draft<'a> {
    unit: &'a Unit,
    shape: Shape,
    order: usize,
    description: Vec<String>,
    members: Vec<Member>,
    parameters: Vec<Parameter>,
    /// Base types used by fields that are not defined types.
    foreign: Vec<String>,
}

struct Names {
    methods: HashSet<String>,
    defined: HashSet<String>,
}

/// Classify Units into schema entities.
///
/// Never fails as a whole: entities that cannot be assembled are reported in
/// `Schema::failures` and left out of `Schema::entities`.
pub fn assemble(units: &[Unit]) -> Schema {
    // Pass 1: shapes and name sets.
    let shaped: Vec<(&Unit, Shape)> = units.iter().map(|u| (u, shape(u))).collect();
    let names = Names {
        methods: shaped
            .iter()
            .filter(|(_, s)| *s == Shape::Method)
            .map(|(u, _)| u.name.clone())
            .collect(),
        defined: shaped
            .iter()
            .filter(|(_, s)| *s != Shape::Method)
            .map(|(u, _)| u.name.clone())
            .collect(),
    };

    // Pass 2: fields, parameters and descriptions, one Unit at a time.
    let drafts: Vec<Draft> = shaped
        .par_iter()
        .enumerate()
        .map(|(i, &(unit, shape))| draft(unit, shape, i + 1, &names))
        .collect();

    let mut primitives: BTreeSet<String> =
        BUILTIN_PRIMITIVES.iter().map(|p| p.to_string()).collect();
    for d in &drafts {
        primitives.extend(d.foreign.iter().cloned());
    }

    let summaries: HashMap<&str, &[String]> = drafts
        .iter()
        .filter(|d| d.shape != Shape::Method)
        .map(|d| (d.unit.name.as_str(), d.description.as_slice()))
        .collect();

    // Passes 3 and 4: union cases and method returns.
    let mut schema = Schema {
        primitives,
        ..Schema::default()
    };
    for d in &drafts {
        let entity = match d.shape {
            Shape::Stub => Ok(SchemaEntity::Stub {
                name: to_pascal_case(&d.unit.name),
                order: d.order,
                description: d.description.clone(),
            }),
            Shape::Record => Ok(SchemaEntity::Record {
                name: to_pascal_case(&d.unit.name),
                order: d.order,
                description: d.description.clone(),
                fields: d.members.clone(),
            }),
            Shape::Union => union_entity(d, &summaries),
            Shape::Method => method_entity(d, &names, &schema.primitives),
        };
        match entity {
            Ok(entity) => schema.entities.push(entity),
            Err(error) => {
                warn!(entity = %d.unit.name, %error, "skipping entity");
                schema.failures.push(EntityFailure {
                    entity: d.unit.name.clone(),
                    error,
                });
            }
        }
    }

    debug!(
        types = schema.type_count(),
        methods = schema.method_count(),
        primitives = schema.primitives.len(),
        failures = schema.failures.len(),
        "assembled"
    );
    schema
}

fn draft<'a>(unit: &'a Unit, shape: Shape, order: usize, names: &Names) -> Draft<'a> {
    let description = describe::normalize(&unit.description, &names.methods);
    let mut members = Vec::new();
    let mut parameters = Vec::new();
    let mut foreign = Vec::new();

    if matches!(shape, Shape::Record | Shape::Method) {
        for field in &unit.fields {
            let raw_type = field.type_text.as_deref().unwrap_or("");
            let ty = types::parse(raw_type, &field.description).optional(!field.required);
            foreign.extend(
                ty.base_types
                    .iter()
                    .filter(|t| !names.defined.contains(t.as_str()))
                    .cloned(),
            );

            let name = to_pascal_case(&field.name);
            let description = describe::normalize_paragraph(&field.description, &names.methods)
                .unwrap_or_default();
            if shape == Shape::Method {
                parameters.push(Parameter {
                    name,
                    ty,
                    required: field.required,
                    description,
                });
            } else {
                members.push(Member { name, ty, description });
            }
        }
    }

    Draft {
        unit,
        shape,
        order,
        description,
        members,
        parameters,
        foreign,
    }
}

fn union_entity(
    d: &Draft,
    summaries: &HashMap<&str, &[String]>,
) -> Result<SchemaEntity, SchemaError> {
    let cases = d
        .unit
        .fields
        .iter()
        .map(|case| {
            let summary =
                summaries
                    .get(case.name.as_str())
                    .ok_or_else(|| SchemaError::UnresolvedCase {
                        union: d.unit.name.clone(),
                        case: case.name.clone(),
                    })?;
            Ok(Member {
                name: case.name.clone(),
                ty: TypeDescriptor::named(&case.name),
                description: summary.first().cloned().unwrap_or_default(),
            })
        })
        .collect::<Result<Vec<_>, SchemaError>>()?;

    Ok(SchemaEntity::Union {
        name: to_pascal_case(&d.unit.name),
        order: d.order,
        description: d.description.clone(),
        cases,
    })
}

fn method_entity(
    d: &Draft,
    names: &Names,
    primitives: &BTreeSet<String>,
) -> Result<SchemaEntity, SchemaError> {
    let sentence = describe::return_sentence(&d.unit.description, &d.unit.name)?;
    let mentions = describe::return_mentions(&sentence, |t| {
        names.defined.contains(t) || primitives.contains(t)
    });
    if mentions.is_empty() {
        warn!(
            method = %d.unit.name,
            sentence = %sentence.fragment.trim(),
            "return sentence names no known type"
        );
    }
    let returns = describe::return_alternatives(&sentence, &mentions);

    let mut description = d.description.clone();
    describe::rewrite_return_sentence(&mut description, &mentions);

    Ok(SchemaEntity::Method {
        name: to_pascal_case(&d.unit.name),
        order: d.order,
        description,
        returns,
        parameters: d.parameters.clone(),
    })
}
