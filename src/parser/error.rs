use thiserror::Error;

/// Failures raised while turning blocks into schema entities.
///
/// `MalformedRow` aborts a whole classification pass. The other two only
/// take down the entity they were raised for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("row {row} of `{unit}` has {cells} cell(s), at least 3 required")]
    MalformedRow {
        unit: String,
        row: usize,
        cells: usize,
    },

    #[error("method `{method}` has no sentence saying what it returns")]
    NoReturnSentence { method: String },

    #[error("union `{union}` lists case `{case}` which is not defined")]
    UnresolvedCase { union: String, case: String },
}

/// An entity that failed to assemble, kept apart from the good ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityFailure {
    pub entity: String,
    pub error: SchemaError,
}
