//! Renderers for an assembled schema.

pub mod json;
pub mod vault;
