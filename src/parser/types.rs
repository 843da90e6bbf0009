use serde::Serialize;

const ARRAY_PREFIX: &str = "Array of ";
const SEPARATORS: &[&str] = &[" or ", ", ", " and "];
const WIDE_MARKERS: &[&str] = &["64-bit", "64 bit"];
const EPOCH_MARKER: &str = "Unix";

/// Canonical form of a type phrase such as "Array of PhotoSize or String".
///
/// `base_types` and `list_depth` come from the type text. `optional` is a
/// property of the place the type is used and is set by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDescriptor {
    pub base_types: Vec<String>,
    pub list_depth: usize,
    pub optional: bool,
}

impl TypeDescriptor {
    pub fn named(name: &str) -> Self {
        TypeDescriptor {
            base_types: vec![name.to_string()],
            list_depth: 0,
            optional: false,
        }
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }
}

/// Parse a raw type phrase. `description` is only consulted to decide what
/// an `Integer` really is.
pub fn parse(raw: &str, description: &str) -> TypeDescriptor {
    let (depth, rest) = peel_arrays(raw);

    let mut base_types: Vec<String> = Vec::new();
    for token in split_types(rest) {
        let canonical = canonicalize(token, description);
        if !base_types.iter().any(|t| t == canonical) {
            base_types.push(canonical.to_string());
        }
    }

    TypeDescriptor {
        base_types,
        list_depth: depth,
        optional: false,
    }
}

/// Strip leading "Array of " wrappers, counting them.
pub fn peel_arrays(raw: &str) -> (usize, &str) {
    let mut rest = raw.trim();
    let mut depth = 0;
    while let Some(inner) = rest.strip_prefix(ARRAY_PREFIX) {
        rest = inner.trim_start();
        depth += 1;
    }
    (depth, rest)
}

/// Split on " or ", ", " and " and " (every occurrence), dropping empty pieces.
pub fn split_types(text: &str) -> Vec<&str> {
    let mut pieces = vec![text];
    for sep in SEPARATORS {
        pieces = pieces.into_iter().flat_map(|p| p.split(sep)).collect();
    }
    pieces
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Map a documented type name onto its canonical name. Unknown names pass
/// through, which is how defined types keep their own names.
pub fn canonicalize<'a>(token: &'a str, description: &str) -> &'a str {
    match token {
        "Int" => "int",
        "Integer" => {
            if WIDE_MARKERS.iter().any(|m| description.contains(m)) {
                "int64"
            } else if description.contains(EPOCH_MARKER) {
                "DateTime"
            } else {
                "int"
            }
        }
        "Float" | "Float number" => "float",
        "True" => "unit",
        "Boolean" => "bool",
        "String" => "string",
        "Messages" => "Message",
        other => other,
    }
}
