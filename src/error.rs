//! Error taxonomy for the schema engine.
use std::fmt;
use serde::Serialize;

use crate::pytree::Literal;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    /// No registry entry for a runtime type or abstract marker, or an annotation
    /// outside the supported alphabet.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    /// Two refinements of the same shape cannot be reconciled.
    #[error("conflicting constraint: {0}")]
    ConflictingConstraint(String),

    /// A node constructor invariant was violated.
    #[error("malformed schema: {0}")]
    MalformedSchema(String),

    #[error("duplicate registration: {0}")]
    DuplicateRegistration(String),
}

/// One step from a container to a child.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A value did not satisfy a node. `path` runs from the root to the deepest mismatch.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("validation failed at {}: {reason}", display_path(.path))]
pub struct ValidationFailure {
    pub path: Vec<PathSegment>,
    pub reason: String,
}

impl ValidationFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { path: Vec::new(), reason: reason.into() }
    }

    /// Prefix the path with the container step the failure was found under.
    pub fn within(mut self, segment: PathSegment) -> Self {
        self.path.insert(0, segment);
        self
    }

    pub fn within_key(self, key: &Literal) -> Self {
        self.within(PathSegment::Key(key.to_string()))
    }

    pub fn within_index(self, index: usize) -> Self {
        self.within(PathSegment::Index(index))
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, "[{k}]"),
            PathSegment::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// `$` followed by each step, e.g. `$["users"][1]`.
pub fn display_path(path: &[PathSegment]) -> String {
    let mut out = String::from("$");
    for seg in path {
        out.push_str(&seg.to_string());
    }
    out
}

pub(crate) fn conflict(msg: impl Into<String>) -> SchemaError {
    let msg = msg.into();
    tracing::trace!(%msg, "intersection conflict");
    SchemaError::ConflictingConstraint(msg)
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_built_outside_in() {
        let err = ValidationFailure::new("expected int, got str")
            .within_index(2)
            .within_key(&Literal::Str("items".into()));
        assert_eq!(err.path, vec![PathSegment::Key("\"items\"".into()), PathSegment::Index(2)]);
        assert_eq!(err.to_string(), r#"validation failed at $["items"][2]: expected int, got str"#);
    }
}
