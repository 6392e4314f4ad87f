//! Validator: does a pytree satisfy a schema tree?
//!
//! `test` answers yes/no and never builds a message. `validate` returns one
//! failure whose path runs from the root to the deepest mismatch; each
//! container prefixes its own key or index as the failure bubbles up.
use crate::error::ValidationFailure;
use crate::node::{AbstractLiteral, Node};
use crate::pytree::{Literal, PyTree};

impl AbstractLiteral {
    pub fn admits(&self, value: &PyTree) -> bool {
        match (self, value) {
            (AbstractLiteral::Any, _) => true,
            (AbstractLiteral::Int { min, max }, PyTree::Int(x)) => in_bounds(x, min.as_ref(), max.as_ref()),
            (AbstractLiteral::Float { min, max }, PyTree::Float(x)) => in_bounds(x, min.as_ref(), max.as_ref()),
            (AbstractLiteral::Str, PyTree::Str(_)) => true,
            (AbstractLiteral::Bool, PyTree::Bool(_)) => true,
            _ => false,
        }
    }

    fn check(&self, value: &PyTree) -> Result<(), ValidationFailure> {
        if self.admits(value) {
            return Ok(());
        }
        match (self, value) {
            (AbstractLiteral::Int { min, max }, PyTree::Int(x)) => Err(out_of_bounds(x, min.as_ref(), max.as_ref())),
            (AbstractLiteral::Float { min, max }, PyTree::Float(x)) => {
                Err(out_of_bounds(&x.0, min.map(|m| m.0).as_ref(), max.map(|m| m.0).as_ref()))
            }
            _ => Err(ValidationFailure::new(format!("expected {}, got {}", self.name(), describe(value)))),
        }
    }
}

fn in_bounds<T: PartialOrd>(x: &T, min: Option<&T>, max: Option<&T>) -> bool {
    min.is_none_or(|lo| x >= lo) && max.is_none_or(|hi| x <= hi)
}

fn out_of_bounds<T: PartialOrd + std::fmt::Debug>(x: &T, min: Option<&T>, max: Option<&T>) -> ValidationFailure {
    match (min, max) {
        (Some(lo), _) if x < lo => ValidationFailure::new(format!("{x:?} is less than minimum {lo:?}")),
        (_, Some(hi)) if x > hi => ValidationFailure::new(format!("{x:?} is greater than maximum {hi:?}")),
        _ => ValidationFailure::new(format!("{x:?} is out of bounds")),
    }
}

fn describe(value: &PyTree) -> String {
    match value {
        PyTree::List(_) | PyTree::Dict(_) => value.value_type().name().to_string(),
        leaf => format!("{} `{leaf}`", value.value_type().name()),
    }
}

impl Node {
    /// Membership check. Never fails, never formats.
    pub fn test(&self, value: &PyTree) -> bool {
        match self {
            Node::Literal(lit) => lit.matches(value),
            Node::Abstract(a) => a.admits(value),
            Node::Dict(schema) => {
                let PyTree::Dict(m) = value else { return false };
                m.len() == schema.len()
                    && schema.iter().all(|(k, child)| m.get(k).is_some_and(|v| child.test(v)))
            }
            Node::List(schema) => {
                let PyTree::List(xs) = value else { return false };
                xs.len() == schema.len() && schema.iter().zip(xs).all(|(child, x)| child.test(x))
            }
            Node::AbstractDict { key, value: value_schema } => {
                let PyTree::Dict(m) = value else { return false };
                m.iter().all(|(k, v)| key_test(key, k) && value_schema.test(v))
            }
            Node::AbstractList(item) => {
                let PyTree::List(xs) = value else { return false };
                xs.iter().all(|x| item.test(x))
            }
            Node::Union(alternatives) => alternatives.iter().any(|alt| alt.test(value)),
        }
    }

    /// Check `value`, reporting the full path to the first mismatch.
    pub fn validate(&self, value: &PyTree) -> Result<(), ValidationFailure> {
        match self {
            Node::Literal(lit) => {
                if lit.matches(value) {
                    Ok(())
                } else if value.literal_kind() != Some(lit.kind()) {
                    Err(ValidationFailure::new(format!("expected {} `{lit}`, got {}", lit.kind().name(), describe(value))))
                } else {
                    Err(ValidationFailure::new(format!("expected `{lit}`, got `{value}`")))
                }
            }
            Node::Abstract(a) => a.check(value),
            Node::Dict(schema) => {
                let PyTree::Dict(m) = value else {
                    return Err(ValidationFailure::new(format!("expected dict, got {}", describe(value))));
                };
                if m.len() != schema.len() {
                    return Err(ValidationFailure::new(format!(
                        "expected exactly {} keys, got {}",
                        schema.len(),
                        m.len()
                    )));
                }
                for (k, child) in schema {
                    let Some(v) = m.get(k) else {
                        return Err(ValidationFailure::new(format!("missing key {k}")));
                    };
                    child.validate(v).map_err(|e| e.within_key(k))?;
                }
                Ok(())
            }
            Node::List(schema) => {
                let PyTree::List(xs) = value else {
                    return Err(ValidationFailure::new(format!("expected list, got {}", describe(value))));
                };
                if xs.len() != schema.len() {
                    return Err(ValidationFailure::new(format!(
                        "expected exactly {} items, got {}",
                        schema.len(),
                        xs.len()
                    )));
                }
                for (i, (child, x)) in schema.iter().zip(xs).enumerate() {
                    child.validate(x).map_err(|e| e.within_index(i))?;
                }
                Ok(())
            }
            Node::AbstractDict { key, value: value_schema } => {
                let PyTree::Dict(m) = value else {
                    return Err(ValidationFailure::new(format!("expected dict, got {}", describe(value))));
                };
                for (k, v) in m {
                    key.validate(&PyTree::from(k.clone()))
                        .map_err(|e| ValidationFailure::new(format!("invalid key: {}", e.reason)).within_key(k))?;
                    value_schema.validate(v).map_err(|e| e.within_key(k))?;
                }
                Ok(())
            }
            Node::AbstractList(item) => {
                let PyTree::List(xs) = value else {
                    return Err(ValidationFailure::new(format!("expected list, got {}", describe(value))));
                };
                for (i, x) in xs.iter().enumerate() {
                    item.validate(x).map_err(|e| e.within_index(i))?;
                }
                Ok(())
            }
            Node::Union(alternatives) => {
                if alternatives.iter().any(|alt| alt.validate(value).is_ok()) {
                    Ok(())
                } else {
                    Err(ValidationFailure::new(format!("`{value}` matched no alternative of {self}")))
                }
            }
        }
    }
}

fn key_test(schema: &Node, key: &Literal) -> bool {
    match schema {
        Node::Literal(lit) => lit == key,
        other => other.test(&PyTree::from(key.clone())),
    }
}

// ------------------------------- Tests ------------------------------------ //
