//! Intersector: the meet (⊓) of two schema trees over the same shape.
//!
//! The result is the tightest schema implied by both sides, or a
//! `ConflictingConstraint` when they contradict each other. `Any` is the
//! absorbing element: `Any ⊓ x == x ⊓ Any == x`.
use indexmap::IndexMap;
use ordered_float::OrderedFloat;

use crate::error::{SchemaError, conflict};
use crate::node::{AbstractLiteral, Node};
use crate::pytree::{Literal, PyTree};

impl Node {
    pub fn intersect(&self, other: &Node) -> Result<Node, SchemaError> {
        match (self, other) {
            (_, Node::Abstract(AbstractLiteral::Any)) => Ok(self.clone()),
            (Node::Abstract(AbstractLiteral::Any), _) => Ok(other.clone()),

            (Node::Literal(a), Node::Literal(b)) => {
                if a == b {
                    Ok(self.clone())
                } else {
                    Err(conflict(format!("literals `{a}` and `{b}` differ")))
                }
            }
            (Node::Abstract(a), Node::Abstract(b)) => a.meet(b).map(Node::Abstract),
            (Node::Literal(lit), Node::Abstract(a)) | (Node::Abstract(a), Node::Literal(lit)) => {
                narrow_literal(lit, a).map(Node::Literal)
            }

            (Node::Dict(a), Node::Dict(b)) => meet_dicts(a, b),
            (Node::List(a), Node::List(b)) => {
                if a.len() != b.len() {
                    return Err(conflict(format!("list lengths {} and {} differ", a.len(), b.len())));
                }
                a.iter().zip(b).map(|(x, y)| x.intersect(y)).collect::<Result<Vec<_>, _>>().map(Node::List)
            }
            (Node::AbstractDict { key: ka, value: va }, Node::AbstractDict { key: kb, value: vb }) => {
                Ok(Node::abstract_dict(ka.intersect(kb)?, va.intersect(vb)?))
            }
            (Node::AbstractList(a), Node::AbstractList(b)) => Ok(Node::abstract_list(a.intersect(b)?)),

            // an exact shape narrowed by a homogeneous one keeps the exact shape
            (Node::Dict(entries), Node::AbstractDict { key, value })
            | (Node::AbstractDict { key, value }, Node::Dict(entries)) => narrow_dict(entries, key, value),
            (Node::List(items), Node::AbstractList(item)) | (Node::AbstractList(item), Node::List(items)) => items
                .iter()
                .map(|x| x.intersect(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Node::List),

            (Node::Union(a), Node::Union(b)) => {
                if a.len() != b.len() {
                    return Err(conflict(format!(
                        "unions with {} and {} alternatives cannot be paired",
                        a.len(),
                        b.len()
                    )));
                }
                a.iter().zip(b).map(|(x, y)| x.intersect(y)).collect::<Result<Vec<_>, _>>().map(Node::Union)
            }

            _ => Err(conflict(format!(
                "{} `{self}` is incompatible with {} `{other}`",
                self.kind().name(),
                other.kind().name()
            ))),
        }
    }
}

impl AbstractLiteral {
    fn meet(&self, other: &AbstractLiteral) -> Result<AbstractLiteral, SchemaError> {
        match (self, other) {
            (AbstractLiteral::Any, x) | (x, AbstractLiteral::Any) => Ok(*x),
            (AbstractLiteral::Int { min: a_min, max: a_max }, AbstractLiteral::Int { min: b_min, max: b_max }) => {
                Ok(AbstractLiteral::Int {
                    min: meet_bound("min", *a_min, *b_min)?,
                    max: meet_bound("max", *a_max, *b_max)?,
                })
            }
            (AbstractLiteral::Float { min: a_min, max: a_max }, AbstractLiteral::Float { min: b_min, max: b_max }) => {
                Ok(AbstractLiteral::Float {
                    min: meet_bound::<OrderedFloat<f64>>("min", *a_min, *b_min)?,
                    max: meet_bound::<OrderedFloat<f64>>("max", *a_max, *b_max)?,
                })
            }
            (AbstractLiteral::Str, AbstractLiteral::Str) => Ok(AbstractLiteral::Str),
            (AbstractLiteral::Bool, AbstractLiteral::Bool) => Ok(AbstractLiteral::Bool),
            (a, b) => Err(conflict(format!("abstract {} is incompatible with abstract {}", a.name(), b.name()))),
        }
    }
}

/// Bounds are fixed points, not ranges to be tightened: two set bounds must agree.
fn meet_bound<T>(which: &str, a: Option<T>, b: Option<T>) -> Result<Option<T>, SchemaError>
where
    T: PartialEq + std::fmt::Debug,
{
    match (a, b) {
        (Some(x), Some(y)) if x != y => Err(conflict(format!("conflicting {which} values {x:?} and {y:?}"))),
        (Some(x), _) | (None, Some(x)) => Ok(Some(x)),
        (None, None) => Ok(None),
    }
}

fn narrow_literal(lit: &Literal, a: &AbstractLiteral) -> Result<Literal, SchemaError> {
    if a.admits(&PyTree::from(lit.clone())) {
        Ok(lit.clone())
    } else {
        Err(conflict(format!("literal `{lit}` does not satisfy {a}")))
    }
}

fn meet_dicts(a: &IndexMap<Literal, Node>, b: &IndexMap<Literal, Node>) -> Result<Node, SchemaError> {
    if a.len() != b.len() || a.keys().any(|k| !b.contains_key(k)) {
        return Err(conflict("dict key sets differ"));
    }
    let mut out = IndexMap::with_capacity(a.len());
    for (k, va) in a {
        let Some(vb) = b.get(k) else {
            return Err(conflict(format!("key {k} missing on one side")));
        };
        out.insert(k.clone(), va.intersect(vb)?);
    }
    Ok(Node::Dict(out))
}

fn narrow_dict(entries: &IndexMap<Literal, Node>, key: &Node, value: &Node) -> Result<Node, SchemaError> {
    let mut out = IndexMap::with_capacity(entries.len());
    for (k, v) in entries {
        let k = match Node::Literal(k.clone()).intersect(key)? {
            Node::Literal(lit) => lit,
            other => return Err(conflict(format!("dict key narrowed to non-literal `{other}`"))),
        };
        out.insert(k, v.intersect(value)?);
    }
    Ok(Node::Dict(out))
}

/// Reconcile a declared schema with example values. Each example is lowered to
/// its exact schema and met with `declared`; the first conflict is returned.
///
/// A failure here is a configuration error that should be rejected when the
/// declaration is loaded, not when it is called.
pub fn reconcile(declared: &Node, examples: &[PyTree]) -> Result<Vec<Node>, SchemaError> {
    examples
        .iter()
        .map(|example| declared.intersect(&crate::derive::from_value(example)?))
        .collect()
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn is_conflict(r: Result<Node, SchemaError>) -> bool {
        matches!(r, Err(SchemaError::ConflictingConstraint(_)))
    }

    #[test]
    fn any_absorbs_from_both_sides() {
        let int = Node::int(5);
        let s = Node::abstract_str();
        assert_eq!(int.intersect(&Node::any()).unwrap(), int);
        assert_eq!(Node::any().intersect(&int).unwrap(), int);
        assert_eq!(Node::any().intersect(&s).unwrap(), s);
        assert_eq!(Node::any().intersect(&Node::any()).unwrap(), Node::any());
        let tree = Node::dict([("a", Node::abstract_list(Node::int(1)))]);
        assert_eq!(tree.intersect(&Node::any()).unwrap(), tree);
    }

    #[test]
    fn int_bounds_merge_when_disjointly_set() {
        let got = Node::abstract_int(None, Some(10)).intersect(&Node::abstract_int(Some(0), None)).unwrap();
        assert_eq!(got, Node::abstract_int(Some(0), Some(10)));
    }

    #[test]
    fn int_bounds_conflict_when_both_set_and_differ() {
        let a = Node::abstract_int(Some(0), Some(10));
        let b = Node::abstract_int(Some(5), Some(15));
        assert!(is_conflict(a.intersect(&b)));
        assert_eq!(a.intersect(&a).unwrap(), a);
    }

    #[test]
    fn float_bounds_follow_the_same_rule() {
        let got = Node::abstract_float(Some(0.0), None).intersect(&Node::abstract_float(None, Some(10.0))).unwrap();
        assert_eq!(got, Node::abstract_float(Some(0.0), Some(10.0)));
        assert!(is_conflict(Node::abstract_float(Some(0.0), None).intersect(&Node::abstract_float(Some(0.5), None))));
    }

    #[test]
    fn literal_meets_its_abstract_kind() {
        let five = Node::int(5);
        assert_eq!(five.intersect(&Node::abstract_int(None, None)).unwrap(), five);
        assert_eq!(Node::abstract_int(Some(0), Some(10)).intersect(&five).unwrap(), five);
        assert!(is_conflict(five.intersect(&Node::abstract_int(Some(6), None))));
        assert!(is_conflict(five.intersect(&Node::abstract_float(None, None))));
        assert!(is_conflict(Node::bool(true).intersect(&Node::abstract_int(None, None))));
    }

    #[test]
    fn literals_meet_only_when_equal() {
        assert_eq!(Node::int(5).intersect(&Node::int(5)).unwrap(), Node::int(5));
        assert!(is_conflict(Node::int(5).intersect(&Node::int(6))));
        assert!(is_conflict(Node::int(1).intersect(&Node::float(1.0))));
    }

    #[test]
    fn different_kinds_conflict() {
        assert!(is_conflict(Node::abstract_str().intersect(&Node::abstract_bool())));
        assert!(is_conflict(Node::abstract_str().intersect(&Node::abstract_list(Node::any()))));
        assert!(is_conflict(Node::list(vec![]).intersect(&Node::dict(Vec::<(String, Node)>::new()))));
        assert!(is_conflict(Node::abstract_list(Node::any()).intersect(&Node::dict([("a", Node::int(1))]))));
    }

    #[test]
    fn dicts_need_the_same_keys_in_any_order() {
        let a = Node::dict([("key1", Node::abstract_int(Some(0), None)), ("key2", Node::abstract_str())]);
        let b = Node::dict([("key2", Node::any()), ("key1", Node::abstract_int(None, Some(10)))]);
        let got = a.intersect(&b).unwrap();
        assert_eq!(got, Node::dict([("key1", Node::abstract_int(Some(0), Some(10))), ("key2", Node::abstract_str())]));

        let c = Node::dict([("key1", Node::any()), ("key3", Node::any())]);
        assert!(is_conflict(a.intersect(&c)));
        let d = Node::dict([("key1", Node::any())]);
        assert!(is_conflict(a.intersect(&d)));
    }

    #[test]
    fn lists_need_the_same_length() {
        let a = Node::list(vec![Node::abstract_int(Some(0), None), Node::abstract_str()]);
        let b = Node::list(vec![Node::abstract_int(None, Some(15)), Node::str("x")]);
        assert_eq!(a.intersect(&b).unwrap(), Node::list(vec![Node::abstract_int(Some(0), Some(15)), Node::str("x")]));
        assert!(is_conflict(a.intersect(&Node::list(vec![Node::any()]))));
    }

    #[test]
    fn abstract_containers_merge_their_schemas() {
        let a = Node::abstract_dict(Node::abstract_str(), Node::abstract_int(Some(0), None));
        let b = Node::abstract_dict(Node::any(), Node::abstract_int(None, Some(9)));
        assert_eq!(a.intersect(&b).unwrap(), Node::abstract_dict(Node::abstract_str(), Node::abstract_int(Some(0), Some(9))));

        let a = Node::abstract_list(Node::abstract_int(Some(1), None));
        let b = Node::abstract_list(Node::abstract_int(Some(2), None));
        assert!(is_conflict(a.intersect(&b)));
    }

    #[test]
    fn exact_shapes_are_narrowed_by_homogeneous_ones() {
        let declared = Node::abstract_dict(Node::abstract_str(), Node::abstract_int(None, None));
        let example = Node::dict([("a", Node::int(1)), ("b", Node::int(2))]);
        assert_eq!(declared.intersect(&example).unwrap(), example);
        assert!(is_conflict(declared.intersect(&Node::dict([("a", Node::str("x"))]))));

        let declared = Node::abstract_list(Node::abstract_str());
        let example = Node::list(vec![Node::str("a"), Node::abstract_str()]);
        assert_eq!(example.intersect(&declared).unwrap(), example);
        assert!(is_conflict(declared.intersect(&Node::list(vec![Node::int(1)]))));
    }

    #[test]
    fn unions_pair_positionally() {
        let a = Node::Union(vec![Node::abstract_int(None, Some(5)), Node::abstract_str()]);
        let b = Node::Union(vec![Node::abstract_int(Some(0), None), Node::any()]);
        assert_eq!(a.intersect(&b).unwrap(), Node::Union(vec![Node::abstract_int(Some(0), Some(5)), Node::abstract_str()]));
        assert!(is_conflict(a.intersect(&Node::Union(vec![Node::any()]))));
        assert!(is_conflict(a.intersect(&Node::int(1))));
    }

    #[test]
    fn reconcile_rejects_examples_that_contradict_the_declaration() {
        let declared = Node::dict([("x", Node::abstract_int(Some(0), None)), ("tags", Node::abstract_list(Node::abstract_str()))]);
        let good = PyTree::try_from(json!({"x": 3, "tags": ["a"]})).unwrap();
        let bad = PyTree::try_from(json!({"x": -1, "tags": []})).unwrap();

        let narrowed = reconcile(&declared, std::slice::from_ref(&good)).unwrap();
        assert_eq!(narrowed.len(), 1);
        assert!(narrowed[0].is_concrete());
        assert!(narrowed[0].test(&good));

        assert!(matches!(reconcile(&declared, &[good, bad]), Err(SchemaError::ConflictingConstraint(_))));
    }
}
