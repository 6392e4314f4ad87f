//! Schema derivation: lower a structural annotation or a concrete value to a
//! schema tree. Both paths go through the registry, so a missing registration
//! surfaces as `UnsupportedType` rather than a silent default.
use std::fmt;
use std::str::FromStr;

use crate::error::SchemaError;
use crate::node::Node;
use crate::pytree::{Literal, PyTree};
use crate::registry::{Marker, Registry};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// The structural annotation alphabet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    Int,
    Float,
    Str,
    Bool,
    Any,
    /// alternative-of
    Union(Vec<Annotation>),
    /// homogeneous-sequence-of
    List(Box<Annotation>),
    /// homogeneous-mapping-of
    Dict(Box<Annotation>, Box<Annotation>),
    /// A name outside the alphabet, kept so lowering can report it.
    Opaque(String),
}

// ————————————————————————————————————————————————————————————————————————————
// LOWERING
// ————————————————————————————————————————————————————————————————————————————

impl Registry {
    pub fn from_annotation(&self, annotation: &Annotation) -> Result<Node, SchemaError> {
        let (marker, args): (Marker, Vec<&Annotation>) = match annotation {
            Annotation::Int => (Marker::Int, vec![]),
            Annotation::Float => (Marker::Float, vec![]),
            Annotation::Str => (Marker::Str, vec![]),
            Annotation::Bool => (Marker::Bool, vec![]),
            Annotation::Any => (Marker::Any, vec![]),
            Annotation::Union(xs) => (Marker::Union, xs.iter().collect()),
            Annotation::List(item) => (Marker::List, vec![item.as_ref()]),
            Annotation::Dict(k, v) => (Marker::Dict, vec![k.as_ref(), v.as_ref()]),
            Annotation::Opaque(name) => {
                return Err(SchemaError::UnsupportedType(format!("annotation `{name}` is not supported")));
            }
        };
        let ctor = self.resolve_abstract(marker)?;
        let children = args
            .into_iter()
            .map(|a| self.from_annotation(a))
            .collect::<Result<Vec<_>, _>>()?;
        ctor(children)
    }

    pub fn from_value(&self, value: &PyTree) -> Result<Node, SchemaError> {
        let ctor = self.resolve_concrete(value)?;
        ctor(self, value)
    }
}

/// Lower an annotation to its abstract schema with the built-in registry.
pub fn from_annotation(annotation: &Annotation) -> Result<Node, SchemaError> {
    Registry::builtin().from_annotation(annotation)
}

/// Lower a value to the tightest exact-match schema with the built-in registry.
pub fn from_value(value: &PyTree) -> Result<Node, SchemaError> {
    Registry::builtin().from_value(value)
}

/// Schema for a call signature: a dict keyed by parameter name whose values
/// are the lowered parameter annotations.
pub fn signature_schema<'a, I>(params: I) -> Result<Node, SchemaError>
where
    I: IntoIterator<Item = (&'a str, &'a Annotation)>,
{
    let entries = params
        .into_iter()
        .map(|(name, annotation)| Ok((Node::Literal(Literal::Str(name.to_string())), from_annotation(annotation)?)))
        .collect::<Result<Vec<_>, SchemaError>>()?;
    Node::dict_from_nodes(entries)
}

// ————————————————————————————————————————————————————————————————————————————
// PARSING
// ————————————————————————————————————————————————————————————————————————————

// Grammar:
//   annotation := NAME ( '[' annotation ( ',' annotation )* ']' )?
// Known generic names with the wrong number of arguments are rejected here;
// unknown names become `Opaque` and are rejected by lowering.

impl FromStr for Annotation {
    type Err = SchemaError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let mut p = Parser { src, pos: 0 };
        let out = p.annotation()?;
        p.skip_ws();
        if p.pos != src.len() {
            return Err(p.error("trailing input"));
        }
        Ok(out)
    }
}

struct Parser<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn error(&self, what: &str) -> SchemaError {
        SchemaError::UnsupportedType(format!("cannot parse annotation `{}` at {}: {what}", self.src, self.pos))
    }

    fn name(&mut self) -> Result<&'s str, SchemaError> {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.error("expected a type name"));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn annotation(&mut self) -> Result<Annotation, SchemaError> {
        let name = self.name()?;
        let mut args = Vec::new();
        if self.eat('[') {
            loop {
                args.push(self.annotation()?);
                if self.eat(',') {
                    continue;
                }
                if self.eat(']') {
                    break;
                }
                return Err(self.error("expected `,` or `]`"));
            }
        }
        self.build(name, args)
    }

    fn build(&self, name: &str, args: Vec<Annotation>) -> Result<Annotation, SchemaError> {
        let scalar = args.is_empty();
        let bare = |a: Annotation| if scalar { Ok(a) } else { Err(self.error("scalar types take no arguments")) };
        match name {
            "int" => bare(Annotation::Int),
            "float" => bare(Annotation::Float),
            "str" => bare(Annotation::Str),
            "bool" => bare(Annotation::Bool),
            "Any" | "typing.Any" => bare(Annotation::Any),
            "Union" | "typing.Union" => {
                if args.is_empty() {
                    return Err(self.error("`Union` needs at least one alternative"));
                }
                Ok(Annotation::Union(args))
            }
            "List" | "list" | "typing.List" => {
                let [item]: [Annotation; 1] = args.try_into().map_err(|_| self.error("`List` takes one argument"))?;
                Ok(Annotation::List(Box::new(item)))
            }
            "Dict" | "dict" | "typing.Dict" => {
                let [k, v]: [Annotation; 2] = args.try_into().map_err(|_| self.error("`Dict` takes two arguments"))?;
                Ok(Annotation::Dict(Box::new(k), Box::new(v)))
            }
            other if args.is_empty() => Ok(Annotation::Opaque(other.to_string())),
            other => Ok(Annotation::Opaque(format!("{other}[..]"))),
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Annotation::Int => write!(f, "int"),
            Annotation::Float => write!(f, "float"),
            Annotation::Str => write!(f, "str"),
            Annotation::Bool => write!(f, "bool"),
            Annotation::Any => write!(f, "Any"),
            Annotation::Union(xs) => {
                write!(f, "Union[")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{x}")?;
                }
                write!(f, "]")
            }
            Annotation::List(item) => write!(f, "List[{item}]"),
            Annotation::Dict(k, v) => write!(f, "Dict[{k}, {v}]"),
            Annotation::Opaque(name) => write!(f, "{name}"),
        }
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use proptest::prelude::*;
    use serde_json::json;

    fn parse(src: &str) -> Annotation {
        src.parse().unwrap()
    }

    #[test]
    fn union_of_int_and_list_of_str() {
        let node = from_annotation(&parse("Union[int, List[str]]")).unwrap();
        assert_eq!(
            node,
            Node::Union(vec![Node::abstract_int(None, None), Node::abstract_list(Node::abstract_str())])
        );
        let ok = |v| node.validate(&PyTree::try_from(v).unwrap()).is_ok();
        assert!(ok(json!(5)));
        assert!(ok(json!(["a", "b"])));
        assert!(!ok(json!("a")));
    }

    #[test]
    fn annotation_kinds_lower_to_abstract_nodes() {
        assert_eq!(from_annotation(&Annotation::Float).unwrap(), Node::abstract_float(None, None));
        assert_eq!(from_annotation(&Annotation::Bool).unwrap(), Node::abstract_bool());
        assert_eq!(from_annotation(&Annotation::Any).unwrap(), Node::any());
        assert_eq!(
            from_annotation(&parse("Dict[str, List[float]]")).unwrap(),
            Node::abstract_dict(Node::abstract_str(), Node::abstract_list(Node::abstract_float(None, None)))
        );
    }

    #[test]
    fn unsupported_annotations_are_reported() {
        let err = from_annotation(&parse("Optional[int]")).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedType(_)));
        let err = from_annotation(&parse("List[Tuple]")).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedType(_)));
    }

    #[test]
    fn malformed_annotation_text_is_rejected() {
        for src in ["", "List[int", "Dict[str]", "int[str]", "List[int] x", "Union[]"] {
            assert!(src.parse::<Annotation>().is_err(), "{src:?}");
        }
    }

    #[test]
    fn annotations_print_back_to_their_source() {
        for src in ["int", "Union[int, List[str]]", "Dict[str, Union[bool, Any]]"] {
            assert_eq!(parse(src).to_string(), src);
            assert_eq!(from_annotation(&parse(src)).unwrap().to_string(), src);
        }
        assert_eq!(parse("list[ typing.Any ]"), Annotation::List(Box::new(Annotation::Any)));
    }

    #[test]
    fn lowering_goes_through_the_registry() {
        let empty = Registry::new();
        assert!(matches!(empty.from_annotation(&Annotation::Int), Err(SchemaError::UnsupportedType(_))));
        assert!(matches!(empty.from_value(&PyTree::Int(1)), Err(SchemaError::UnsupportedType(_))));
    }

    #[test]
    fn from_value_builds_the_tightest_tree() {
        let v = PyTree::try_from(json!({"a": 1, "b": "x"})).unwrap();
        let node = from_value(&v).unwrap();
        let Node::Dict(m) = &node else { panic!("expected dict, got {node}") };
        assert_eq!(m.get(&Literal::Str("a".into())), Some(&Node::int(1)));
        assert_eq!(m.get(&Literal::Str("b".into())), Some(&Node::str("x")));
        assert!(node.test(&v));

        let v = PyTree::try_from(json!([1, [2.5, true]])).unwrap();
        let node = from_value(&v).unwrap();
        assert_eq!(node, Node::list(vec![Node::int(1), Node::list(vec![Node::float(2.5), Node::bool(true)])]));
    }

    #[test]
    fn signature_schema_is_a_dict_of_parameters() {
        let x = Annotation::Int;
        let tags = parse("List[str]");
        let node = signature_schema([("x", &x), ("tags", &tags)]).unwrap();
        assert_eq!(node.kind(), NodeKind::Dict);
        assert_eq!(node.to_string(), r#"{"x": int, "tags": List[str]}"#);
        assert!(node.test(&PyTree::try_from(json!({"x": 1, "tags": ["a"]})).unwrap()));

        let bad = Annotation::Opaque("Callable".into());
        assert!(signature_schema([("f", &bad)]).is_err());
    }

    fn literal() -> impl Strategy<Value = Literal> {
        prop_oneof![
            any::<i64>().prop_map(Literal::Int),
            any::<f64>().prop_map(|f| Literal::Float(ordered_float::OrderedFloat(f))),
            "[a-z]{0,6}".prop_map(Literal::Str),
            any::<bool>().prop_map(Literal::Bool),
        ]
    }

    fn pytree() -> impl Strategy<Value = PyTree> {
        literal().prop_map(PyTree::from).prop_recursive(4, 48, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(PyTree::List),
                prop::collection::vec((literal(), inner), 0..4)
                    .prop_map(|entries| PyTree::Dict(entries.into_iter().collect())),
            ]
        })
    }

    proptest::proptest! {
        #[test]
        fn prop_from_value_accepts_its_source(v in pytree()) {
            let node = from_value(&v).unwrap();
            prop_assert!(node.test(&v));
            prop_assert!(node.validate(&v).is_ok());
            prop_assert!(node.is_concrete());
            prop_assert_eq!(node.to_pytree().unwrap(), v);
        }

        #[test]
        fn prop_unbound_schema_still_accepts_its_source(v in pytree()) {
            let node = from_value(&v).unwrap();
            let docs: Vec<Node> = node
                .transform(crate::transform::CONVERT_TO_UNBOUND_SCHEMA, &serde_json::Value::Null)
                .collect();
            prop_assert_eq!(docs.len(), 1);
            prop_assert!(docs[0].test(&v));
        }
    }
}
