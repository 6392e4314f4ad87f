//! Type registry: dispatch from a runtime value type or an abstract marker to
//! the node constructor for it, plus the `(kind, name)` transform table.
//!
//! Resolution is exact. A missing entry is always `UnsupportedType`, never a
//! fallback. The built-in registry is assembled once on first use and is
//! read-only afterwards, so lookups need no synchronization.
use std::fmt;
use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::error::SchemaError;
use crate::node::{Node, NodeKind};
use crate::pytree::{Literal, PyTree, ValueType};
use crate::transform::{self, TransformFn};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Abstract type marker, the annotation-side counterpart of `ValueType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Int,
    Float,
    Str,
    Bool,
    Any,
    List,
    Dict,
    Union,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Concrete(ValueType),
    Abstract(Marker),
}

/// Lowers a concrete value to its exact-match node. Gets the registry back so
/// containers can resolve their children.
pub type ConcreteCtor = fn(&Registry, &PyTree) -> Result<Node, SchemaError>;

/// Builds an abstract node from already-lowered children.
pub type AbstractCtor = fn(Vec<Node>) -> Result<Node, SchemaError>;

#[derive(Default)]
pub struct Registry {
    concrete: IndexMap<ValueType, ConcreteCtor>,
    abstract_: IndexMap<Marker, AbstractCtor>,
    transforms: IndexMap<NodeKind, IndexMap<&'static str, TransformFn>>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Marker {
    pub fn name(self) -> &'static str {
        match self {
            Marker::Int => "int",
            Marker::Float => "float",
            Marker::Str => "str",
            Marker::Bool => "bool",
            Marker::Any => "Any",
            Marker::List => "List",
            Marker::Dict => "Dict",
            Marker::Union => "Union",
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKey::Concrete(t) => write!(f, "value type `{}`", t.name()),
            TypeKey::Abstract(m) => write!(f, "abstract marker `{}`", m.name()),
        }
    }
}

static BUILTIN: Lazy<Registry> = Lazy::new(|| {
    // a clash here is a bug in the table below, not a runtime condition
    match Registry::with_builtins() {
        Ok(registry) => registry,
        Err(error) => panic!("built-in schema registry is inconsistent: {error}"),
    }
});

impl Registry {
    /// An empty registry. Every resolution fails until something is registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry with every built-in node kind and transform.
    pub fn builtin() -> &'static Registry {
        &BUILTIN
    }

    /// A fresh registry holding the built-in tables; extend it with custom transforms.
    pub fn with_builtins() -> Result<Self, SchemaError> {
        let mut r = Self::new();

        r.register_concrete(ValueType::Int, lower_leaf)?;
        r.register_concrete(ValueType::Float, lower_leaf)?;
        r.register_concrete(ValueType::Str, lower_leaf)?;
        r.register_concrete(ValueType::Bool, lower_leaf)?;
        r.register_concrete(ValueType::List, lower_list)?;
        r.register_concrete(ValueType::Dict, lower_dict)?;

        r.register_abstract(Marker::Int, |xs| bare(xs, Marker::Int, Node::abstract_int(None, None)))?;
        r.register_abstract(Marker::Float, |xs| bare(xs, Marker::Float, Node::abstract_float(None, None)))?;
        r.register_abstract(Marker::Str, |xs| bare(xs, Marker::Str, Node::abstract_str()))?;
        r.register_abstract(Marker::Bool, |xs| bare(xs, Marker::Bool, Node::abstract_bool()))?;
        r.register_abstract(Marker::Any, |xs| bare(xs, Marker::Any, Node::any()))?;
        r.register_abstract(Marker::List, build_abstract_list)?;
        r.register_abstract(Marker::Dict, build_abstract_dict)?;
        r.register_abstract(Marker::Union, Node::union)?;

        transform::register_builtin_transforms(&mut r)?;

        tracing::debug!(
            concrete = r.concrete.len(),
            abstract_ = r.abstract_.len(),
            transforms = r.transforms.values().map(IndexMap::len).sum::<usize>(),
            "schema registry assembled"
        );
        Ok(r)
    }

    pub fn register_concrete(&mut self, key: ValueType, ctor: ConcreteCtor) -> Result<(), SchemaError> {
        if self.concrete.contains_key(&key) {
            return Err(SchemaError::DuplicateRegistration(TypeKey::Concrete(key).to_string()));
        }
        self.concrete.insert(key, ctor);
        Ok(())
    }

    pub fn register_abstract(&mut self, key: Marker, ctor: AbstractCtor) -> Result<(), SchemaError> {
        if self.abstract_.contains_key(&key) {
            return Err(SchemaError::DuplicateRegistration(TypeKey::Abstract(key).to_string()));
        }
        self.abstract_.insert(key, ctor);
        Ok(())
    }

    pub fn register_transform(
        &mut self,
        kind: NodeKind,
        name: &'static str,
        operand: TransformFn,
    ) -> Result<(), SchemaError> {
        let table = self.transforms.entry(kind).or_default();
        if table.contains_key(name) {
            return Err(SchemaError::DuplicateRegistration(format!(
                "transform `{name}` for {} nodes",
                kind.name()
            )));
        }
        table.insert(name, operand);
        Ok(())
    }

    pub fn contains(&self, key: TypeKey) -> bool {
        match key {
            TypeKey::Concrete(t) => self.concrete.contains_key(&t),
            TypeKey::Abstract(m) => self.abstract_.contains_key(&m),
        }
    }

    pub fn resolve_concrete(&self, value: &PyTree) -> Result<ConcreteCtor, SchemaError> {
        let key = value.value_type();
        self.concrete.get(&key).copied().ok_or_else(|| {
            SchemaError::UnsupportedType(format!("no node registered for {}", TypeKey::Concrete(key)))
        })
    }

    pub fn resolve_abstract(&self, marker: Marker) -> Result<AbstractCtor, SchemaError> {
        self.abstract_.get(&marker).copied().ok_or_else(|| {
            SchemaError::UnsupportedType(format!("no node registered for {}", TypeKey::Abstract(marker)))
        })
    }

    /// Explicit optional lookup; the caller decides what a miss means.
    pub fn lookup_transform(&self, kind: NodeKind, name: &str) -> Option<TransformFn> {
        self.transforms.get(&kind).and_then(|table| table.get(name)).copied()
    }

    /// Named transforms registered for a kind, in registration order.
    pub fn transform_names(&self, kind: NodeKind) -> Vec<&'static str> {
        self.transforms
            .get(&kind)
            .map(|table| table.keys().copied().collect())
            .unwrap_or_default()
    }
}

// ------------------------------ Constructors ------------------------------ //

fn lower_leaf(_: &Registry, value: &PyTree) -> Result<Node, SchemaError> {
    value
        .to_literal()
        .map(Node::Literal)
        .ok_or_else(|| SchemaError::UnsupportedType(format!("`{value}` is not a literal")))
}

fn lower_list(registry: &Registry, value: &PyTree) -> Result<Node, SchemaError> {
    let PyTree::List(xs) = value else {
        return Err(SchemaError::UnsupportedType(format!("`{value}` is not a list")));
    };
    xs.iter()
        .map(|x| registry.from_value(x))
        .collect::<Result<Vec<_>, _>>()
        .map(Node::List)
}

fn lower_dict(registry: &Registry, value: &PyTree) -> Result<Node, SchemaError> {
    let PyTree::Dict(m) = value else {
        return Err(SchemaError::UnsupportedType(format!("`{value}` is not a dict")));
    };
    let mut out = IndexMap::<Literal, Node>::with_capacity(m.len());
    for (k, v) in m {
        out.insert(k.clone(), registry.from_value(v)?);
    }
    Ok(Node::Dict(out))
}

fn bare(children: Vec<Node>, marker: Marker, node: Node) -> Result<Node, SchemaError> {
    if !children.is_empty() {
        return Err(SchemaError::MalformedSchema(format!(
            "`{}` takes no type arguments, got {}",
            marker.name(),
            children.len()
        )));
    }
    Ok(node)
}

fn build_abstract_list(children: Vec<Node>) -> Result<Node, SchemaError> {
    let [item]: [Node; 1] = children.try_into().map_err(|xs: Vec<Node>| {
        SchemaError::MalformedSchema(format!("`List` takes 1 item schema, got {}", xs.len()))
    })?;
    Ok(Node::abstract_list(item))
}

fn build_abstract_dict(children: Vec<Node>) -> Result<Node, SchemaError> {
    let [key, value]: [Node; 2] = children.try_into().map_err(|xs: Vec<Node>| {
        SchemaError::MalformedSchema(format!("`Dict` takes a key and a value schema, got {}", xs.len()))
    })?;
    Ok(Node::abstract_dict(key, value))
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_every_builtin_value_type() {
        let r = Registry::builtin();
        for t in [ValueType::Int, ValueType::Float, ValueType::Str, ValueType::Bool, ValueType::List, ValueType::Dict] {
            assert!(r.contains(TypeKey::Concrete(t)), "{}", t.name());
        }
        let ctor = r.resolve_concrete(&PyTree::Int(3)).unwrap();
        assert_eq!(ctor(r, &PyTree::Int(3)).unwrap(), Node::int(3));
    }

    #[test]
    fn resolves_every_builtin_marker() {
        let r = Registry::builtin();
        let ctor = r.resolve_abstract(Marker::Int).unwrap();
        assert_eq!(ctor(vec![]).unwrap(), Node::abstract_int(None, None));
        let ctor = r.resolve_abstract(Marker::Any).unwrap();
        assert_eq!(ctor(vec![]).unwrap(), Node::any());
        let ctor = r.resolve_abstract(Marker::Union).unwrap();
        assert_eq!(ctor(vec![Node::abstract_str()]).unwrap(), Node::Union(vec![Node::abstract_str()]));
    }

    #[test]
    fn empty_registry_surfaces_unsupported_type() {
        let r = Registry::new();
        assert!(matches!(r.resolve_concrete(&PyTree::Bool(true)), Err(SchemaError::UnsupportedType(_))));
        assert!(matches!(r.resolve_abstract(Marker::Str), Err(SchemaError::UnsupportedType(_))));
    }

    #[test]
    fn re_registration_is_rejected() {
        let mut r = Registry::new();
        r.register_concrete(ValueType::Int, lower_leaf).unwrap();
        let err = r.register_concrete(ValueType::Int, lower_leaf).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateRegistration(_)));

        r.register_abstract(Marker::List, build_abstract_list).unwrap();
        assert!(r.register_abstract(Marker::List, build_abstract_list).is_err());
        // markers and value types are separate key spaces
        assert!(r.register_abstract(Marker::Int, |_| Ok(Node::any())).is_ok());
    }

    #[test]
    fn abstract_ctors_check_their_arity() {
        let r = Registry::builtin();
        let list = r.resolve_abstract(Marker::List).unwrap();
        assert!(matches!(list(vec![]), Err(SchemaError::MalformedSchema(_))));
        let dict = r.resolve_abstract(Marker::Dict).unwrap();
        assert!(matches!(dict(vec![Node::abstract_str()]), Err(SchemaError::MalformedSchema(_))));
        let int = r.resolve_abstract(Marker::Int).unwrap();
        assert!(matches!(int(vec![Node::any()]), Err(SchemaError::MalformedSchema(_))));
        let union = r.resolve_abstract(Marker::Union).unwrap();
        assert!(matches!(union(vec![]), Err(SchemaError::MalformedSchema(_))));
    }

    #[test]
    fn builtin_transforms_are_listed_per_kind() {
        let r = Registry::builtin();
        assert_eq!(r.transform_names(NodeKind::Union), vec![transform::SPLIT_TREES_ON_OPTIONS]);
        assert!(r.transform_names(NodeKind::Int).contains(&transform::CONVERT_TO_UNBOUND_SCHEMA));
        assert!(r.transform_names(NodeKind::Dict).is_empty());
        assert!(r.lookup_transform(NodeKind::Dict, "nope").is_none());
    }

    #[test]
    fn nodes_and_registry_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Node>();
        assert_send_sync::<PyTree>();
        assert_send_sync::<Registry>();
        assert_send_sync::<&'static Registry>();
    }

    #[test]
    fn builtin_registry_serves_concurrent_readers() {
        let r: &'static Registry = Registry::builtin();
        let schema = Node::abstract_list(Node::Union(vec![Node::abstract_int(Some(0), None), Node::abstract_str()]));
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..8i64)
                .map(|i| {
                    let schema = &schema;
                    s.spawn(move || {
                        let value = PyTree::List(vec![PyTree::Int(i), PyTree::Str(i.to_string())]);
                        let derived = r.from_value(&value).unwrap();
                        assert!(derived.test(&value));
                        assert!(schema.validate(&value).is_ok());
                        r.transform(schema, transform::SPLIT_TREES_ON_OPTIONS, &serde_json::Value::Null).count()
                    })
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), 2);
            }
        });
    }
}
