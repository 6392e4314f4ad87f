//! Transform engine: named, one-to-many rewrites of a schema tree.
//!
//! Every node kind has a default transform. Leaves yield themselves; containers
//! transform each child with the same call and yield the Cartesian product of
//! the children's variants, each combination rebuilt as a node of the
//! container's kind. The number of trees therefore multiplies with every
//! ambiguous child. That is the point (it enumerates concretizations), and
//! bounding it is up to the caller: the result is lazy across combinations, so
//! `.take(n)` stops early.
use serde_json::Value;

use crate::error::SchemaError;
use crate::node::{Node, NodeKind};
use crate::pytree::Literal;
use crate::registry::Registry;

/// Drop a bound literal to the unbounded abstract node of its kind.
pub const CONVERT_TO_UNBOUND_SCHEMA: &str = "convert_to_unbound_schema";
/// Replace a leaf with a `str` literal naming its type.
pub const VISUALIZE_TYPES: &str = "visualize_types";
/// Yield each alternative of a union as its own tree.
pub const SPLIT_TREES_ON_OPTIONS: &str = "split_trees_on_options";

/// What a transform was asked for. `name` is propagated to children unchanged.
#[derive(Debug, Clone, Copy)]
pub struct TransformCall<'a> {
    pub name: &'a str,
    pub data: &'a Value,
}

pub type Variants<'a> = Box<dyn Iterator<Item = Node> + 'a>;

pub type TransformFn = for<'a> fn(&'a Registry, &'a Node, TransformCall<'a>) -> Variants<'a>;

// ------------------------------- Dispatch --------------------------------- //

impl Registry {
    /// Apply the transform registered as `name` for the node's kind, or the
    /// default transform when there is none. Never fails on an unknown name.
    pub fn transform<'a>(&'a self, node: &'a Node, name: &'a str, data: &'a Value) -> Variants<'a> {
        self.apply(node, TransformCall { name, data })
    }

    pub(crate) fn apply<'a>(&'a self, node: &'a Node, call: TransformCall<'a>) -> Variants<'a> {
        match self.lookup_transform(node.kind(), call.name) {
            Some(operand) => operand(self, node, call),
            None => {
                tracing::trace!(kind = node.kind().name(), name = call.name, "default transform");
                default_transform(self, node, call)
            }
        }
    }
}

impl Node {
    /// Transform through the built-in registry.
    pub fn transform<'a>(&'a self, name: &'a str, data: &'a Value) -> Variants<'a> {
        Registry::builtin().transform(self, name, data)
    }
}

pub fn default_transform<'a>(registry: &'a Registry, node: &'a Node, call: TransformCall<'a>) -> Variants<'a> {
    match node {
        Node::Literal(_) | Node::Abstract(_) => Box::new(std::iter::once(node.clone())),
        Node::Dict(m) => {
            let keys: Vec<&'a Literal> = m.keys().collect();
            let pools = m.values().map(|child| registry.apply(child, call).collect()).collect();
            Box::new(Product::new(pools).map(move |combo| {
                Node::Dict(keys.iter().map(|k| (*k).clone()).zip(combo).collect())
            }))
        }
        Node::List(xs) => {
            let pools = xs.iter().map(|child| registry.apply(child, call).collect()).collect();
            Box::new(Product::new(pools).map(Node::List))
        }
        Node::Union(xs) => {
            let pools = xs.iter().map(|child| registry.apply(child, call).collect()).collect();
            Box::new(Product::new(pools).map(Node::Union))
        }
        Node::AbstractDict { key, value } => {
            let pools = vec![
                registry.apply(key, call).collect(),
                registry.apply(value, call).collect(),
            ];
            Box::new(Product::new(pools).filter_map(|combo| {
                let [k, v]: [Node; 2] = combo.try_into().ok()?;
                Some(Node::abstract_dict(k, v))
            }))
        }
        Node::AbstractList(item) => {
            Box::new(registry.apply(item, call).map(Node::abstract_list))
        }
    }
}

// ------------------------------ Built-ins --------------------------------- //

pub(crate) fn register_builtin_transforms(r: &mut Registry) -> Result<(), SchemaError> {
    for kind in [NodeKind::Int, NodeKind::Float, NodeKind::Str, NodeKind::Bool] {
        r.register_transform(kind, CONVERT_TO_UNBOUND_SCHEMA, unbind_literal)?;
    }
    for kind in [
        NodeKind::Int, NodeKind::Float, NodeKind::Str, NodeKind::Bool,
        NodeKind::AbstractInt, NodeKind::AbstractFloat, NodeKind::AbstractStr,
        NodeKind::AbstractBool, NodeKind::AbstractAny,
    ] {
        r.register_transform(kind, VISUALIZE_TYPES, visualize_types)?;
    }
    r.register_transform(NodeKind::Union, SPLIT_TREES_ON_OPTIONS, split_trees_on_options)?;
    Ok(())
}

fn unbind_literal<'a>(_: &'a Registry, node: &'a Node, _: TransformCall<'a>) -> Variants<'a> {
    match node {
        Node::Literal(lit) => Box::new(std::iter::once(Node::unbound(lit.kind()))),
        other => Box::new(std::iter::once(other.clone())),
    }
}

fn visualize_types<'a>(_: &'a Registry, node: &'a Node, _: TransformCall<'a>) -> Variants<'a> {
    let name = match node {
        Node::Literal(lit) => lit.kind().name(),
        Node::Abstract(a) => a.name(),
        other => other.kind().name(),
    };
    Box::new(std::iter::once(Node::str(name)))
}

fn split_trees_on_options<'a>(registry: &'a Registry, node: &'a Node, call: TransformCall<'a>) -> Variants<'a> {
    match node {
        Node::Union(alternatives) => Box::new(alternatives.iter().flat_map(move |alt| registry.apply(alt, call))),
        other => default_transform(registry, other, call),
    }
}

// ------------------------------- Product ---------------------------------- //

/// Lazy Cartesian product over materialized pools, first pool varying slowest.
/// Zero pools yield one empty combination; any empty pool yields nothing.
struct Product {
    pools: Vec<Vec<Node>>,
    indices: Vec<usize>,
    done: bool,
}

impl Product {
    fn new(pools: Vec<Vec<Node>>) -> Self {
        let done = pools.iter().any(Vec::is_empty);
        let indices = vec![0; pools.len()];
        Self { pools, indices, done }
    }
}

impl Iterator for Product {
    type Item = Vec<Node>;

    fn next(&mut self) -> Option<Vec<Node>> {
        if self.done {
            return None;
        }
        let combo = self
            .indices
            .iter()
            .zip(&self.pools)
            .map(|(&i, pool)| pool[i].clone())
            .collect();

        // odometer step, last position fastest
        let mut pos = self.indices.len();
        loop {
            if pos == 0 {
                self.done = true;
                break;
            }
            pos -= 1;
            self.indices[pos] += 1;
            if self.indices[pos] < self.pools[pos].len() {
                break;
            }
            self.indices[pos] = 0;
        }
        Some(combo)
    }
}

// ------------------------------- Tests ------------------------------------ //
