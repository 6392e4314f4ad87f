//! Schema trees for pytrees: nested lists and dicts over int, float, str and
//! bool leaves.
//!
//! Schemas are derived from annotations or example values, checked against
//! values, intersected to reconcile a declared schema with observed data, and
//! rewritten by named transforms into alternate renderings.
pub mod pytree;
pub mod node;
pub mod error;
pub mod registry;
pub mod validate;
pub mod intersect;
pub mod walk;
pub mod transform;
pub mod derive;
pub mod emit;

pub use derive::{Annotation, from_annotation, from_value, signature_schema};
pub use emit::emit_schema;
pub use error::{PathSegment, SchemaError, ValidationFailure};
pub use intersect::reconcile;
pub use node::{AbstractLiteral, Node, NodeKind};
pub use pytree::{Literal, LiteralKind, PyTree, ValueType};
pub use registry::{Marker, Registry, TypeKey};
pub use transform::{TransformCall, TransformFn, Variants};
pub use walk::Walk;
