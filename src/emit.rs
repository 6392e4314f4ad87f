//! Render a schema tree as a JSON-Schema-style document.
//!
//! The output is for reading, not for feeding a JSON Schema validator: the
//! engine's own `validate` stays authoritative. Non-string dict keys are
//! stringified since JSON objects only have string keys; a dict whose keys
//! collide once stringified is `UnsupportedType`.
use serde_json::{Map, Value, json};

use crate::error::SchemaError;
use crate::node::{AbstractLiteral, Node};
use crate::pytree::{LiteralKind, PyTree, insert_json_entry, json_key};

pub fn emit_schema(node: &Node) -> Result<Value, SchemaError> {
    Ok(match node {
        Node::Literal(lit) => json!({
            "type": json_type(lit.kind()),
            "const": PyTree::from(lit.clone()).to_json()?,
        }),
        Node::Abstract(a) => emit_abstract(a),
        Node::Dict(m) => {
            let mut properties = Map::new();
            for (k, v) in m {
                insert_json_entry(&mut properties, k, emit_schema(v)?)?;
            }
            let required: Vec<Value> = m.keys().map(|k| Value::from(json_key(k))).collect();
            json!({
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
            })
        }
        Node::List(xs) => json!({
            "type": "array",
            "prefixItems": emit_all(xs)?,
            "minItems": xs.len(),
            "maxItems": xs.len(),
        }),
        Node::AbstractDict { key, value } => json!({
            "type": "object",
            "propertyNames": emit_schema(key)?,
            "additionalProperties": emit_schema(value)?,
        }),
        Node::AbstractList(item) => json!({
            "type": "array",
            "items": emit_schema(item)?,
        }),
        Node::Union(xs) => json!({ "anyOf": emit_all(xs)? }),
    })
}

fn emit_all(xs: &[Node]) -> Result<Vec<Value>, SchemaError> {
    xs.iter().map(emit_schema).collect()
}

fn emit_abstract(a: &AbstractLiteral) -> Value {
    let mut out = Map::new();
    match a {
        // the empty schema accepts every instance
        AbstractLiteral::Any => {}
        AbstractLiteral::Int { min, max } => {
            out.insert("type".into(), json!("integer"));
            if let Some(lo) = min { out.insert("minimum".into(), json!(lo)); }
            if let Some(hi) = max { out.insert("maximum".into(), json!(hi)); }
        }
        AbstractLiteral::Float { min, max } => {
            out.insert("type".into(), json!("number"));
            if let Some(lo) = min { out.insert("minimum".into(), json!(lo.0)); }
            if let Some(hi) = max { out.insert("maximum".into(), json!(hi.0)); }
        }
        AbstractLiteral::Str => {
            out.insert("type".into(), json!("string"));
        }
        AbstractLiteral::Bool => {
            out.insert("type".into(), json!("boolean"));
        }
    }
    Value::Object(out)
}

fn json_type(kind: LiteralKind) -> &'static str {
    match kind {
        LiteralKind::Int => "integer",
        LiteralKind::Float => "number",
        LiteralKind::Str => "string",
        LiteralKind::Bool => "boolean",
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves() {
        assert_eq!(emit_schema(&Node::int(3)).unwrap(), json!({"type": "integer", "const": 3}));
        assert_eq!(emit_schema(&Node::str("a")).unwrap(), json!({"type": "string", "const": "a"}));
        assert_eq!(
            emit_schema(&Node::abstract_int(Some(0), None)).unwrap(),
            json!({"type": "integer", "minimum": 0})
        );
        assert_eq!(
            emit_schema(&Node::abstract_float(None, Some(1.5))).unwrap(),
            json!({"type": "number", "maximum": 1.5})
        );
        assert_eq!(emit_schema(&Node::any()).unwrap(), json!({}));
    }

    #[test]
    fn exact_dict_requires_every_key() {
        let node = Node::dict([("name", Node::abstract_str()), ("age", Node::abstract_int(Some(0), None))]);
        assert_eq!(
            emit_schema(&node).unwrap(),
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "age": {"type": "integer", "minimum": 0},
                },
                "required": ["name", "age"],
                "additionalProperties": false,
            })
        );
    }

    #[test]
    fn keys_that_collide_once_stringified_are_rejected() {
        let node = Node::dict_from_nodes([(Node::int(1), Node::abstract_int(None, None)), (Node::str("1"), Node::abstract_str())])
            .unwrap();
        assert!(matches!(emit_schema(&node), Err(SchemaError::UnsupportedType(_))));

        let node = Node::dict_from_nodes([(Node::int(1), Node::abstract_int(None, None)), (Node::str("a"), Node::abstract_str())])
            .unwrap();
        let doc = emit_schema(&node).unwrap();
        assert_eq!(doc["required"], json!(["1", "a"]));
        assert_eq!(doc["properties"]["1"], json!({"type": "integer"}));
    }

    #[test]
    fn containers_and_unions() {
        let node = Node::Union(vec![
            Node::abstract_list(Node::abstract_bool()),
            Node::abstract_dict(Node::abstract_str(), Node::list(vec![Node::int(1)])),
        ]);
        assert_eq!(
            emit_schema(&node).unwrap(),
            json!({"anyOf": [
                {"type": "array", "items": {"type": "boolean"}},
                {
                    "type": "object",
                    "propertyNames": {"type": "string"},
                    "additionalProperties": {
                        "type": "array",
                        "prefixItems": [{"type": "integer", "const": 1}],
                        "minItems": 1,
                        "maxItems": 1,
                    },
                },
            ]})
        );
    }
}
