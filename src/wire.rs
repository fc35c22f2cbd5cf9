//! Structured (JSON) encoding of expression trees.
//!
//! Every node is an object with a `type` of `MATCH`, `AND`, `OR` or `NOT` and
//! only the fields that variant uses, in this order:
//!
//! ```text
//! type, left, right, key, op, value, values
//! ```
//!
//! `NOT` keeps its operand under `right`, which is what other implementations
//! of the format read.

use std::fmt;

use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, Visitor};
use serde::{Serialize, Serializer};

use crate::error::DecodeError;
use crate::expr::{Expr, ExprKind, MatchOp, MatchValue, MAX_DEPTH};
use crate::scanner::Scanner;

#[derive(Serialize)]
struct EncodedExpr<'a> {
    #[serde(rename = "type")]
    kind: ExprKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    left: Option<Box<EncodedExpr<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    right: Option<Box<EncodedExpr<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    op: Option<MatchOp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    values: Option<&'a [String]>,
}

impl<'a> EncodedExpr<'a> {
    fn node(kind: ExprKind) -> Self {
        EncodedExpr { kind, left: None, right: None, key: None, op: None, value: None, values: None }
    }

    fn child(expr: &'a Expr) -> Option<Box<Self>> {
        Some(Box::new(EncodedExpr::from(expr)))
    }
}

impl<'a> From<&'a Expr> for EncodedExpr<'a> {
    fn from(expr: &'a Expr) -> Self {
        let mut node = EncodedExpr::node(expr.kind());
        match expr {
            Expr::Match { key, op, value } => {
                node.key = Some(key.as_str());
                node.op = Some(*op);
                match value {
                    MatchValue::Single(value) => node.value = Some(value.as_str()),
                    MatchValue::List(values) => node.values = Some(values.as_slice()),
                }
            }
            Expr::And { left, right } | Expr::Or { left, right } => {
                node.left = EncodedExpr::child(left);
                node.right = EncodedExpr::child(right);
            }
            Expr::Not { operand } => node.right = EncodedExpr::child(operand),
        }
        node
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        EncodedExpr::from(self).serialize(serializer)
    }
}

/// Pretty-printed (two-space indent) JSON for `expr`. Output is deterministic.
pub fn to_json(expr: &Expr) -> String {
    // only strings and objects nested no deeper than the tree, so serde_json
    // has nothing to reject; parsed and decoded trees stay within MAX_DEPTH
    serde_json::to_string_pretty(expr).expect("expression trees always encode")
}

struct DecodedExpr {
    kind: ExprKind,
    left: Option<Box<DecodedExpr>>,
    right: Option<Box<DecodedExpr>>,
    key: Option<String>,
    op: Option<String>,
    value: Option<String>,
    values: Option<Vec<String>>,
}

impl DecodedExpr {
    fn forbid(&self, field: &'static str, present: bool) -> Result<(), DecodeError> {
        if present {
            return Err(DecodeError::UnexpectedField { kind: self.kind, field })
        }
        Ok(())
    }

    fn forbid_match_fields(&self) -> Result<(), DecodeError> {
        self.forbid("key", self.key.is_some())?;
        self.forbid("op", self.op.is_some())?;
        self.forbid("value", self.value.is_some())?;
        self.forbid("values", self.values.is_some())
    }

    fn require<T>(kind: ExprKind, field: &'static str, value: Option<T>) -> Result<T, DecodeError> {
        value.ok_or(DecodeError::MissingField { kind, field })
    }

    fn decode_child(kind: ExprKind, field: &'static str, child: Option<Box<DecodedExpr>>) -> Result<Box<Expr>, DecodeError> {
        let child = Self::require(kind, field, child)?;
        Ok(Box::new(Expr::try_from(*child)?))
    }
}

impl TryFrom<DecodedExpr> for Expr {
    type Error = DecodeError;

    fn try_from(node: DecodedExpr) -> Result<Self, Self::Error> {
        let kind = node.kind;
        match kind {
            ExprKind::Match => {
                node.forbid("left", node.left.is_some())?;
                node.forbid("right", node.right.is_some())?;

                let key = DecodedExpr::require(kind, "key", node.key)?;
                if !Scanner::is_identifier(&key) {
                    return Err(DecodeError::InvalidKey(key))
                }
                let op = match DecodedExpr::require(kind, "op", node.op)?.as_str() {
                    ":" => MatchOp::Colon,
                    ":=" => MatchOp::Assign,
                    other => return Err(DecodeError::InvalidOperator(other.to_string())),
                };
                let value = match (node.value, node.values) {
                    (Some(_), Some(_)) => return Err(DecodeError::ConflictingValues),
                    (Some(value), None) => MatchValue::Single(value),
                    (None, Some(values)) if values.is_empty() => return Err(DecodeError::EmptyValues),
                    (None, Some(values)) => MatchValue::List(values),
                    (None, None) => return Err(DecodeError::MissingField { kind, field: "value" }),
                };
                Ok(Expr::Match { key, op, value })
            }
            ExprKind::And | ExprKind::Or => {
                node.forbid_match_fields()?;
                let left = DecodedExpr::decode_child(kind, "left", node.left)?;
                let right = DecodedExpr::decode_child(kind, "right", node.right)?;
                if kind == ExprKind::And {
                    Ok(Expr::And { left, right })
                } else {
                    Ok(Expr::Or { left, right })
                }
            }
            ExprKind::Not => {
                node.forbid_match_fields()?;
                node.forbid("left", node.left.is_some())?;
                let operand = DecodedExpr::decode_child(kind, "right", node.right)?;
                Ok(Expr::Not { operand })
            }
        }
    }
}

const FIELDS: &[&str] = &["type", "left", "right", "key", "op", "value", "values"];

/// Reads one node object; `depth` is the level of that node, the root being 1.
/// Rejects documents deeper than `MAX_DEPTH` before recursing further.
struct NodeSeed {
    depth: usize,
}

impl<'de> DeserializeSeed<'de> for NodeSeed {
    type Value = DecodedExpr;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<DecodedExpr, D::Error> {
        if self.depth > MAX_DEPTH {
            return Err(de::Error::custom(format!("expression nested deeper than {} levels", MAX_DEPTH)))
        }
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for NodeSeed {
    type Value = DecodedExpr;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an expression object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<DecodedExpr, A::Error> {
        let (mut kind, mut left, mut right) = (None, None, None);
        let (mut key, mut op, mut value, mut values) = (None, None, None, None);

        while let Some(field) = map.next_key::<String>()? {
            let duplicate = match field.as_str() {
                "type" => kind.replace(map.next_value::<ExprKind>()?).is_some(),
                "left" => left.replace(map.next_value_seed(NodeSeed { depth: self.depth + 1 })?).is_some(),
                "right" => right.replace(map.next_value_seed(NodeSeed { depth: self.depth + 1 })?).is_some(),
                "key" => key.replace(map.next_value::<String>()?).is_some(),
                "op" => op.replace(map.next_value::<String>()?).is_some(),
                "value" => value.replace(map.next_value::<String>()?).is_some(),
                "values" => values.replace(map.next_value::<Vec<String>>()?).is_some(),
                other => return Err(de::Error::unknown_field(other, FIELDS)),
            };
            if duplicate {
                let name = FIELDS.iter().find(|name| **name == field).copied().unwrap_or("type");
                return Err(de::Error::duplicate_field(name))
            }
        }

        Ok(DecodedExpr {
            kind: kind.ok_or_else(|| <A::Error as de::Error>::missing_field("type"))?,
            left: left.map(Box::new),
            right: right.map(Box::new),
            key,
            op,
            value,
            values,
        })
    }
}

/// Rebuilds an expression from the JSON produced by [`to_json`], checking
/// every node for the fields its type requires.
pub fn from_json(json: &str) -> Result<Expr, DecodeError> {
    let mut deserializer = serde_json::Deserializer::from_str(json);
    // NodeSeed bounds the depth instead of serde_json's fixed limit of 128
    deserializer.disable_recursion_limit();
    let node = NodeSeed { depth: 1 }.deserialize(&mut deserializer)?;
    deserializer.end()?;
    Expr::try_from(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::MatchOp::{Assign, Colon};

    #[test]
    fn test_match_encoding_omits_unused_fields() {
        let json = to_json(&Expr::single("status", Colon, "active"));
        assert_eq!(json, "{\n  \"type\": \"MATCH\",\n  \"key\": \"status\",\n  \"op\": \":\",\n  \"value\": \"active\"\n}");

        let json = to_json(&Expr::list("tags", Assign, &["a", "b"]));
        assert_eq!(
            json,
            "{\n  \"type\": \"MATCH\",\n  \"key\": \"tags\",\n  \"op\": \":=\",\n  \"values\": [\n    \"a\",\n    \"b\"\n  ]\n}"
        );
    }

    #[test]
    fn test_empty_value_is_kept() {
        let json = to_json(&Expr::single("a", Colon, ""));
        assert!(json.contains("\"value\": \"\""), "{}", json);
    }

    #[test]
    fn test_not_uses_right() {
        let value = serde_json::to_value(Expr::not(Expr::single("a", Colon, "1"))).unwrap();
        assert_eq!(value["type"], "NOT");
        assert!(value.get("left").is_none());
        assert_eq!(value["right"]["type"], "MATCH");
        assert_eq!(value["right"]["key"], "a");
    }

    #[test]
    fn test_decode_rejects_broken_nodes() {
        let cases = vec![
            r#"{"type":"MATCH","op":":","value":"v"}"#,
            r#"{"type":"MATCH","key":"9x","op":":","value":"v"}"#,
            r#"{"type":"MATCH","key":"k","op":"=","value":"v"}"#,
            r#"{"type":"MATCH","key":"k","op":":"}"#,
            r#"{"type":"MATCH","key":"k","op":":","value":"v","values":["w"]}"#,
            r#"{"type":"MATCH","key":"k","op":":","values":[]}"#,
            r#"{"type":"MATCH","key":"k","op":":","value":"v","left":{"type":"MATCH","key":"k","op":":","value":"v"}}"#,
            r#"{"type":"AND","left":{"type":"MATCH","key":"k","op":":","value":"v"}}"#,
            r#"{"type":"OR","key":"k","left":{"type":"MATCH","key":"k","op":":","value":"v"},"right":{"type":"MATCH","key":"k","op":":","value":"v"}}"#,
            r#"{"type":"NOT"}"#,
            r#"{"type":"NOT","left":{"type":"MATCH","key":"k","op":":","value":"v"},"right":{"type":"MATCH","key":"k","op":":","value":"v"}}"#,
            r#"{"type":"XOR"}"#,
            r#"{"type":"MATCH","key":"k","op":":","value":"v","extra":1}"#,
            r#"not json"#,
        ];

        for case in cases {
            let result = from_json(case);
            assert!(result.is_err(), "Expected decode to fail. Input: {}, Got: {:?}", case, result);
        }
    }

    #[test]
    fn test_decode_error_kinds() {
        assert!(matches!(
            from_json(r#"{"type":"NOT"}"#),
            Err(DecodeError::MissingField { kind: ExprKind::Not, field: "right" })
        ));
        assert!(matches!(
            from_json(r#"{"type":"MATCH","key":"k","op":"~","value":"v"}"#),
            Err(DecodeError::InvalidOperator(op)) if op == "~"
        ));
        assert!(matches!(from_json("[]"), Err(DecodeError::Json(_))));
        assert!(matches!(
            from_json(r#"{"type":"MATCH","type":"AND"}"#),
            Err(DecodeError::Json(e)) if e.to_string().contains("duplicate field `type`")
        ));
    }

    fn nested_nots(depth: usize) -> String {
        let leaf = r#"{"type":"MATCH","key":"k","op":":","value":"v"}"#;
        format!("{}{}{}", r#"{"type":"NOT","right":"#.repeat(depth - 1), leaf, "}".repeat(depth - 1))
    }

    #[test]
    fn test_decode_depth_limit() {
        let expr = from_json(&nested_nots(MAX_DEPTH)).unwrap();
        assert_eq!(expr.kind(), ExprKind::Not);

        let error = from_json(&nested_nots(MAX_DEPTH + 1)).unwrap_err();
        assert!(error.to_string().contains("nested deeper than 256 levels"), "{}", error);
        assert!(from_json(&nested_nots(100_000)).is_err());
    }

    #[test]
    fn test_long_chain_round_trips() {
        let mut expr = Expr::single("k0", Colon, "0");
        for i in 1..MAX_DEPTH {
            expr = Expr::and(expr, Expr::single(&format!("k{}", i), Colon, &i.to_string()));
        }
        assert_eq!(from_json(&to_json(&expr)).unwrap(), expr);
    }
}
