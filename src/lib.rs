//! Parser for ipx filter expressions such as
//! `status:"active" && (tags:=["a","b"] || !owner:"bob")`.
//!
//! [`parse`] turns the text into an [`Expr`] tree, [`serialize`] encodes the tree
//! as JSON for other consumers and [`deserialize`] reads it back. Evaluating a
//! filter against data is left to the caller.

pub mod error;
pub mod expr;
pub mod parser;
pub mod scanner;
pub mod token_type;
pub mod wire;

pub use error::{DecodeError, LexError, ParseError};
pub use expr::{Expr, ExprKind, MatchOp, MatchValue, MAX_DEPTH};

use parser::Parser;

/// Parses `input` into an expression tree.
///
/// On failure the error's `Display` is a three-line caret diagnostic.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    Parser::new(input)?.parse()
}

/// `Ok(true)` if `input` parses, otherwise the parse error.
pub fn is_valid(input: &str) -> Result<bool, ParseError> {
    parse(input).map(|_| true)
}

/// Encodes `expr` as pretty-printed JSON. Trees from [`parse`] and
/// [`deserialize`] are at most [`MAX_DEPTH`] deep; hand-built trees should be too.
pub fn serialize(expr: &Expr) -> String {
    wire::to_json(expr)
}

/// Reads back an expression encoded by [`serialize`].
pub fn deserialize(json: &str) -> Result<Expr, DecodeError> {
    wire::from_json(json)
}
