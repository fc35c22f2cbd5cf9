//! A recursive descent parser for ipx filter expressions.
//!
//! Grammar of filter syntax:
//!
//! expression -> or_expr
//! or_expr    -> and_expr ( "||" and_expr )*
//! and_expr   -> not_expr ( "&&" not_expr )*
//! not_expr   -> "!" atom | atom
//! atom       -> "(" expression ")" | IDENTIFIER ( ":" | ":=" ) value
//! value      -> STRING | "[" STRING ( "," STRING )* "]"
//!
//! No whitespace is allowed between the operator and the value. Neither
//! parentheses nor the resulting tree may nest deeper than `MAX_DEPTH`.
//!
//! Examples: 'status:"active"', 'tags:=["a","b"]', '!(a:"1" && b:"2") || c:"3"'

use crate::error::ParseError;
use crate::expr::{Expr, MatchOp, MatchValue, MAX_DEPTH};
use crate::scanner::{Scanner, Token};
use crate::token_type::TokenType::*;

/// A parsed expression and the height of its tree.
type Node = (Expr, usize);

/// Pulls tokens from a [`Scanner`] one at a time; only the current and the
/// previous token are kept.
pub struct Parser<'a> {
    source: &'a str,
    scanner: Scanner<'a>,
    current: Token,
    previous: Token,
    nesting: usize, // open parentheses
}

impl<'a> Parser<'a> {

    /// Creates a parser positioned on the first token of `source`.
    pub fn new(source: &'a str) -> Result<Self, ParseError> {
        let mut scanner = Scanner::new(source);
        let current = scanner
            .next_token()
            .map_err(|e| ParseError::from_lex(e, source))?;

        Ok(Parser {
            source,
            scanner,
            previous: current.clone(),
            current,
            nesting: 0,
        })
    }

    /// Parses the whole source into a single expression. Fails on the first error.
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let (expr, _) = self.expression()?;
        if self.current.variant != EOF {
            // Case: missing '&&' or '||'. Ex.: 'a:"1" b:"2"'
            let msg = format!("unexpected trailing token {:?} at position {}", self.current.lexeme, self.current.start);
            return Err(self.error(msg))
        }
        Ok(expr)
    }

    /// Matches production: expression -> or_expr
    fn expression(&mut self) -> Result<Node, ParseError> {
        self.or_expr()
    }

    /// Matches production: or_expr -> and_expr ( "||" and_expr )*
    fn or_expr(&mut self) -> Result<Node, ParseError> {
        let (mut left, mut height) = self.and_expr()?;
        while self.current.variant == Or {
            self.advance()?;
            let (right, right_height) = self.and_expr()?;
            height = self.grow(height.max(right_height))?;
            left = Expr::or(left, right);
        }
        Ok((left, height))
    }

    /// Matches production: and_expr -> not_expr ( "&&" not_expr )*
    fn and_expr(&mut self) -> Result<Node, ParseError> {
        let (mut left, mut height) = self.not_expr()?;
        while self.current.variant == And {
            self.advance()?;
            let (right, right_height) = self.not_expr()?;
            height = self.grow(height.max(right_height))?;
            left = Expr::and(left, right);
        }
        Ok((left, height))
    }

    /// Matches production: not_expr -> "!" atom | atom
    /// '!' applies to the next atom only: '!a:"1" && b:"2"' negates 'a:"1"'.
    fn not_expr(&mut self) -> Result<Node, ParseError> {
        if self.current.variant == Bang {
            self.advance()?;
            let (operand, height) = self.atom()?;
            let height = self.grow(height)?;
            return Ok((Expr::not(operand), height))
        }
        self.atom()
    }

    /// Matches production: atom -> "(" expression ")" | IDENTIFIER ( ":" | ":=" ) value
    fn atom(&mut self) -> Result<Node, ParseError> {
        match self.current.variant {
            LeftParen => {
                if self.nesting >= MAX_DEPTH {
                    return Err(self.error("expression nested too deeply".to_string()))
                }
                self.nesting += 1;
                self.advance()?;
                let node = self.expression()?;
                if self.current.variant != RightParen {
                    let msg = format!("expected ')' at position {}", self.current.start);
                    return Err(self.error(msg))
                }
                self.nesting -= 1;
                self.advance()?;
                Ok(node)
            },
            Identifier => Ok((self.filter()?, 1)),
            _ => {
                let msg = format!("unexpected token {:?} at position {}", self.current.lexeme, self.current.start);
                Err(self.error(msg))
            },
        }
    }

    /// Matches the key, operator and value of a single match.
    /// Ex.: 'owner:"bob"' or 'tags:=["a","b"]'
    fn filter(&mut self) -> Result<Expr, ParseError> {
        let key = self.current.lexeme.clone();
        self.advance()?;

        let op = match self.current.variant {
            Colon => MatchOp::Colon,
            Assign => MatchOp::Assign,
            _ => {
                let msg = format!("expected ':' or ':=' after key {:?} at position {}", key, self.current.start);
                return Err(self.error(msg))
            },
        };
        self.advance()?;

        // 'key: "v"' is rejected, 'key :"v"' is fine
        if self.previous.end != self.current.start {
            let msg = format!("unexpected space between {:?} and value", op.as_str());
            return Err(self.error(msg))
        }

        let value = match self.current.variant {
            Str => {
                let value = self.current.lexeme.clone();
                self.advance()?;
                MatchValue::Single(value)
            },
            LeftBracket => {
                self.advance()?;
                MatchValue::List(self.list()?)
            },
            _ => {
                let msg = format!("expected string or '[' after operator {:?}", op.as_str());
                return Err(self.error(msg))
            },
        };

        Ok(Expr::Match { key, op, value })
    }

    /// Matches STRING ( "," STRING )* "]" after the opening bracket.
    /// Ex.: '"a","b"]'
    fn list(&mut self) -> Result<Vec<String>, ParseError> {
        let mut values = Vec::new();
        loop {
            if self.current.variant != Str {
                let msg = format!("expected string inside list at position {}", self.current.start);
                return Err(self.error(msg))
            }
            values.push(self.current.lexeme.clone());
            self.advance()?;

            match self.current.variant {
                Comma => self.advance()?,
                RightBracket => {
                    self.advance()?;
                    return Ok(values)
                },
                _ => {
                    let msg = format!("expected ',' or ']' at position {}", self.current.start);
                    return Err(self.error(msg))
                },
            }
        }
    }

    /// Height of a node whose tallest child is `height` high.
    fn grow(&self, height: usize) -> Result<usize, ParseError> {
        if height >= MAX_DEPTH {
            return Err(self.error("expression nested too deeply".to_string()))
        }
        Ok(height + 1)
    }

    /// Moves to the next token, keeping the current one as `previous`.
    fn advance(&mut self) -> Result<(), ParseError> {
        let next = self
            .scanner
            .next_token()
            .map_err(|e| ParseError::from_lex(e, self.source))?;
        self.previous = std::mem::replace(&mut self.current, next);
        Ok(())
    }

    /// Creates a ParseError pointing at the current token.
    fn error(&self, message: String) -> ParseError {
        ParseError::new(message, self.current.start, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::MatchOp::{Assign, Colon};

    fn parse(source: &str) -> Result<Expr, ParseError> {
        Parser::new(source)?.parse()
    }

    fn m(key: &str, value: &str) -> Expr {
        Expr::single(key, Colon, value)
    }

    #[test]
    fn test_single_match() {
        assert_eq!(parse(r#"status:"active""#).unwrap(), m("status", "active"));
        assert_eq!(parse(r#"key :"v""#).unwrap(), m("key", "v"));
        assert_eq!(parse(r#"meta.owner:="bob""#).unwrap(), Expr::single("meta.owner", Assign, "bob"));
    }

    #[test]
    fn test_list_preserves_order() {
        assert_eq!(
            parse(r#"tag:=["x","y","z"]"#).unwrap(),
            Expr::list("tag", Assign, &["x", "y", "z"])
        );
        assert_eq!(parse(r#"tag:[ "x" ,"y" ]"#).unwrap(), Expr::list("tag", Colon, &["x", "y"]));
    }

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(
            parse(r#"a:"1" || b:"2" && c:"3""#).unwrap(),
            Expr::or(m("a", "1"), Expr::and(m("b", "2"), m("c", "3")))
        );
        assert_eq!(
            parse(r#"a:"1" || b:"2" || c:"3""#).unwrap(),
            Expr::or(Expr::or(m("a", "1"), m("b", "2")), m("c", "3"))
        );
        assert_eq!(
            parse(r#"a:"1" && b:"2" && c:"3""#).unwrap(),
            Expr::and(Expr::and(m("a", "1"), m("b", "2")), m("c", "3"))
        );
        assert_eq!(
            parse(r#"(a:"1" || b:"2") && c:"3""#).unwrap(),
            Expr::and(Expr::or(m("a", "1"), m("b", "2")), m("c", "3"))
        );
    }

    #[test]
    fn test_negation_scope() {
        assert_eq!(
            parse(r#"!a:"1" && b:"2""#).unwrap(),
            Expr::and(Expr::not(m("a", "1")), m("b", "2"))
        );
        assert_eq!(
            parse(r#"!(a:"1" && b:"2")"#).unwrap(),
            Expr::not(Expr::and(m("a", "1"), m("b", "2")))
        );
    }

    #[test]
    fn test_whitespace_after_operator() {
        let error = parse(r#"key: "v""#).unwrap_err();
        assert_eq!(error.message, r#"unexpected space between ":" and value"#);
        assert_eq!(error.position, 5);

        let error = parse(r#"tags:= ["a"]"#).unwrap_err();
        assert_eq!(error.message, r#"unexpected space between ":=" and value"#);
        assert_eq!(error.position, 7);
    }

    #[test]
    fn test_error_messages() {
        let cases = vec![
            (r#"tag:=[]"#, "expected string inside list at position 6", 6),
            (r#"tag:["a" "b"]"#, "expected ',' or ']' at position 9", 9),
            (r#"tag:["a","#, "expected string inside list at position 9", 9),
            (r#"(a:"1""#, "expected ')' at position 6", 6),
            (r#"a"1""#, r#"expected ':' or ':=' after key "a" at position 1"#, 1),
            (r#"a:b"#, r#"expected string or '[' after operator ":""#, 2),
            (r#")"#, r#"unexpected token ")" at position 0"#, 0),
            (r#""#, r#"unexpected token "" at position 0"#, 0),
            (r#"a:"1" &&"#, r#"unexpected token "" at position 8"#, 8),
            (r#"!!a:"1""#, r#"unexpected token "!" at position 1"#, 1),
            (r#"a:"1" b:"2""#, r#"unexpected trailing token "b" at position 6"#, 6),
            (r#"(a:"1"))"#, r#"unexpected trailing token ")" at position 7"#, 7),
        ];

        for (source, message, position) in cases {
            let error = parse(source).unwrap_err();
            assert_eq!(error.message, message, "Input: {}", source);
            assert_eq!(error.position, position, "Input: {}", source);
            assert_eq!(error.input, source);
        }
    }

    #[test]
    fn test_lex_errors_surface_through_parser() {
        let error = parse(r#"key:"abc"#).unwrap_err();
        assert_eq!(error.message, "unterminated string");
        assert_eq!(error.position, 8);
        assert!(error.cause.is_some());

        let error = parse(r#"a:"1" & b:"2""#).unwrap_err();
        assert_eq!(error.message, "unexpected character '&' at position 6");
        assert_eq!(error.diagnostic(), "unexpected character '&' at position 6\na:\"1\" & b:\"2\"\n      ^");

        // a failure in the very first token is reported by the constructor
        assert!(Parser::new("#").is_err());
    }

    fn chain(terms: usize, connective: &str) -> String {
        vec![r#"a:"1""#; terms].join(connective)
    }

    #[test]
    fn test_chain_depth_limit() {
        assert!(parse(&chain(MAX_DEPTH, " && ")).is_ok());
        assert!(parse(&chain(MAX_DEPTH, " || ")).is_ok());

        let source = chain(MAX_DEPTH + 1, " && ");
        let error = parse(&source).unwrap_err();
        assert_eq!(error.message, "expression nested too deeply");
        assert_eq!(error.position, source.len());

        let source = format!("!({})", chain(MAX_DEPTH, " || "));
        assert_eq!(parse(&source).unwrap_err().message, "expression nested too deeply");
    }

    #[test]
    fn test_parenthesis_depth_limit() {
        let nested = |depth: usize| format!("{}a:\"1\"{}", "(".repeat(depth), ")".repeat(depth));

        assert_eq!(parse(&nested(MAX_DEPTH)).unwrap(), m("a", "1"));

        let error = parse(&nested(20_000)).unwrap_err();
        assert_eq!(error.message, "expression nested too deeply");
        assert_eq!(error.position, MAX_DEPTH);
    }
}
