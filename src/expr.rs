use std::fmt;

use serde::{Deserialize, Serialize};

/// Deepest tree accepted by the parser and the decoder, counting a match as
/// one level. Bounded trees can always be encoded, decoded and dropped
/// without exhausting the stack.
pub const MAX_DEPTH: usize = 256;

/// Variant tag of an [`Expr`]. The strum and serde spellings are the wire
/// discriminant and must stay identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display, strum_macros::EnumIter)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ExprKind {
    Match,
    And,
    Or,
    Not,
}

/// The two match operators. Their meaning is left to whoever evaluates the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
pub enum MatchOp {
    #[serde(rename = ":")]
    #[strum(serialize = ":")]
    Colon,
    #[serde(rename = ":=")]
    #[strum(serialize = ":=")]
    Assign,
}

impl MatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOp::Colon => ":",
            MatchOp::Assign => ":=",
        }
    }
}

/// Right hand side of a match. Strings are kept as written, escapes included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchValue {
    Single(String),
    /// Never empty.
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Match {
        key: String,
        op: MatchOp,
        value: MatchValue,
    },
    And {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Or {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not {
        operand: Box<Expr>,
    },
}

impl Expr {
    pub fn kind(&self) -> ExprKind {
        match self {
            Expr::Match { .. } => ExprKind::Match,
            Expr::And { .. } => ExprKind::And,
            Expr::Or { .. } => ExprKind::Or,
            Expr::Not { .. } => ExprKind::Not,
        }
    }

    pub fn and(left: Expr, right: Expr) -> Expr {
        Expr::And { left: Box::new(left), right: Box::new(right) }
    }

    pub fn or(left: Expr, right: Expr) -> Expr {
        Expr::Or { left: Box::new(left), right: Box::new(right) }
    }

    pub fn not(operand: Expr) -> Expr {
        Expr::Not { operand: Box::new(operand) }
    }

    /// `key:"value"` or `key:="value"`.
    pub fn single(key: &str, op: MatchOp, value: &str) -> Expr {
        Expr::Match { key: key.to_string(), op, value: MatchValue::Single(value.to_string()) }
    }

    /// `key:["a","b"]`. `values` must not be empty.
    pub fn list(key: &str, op: MatchOp, values: &[&str]) -> Expr {
        let values = values.iter().map(|v| v.to_string()).collect();
        Expr::Match { key: key.to_string(), op, value: MatchValue::List(values) }
    }

    /// Binding strength used when rendering: `||` < `&&` < `!` < atoms.
    fn precedence(&self) -> u8 {
        match self {
            Expr::Or { .. } => 1,
            Expr::And { .. } => 2,
            Expr::Not { .. } => 3,
            Expr::Match { .. } => 4,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter, min_precedence: u8) -> fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

/// Renders filter text that parses back into the same tree.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Match { key, op, value: MatchValue::Single(value) } => {
                write!(f, "{}{}\"{}\"", key, op, value)
            }
            Expr::Match { key, op, value: MatchValue::List(values) } => {
                write!(f, "{}{}[", key, op)?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "\"{}\"", value)?;
                }
                write!(f, "]")
            }
            // both operators are left-associative, so a right operand of equal
            // strength needs parentheses
            Expr::And { left, right } => {
                left.fmt_operand(f, 2)?;
                write!(f, " && ")?;
                right.fmt_operand(f, 3)
            }
            Expr::Or { left, right } => {
                left.fmt_operand(f, 1)?;
                write!(f, " || ")?;
                right.fmt_operand(f, 2)
            }
            Expr::Not { operand } => {
                write!(f, "!")?;
                operand.fmt_operand(f, 4)
            }
        }
    }
}
