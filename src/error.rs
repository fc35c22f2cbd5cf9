use ariadne::{Config, Label, Report, ReportKind, Source};
use std::io;
use thiserror::Error;

use crate::expr::ExprKind;

/// Failure to turn the source text into a token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unexpected character {ch:?} at position {position}")]
    UnexpectedCharacter { ch: char, position: usize },
    #[error("unterminated string")]
    UnterminatedString { position: usize },
}

impl LexError {
    /// Byte offset into the source where lexing stopped.
    pub fn position(&self) -> usize {
        match self {
            LexError::UnexpectedCharacter { position, .. } => *position,
            LexError::UnterminatedString { position } => *position,
        }
    }
}

/// A grammar violation, or a lexer failure surfaced through the parser.
///
/// The `Display` output is the three-line caret diagnostic:
///
/// ```text
/// unexpected space between ":" and value
/// key: "v"
///      ^
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", caret_diagnostic(.message, .input, .position))]
pub struct ParseError {
    pub message: String,
    /// Byte offset of the offending token.
    pub position: usize,
    pub input: String,
    #[source]
    pub cause: Option<LexError>,
}

impl ParseError {
    pub(crate) fn new(message: String, position: usize, input: &str) -> Self {
        ParseError { message, position, input: input.to_string(), cause: None }
    }

    pub(crate) fn from_lex(error: LexError, input: &str) -> Self {
        ParseError {
            message: error.to_string(),
            position: error.position(),
            input: input.to_string(),
            cause: Some(error),
        }
    }

    /// Message, source line and caret line, separated by newlines.
    pub fn diagnostic(&self) -> String {
        caret_diagnostic(&self.message, &self.input, &self.position)
    }

    /// Renders the error as an ariadne report labelled with `source_name`.
    pub fn write_report<W: io::Write>(&self, source_name: &str, color: bool, writer: W) -> io::Result<()> {
        // ariadne counts characters, the parser counts bytes
        let column = char_offset(&self.input, self.position);

        Report::build(ReportKind::Error, (source_name, column..column))
            .with_config(Config::default().with_color(color))
            .with_message("Parsing error")
            .with_label(Label::new((source_name, column..column)).with_message(&self.message))
            .finish()
            .write((source_name, Source::from(self.input.as_str())), writer)
    }
}

/// Error raised while rebuilding an expression from its structured encoding.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{kind} node is missing field {field:?}")]
    MissingField { kind: ExprKind, field: &'static str },
    #[error("{kind} node must not carry field {field:?}")]
    UnexpectedField { kind: ExprKind, field: &'static str },
    #[error("invalid key {0:?}")]
    InvalidKey(String),
    #[error("invalid operator {0:?}, expected \":\" or \":=\"")]
    InvalidOperator(String),
    #[error("MATCH node carries both \"value\" and \"values\"")]
    ConflictingValues,
    #[error("MATCH node has an empty \"values\" list")]
    EmptyValues,
}

fn caret_diagnostic(message: &str, input: &str, position: &usize) -> String {
    format!("{}\n{}\n{}^", message, input, " ".repeat(*position))
}

fn char_offset(source: &str, byte_offset: usize) -> usize {
    source
        .get(..byte_offset)
        .map_or(source.chars().count(), |prefix| prefix.chars().count())
}
