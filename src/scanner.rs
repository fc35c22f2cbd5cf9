use crate::error::LexError;
use crate::token_type::TokenType::{self, *};

/// First code point of every run of ten decimal digits in Unicode 15.
const DECIMAL_ZEROS: &[u32] = &[
    0x0030, 0x0660, 0x06F0, 0x07C0, 0x0966, 0x09E6, 0x0A66, 0x0AE6, 0x0B66, 0x0BE6,
    0x0C66, 0x0CE6, 0x0D66, 0x0DE6, 0x0E50, 0x0ED0, 0x0F20, 0x1040, 0x1090, 0x17E0,
    0x1810, 0x1946, 0x19D0, 0x1A80, 0x1A90, 0x1B50, 0x1BB0, 0x1C40, 0x1C50, 0xA620,
    0xA8D0, 0xA900, 0xA9D0, 0xA9F0, 0xAA50, 0xABF0, 0xFF10, 0x104A0, 0x10D30, 0x11066,
    0x110F0, 0x11136, 0x111D0, 0x112F0, 0x11450, 0x114D0, 0x11650, 0x116C0, 0x11730, 0x118E0,
    0x11950, 0x11C50, 0x11D50, 0x11DA0, 0x11F50, 0x16A60, 0x16AC0, 0x16B50, 0x1D7CE, 0x1D7D8,
    0x1D7E2, 0x1D7EC, 0x1D7F6, 0x1E140, 0x1E2F0, 0x1E4F0, 0x1E950, 0x1FBF0,
];

/// The `Scanner` walks the source one character at a time and hands out tokens on demand.
/// Once the source is exhausted every further call returns an EOF token.
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::str::CharIndices<'a>, // iterator over chars of source
    current: Option<(usize, char)>, // current char (byte index, char)
    start: usize, // byte index of the first char of the lexeme
}

impl<'a> Scanner<'a> {

    pub fn new(source: &'a str) -> Self {
        let mut chars = source.char_indices();
        let current = chars.next();

        Scanner {
            source,
            chars,
            current,
            start: 0,
        }
    }

    /// Returns the next token, or the EOF token once the source is exhausted.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();
        self.start = self.position();

        let c = match self.advance() {
            Some(ch) => ch,
            None => return Ok(self.make_token(EOF, String::new())),
        };

        match c {
            '(' => Ok(self.token(LeftParen)),
            ')' => Ok(self.token(RightParen)),
            '[' => Ok(self.token(LeftBracket)),
            ']' => Ok(self.token(RightBracket)),
            ',' => Ok(self.token(Comma)),
            '!' => Ok(self.token(Bang)),
            ':' => Ok(self.match_and_token('=', Assign, Colon)),
            '&' => self.double('&', And),
            '|' => self.double('|', Or),
            '"' => self.string(),
            _ if Self::is_alpha(c) => Ok(self.identifier()),
            _ => Err(LexError::UnexpectedCharacter { ch: c, position: self.start }),
        }
    }

    fn identifier(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if Self::is_alphanumeric(c) {
                self.advance();
            } else {
                break;
            }
        }

        self.token(Identifier)
    }

    /// Consumes a double-quoted literal. A backslash skips the following char;
    /// the lexeme keeps the text between the quotes exactly as written.
    fn string(&mut self) -> Result<Token, LexError> {
        let content_start = self.position();
        loop {
            match self.advance() {
                None => return Err(LexError::UnterminatedString { position: self.position() }),
                Some('"') => break,
                Some('\\') => { self.advance(); },
                Some(_) => {},
            }
        }
        // position() is just past the closing quote
        let content = self.source[content_start..self.position() - 1].to_string();
        Ok(self.make_token(Str, content))
    }

    /// `&&` and `||`: a single char on its own is not a token.
    fn double(&mut self, expected: char, token_type: TokenType) -> Result<Token, LexError> {
        if self.match_char(expected) {
            Ok(self.token(token_type))
        } else {
            Err(LexError::UnexpectedCharacter { ch: expected, position: self.start })
        }
    }

    fn is_alpha(c: char) -> bool {
        c.is_alphabetic() || c == '_'
    }

    fn is_alphanumeric(c: char) -> bool {
        c.is_alphabetic() || Self::is_decimal_digit(c) || c == '_' || c == '.'
    }

    /// Unicode decimal digits (category Nd) only; superscripts, fractions and
    /// other numeric chars do not continue an identifier.
    fn is_decimal_digit(c: char) -> bool {
        let c = c as u32;
        DECIMAL_ZEROS.iter().any(|&zero| (zero..zero + 10).contains(&c))
    }

    /// True if `text` would be scanned as exactly one identifier.
    pub fn is_identifier(text: &str) -> bool {
        let mut chars = text.chars();
        match chars.next() {
            Some(c) if Self::is_alpha(c) => chars.all(Self::is_alphanumeric),
            _ => false,
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn match_and_token(&mut self, expected: char, type1: TokenType, type2: TokenType) -> Token {
        let token_type = if self.match_char(expected) { type1 } else { type2 };
        self.token(token_type)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            return true
        }
        false
    }

    /// Byte index of the current char, or the source length at the end.
    fn position(&self) -> usize {
        self.current.map_or(self.source.len(), |(idx, _)| idx)
    }

    /// Return current char and advance to next.
    fn advance(&mut self) -> Option<char> {
        let c = self.current.map(|(_, c)| c);
        self.current = self.chars.next();
        c
    }

    /// Return current char without advancing.
    fn peek(&self) -> Option<char> {
        self.current.map(|(_, c)| c)
    }

    /// Token whose lexeme is the source text scanned since `start`.
    fn token(&self, token_type: TokenType) -> Token {
        let lexeme = self.source[self.start..self.position()].to_string();
        self.make_token(token_type, lexeme)
    }

    fn make_token(&self, token_type: TokenType, lexeme: String) -> Token {
        Token {
            variant: token_type,
            lexeme,
            start: self.start,
            end: self.position(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub variant: TokenType,
    /// Source text of the token; for strings the text between the quotes.
    pub lexeme: String,
    pub start: usize, // byte offsets into the source
    pub end: usize,
}
