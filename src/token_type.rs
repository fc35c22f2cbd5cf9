#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TokenType {
    LeftParen, RightParen, // ()
    LeftBracket, RightBracket, // []
    Comma,
    Colon, Assign, // : :=
    Bang,
    And, Or, // && ||
    Str,
    Identifier,
    EOF,
}
