use memchr::memchr;

/// A fragment of a text line: either a markup tag or the content between tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A substring starting at `<` and ending at the next `>`.
    Markup(String),
    /// Everything between two markup tokens. May be empty.
    Content(String),
}

impl Token {
    pub fn as_str(&self) -> &str {
        match self {
            Token::Markup(text) | Token::Content(text) => text,
        }
    }
}

/// Splits a line into alternating content and markup tokens.
///
/// The result always starts and ends with a content token, so concatenating the tokens gives
/// back the original line, line terminator included. A `<` that is never closed on the line is
/// treated as content.
pub fn tokenize(line: &str) -> Vec<Token> {
    let bytes = line.as_bytes();
    let mut tokens = Vec::new();
    let mut cursor = 0;

    while let Some(open) = memchr(b'<', &bytes[cursor..]).map(|offset| cursor + offset) {
        let close = match memchr(b'>', &bytes[open + 1..]) {
            Some(offset) => open + 1 + offset,
            None => break,
        };
        tokens.push(Token::Content(line[cursor..open].to_string()));
        tokens.push(Token::Markup(line[open..=close].to_string()));
        cursor = close + 1;
    }
    tokens.push(Token::Content(line[cursor..].to_string()));

    tokens
}

/// Concatenates tokens back into a line.
pub fn join(tokens: &[Token]) -> String {
    tokens.iter().map(Token::as_str).collect()
}
