//! Tokenizer for single lines of `SHOW CREATE TABLE` output.

/// Lexical token of a create-table line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    /// Backtick-quoted identifier, unescaped.
    Ident(String),
    /// Bare word (keyword, number or unquoted name).
    Word(String),
    /// Single- or double-quoted string literal, unescaped.
    Str(String),
    LParen,
    RParen,
    Comma,
    /// Any other punctuation.
    Symbol(char),
}

impl Token {
    /// Whether this token is the given keyword (case-insensitive).
    pub(crate) fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    /// Identifier text for quoted or bare names.
    pub(crate) fn name(&self) -> Option<&str> {
        match self {
            Token::Ident(name) | Token::Word(name) => Some(name),
            _ => None,
        }
    }
}

/// Split a line into tokens.
///
/// Quoted sections honour doubled-quote escapes. An unterminated quote runs
/// to the end of the line.
pub(crate) fn tokenize(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            ',' => tokens.push(Token::Comma),
            '`' | '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                while let Some(ch) = chars.next() {
                    if ch == quote {
                        if chars.peek() == Some(&quote) {
                            chars.next();
                            text.push(quote);
                            continue;
                        }
                        break;
                    }
                    if ch == '\\' && quote != '`' {
                        if let Some(escaped) = chars.next() {
                            text.push(escaped);
                        }
                        continue;
                    }
                    text.push(ch);
                }
                tokens.push(if quote == '`' {
                    Token::Ident(text)
                } else {
                    Token::Str(text)
                });
            }
            c if c.is_alphanumeric() || c == '_' || c == '$' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' || next == '$' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(word));
            }
            other => tokens.push(Token::Symbol(other)),
        }
    }

    tokens
}
