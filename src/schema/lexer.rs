//! Preprocessing and tokenization of specification text

use std::fmt;

/// A lexical unit of specification text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier, keyword or integer literal
    Word(String),
    Semicolon,
    OpenBracket,
    CloseBracket,
    OpenBrace,
    CloseBrace,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Word(word) => write!(f, "'{}'", word),
            TokenKind::Semicolon => f.write_str("';'"),
            TokenKind::OpenBracket => f.write_str("'['"),
            TokenKind::CloseBracket => f.write_str("']'"),
            TokenKind::OpenBrace => f.write_str("'{'"),
            TokenKind::CloseBrace => f.write_str("'}'"),
        }
    }
}

/// A token together with the 1-based line it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    pub fn is_word(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(w) if w == word)
    }
}

/// Replace comments and quoted literals with a single space.
///
/// Handles `// line` and `/* block */` comments as well as `'...'` and
/// `"..."` literals with backslash escapes. Newlines inside a removed block
/// comment are kept so that token line numbers stay accurate. An unterminated
/// block comment or literal runs to the end of the text.
pub fn preprocess(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push(' ');
                        out.push('\n');
                        break;
                    }
                }
                if !out.ends_with('\n') {
                    out.push(' ');
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut newlines = 0;
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    if next == '\n' {
                        newlines += 1;
                    }
                    prev = next;
                }
                out.push(' ');
                out.extend(std::iter::repeat_n('\n', newlines));
            }
            '"' | '\'' => {
                let quote = ch;
                let mut escaped = false;
                for next in chars.by_ref() {
                    if escaped {
                        escaped = false;
                    } else if next == '\\' {
                        escaped = true;
                    } else if next == quote {
                        break;
                    }
                }
                out.push(' ');
            }
            _ => out.push(ch),
        }
    }

    out
}

/// Split preprocessed text into tokens.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut word_line = 1;
    let mut line = 1;

    for ch in text.chars() {
        let punct = match ch {
            ';' => Some(TokenKind::Semicolon),
            '[' => Some(TokenKind::OpenBracket),
            ']' => Some(TokenKind::CloseBracket),
            '{' => Some(TokenKind::OpenBrace),
            '}' => Some(TokenKind::CloseBrace),
            _ => None,
        };

        if ch.is_whitespace() || punct.is_some() {
            if !word.is_empty() {
                tokens.push(Token { kind: TokenKind::Word(std::mem::take(&mut word)), line: word_line });
            }
            if let Some(kind) = punct {
                tokens.push(Token { kind, line });
            }
            if ch == '\n' {
                line += 1;
            }
            continue;
        }

        if word.is_empty() {
            word_line = line;
        }
        word.push(ch);
    }

    if !word.is_empty() {
        tokens.push(Token { kind: TokenKind::Word(word), line: word_line });
    }

    tokens
}
