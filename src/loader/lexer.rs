use logos::Logos;

use super::LoadError;
use crate::diagnostic::Span;

#[derive(Logos, Debug, PartialEq, Eq, Clone, Copy)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip(r"#[^\n]*", allow_greedy = true))]
pub enum Token {
    #[regex("[0-9A-Fa-f][0-9A-Fa-f]", |lex| u8::from_str_radix(lex.slice(), 16).ok())]
    Byte(u8),
}

/// Split `.bc0` text into bytes, each with the span of its two hex digits.
pub fn lex(source: &str) -> Result<Vec<(u8, Span)>, LoadError> {
    let mut lexer = Token::lexer(source);
    let mut bytes = Vec::new();

    while let Some(result) = lexer.next() {
        let range = lexer.span();
        match result {
            Ok(Token::Byte(b)) => bytes.push((b, Span::new(range.start, range.end))),
            Err(()) => {
                return Err(LoadError::Lex {
                    span: Span::new(range.start, range.end),
                    snippet: source[range].to_string(),
                });
            }
        }
    }

    Ok(bytes)
}
