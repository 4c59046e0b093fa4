//! Tokenizer for filter scripts.

use std::iter::Peekable;
use std::str::Chars;

use crate::script::ScriptError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Else,
    Lambda,
    True,
    False,
    For,
}

impl Keyword {
    fn from_ident(ident: &str) -> Option<Self> {
        Some(match ident {
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "lambda" => Keyword::Lambda,
            "true" => Keyword::True,
            "false" => Keyword::False,
            "for" => Keyword::For,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Num(f64),
    Ident(String),
    Keyword(Keyword),
    /// One of `, ; ( ) { } [ ]`
    Punc(char),
    Op(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

/// Two-character operators are matched before their one-character prefixes.
const OPERATORS_2: [&str; 7] = ["||", "&&", "<=", ">=", "==", "!=", "//"];
const OPERATORS_1: [&str; 9] = ["=", "<", ">", "+", "-", "*", "/", "%", "!"];

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            col: 0,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn read_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if !pred(ch) {
                break;
            }
            text.push(ch);
            self.bump();
        }
        text
    }

    fn error(&self, message: String) -> ScriptError {
        ScriptError::Syntax {
            line: self.line,
            col: self.col,
            message,
        }
    }

    fn read_number(&mut self) -> Result<TokenKind, ScriptError> {
        let mut seen_dot = false;
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch == '.' && !seen_dot {
                seen_dot = true;
            } else if !ch.is_ascii_digit() {
                break;
            }
            text.push(ch);
            self.bump();
        }
        text.parse::<f64>()
            .map(TokenKind::Num)
            .map_err(|_| self.error(format!("invalid number \"{text}\"")))
    }

    fn read_op(&mut self, first: char) -> Result<TokenKind, ScriptError> {
        self.bump();
        if let Some(second) = self.peek() {
            let pair: String = [first, second].iter().collect();
            if let Some(op) = OPERATORS_2.iter().find(|op| **op == pair) {
                self.bump();
                return Ok(TokenKind::Op(*op));
            }
        }
        OPERATORS_1
            .iter()
            .find(|op| op.starts_with(first))
            .map(|op| TokenKind::Op(*op))
            .ok_or_else(|| self.error(format!("unknown operator \"{first}\"")))
    }

    fn next_token(&mut self) -> Result<Option<Token>, ScriptError> {
        loop {
            self.read_while(|ch| matches!(ch, ' ' | '\t' | '\n' | '\r'));
            if self.peek() == Some('#') {
                self.read_while(|ch| ch != '\n');
                continue;
            }
            break;
        }

        let Some(ch) = self.peek() else {
            return Ok(None);
        };
        // Tokens are positioned at their first character
        let (line, col) = (self.line, self.col + 1);

        let kind = if ch.is_ascii_digit() {
            self.read_number()?
        } else if ch.is_ascii_alphabetic() || ch == '_' {
            let ident = self.read_while(|c| c.is_ascii_alphanumeric() || c == '_');
            match Keyword::from_ident(&ident) {
                Some(kw) => TokenKind::Keyword(kw),
                None => TokenKind::Ident(ident),
            }
        } else if ",;(){}[]".contains(ch) {
            self.bump();
            TokenKind::Punc(ch)
        } else if "+-*/%=&|<>!".contains(ch) {
            self.read_op(ch)?
        } else {
            return Err(ScriptError::Syntax {
                line,
                col,
                message: format!("unexpected character \"{ch}\""),
            });
        };

        Ok(Some(Token { kind, line, col }))
    }
}

/// Split `source` into tokens, dropping whitespace and `#` comments.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ScriptError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            kinds("avg = (r + g) // 3;"),
            vec![
                TokenKind::Ident("avg".into()),
                TokenKind::Op("="),
                TokenKind::Punc('('),
                TokenKind::Ident("r".into()),
                TokenKind::Op("+"),
                TokenKind::Ident("g".into()),
                TokenKind::Punc(')'),
                TokenKind::Op("//"),
                TokenKind::Num(3.0),
                TokenKind::Punc(';'),
            ]
        );
    }

    #[test]
    fn test_numbers_take_one_dot() {
        assert_eq!(kinds("0.393"), vec![TokenKind::Num(0.393)]);
        assert!(tokenize("1.2.3").is_err());
    }

    #[test]
    fn test_keywords_and_comments() {
        assert_eq!(
            kinds("# skip me\nif x_1 else for lambda true false"),
            vec![
                TokenKind::Keyword(Keyword::If),
                TokenKind::Ident("x_1".into()),
                TokenKind::Keyword(Keyword::Else),
                TokenKind::Keyword(Keyword::For),
                TokenKind::Keyword(Keyword::Lambda),
                TokenKind::Keyword(Keyword::True),
                TokenKind::Keyword(Keyword::False),
            ]
        );
    }

    #[test]
    fn test_operator_splitting() {
        assert_eq!(
            kinds("a=-1"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Op("="),
                TokenKind::Op("-"),
                TokenKind::Num(1.0),
            ]
        );
        assert_eq!(kinds("x != 0 && y"), vec![
            TokenKind::Ident("x".into()),
            TokenKind::Op("!="),
            TokenKind::Num(0.0),
            TokenKind::Op("&&"),
            TokenKind::Ident("y".into()),
        ]);
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("a\n  bb").unwrap();
        assert_eq!((tokens[0].line, tokens[0].col), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].col), (2, 3));
    }

    #[test]
    fn test_bad_characters() {
        let err = tokenize("x = 1 @ 2").unwrap_err();
        assert_eq!(
            err,
            ScriptError::Syntax { line: 1, col: 7, message: "unexpected character \"@\"".into() }
        );
        assert!(tokenize("a & b").is_err());
    }
}
