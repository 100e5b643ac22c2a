use log::warn;
use thiserror::Error;

use crate::lang::token::{normalize, Token, TokenKind};

#[derive(Debug, PartialEq, Clone, Error)]
pub enum LexError {
    #[error("Unexpected character '{ch}' on line {line}")]
    UnexpectedChar { ch: char, line: usize },
    #[error("Integer literal {literal} on line {line} is out of range")]
    IntegerOverflow { literal: String, line: usize },
}

fn is_cyrillic(c: char) -> bool {
    ('\u{0400}'..='\u{04FF}').contains(&c) && c.is_alphabetic()
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || is_cyrillic(c) || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

/// Lazy token scanner
///
/// Yields `Err` for characters it cannot classify and then keeps scanning, so a single bad
/// character never hides the rest of the input.
pub struct Lexer {
    source: Vec<char>,
    current: usize,
    line: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            current: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.current).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.source.get(self.current + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.current += 1;
        if c == '\n' {
            self.line += 1;
        }

        Some(c)
    }

    fn take_while(&mut self, pred: fn(char) -> bool) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            s.push(c);
            self.advance();
        }

        s
    }

    /// Skip whitespace and `//` comments
    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_next()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.advance();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn symbol(&mut self, kind: TokenKind) -> Result<TokenKind, LexError> {
        self.advance();
        Ok(kind)
    }

    fn lex_word(&mut self) -> TokenKind {
        let word = self.take_while(is_ident_continue);
        TokenKind::from_word(normalize(&word))
    }

    fn lex_string(&mut self, quote: char, line: usize) -> Result<TokenKind, LexError> {
        let start = self.current + 1;
        match self.source[start..].iter().position(|&c| c == quote) {
            Some(len) => {
                let text: String = self.source[start..start + len].iter().collect();
                // Opening quote, contents, closing quote
                for _ in 0..len + 2 {
                    self.advance();
                }

                Ok(TokenKind::Str(normalize(&text)))
            }
            None => {
                self.advance();
                Err(LexError::UnexpectedChar { ch: quote, line })
            }
        }
    }

    fn lex_number(&mut self, line: usize) -> Result<TokenKind, LexError> {
        let digits = self.take_while(|c| c.is_ascii_digit());
        digits
            .parse::<i64>()
            .map(TokenKind::Number)
            .map_err(|_| LexError::IntegerOverflow {
                literal: digits,
                line,
            })
    }
}

impl Iterator for Lexer {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_trivia();

        let c = self.peek()?;
        let line = self.line;
        let kind = match c {
            // NB: `<>` must be tried before `<`
            '<' if self.peek_next() == Some('>') => {
                self.advance();
                self.symbol(TokenKind::NotEqual)
            }
            '<' => self.symbol(TokenKind::Less),
            '>' => self.symbol(TokenKind::Greater),
            '=' => self.symbol(TokenKind::Equals),
            ';' => self.symbol(TokenKind::Semicolon),
            '(' => self.symbol(TokenKind::LeftParen),
            ')' => self.symbol(TokenKind::RightParen),
            ',' => self.symbol(TokenKind::Comma),
            '?' => self.symbol(TokenKind::Question),
            '"' | '\'' => self.lex_string(c, line),
            c if c.is_ascii_digit() => self.lex_number(line),
            c if is_ident_start(c) => Ok(self.lex_word()),
            c => {
                self.advance();
                Err(LexError::UnexpectedChar { ch: c, line })
            }
        };

        Some(kind.map(|kind| Token { kind, line }))
    }
}

/// Scan all of `source`
///
/// Returns every token that could be classified along with the diagnostics for everything that
/// could not.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<LexError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for item in Lexer::new(source) {
        match item {
            Ok(token) => tokens.push(token),
            Err(e) => {
                warn!("{}", e);
                errors.push(e);
            }
        }
    }

    (tokens, errors)
}

#[cfg(test)]
fn kinds(source: &str) -> Vec<TokenKind> {
    let (tokens, errors) = tokenize(source);
    assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);
    tokens.into_iter().map(|t| t.kind).collect()
}

#[test]
fn test_keywords_any_case() {
    let data = vec![
        ("Процедура", TokenKind::Procedure),
        ("ПРОЦЕДУРА", TokenKind::Procedure),
        ("конецПРОЦЕДУРЫ", TokenKind::EndProcedure),
        ("если", TokenKind::If),
        ("ЕсЛи", TokenKind::If),
        ("ИначеЕсли", TokenKind::ElseIf),
        ("иНАЧЕ", TokenKind::Else),
        ("Тогда", TokenKind::Then),
        ("КОНЕЦЕСЛИ", TokenKind::EndIf),
    ];

    for (input, expected) in data {
        assert_eq!(kinds(input), vec![expected]);
    }
}

#[test]
fn test_identifiers() {
    let data = vec![
        ("A", "a"),
        ("ПримерПеременной", "примерпеременной"),
        ("x_1", "x_1"),
        ("_tmp", "_tmp"),
        ("ЁжИк", "ёжик"),
        ("ЕслиБы", "еслибы"),
    ];

    for (input, expected) in data {
        assert_eq!(
            kinds(input),
            vec![TokenKind::Identifier(expected.to_string())]
        );
    }
}

#[test]
fn test_strings() {
    let data = vec![
        (r#""Добрый день, 1С!""#, "добрый день, 1с!"),
        (r#""""#, ""),
        ("'Single Quoted'", "single quoted"),
        (r#"'say "Hi"'"#, r#"say "hi""#),
        (r#""it's""#, "it's"),
        ("\"two\nLines\"", "two\nlines"),
        (r#""// not a comment""#, "// not a comment"),
    ];

    for (input, expected) in data {
        assert_eq!(kinds(input), vec![TokenKind::Str(expected.to_string())]);
    }
}

#[test]
fn test_numbers() {
    let data = vec![
        ("0", 0),
        ("42", 42),
        ("007", 7),
        ("9223372036854775807", i64::MAX),
    ];

    for (input, expected) in data {
        assert_eq!(kinds(input), vec![TokenKind::Number(expected)]);
    }

    let (tokens, errors) = tokenize("99999999999999999999 1");
    assert_eq!(
        tokens,
        vec![Token {
            kind: TokenKind::Number(1),
            line: 1
        }]
    );
    assert_eq!(
        errors,
        vec![LexError::IntegerOverflow {
            literal: "99999999999999999999".to_string(),
            line: 1
        }]
    );
}

#[test]
fn test_symbols() {
    assert_eq!(
        kinds("= ; ( ) , > < <> ? <<>"),
        vec![
            TokenKind::Equals,
            TokenKind::Semicolon,
            TokenKind::LeftParen,
            TokenKind::RightParen,
            TokenKind::Comma,
            TokenKind::Greater,
            TokenKind::Less,
            TokenKind::NotEqual,
            TokenKind::Question,
            TokenKind::Less,
            TokenKind::NotEqual,
        ]
    );
    assert_eq!(
        kinds("a<>b"),
        vec![
            TokenKind::Identifier("a".to_string()),
            TokenKind::NotEqual,
            TokenKind::Identifier("b".to_string()),
        ]
    );
}

#[test]
fn test_comments() {
    assert_eq!(kinds("// только комментарий"), vec![]);
    assert_eq!(
        kinds("A = 42; // Это – комментарий\nB"),
        vec![
            TokenKind::Identifier("a".to_string()),
            TokenKind::Equals,
            TokenKind::Number(42),
            TokenKind::Semicolon,
            TokenKind::Identifier("b".to_string()),
        ]
    );
}

#[test]
fn test_lines() {
    let (tokens, _) = tokenize("a\n\n  b // c\n\"x\ny\" d");
    let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
    assert_eq!(lines, vec![1, 3, 4, 5]);
}

#[test]
fn test_unexpected_chars() {
    let (tokens, errors) = tokenize("a = 1 + 2;\nb @ \"unterminated");
    assert_eq!(
        errors,
        vec![
            LexError::UnexpectedChar { ch: '+', line: 1 },
            LexError::UnexpectedChar { ch: '@', line: 2 },
            LexError::UnexpectedChar { ch: '"', line: 2 },
        ]
    );
    // Scanning resumes right after each bad character
    let kinds: Vec<TokenKind> = tokens.into_iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Identifier("a".to_string()),
            TokenKind::Equals,
            TokenKind::Number(1),
            TokenKind::Number(2),
            TokenKind::Semicolon,
            TokenKind::Identifier("b".to_string()),
            TokenKind::Identifier("unterminated".to_string()),
        ]
    );
}

#[test]
fn test_lazy() {
    let mut lexer = Lexer::new("a b");
    assert_eq!(
        lexer.next(),
        Some(Ok(Token {
            kind: TokenKind::Identifier("a".to_string()),
            line: 1
        }))
    );
    assert!(lexer.next().is_some());
    assert!(lexer.next().is_none());
}
