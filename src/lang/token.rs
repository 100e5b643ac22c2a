use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

#[derive(Debug, PartialEq, Clone)]
pub enum TokenKind {
    Identifier(String),
    Number(i64),
    Str(String),

    // keywords
    /// `Процедура`
    Procedure,
    /// `КонецПроцедуры`
    EndProcedure,
    /// `Если`
    If,
    /// `ИначеЕсли`
    ElseIf,
    /// `Иначе`
    Else,
    /// `Тогда`
    Then,
    /// `КонецЕсли`
    EndIf,

    // symbols
    /// `=`
    Equals,
    /// `;`
    Semicolon,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `,`
    Comma,
    /// `>`
    Greater,
    /// `<`
    Less,
    /// `<>`
    NotEqual,
    /// `?`
    Question,
}

lazy_static! {
    static ref KEYWORDS: HashMap<&'static str, TokenKind> = {
        let mut m = HashMap::new();
        m.insert("процедура", TokenKind::Procedure);
        m.insert("конецпроцедуры", TokenKind::EndProcedure);
        m.insert("если", TokenKind::If);
        m.insert("иначеесли", TokenKind::ElseIf);
        m.insert("иначе", TokenKind::Else);
        m.insert("тогда", TokenKind::Then);
        m.insert("конецесли", TokenKind::EndIf);
        m
    };
}

/// Canonical form of identifiers, keywords and string contents
///
/// Everything the language compares by name goes through here, including string literal
/// payloads (which therefore lose their original casing).
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
}

impl TokenKind {
    /// Classify an already normalized word as either a keyword or an identifier
    pub fn from_word(word: String) -> Self {
        match KEYWORDS.get(word.as_str()) {
            Some(keyword) => keyword.clone(),
            None => TokenKind::Identifier(word),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Identifier(_) => "identifier",
            TokenKind::Number(_) => "number",
            TokenKind::Str(_) => "string",
            TokenKind::Procedure
            | TokenKind::EndProcedure
            | TokenKind::If
            | TokenKind::ElseIf
            | TokenKind::Else
            | TokenKind::Then
            | TokenKind::EndIf => "keyword",
            _ => "symbol",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(name) => write!(f, "{}", name),
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::Str(s) => write!(f, "\"{}\"", s),
            TokenKind::Procedure => write!(f, "процедура"),
            TokenKind::EndProcedure => write!(f, "конецпроцедуры"),
            TokenKind::If => write!(f, "если"),
            TokenKind::ElseIf => write!(f, "иначеесли"),
            TokenKind::Else => write!(f, "иначе"),
            TokenKind::Then => write!(f, "тогда"),
            TokenKind::EndIf => write!(f, "конецесли"),
            TokenKind::Equals => write!(f, "="),
            TokenKind::Semicolon => write!(f, ";"),
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Greater => write!(f, ">"),
            TokenKind::Less => write!(f, "<"),
            TokenKind::NotEqual => write!(f, "<>"),
            TokenKind::Question => write!(f, "?"),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind.name(), self.kind)
    }
}

#[test]
fn test_keywords() {
    let data = vec![
        ("процедура", TokenKind::Procedure),
        ("конецпроцедуры", TokenKind::EndProcedure),
        ("если", TokenKind::If),
        ("иначеесли", TokenKind::ElseIf),
        ("иначе", TokenKind::Else),
        ("тогда", TokenKind::Then),
        ("конецесли", TokenKind::EndIf),
        ("сообщить", TokenKind::Identifier("сообщить".to_string())),
    ];

    for (word, expected) in data {
        assert_eq!(TokenKind::from_word(word.to_string()), expected);
    }
}

#[test]
fn test_normalize() {
    assert_eq!(normalize("КонецЕсли"), "конецесли");
    assert_eq!(normalize("ПримерПеременной_1"), "примерпеременной_1");
    assert_eq!(normalize("Hello, World!"), "hello, world!");
}
