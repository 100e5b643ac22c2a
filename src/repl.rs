use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Completer, Helper, Highlighter, Hinter, Result};

/// Helper that extends editor
///
/// Currently only implements `Validator` trait to trigger multiline editing when a `\` is seen at
/// the end of a line.
#[derive(Completer, Helper, Highlighter, Hinter)]
pub struct ReplHelper {}

impl ReplHelper {
    pub fn new() -> Self {
        ReplHelper {}
    }
}

impl Validator for ReplHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> Result<ValidationResult> {
        if ctx.input().ends_with('\\') {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

/// Remove `//` comments that are not inside a string literal
///
/// Line breaks are kept. Strings may span lines, so quote state carries over.
pub fn strip_comments(input: &str) -> String {
    let mut stripped = String::with_capacity(input.len());
    let mut quote: Option<char> = None;
    for line in input.split('\n') {
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if c == '\'' || c == '"' => quote = Some(c),
                None if c == '/' && chars.peek() == Some(&'/') => {
                    // Rest of the line is a comment
                    break;
                }
                None => {}
            }

            stripped.push(c);
        }

        stripped.push('\n');
    }

    // Remove extra newline
    stripped.pop();

    stripped
}

/// Fixup input so the parser is happy
///
/// Currently does three things:
/// * Strip trailing `//` comments, which would otherwise swallow an appended `;`
/// * Remove the multiline escape created by `ReplHelper`
/// * Appends a `;` if not already present so the parser recognizes the input as a statement.
///   Procedure definitions end with a keyword instead and are left alone.
pub fn fixup_input(input: &str) -> String {
    let mut ret = strip_comments(input).replace("\\\n", " ");
    let trimmed = ret.trim_end();
    if !trimmed.is_empty()
        && !trimmed.ends_with(';')
        && !trimmed.to_lowercase().ends_with("конецпроцедуры")
    {
        ret += ";";
    }

    ret
}

#[test]
fn test_fixup_input() {
    assert_eq!(fixup_input("Сообщить(1) \\\n"), "Сообщить(1)  ;");
    assert_eq!(fixup_input("A = \\\n1"), "A =  1;");
    assert_eq!(fixup_input("A = 1"), "A = 1;");
    assert_eq!(fixup_input("A = 1;"), "A = 1;");
    assert_eq!(fixup_input("A = 1 ;  "), "A = 1 ;  ");
    assert_eq!(
        fixup_input("Процедура П() КонецПроцедуры"),
        "Процедура П() КонецПроцедуры"
    );
    assert_eq!(
        fixup_input("Процедура П() \\\nКОНЕЦПРОЦЕДУРЫ "),
        "Процедура П()  КОНЕЦПРОЦЕДУРЫ "
    );
    assert_eq!(fixup_input("   "), "   ");
    assert_eq!(fixup_input("Сообщить(1) // печать"), "Сообщить(1) ;");
    assert_eq!(fixup_input("A = 1; // уже есть"), "A = 1; ");
    assert_eq!(fixup_input("A = 1 \\\n// дальше"), "A = 1  ;");
}

#[test]
fn test_strip_comments() {
    let data = vec![
        ("A = 1", "A = 1"),
        ("A = 1 // комментарий", "A = 1 "),
        ("A = 1// комментарий", "A = 1"),
        ("A = 1 / 2", "A = 1 / 2"),
        ("A = 'http://x'", "A = 'http://x'"),
        (r#"A = "a//b" // c"#, r#"A = "a//b" "#),
        (r#"A = "it's" // c"#, r#"A = "it's" "#),
        ("A = 'строка\n// внутри' // снаружи\nБ = 2", "A = 'строка\n// внутри' \nБ = 2"),
        ("// только комментарий", ""),
    ];

    for (input, expected) in data {
        assert_eq!(strip_comments(input), expected, "{}", input);
    }
}

#[test]
fn test_trailing_comment_runs() {
    use crate::lang::runtime::Runtime;

    let mut output = Vec::new();
    let mut diagnostics = Vec::new();
    let mut runtime = Runtime::new(&mut output, &mut diagnostics);
    runtime
        .run(&fixup_input("Сообщить(1) // печать"))
        .expect("Failed to run");

    assert_eq!(String::from_utf8(output).expect("Output not utf-8"), "1\n");
}
