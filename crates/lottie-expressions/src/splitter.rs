//! Splits a script into top-level statements.
//!
//! The text is cut at `;` and line breaks outside of string literals. A piece
//! that cannot stand on its own (open brackets, a trailing binary operator, a
//! control-flow header still waiting for its body) is merged with the pieces
//! that follow until the statement is complete.

use crate::error::{ExpressionError, Result};

const CONTINUATION_OPERATORS: &[char] = &[
    '=', ',', '+', '-', '*', '/', '%', '&', '|', '?', ':', '<', '>', '!',
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Separator {
    Semicolon,
    Newline,
    End,
}

struct Piece<'a> {
    text: &'a str,
    separator: Separator,
}

#[derive(Default, Debug)]
struct Balance {
    paren: i32,
    bracket: i32,
    brace: i32,
}

pub fn split(source: &str) -> Result<Vec<String>> {
    let normalized = normalize(source);
    let pieces = pieces(&normalized);

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut joiner: Option<&'static str> = None;

    for (i, piece) in pieces.iter().enumerate() {
        let text = piece.text.trim();
        match joiner.take() {
            Some(join) => {
                current.push_str(join);
                current.push_str(text);
            }
            None if text.is_empty() => continue,
            None => current.push_str(text),
        }

        let next = pieces[i + 1..]
            .iter()
            .map(|p| p.text.trim())
            .find(|t| !t.is_empty());

        match continuation(&current, piece.separator, next) {
            Some(join) => joiner = Some(join),
            None => statements.push(std::mem::take(&mut current)),
        }
    }

    if joiner.is_some() && !current.trim().is_empty() {
        return Err(ExpressionError::UnexpectedEndOfInput(current));
    }
    if !current.trim().is_empty() {
        statements.push(current);
    }
    Ok(statements)
}

/// Drops `\r`, turns tabs into spaces and removes comments outside strings.
fn normalize(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\r' => {}
            '\t' => out.push(' '),
            '"' | '\'' => {
                quote = Some(c);
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                while chars.peek().is_some_and(|&n| n != '\n') {
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for n in chars.by_ref() {
                    if previous == '*' && n == '/' {
                        break;
                    }
                    previous = n;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

fn pieces(text: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        let separator = match c {
            '"' | '\'' => {
                quote = Some(c);
                continue;
            }
            ';' => Separator::Semicolon,
            '\n' => Separator::Newline,
            _ => continue,
        };
        pieces.push(Piece {
            text: &text[start..i],
            separator,
        });
        start = i + 1;
    }
    pieces.push(Piece {
        text: &text[start..],
        separator: Separator::End,
    });
    pieces
}

/// Open bracket counts outside string literals.
fn balance(text: &str) -> Balance {
    let mut balance = Balance::default();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in text.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => balance.paren += 1,
            ')' => balance.paren -= 1,
            '[' => balance.bracket += 1,
            ']' => balance.bracket -= 1,
            '{' => balance.brace += 1,
            '}' => balance.brace -= 1,
            _ => {}
        }
    }
    balance
}

/// How the statement continues into the next piece, or `None` when complete.
fn continuation(
    current: &str,
    separator: Separator,
    next: Option<&str>,
) -> Option<&'static str> {
    let balance = balance(current);
    if balance.paren > 0 || balance.bracket > 0 {
        return Some(match separator {
            Separator::Semicolon => ";",
            _ => " ",
        });
    }

    let trimmed = current.trim_end();
    if ends_with_operator(trimmed) || is_control_header(trimmed) {
        return Some(" ");
    }

    if let Some(next) = next {
        if starts_with_word(next, "else") {
            return Some(" ");
        }
        if next.starts_with('{')
            && (trimmed.ends_with(')') || matches!(last_word(trimmed), "else" | "do"))
        {
            return Some(" ");
        }
        if starts_with_word(next, "while")
            && (closes_do_body(trimmed) || awaits_do_while(trimmed))
        {
            return Some(" ");
        }
        if next.starts_with('.') && !next[1..].starts_with(|c: char| c.is_ascii_digit()) {
            return Some("");
        }
    }

    if balance.brace > 0 {
        return Some(if trimmed.ends_with('{') { "" } else { ";" });
    }
    None
}

fn ends_with_operator(text: &str) -> bool {
    if text.ends_with("++") || text.ends_with("--") {
        return false;
    }
    text.ends_with(CONTINUATION_OPERATORS)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn last_word(text: &str) -> &str {
    let text = text.trim_end();
    let start = text
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_ident_char(*c))
        .last()
        .map_or(text.len(), |(i, _)| i);
    &text[start..]
}

fn starts_with_word(text: &str, word: &str) -> bool {
    text.strip_prefix(word)
        .is_some_and(|rest| !rest.starts_with(is_ident_char))
}

/// Index of the opening bracket matched by the closing one at `close`.
fn matching_open(text: &str, close: usize) -> Option<usize> {
    let mut stack = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => stack.push(i),
            ')' | ']' | '}' => {
                let open = stack.pop();
                if i == close {
                    return open;
                }
            }
            _ => {}
        }
    }
    None
}

/// `if (..)`, `for (..)`, `while (..)`, `else` or `do` still waiting for a body.
fn is_control_header(text: &str) -> bool {
    if matches!(last_word(text), "else" | "do") {
        return true;
    }
    if !text.ends_with(')') {
        return false;
    }
    let Some(open) = matching_open(text, text.len() - 1) else {
        return false;
    };
    let head = text[..open].trim_end();
    match last_word(head) {
        "if" | "for" => true,
        "while" => {
            let before = head[..head.len() - "while".len()].trim_end();
            !closes_do_body(before) && !is_braceless_do(before)
        }
        _ => false,
    }
}

/// Whether `text` ends with the closing brace of a `do { .. }` body.
fn closes_do_body(text: &str) -> bool {
    if !text.ends_with('}') {
        return false;
    }
    matching_open(text, text.len() - 1).is_some_and(|open| last_word(&text[..open]) == "do")
}

/// `do i++` with a braceless body, not yet followed by its `while (..)`.
fn awaits_do_while(text: &str) -> bool {
    if !is_braceless_do(text) {
        return false;
    }
    if !text.ends_with(')') {
        return true;
    }
    matching_open(text, text.len() - 1)
        .map_or(true, |open| last_word(text[..open].trim_end()) != "while")
}

fn is_braceless_do(text: &str) -> bool {
    text.strip_prefix("do")
        .filter(|rest| !rest.starts_with(is_ident_char))
        .is_some_and(|rest| !rest.trim_start().starts_with('{'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_complete_statement_is_kept_whole() {
        assert_eq!(split("x = 1 + 2").unwrap(), vec!["x = 1 + 2"]);
        assert_eq!(split("x = 1 + 2;").unwrap(), vec!["x = 1 + 2"]);
    }

    #[test]
    fn test_splits_on_lines_and_semicolons() {
        let statements = split("var x = 0\nwhile(x != 3){x += 1}; x").unwrap();
        assert_eq!(statements, vec!["var x = 0", "while(x != 3){x += 1}", "x"]);
    }

    #[test]
    fn test_trailing_operator_continues() {
        assert_eq!(split("a = 1 +\n  2").unwrap(), vec!["a = 1 + 2"]);
        // postfix update is complete
        assert_eq!(split("i++\nj--").unwrap(), vec!["i++", "j--"]);
    }

    #[test]
    fn test_brace_block_joins_lines() {
        let source = "function test(a,b)\n{\n let x = b + 1\n return a + x\n}";
        assert_eq!(
            split(source).unwrap(),
            vec!["function test(a,b) {let x = b + 1;return a + x;}"]
        );
    }

    #[test]
    fn test_for_header_semicolons_stay_inside() {
        let source = "for(;;){i++\n if (i >= 3)\n break}";
        assert_eq!(split(source).unwrap(), vec!["for(;;){i++;if (i >= 3) break}"]);
    }

    #[test]
    fn test_braceless_loop_body() {
        let statements = split("var x = 0\nwhile(x < 3)\n x += 1\nx").unwrap();
        assert_eq!(statements, vec!["var x = 0", "while(x < 3) x += 1", "x"]);
    }

    #[test]
    fn test_else_and_do_while_join() {
        let statements = split("if (a) {\n b = 1\n}\nelse {\n b = 2\n}").unwrap();
        assert_eq!(statements, vec!["if (a) {b = 1;} else {b = 2;}"]);

        let statements = split("do {\n x += 1\n}\nwhile (x != 3)\nx").unwrap();
        assert_eq!(statements, vec!["do {x += 1;} while (x != 3)", "x"]);
    }

    #[test]
    fn test_braceless_do_while_joins() {
        let statements = split("var i = 0\ndo i++\nwhile (i < 3)\ni").unwrap();
        assert_eq!(statements, vec!["var i = 0", "do i++ while (i < 3)", "i"]);

        let statements = split("do\n  i += 2\nwhile (i < 9)\nwhile (i > 0) i--").unwrap();
        assert_eq!(
            statements,
            vec!["do i += 2 while (i < 9)", "while (i > 0) i--"]
        );
    }

    #[test]
    fn test_quotes_and_comments() {
        let statements = split("s = 'a;b' // note; more\n/* x = 2; */ t = \"{\"").unwrap();
        assert_eq!(statements, vec!["s = 'a;b'", "t = \"{\""]);
    }

    #[test]
    fn test_method_chain_on_next_line() {
        let statements = split("thisComp.layer(1)\n  .position").unwrap();
        assert_eq!(statements, vec!["thisComp.layer(1).position"]);
    }

    #[test]
    fn test_unbalanced_input_is_an_error() {
        let err = split("x = [1,\n 2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEndOfInput);
        assert!(split("function f() {").is_err());
    }

    #[test]
    fn test_blank_input() {
        assert!(split("  \n;\n").unwrap().is_empty());
    }
}
