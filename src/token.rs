// ABOUTME: Tokenizer mapping script source to a priority-ordered token stream

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1},
    combinator::{opt, recognize},
    IResult, Parser,
};

use crate::error::ScriptError;

/// HTTP method keywords, tried before the generic word pattern.
pub const METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

/// The closed keyword set. Keywords outrank identifiers at the same position.
pub const KEYWORDS: &[&str] = &[
    "set", "var", "if", "then", "else", "endif", "while", "do", "endloop", "foreach", "in",
    "repeat", "times", "break", "continue", "extract", "as", "assert", "expect", "header", "body",
    "json", "auth", "basic", "bearer", "timeout", "jsonpath", "regex", "xpath", "status",
    "response", "time", "less", "greater", "contains", "matches", "exists", "empty", "wait",
    "sleep", "log", "debug", "clear", "cookies", "reset", "base", "url", "print", "length",
    "split", "at", "ms", "s", "and", "or", "not",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Method,
    Keyword,
    Str,
    Number,
    Variable,
    Url,
    JsonInline,
    LBracket,
    RBracket,
    Comma,
    Cmp,
    Arith,
    Ident,
}

/// One lexed token with its source position (1-based line and column).
/// For `Str` the lexeme is the unescaped content; for `Variable` it is the
/// name without the `$` sigil.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub col: usize,
}

impl Token {
    fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, col: usize) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            line,
            col,
        }
    }

    pub fn is_kw(&self, name: &str) -> bool {
        self.kind == TokenKind::Keyword && self.lexeme == name
    }
}

/// Tokenize source text. Whitespace and `#` comments are skipped anywhere;
/// `//` comments are recognized only at the start of a line.
pub fn tokenize(src: &str) -> Result<Vec<Token>, ScriptError> {
    let mut tokens = Vec::new();
    let mut rest = src;
    let mut line_has_token = false;

    loop {
        let (remaining, saw_newline) = skip_trivia(rest, line_has_token);
        rest = remaining;
        if saw_newline {
            line_has_token = false;
        }
        if rest.is_empty() {
            break;
        }

        let offset = src.len() - rest.len();
        let (line, col) = position(src, offset);

        match lex_token(rest) {
            Ok((next, (kind, lexeme))) => {
                tokens.push(Token::new(kind, lexeme, line, col));
                rest = next;
                line_has_token = true;
            }
            Err(_) => {
                let near: String = rest.chars().take(12).collect();
                return Err(ScriptError::Lexical { line, col, near });
            }
        }
    }

    Ok(tokens)
}

/// Skip spaces, tabs, newlines, `#` comments, and line-leading `//` comments.
/// Returns the remaining input and whether a newline was crossed.
fn skip_trivia(input: &str, line_has_token: bool) -> (&str, bool) {
    let mut rest = input;
    let mut saw_newline = false;
    let mut at_line_start = !line_has_token;

    loop {
        if let Some(stripped) = rest.strip_prefix('\n') {
            rest = stripped;
            saw_newline = true;
            at_line_start = true;
        } else if let Some(stripped) = rest.strip_prefix([' ', '\t', '\r']) {
            rest = stripped;
        } else if rest.starts_with('#') || (at_line_start && rest.starts_with("//")) {
            match rest.find('\n') {
                Some(pos) => rest = &rest[pos..],
                None => rest = "",
            }
        } else {
            break;
        }
    }

    (rest, saw_newline)
}

/// 1-based (line, col) of a byte offset into the source.
fn position(src: &str, offset: usize) -> (usize, usize) {
    let before = &src[..offset];
    let line = before.matches('\n').count() + 1;
    let col = offset - before.rfind('\n').map(|p| p + 1).unwrap_or(0) + 1;
    (line, col)
}

/// One token, trying patterns in priority order. The word pattern sits last
/// so every keyword beats the identifier rule at the same position.
fn lex_token(input: &str) -> IResult<&str, (TokenKind, String)> {
    alt((
        lex_string,
        lex_url,
        lex_json_inline,
        lex_number,
        lex_cmp,
        lex_arith,
        lex_punct,
        lex_variable,
        lex_word,
    ))
    .parse(input)
}

/// Double-quoted string honoring \" \\ \n \t \r escapes.
fn lex_string(input: &str) -> IResult<&str, (TokenKind, String)> {
    let (rest, _) = char('"')(input)?;
    let mut out = String::new();
    let mut chars = rest.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((&rest[i + 1..], (TokenKind::Str, out))),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, other)) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            },
            '\n' => break,
            _ => out.push(c),
        }
    }

    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

/// A literal http(s) URL up to the next whitespace.
fn lex_url(input: &str) -> IResult<&str, (TokenKind, String)> {
    recognize((
        alt((tag("http://"), tag("https://"))),
        take_while(|c: char| !c.is_whitespace()),
    ))
    .map(|url: &str| (TokenKind::Url, url.to_string()))
    .parse(input)
}

/// A brace-balanced JSON object literal with at most one level of nested
/// object. Deeper nesting must use the quoted-string JSON form.
fn lex_json_inline(input: &str) -> IResult<&str, (TokenKind, String)> {
    let fail = || nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Verify));

    if !input.starts_with('{') {
        return Err(fail());
    }

    let mut depth = 0usize;
    let mut in_str = false;
    let mut escape = false;

    for (i, c) in input.char_indices() {
        if in_str {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_str = false;
            }
            continue;
        }
        match c {
            '"' => in_str = true,
            '{' => {
                depth += 1;
                if depth > 2 {
                    return Err(fail());
                }
            }
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = i + 1;
                    return Ok((&input[end..], (TokenKind::JsonInline, input[..end].to_string())));
                }
            }
            '\n' => return Err(fail()),
            _ => {}
        }
    }

    Err(fail())
}

/// Integer or decimal, with optional leading minus.
fn lex_number(input: &str) -> IResult<&str, (TokenKind, String)> {
    recognize((opt(char('-')), digit1, opt((char('.'), digit1))))
        .map(|num: &str| (TokenKind::Number, num.to_string()))
        .parse(input)
}

fn lex_cmp(input: &str) -> IResult<&str, (TokenKind, String)> {
    alt((tag("=="), tag("!="), tag(">="), tag("<="), tag(">"), tag("<")))
        .map(|op: &str| (TokenKind::Cmp, op.to_string()))
        .parse(input)
}

fn lex_arith(input: &str) -> IResult<&str, (TokenKind, String)> {
    alt((tag("+"), tag("-"), tag("*"), tag("/")))
        .map(|op: &str| (TokenKind::Arith, op.to_string()))
        .parse(input)
}

fn lex_punct(input: &str) -> IResult<&str, (TokenKind, String)> {
    alt((
        tag("[").map(|_| (TokenKind::LBracket, "[".to_string())),
        tag("]").map(|_| (TokenKind::RBracket, "]".to_string())),
        tag(",").map(|_| (TokenKind::Comma, ",".to_string())),
    ))
    .parse(input)
}

/// `$` followed by an identifier; the lexeme drops the sigil.
fn lex_variable(input: &str) -> IResult<&str, (TokenKind, String)> {
    let (rest, _) = char('$')(input)?;
    let (rest, name) = ident_chars(rest)?;
    Ok((rest, (TokenKind::Variable, name.to_string())))
}

/// Bare word, classified method > keyword > identifier. `AND`/`OR`/`NOT`
/// canonicalize to their lowercase keyword forms.
fn lex_word(input: &str) -> IResult<&str, (TokenKind, String)> {
    let (rest, word) = ident_chars(input)?;

    if METHODS.contains(&word) {
        return Ok((rest, (TokenKind::Method, word.to_string())));
    }
    if KEYWORDS.contains(&word) {
        return Ok((rest, (TokenKind::Keyword, word.to_string())));
    }
    if matches!(word, "AND" | "OR" | "NOT") {
        return Ok((rest, (TokenKind::Keyword, word.to_lowercase())));
    }

    Ok((rest, (TokenKind::Ident, word.to_string())))
}

fn ident_chars(input: &str) -> IResult<&str, &str> {
    recognize((
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))
    .parse(input)
}
