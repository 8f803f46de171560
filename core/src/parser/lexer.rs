//! Tokenizer for the target language's lexical grammar, built on `winnow`
//! combinators: small composable parsers over a byte/str stream rather than
//! a hand-rolled character-by-character loop.

use winnow::ascii::{digit1, multispace0};
use winnow::combinator::{alt, opt, preceded};
use winnow::token::{one_of, take_while};
use winnow::{PResult, Parser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn join(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Keyword(Keyword),
    Number(String),
    Str(String),
    // Punctuation / operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Hash,
    Eq,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Assign,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semi,
    Colon,
    DoubleColon,
    Comma,
    Dot,
    DotDot,
    Ellipsis,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    And,
    Break,
    Do,
    Else,
    Elseif,
    End,
    False,
    For,
    Function,
    If,
    In,
    Local,
    Nil,
    Not,
    Or,
    Repeat,
    Return,
    Then,
    True,
    Until,
    While,
}

impl Keyword {
    fn from_str(s: &str) -> Option<Keyword> {
        use Keyword::*;
        Some(match s {
            "and" => And,
            "break" => Break,
            "do" => Do,
            "else" => Else,
            "elseif" => Elseif,
            "end" => End,
            "false" => False,
            "for" => For,
            "function" => Function,
            "if" => If,
            "in" => In,
            "local" => Local,
            "nil" => Nil,
            "not" => Not,
            "or" => Or,
            "repeat" => Repeat,
            "return" => Return,
            "then" => Then,
            "true" => True,
            "until" => Until,
            "while" => While,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// True if at least one newline separated this token from the previous
    /// one. The instrumenter (C7) uses this to decide whether a tracking
    /// call can be appended "on the same line" as a keyword.
    pub preceded_by_newline: bool,
}

#[derive(Debug, Clone)]
pub struct LexError {
    pub offset: usize,
    pub message: String,
}

/// Tokenizes `source`, skipping whitespace and comments (both `--` line
/// comments and `--[=*[ ... ]=*]` block comments). Long-bracket strings are
/// tokenized whole, spanning however many lines they cover.
pub fn tokenize(source: &[u8]) -> Result<Vec<Token>, LexError> {
    let text = std::str::from_utf8(source)
        .map_err(|e| LexError {
            offset: e.valid_up_to(),
            message: "source is not valid UTF-8".to_string(),
        })?;

    let mut tokens = Vec::new();
    let mut rest = text;
    let mut offset = 0usize;
    let mut saw_newline = false;

    loop {
        let before_trivia_len = rest.len();
        skip_trivia(&mut rest, &mut saw_newline);
        offset += before_trivia_len - rest.len();

        if rest.is_empty() {
            tokens.push(Token {
                kind: TokenKind::Eof,
                span: Span::new(offset, offset),
                preceded_by_newline: saw_newline,
            });
            break;
        }

        let start = offset;
        let before_len = rest.len();
        let kind = next_token(&mut rest).map_err(|_| LexError {
            offset,
            message: format!("unrecognized token near byte {offset}"),
        })?;
        let consumed = before_len - rest.len();
        offset += consumed;

        tokens.push(Token {
            kind,
            span: Span::new(start, offset),
            preceded_by_newline: saw_newline,
        });
        saw_newline = false;
    }

    Ok(tokens)
}

fn skip_trivia(input: &mut &str, saw_newline: &mut bool) {
    loop {
        let before = input.len();

        let ws: &str = multispace0.parse_next(input).unwrap_or("");
        if ws.contains('\n') {
            *saw_newline = true;
        }

        if input.starts_with("--") {
            let after_dashes = &input[2..];
            if let Some(level) = long_bracket_level(after_dashes) {
                if let Some(end) = find_long_bracket_close(after_dashes, level) {
                    *saw_newline = *saw_newline || after_dashes[..end].contains('\n');
                    *input = &after_dashes[end..];
                    continue;
                }
                // Unterminated block comment: consume to EOF.
                *input = "";
                continue;
            }
            // Line comment: consume to end of line (not the newline itself;
            // the next loop iteration's multispace0 eats it).
            let len = input.find('\n').unwrap_or(input.len());
            *input = &input[len..];
            continue;
        }

        if before == input.len() {
            break;
        }
    }
}

/// If `input` starts with `[=*[`, returns the `=` level.
fn long_bracket_level(input: &str) -> Option<usize> {
    let bytes = input.as_bytes();
    if bytes.first() != Some(&b'[') {
        return None;
    }
    let mut level = 0;
    while bytes.get(1 + level) == Some(&b'=') {
        level += 1;
    }
    if bytes.get(1 + level) == Some(&b'[') {
        Some(level)
    } else {
        None
    }
}

/// Finds the byte offset just past the matching `]=*]` for a long bracket of
/// the given `level`, assuming `input` starts at the opening `[=*[`.
fn find_long_bracket_close(input: &str, level: usize) -> Option<usize> {
    let open_len = level + 2;
    let body = &input[open_len..];
    let close = format!("]{}]", "=".repeat(level));
    body.find(&close).map(|i| open_len + i + close.len())
}

fn next_token(input: &mut &str) -> PResult<TokenKind> {
    alt((
        long_string,
        quoted_string,
        number,
        ident_or_keyword,
        operator,
    ))
    .parse_next(input)
}

fn long_string(input: &mut &str) -> PResult<TokenKind> {
    let start_rest = *input;
    if let Some(level) = long_bracket_level(start_rest) {
        if let Some(end) = find_long_bracket_close(start_rest, level) {
            let full = &start_rest[..end];
            let open_len = level + 2;
            let close_len = level + 2;
            let body = &full[open_len..full.len() - close_len];
            *input = &start_rest[end..];
            return Ok(TokenKind::Str(body.to_string()));
        }
    }
    Err(winnow::error::ErrMode::Backtrack(
        winnow::error::ContextError::new(),
    ))
}

fn quoted_string(input: &mut &str) -> PResult<TokenKind> {
    let quote = one_of(['"', '\'']).parse_next(input)?;
    let mut out = String::new();
    loop {
        let c = input.chars().next().ok_or_else(|| {
            winnow::error::ErrMode::Backtrack(winnow::error::ContextError::new())
        })?;
        if c == quote {
            *input = &input[1..];
            break;
        }
        if c == '\\' {
            *input = &input[1..];
            let escaped = input.chars().next().ok_or_else(|| {
                winnow::error::ErrMode::Backtrack(winnow::error::ContextError::new())
            })?;
            let resolved = match escaped {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            };
            out.push(resolved);
            *input = &input[escaped.len_utf8()..];
            continue;
        }
        out.push(c);
        *input = &input[c.len_utf8()..];
    }
    Ok(TokenKind::Str(out))
}

fn number(input: &mut &str) -> PResult<TokenKind> {
    let start = *input;
    let mut consumed = 0usize;
    let whole: &str = digit1.parse_next(input)?;
    consumed += whole.len();
    if let Some(rest) = input.strip_prefix('.') {
        let tail = rest;
        let mut tail_mut = tail;
        if let Ok(frac) = digit1.parse_next(&mut tail_mut) {
            consumed += 1 + frac.len();
            *input = tail_mut;
        }
    }
    if let Some(rest) = input.strip_prefix(['e', 'E']) {
        let mut tail_mut = rest;
        let sign: Option<char> = opt(one_of(['+', '-'])).parse_next(&mut tail_mut).ok().flatten();
        if let Ok(exp) = digit1.parse_next(&mut tail_mut) {
            consumed += 1 + sign.map(|_| 1).unwrap_or(0) + exp.len();
            *input = tail_mut;
        }
    }
    Ok(TokenKind::Number(start[..consumed].to_string()))
}

fn ident_or_keyword(input: &mut &str) -> PResult<TokenKind> {
    let ident: &str = (
        one_of(|c: char| c.is_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)?;
    Ok(match Keyword::from_str(ident) {
        Some(kw) => TokenKind::Keyword(kw),
        None => TokenKind::Ident(ident.to_string()),
    })
}

fn operator(input: &mut &str) -> PResult<TokenKind> {
    macro_rules! lit {
        ($s:literal, $tok:expr) => {
            preceded($s, winnow::combinator::empty).value($tok)
        };
    }
    alt((
        lit!("...", TokenKind::Ellipsis),
        lit!("..", TokenKind::DotDot),
        lit!("==", TokenKind::EqEq),
        lit!("~=", TokenKind::NotEq),
        lit!("<=", TokenKind::LtEq),
        lit!(">=", TokenKind::GtEq),
        lit!("::", TokenKind::DoubleColon),
        lit!("+", TokenKind::Plus),
        lit!("-", TokenKind::Minus),
        lit!("*", TokenKind::Star),
        lit!("/", TokenKind::Slash),
        lit!("%", TokenKind::Percent),
        lit!("^", TokenKind::Caret),
        lit!("#", TokenKind::Hash),
        lit!("<", TokenKind::Lt),
        lit!(">", TokenKind::Gt),
        lit!("=", TokenKind::Assign),
        lit!("(", TokenKind::LParen),
        lit!(")", TokenKind::RParen),
        lit!("{", TokenKind::LBrace),
        lit!("}", TokenKind::RBrace),
        lit!("[", TokenKind::LBracket),
        lit!("]", TokenKind::RBracket),
        lit!(";", TokenKind::Semi),
        lit!(":", TokenKind::Colon),
        lit!(",", TokenKind::Comma),
        lit!(".", TokenKind::Dot),
    ))
    .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src.as_bytes())
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn tokenizes_local_assignment() {
        let k = kinds("local x = 1\n");
        assert_eq!(
            k,
            vec![
                TokenKind::Keyword(Keyword::Local),
                TokenKind::Ident("x".into()),
                TokenKind::Assign,
                TokenKind::Number("1".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_line_comments() {
        let k = kinds("-- a comment\nlocal x = 1\n");
        assert_eq!(k[0], TokenKind::Keyword(Keyword::Local));
    }

    #[test]
    fn skips_block_comments_spanning_lines() {
        let k = kinds("--[[\nblock\n]]\nlocal x = 1\n");
        assert_eq!(k[0], TokenKind::Keyword(Keyword::Local));
    }

    #[test]
    fn reads_long_string_literal() {
        let k = kinds("local s = [[hello\nworld]]\n");
        assert!(k.contains(&TokenKind::Str("hello\nworld".to_string())));
    }

    #[test]
    fn reads_quoted_string_with_escapes() {
        let k = kinds("local s = \"a\\nb\"\n");
        assert!(k.contains(&TokenKind::Str("a\nb".to_string())));
    }

    #[test]
    fn reads_compound_operators() {
        let k = kinds("a and b < 10\n");
        assert_eq!(
            k,
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Keyword(Keyword::And),
                TokenKind::Ident("b".into()),
                TokenKind::Lt,
                TokenKind::Number("10".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tracks_newline_boundaries() {
        let toks = tokenize(b"local x = 1\nlocal y = 2\n").unwrap();
        let second_local = &toks[4]; // local, x, =, 1, local, ...
        assert_eq!(second_local.kind, TokenKind::Keyword(Keyword::Local));
        assert!(second_local.preceded_by_newline);
    }
}
