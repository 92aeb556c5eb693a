use crate::language::{
    errors::SyntaxError,
    span::{SourcePos, Span},
    token::{Token, TokenKind},
};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, digit1},
    combinator::{map_res, recognize},
    multi::many0,
    sequence::pair,
    IResult, Parser as NomParser,
};

pub fn lex(source: &str) -> Result<Vec<Token>, Vec<SyntaxError>> {
    Lexer::new(source).run()
}

fn scan_identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

fn scan_integer(input: &str) -> IResult<&str, i64> {
    map_res(digit1, str::parse).parse(input)
}

/// Indentation-aware lexer. Block structure is reported as `Indent`/`Dedent`
/// tokens around `Newline`s; both are suppressed inside brackets so that long
/// list, map, and argument lists can wrap freely.
struct Lexer<'a> {
    src: &'a str,
    offset: usize,
    line: u32,
    col: u32,
    tokens: Vec<Token>,
    errors: Vec<SyntaxError>,
    indents: Vec<u32>,
    bracket_depth: u32,
    line_has_content: bool,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            offset: 0,
            line: 1,
            col: 1,
            tokens: Vec::new(),
            errors: Vec::new(),
            indents: vec![0],
            bracket_depth: 0,
            line_has_content: false,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, Vec<SyntaxError>> {
        self.handle_line_start();
        while let Some(ch) = self.current() {
            match ch {
                '\n' => self.end_line(),
                '/' if self.peek() == Some('/') => self.eat_line_comment(),
                '/' if self.peek() == Some('*') => self.eat_block_comment(),
                ch if ch == ' ' || ch == '\t' || ch == '\r' => {
                    self.bump();
                }
                ch if ch.is_ascii_alphabetic() || ch == '_' => self.lex_identifier(),
                ch if ch.is_ascii_digit() => self.lex_number(),
                '"' | '\'' => self.lex_string(ch),
                _ => self.lex_symbol(),
            }
        }
        if self.line_has_content {
            self.push_zero_width(TokenKind::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push_zero_width(TokenKind::Dedent);
        }
        self.push_zero_width(TokenKind::Eof);

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.offset..]
    }

    fn current(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek(&self) -> Option<char> {
        let mut chars = self.rest().chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        if let Some(ch) = self.current() {
            self.offset += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        self.current()
    }

    fn pos(&self) -> SourcePos {
        SourcePos::new(self.line, self.col)
    }

    fn push_token(&mut self, kind: TokenKind, start: usize, end: usize, pos: SourcePos) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, end),
            pos,
        });
    }

    fn push_zero_width(&mut self, kind: TokenKind) {
        let pos = self.pos();
        self.push_token(kind, self.offset, self.offset, pos);
    }

    fn error(&mut self, start: usize, end: usize, message: impl Into<String>) {
        self.errors
            .push(SyntaxError::new(message, Span::new(start, end)));
    }

    /// Measures leading whitespace and emits `Indent`/`Dedent` tokens against
    /// the indentation stack. Tabs advance to the next eight-column stop.
    fn handle_line_start(&mut self) {
        self.line_has_content = false;
        if self.bracket_depth > 0 {
            return;
        }
        let mut width: u32 = 0;
        loop {
            match self.current() {
                Some(' ') => {
                    width += 1;
                    self.bump();
                }
                Some('\t') => {
                    width = (width / 8 + 1) * 8;
                    self.bump();
                }
                _ => break,
            }
        }
        // Blank and comment-only lines do not affect block structure.
        match self.current() {
            None | Some('\n') | Some('\r') => return,
            Some('/') if self.peek() == Some('/') || self.peek() == Some('*') => return,
            _ => {}
        }

        let top = *self.indents.last().unwrap_or(&0);
        if width > top {
            self.indents.push(width);
            self.push_zero_width(TokenKind::Indent);
        } else if width < top {
            while self
                .indents
                .last()
                .map(|level| *level > width)
                .unwrap_or(false)
            {
                self.indents.pop();
                self.push_zero_width(TokenKind::Dedent);
            }
            if *self.indents.last().unwrap_or(&0) != width {
                self.error(
                    self.offset,
                    self.offset,
                    "Inconsistent indentation: does not match any enclosing block",
                );
                self.indents.push(width);
            }
        }
    }

    fn end_line(&mut self) {
        if self.bracket_depth == 0 && self.line_has_content {
            self.push_zero_width(TokenKind::Newline);
        }
        self.bump();
        self.handle_line_start();
    }

    fn eat_line_comment(&mut self) {
        while let Some(ch) = self.current() {
            if ch == '\n' {
                return;
            }
            self.bump();
        }
    }

    fn eat_block_comment(&mut self) {
        let start = self.offset;
        self.bump();
        self.bump();
        while let Some(ch) = self.current() {
            if ch == '*' && self.peek() == Some('/') {
                self.bump();
                self.bump();
                return;
            }
            self.bump();
        }
        self.error(start, self.offset, "Unterminated block comment");
    }

    fn lex_identifier(&mut self) {
        let start = self.offset;
        let pos = self.pos();
        let Ok((_, word)) = scan_identifier(self.rest()) else {
            self.bump();
            self.error(start, self.offset, "Invalid identifier");
            return;
        };
        for _ in word.chars() {
            self.bump();
        }
        let kind = TokenKind::keyword(word).unwrap_or_else(|| TokenKind::Identifier(word.to_string()));
        self.push_token(kind, start, self.offset, pos);
        self.line_has_content = true;
    }

    fn lex_number(&mut self) {
        let start = self.offset;
        let pos = self.pos();
        match scan_integer(self.rest()) {
            Ok((rest, value)) => {
                let consumed = self.rest().len() - rest.len();
                for _ in 0..consumed {
                    self.bump();
                }
                self.push_token(TokenKind::Integer(value), start, self.offset, pos);
            }
            Err(_) => {
                while self.current().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                    self.bump();
                }
                self.error(start, self.offset, "Invalid integer literal");
            }
        }
        self.line_has_content = true;
    }

    fn lex_string(&mut self, quote: char) {
        let start = self.offset;
        let pos = self.pos();
        self.bump();
        let mut value = String::new();
        while let Some(ch) = self.current() {
            match ch {
                ch if ch == quote => {
                    self.bump();
                    self.push_token(TokenKind::Str(value), start, self.offset, pos);
                    self.line_has_content = true;
                    return;
                }
                '\n' => break,
                '\\' => {
                    self.bump();
                    match self.current() {
                        Some('n') => value.push('\n'),
                        Some('r') => value.push('\r'),
                        Some('t') => value.push('\t'),
                        Some(other) => value.push(other),
                        None => break,
                    }
                    self.bump();
                }
                _ => {
                    value.push(ch);
                    self.bump();
                }
            }
        }
        self.error(start, self.offset, "Unterminated string literal");
        self.line_has_content = true;
    }

    fn lex_symbol(&mut self) {
        let start = self.offset;
        let pos = self.pos();
        let Some(ch) = self.current() else { return };
        let kind = match ch {
            '(' => {
                self.bracket_depth += 1;
                self.bump();
                TokenKind::LParen
            }
            ')' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                self.bump();
                TokenKind::RParen
            }
            '[' => {
                self.bracket_depth += 1;
                self.bump();
                TokenKind::LBracket
            }
            ']' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                self.bump();
                TokenKind::RBracket
            }
            '{' => {
                self.bracket_depth += 1;
                self.bump();
                TokenKind::LBrace
            }
            '}' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                self.bump();
                TokenKind::RBrace
            }
            ',' => {
                self.bump();
                TokenKind::Comma
            }
            '.' => {
                self.bump();
                TokenKind::Dot
            }
            ':' => {
                self.bump();
                TokenKind::Colon
            }
            '*' => {
                self.bump();
                TokenKind::Star
            }
            '/' => {
                self.bump();
                TokenKind::Slash
            }
            '+' => {
                self.bump();
                if self.current() == Some('=') {
                    self.bump();
                    TokenKind::PlusAssign
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                self.bump();
                TokenKind::Minus
            }
            '<' => {
                self.bump();
                if self.current() == Some('=') {
                    self.bump();
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                self.bump();
                if self.current() == Some('=') {
                    self.bump();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '=' => {
                self.bump();
                if self.current() == Some('=') {
                    self.bump();
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                self.bump();
                if self.current() == Some('=') {
                    self.bump();
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            '&' => {
                self.bump();
                if self.current() == Some('&') {
                    self.bump();
                    TokenKind::AndAnd
                } else {
                    self.error(start, self.offset, "Expected '&&'");
                    return;
                }
            }
            '|' => {
                self.bump();
                if self.current() == Some('|') {
                    self.bump();
                    TokenKind::OrOr
                } else {
                    self.error(start, self.offset, "Expected '||'");
                    return;
                }
            }
            other => {
                self.bump();
                self.error(
                    start,
                    self.offset,
                    format!("Unexpected character '{}'", other),
                );
                return;
            }
        };
        self.push_token(kind, start, self.offset, pos);
        self.line_has_content = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("lex failure")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_assignment_line() {
        assert_eq!(
            kinds("x = 5\n"),
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::Assign,
                TokenKind::Integer(5),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn emits_indent_and_dedent_around_blocks() {
        let toks = kinds("if a:\n\tb = 1\nc = 2\n");
        assert!(toks.contains(&TokenKind::Indent));
        assert!(toks.contains(&TokenKind::Dedent));
        let indent = toks.iter().position(|k| *k == TokenKind::Indent);
        let dedent = toks.iter().position(|k| *k == TokenKind::Dedent);
        assert!(indent < dedent);
    }

    #[test]
    fn blank_and_comment_lines_do_not_break_blocks() {
        let toks = kinds("if a:\n  b = 1\n\n  // note\n  c = 2\n");
        let dedents = toks.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(dedents, 1);
    }

    #[test]
    fn newlines_inside_brackets_are_suppressed() {
        let toks = kinds("a = [1,\n  2,\n  3]\n");
        let newlines = toks.iter().filter(|k| **k == TokenKind::Newline).count();
        assert_eq!(newlines, 1);
        assert!(!toks.contains(&TokenKind::Indent));
    }

    #[test]
    fn both_quote_styles_and_escapes() {
        assert_eq!(
            kinds(r#"s = 'it' + "a\n""#),
            vec![
                TokenKind::Identifier("s".into()),
                TokenKind::Assign,
                TokenKind::Str("it".into()),
                TokenKind::Plus,
                TokenKind::Str("a\n".into()),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn block_comments_span_lines() {
        let toks = kinds("a = 1 /* x\n y */ + 2\n");
        assert!(toks.contains(&TokenKind::Plus));
    }

    #[test]
    fn inconsistent_indentation_is_an_error() {
        let errs = lex("if a:\n    b = 1\n  c = 2\n").expect_err("should fail");
        assert!(errs[0].message.contains("indentation"));
    }

    #[test]
    fn keywords_are_not_identifiers() {
        assert_eq!(kinds("pass\n")[0], TokenKind::Pass);
        assert_eq!(
            kinds("passport\n")[0],
            TokenKind::Identifier("passport".into())
        );
    }
}
