//! # Markup Decoder
//!
//! Parses block-structured, HCL-like configuration text into the generic
//! [`Value`] tree. The decoder knows nothing about the configuration schema.
//!
//! ```text
//! consul {
//!   address = "127.0.0.1:8500"
//!   retry { attempts = 5 }
//! }
//! prefix { source = "global/" }
//! prefix { source = "app/" }
//! ```
//!
//! Every block decodes to a mapping appended to a sequence under its key, so
//! `consul` above becomes a one-element sequence and `prefix` a two-element
//! one. Deciding what a repeated block means is left to the normalizer.
//!
//! Text starting with `{` or `[` is decoded as JSON instead; the markup
//! family accepts JSON documents, and nested JSON objects get the same
//! sequence-of-mappings shape as blocks.

use crate::error::DecodeError;
use crate::value::{Map, Value, json_object};
use std::collections::HashSet;

/// Decode configuration text into a generic mapping.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// First stage of the pipeline. Produces a schema-agnostic tree that keeps
/// the source's structural ambiguity intact.
///
/// ## Usage
/// ```rust
/// use replicate_config::decoder::decode;
/// use replicate_config::Value;
///
/// let root = decode("log_level = \"INFO\"").unwrap();
/// assert_eq!(root["log_level"], Value::from("INFO"));
/// ```
///
/// ## Error Handling
/// Returns `DecodeError` with line and column for any syntax problem, and
/// when the document root is not a mapping.
pub fn decode(input: &str) -> Result<Map, DecodeError> {
    match input.trim_start().chars().next() {
        Some('{') | Some('[') => decode_json(input),
        _ => {
            let tokens = Lexer::new(input).tokenize()?;
            Parser::new(tokens).parse_root()
        }
    }
}

fn decode_json(input: &str) -> Result<Map, DecodeError> {
    let json: serde_json::Value = serde_json::from_str(input)
        .map_err(|e| DecodeError::new(e.line(), e.column(), e.to_string()))?;

    match json {
        serde_json::Value::Object(obj) => Ok(json_object(obj)),
        other => Err(DecodeError::new(
            1,
            1,
            format!(
                "root of the configuration must be a mapping, got {}",
                Value::from(other).kind()
            ),
        )),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Equals,
    Comma,
    Newline,
    Eof,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) => format!("identifier '{}'", s),
            TokenKind::Str(_) => "string".to_string(),
            TokenKind::Int(_) | TokenKind::Float(_) => "number".to_string(),
            TokenKind::LBrace => "'{'".to_string(),
            TokenKind::RBrace => "'}'".to_string(),
            TokenKind::LBracket => "'['".to_string(),
            TokenKind::RBracket => "']'".to_string(),
            TokenKind::Equals => "'='".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Newline => "newline".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: usize,
    column: usize,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_second(&self) -> Option<char> {
        let mut it = self.chars.clone();
        it.next();
        it.next()
    }

    fn error(&self, line: usize, column: usize, message: impl Into<String>) -> DecodeError {
        DecodeError::new(line, column, message)
    }

    fn tokenize(mut self) -> Result<Vec<Token>, DecodeError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, DecodeError> {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.bump();
                }
                Some('#') => self.skip_line(),
                Some('/') if self.peek_second() == Some('/') => self.skip_line(),
                Some('/') if self.peek_second() == Some('*') => self.skip_block_comment()?,
                _ => break,
            }
        }

        let (line, column) = (self.line, self.column);
        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                line,
                column,
            });
        };

        let kind = match c {
            '\n' => self.single(TokenKind::Newline),
            '{' => self.single(TokenKind::LBrace),
            '}' => self.single(TokenKind::RBrace),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            '=' => self.single(TokenKind::Equals),
            ',' => self.single(TokenKind::Comma),
            '"' => TokenKind::Str(self.string(line, column)?),
            '<' if self.peek_second() == Some('<') => TokenKind::Str(self.heredoc(line, column)?),
            '-' | '0'..='9' => self.number(line, column)?,
            c if c.is_alphabetic() || c == '_' => TokenKind::Ident(self.ident()),
            other => {
                return Err(self.error(line, column, format!("unexpected character {:?}", other)));
            }
        };

        Ok(Token { kind, line, column })
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), DecodeError> {
        let (line, column) = (self.line, self.column);
        self.bump();
        self.bump();
        loop {
            match self.bump() {
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => {}
                None => return Err(self.error(line, column, "unterminated block comment")),
            }
        }
    }

    fn ident(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        out
    }

    fn string(&mut self, line: usize, column: usize) -> Result<String, DecodeError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error(line, column, "unterminated string")),
                Some('"') => return Ok(out),
                Some('\\') => {
                    let (esc_line, esc_column) = (self.line, self.column);
                    match self.bump() {
                        Some('n') => out.push('\n'),
                        Some('t') => out.push('\t'),
                        Some('r') => out.push('\r'),
                        Some('"') => out.push('"'),
                        Some('\\') => out.push('\\'),
                        Some('u') => out.push(self.unicode_escape(esc_line, esc_column)?),
                        Some(other) => {
                            return Err(self.error(
                                esc_line,
                                esc_column,
                                format!("invalid escape sequence \\{}", other),
                            ));
                        }
                        None => return Err(self.error(line, column, "unterminated string")),
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn unicode_escape(&mut self, line: usize, column: usize) -> Result<char, DecodeError> {
        let mut hex = String::with_capacity(4);
        for _ in 0..4 {
            match self.bump() {
                Some(c) if c.is_ascii_hexdigit() => hex.push(c),
                _ => return Err(self.error(line, column, "invalid unicode escape")),
            }
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error(line, column, "invalid unicode escape"))
    }

    fn heredoc(&mut self, line: usize, column: usize) -> Result<String, DecodeError> {
        self.bump();
        self.bump();
        let indented = if self.peek() == Some('-') {
            self.bump();
            true
        } else {
            false
        };

        let anchor = self.ident();
        if anchor.is_empty() {
            return Err(self.error(line, column, "heredoc requires an anchor identifier"));
        }
        if self.peek() == Some('\r') {
            self.bump();
        }
        if self.bump() != Some('\n') {
            return Err(self.error(line, column, "heredoc anchor must end the line"));
        }

        let mut lines = Vec::new();
        let mut current = String::new();
        loop {
            match self.bump() {
                Some('\n') => {
                    if current.ends_with('\r') {
                        current.pop();
                    }
                    if current.trim() == anchor {
                        break;
                    }
                    lines.push(std::mem::take(&mut current));
                }
                Some(c) => current.push(c),
                None => {
                    if current.trim() == anchor {
                        break;
                    }
                    return Err(self.error(
                        line,
                        column,
                        format!("heredoc not terminated by {}", anchor),
                    ));
                }
            }
        }

        // Only ASCII spaces and tabs count as indentation, so every cut
        // lands on a char boundary.
        if indented {
            let indent = lines
                .iter()
                .filter(|l| !l.trim().is_empty())
                .map(|l| ascii_indent(l))
                .min()
                .unwrap_or(0);
            for l in &mut lines {
                let cut = indent.min(ascii_indent(l));
                l.drain(..cut);
            }
        }

        let mut out = lines.join("\n");
        if !lines.is_empty() {
            out.push('\n');
        }
        Ok(out)
    }

    fn number(&mut self, line: usize, column: usize) -> Result<TokenKind, DecodeError> {
        let mut text = String::new();
        if self.peek() == Some('-') {
            text.push('-');
            self.bump();
            if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                return Err(self.error(line, column, "expected digit after '-'"));
            }
        }

        if self.peek() == Some('0') && matches!(self.peek_second(), Some('x') | Some('X')) {
            self.bump();
            self.bump();
            let mut hex = String::new();
            while let Some(c) = self.peek().filter(|c| c.is_ascii_hexdigit()) {
                hex.push(c);
                self.bump();
            }
            let magnitude = i64::from_str_radix(&hex, 16)
                .map_err(|e| self.error(line, column, format!("invalid hex number: {}", e)))?;
            return Ok(TokenKind::Int(if text.is_empty() { magnitude } else { -magnitude }));
        }

        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => text.push(c),
                '.' if !is_float => {
                    is_float = true;
                    text.push(c);
                }
                'e' | 'E' => {
                    is_float = true;
                    text.push(c);
                    self.bump();
                    if let Some(sign @ ('+' | '-')) = self.peek() {
                        text.push(sign);
                    } else {
                        continue;
                    }
                }
                _ => break,
            }
            self.bump();
        }

        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| self.error(line, column, format!("invalid number {:?}", text)))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| self.error(line, column, format!("invalid number {:?}", text)))
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn unexpected(token: &Token, expected: &str) -> DecodeError {
        DecodeError::new(
            token.line,
            token.column,
            format!("expected {}, found {}", expected, token.kind.describe()),
        )
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek().kind, TokenKind::Newline | TokenKind::Comma) {
            self.next();
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek().kind == TokenKind::Newline {
            self.next();
        }
    }

    fn parse_root(&mut self) -> Result<Map, DecodeError> {
        self.parse_body(false)
    }

    /// Parses items until end of input (root) or the closing brace (nested).
    fn parse_body(&mut self, nested: bool) -> Result<Map, DecodeError> {
        let mut body = BodyBuilder::default();

        loop {
            self.skip_separators();
            let token = self.next();
            let key = match token.kind {
                TokenKind::Eof if nested => return Err(Self::unexpected(&token, "'}'")),
                TokenKind::Eof => break,
                TokenKind::RBrace if nested => break,
                TokenKind::Ident(key) | TokenKind::Str(key) => key,
                _ => return Err(Self::unexpected(&token, "key")),
            };

            let mut labels = Vec::new();
            loop {
                let token = self.next();
                match token.kind {
                    TokenKind::Equals if labels.is_empty() => {
                        match self.parse_value()? {
                            Value::Map(object) => body.block(key, object),
                            value => body.assign(key, value),
                        }
                        break;
                    }
                    TokenKind::LBrace => {
                        let inner = self.parse_body(true)?;
                        body.block(key, nest_labels(labels, inner));
                        break;
                    }
                    TokenKind::Ident(label) | TokenKind::Str(label) => labels.push(label),
                    _ if labels.is_empty() => {
                        return Err(Self::unexpected(&token, "'=' or '{' after key"));
                    }
                    _ => return Err(Self::unexpected(&token, "'{' after block labels")),
                }
            }
        }

        Ok(body.finish())
    }

    fn parse_value(&mut self) -> Result<Value, DecodeError> {
        let token = self.next();
        match token.kind {
            TokenKind::Str(s) => Ok(Value::String(s)),
            TokenKind::Int(i) => Ok(Value::Integer(i)),
            TokenKind::Float(f) => Ok(Value::Float(f)),
            TokenKind::Ident(ref word) if word == "true" => Ok(Value::Bool(true)),
            TokenKind::Ident(ref word) if word == "false" => Ok(Value::Bool(false)),
            TokenKind::LBrace => Ok(Value::Map(self.parse_body(true)?)),
            TokenKind::LBracket => self.parse_list(),
            _ => Err(Self::unexpected(&token, "value")),
        }
    }

    fn parse_list(&mut self) -> Result<Value, DecodeError> {
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.peek().kind == TokenKind::RBracket {
                self.next();
                return Ok(Value::Sequence(items));
            }

            items.push(self.parse_value()?);

            self.skip_newlines();
            let token = self.next();
            match token.kind {
                TokenKind::Comma => {}
                TokenKind::RBracket => return Ok(Value::Sequence(items)),
                _ => return Err(Self::unexpected(&token, "',' or ']'")),
            }
        }
    }
}

/// `a "b" "c" { body }` decodes as `a { b { c { body } } }`.
fn nest_labels(labels: Vec<String>, body: Map) -> Map {
    labels.into_iter().rev().fold(body, |inner, label| {
        let mut outer = Map::new();
        outer.insert(label, Value::Sequence(vec![Value::Map(inner)]));
        outer
    })
}

fn ascii_indent(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

/// Accumulates the items of one body, applying the repeat rules: blocks
/// append to the sequence under their key, scalar assignments replace.
#[derive(Default)]
struct BodyBuilder {
    map: Map,
    block_keys: HashSet<String>,
}

impl BodyBuilder {
    fn block(&mut self, key: String, body: Map) {
        if self.block_keys.contains(&key) {
            if let Some(Value::Sequence(items)) = self.map.get_mut(&key) {
                items.push(Value::Map(body));
                return;
            }
        }
        self.block_keys.insert(key.clone());
        self.map.insert(key, Value::Sequence(vec![Value::Map(body)]));
    }

    fn assign(&mut self, key: String, value: Value) {
        self.block_keys.remove(&key);
        self.map.insert(key, value);
    }

    fn finish(self) -> Map {
        self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(map: &Map, key: &str) -> Vec<Map> {
        match &map[key] {
            Value::Sequence(items) => items
                .iter()
                .map(|v| v.as_map().cloned().expect("block element"))
                .collect(),
            other => panic!("expected block sequence for {}, got {:?}", key, other),
        }
    }

    #[test]
    fn test_decode_scalars() {
        let root = decode(
            r#"
            log_level = "INFO"
            attempts = 12
            negative = -3
            ratio = 0.5
            big = 1e3
            hex = 0x1F
            enabled = true
            disabled = false
            "#,
        )
        .unwrap();

        assert_eq!(root["log_level"], Value::from("INFO"));
        assert_eq!(root["attempts"], Value::Integer(12));
        assert_eq!(root["negative"], Value::Integer(-3));
        assert_eq!(root["ratio"], Value::Float(0.5));
        assert_eq!(root["big"], Value::Float(1000.0));
        assert_eq!(root["hex"], Value::Integer(31));
        assert_eq!(root["enabled"], Value::Bool(true));
        assert_eq!(root["disabled"], Value::Bool(false));
    }

    #[test]
    fn test_single_block_decodes_to_sequence() {
        let root = decode("wait {\n  min = \"5s\"\n}\n").unwrap();
        let wait = block(&root, "wait");
        assert_eq!(wait.len(), 1);
        assert_eq!(wait[0]["min"], Value::from("5s"));
    }

    #[test]
    fn test_repeated_blocks_keep_source_order() {
        let root = decode(
            r#"
            prefix { source = "a/" }
            log_level = "INFO"
            prefix { source = "b/" }
            "#,
        )
        .unwrap();
        let prefixes = block(&root, "prefix");
        assert_eq!(prefixes.len(), 2);
        assert_eq!(prefixes[0]["source"], Value::from("a/"));
        assert_eq!(prefixes[1]["source"], Value::from("b/"));
    }

    #[test]
    fn test_object_assignment_decodes_like_block() {
        let root = decode(r#"consul = { address = "127.0.0.1:8500" }"#).unwrap();
        let consul = block(&root, "consul");
        assert_eq!(consul[0]["address"], Value::from("127.0.0.1:8500"));
    }

    #[test]
    fn test_nested_blocks_and_inline_items() {
        let root = decode(
            r#"
            consul {
              retry { attempts = 5, backoff = "1s" }
              ssl {
                enabled = true
                verify = false
              }
            }
            wait { min = "5s" max = "10s" }
            "#,
        )
        .unwrap();
        let consul = block(&root, "consul");
        let retry = block(&consul[0], "retry");
        assert_eq!(retry[0]["attempts"], Value::Integer(5));
        assert_eq!(retry[0]["backoff"], Value::from("1s"));
        let ssl = block(&consul[0], "ssl");
        assert_eq!(ssl[0]["verify"], Value::Bool(false));
        let wait = block(&root, "wait");
        assert_eq!(wait[0]["max"], Value::from("10s"));
    }

    #[test]
    fn test_labels_nest_blocks() {
        let root = decode(r#"prefix "global/" { destination = "local/" }"#).unwrap();
        let prefix = block(&root, "prefix");
        let labelled = block(&prefix[0], "global/");
        assert_eq!(labelled[0]["destination"], Value::from("local/"));
    }

    #[test]
    fn test_lists_and_comments() {
        let root = decode(
            r#"
            # hash comment
            // line comment
            /* block
               comment */
            exclude = [
              "a/",
              "b/", // trailing comma is fine
            ]
            "#,
        )
        .unwrap();
        assert_eq!(
            root["exclude"],
            Value::Sequence(vec![Value::from("a/"), Value::from("b/")])
        );
    }

    #[test]
    fn test_string_escapes() {
        let root = decode(r#"name = "a\"b\\c\nA""#).unwrap();
        assert_eq!(root["name"], Value::from("a\"b\\c\nA"));
    }

    #[test]
    fn test_heredoc() {
        let root = decode("cert = <<EOF\nline one\nline two\nEOF\nlog_level = \"INFO\"\n").unwrap();
        assert_eq!(root["cert"], Value::from("line one\nline two\n"));
        assert_eq!(root["log_level"], Value::from("INFO"));

        let root = decode("cert = <<-EOT\n    a\n      b\n    EOT\n").unwrap();
        assert_eq!(root["cert"], Value::from("a\n  b\n"));
    }

    #[test]
    fn test_indented_heredoc_ignores_unicode_whitespace() {
        let root = decode("cert = <<-EOT\n\u{3000}a\n  b\nEOT\n").unwrap();
        assert_eq!(root["cert"], Value::from("\u{3000}a\n  b\n"));

        let root = decode("cert = <<-EOT\n  \u{3000}a\n    b\n  EOT\n").unwrap();
        assert_eq!(root["cert"], Value::from("\u{3000}a\n  b\n"));
    }

    #[test]
    fn test_heredoc_with_crlf_line_endings() {
        let root = decode(
            "cert = <<EOF\r\nline one\r\nline two\r\nEOF\r\nlog_level = \"INFO\"\r\n",
        )
        .unwrap();
        assert_eq!(root["cert"], Value::from("line one\nline two\n"));
        assert_eq!(root["log_level"], Value::from("INFO"));
    }

    #[test]
    fn test_repeated_scalar_last_wins() {
        let root = decode("log_level = \"INFO\"\nlog_level = \"DEBUG\"\n").unwrap();
        assert_eq!(root["log_level"], Value::from("DEBUG"));
    }

    #[test]
    fn test_empty_input_is_empty_mapping() {
        assert!(decode("").unwrap().is_empty());
        assert!(decode("  # only a comment\n").unwrap().is_empty());
    }

    #[test]
    fn test_syntax_errors_carry_location() {
        let err = decode("log_level = \"INFO\"\nconsul {\n  address = \n}\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("expected value"), "{}", err.message);

        let err = decode("consul {\n  address = \"x\"\n").unwrap_err();
        assert!(err.message.contains("'}'"), "{}", err.message);

        let err = decode("name = \"unterminated\n").unwrap_err();
        assert_eq!((err.line, err.column), (1, 8));

        let err = decode("a = @").unwrap_err();
        assert!(err.message.contains("unexpected character"));
    }

    #[test]
    fn test_json_document() {
        let root = decode(
            r#"{"log_level": "INFO", "consul": {"token": "abc"}, "prefix": [{"source": "a/"}]}"#,
        )
        .unwrap();
        assert_eq!(root["log_level"], Value::from("INFO"));
        let consul = block(&root, "consul");
        assert_eq!(consul[0]["token"], Value::from("abc"));
        let prefixes = block(&root, "prefix");
        assert_eq!(prefixes[0]["source"], Value::from("a/"));
    }

    #[test]
    fn test_json_root_must_be_mapping() {
        let err = decode("[1, 2]").unwrap_err();
        assert!(err.message.contains("must be a mapping"));

        let err = decode("{\"a\": }").unwrap_err();
        assert_eq!(err.line, 1);
    }
}
