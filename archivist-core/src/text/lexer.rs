// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Tokenizer for the text archive grammar.
//!
//! Tokens are identifiers, numbers, double-quoted strings and C-like
//! operators. `//` and `/* */` comments count as whitespace. Braces are matched
//! once up front so that skipping a nested value is a table lookup.

use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Str,
    Op,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Identifier, number or operator text; unescaped contents for strings.
    pub text: String,
    pub line: u32,
}

impl Token {
    #[inline(always)]
    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Op && self.text == op
    }

    /// Text as written in the source, strings quoted again.
    pub fn source_text(&self) -> String {
        match self.kind {
            TokenKind::Str => format!("\"{}\"", self.text),
            _ => self.text.clone(),
        }
    }
}

// Longest first so that greedy matching picks `<<=` over `<<`.
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "::", "->", "==", "!=", "<=", ">=", "&&", "||", "<<", ">>", "+=", "-=", "*=",
    "/=", "|=", "&=", "^=", "++", "--",
];

const NO_MATCH: usize = usize::MAX;

/// Tokens of one document plus the index of each brace's partner.
#[derive(Debug)]
pub struct TokenStream {
    tokens: Vec<Token>,
    matching: Vec<usize>,
}

impl TokenStream {
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    /// Index of the brace matching the one at `index`.
    pub fn matching(&self, index: usize) -> Option<usize> {
        match self.matching.get(index) {
            Some(&m) if m != NO_MATCH => Some(m),
            _ => None,
        }
    }

    /// Line of the token at `index`, or of the last token past the end.
    pub fn line(&self, index: usize) -> u32 {
        self.tokens
            .get(index)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn peek(&self, ahead: usize) -> u8 {
        self.src.get(self.pos + ahead).copied().unwrap_or(0)
    }

    fn error(&self, msg: impl std::fmt::Display) -> Error {
        Error::structural(format!("line {}: {}", self.line, msg))
    }

    fn push(&mut self, kind: TokenKind, text: String, line: u32) {
        self.tokens.push(Token { kind, text, line });
    }

    fn slice_text(&self, start: usize) -> Result<String, Error> {
        std::str::from_utf8(&self.src[start..self.pos])
            .map(str::to_string)
            .map_err(|e| self.error(format!("invalid UTF-8: {e}")))
    }

    fn run(mut self) -> Result<Vec<Token>, Error> {
        while self.pos < self.src.len() {
            let b = self.src[self.pos];
            match b {
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'/' if self.peek(1) == b'/' => self.line_comment(),
                b'/' if self.peek(1) == b'*' => self.block_comment()?,
                b'"' => self.string()?,
                b'0'..=b'9' => self.number()?,
                b'.' if self.peek(1).is_ascii_digit() => self.number()?,
                _ if is_ident_start(b) => self.ident()?,
                _ => self.operator()?,
            }
        }
        Ok(self.tokens)
    }

    fn line_comment(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn block_comment(&mut self) -> Result<(), Error> {
        let opened = self.line;
        self.pos += 2;
        loop {
            match self.src.get(self.pos) {
                None => {
                    return Err(Error::structural(format!(
                        "line {opened}: comment is never closed"
                    )))
                }
                Some(b'*') if self.peek(1) == b'/' => {
                    self.pos += 2;
                    return Ok(());
                }
                Some(b'\n') => self.line += 1,
                Some(_) => {}
            }
            self.pos += 1;
        }
    }

    fn string(&mut self) -> Result<(), Error> {
        let opened = self.line;
        self.pos += 1;
        let mut bytes = Vec::new();
        loop {
            let Some(&b) = self.src.get(self.pos) else {
                return Err(Error::structural(format!(
                    "line {opened}: quote is never closed"
                )));
            };
            self.pos += 1;
            match b {
                b'"' => break,
                b'\\' => {
                    let Some(&escaped) = self.src.get(self.pos) else {
                        continue;
                    };
                    self.pos += 1;
                    bytes.push(match escaped {
                        b'n' => b'\n',
                        b'r' => b'\r',
                        b't' => b'\t',
                        b'0' => 0,
                        b'\n' => {
                            self.line += 1;
                            b'\n'
                        }
                        other => other,
                    });
                }
                b'\n' => {
                    self.line += 1;
                    bytes.push(b);
                }
                _ => bytes.push(b),
            }
        }
        let text = String::from_utf8(bytes)
            .map_err(|e| Error::structural(format!("line {opened}: invalid UTF-8: {e}")))?;
        self.push(TokenKind::Str, text, opened);
        Ok(())
    }

    fn number(&mut self) -> Result<(), Error> {
        let start = self.pos;
        if self.peek(0) == b'0' && matches!(self.peek(1), b'x' | b'X') {
            self.pos += 2;
            while self.peek(0).is_ascii_hexdigit() {
                self.pos += 1;
            }
        } else {
            while self.peek(0).is_ascii_digit() || self.peek(0) == b'.' {
                self.pos += 1;
            }
            if matches!(self.peek(0), b'e' | b'E')
                && (self.peek(1).is_ascii_digit()
                    || (matches!(self.peek(1), b'+' | b'-') && self.peek(2).is_ascii_digit()))
            {
                self.pos += 2;
                while self.peek(0).is_ascii_digit() {
                    self.pos += 1;
                }
            }
        }
        let text = self.slice_text(start)?;
        self.push(TokenKind::Number, text, self.line);
        Ok(())
    }

    fn ident(&mut self) -> Result<(), Error> {
        let start = self.pos;
        while self.pos < self.src.len() && is_ident_continue(self.src[self.pos]) {
            self.pos += 1;
        }
        let text = self.slice_text(start)?;
        self.push(TokenKind::Ident, text, self.line);
        Ok(())
    }

    fn operator(&mut self) -> Result<(), Error> {
        let rest = &self.src[self.pos..];
        let len = OPERATORS
            .iter()
            .find(|op| rest.starts_with(op.as_bytes()))
            .map_or(1, |op| op.len());
        if !rest[0].is_ascii() {
            return Err(self.error(format!("unexpected byte {:#04x}", rest[0])));
        }
        let start = self.pos;
        self.pos += len;
        let text = self.slice_text(start)?;
        self.push(TokenKind::Op, text, self.line);
        Ok(())
    }
}

/// Splits `src` into tokens and matches every brace.
pub fn tokenize(src: &str) -> Result<TokenStream, Error> {
    let tokens = Lexer {
        src: src.as_bytes(),
        pos: 0,
        line: 1,
        tokens: Vec::new(),
    }
    .run()?;

    let mut matching = vec![NO_MATCH; tokens.len()];
    let mut open = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        if token.is_op("{") {
            open.push(i);
        } else if token.is_op("}") {
            let Some(start) = open.pop() else {
                return Err(Error::structural(format!(
                    "line {}: '}}' without matching '{{'",
                    token.line
                )));
            };
            matching[start] = i;
            matching[i] = start;
        }
    }
    if let Some(&start) = open.last() {
        return Err(Error::structural(format!(
            "line {}: '{{' is never closed",
            tokens[start].line
        )));
    }
    Ok(TokenStream { tokens, matching })
}
