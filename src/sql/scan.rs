// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Quote aware scanning of statement text
//!
//! Walks a statement character by character and reports, for every character,
//! whether it is plain SQL code or part of a string literal, a quoted
//! identifier or a `--` comment, and how deep it sits in `(...)` / `[...]`
//! groups. Everything that needs to find a separator or a keyword in a
//! statement goes through here.

use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Code,
    SingleQuote { backslash_escapes: bool },
    DoubleQuote,
    LineComment,
}

/// Where a scanned character sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Bracket depth. An opening bracket reports the depth it opens, the
    /// matching closing bracket reports the same depth.
    pub depth: usize,
    /// False for quote delimiters and anything quoted or commented out.
    pub in_code: bool,
}

pub struct SqlScanner<'a> {
    chars: Peekable<CharIndices<'a>>,
    region: Region,
    depth: usize,
    prev: Option<char>,
    escaped: bool,
    // escape mode of the literal that closed on the previous character, so
    // that `E'a''b'` keeps honouring backslashes after the doubled quote
    just_closed: Option<bool>,
}

pub fn scan(text: &str) -> SqlScanner<'_> {
    SqlScanner {
        chars: text.char_indices().peekable(),
        region: Region::Code,
        depth: 0,
        prev: None,
        escaped: false,
        just_closed: None,
    }
}

impl<'a> SqlScanner<'a> {
    /// True while inside a string literal or quoted identifier.
    pub fn in_literal(&self) -> bool {
        match self.region {
            Region::SingleQuote { .. } | Region::DoubleQuote => true,
            Region::Code | Region::LineComment => false,
        }
    }

    fn code(&self) -> Position {
        Position {
            depth: self.depth,
            in_code: true,
        }
    }

    fn quoted(&self) -> Position {
        Position {
            depth: self.depth,
            in_code: false,
        }
    }
}

impl<'a> Iterator for SqlScanner<'a> {
    type Item = (usize, char, Position);

    fn next(&mut self) -> Option<Self::Item> {
        let (pos, ch) = self.chars.next()?;
        let just_closed = self.just_closed.take();

        let position = match self.region {
            Region::Code => match ch {
                '\'' => {
                    let backslash_escapes = matches!(self.prev, Some('E') | Some('e'))
                        || just_closed == Some(true);
                    self.region = Region::SingleQuote { backslash_escapes };
                    self.quoted()
                }
                '"' => {
                    self.region = Region::DoubleQuote;
                    self.quoted()
                }
                '-' if self.chars.peek().map(|&(_, next)| next) == Some('-') => {
                    self.region = Region::LineComment;
                    self.quoted()
                }
                '(' | '[' => {
                    self.depth += 1;
                    self.code()
                }
                ')' | ']' => {
                    let position = self.code();
                    self.depth = self.depth.saturating_sub(1);
                    position
                }
                _ => self.code(),
            },
            Region::SingleQuote { backslash_escapes } => {
                if self.escaped {
                    self.escaped = false;
                } else if ch == '\\' && backslash_escapes {
                    self.escaped = true;
                } else if ch == '\'' {
                    self.region = Region::Code;
                    self.just_closed = Some(backslash_escapes);
                }
                self.quoted()
            }
            Region::DoubleQuote => {
                if ch == '"' {
                    self.region = Region::Code;
                }
                self.quoted()
            }
            Region::LineComment => {
                if ch == '\n' {
                    self.region = Region::Code;
                    self.code()
                } else {
                    self.quoted()
                }
            }
        };

        self.prev = Some(ch);
        Some((pos, ch, position))
    }
}

/// Byte positions of the first `(` in code and its matching `)`.
pub fn paren_group(text: &str) -> Option<(usize, usize)> {
    let mut open: Option<(usize, usize)> = None;

    for (pos, ch, at) in scan(text) {
        if !at.in_code {
            continue;
        }
        match (ch, open) {
            ('(', None) => open = Some((pos, at.depth)),
            (')', Some((start, depth))) if at.depth == depth => return Some((start, pos)),
            _ => {}
        }
    }

    None
}

/// Split on `separator` where it appears in code outside any bracket group.
/// Pieces keep their surrounding whitespace.
pub fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut pieces = vec![];
    let mut start = 0;

    for (pos, ch, at) in scan(text) {
        if ch == separator && at.in_code && at.depth == 0 {
            pieces.push(&text[start..pos]);
            start = pos + ch.len_utf8();
        }
    }
    pieces.push(&text[start..]);

    pieces
}

/// Byte position of the first `--` comment in code.
pub fn line_comment_start(text: &str) -> Option<usize> {
    let mut scanner = scan(text);
    while let Some((pos, ch, _)) = scanner.next() {
        if ch == '-' && scanner.region == Region::LineComment {
            return Some(pos);
        }
    }
    None
}

/// True when the statement is complete: no literal left open and the last
/// code character is a top-level `;`.
pub fn is_terminated(text: &str) -> bool {
    let mut scanner = scan(text);
    let mut last = None;

    for (_, ch, at) in scanner.by_ref() {
        if at.in_code && !ch.is_whitespace() {
            last = Some((ch, at.depth));
        }
    }

    !scanner.in_literal() && last == Some((';', 0))
}

/// True when `text` ends inside a string literal or quoted identifier.
pub fn ends_in_literal(text: &str) -> bool {
    let mut scanner = scan(text);
    scanner.by_ref().for_each(drop);
    scanner.in_literal()
}

/// Byte position of `keyword` as a whole word in top-level code.
pub fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    let mut prev: Option<char> = None;

    for (pos, ch, at) in scan(text) {
        let boundary = !prev.map_or(false, is_identifier_char);
        prev = Some(ch);
        if !at.in_code || at.depth != 0 || !boundary {
            continue;
        }
        if strip_word(&text[pos..], keyword).is_some() {
            return Some(pos);
        }
    }

    None
}

/// Match a run of case-insensitive keywords at the start of `text`,
/// separated by whitespace. Returns the text after the last keyword.
pub fn strip_keywords<'a>(text: &'a str, keywords: &[&str]) -> Option<&'a str> {
    let mut rest = text;
    for (i, keyword) in keywords.iter().enumerate() {
        if i > 0 {
            let trimmed = rest.trim_start();
            if trimmed.len() == rest.len() {
                return None;
            }
            rest = trimmed;
        }
        rest = strip_word(rest, keyword)?;
    }
    Some(rest)
}

fn strip_word<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    let head = text.get(..word.len())?;
    if !head.eq_ignore_ascii_case(word) {
        return None;
    }
    let rest = &text[word.len()..];
    match rest.chars().next() {
        Some(next) if is_identifier_char(next) => None,
        _ => Some(rest),
    }
}

pub fn is_identifier_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}
