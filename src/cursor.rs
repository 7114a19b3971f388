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

//! Line cursor
//!
//! Hands out the lines of a dump one at a time, with a one-line lookahead so
//! statement readers can decide whether the next line still belongs to them.

use std::collections::VecDeque;
use std::io::BufRead;
use std::iter::Peekable;
use utf8_chars::{BufReadCharsExt, Chars};

use crate::error::ScrubError;

pub struct LineCursor<'a> {
    chars: Peekable<Chars<'a, dyn BufRead + 'a>>,
    peeked_lines: VecDeque<String>,
    line: usize,
}

impl<'a> LineCursor<'a> {
    pub fn new(input: &'a mut dyn BufRead) -> Self {
        Self {
            chars: input.chars().peekable(),
            peeked_lines: VecDeque::new(),
            line: 0,
        }
    }

    /// Number of the last line returned by `next_line`, starting at 1.
    pub fn line_number(&self) -> usize {
        self.line
    }

    /// Get the next line without its terminator, or None at end of input.
    pub fn next_line(&mut self) -> Result<Option<String>, ScrubError> {
        let line = match self.peeked_lines.pop_front() {
            Some(line) => Some(line),
            None => self.read_line()?,
        };

        if line.is_some() {
            self.line += 1;
        }

        Ok(line)
    }

    /// Look at the next line without consuming it.
    pub fn peek_line(&mut self) -> Result<Option<&str>, ScrubError> {
        if self.peeked_lines.is_empty() {
            match self.read_line()? {
                Some(line) => self.peeked_lines.push_back(line),
                None => return Ok(None),
            }
        }

        Ok(self.peeked_lines.front().map(String::as_str))
    }

    // `\n`, `\r\n` and a lone `\r` all end a line
    fn read_line(&mut self) -> Result<Option<String>, ScrubError> {
        let mut line = String::new();
        let mut read_any = false;

        loop {
            match self.chars.next() {
                Some(Ok('\n')) => return Ok(Some(line)),
                Some(Ok('\r')) => {
                    if let Some(Ok('\n')) = self.chars.peek() {
                        self.chars.next();
                    }
                    return Ok(Some(line));
                }
                Some(Ok(ch)) => {
                    read_any = true;
                    line.push(ch);
                }
                Some(Err(e)) => return Err(e.into()),
                None if read_any => return Ok(Some(line)),
                None => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn lines(input: &str) -> Vec<String> {
        let mut reader = Cursor::new(input.as_bytes().to_vec());
        let mut cursor = LineCursor::new(&mut reader);
        let mut lines = vec![];
        while let Some(line) = cursor.next_line().unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn splits_on_every_line_ending() {
        assert_eq!(lines("a\nb\r\nc\rd"), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn keeps_empty_lines() {
        assert_eq!(lines("a\n\n\nb\n"), vec!["a", "", "", "b"]);
        assert_eq!(lines("\n"), vec![""]);
        assert!(lines("").is_empty());
    }

    #[test]
    fn peek_does_not_consume() {
        let mut reader = Cursor::new(b"first\nsecond\n".to_vec());
        let mut cursor = LineCursor::new(&mut reader);

        assert_eq!(cursor.peek_line().unwrap(), Some("first"));
        assert_eq!(cursor.peek_line().unwrap(), Some("first"));
        assert_eq!(cursor.line_number(), 0);
        assert_eq!(cursor.next_line().unwrap().as_deref(), Some("first"));
        assert_eq!(cursor.line_number(), 1);
        assert_eq!(cursor.next_line().unwrap().as_deref(), Some("second"));
        assert_eq!(cursor.peek_line().unwrap(), None);
        assert_eq!(cursor.next_line().unwrap(), None);
        assert_eq!(cursor.line_number(), 2);
    }

    #[test]
    fn decodes_multibyte_characters() {
        assert_eq!(lines("Zoë\nJosé\n"), vec!["Zoë", "José"]);
    }
}
