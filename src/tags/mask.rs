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

use super::{split_escaped, strip_quotes, unescape};
use crate::error::ScrubError;

pub const DEFAULT_MASK_CHAR: char = '#';

/// `start,end[;mask_char[;ignore1,ignore2,...]]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskOptions {
    pub start_offset: usize,
    pub end_offset: usize,
    pub mask_char: char,
    /// Substrings left readable inside the masked window.
    pub ignore: Vec<String>,
}

impl Default for MaskOptions {
    fn default() -> Self {
        MaskOptions {
            start_offset: 0,
            end_offset: 0,
            mask_char: DEFAULT_MASK_CHAR,
            ignore: vec![],
        }
    }
}

impl MaskOptions {
    pub fn parse(text: &str) -> Result<Self, ScrubError> {
        let mut options = MaskOptions::default();
        if text.trim().is_empty() {
            return Ok(options);
        }

        let parts = split_escaped(text, ';');

        let offsets: Vec<&str> = parts[0].split(',').map(str::trim).collect();
        if offsets.len() != 2 {
            return tag_err!("mask offsets must be 'start,end', got '{}'", parts[0]);
        }
        options.start_offset = parse_offset(offsets[0])?;
        options.end_offset = parse_offset(offsets[1])?;
        if options.start_offset.checked_add(options.end_offset).is_none() {
            return tag_err!("mask offsets '{}' out of range", parts[0]);
        }

        if let Some(mask_char) = parts.get(1) {
            let mask_char = strip_quotes(mask_char.trim());
            let mut chars = mask_char.chars();
            options.mask_char = match (chars.next(), chars.next()) {
                (Some('\\'), Some(escaped)) => escaped,
                (Some(ch), _) => ch,
                (None, _) => DEFAULT_MASK_CHAR,
            };
        }

        if let Some(ignore) = parts.get(2) {
            options.ignore = split_escaped(ignore, ',')
                .iter()
                .map(|value| unescape(strip_quotes(value)))
                .filter(|value| !value.is_empty())
                .collect();
        }

        Ok(options)
    }

    pub fn apply(&self, text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        let length = chars.len();

        let mut start = self.start_offset;
        let mut total =
            length.saturating_sub(self.start_offset.saturating_add(self.end_offset));
        if length < start.saturating_add(1) || length < start.saturating_add(total) {
            start = 0;
            total = length;
        }
        if total == 0 {
            return text.to_string();
        }

        let window: String = chars[start..start + total].iter().collect();
        let mut masked: String = chars[..start].iter().collect();
        masked.push_str(&self.mask_window(&window));
        masked.extend(&chars[start + total..]);

        masked
    }

    // Ignore strings are tried in the order given, the first one that
    // matches at a position wins. Line breaks are never masked.
    fn mask_window(&self, window: &str) -> String {
        let mut masked = String::with_capacity(window.len());
        let mut rest = window;

        while let Some(ch) = rest.chars().next() {
            let ignored = self
                .ignore
                .iter()
                .find(|ignore| rest.starts_with(ignore.as_str()));
            if let Some(ignored) = ignored {
                masked.push_str(ignored);
                rest = &rest[ignored.len()..];
                continue;
            }

            masked.push(if ch == '\n' { ch } else { self.mask_char });
            rest = &rest[ch.len_utf8()..];
        }

        masked
    }
}

fn parse_offset(text: &str) -> Result<usize, ScrubError> {
    match text.parse::<usize>() {
        Ok(offset) => Ok(offset),
        Err(_) => tag_err!("invalid mask offset '{}'", text),
    }
}
