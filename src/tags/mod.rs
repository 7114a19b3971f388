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

//! Scrub tags
//!
//! A tag is written inside a column comment as `~NAME[index]:options~`.
//! `NAME` is one of `MA`/`MASK`, `RE`/`REPLACE`, `RA`/`RANDOM` or
//! `FZ`/`FUZZ` in any case; the optional `[index]` restricts an array
//! column to its n-th element (1-based, 0 means every element).

use log::debug;
use std::fmt;

use crate::error::ScrubError;
use crate::sql::SchemaEntityName;

mod extract;
mod mask;
mod random;
mod replace;

pub use self::extract::{extract_tag_definitions, TagExtraction};
pub use self::mask::MaskOptions;
pub use self::random::{fuzz, RandomOptions, SafeRandom};
pub use self::replace::ReplaceOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Mask,
    Replace,
    Random,
    Fuzz,
}

impl TagKind {
    pub fn from_mnemonic(name: &str) -> Option<TagKind> {
        match name.to_ascii_uppercase().as_str() {
            "MA" | "MASK" => Some(TagKind::Mask),
            "RE" | "REPLACE" => Some(TagKind::Replace),
            "RA" | "RANDOM" => Some(TagKind::Random),
            "FZ" | "FUZZ" => Some(TagKind::Fuzz),
            _ => None,
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            TagKind::Mask => "MASK",
            TagKind::Replace => "REPLACE",
            TagKind::Random => "RANDOM",
            TagKind::Fuzz => "FUZZ",
        })
    }
}

/// Options of a tag, parsed from its option text.
#[derive(Debug, Clone)]
pub enum TagOptions {
    Mask(MaskOptions),
    Replace(ReplaceOptions),
    Random(RandomOptions),
    Fuzz,
}

impl TagOptions {
    pub fn parse(kind: TagKind, text: &str) -> Result<Self, ScrubError> {
        Ok(match kind {
            TagKind::Mask => TagOptions::Mask(MaskOptions::parse(text)?),
            TagKind::Replace => TagOptions::Replace(ReplaceOptions::parse(text)?),
            TagKind::Random => TagOptions::Random(RandomOptions::parse(text)?),
            TagKind::Fuzz => TagOptions::Fuzz,
        })
    }

    pub fn kind(&self) -> TagKind {
        match self {
            TagOptions::Mask(_) => TagKind::Mask,
            TagOptions::Replace(_) => TagKind::Replace,
            TagOptions::Random(_) => TagKind::Random,
            TagOptions::Fuzz => TagKind::Fuzz,
        }
    }

    fn transform(&self, text: &str) -> String {
        match self {
            TagOptions::Mask(options) => options.apply(text),
            TagOptions::Replace(options) => options.apply(text),
            TagOptions::Random(options) => options.generate(&mut SafeRandom::new()),
            TagOptions::Fuzz => fuzz(text, &mut SafeRandom::new()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedTag {
    options_text: String,
    array_index: Option<usize>,
    options: TagOptions,
}

impl ParsedTag {
    /// Parse one definition taken from between a pair of tildes.
    ///
    /// Unknown tag names are not an error, they give `Ok(None)`.
    pub fn parse(definition: &str) -> Result<Option<ParsedTag>, ScrubError> {
        let (name, options_text) = match definition.find(':') {
            Some(colon) => (&definition[..colon], &definition[colon + 1..]),
            None => (definition, ""),
        };

        let name = name.trim();
        let (name, array_index) = match name.find('[') {
            Some(open) => (&name[..open], Some(parse_array_index(&name[open..])?)),
            None => (name, None),
        };

        let kind = match TagKind::from_mnemonic(name.trim()) {
            Some(kind) => kind,
            None => {
                debug!("ignoring unknown tag '{}'", name);
                return Ok(None);
            }
        };

        Ok(Some(ParsedTag {
            options_text: options_text.to_string(),
            array_index: array_index.filter(|&index| index > 0),
            options: TagOptions::parse(kind, options_text)?,
        }))
    }

    pub fn kind(&self) -> TagKind {
        self.options.kind()
    }

    pub fn options_text(&self) -> &str {
        &self.options_text
    }

    /// 1-based array element, None for every element.
    pub fn array_index(&self) -> Option<usize> {
        self.array_index
    }

    pub fn options(&self) -> &TagOptions {
        &self.options
    }

    /// Transform one unquoted value. Empty values come back unchanged; a
    /// random tag ignores the value and generates a new one.
    pub fn apply(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        self.options.transform(text)
    }

    /// Like `apply`, with options supplied by the caller. They must be of
    /// this tag's kind.
    pub fn apply_with(&self, text: &str, options: &TagOptions) -> Result<String, ScrubError> {
        if options.kind() != self.kind() {
            return Err(ScrubError::OptionsTypeMismatch {
                expected: self.kind(),
                found: options.kind(),
            });
        }
        if text.is_empty() {
            return Ok(String::new());
        }
        Ok(options.transform(text))
    }
}

fn parse_array_index(text: &str) -> Result<usize, ScrubError> {
    let index = text
        .strip_prefix('[')
        .and_then(|text| text.strip_suffix(']'))
        .and_then(|index| index.trim().parse::<usize>().ok());

    match index {
        Some(index) => Ok(index),
        None => tag_err!("invalid array index '{}'", text),
    }
}

/// A tag bound to the column whose comment declared it.
#[derive(Debug, Clone)]
pub struct ScrubTag {
    pub column: SchemaEntityName,
    pub tag: ParsedTag,
}

/// Tags found in one comment, plus whatever was wrong with the rest.
#[derive(Debug, Default)]
pub struct CommentTags {
    pub tags: Vec<ParsedTag>,
    pub problems: Vec<ScrubError>,
}

pub fn parse_comment_tags(comment: &str) -> CommentTags {
    let extraction = extract_tag_definitions(comment);
    let mut result = CommentTags::default();

    for definition in &extraction.definitions {
        match ParsedTag::parse(definition) {
            Ok(Some(tag)) => result.tags.push(tag),
            Ok(None) => {}
            Err(e) => result.problems.push(e),
        }
    }

    if extraction.unclosed {
        result.problems.push(ScrubError::TagDefinition(format!(
            "unescaped or unclosed tilde in comment [{}]",
            comment
        )));
    }

    result
}

/// Split on `delimiter` unless it is preceded by a backslash. `\delimiter`
/// turns into the bare delimiter, other escapes are kept as written.
pub(crate) fn split_escaped(text: &str, delimiter: char) -> Vec<String> {
    let mut parts = vec![];
    let mut current = String::new();
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(next) if next == delimiter => current.push(next),
                Some(next) => {
                    current.push(ch);
                    current.push(next);
                }
                None => current.push(ch),
            },
            ch if ch == delimiter => parts.push(std::mem::take(&mut current)),
            ch => current.push(ch),
        }
    }
    parts.push(current);

    parts
}

/// Drop up to two layers of matching `'` or `"` around a value; comments
/// carry doubled quotes.
pub(crate) fn strip_quotes(value: &str) -> &str {
    let mut value = value;
    for _ in 0..2 {
        let quoted = (value.starts_with('\'') && value.ends_with('\''))
            || (value.starts_with('"') && value.ends_with('"'));
        if value.len() < 2 || !quoted {
            break;
        }
        value = &value[1..value.len() - 1];
    }
    value
}

pub(crate) fn unescape(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            unescaped.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => unescaped.push('\n'),
            Some('t') => unescaped.push('\t'),
            Some('r') => unescaped.push('\r'),
            Some(other) => unescaped.push(other),
            None => unescaped.push(ch),
        }
    }

    unescaped
}
