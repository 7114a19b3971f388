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

//! Finds the `~...~` tag definitions inside a column comment.
//!
//! Comments arrive in their SQL-escaped form, so a quote written by the user
//! shows up as `''`. A doubled quote therefore counts as one quote character.
//! Quotes are only tracked inside a tag; apostrophes in the surrounding prose
//! never hide a tag.

use log::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Normal,
    /// Byte offset where the tag content starts.
    InTag { start: usize },
    InSingleQuote { tag_start: usize },
    InDoubleQuote { tag_start: usize },
    /// The next character is taken literally, then scanning resumes.
    Escaped(Box<State>),
}

impl State {
    fn is_open(&self) -> bool {
        match self {
            State::Normal => false,
            State::Escaped(resume) => resume.is_open(),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagExtraction {
    /// Raw definitions without the tildes, in comment order.
    pub definitions: Vec<String>,
    /// A tag was still open at the end of the comment.
    pub unclosed: bool,
}

pub fn extract_tag_definitions(comment: &str) -> TagExtraction {
    let mut extraction = TagExtraction::default();
    let mut chars = comment.char_indices().peekable();
    let mut state = State::Normal;

    while let Some((pos, ch)) = chars.next() {
        let doubled_quote = ch == '\'' && chars.peek().map(|&(_, next)| next) == Some('\'');

        state = match (state, ch) {
            (State::Escaped(resume), _) => *resume,
            (state, '\\') => State::Escaped(Box::new(state)),

            (State::Normal, '~') => State::InTag {
                start: pos + ch.len_utf8(),
            },
            (State::Normal, _) => State::Normal,

            (State::InTag { start }, '~') => {
                if pos > start {
                    extraction.definitions.push(comment[start..pos].to_string());
                } else {
                    debug!("skipping empty tag at {}", pos);
                }
                State::Normal
            }
            (State::InTag { start }, '\'') => {
                if doubled_quote {
                    chars.next();
                }
                State::InSingleQuote { tag_start: start }
            }
            (State::InTag { start }, '"') => State::InDoubleQuote { tag_start: start },

            (State::InSingleQuote { tag_start }, '\'') => {
                if doubled_quote {
                    chars.next();
                }
                State::InTag { start: tag_start }
            }
            (State::InDoubleQuote { tag_start }, '"') => State::InTag { start: tag_start },

            (state, _) => state,
        };
    }

    extraction.unclosed = state.is_open();
    extraction
}
