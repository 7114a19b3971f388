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

use std::io;
use thiserror::Error;

use crate::tags::TagKind;

#[derive(Debug, Error)]
pub enum ScrubError {
    /// Reading the dump or writing the scrubbed output failed. Aborts the run.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// A statement could not be taken apart (table name, column list,
    /// value tuple or terminator not found).
    #[error("sql parse error: {0}")]
    StructuralParse(String),
    /// A tag inside a column comment is malformed.
    #[error("invalid tag definition: {0}")]
    TagDefinition(String),
    /// A tag was handed the option payload of another tag kind.
    #[error("{expected} tag applied with {found} options")]
    OptionsTypeMismatch { expected: TagKind, found: TagKind },
}

impl ScrubError {
    /// Errors that only affect the statement or tag being processed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ScrubError::StructuralParse(_) | ScrubError::TagDefinition(_) => true,
            ScrubError::Io(_) | ScrubError::OptionsTypeMismatch { .. } => false,
        }
    }
}

// Use for structural failures inside a statement
macro_rules! scrub_err {
    ($($arg:tt)*) => {
        Err($crate::error::ScrubError::StructuralParse(format!($($arg)*)))
    };
}

macro_rules! tag_err {
    ($($arg:tt)*) => {
        Err($crate::error::ScrubError::TagDefinition(format!($($arg)*)))
    };
}
