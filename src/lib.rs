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

//! PostgreSQL pg_dump scrubber in Rust
//!
//! This crate reads a plain-text pg_dump stream and rewrites the values of
//! tagged columns on the fly. Tags are declared in the column comments of
//! the dumped tables (`COMMENT ON COLUMN ... IS '~MA:3,2~'` or an inline
//! `-- ~RE:[0-9],X~` in the table definition), so the schema itself states
//! how its sensitive data is to be masked, replaced, randomized or fuzzed.
//! Its intended usage is to anonymize a production backup so it can be
//! safely shared between developers.
//!
//! ```rust,no_run
//! use pgdump_scrubber::scrub;
//! # use std::fs::File;
//! # use std::io::{self, BufReader, BufWriter};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let file: String = std::env::args().collect::<Vec<String>>()[1].clone();
//!
//! let summary = scrub(
//!     BufReader::new(File::open(&file)?),
//!     BufWriter::new(io::stdout()),
//! )?;
//!
//! // Every input line produced exactly one output line. Problems with
//! // single statements or tags were logged and counted.
//! eprintln!("{}", summary);
//! # Ok(())
//! # }
//! ```
//!

#![warn(clippy::all)]
#![forbid(unsafe_code)]

#[macro_use]
mod error;

mod catalog;
mod config;
mod cursor;
mod engine;
mod scrubber;
mod sql;
mod tags;
mod tokenizer;

use std::io::{BufRead, Write};

pub use catalog::{ColumnDefinition, TableCatalog, TableDefinition};
pub use config::ScrubConfig;
pub use engine::{apply_to_value, StatementKind};
pub use error::ScrubError;
pub use scrubber::{ScrubSummary, Scrubber};
pub use sql::SchemaEntityName;
pub use tags::{
    extract_tag_definitions, parse_comment_tags, MaskOptions, ParsedTag, RandomOptions,
    ReplaceOptions, TagExtraction, TagKind, TagOptions,
};

/// Scrub a dump with the default configuration.
pub fn scrub<R: BufRead, W: Write>(reader: R, writer: W) -> Result<ScrubSummary, ScrubError> {
    scrub_with_config(reader, writer, &ScrubConfig::default())
}

pub fn scrub_with_config<R: BufRead, W: Write>(
    mut reader: R,
    writer: W,
    config: &ScrubConfig,
) -> Result<ScrubSummary, ScrubError> {
    Scrubber::new(&mut reader, writer, config.clone()).run()
}
