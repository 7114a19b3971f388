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

//! Scrub driver
//!
//! Reads the dump line by line and dispatches on the statement a line
//! starts. Table definitions and column comments feed the catalog, INSERT
//! statements and COPY data rows go through the tag engine, everything else
//! is copied as it is. Every input line produces exactly one output line.

use log::{debug, error, warn};
use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, Write};

use crate::catalog::{
    create_table_rest, parse_comment_on_column, parse_create_table, TableCatalog,
    TableDefinition,
};
use crate::config::ScrubConfig;
use crate::cursor::LineCursor;
use crate::engine::{apply_tags, table_tags, StatementKind};
use crate::error::ScrubError;
use crate::sql::scan::{ends_in_literal, is_terminated, strip_keywords};
use crate::sql::SchemaEntityName;
use crate::tags::{parse_comment_tags, ScrubTag};
use crate::tokenizer::{
    copies_from_stdin, insert_table, join_copy_row, parse_copy_header, parse_insert,
    split_copy_row,
};

const COPY_END: &str = "\\.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Statement {
    CreateTable,
    CommentOnColumn,
    InsertInto,
    Copy,
}

fn statement_at(line: &str) -> Option<Statement> {
    if create_table_rest(line).is_some() {
        Some(Statement::CreateTable)
    } else if strip_keywords(line, &["COMMENT", "ON", "COLUMN"]).is_some() {
        Some(Statement::CommentOnColumn)
    } else if strip_keywords(line, &["INSERT", "INTO"]).is_some() {
        Some(Statement::InsertInto)
    } else if strip_keywords(line, &["COPY"]).is_some() {
        Some(Statement::Copy)
    } else {
        None
    }
}

/// Counts of the problems met during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrubSummary {
    pub error_count: usize,
    pub warning_count: usize,
}

impl ScrubSummary {
    pub fn is_clean(&self) -> bool {
        self.error_count == 0 && self.warning_count == 0
    }
}

impl fmt::Display for ScrubSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Scrub completed")?;
        if self.error_count > 0 {
            write!(f, " with {} errors", self.error_count)?;
        }
        if self.error_count > 0 && self.warning_count > 0 {
            f.write_str(" and")?;
        }
        if self.warning_count > 0 {
            write!(f, " with {} warnings", self.warning_count)?;
        }
        Ok(())
    }
}

// Tags per table, built on first use and dropped whenever the table
// definition or one of its comments changes.
#[derive(Debug, Default)]
struct TagCache {
    tables: HashMap<String, Vec<ScrubTag>>,
}

impl TagCache {
    fn tags_for(&mut self, definition: &TableDefinition) -> &[ScrubTag] {
        self.tables
            .entry(definition.name.table_name())
            .or_insert_with(|| table_tags(definition))
    }

    fn invalidate(&mut self, table: &SchemaEntityName) {
        self.tables.remove(&table.table_name());
    }
}

// Everything a COPY block needs, detached from the catalog.
struct CopyPlan {
    definition: TableDefinition,
    columns: Vec<String>,
    tags: Vec<ScrubTag>,
}

pub struct Scrubber<'a, W: Write> {
    cursor: LineCursor<'a>,
    writer: W,
    config: ScrubConfig,
    catalog: TableCatalog,
    tag_cache: TagCache,
    summary: ScrubSummary,
}

impl<'a, W: Write> Scrubber<'a, W> {
    pub fn new(reader: &'a mut dyn BufRead, writer: W, config: ScrubConfig) -> Self {
        Scrubber {
            cursor: LineCursor::new(reader),
            writer,
            config,
            catalog: TableCatalog::new(),
            tag_cache: TagCache::default(),
            summary: ScrubSummary::default(),
        }
    }

    /// Scrub the whole input. Only I/O failures (and engine misuse) end the
    /// run early; everything else is counted in the summary.
    pub fn run(mut self) -> Result<ScrubSummary, ScrubError> {
        while let Some(line) = self.cursor.next_line()? {
            match statement_at(&line) {
                Some(Statement::CreateTable) => self.create_table(line)?,
                Some(Statement::CommentOnColumn) => self.comment_on_column(line)?,
                Some(Statement::InsertInto) => self.insert_into(line)?,
                Some(Statement::Copy) => self.copy(line)?,
                None => self.write_line(&line)?,
            }
        }

        self.writer.flush()?;
        debug!("{} tables in catalog", self.catalog.len());
        Ok(self.summary)
    }

    fn create_table(&mut self, line: String) -> Result<(), ScrubError> {
        let start = self.cursor.line_number();
        let statement = self.read_statement(line, self.config.max_table_lines)?;

        if !is_terminated(&statement) {
            self.error(
                start,
                format!(
                    "CREATE TABLE statement not terminated within {} lines",
                    self.config.max_table_lines
                ),
            );
            return self.write_line(&statement);
        }

        match parse_create_table(&statement, &self.config.default_schema) {
            Ok(definition) => {
                for column in &definition.columns {
                    if let Some(comment) = &column.comment {
                        self.report_tag_problems(start, comment);
                    }
                }
                self.tag_cache.invalidate(&definition.name);
                self.catalog.register(definition);
            }
            Err(e) => self.error(
                start,
                format!("Error processing CREATE TABLE statement. {}", e),
            ),
        }

        self.write_line(&statement)
    }

    fn comment_on_column(&mut self, line: String) -> Result<(), ScrubError> {
        let start = self.cursor.line_number();
        let statement = self.read_statement(line, self.config.max_statement_lines)?;

        match parse_comment_on_column(&statement, &self.config.default_schema) {
            Ok(comment) => {
                if let Some(text) = &comment.comment {
                    self.report_tag_problems(start, text);
                }
                let column = comment.column.column_part().unwrap_or_default().to_string();
                if self
                    .catalog
                    .attach_comment(&comment.column, &column, comment.comment)
                {
                    self.tag_cache.invalidate(&comment.column);
                } else {
                    self.warning(
                        start,
                        format!("comment on unknown column {}", comment.column),
                    );
                }
            }
            Err(e) => self.error(
                start,
                format!("Error processing COMMENT ON COLUMN statement. {}", e),
            ),
        }

        self.write_line(&statement)
    }

    fn insert_into(&mut self, line: String) -> Result<(), ScrubError> {
        let start = self.cursor.line_number();
        let statement = self.read_statement(line, self.config.max_statement_lines)?;

        if !is_terminated(&statement) {
            self.error(start, "INSERT INTO statement not terminated");
            return self.write_line(&statement);
        }

        match self.scrub_insert(&statement) {
            Ok(Some(scrubbed)) if line_count(&scrubbed) == line_count(&statement) => {
                self.write_line(&scrubbed)
            }
            Ok(Some(_)) => {
                self.error(start, "scrubbing would change the line count of the statement");
                self.write_line(&statement)
            }
            Ok(None) => self.write_line(&statement),
            Err(e) if e.is_recoverable() => {
                self.error(
                    start,
                    format!("Error processing INSERT INTO statement. {}", e),
                );
                self.write_line(&statement)
            }
            Err(e) => Err(e),
        }
    }

    // None when the table has nothing to scrub
    fn scrub_insert(&mut self, statement: &str) -> Result<Option<String>, ScrubError> {
        let (table, _) = insert_table(statement, &self.config.default_schema)?;
        let definition = match self.catalog.lookup(&table) {
            Some(definition) => definition,
            None => {
                debug!("insert into unknown table {}", table);
                return Ok(None);
            }
        };
        let tags = self.tag_cache.tags_for(definition);
        if tags.is_empty() {
            return Ok(None);
        }

        let mut insert = parse_insert(statement, &self.config.default_schema)?;
        let columns = insert
            .columns
            .clone()
            .unwrap_or_else(|| definition.column_names());
        for row in insert.rows.iter_mut() {
            apply_tags(tags, definition, &columns, row, StatementKind::Insert)?;
        }

        Ok(Some(insert.to_string()))
    }

    fn copy(&mut self, line: String) -> Result<(), ScrubError> {
        let start = self.cursor.line_number();
        self.write_line(&line)?;

        if !copies_from_stdin(&line) {
            return Ok(());
        }

        let plan = match parse_copy_header(&line, &self.config.default_schema) {
            Ok(header) => header.and_then(|header| {
                let definition = self.catalog.lookup(&header.table)?.clone();
                let tags = self.tag_cache.tags_for(&definition).to_vec();
                if tags.is_empty() {
                    return None;
                }
                let columns = header
                    .columns
                    .unwrap_or_else(|| definition.column_names());
                Some(CopyPlan {
                    definition,
                    columns,
                    tags,
                })
            }),
            Err(e) => {
                self.error(start, format!("Error processing COPY statement. {}", e));
                None
            }
        };

        let escape = self.config.copy_escape;
        loop {
            let row = match self.cursor.next_line()? {
                Some(row) => row,
                None => {
                    self.error(start, "COPY data ended without \\.");
                    return Ok(());
                }
            };

            if row == COPY_END {
                return self.write_line(&row);
            }

            let plan = match &plan {
                Some(plan) if !row.is_empty() => plan,
                _ => {
                    self.write_line(&row)?;
                    continue;
                }
            };

            let mut fields = split_copy_row(&row, escape);
            match apply_tags(
                &plan.tags,
                &plan.definition,
                &plan.columns,
                &mut fields,
                StatementKind::Copy { escape },
            ) {
                Ok(()) => self.write_line(&join_copy_row(&fields))?,
                Err(e) if e.is_recoverable() => {
                    let line = self.cursor.line_number();
                    self.error(line, format!("Error processing COPY data. {}", e));
                    self.write_line(&row)?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Gather the lines of a statement until it is terminated, the line limit
    /// is hit, or the next line starts another statement.
    fn read_statement(&mut self, first: String, max_lines: usize) -> Result<String, ScrubError> {
        let mut statement = first;
        let mut lines = 1;

        while lines < max_lines && !is_terminated(&statement) {
            let continues = match self.cursor.peek_line()? {
                Some(next) => ends_in_literal(&statement) || statement_at(next).is_none(),
                None => false,
            };
            if !continues {
                break;
            }
            if let Some(next) = self.cursor.next_line()? {
                statement.push('\n');
                statement.push_str(&next);
                lines += 1;
            }
        }

        Ok(statement)
    }

    fn report_tag_problems(&mut self, line: usize, comment: &str) {
        for problem in parse_comment_tags(comment).problems {
            self.warning(line, problem);
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), ScrubError> {
        writeln!(self.writer, "{}", line)?;
        Ok(())
    }

    fn error(&mut self, line: usize, message: impl fmt::Display) {
        error!("line {}: {}", line, message);
        self.summary.error_count += 1;
    }

    fn warning(&mut self, line: usize, message: impl fmt::Display) {
        warn!("line {}: {}", line, message);
        self.summary.warning_count += 1;
    }
}

fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scrub(input: &str) -> (String, ScrubSummary) {
        let mut reader = Cursor::new(input.as_bytes().to_vec());
        let mut output = vec![];
        let summary = Scrubber::new(&mut reader, &mut output, ScrubConfig::default())
            .run()
            .unwrap();
        (String::from_utf8(output).unwrap(), summary)
    }

    #[test]
    fn recognises_statements() {
        assert_eq!(statement_at("CREATE TABLE t ("), Some(Statement::CreateTable));
        assert_eq!(statement_at("create unlogged table t ("), Some(Statement::CreateTable));
        assert_eq!(
            statement_at("COMMENT ON COLUMN t.c IS 'x';"),
            Some(Statement::CommentOnColumn)
        );
        assert_eq!(statement_at("INSERT INTO t VALUES (1);"), Some(Statement::InsertInto));
        assert_eq!(statement_at("COPY t FROM stdin;"), Some(Statement::Copy));
        assert_eq!(statement_at("COMMENT ON TABLE t IS 'x';"), None);
        assert_eq!(statement_at("  INSERT INTO t VALUES (1);"), None);
        assert_eq!(statement_at("CREATE TABLESPACE x;"), None);
    }

    #[test]
    fn summary_messages() {
        let mut summary = ScrubSummary::default();
        assert_eq!(summary.to_string(), "Scrub completed");
        assert!(summary.is_clean());

        summary.error_count = 2;
        assert_eq!(summary.to_string(), "Scrub completed with 2 errors");
        summary.warning_count = 1;
        assert_eq!(
            summary.to_string(),
            "Scrub completed with 2 errors and with 1 warnings"
        );
        summary.error_count = 0;
        assert_eq!(summary.to_string(), "Scrub completed with 1 warnings");
    }

    #[test]
    fn passes_untagged_dumps_through() {
        let input = "SET client_encoding = 'UTF8';\r\nCREATE TABLE t (\n    a int\n);\nINSERT INTO t VALUES (1);\n\nCOPY t (a) FROM stdin;\n1\n\n\\.\n";
        let (output, summary) = scrub(input);
        assert_eq!(output, input.replace("\r\n", "\n"));
        assert!(summary.is_clean());
    }

    #[test]
    fn comments_change_later_statements_only() {
        let input = "CREATE TABLE t (\n    a text\n);\nINSERT INTO t VALUES ('abc');\nCOMMENT ON COLUMN t.a IS '~MA~';\nINSERT INTO t VALUES ('abc');\nCOMMENT ON COLUMN public.t.a IS NULL;\nINSERT INTO t VALUES ('abc');";
        let (output, summary) = scrub(input);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[3], "INSERT INTO t VALUES ('abc');");
        assert_eq!(lines[5], "INSERT INTO t VALUES ('###');");
        assert_eq!(lines[7], "INSERT INTO t VALUES ('abc');");
        assert!(output.ends_with('\n'));
        assert!(summary.is_clean());
    }

    #[test]
    fn continuation_stops_at_the_next_statement() {
        let input = "CREATE TABLE t (\n    a text -- ~MA~\n);\nINSERT INTO t VALUES ('abc'\nINSERT INTO t VALUES ('xyz');";
        let (output, summary) = scrub(input);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[3], "INSERT INTO t VALUES ('abc'");
        assert_eq!(lines[4], "INSERT INTO t VALUES ('###');");
        assert_eq!(summary.error_count, 1);
    }

    #[test]
    fn unknown_comment_targets_are_warnings() {
        let (_, summary) = scrub("COMMENT ON COLUMN public.v.c IS '~FZ~';\n");
        assert_eq!(summary.warning_count, 1);
        assert_eq!(summary.error_count, 0);
    }

    #[test]
    fn unterminated_copy_is_an_error() {
        let input = "CREATE TABLE t (\n    a text -- ~FZ~\n);\nCOPY t (a) FROM stdin;\nabc";
        let (output, summary) = scrub(input);
        assert_eq!(output.lines().count(), 5);
        assert_eq!(summary.error_count, 1);
    }
}
