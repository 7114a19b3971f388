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

//! Table catalog
//!
//! Tables and their columns as declared by the CREATE TABLE statements seen
//! so far, with the comments later attached by COMMENT ON COLUMN.

use log::debug;
use std::collections::HashMap;

use crate::error::ScrubError;
use crate::sql::name::take_identifier;
use crate::sql::scan::{
    is_identifier_char, line_comment_start, paren_group, scan, split_top_level, strip_keywords,
};
use crate::sql::SchemaEntityName;

const TABLE_CONSTRAINTS: &[&str] = &[
    "CONSTRAINT",
    "PRIMARY",
    "UNIQUE",
    "CHECK",
    "FOREIGN",
    "EXCLUDE",
    "LIKE",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    /// First token of the declared type, e.g. `character` or `integer[]`.
    pub data_type: String,
    pub is_array: bool,
    /// Comment text as written in the dump, SQL quoting included.
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: SchemaEntityName,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }
}

#[derive(Debug, Default)]
pub struct TableCatalog {
    tables: HashMap<String, TableDefinition>,
}

impl TableCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, replacing any earlier definition with the same name.
    pub fn register(&mut self, definition: TableDefinition) -> Option<TableDefinition> {
        debug!(
            "register table {} ({} columns)",
            definition.name,
            definition.columns.len()
        );
        self.tables
            .insert(definition.name.table_name(), definition)
    }

    pub fn lookup(&self, table: &SchemaEntityName) -> Option<&TableDefinition> {
        self.tables.get(&table.table_name())
    }

    /// Set (or clear, with None) the comment of a column. Returns false when
    /// the table or the column is unknown.
    pub fn attach_comment(
        &mut self,
        table: &SchemaEntityName,
        column: &str,
        comment: Option<String>,
    ) -> bool {
        let column = self
            .tables
            .get_mut(&table.table_name())
            .and_then(|definition| definition.columns.iter_mut().find(|c| c.name == column));

        match column {
            Some(column) => {
                debug!("attach comment {:?} to {}.{}", comment, table, column.name);
                column.comment = comment;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Parse a complete `CREATE TABLE` statement.
pub fn parse_create_table(
    statement: &str,
    default_schema: &str,
) -> Result<TableDefinition, ScrubError> {
    let rest = match create_table_rest(statement.trim_start()) {
        Some(rest) => rest,
        None => return scrub_err!("not a CREATE TABLE statement"),
    };

    let (name, rest) = take_identifier(rest);
    if name.is_empty() {
        return scrub_err!("CREATE TABLE without a table name");
    }
    let name = SchemaEntityName::table(name, default_schema)?;

    let (open, close) = match paren_group(rest) {
        Some(group) if rest[..group.0].trim().is_empty() => group,
        _ => return scrub_err!("no column list found for table {}", name),
    };
    let body = &rest[open + 1..close];

    let entries: Vec<&str> = if body.contains('\n') {
        body.lines().collect()
    } else {
        split_top_level(body, ',')
    };

    let mut columns = vec![];
    for entry in entries {
        if let Some(column) = parse_column(entry) {
            columns.push(column);
        }
    }

    Ok(TableDefinition { name, columns })
}

/// `CREATE [UNLOGGED] TABLE [IF NOT EXISTS]`, returning what follows.
pub fn create_table_rest(line: &str) -> Option<&str> {
    let rest = strip_keywords(line, &["CREATE", "TABLE"])
        .or_else(|| strip_keywords(line, &["CREATE", "UNLOGGED", "TABLE"]))?;
    let trimmed = rest.trim_start();
    Some(strip_keywords(trimmed, &["IF", "NOT", "EXISTS"]).unwrap_or(trimmed))
}

fn parse_column(entry: &str) -> Option<ColumnDefinition> {
    let (declaration, comment) = match line_comment_start(entry) {
        Some(pos) => (&entry[..pos], Some(entry[pos + 2..].trim())),
        None => (entry, None),
    };

    let declaration = declaration.trim().trim_end_matches(',').trim_end();
    if declaration.is_empty() || is_table_constraint(declaration) {
        return None;
    }

    let (name, type_text) = take_identifier(declaration);
    let type_text = type_text.trim();
    let data_type = type_text.split_whitespace().next().unwrap_or_default();

    Some(ColumnDefinition {
        name: name.to_string(),
        data_type: data_type.to_string(),
        is_array: is_array_type(type_text),
        comment: comment
            .filter(|comment| !comment.is_empty())
            .map(str::to_string),
    })
}

fn is_table_constraint(declaration: &str) -> bool {
    TABLE_CONSTRAINTS
        .iter()
        .any(|keyword| strip_keywords(declaration, &[*keyword]).is_some())
}

/// `text[]`, `integer[3]` or `integer ARRAY`, ignoring quoted defaults.
fn is_array_type(type_text: &str) -> bool {
    let code: String = scan(type_text)
        .map(|(_, ch, at)| if at.in_code { ch } else { ' ' })
        .collect();

    code.contains('[')
        || code
            .split(|ch: char| !is_identifier_char(ch))
            .any(|word| word.eq_ignore_ascii_case("ARRAY"))
}

/// A parsed `COMMENT ON COLUMN` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnComment {
    pub column: SchemaEntityName,
    /// Literal body with its SQL escaping kept; None for `IS NULL`.
    pub comment: Option<String>,
}

pub fn parse_comment_on_column(
    statement: &str,
    default_schema: &str,
) -> Result<ColumnComment, ScrubError> {
    let rest = match strip_keywords(statement.trim_start(), &["COMMENT", "ON", "COLUMN"]) {
        Some(rest) => rest,
        None => return scrub_err!("not a COMMENT ON COLUMN statement"),
    };

    let (name, rest) = take_identifier(rest);
    let column = SchemaEntityName::column(name, default_schema)?;

    let rest = match strip_keywords(rest.trim_start(), &["IS"]) {
        Some(rest) => rest.trim_start(),
        None => return scrub_err!("IS expected in comment on {}", column),
    };

    if let Some(tail) = strip_keywords(rest, &["NULL"]) {
        if tail.trim() == ";" {
            return Ok(ColumnComment {
                column,
                comment: None,
            });
        }
    }

    let quote = match rest.get(..2) {
        Some(prefix) if prefix.eq_ignore_ascii_case("E'") => 1,
        _ => 0,
    };
    if !rest[quote..].starts_with('\'') {
        return scrub_err!("string literal expected in comment on {}", column);
    }

    let mut end = quote;
    for (pos, ch, at) in scan(rest).skip(quote) {
        if at.in_code {
            break;
        }
        end = pos + ch.len_utf8();
    }

    let body = &rest[quote..end];
    if body.len() < 2 || !body.ends_with('\'') || rest[end..].trim() != ";" {
        return scrub_err!("unterminated comment on {}", column);
    }

    Ok(ColumnComment {
        column,
        comment: Some(body[1..body.len() - 1].to_string()),
    })
}
