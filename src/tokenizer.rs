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

//! Statement Tokenizer
//!
//! Takes the value tuples of an INSERT statement and the fields of a COPY
//! data line apart into tokens aligned with the statement's columns. All the
//! text around the tokens is kept, so writing the statement back out without
//! touching a token reproduces the input byte for byte.

use log::debug;
use std::fmt;

use crate::error::ScrubError;
use crate::sql::name::take_identifier;
use crate::sql::scan::{find_keyword, paren_group, split_top_level, strip_keywords};
use crate::sql::SchemaEntityName;

/// An `INSERT INTO ... VALUES (...)[, (...)];` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    pub table: SchemaEntityName,
    /// Column list written in the statement, if any.
    pub columns: Option<Vec<String>>,
    /// One entry per tuple, values as written (quotes included, padding
    /// removed).
    pub rows: Vec<Vec<String>>,
    // Text between the values: layout[0] precedes the first value, the last
    // entry follows the last value.
    layout: Vec<String>,
}

impl fmt::Display for InsertStatement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.layout[0])?;
        for (value, text) in self.rows.iter().flatten().zip(&self.layout[1..]) {
            f.write_str(value)?;
            f.write_str(text)?;
        }
        Ok(())
    }
}

/// Table name of an INSERT statement, and the text following it.
pub fn insert_table<'a>(
    statement: &'a str,
    default_schema: &str,
) -> Result<(SchemaEntityName, &'a str), ScrubError> {
    let rest = match strip_keywords(statement.trim_start(), &["INSERT", "INTO"]) {
        Some(rest) => rest,
        None => return scrub_err!("not an INSERT INTO statement"),
    };

    let (name, rest) = take_identifier(rest);
    if name.is_empty() {
        return scrub_err!("INSERT INTO without a table name");
    }

    Ok((SchemaEntityName::table(name, default_schema)?, rest))
}

pub fn parse_insert(statement: &str, default_schema: &str) -> Result<InsertStatement, ScrubError> {
    let (table, rest) = insert_table(statement, default_schema)?;
    let rest_offset = statement.len() - rest.len();

    let values_at = match find_keyword(rest, "VALUES") {
        Some(pos) => pos,
        None => return scrub_err!("VALUES not found in INSERT INTO {}", table),
    };

    let declared = &rest[..values_at];
    let columns = if declared.trim_start().starts_with('(') {
        match paren_group(declared) {
            Some((open, close)) => Some(
                split_top_level(&declared[open + 1..close], ',')
                    .into_iter()
                    .map(|column| column.trim().to_string())
                    .collect::<Vec<_>>(),
            ),
            None => return scrub_err!("unbalanced column list in INSERT INTO {}", table),
        }
    } else {
        None
    };

    let mut rows = vec![];
    let mut spans = vec![];
    let mut offset = rest_offset + values_at + "VALUES".len();

    loop {
        let remaining = &statement[offset..];
        let (open, close) = match paren_group(remaining) {
            Some(group) => group,
            None => break,
        };

        let lead = remaining[..open].trim();
        if !((rows.is_empty() && lead.is_empty()) || (!rows.is_empty() && lead == ",")) {
            debug!("insert tuples end before '{}'", lead);
            break;
        }

        let inner_start = offset + open + 1;
        let mut piece_start = inner_start;
        let mut row = vec![];
        for piece in split_top_level(&statement[inner_start..offset + close], ',') {
            let value = piece.trim();
            let start = piece_start + (piece.len() - piece.trim_start().len());
            spans.push((start, start + value.len()));
            row.push(value.to_string());
            piece_start += piece.len() + 1;
        }
        rows.push(row);

        offset += close + 1;
    }

    if rows.is_empty() {
        return scrub_err!("no value tuple found in INSERT INTO {}", table);
    }
    if let Some(columns) = &columns {
        if let Some(row) = rows.iter().find(|row| row.len() != columns.len()) {
            return scrub_err!(
                "INSERT INTO {} declares {} columns but has {} values",
                table,
                columns.len(),
                row.len()
            );
        }
    }

    let mut layout = Vec::with_capacity(spans.len() + 1);
    let mut previous = 0;
    for (start, end) in spans {
        layout.push(statement[previous..start].to_string());
        previous = end;
    }
    layout.push(statement[previous..].to_string());

    Ok(InsertStatement {
        table,
        columns,
        rows,
        layout,
    })
}

/// The header line of a COPY data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyHeader {
    pub table: SchemaEntityName,
    pub columns: Option<Vec<String>>,
}

/// True for `COPY ... FROM stdin`, which is followed by a data block.
pub fn copies_from_stdin(line: &str) -> bool {
    strip_keywords(line.trim_start(), &["COPY"]).is_some()
        && find_keyword(line, "FROM")
            .and_then(|from| strip_keywords(&line[from..], &["FROM", "STDIN"]))
            .is_some()
}

/// Parse a `COPY table [(columns)] FROM stdin` header. Other COPY forms give
/// None.
pub fn parse_copy_header(
    line: &str,
    default_schema: &str,
) -> Result<Option<CopyHeader>, ScrubError> {
    let rest = match strip_keywords(line.trim_start(), &["COPY"]) {
        Some(rest) => rest,
        None => return Ok(None),
    };

    let (name, rest) = take_identifier(rest);
    if name.is_empty() {
        return Ok(None);
    }

    let (columns, rest) = if rest.trim_start().starts_with('(') {
        match paren_group(rest) {
            Some((open, close)) => (
                Some(
                    split_top_level(&rest[open + 1..close], ',')
                        .into_iter()
                        .map(|column| column.trim().to_string())
                        .collect::<Vec<_>>(),
                ),
                &rest[close + 1..],
            ),
            None => return scrub_err!("unbalanced column list in COPY {}", name),
        }
    } else {
        (None, rest)
    };

    if strip_keywords(rest.trim_start(), &["FROM", "STDIN"]).is_none() {
        return Ok(None);
    }

    Ok(Some(CopyHeader {
        table: SchemaEntityName::table(name, default_schema)?,
        columns,
    }))
}

/// Split a COPY data line on tabs. A tab preceded by the escape character
/// belongs to the field; escapes are left in place.
pub fn split_copy_row(line: &str, escape: char) -> Vec<String> {
    let mut fields = vec![];
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        if ch == escape {
            current.push(ch);
            if let Some(next) = chars.next() {
                current.push(next);
            }
        } else if ch == '\t' {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    fields.push(current);

    fields
}

pub fn join_copy_row(fields: &[String]) -> String {
    fields.join("\t")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_insert_values() {
        let statement = "INSERT INTO public.employees (emp_id, last_name, notes) VALUES (1, 'Davolio', 'Smith, Jones; ''quoted''');";
        let insert = parse_insert(statement, "public").unwrap();
        assert_eq!(insert.table.table_name(), "public.employees");
        assert_eq!(
            insert.columns,
            Some(vec![
                "emp_id".to_string(),
                "last_name".to_string(),
                "notes".to_string()
            ])
        );
        assert_eq!(
            insert.rows,
            vec![vec!["1", "'Davolio'", "'Smith, Jones; ''quoted'''"]]
        );
        assert_eq!(insert.to_string(), statement);
    }

    #[test]
    fn replaced_values_keep_the_surrounding_text() {
        let statement = "INSERT INTO t VALUES (1,   'a' , ARRAY['x', 'y']), (2, NULL, E'it\\'s');";
        let mut insert = parse_insert(statement, "public").unwrap();
        assert_eq!(insert.table.table_name(), "public.t");
        assert_eq!(insert.columns, None);
        assert_eq!(insert.rows[0], vec!["1", "'a'", "ARRAY['x', 'y']"]);
        assert_eq!(insert.rows[1], vec!["2", "NULL", "E'it\\'s'"]);

        insert.rows[0][1] = "'bbb'".to_string();
        insert.rows[1][2] = "E'no'".to_string();
        assert_eq!(
            insert.to_string(),
            "INSERT INTO t VALUES (1,   'bbb' , ARRAY['x', 'y']), (2, NULL, E'no');"
        );
    }

    #[test]
    fn multi_line_values_keep_their_lines() {
        let statement = "INSERT INTO public.t (id, address) VALUES (1, '507 - 20th Ave. E.\nApt. 2A');";
        let insert = parse_insert(statement, "public").unwrap();
        assert_eq!(insert.rows[0][1], "'507 - 20th Ave. E.\nApt. 2A'");
        assert_eq!(insert.to_string(), statement);
    }

    #[test]
    fn stops_at_trailing_clauses() {
        let statement = "INSERT INTO t (id) VALUES (1) ON CONFLICT (id) DO NOTHING;";
        let insert = parse_insert(statement, "public").unwrap();
        assert_eq!(insert.rows, vec![vec!["1"]]);
        assert_eq!(insert.to_string(), statement);
    }

    #[test]
    fn rejects_malformed_inserts() {
        assert!(parse_insert("INSERT INTO t (a, b) VALUES (1);", "public").is_err());
        assert!(parse_insert("INSERT INTO t SELECT 1;", "public").is_err());
        assert!(parse_insert("INSERT INTO t DEFAULT VALUES;", "public").is_err());
        assert!(parse_insert("INSERT INTO (1);", "public").is_err());
    }

    #[test]
    fn parses_copy_headers() {
        let line = "COPY public.employees (emp_id, last_name, \"Notes\") FROM stdin;";
        assert!(copies_from_stdin(line));
        let header = parse_copy_header(line, "public").unwrap().unwrap();
        assert_eq!(header.table.table_name(), "public.employees");
        assert_eq!(
            header.columns,
            Some(vec![
                "emp_id".to_string(),
                "last_name".to_string(),
                "\"Notes\"".to_string()
            ])
        );

        let header = parse_copy_header("copy t from STDIN;", "public").unwrap().unwrap();
        assert_eq!(header.columns, None);

        assert!(!copies_from_stdin("COPY t TO stdout;"));
        assert_eq!(parse_copy_header("COPY t TO stdout;", "public").unwrap(), None);
        assert_eq!(
            parse_copy_header("COPY (SELECT 1) TO stdout;", "public").unwrap(),
            None
        );
    }

    #[test]
    fn splits_copy_rows() {
        let fields = split_copy_row("1\tDavolio\t\\N\tline\\none\\\tstill", '\\');
        assert_eq!(fields, vec!["1", "Davolio", "\\N", "line\\none\\\tstill"]);
        assert_eq!(
            join_copy_row(&fields),
            "1\tDavolio\t\\N\tline\\none\\\tstill"
        );
        assert_eq!(split_copy_row("", '\\'), vec![""]);
        assert_eq!(split_copy_row("a\t", '\\'), vec!["a", ""]);
    }
}
