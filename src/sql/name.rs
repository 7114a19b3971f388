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

use std::fmt;

use crate::error::ScrubError;

/// A dotted, possibly quoted, identifier: `schema.table` or
/// `schema.table.column`. Segments keep their quotes as written in the dump,
/// so `public."Persons"` and `public.persons` are different tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaEntityName {
    segments: Vec<String>,
}

impl SchemaEntityName {
    /// Parse a table name. An unqualified name lands in `default_schema`.
    pub fn table(text: &str, default_schema: &str) -> Result<Self, ScrubError> {
        let mut segments = split_segments(text)?;
        if segments.len() == 1 {
            segments.insert(0, default_schema.to_string());
        }
        if segments.len() != 2 {
            return scrub_err!("'{}' is not a schema.table name", text);
        }
        Ok(SchemaEntityName { segments })
    }

    /// Parse a column name. A `table.column` pair lands in `default_schema`.
    pub fn column(text: &str, default_schema: &str) -> Result<Self, ScrubError> {
        let mut segments = split_segments(text)?;
        if segments.len() == 2 {
            segments.insert(0, default_schema.to_string());
        }
        if segments.len() != 3 {
            return scrub_err!("'{}' is not a schema.table.column name", text);
        }
        Ok(SchemaEntityName { segments })
    }

    /// Column `column` of this table.
    pub fn with_column(&self, column: &str) -> SchemaEntityName {
        let mut segments = self.segments[..2].to_vec();
        segments.push(column.to_string());
        SchemaEntityName { segments }
    }

    pub fn schema(&self) -> &str {
        &self.segments[0]
    }

    pub fn table_part(&self) -> &str {
        &self.segments[1]
    }

    pub fn column_part(&self) -> Option<&str> {
        self.segments.get(2).map(String::as_str)
    }

    /// `schema.table`, for both table and column names.
    pub fn table_name(&self) -> String {
        format!("{}.{}", self.segments[0], self.segments[1])
    }
}

impl fmt::Display for SchemaEntityName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

fn split_segments(text: &str) -> Result<Vec<String>, ScrubError> {
    let text = text.trim();
    let mut segments = vec![];
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    let mut quoted = false;

    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted => {
                current.push(ch);
                if chars.peek() == Some(&'"') {
                    // "" inside a quoted identifier
                    current.push('"');
                    chars.next();
                } else {
                    quoted = false;
                }
            }
            '"' => {
                quoted = true;
                current.push(ch);
            }
            '.' if !quoted => segments.push(std::mem::take(&mut current)),
            ch => current.push(ch),
        }
    }
    segments.push(current);

    if quoted {
        return scrub_err!("unterminated quoted identifier in '{}'", text);
    }
    if segments.iter().any(|segment| segment.trim().is_empty()) {
        return scrub_err!("empty identifier segment in '{}'", text);
    }

    Ok(segments.into_iter().map(|s| s.trim().to_string()).collect())
}

/// Take a possibly quoted, dotted identifier off the front of `text`.
/// Stops at whitespace or `(` outside quotes. Returns the identifier and the
/// remaining text.
pub fn take_identifier(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    let mut quoted = false;

    for (pos, ch) in text.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            '(' | ';' if !quoted => return (&text[..pos], &text[pos..]),
            ch if ch.is_whitespace() && !quoted => return (&text[..pos], &text[pos..]),
            _ => {}
        }
    }

    (text, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_table_names() {
        let name = SchemaEntityName::table("public.employees", "public").unwrap();
        assert_eq!(name.schema(), "public");
        assert_eq!(name.table_part(), "employees");
        assert_eq!(name.column_part(), None);
        assert_eq!(name.to_string(), "public.employees");
        assert_eq!(name.with_column("email").to_string(), "public.employees.email");
    }

    #[test]
    fn unqualified_names_use_the_default_schema() {
        let table = SchemaEntityName::table("employees", "sales").unwrap();
        assert_eq!(table.table_name(), "sales.employees");

        let column = SchemaEntityName::column("employees.email", "public").unwrap();
        assert_eq!(column.to_string(), "public.employees.email");
    }

    #[test]
    fn quoted_segments_may_contain_dots() {
        let column = SchemaEntityName::column("public.\"Persons.v2\".\"Favourite\"\"Foods\"", "public")
            .unwrap();
        assert_eq!(column.table_part(), "\"Persons.v2\"");
        assert_eq!(column.column_part(), Some("\"Favourite\"\"Foods\""));
        assert_eq!(column.table_name(), "public.\"Persons.v2\"");
    }

    #[test]
    fn rejects_wrong_segment_counts() {
        assert!(SchemaEntityName::table("a.b.c", "public").is_err());
        assert!(SchemaEntityName::column("a", "public").is_err());
        assert!(SchemaEntityName::column("a..c", "public").is_err());
        assert!(SchemaEntityName::table("public.\"open", "public").is_err());
    }

    #[test]
    fn takes_identifiers_off_statements() {
        assert_eq!(
            take_identifier(" public.employees(id, name) VALUES"),
            ("public.employees", "(id, name) VALUES")
        );
        assert_eq!(
            take_identifier("public.\"My Table\" (id) FROM stdin;"),
            ("public.\"My Table\"", " (id) FROM stdin;")
        );
        assert_eq!(take_identifier("public.t"), ("public.t", ""));
    }
}
