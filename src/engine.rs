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

//! Tag application
//!
//! Works out which value of a row each tag targets, takes the value out of
//! its quoting, lets the tag transform it and quotes the result the same way.

use log::debug;

use crate::catalog::TableDefinition;
use crate::error::ScrubError;
use crate::sql::literal::{
    array_body, decode_copy_text, encode_copy_text, is_copy_null, is_sql_null,
    split_array_elements, strip_wrapping, SqlString,
};
use crate::tags::{parse_comment_tags, ParsedTag, ScrubTag};

/// Where the values of a row came from, which decides their quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// SQL literals of an INSERT statement.
    Insert,
    /// Text fields of a COPY data line, with their escape character.
    Copy { escape: char },
}

/// Tags declared in the column comments of a table, in column order and
/// then in comment order. Problems with the tags are dropped silently;
/// they are reported when the comment is read.
pub fn table_tags(definition: &TableDefinition) -> Vec<ScrubTag> {
    let mut tags = vec![];

    for column in &definition.columns {
        let comment = match &column.comment {
            Some(comment) => comment,
            None => continue,
        };
        for tag in parse_comment_tags(comment).tags {
            tags.push(ScrubTag {
                column: definition.name.with_column(&column.name),
                tag,
            });
        }
    }

    debug!("{} tags on table {}", tags.len(), definition.name);
    tags
}

/// Apply every tag of `definition` to one row. `columns` are the columns of
/// the statement, aligned with `values`.
pub fn apply_tags(
    tags: &[ScrubTag],
    definition: &TableDefinition,
    columns: &[String],
    values: &mut [String],
    kind: StatementKind,
) -> Result<(), ScrubError> {
    if columns.len() != values.len() {
        return scrub_err!(
            "{} has {} columns but the row has {} values",
            definition.name,
            columns.len(),
            values.len()
        );
    }

    let table_name = definition.name.table_name();
    for scrub_tag in tags {
        if scrub_tag.column.table_name() != table_name {
            continue;
        }
        let column = match scrub_tag.column.column_part() {
            Some(column) => column,
            None => continue,
        };
        let position = match columns.iter().position(|name| name == column) {
            Some(position) => position,
            None => {
                debug!("{} not in this statement", scrub_tag.column);
                continue;
            }
        };
        let is_array = definition
            .column(column)
            .map_or(false, |definition| definition.is_array);

        values[position] = apply_to_value(&scrub_tag.tag, &values[position], is_array, kind);
    }

    Ok(())
}

/// Apply one tag to one value as written in the statement.
pub fn apply_to_value(tag: &ParsedTag, value: &str, is_array: bool, kind: StatementKind) -> String {
    match kind {
        StatementKind::Insert => {
            if is_sql_null(value) {
                return value.to_string();
            }
            match SqlString::parse(value) {
                Some(literal) => {
                    let scrubbed = match array_body(&literal.value) {
                        Some(body) if is_array => wrap_array(apply_to_elements(tag, body)),
                        _ => tag.apply(&literal.value),
                    };
                    literal.with_value(scrubbed).to_string()
                }
                None => tag.apply(value),
            }
        }
        StatementKind::Copy { escape } => {
            if is_copy_null(value, escape) {
                return value.to_string();
            }
            let decoded = decode_copy_text(value, escape);
            let scrubbed = match array_body(&decoded) {
                Some(body) if is_array => wrap_array(apply_to_elements(tag, body)),
                _ => tag.apply(&decoded),
            };
            encode_copy_text(&scrubbed, escape)
        }
    }
}

fn wrap_array(body: String) -> String {
    format!("{{{}}}", body)
}

// One-dimensional arrays only. An index past the end leaves the array as
// it is.
fn apply_to_elements(tag: &ParsedTag, body: &str) -> String {
    if body.is_empty() {
        return String::new();
    }
    let mut elements = split_array_elements(body);

    let targets = match tag.array_index() {
        Some(index) if index > elements.len() => {
            debug!("array index {} past {} elements", index, elements.len());
            0..0
        }
        Some(index) => index - 1..index,
        None => 0..elements.len(),
    };

    for element in &mut elements[targets] {
        *element = apply_to_element(tag, element);
    }

    elements.join(",")
}

fn apply_to_element(tag: &ParsedTag, element: &str) -> String {
    let trimmed = element.trim();
    if is_sql_null(trimmed) {
        return element.to_string();
    }

    match strip_wrapping(trimmed, '"') {
        Some(quoted) => quote_element(&tag.apply(&unescape_element(quoted)), true),
        None => quote_element(&tag.apply(trimmed), false),
    }
}

fn unescape_element(text: &str) -> String {
    let mut unescaped = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(next) = chars.next() {
                    unescaped.push(next);
                }
            }
            ch => unescaped.push(ch),
        }
    }
    unescaped
}

// Quote an element when it was quoted before or would not survive bare.
fn quote_element(text: &str, quoted: bool) -> String {
    let needs_quotes = quoted
        || text.is_empty()
        || is_sql_null(text)
        || text
            .chars()
            .any(|ch| ch.is_whitespace() || "{}\",\\".contains(ch));
    if !needs_quotes {
        return text.to_string();
    }

    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('"');
    for ch in text.chars() {
        if ch == '"' || ch == '\\' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('"');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::parse_create_table;
    use regex::Regex;

    fn tag(definition: &str) -> ParsedTag {
        ParsedTag::parse(definition).unwrap().unwrap()
    }

    const COPY: StatementKind = StatementKind::Copy { escape: '\\' };

    #[test]
    fn whole_field_insert_values_keep_their_quotes() {
        assert_eq!(
            apply_to_value(&tag("MA:1,1"), "'O''Brien'", false, StatementKind::Insert),
            "'O#####n'"
        );
        assert_eq!(
            apply_to_value(&tag("RE:a,z"), "E'a\\\\b'", false, StatementKind::Insert),
            "E'z\\\\b'"
        );
        assert_eq!(
            apply_to_value(&tag("MA"), "12345", false, StatementKind::Insert),
            "#####"
        );
    }

    #[test]
    fn masking_never_splits_escape_pairs() {
        assert_eq!(
            apply_to_value(&tag("MA:0,1"), "E'ab\\\\'", false, StatementKind::Insert),
            "E'##\\\\'"
        );
        assert_eq!(
            apply_to_value(&tag("MA:1,0"), "E'a\\\\b'", false, StatementKind::Insert),
            "E'a##'"
        );
    }

    #[test]
    fn nulls_are_never_touched() {
        assert_eq!(
            apply_to_value(&tag("RA:NNN"), "NULL", false, StatementKind::Insert),
            "NULL"
        );
        assert_eq!(apply_to_value(&tag("RA:NNN"), "\\N", false, COPY), "\\N");
        assert_eq!(
            apply_to_value(&tag("MA"), "'{NULL,ab}'", true, StatementKind::Insert),
            "'{NULL,##}'"
        );
    }

    #[test]
    fn random_values_follow_the_original_quoting() {
        let shape = Regex::new(r"^'\+[0-9]{2}'$").unwrap();
        let value = apply_to_value(&tag("RA:+NN"), "'555-1234'", false, StatementKind::Insert);
        assert!(shape.is_match(&value), "{}", value);

        let value = apply_to_value(&tag("RA:NNN"), "42", false, StatementKind::Insert);
        assert!(Regex::new("^[0-9]{3}$").unwrap().is_match(&value));
    }

    #[test]
    fn copy_values_are_decoded_and_encoded() {
        assert_eq!(
            apply_to_value(&tag("MA:0,0"), "ab\\ncd", false, COPY),
            "##\\n##"
        );
        assert_eq!(
            apply_to_value(&tag("RE:a,z"), "a\\\\b", false, COPY),
            "z\\\\b"
        );
    }

    #[test]
    fn array_index_targets_one_element() {
        assert_eq!(
            apply_to_value(&tag("RE[2]:.+,X"), "{a,b,c}", true, COPY),
            "{a,X,c}"
        );
        assert_eq!(
            apply_to_value(&tag("RE[4]:.+,X"), "{a,b,c}", true, COPY),
            "{a,b,c}"
        );
        assert_eq!(
            apply_to_value(&tag("RE:.+,X"), "{a,b,c}", true, COPY),
            "{X,X,X}"
        );
        assert_eq!(
            apply_to_value(&tag("RE[1]:.+,X"), "'{a,b}'", true, StatementKind::Insert),
            "'{X,b}'"
        );
    }

    #[test]
    fn quoted_array_elements_stay_quoted() {
        assert_eq!(
            apply_to_value(&tag("MA[1]:1,0"), "{\"pizza, cheese\",pasta}", true, COPY),
            "{\"p############\",pasta}"
        );
        assert_eq!(
            apply_to_value(&tag("RE:a,a b"), "{a}", true, COPY),
            "{\"a b\"}"
        );
        assert_eq!(apply_to_value(&tag("FZ"), "{}", true, COPY), "{}");
    }

    #[test]
    fn array_literals_in_plain_columns_are_plain_text() {
        assert_eq!(
            apply_to_value(&tag("MA"), "{a,b}", false, COPY),
            "#####"
        );
    }

    #[test]
    fn tags_follow_the_statement_columns() {
        let definition = parse_create_table(
            "CREATE TABLE public.t (\n    id integer,\n    email text -- ~MA:0,0;*~ ~RE:x,y~\n);",
            "public",
        )
        .unwrap();
        let tags = table_tags(&definition);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].column.to_string(), "public.t.email");

        let columns = vec!["email".to_string(), "id".to_string()];
        let mut values = vec!["'abc'".to_string(), "1".to_string()];
        apply_tags(&tags, &definition, &columns, &mut values, StatementKind::Insert).unwrap();
        assert_eq!(values, vec!["'***'", "1"]);

        let columns = vec!["id".to_string()];
        let mut values = vec!["1".to_string()];
        apply_tags(&tags, &definition, &columns, &mut values, StatementKind::Insert).unwrap();
        assert_eq!(values, vec!["1"]);

        let mut short = vec!["1".to_string()];
        let columns = vec!["id".to_string(), "email".to_string()];
        assert!(apply_tags(&tags, &definition, &columns, &mut short, StatementKind::Insert).is_err());
    }

    #[test]
    fn later_tags_see_earlier_results() {
        let definition = parse_create_table(
            "CREATE TABLE t (\n    code text -- ~RE:a,b~ ~RE:b,c~\n);",
            "public",
        )
        .unwrap();
        let tags = table_tags(&definition);
        let columns = vec!["code".to_string()];
        let mut values = vec!["aab".to_string()];
        apply_tags(&tags, &definition, &columns, &mut values, COPY).unwrap();
        assert_eq!(values, vec!["ccc"]);
    }
}
