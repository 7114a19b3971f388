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

//! Quoting conventions of values inside a dump: SQL string literals in
//! INSERT statements, COPY text escapes and one-dimensional array literals.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// `'string value'` or `E'string value'`, with the quote escaping removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlString {
    pub escape_string: bool,
    pub value: String,
}

impl SqlString {
    /// Unwrap a quoted literal. Anything else (numbers, NULL, function calls)
    /// returns None.
    pub fn parse(text: &str) -> Option<SqlString> {
        let (escape_string, body) = if let Some(rest) = strip_prefix_ignore_case(text, "E'") {
            (true, rest)
        } else if let Some(rest) = text.strip_prefix('\'') {
            (false, rest)
        } else {
            return None;
        };
        let body = body.strip_suffix('\'')?;

        let value = if escape_string {
            decode_escape_string(body)
        } else {
            body.replace("''", "'")
        };

        Some(SqlString {
            escape_string,
            value,
        })
    }

    pub fn with_value(&self, value: String) -> SqlString {
        SqlString {
            escape_string: self.escape_string,
            value,
        }
    }
}

impl fmt::Display for SqlString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.escape_string {
            write!(f, "E'{}'", EscapeBackslashString(&self.value))
        } else {
            write!(f, "'{}'", escape_single_quote_string(&self.value))
        }
    }
}

pub struct EscapeSingleQuoteString<'a>(&'a str);

impl<'a> fmt::Display for EscapeSingleQuoteString<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for c in self.0.chars() {
            if c == '\'' {
                write!(f, "''")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        Ok(())
    }
}

pub fn escape_single_quote_string(s: &str) -> EscapeSingleQuoteString<'_> {
    EscapeSingleQuoteString(s)
}

// Body of an `E'...'` literal, quotes doubled and backslashes escaped. Line
// breaks and tabs stay raw, as pg_dump writes them, so line counts hold.
struct EscapeBackslashString<'a>(&'a str);

impl<'a> fmt::Display for EscapeBackslashString<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '\'' => f.write_str("''")?,
                '\\' => f.write_str("\\\\")?,
                '\n' | '\r' | '\t' => write!(f, "{}", c)?,
                '\u{8}' => f.write_str("\\b")?,
                '\u{c}' => f.write_str("\\f")?,
                c if c.is_ascii_control() => write!(f, "\\x{:02x}", c as u32)?,
                c => write!(f, "{}", c)?,
            }
        }
        Ok(())
    }
}

/// Resolve the backslash escapes of an `E'...'` body: `\b \f \n \r \t`,
/// octal `\o[o[o]]`, hex `\xh[h]`, `\uXXXX`, `\UXXXXXXXX`; any other escaped
/// character stands for itself. Doubled quotes become one.
fn decode_escape_string(body: &str) -> String {
    let mut value = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                }
                value.push('\'');
            }
            '\\' => match chars.next() {
                Some('b') => value.push('\u{8}'),
                Some('f') => value.push('\u{c}'),
                Some('n') => value.push('\n'),
                Some('r') => value.push('\r'),
                Some('t') => value.push('\t'),
                Some(digit @ '0'..='7') => {
                    let mut code = digit.to_digit(8).unwrap_or(0);
                    for _ in 0..2 {
                        match chars.peek().and_then(|next| next.to_digit(8)) {
                            Some(next) => {
                                code = code * 8 + next;
                                chars.next();
                            }
                            None => break,
                        }
                    }
                    value.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
                Some('x') if chars.peek().map_or(false, char::is_ascii_hexdigit) => {
                    value.push(take_hex(&mut chars, 2));
                }
                Some('u') => value.push(take_hex(&mut chars, 4)),
                Some('U') => value.push(take_hex(&mut chars, 8)),
                Some(other) => value.push(other),
                None => value.push('\\'),
            },
            ch => value.push(ch),
        }
    }

    value
}

fn take_hex(chars: &mut Peekable<Chars>, max_digits: usize) -> char {
    let mut code = 0u32;
    for _ in 0..max_digits {
        match chars.peek().and_then(|next| next.to_digit(16)) {
            Some(digit) => {
                code = code * 16 + digit;
                chars.next();
            }
            None => break,
        }
    }
    char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// Unquoted `NULL` keyword of an INSERT value.
pub fn is_sql_null(text: &str) -> bool {
    text.eq_ignore_ascii_case("NULL")
}

/// `\N` marker of COPY text data.
pub fn is_copy_null(text: &str, escape: char) -> bool {
    let mut chars = text.chars();
    chars.next() == Some(escape) && chars.next() == Some('N') && chars.next().is_none()
}

/// Resolve the escape sequences of a COPY text field.
pub fn decode_copy_text(text: &str, escape: char) -> String {
    let mut decoded = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        if ch != escape {
            decoded.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => decoded.push('\n'),
            Some('t') => decoded.push('\t'),
            Some('r') => decoded.push('\r'),
            Some('b') => decoded.push('\u{8}'),
            Some('f') => decoded.push('\u{c}'),
            Some('v') => decoded.push('\u{b}'),
            Some(other) => decoded.push(other),
            None => decoded.push(escape),
        }
    }

    decoded
}

/// Inverse of `decode_copy_text`.
pub fn encode_copy_text(text: &str, escape: char) -> String {
    let mut encoded = String::with_capacity(text.len());

    for ch in text.chars() {
        let sequence = match ch {
            '\n' => 'n',
            '\t' => 't',
            '\r' => 'r',
            '\u{8}' => 'b',
            '\u{c}' => 'f',
            '\u{b}' => 'v',
            ch if ch == escape => escape,
            ch => {
                encoded.push(ch);
                continue;
            }
        };
        encoded.push(escape);
        encoded.push(sequence);
    }

    encoded
}

/// Body of a one-dimensional array literal `{a,b,c}`.
pub fn array_body(text: &str) -> Option<&str> {
    text.strip_prefix('{')?.strip_suffix('}')
}

/// Split an array body on commas outside double-quoted elements.
pub fn split_array_elements(body: &str) -> Vec<String> {
    let mut elements = vec![];
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = body.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if quoted => {
                current.push(ch);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '"' => {
                quoted = !quoted;
                current.push(ch);
            }
            ',' if !quoted => elements.push(std::mem::take(&mut current)),
            ch => current.push(ch),
        }
    }
    elements.push(current);

    elements
}

/// Strip the surrounding `wrap` characters when `text` is wrapped in them.
pub fn strip_wrapping(text: &str, wrap: char) -> Option<&str> {
    if text.chars().count() >= 2 {
        text.strip_prefix(wrap)?.strip_suffix(wrap)
    } else {
        None
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_strings_unescape_doubled_quotes() {
        let literal = SqlString::parse("'O''Brien'").unwrap();
        assert!(!literal.escape_string);
        assert_eq!(literal.value, "O'Brien");
        assert_eq!(literal.to_string(), "'O''Brien'");
    }

    #[test]
    fn escape_strings_keep_their_prefix() {
        let literal = SqlString::parse("E'it\\'s a\\\\b'").unwrap();
        assert!(literal.escape_string);
        assert_eq!(literal.value, "it's a\\b");
        assert_eq!(literal.to_string(), "E'it''s a\\\\b'");
        assert_eq!(literal.with_value("x'y".to_string()).to_string(), "E'x''y'");
    }

    #[test]
    fn escape_strings_decode_backslash_sequences() {
        let literal = SqlString::parse("E'a\\nb\\tc\\101\\x42\\u00e9\\q'").unwrap();
        assert_eq!(literal.value, "a\nb\tcABéq");
        assert_eq!(literal.to_string(), "E'a\nb\tcABéq'");

        let literal = SqlString::parse("E'ab\\\\'").unwrap();
        assert_eq!(literal.value, "ab\\");
        let masked = literal.with_value("##\\".to_string()).to_string();
        assert_eq!(masked, "E'##\\\\'");
        assert_eq!(SqlString::parse(&masked).unwrap().value, "##\\");

        let literal = SqlString::parse("E'bell\\007'").unwrap();
        assert_eq!(literal.to_string(), "E'bell\\x07'");
    }

    #[test]
    fn non_strings_are_not_literals() {
        assert_eq!(SqlString::parse("42"), None);
        assert_eq!(SqlString::parse("NULL"), None);
        assert_eq!(SqlString::parse("'"), None);
        assert_eq!(SqlString::parse("nextval('seq')"), None);
    }

    #[test]
    fn null_markers() {
        assert!(is_sql_null("NULL"));
        assert!(is_sql_null("null"));
        assert!(!is_sql_null("'NULL'"));
        assert!(is_copy_null("\\N", '\\'));
        assert!(!is_copy_null("\\Nope", '\\'));
        assert!(!is_copy_null("N", '\\'));
    }

    #[test]
    fn copy_text_escapes() {
        let raw = "507 - 20th Ave.E.\\nApt. 2A\\\\x\\tend";
        let decoded = decode_copy_text(raw, '\\');
        assert_eq!(decoded, "507 - 20th Ave.E.\nApt. 2A\\x\tend");
        assert_eq!(encode_copy_text(&decoded, '\\'), raw);
    }

    #[test]
    fn array_elements() {
        assert_eq!(array_body("{a,b,c}"), Some("a,b,c"));
        assert_eq!(array_body("'{a}'"), None);
        assert_eq!(
            split_array_elements("\"pizza, cheese\",pasta,\"say \\\"hi\\\"\""),
            vec!["\"pizza, cheese\"", "pasta", "\"say \\\"hi\\\"\""]
        );
        assert_eq!(split_array_elements(""), vec![""]);
    }

    #[test]
    fn wrapping() {
        assert_eq!(strip_wrapping("'abc'", '\''), Some("abc"));
        assert_eq!(strip_wrapping("''", '\''), Some(""));
        assert_eq!(strip_wrapping("'", '\''), None);
        assert_eq!(strip_wrapping("abc", '"'), None);
    }
}
