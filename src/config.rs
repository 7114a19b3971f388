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

/// PostgreSQL refuses tables with more columns than this, so a CREATE TABLE
/// still open after this many lines is malformed.
pub const MAX_TABLE_LINES: usize = 1600;

/// Continuation lines merged into a single INSERT or COMMENT statement.
pub const MAX_STATEMENT_LINES: usize = 100;

/// Knobs of a scrub run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrubConfig {
    /// Escape character of COPY text data.
    pub copy_escape: char,
    pub max_table_lines: usize,
    pub max_statement_lines: usize,
    /// Schema used for table names written without one.
    pub default_schema: String,
}

impl Default for ScrubConfig {
    fn default() -> Self {
        ScrubConfig {
            copy_escape: '\\',
            max_table_lines: MAX_TABLE_LINES,
            max_statement_lines: MAX_STATEMENT_LINES,
            default_schema: "public".to_string(),
        }
    }
}

impl ScrubConfig {
    pub fn with_copy_escape(mut self, escape: char) -> Self {
        self.copy_escape = escape;
        self
    }

    pub fn with_max_table_lines(mut self, lines: usize) -> Self {
        self.max_table_lines = lines;
        self
    }

    pub fn with_max_statement_lines(mut self, lines: usize) -> Self {
        self.max_statement_lines = lines;
        self
    }

    pub fn with_default_schema(mut self, schema: &str) -> Self {
        self.default_schema = schema.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_override_defaults() {
        let config = ScrubConfig::default()
            .with_copy_escape('|')
            .with_max_table_lines(10)
            .with_max_statement_lines(2)
            .with_default_schema("hr");

        assert_eq!(config.copy_escape, '|');
        assert_eq!(config.max_table_lines, 10);
        assert_eq!(config.max_statement_lines, 2);
        assert_eq!(config.default_schema, "hr");
        assert_eq!(ScrubConfig::default().max_table_lines, MAX_TABLE_LINES);
    }
}
