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

use regex::Regex;

use super::{split_escaped, strip_quotes};
use crate::error::ScrubError;

/// `pattern1,replacement1;pattern2,replacement2;...`
///
/// Patterns are regular expressions; replacements may refer to capture
/// groups as `$1`. Pairs run in order, each on the output of the previous.
#[derive(Debug, Clone)]
pub struct ReplaceOptions {
    pub replacements: Vec<(Regex, String)>,
}

impl ReplaceOptions {
    pub fn parse(text: &str) -> Result<Self, ScrubError> {
        if text.is_empty() {
            return tag_err!("replace tag without replacements");
        }

        let mut replacements = vec![];
        for pair in split_escaped(text, ';') {
            if pair.is_empty() {
                continue;
            }

            let parts = split_escaped(&pair, ',');
            if parts.len() != 2 {
                return tag_err!("'{}' is not a pattern,replacement pair", pair);
            }

            let pattern = strip_quotes(&parts[0]);
            let regex = match Regex::new(pattern) {
                Ok(regex) => regex,
                Err(e) => return tag_err!("invalid pattern '{}': {}", pattern, e),
            };
            replacements.push((regex, strip_quotes(&parts[1]).to_string()));
        }

        if replacements.is_empty() {
            return tag_err!("replace tag without replacements");
        }

        Ok(ReplaceOptions { replacements })
    }

    pub fn apply(&self, text: &str) -> String {
        self.replacements
            .iter()
            .fold(text.to_string(), |value, (pattern, replacement)| {
                pattern
                    .replace_all(&value, replacement.as_str())
                    .into_owned()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replace(text: &str, options: &str) -> String {
        ReplaceOptions::parse(options).unwrap().apply(text)
    }

    #[test]
    fn replaces_in_order() {
        assert_eq!(
            replace(
                "Offices in Seattle, Tacoma and Kirkland.",
                "Seattle,Cape Town;Tacoma,Johannesburg;Kirkland,Durban"
            ),
            "Offices in Cape Town, Johannesburg and Durban."
        );
        assert_eq!(replace("abc", "a,b;b,c"), "ccc");
    }

    #[test]
    fn escaped_delimiters_are_literal() {
        assert_eq!(replace("a,b;c", "\\,,+;\\;,-"), "a+b-c");
    }

    #[test]
    fn quoted_parts_and_groups() {
        assert_eq!(replace("Smith", "'Smith','Jones'"), "Jones");
        assert_eq!(replace("2019-03-01", r"(\d+)-(\d+)-(\d+),$3/$2/$1"), "01/03/2019");
        assert_eq!(replace("gone", "gone,"), "");
    }

    #[test]
    fn rejects_malformed_pairs() {
        assert!(ReplaceOptions::parse("").is_err());
        assert!(ReplaceOptions::parse("Seattle").is_err());
        assert!(ReplaceOptions::parse("a,b,c").is_err());
        assert!(ReplaceOptions::parse("a,b;c").is_err());
        assert!(ReplaceOptions::parse("(,x").is_err());
        assert!(ReplaceOptions::parse(";").is_err());
    }
}
