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

//! Random and fuzz tags, and the random source behind both.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::ScrubError;

const DIGITS: &[u8] = b"0123456789";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Uniform picks from a cryptographically strong source.
///
/// Draws of 32 bits at or above the largest multiple of the range are thrown
/// away before taking the modulo, so no symbol is favoured.
pub struct SafeRandom<R = OsRng> {
    rng: R,
}

impl SafeRandom<OsRng> {
    pub fn new() -> Self {
        SafeRandom { rng: OsRng }
    }
}

impl Default for SafeRandom<OsRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore> SafeRandom<R> {
    pub fn with_rng(rng: R) -> Self {
        SafeRandom { rng }
    }

    /// A value in `0..range`.
    pub fn below(&mut self, range: u32) -> u32 {
        if range <= 1 {
            return 0;
        }

        let range = u64::from(range);
        let limit = (u64::from(u32::MAX) + 1) / range * range;
        loop {
            let draw = u64::from(self.rng.next_u32());
            if draw < limit {
                return (draw % range) as u32;
            }
        }
    }

    fn pick(&mut self, symbols: &[u8]) -> char {
        char::from(symbols[self.below(symbols.len() as u32) as usize])
    }

    pub fn digit(&mut self) -> char {
        self.pick(DIGITS)
    }

    pub fn uppercase(&mut self) -> char {
        self.pick(UPPERCASE)
    }

    pub fn lowercase(&mut self) -> char {
        self.pick(LOWERCASE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomOptions {
    /// `N` digit, `A` uppercase letter, `a` lowercase letter, anything else
    /// is copied.
    pub pattern: String,
}

impl RandomOptions {
    pub fn parse(text: &str) -> Result<Self, ScrubError> {
        if text.is_empty() {
            return tag_err!("random tag without a pattern");
        }
        Ok(RandomOptions {
            pattern: text.to_string(),
        })
    }

    /// A fresh value following the pattern.
    pub fn generate<R: RngCore>(&self, random: &mut SafeRandom<R>) -> String {
        self.pattern
            .chars()
            .map(|ch| match ch {
                'N' => random.digit(),
                'A' => random.uppercase(),
                'a' => random.lowercase(),
                ch => ch,
            })
            .collect()
    }
}

/// Swap every letter and digit for a random one of the same kind.
pub fn fuzz<R: RngCore>(text: &str, random: &mut SafeRandom<R>) -> String {
    text.chars()
        .map(|ch| {
            if ch.is_numeric() {
                random.digit()
            } else if ch.is_uppercase() {
                random.uppercase()
            } else if ch.is_alphabetic() {
                random.lowercase()
            } else {
                ch
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use regex::Regex;

    #[test]
    fn rejects_biased_draws() {
        // u32::MAX lies above the last full multiple of 10 and is redrawn
        let mut random = SafeRandom::with_rng(StepRng::new(u64::from(u32::MAX), 1));
        assert_eq!(random.below(10), 0);

        let mut random = SafeRandom::with_rng(StepRng::new(4_294_967_289, 1));
        assert_eq!(random.below(10), 9);

        let mut random = SafeRandom::with_rng(StepRng::new(7, 0));
        assert_eq!(random.below(1), 0);
        assert_eq!(random.below(0), 0);
    }

    #[test]
    fn every_symbol_is_reachable() {
        let mut random = SafeRandom::with_rng(StepRng::new(0, 1));
        let digits: String = (0..10).map(|_| random.digit()).collect();
        assert_eq!(digits, "0123456789");

        let mut random = SafeRandom::with_rng(StepRng::new(25, 0));
        assert_eq!(random.uppercase(), 'Z');
        assert_eq!(random.lowercase(), 'z');
    }

    #[test]
    fn patterns_generate_matching_values() {
        let options = RandomOptions::parse("+NNN(NNN) NNN-NNNN").unwrap();
        let shape = Regex::new(r"^\+[0-9]{3}\([0-9]{3}\) [0-9]{3}-[0-9]{4}$").unwrap();
        let mut random = SafeRandom::new();
        for _ in 0..50 {
            assert!(shape.is_match(&options.generate(&mut random)));
        }

        let options = RandomOptions::parse("Aaa-N").unwrap();
        let value = options.generate(&mut random);
        assert!(Regex::new("^[A-Z][a-z]{2}-[0-9]$").unwrap().is_match(&value));
    }

    #[test]
    fn empty_patterns_are_rejected() {
        assert!(RandomOptions::parse("").is_err());
    }

    #[test]
    fn fuzz_keeps_the_shape() {
        let shape =
            Regex::new("^[A-Z][a-z][0-9][A-Z][a-z][A-Z][a-z][0-9][A-Z][a-z][a-z]$").unwrap();
        let mut random = SafeRandom::new();
        let mut changed = false;
        for _ in 0..20 {
            let fuzzed = fuzz("Ed1UcAt3Ion", &mut random);
            assert!(shape.is_match(&fuzzed), "{}", fuzzed);
            changed |= fuzzed != "Ed1UcAt3Ion";
        }
        assert!(changed);

        assert_eq!(fuzz("-- @ --", &mut random), "-- @ --");
        assert_eq!(fuzz("é", &mut random).chars().count(), 1);
    }
}
