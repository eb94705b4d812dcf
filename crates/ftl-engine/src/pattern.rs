/*
 * pattern.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled regular expressions with engine-defined flag bits.

use std::fmt;

use regex::{Regex, RegexBuilder};

/// A compiled pattern together with the flag bits it was compiled with.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    flags: u32,
    regex: Regex,
}

impl Pattern {
    pub const CASE_INSENSITIVE: u32 = 0x02;
    pub const MULTILINE: u32 = 0x08;
    pub const UNICODE_CASE: u32 = 0x40;

    /// Compile `source` with a bitwise OR of the flag constants above.
    ///
    /// Unknown bits are kept in [`Pattern::flags`] but have no effect.
    pub fn compile(source: &str, flags: u32) -> Result<Self, regex::Error> {
        // Case folding is always Unicode-aware, so UNICODE_CASE needs no
        // builder switch of its own.
        let regex = RegexBuilder::new(source)
            .case_insensitive(flags & Self::CASE_INSENSITIVE != 0)
            .multi_line(flags & Self::MULTILINE != 0)
            .build()?;
        Ok(Self {
            source: source.to_string(),
            flags,
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern")
            .field("source", &self.source)
            .field("flags", &self.flags)
            .finish()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_flag() {
        let p = Pattern::compile("^abc$", Pattern::CASE_INSENSITIVE).unwrap();
        assert!(p.is_match("ABC"));
        assert_eq!(p.flags(), 0x02);

        let strict = Pattern::compile("^abc$", 0).unwrap();
        assert!(!strict.is_match("ABC"));
    }

    #[test]
    fn test_multiline_flag() {
        let p = Pattern::compile("^b$", Pattern::MULTILINE).unwrap();
        assert!(p.is_match("a\nb\nc"));
        let single = Pattern::compile("^b$", 0).unwrap();
        assert!(!single.is_match("a\nb\nc"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(Pattern::compile("(", 0).is_err());
    }
}
