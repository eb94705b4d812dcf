/*
 * locale.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Locales for localized template lookup.

use std::fmt;

/// A language/country/variant triple.
///
/// Displays in the underscore form used for localized template names
/// (`en_US`), while [`Locale::to_language_tag`] gives the hyphenated form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Locale {
    language: String,
    country: String,
    variant: String,
}

impl Locale {
    pub fn new(language: &str, country: &str, variant: &str) -> Self {
        Self {
            language: language.to_ascii_lowercase(),
            country: country.to_ascii_uppercase(),
            variant: variant.to_string(),
        }
    }

    /// Parse a hyphen-separated language tag such as `en-US` or `de-CH-1996`.
    ///
    /// Malformed subtags are dropped rather than rejected, and an empty or
    /// `und` tag yields the root locale.
    pub fn for_language_tag(tag: &str) -> Self {
        let mut parts = tag.split('-').filter(|p| !p.is_empty());
        let mut locale = Locale::default();

        let Some(language) = parts.next() else {
            return locale;
        };
        if is_alpha(language, 2..=8) && !language.eq_ignore_ascii_case("und") {
            locale.language = language.to_ascii_lowercase();
        }

        let mut variants = Vec::new();
        for part in parts {
            if locale.country.is_empty() && variants.is_empty() && is_alpha(part, 4..=4) {
                // Script subtag, not part of the lookup chain.
                continue;
            }
            if locale.country.is_empty()
                && variants.is_empty()
                && (is_alpha(part, 2..=2) || is_digits(part, 3))
            {
                locale.country = part.to_ascii_uppercase();
                continue;
            }
            if part.eq_ignore_ascii_case("x") || part.len() == 1 {
                // Extensions and private use end the variant list.
                break;
            }
            variants.push(part);
        }
        locale.variant = variants.join("_");
        locale
    }

    /// Locale from the process environment (`LC_ALL`, `LC_MESSAGES`, `LANG`),
    /// falling back to `en_US`.
    pub fn default_locale() -> Self {
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find_map(|value| Self::from_posix(&value))
            .unwrap_or_else(|| Locale::new("en", "US", ""))
    }

    /// Parse a POSIX locale name like `de_DE.UTF-8@euro`.
    fn from_posix(value: &str) -> Option<Self> {
        let name = value.split(['.', '@']).next().unwrap_or("");
        if name.is_empty() || name == "C" || name == "POSIX" {
            return None;
        }
        let locale = Self::for_language_tag(&name.replace('_', "-"));
        (!locale.language.is_empty()).then_some(locale)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Hyphenated form, e.g. `en-US`.
    pub fn to_language_tag(&self) -> String {
        [&self.language, &self.country, &self.variant]
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| p.replace('_', "-"))
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Name suffixes for localized lookup, most specific first, ending with
    /// the empty suffix: `["_en_US", "_en", ""]`.
    pub fn lookup_suffixes(&self) -> Vec<String> {
        let mut suffixes = Vec::new();
        if !self.language.is_empty() {
            if !self.country.is_empty() {
                if !self.variant.is_empty() {
                    suffixes.push(format!(
                        "_{}_{}_{}",
                        self.language, self.country, self.variant
                    ));
                }
                suffixes.push(format!("_{}_{}", self.language, self.country));
            }
            suffixes.push(format!("_{}", self.language));
        }
        suffixes.push(String::new());
        suffixes
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [&self.language, &self.country, &self.variant]
            .into_iter()
            .map(String::as_str)
            .collect();
        match parts.as_slice() {
            [lang, "", ""] => write!(f, "{}", lang),
            [lang, country, ""] => write!(f, "{}_{}", lang, country),
            [lang, country, variant] => write!(f, "{}_{}_{}", lang, country, variant),
            _ => Ok(()),
        }
    }
}

fn is_alpha(s: &str, len: std::ops::RangeInclusive<usize>) -> bool {
    len.contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphabetic())
}

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_language_tag() {
        let l = Locale::for_language_tag("en-US");
        assert_eq!(l.language(), "en");
        assert_eq!(l.country(), "US");
        assert_eq!(l.to_string(), "en_US");
        assert_eq!(l.to_language_tag(), "en-US");
    }

    #[test]
    fn test_script_and_variant() {
        let l = Locale::for_language_tag("sr-Latn-RS-1996");
        assert_eq!(l.language(), "sr");
        assert_eq!(l.country(), "RS");
        assert_eq!(l.variant(), "1996");
        assert_eq!(l.to_string(), "sr_RS_1996");
    }

    #[test]
    fn test_undetermined_is_root() {
        assert_eq!(Locale::for_language_tag("und"), Locale::default());
        assert_eq!(Locale::for_language_tag(""), Locale::default());
        assert_eq!(Locale::default().lookup_suffixes(), vec![String::new()]);
    }

    #[test]
    fn test_lookup_suffixes() {
        let l = Locale::for_language_tag("en-US");
        assert_eq!(l.lookup_suffixes(), vec!["_en_US", "_en", ""]);
    }

    #[test]
    fn test_from_posix() {
        let l = Locale::from_posix("de_DE.UTF-8").unwrap();
        assert_eq!(l.to_string(), "de_DE");
        assert!(Locale::from_posix("C").is_none());
        assert!(Locale::from_posix("POSIX").is_none());
    }
}
