//! INCI name normalization.
//!
//! Canonicalizes raw ingredient-name strings into comparable keys:
//! two strings that differ only in accents, casing, or whitespace runs
//! normalize identically. Also produces the title-cased presentation
//! form used in responses.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize a raw ingredient name into its comparison key.
///
/// NFKD-decomposes, strips combining marks, lowercases, and collapses
/// whitespace runs to a single space. Pure and idempotent; empty or
/// whitespace-only input yields the empty string.
pub fn normalize(raw: &str) -> String {
    raw.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title-case a normalized name for display: first letter of each
/// whitespace-separated word uppercased.
pub fn title_case(normalized: &str) -> String {
    normalized
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A caller's ingredient list after normalization.
///
/// Order is meaningful (INCI lists are ordered by concentration) and is
/// used for proximity scoring. Empty entries are dropped; duplicates are
/// removed by normalized key, keeping the first occurrence.
#[derive(Debug, Clone, Default)]
pub struct NormalizedQuery {
    keys: Vec<String>,
    display: Vec<String>,
}

impl NormalizedQuery {
    /// Normalize a raw query list.
    pub fn from_raw<S: AsRef<str>>(raws: &[S]) -> Self {
        let mut keys = Vec::new();
        let mut display = Vec::new();

        for raw in raws {
            let key = normalize(raw.as_ref());
            if key.is_empty() || keys.contains(&key) {
                continue;
            }
            display.push(title_case(&key));
            keys.push(key);
        }

        Self { keys, display }
    }

    /// Normalized comparison keys, in query order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Title-cased presentation forms, parallel to `keys`.
    pub fn display(&self) -> &[String] {
        &self.display
    }

    /// Position of a normalized key within the query.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
