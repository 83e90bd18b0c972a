//! Locale-style string ordering for facet values and sortable columns.
//!
//! Uses the Unicode root collation, so letters with diacritics or strokes
//! (é, Ł, Ø, Đ) sort next to their base letters rather than after `z`.
//! Strings the collator considers equal fall back to code-point order so
//! that distinct strings never compare equal.

use std::cmp::Ordering;

use icu_collator::{Collator, CollatorOptions};
use tracing::warn;

pub struct Collation {
    collator: Option<Collator>,
}

impl Collation {
    pub fn root() -> Self {
        let collator = match Collator::try_new(&Default::default(), CollatorOptions::new()) {
            Ok(collator) => Some(collator),
            Err(err) => {
                warn!(error = ?err, "collation: root collator unavailable, using code points");
                None
            }
        };
        Self { collator }
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match &self.collator {
            Some(collator) => collator.compare(a, b).then_with(|| a.cmp(b)),
            None => a.cmp(b),
        }
    }
}

impl Default for Collation {
    fn default() -> Self {
        Self::root()
    }
}

pub fn compare(a: &str, b: &str) -> Ordering {
    Collation::root().compare(a, b)
}

/// Sorts strings in place by collation order. The sort is stable.
pub fn sort_strings(values: &mut [String]) {
    let collation = Collation::root();
    values.sort_by(|a, b| collation.compare(a, b));
}

#[cfg(test)]
#[path = "tests/collation_tests.rs"]
mod tests;
