//! Canonical form of free-text load tags.
//!
//! Operators type tags by hand ("DWDM-1", "dwdm–1 (pass through)"), so two
//! circuits carry the same technology when their canonical forms are
//! equal. Matching is exact on the canonical form, never fuzzy.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // One or more trailing "(pass through)" markers, any spacing/dashing
    static ref PASS_THROUGH_SUFFIX: Regex =
        Regex::new(r"(\s*\(\s*pass[\s_-]*through\s*\))+\s*$").unwrap();

    // Dashes with optional surrounding whitespace
    static ref DASH_RUN: Regex = Regex::new(r"\s*-+\s*").unwrap();

    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

const DASH_VARIANTS: [char; 10] = [
    '\u{2010}', // hyphen
    '\u{2011}', // non-breaking hyphen
    '\u{2012}', // figure dash
    '\u{2013}', // en dash
    '\u{2014}', // em dash
    '\u{2015}', // horizontal bar
    '\u{2043}', // hyphen bullet
    '\u{2212}', // minus sign
    '\u{FE63}', // small hyphen-minus
    '\u{FF0D}', // fullwidth hyphen-minus
];

/// Canonicalize a load tag for comparison.
///
/// Lowercases, unifies dash variants, strips "(pass through)" suffixes,
/// turns punctuation other than `- + / .` into spaces, and normalizes
/// whitespace. Empty input yields an empty string.
pub fn normalize_load_tag(tag: &str) -> String {
    let lowered: String = tag
        .to_lowercase()
        .chars()
        .map(|c| if DASH_VARIANTS.contains(&c) { '-' } else { c })
        .collect();

    let stripped = PASS_THROUGH_SUFFIX.replace(&lowered, "");

    let spaced: String = stripped
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || matches!(c, '-' | '+' | '/' | '.') {
                c
            } else {
                ' '
            }
        })
        .collect();

    let dashed = DASH_RUN.replace_all(&spaced, "-");
    let collapsed = WHITESPACE_RUN.replace_all(dashed.trim(), " ");

    collapsed.trim_matches('-').trim().to_string()
}

/// Whether two tags name the same technology
pub fn same_technology(a: &str, b: &str) -> bool {
    let left = normalize_load_tag(a);
    !left.is_empty() && left == normalize_load_tag(b)
}
