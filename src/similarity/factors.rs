//! Individual similarity factors, each symmetric and in [0, 1]

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Tokens that say nothing about what a project is
const SUFFIX_TOKENS: &[&str] = &[
    "rs", "py", "js", "ts", "go", "rb", "lib", "cli", "core", "sdk", "api", "app", "tool",
    "tools", "master", "main", "fork", "old", "new", "copy", "backup", "legacy", "dev", "test",
    "demo", "the",
];

/// Levenshtein similarity at or above which two normalized names count as the
/// same name spelled differently
pub const NEAR_IDENTICAL: f64 = 0.8;

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:v|ver|version)?\d+(?:[._]\d+)*(?:rc\d*|alpha\d*|beta\d*)?$")
            .expect("static version pattern")
    })
}

/// Splits a name into lowercase word tokens, dropping version and suffix noise.
///
/// `MyTool-v2.1_cli` → `["my", "tool"]`
pub fn name_tokens(name: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in name.chars() {
        if ch.is_alphanumeric() || ch == '.' {
            if ch.is_uppercase() && prev_lower && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
            current.extend(ch.to_lowercase());
        } else {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .into_iter()
        .flat_map(|w| {
            // Dots separate words unless the whole thing is a version
            if version_regex().is_match(&w) {
                Vec::new()
            } else {
                w.split('.').map(str::to_string).collect::<Vec<_>>()
            }
        })
        .filter(|w| !w.is_empty())
        .filter(|w| !version_regex().is_match(w))
        .filter(|w| !SUFFIX_TOKENS.contains(&w.as_str()))
        .collect()
}

/// Token overlap of the normalized names, lifted to the Levenshtein similarity
/// of the joined tokens when the two are near-identical.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let ta = name_tokens(a);
    let tb = name_tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    let set_a: BTreeSet<&str> = ta.iter().map(String::as_str).collect();
    let set_b: BTreeSet<&str> = tb.iter().map(String::as_str).collect();
    let overlap = jaccard(&set_a, &set_b);

    let lev = strsim::normalized_levenshtein(&ta.concat(), &tb.concat());
    if lev >= NEAR_IDENTICAL {
        overlap.max(lev)
    } else {
        overlap
    }
}

/// |A ∩ B| / |A ∪ B|; two empty sets share nothing, so score 0.0
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
