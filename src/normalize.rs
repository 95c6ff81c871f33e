//! Canonical form of free-text sub-test descriptions.
//!
//! Only used as the comparison key for fuzzy sub-test matching; identifiers
//! are always compared verbatim.

/// Normalize a description for fuzzy comparison.
///
/// Trims, lowercases, collapses every whitespace run to a single space, then
/// drops every character that is not a letter, digit, whitespace or `-`.
#[must_use]
pub fn normalize_description(text: &str) -> String {
    let lowered = text.trim().to_lowercase();

    let mut collapsed = String::with_capacity(lowered.len());
    let mut in_space = false;
    for ch in lowered.chars() {
        if ch.is_whitespace() {
            if !in_space {
                collapsed.push(' ');
            }
            in_space = true;
        } else {
            collapsed.push(ch);
            in_space = false;
        }
    }

    collapsed
        .chars()
        .filter(|ch| ch.is_alphanumeric() || *ch == ' ' || *ch == '-')
        .collect()
}
