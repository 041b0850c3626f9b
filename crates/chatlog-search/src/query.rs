// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Translation of free-text user queries into FTS5 match expressions.

/// Build an FTS5 `MATCH` expression from raw user input.
///
/// Every whitespace-separated term becomes a quoted prefix term, so FTS5
/// operators and punctuation in the input are matched literally and `hel`
/// finds `hello`. Terms are implicitly ANDed. Terms with no alphanumeric
/// character are dropped; returns `None` when nothing searchable remains.
pub fn match_expression(input: &str) -> Option<String> {
    let terms: Vec<String> = input
        .split_whitespace()
        .map(|term| term.replace('"', ""))
        .filter(|term| term.chars().any(char::is_alphanumeric))
        .map(|term| format!("\"{term}\"*"))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}
