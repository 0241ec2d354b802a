// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Text normalization shared by matching and fingerprinting.

use std::sync::LazyLock;

use regex::Regex;

// OK to panic here — these are hardcoded literal patterns, not user- or
// config-supplied; a compile failure is a code bug caught on first use, not
// a runtime condition to recover from.
#[allow(clippy::expect_used)]
static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b(\[[0-9;?]*[a-zA-Z]|\][^\x07]*\x07|[()][A-Z0-9])").expect("static regex"));
#[allow(clippy::expect_used)]
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").expect("static regex"));
#[allow(clippy::expect_used)]
static NUMERIC_LITERAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d+\b").expect("static regex"));

const BOX_DRAWING: &[char] = &[
    '│', '┃', '─', '━', '┌', '┐', '└', '┘', '├', '┤', '┬', '┴', '┼', '╭', '╮', '╰', '╯', '║', '═', '╔', '╗', '╚', '╝',
];

/// Strip ANSI escapes and box-drawing characters, collapse whitespace runs
/// to a single space. Used as the input to both matching and fingerprinting
/// — never lowercased here, since matching must stay case-sensitive unless a
/// pattern opts in.
pub fn normalize_for_matching(text: &str) -> String {
    let without_escapes = ANSI_ESCAPE.replace_all(text, "");
    let without_box: String = without_escapes.chars().filter(|c| !BOX_DRAWING.contains(c)).collect();
    WHITESPACE_RUN.replace_all(&without_box, " ").trim().to_string()
}

/// Build the fingerprinting skeleton: normalized text, lowercased, with
/// numeric literals and extracted option labels replaced by placeholders.
/// Two invocations of the same question with different enumerated files
/// therefore share a skeleton.
pub fn skeleton(normalized: &str, options: &[String]) -> String {
    let mut text = normalized.to_lowercase();
    for option in options {
        let needle = option.to_lowercase();
        if !needle.is_empty() {
            text = text.replace(&needle, "\u{2301}");
        }
    }
    NUMERIC_LITERAL.replace_all(&text, "\u{2301}").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_ansi_and_collapses_whitespace() {
        let input = "\x1b[31mDo   you\ttrust\x1b[0m this?";
        assert_eq!(normalize_for_matching(input), "Do you trust this?");
    }

    #[test]
    fn strips_box_drawing_characters() {
        let input = "│ 1. Accept │";
        assert_eq!(normalize_for_matching(input), "1. Accept");
    }

    #[test]
    fn skeleton_replaces_numbers_and_options() {
        let normalized = "Select a file: 1. main.rs 2. lib.rs";
        let options = vec!["main.rs".to_string(), "lib.rs".to_string()];
        let result = skeleton(normalized, &options);
        assert!(!result.contains("main.rs"));
        assert!(!result.contains('1'));
    }

    #[test]
    fn skeleton_is_idempotent_under_repeated_normalization() {
        let a = normalize_for_matching("Do you trust this workspace? (y/n)");
        let b = normalize_for_matching(&normalize_for_matching("Do you trust this workspace? (y/n)"));
        assert_eq!(a, b);
    }
}
