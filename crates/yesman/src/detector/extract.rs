// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Option extraction rules (§4.3).

use std::sync::LazyLock;

use regex::Regex;

use super::pattern::OptionRule;
use super::PromptKind;

// OK to panic here — these are hardcoded literal patterns, not user- or
// config-supplied; a compile failure is a code bug caught on first use, not
// a runtime condition to recover from.
#[allow(clippy::expect_used)]
static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(\d+)[.)]\s+(.+?)\s*$").expect("static regex"));
#[allow(clippy::expect_used)]
static LONG_FORM_YES_NO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\(yes/no\)|\[yes/no\]").expect("static regex"));

/// Extract candidate options from the matched window of lines, per
/// `option_rule`. `NumberedSelection` options are returned 0-based in the
/// result even though the source text is 1-based.
pub fn extract_options(kind: PromptKind, rule: OptionRule, window: &[String]) -> Vec<String> {
    match rule {
        OptionRule::Numbered => {
            let mut found: Vec<(u32, String)> = Vec::new();
            for line in window {
                if let Some(caps) = NUMBERED_LINE.captures(line) {
                    if let (Some(index), Some(label)) = (caps.get(1), caps.get(2)) {
                        if let Ok(index) = index.as_str().parse::<u32>() {
                            found.push((index, label.as_str().to_owned()));
                        }
                    }
                }
            }
            found.sort_by_key(|(index, _)| *index);
            found.into_iter().map(|(_, label)| label).collect()
        }
        OptionRule::YesNo => {
            let joined = window.join("\n");
            if matches!(kind, PromptKind::YesNo | PromptKind::TrustWorkspace) && LONG_FORM_YES_NO.is_match(&joined) {
                vec!["yes".to_string(), "no".to_string()]
            } else {
                vec!["y".to_string(), "n".to_string()]
            }
        }
        OptionRule::None => Vec::new(),
    }
}
