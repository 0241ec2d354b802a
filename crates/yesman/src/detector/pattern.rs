// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk pattern library: a directory tree grouping patterns by
//! [`PromptKind`], one TOML file per pattern. Patterns are data, not code —
//! this is the one place the detector's matching rules live.

use std::path::Path;

use serde::Deserialize;

use super::PromptKind;

/// How to pull candidate options out of the matched lines once a pattern
/// fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionRule {
    /// `NumberedSelection`: lines of the form `N. label` / `N) label`.
    Numbered,
    /// `YesNo`/`TrustWorkspace`: fixed `["y", "n"]` or `["yes", "no"]`.
    YesNo,
    /// No options; response is an empty string / bare Enter.
    None,
}

#[derive(Debug, Deserialize)]
struct PatternFile {
    /// Regular expression matched against the normalized snapshot text.
    #[serde(rename = "pattern")]
    regex: Option<String>,
    /// Literal substring match, used instead of `pattern` for simple cases.
    literal: Option<String>,
    #[serde(default)]
    case_insensitive: bool,
    option_rule: OptionRule,
    /// Lower priorities match first.
    priority: i32,
}

/// A single loaded, compiled pattern.
pub struct Pattern {
    pub kind: PromptKind,
    pub option_rule: OptionRule,
    pub priority: i32,
    matcher: Matcher,
}

enum Matcher {
    Regex(regex::Regex),
    Literal { needle: String, case_insensitive: bool },
}

impl Pattern {
    pub fn matches(&self, normalized: &str) -> bool {
        match &self.matcher {
            Matcher::Regex(re) => re.is_match(normalized),
            Matcher::Literal { needle, case_insensitive } => {
                if *case_insensitive {
                    normalized.to_lowercase().contains(&needle.to_lowercase())
                } else {
                    normalized.contains(needle.as_str())
                }
            }
        }
    }
}

/// A loaded, priority-ordered set of patterns plus the configured detection
/// window (trailing N lines inspected).
pub struct PatternLibrary {
    patterns: Vec<Pattern>,
    window_lines: usize,
}

impl PatternLibrary {
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn window_lines(&self) -> usize {
        self.window_lines
    }

    /// Load every `*.toml` file under `dir`, one subdirectory per
    /// [`PromptKind`] (`yes_no/`, `numbered/`, `binary/`, `continuation/`,
    /// `trust_workspace/`, `login/`). Fails with a descriptive error if any
    /// file does not parse — this is the `PatternLibraryInvalid` condition,
    /// fatal at startup.
    pub fn load_dir(dir: &Path, window_lines: usize) -> anyhow::Result<Self> {
        let mut patterns = Vec::new();

        for entry in std::fs::read_dir(dir).map_err(|e| anyhow::anyhow!("reading pattern dir {dir:?}: {e}"))? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(dir_name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            let Some(kind) = PromptKind::from_dir_name(dir_name) else {
                anyhow::bail!("unknown pattern kind directory: {dir_name}");
            };

            for file in std::fs::read_dir(&path)? {
                let file = file?;
                let file_path = file.path();
                if file_path.extension().and_then(|e| e.to_str()) != Some("toml") {
                    continue;
                }
                let contents = std::fs::read_to_string(&file_path)
                    .map_err(|e| anyhow::anyhow!("reading {file_path:?}: {e}"))?;
                let parsed: PatternFile = toml::from_str(&contents)
                    .map_err(|e| anyhow::anyhow!("parsing {file_path:?}: {e}"))?;

                let matcher = match (parsed.regex, parsed.literal) {
                    (Some(pattern), None) => {
                        let pattern = if parsed.case_insensitive { format!("(?i){pattern}") } else { pattern };
                        Matcher::Regex(
                            regex::Regex::new(&pattern)
                                .map_err(|e| anyhow::anyhow!("invalid regex in {file_path:?}: {e}"))?,
                        )
                    }
                    (None, Some(literal)) => {
                        Matcher::Literal { needle: literal, case_insensitive: parsed.case_insensitive }
                    }
                    _ => anyhow::bail!("{file_path:?}: exactly one of `pattern` or `literal` must be set"),
                };

                patterns.push(Pattern { kind, option_rule: parsed.option_rule, priority: parsed.priority, matcher });
            }
        }

        patterns.sort_by_key(|p| p.priority);
        Ok(Self { patterns, window_lines })
    }

    /// An empty library: every snapshot yields `Unknown`, no decisions fire.
    pub fn empty(window_lines: usize) -> Self {
        Self { patterns: Vec::new(), window_lines }
    }

    /// A small built-in library covering the common shapes, used when no
    /// `--pattern-dir` is configured.
    pub fn embedded_default(window_lines: usize) -> anyhow::Result<Self> {
        let specs: &[(PromptKind, &str, OptionRule, i32)] = &[
            (PromptKind::TrustWorkspace, r"(?i)do you trust the (files|authors|workspace)", OptionRule::YesNo, 0),
            (PromptKind::Login, r"(?i)(log ?in|sign ?in|authenticate) (to|with)", OptionRule::None, 5),
            (PromptKind::NumberedSelection, r"(?m)^\s*[1-9][0-9]?[.)]\s+\S", OptionRule::Numbered, 10),
            (PromptKind::Continuation, r"(?i)press enter to continue", OptionRule::None, 15),
            (PromptKind::YesNo, r"\([Yy]/[Nn]\)|\[[Yy]/[Nn]\]", OptionRule::YesNo, 20),
        ];
        let mut patterns = Vec::with_capacity(specs.len());
        for (kind, pattern, rule, priority) in specs {
            patterns.push(Pattern {
                kind: *kind,
                option_rule: *rule,
                priority: *priority,
                matcher: Matcher::Regex(regex::Regex::new(pattern)?),
            });
        }
        Ok(Self { patterns, window_lines })
    }
}

#[cfg(test)]
#[path = "pattern_tests.rs"]
mod tests;
