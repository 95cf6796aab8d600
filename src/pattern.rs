// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pattern detector: regex-based classification of whether an agent's most
//! recent screen lines show it still working or waiting on the user (§4.5).
//!
//! Each agent carries two tiers of patterns: a primary set with high
//! confidence and a fallback set with lower confidence, checked in order
//! against the tail of the screen, stripped of ANSI escapes. Patterns are
//! compiled once at construction and held for the host's lifetime.

use std::collections::HashMap;

use regex::Regex;

/// Confidence assigned to a primary-tier match.
pub const PRIMARY_CONFIDENCE: f64 = 0.95;
/// Confidence assigned to a fallback-tier match.
pub const FALLBACK_CONFIDENCE: f64 = 0.75;
/// Number of trailing screen lines scanned by default.
pub const DEFAULT_SCAN_LINE_COUNT: usize = 10;

/// Which tier of pattern, if any, produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Primary,
    Fallback,
    None,
}

/// Result of scanning a screen's recent lines for working/idle patterns.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub is_working: bool,
    pub confidence: f64,
    pub match_tier: MatchTier,
    pub matched_text: Option<String>,
}

impl PatternMatch {
    fn none() -> Self {
        Self { is_working: false, confidence: 0.0, match_tier: MatchTier::None, matched_text: None }
    }
}

fn strip_ansi(text: &str, ansi: &Regex) -> String {
    ansi.replace_all(text, "").into_owned()
}

struct AgentPatterns {
    primary: Vec<Regex>,
    fallback: Vec<Regex>,
}

/// Compiles and holds the per-agent working/idle pattern tiers.
pub struct PatternDetector {
    ansi: Regex,
    patterns: HashMap<String, AgentPatterns>,
}

impl PatternDetector {
    /// Compile the built-in pattern set. Fails only if a built-in pattern
    /// itself is malformed, which would be a programming error caught
    /// immediately by the constructor's own test.
    pub fn new() -> anyhow::Result<Self> {
        let compile = |specs: &[&str]| -> anyhow::Result<Vec<Regex>> {
            specs.iter().map(|p| Regex::new(p).map_err(anyhow::Error::from)).collect()
        };

        let mut patterns = HashMap::new();
        patterns.insert(
            "claude".to_owned(),
            AgentPatterns {
                primary: compile(&[
                    r"(?i)(Esc to interrupt|esc to cancel)",
                    r"(?i)(Thinking|Pondering|Churning)\.\.\.",
                ])?,
                fallback: compile(&[r"(?i)tokens?\s*(used|remaining)"])?,
            },
        );
        patterns.insert(
            "codex".to_owned(),
            AgentPatterns {
                primary: compile(&[r"(?i)(working|running)\.\.\."])?,
                fallback: compile(&[r"(?i)ctrl-c to stop"])?,
            },
        );
        patterns.insert(
            "gemini".to_owned(),
            AgentPatterns {
                primary: compile(&[r"(?i)generating\.\.\."])?,
                fallback: compile(&[r"(?i)please wait"])?,
            },
        );

        let ansi = Regex::new(r"\x1b\[[0-9;?]*[a-zA-Z]|\x1b\][^\x07]*\x07|\x1b[()][AB012]")?;
        Ok(Self { ansi, patterns })
    }

    /// Scan the trailing `scan_line_count` lines of `screen_text` for this
    /// agent's working-state patterns. Lines are ANSI-stripped before
    /// matching. An agent with no registered patterns always returns
    /// `MatchTier::None`.
    pub fn detect(&self, agent_id: &str, screen_text: &str, scan_line_count: usize) -> PatternMatch {
        let Some(patterns) = self.patterns.get(&agent_id.to_lowercase()) else {
            return PatternMatch::none();
        };

        let lines: Vec<&str> = screen_text.lines().collect();
        let start = lines.len().saturating_sub(scan_line_count);
        let tail = lines[start..].join("\n");
        let cleaned = strip_ansi(&tail, &self.ansi);

        for re in &patterns.primary {
            if let Some(m) = re.find(&cleaned) {
                return PatternMatch {
                    is_working: true,
                    confidence: PRIMARY_CONFIDENCE,
                    match_tier: MatchTier::Primary,
                    matched_text: Some(m.as_str().to_owned()),
                };
            }
        }
        for re in &patterns.fallback {
            if let Some(m) = re.find(&cleaned) {
                return PatternMatch {
                    is_working: true,
                    confidence: FALLBACK_CONFIDENCE,
                    match_tier: MatchTier::Fallback,
                    matched_text: Some(m.as_str().to_owned()),
                };
            }
        }
        PatternMatch::none()
    }

    /// Convenience wrapper using [`DEFAULT_SCAN_LINE_COUNT`].
    pub fn detect_default(&self, agent_id: &str, screen_text: &str) -> PatternMatch {
        self.detect(agent_id, screen_text, DEFAULT_SCAN_LINE_COUNT)
    }
}

#[cfg(test)]
#[path = "pattern_tests.rs"]
mod tests;
