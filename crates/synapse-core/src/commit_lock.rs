//! Commit locking driven by integration debt
//!
//! As debt climbs, commits to the component are first warned about, then
//! restricted to fix/integration work, then refused entirely until the
//! component is integrated.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::config::SeverityBands;

/// Commit types still accepted under a hard lock
pub const ALLOWED_UNDER_HARD_LOCK: &[&str] =
    &["fix", "bugfix", "hotfix", "integration", "merge", "revert", "ci"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockLevel {
    None,
    Soft,
    Hard,
    Total,
}

impl LockLevel {
    /// Lock level for a debt score: warning band and above is soft,
    /// critical anchor and above is hard, quarantine and above is total.
    pub fn from_debt(debt: f64, bands: &SeverityBands) -> Self {
        if debt >= bands.quarantine {
            Self::Total
        } else if debt >= bands.critical {
            Self::Hard
        } else if debt >= bands.warning {
            Self::Soft
        } else {
            Self::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Soft => "soft",
            Self::Hard => "hard",
            Self::Total => "total",
        }
    }
}

/// Whether a commit may land, and what to do about it otherwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockDecision {
    pub allowed: bool,
    pub lock_level: LockLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_type: Option<String>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

fn conventional_commit() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\w+)(\(.+\))?!?:").ok())
        .as_ref()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CommitAnalyzer;

impl CommitAnalyzer {
    /// Extract the commit type from a message.
    ///
    /// Conventional-commit headers (`type(scope)!:`) win; otherwise the
    /// first word is used when it is one of the allowed types.
    pub fn commit_type(message: &str) -> Option<String> {
        let message = message.trim().to_lowercase();

        if let Some(caps) = conventional_commit().and_then(|re| re.captures(&message)) {
            return caps.get(1).map(|m| m.as_str().to_string());
        }

        let first_word = message
            .split(|c: char| !c.is_alphanumeric())
            .next()
            .unwrap_or_default();
        ALLOWED_UNDER_HARD_LOCK
            .iter()
            .find(|t| **t == first_word)
            .map(|t| t.to_string())
    }

    pub fn is_allowed_under_hard_lock(commit_type: Option<&str>) -> bool {
        commit_type.map_or(false, |t| ALLOWED_UNDER_HARD_LOCK.contains(&t))
    }

    pub fn analyze(message: &str, level: LockLevel) -> LockDecision {
        let commit_type = Self::commit_type(message);
        let shown = commit_type.as_deref().unwrap_or("unknown").to_string();

        match level {
            LockLevel::None => LockDecision {
                allowed: true,
                lock_level: level,
                commit_type,
                reason: "No integration lock active".to_string(),
                suggestions: Vec::new(),
            },
            LockLevel::Soft => LockDecision {
                allowed: true,
                lock_level: level,
                commit_type,
                reason: format!("Soft lock: integration debt is high (commit type '{}')", shown),
                suggestions: vec![
                    "Plan the pending integration soon".to_string(),
                    "Avoid starting new features until the component is integrated".to_string(),
                ],
            },
            LockLevel::Hard if Self::is_allowed_under_hard_lock(commit_type.as_deref()) => {
                LockDecision {
                    allowed: true,
                    lock_level: level,
                    commit_type,
                    reason: format!("Hard lock active, '{}' commits are still accepted", shown),
                    suggestions: Vec::new(),
                }
            }
            LockLevel::Hard => LockDecision {
                allowed: false,
                lock_level: level,
                commit_type,
                reason: format!("Hard lock: only fix/integration commits accepted, got '{}'", shown),
                suggestions: vec![
                    format!(
                        "Use one of the commit types: {}",
                        ALLOWED_UNDER_HARD_LOCK.join(", ")
                    ),
                    "Example: 'fix: resolve integration issue'".to_string(),
                ],
            },
            LockLevel::Total => LockDecision {
                allowed: false,
                lock_level: level,
                commit_type,
                reason: "Total lock: no commits until the integration is completed".to_string(),
                suggestions: vec![
                    "Complete the pending integration".to_string(),
                    "Ask for an administrative restore if the lock is stale".to_string(),
                ],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_levels_from_bands() {
        let bands = SeverityBands::default();
        assert_eq!(LockLevel::from_debt(4.99, &bands), LockLevel::None);
        assert_eq!(LockLevel::from_debt(5.0, &bands), LockLevel::Soft);
        assert_eq!(LockLevel::from_debt(7.0, &bands), LockLevel::Hard);
        assert_eq!(LockLevel::from_debt(10.0, &bands), LockLevel::Total);
    }

    #[test]
    fn test_commit_type_parsing() {
        assert_eq!(CommitAnalyzer::commit_type("feat(ui): add panel"), Some("feat".into()));
        assert_eq!(CommitAnalyzer::commit_type("Fix!: urgent"), Some("fix".into()));
        assert_eq!(CommitAnalyzer::commit_type("hotfix for sensor"), Some("hotfix".into()));
        assert_eq!(
            CommitAnalyzer::commit_type("Merge branch 'main' into dev"),
            Some("merge".into())
        );
        assert_eq!(CommitAnalyzer::commit_type("update readme"), None);
    }

    #[test]
    fn test_fallback_needs_whole_word() {
        assert_eq!(CommitAnalyzer::commit_type("fixture data refresh"), None);
        assert_eq!(CommitAnalyzer::commit_type("cigarette counter"), None);
        assert_eq!(CommitAnalyzer::commit_type("fix/adc clamp"), Some("fix".into()));
        assert_eq!(CommitAnalyzer::commit_type("revert"), Some("revert".into()));

        let d = CommitAnalyzer::analyze("fixture: add data", LockLevel::Hard);
        assert_eq!(d.commit_type.as_deref(), Some("fixture"));
        assert!(!d.allowed);
        assert!(!CommitAnalyzer::analyze("fixtures for rig", LockLevel::Hard).allowed);
    }

    #[test]
    fn test_hard_lock_filters_commit_types() {
        let ok = CommitAnalyzer::analyze("fix(adc): clamp reading", LockLevel::Hard);
        assert!(ok.allowed);
        let blocked = CommitAnalyzer::analyze("feat: new dashboard", LockLevel::Hard);
        assert!(!blocked.allowed);
        assert_eq!(blocked.commit_type.as_deref(), Some("feat"));
        assert!(!blocked.suggestions.is_empty());
    }

    #[test]
    fn test_total_lock_blocks_everything() {
        assert!(!CommitAnalyzer::analyze("fix: anything", LockLevel::Total).allowed);
    }

    #[test]
    fn test_soft_lock_allows_with_suggestions() {
        let d = CommitAnalyzer::analyze("feat: more", LockLevel::Soft);
        assert!(d.allowed);
        assert_eq!(d.suggestions.len(), 2);
        assert!(CommitAnalyzer::analyze("feat: more", LockLevel::None).suggestions.is_empty());
    }
}
