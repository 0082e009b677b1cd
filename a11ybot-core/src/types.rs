//! Fundamental types for audit results, rule-engine violations, heuristic
//! suggestions, and focus-trap findings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Severity classification of a rule-engine violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Critical,
    Serious,
    Moderate,
    Minor,
    Unknown,
}

impl Impact {
    /// All impacts, most severe first.
    pub const ALL: [Impact; 5] = [
        Impact::Critical,
        Impact::Serious,
        Impact::Moderate,
        Impact::Minor,
        Impact::Unknown,
    ];

    /// Parse the rule engine's impact string. Anything unrecognized is `Unknown`.
    pub fn from_engine(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("critical") => Impact::Critical,
            Some("serious") => Impact::Serious,
            Some("moderate") => Impact::Moderate,
            Some("minor") => Impact::Minor,
            _ => Impact::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Critical => "critical",
            Impact::Serious => "serious",
            Impact::Moderate => "moderate",
            Impact::Minor => "minor",
            Impact::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Impact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One element affected by a violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationNode {
    /// Selector path to the element, outermost frame first.
    pub selectors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_summary: Option<String>,
}

/// A rule-engine violation, normalized from the engine's native shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Rule identifier (e.g. `image-alt`).
    #[serde(default)]
    pub id: String,
    pub impact: Impact,
    pub help: String,
    pub description: String,
    pub help_url: String,
    #[serde(default)]
    pub nodes: Vec<ViolationNode>,
}

impl Violation {
    /// Convenience constructor used by tests and fakes.
    pub fn new(impact: Impact, help: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            impact,
            help: help.into(),
            description: String::new(),
            help_url: String::new(),
            nodes: Vec::new(),
        }
    }
}

/// Number of violations per impact. Every impact is present, zeros included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactCounts {
    pub critical: usize,
    pub serious: usize,
    pub moderate: usize,
    pub minor: usize,
    pub unknown: usize,
}

impl ImpactCounts {
    pub fn get(&self, impact: Impact) -> usize {
        match impact {
            Impact::Critical => self.critical,
            Impact::Serious => self.serious,
            Impact::Moderate => self.moderate,
            Impact::Minor => self.minor,
            Impact::Unknown => self.unknown,
        }
    }

    pub fn increment(&mut self, impact: Impact) {
        match impact {
            Impact::Critical => self.critical += 1,
            Impact::Serious => self.serious += 1,
            Impact::Moderate => self.moderate += 1,
            Impact::Minor => self.minor += 1,
            Impact::Unknown => self.unknown += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.serious + self.moderate + self.minor + self.unknown
    }
}

/// An element whose text/background pair falls below the contrast threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastFinding {
    pub ratio: f64,
    /// Resolved foreground color as reported by the page.
    pub fg: String,
    /// Resolved background color as reported by the page.
    pub bg: String,
    /// Lowercase tag name of the element.
    pub tag: String,
}

impl ContrastFinding {
    pub fn message(&self) -> String {
        format!(
            "Low contrast ({:.2}:1) between text {} and background {} on <{}>.",
            self.ratio, self.fg, self.bg, self.tag
        )
    }
}

/// Output of the heuristic suggestion engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionList {
    pub alt_text: Vec<String>,
    pub aria: Vec<String>,
    pub contrast: Vec<ContrastFinding>,
}

impl SuggestionList {
    pub fn is_empty(&self) -> bool {
        self.alt_text.is_empty() && self.aria.is_empty() && self.contrast.is_empty()
    }

    pub fn len(&self) -> usize {
        self.alt_text.len() + self.aria.len() + self.contrast.len()
    }
}

/// Metadata read once from the located modal element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalMeta {
    #[serde(default)]
    pub role: String,
    /// Raw `aria-modal` attribute value, if present.
    #[serde(default)]
    pub aria_modal: Option<String>,
    #[serde(default)]
    pub has_accessible_name: bool,
}

/// Classification of a focus-trap finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FocusTrapIssueKind {
    NotFound,
    MetaProblem,
    EmptyModal,
    InitialFocusFailed,
    Escaped,
    NoForwardWrap,
    NoBackwardWrap,
    BackgroundNotInert,
    FinalContainmentFailed,
    Pass,
}

impl FocusTrapIssueKind {
    /// Whether this kind represents a defect (everything but `Pass`).
    pub fn is_problem(&self) -> bool {
        !matches!(self, FocusTrapIssueKind::Pass)
    }
}

/// A single focus-trap outcome. A run always yields at least one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusTrapIssue {
    pub kind: FocusTrapIssueKind,
    pub message: String,
}

impl FocusTrapIssue {
    pub fn new(kind: FocusTrapIssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// The combined result of one audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    pub url: String,
    pub score: u8,
    pub impact_counts: ImpactCounts,
    pub violations: Vec<Violation>,
    pub suggestions: SuggestionList,
    pub focus_trap: Vec<FocusTrapIssue>,
    pub audited_at: DateTime<Utc>,
}

/// Metrics returned by a one-shot audit-and-render, ready for a caller to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub score: u8,
    pub critical: usize,
    pub serious: usize,
    pub moderate: usize,
    pub minor: usize,
    pub report_path: PathBuf,
}
