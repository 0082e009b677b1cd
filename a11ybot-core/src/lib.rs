//! # a11ybot Core
//!
//! Core library for the a11ybot accessibility auditor.
//! Provides the browser session, the analysis steps (rule engine, heuristic
//! suggestions, focus-trap simulation), scoring, report rendering,
//! configuration, and fundamental types.

pub mod audit;
pub mod auditor;
pub mod browser;
pub mod config;
pub mod error;
pub mod report;
pub mod types;

// Re-export commonly used types at the crate root.
pub use audit::{
    AxeRuleEngine, FocusTrapSimulator, HeuristicSuggestionEngine, RuleEngine, StaticRuleEngine,
};
pub use auditor::{summarize, validate_url, Auditor};
pub use browser::{install_shutdown_hook, BrowserLauncher, BrowserSession, Page};
pub use config::{load_config, A11yConfig};
pub use error::{AuditError, BrowserError, ConfigError, ErrorKind, Result};
pub use report::{escape_html, ReportDocument, ReportRenderer};
pub use types::{
    AuditResult, AuditSummary, ContrastFinding, FocusTrapIssue, FocusTrapIssueKind, Impact,
    ImpactCounts, SuggestionList, Violation, ViolationNode,
};
