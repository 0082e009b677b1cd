//! Analysis steps run against a loaded page, plus scoring.
//!
//! Each step borrows the page for its duration; the orchestrator runs them
//! strictly in order because they share focus state and query ordering.

pub mod contrast;
pub mod focus_trap;
pub mod heuristics;
pub mod rule_engine;
pub mod score;

pub use focus_trap::FocusTrapSimulator;
pub use heuristics::HeuristicSuggestionEngine;
pub use rule_engine::{AxeRuleEngine, RuleEngine, StaticRuleEngine};
pub use score::{impact_counts, score};
