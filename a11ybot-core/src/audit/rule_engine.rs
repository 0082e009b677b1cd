//! Adapter over the external structured rule engine (axe-core).
//!
//! The engine is consumed as an opaque capability: its source is injected
//! into the page, one scan is run, and the native result is normalized into
//! [`Violation`]s.

use crate::browser::Page;
use crate::error::{BrowserError, ConfigError};
use crate::types::{Impact, Violation, ViolationNode};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Separator between frame / shadow-root levels of a nested selector path.
pub const NESTED_SELECTOR_SEPARATOR: &str = " >>> ";

const ENGINE_PRESENT_SCRIPT: &str = "typeof window.axe !== 'undefined'";

/// Runs the scan and resolves to the violations array only.
pub const RUN_SCAN_SCRIPT: &str =
    "axe.run(document, { resultTypes: ['violations'] }).then((results) => results.violations)";

/// A structured rule-based scan over a loaded page.
#[async_trait]
pub trait RuleEngine: Send + Sync {
    /// Scan the page once and return normalized violations.
    async fn analyze(&self, page: &dyn Page) -> Result<Vec<Violation>, BrowserError>;
}

/// axe-core injected from its script source.
pub struct AxeRuleEngine {
    source: Arc<str>,
}

impl AxeRuleEngine {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: Arc::from(source.into()),
        }
    }

    /// Load the engine source from disk.
    pub async fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match tokio::fs::read_to_string(path).await {
            Ok(source) => Ok(Self::new(source)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(ConfigError::Invalid {
                message: format!("cannot read rule engine script {}: {}", path.display(), e),
            }),
        }
    }
}

#[async_trait]
impl RuleEngine for AxeRuleEngine {
    async fn analyze(&self, page: &dyn Page) -> Result<Vec<Violation>, BrowserError> {
        let present = page.evaluate(ENGINE_PRESENT_SCRIPT).await?;
        if !present.as_bool().unwrap_or(false) {
            debug!(bytes = self.source.len(), "Injecting rule engine");
            page.evaluate(&self.source).await?;
        }

        let raw = page.evaluate(RUN_SCAN_SCRIPT).await?;
        let native: Vec<NativeViolation> =
            serde_json::from_value(raw).map_err(|e| BrowserError::JsEvalFailed {
                message: format!("unexpected rule engine payload: {}", e),
            })?;
        debug!(violations = native.len(), "Rule engine scan finished");
        Ok(native.into_iter().map(normalize).collect())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NativeViolation {
    #[serde(default)]
    id: String,
    #[serde(default)]
    impact: Option<String>,
    #[serde(default)]
    help: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    help_url: Option<String>,
    #[serde(default)]
    nodes: Vec<NativeNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NativeNode {
    #[serde(default)]
    target: Vec<NativeTarget>,
    #[serde(default)]
    failure_summary: Option<String>,
}

/// A target is a plain selector, or a path through iframes / shadow roots.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NativeTarget {
    Selector(String),
    Nested(Vec<String>),
}

impl NativeTarget {
    fn flatten(self) -> String {
        match self {
            NativeTarget::Selector(s) => s,
            NativeTarget::Nested(path) => path.join(NESTED_SELECTOR_SEPARATOR),
        }
    }
}

fn normalize(v: NativeViolation) -> Violation {
    Violation {
        id: v.id,
        impact: Impact::from_engine(v.impact.as_deref()),
        help: v.help.unwrap_or_default(),
        description: v.description.unwrap_or_default(),
        help_url: v.help_url.unwrap_or_default(),
        nodes: v
            .nodes
            .into_iter()
            .map(|n| ViolationNode {
                selectors: n.target.into_iter().map(NativeTarget::flatten).collect(),
                failure_summary: n.failure_summary.filter(|s| !s.trim().is_empty()),
            })
            .collect(),
    }
}

/// A rule engine returning canned results, for tests.
pub struct StaticRuleEngine {
    result: Result<Vec<Violation>, BrowserError>,
    calls: AtomicUsize,
}

impl StaticRuleEngine {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self {
            result: Ok(violations),
            calls: AtomicUsize::new(0),
        }
    }

    /// An engine whose every scan fails with `err`.
    pub fn failing(err: BrowserError) -> Self {
        Self {
            result: Err(err),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RuleEngine for StaticRuleEngine {
    async fn analyze(&self, _page: &dyn Page) -> Result<Vec<Violation>, BrowserError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}
