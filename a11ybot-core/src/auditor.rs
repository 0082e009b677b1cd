//! Audit orchestration.
//!
//! The [`Auditor`] ties the browser session to the analysis steps: it leases
//! one page per audit, navigates under a timeout, runs the rule engine, the
//! heuristics and the focus-trap simulation in that order, and scores the
//! result. Report export leases its own page.

use crate::audit::{
    impact_counts, score, FocusTrapSimulator, HeuristicSuggestionEngine, RuleEngine,
};
use crate::browser::{BrowserSession, PdfOptions};
use crate::config::AuditConfig;
use crate::error::{AuditError, AuditStep, BrowserError, Result};
use crate::report::{ReportDocument, ReportRenderer};
use crate::types::{AuditResult, AuditSummary};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Resolves once web fonts are loaded, so the PDF is laid out with them.
const SETTLE_SCRIPT: &str = "document.fonts ? document.fonts.ready.then(() => true) : true";

/// Parse `raw` and accept only http(s) URLs.
pub fn validate_url(raw: &str) -> Result<Url> {
    let invalid = |reason: String| AuditError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".into()));
    }
    Ok(url)
}

/// Runs audits and exports their reports.
pub struct Auditor {
    session: Arc<BrowserSession>,
    rule_engine: Arc<dyn RuleEngine>,
    heuristics: HeuristicSuggestionEngine,
    focus_trap: FocusTrapSimulator,
    renderer: ReportRenderer,
    navigation_timeout_ms: u64,
}

impl Auditor {
    pub fn new(
        session: Arc<BrowserSession>,
        rule_engine: Arc<dyn RuleEngine>,
        config: &AuditConfig,
    ) -> Self {
        Self {
            session,
            rule_engine,
            heuristics: HeuristicSuggestionEngine::new(),
            focus_trap: FocusTrapSimulator::from_config(config),
            renderer: ReportRenderer::new(),
            navigation_timeout_ms: config.navigation_timeout_ms,
        }
    }

    pub fn session(&self) -> &Arc<BrowserSession> {
        &self.session
    }

    /// Audit one page.
    ///
    /// Fails with `InvalidUrl` before any browser work when the URL is not
    /// http(s). The leased page is closed once, after all steps, whichever
    /// step failed.
    pub async fn run_audit(&self, url: &str) -> Result<AuditResult> {
        let url = validate_url(url)?;
        info!(url = %url, "Starting audit");

        let target = url.clone();
        let timeout_ms = self.navigation_timeout_ms;
        let (violations, suggestions, focus_trap) = self
            .session
            .with_page(|page| async move {
                match tokio::time::timeout(
                    Duration::from_millis(timeout_ms),
                    page.goto(target.as_str()),
                )
                .await
                {
                    Ok(navigated) => navigated?,
                    Err(_) => return Err(BrowserError::NavigationTimeout { timeout_ms }.into()),
                }
                debug!(url = %target, "Page loaded");

                let violations = self
                    .rule_engine
                    .analyze(&*page)
                    .await
                    .map_err(AuditError::at_step(AuditStep::RuleEngine))?;
                debug!(count = violations.len(), "Rule engine finished");

                let suggestions = self
                    .heuristics
                    .collect(&*page)
                    .await
                    .map_err(AuditError::at_step(AuditStep::Heuristics))?;
                debug!(count = suggestions.len(), "Heuristics finished");

                let focus_trap = self
                    .focus_trap
                    .simulate(&*page)
                    .await
                    .map_err(AuditError::at_step(AuditStep::FocusTrap))?;
                debug!(issues = focus_trap.len(), "Focus trap simulation finished");

                Ok::<_, AuditError>((violations, suggestions, focus_trap))
            })
            .await
            .inspect_err(|e| warn!(url = %url, kind = %e.kind(), error = %e, "Audit failed"))?;

        let result = AuditResult {
            url: url.to_string(),
            score: score(&violations),
            impact_counts: impact_counts(&violations),
            violations,
            suggestions,
            focus_trap,
            audited_at: Utc::now(),
        };
        info!(
            url = %result.url,
            score = result.score,
            violations = result.violations.len(),
            "Audit complete"
        );
        Ok(result)
    }

    /// Build the report document for a result.
    pub fn render_report(&self, result: &AuditResult) -> ReportDocument {
        self.renderer.render(result)
    }

    /// Print `document` to an A4 PDF at `output_path`.
    ///
    /// Parent directories are created. The bytes land in a sibling
    /// `.partial` file first and are renamed into place, so a failed export
    /// never leaves a truncated file at `output_path`.
    pub async fn render_artifact(&self, document: &ReportDocument, output_path: &Path) -> Result<()> {
        if output_path.as_os_str().is_empty() {
            return Err(AuditError::MissingOutputPath);
        }
        info!(path = %output_path.display(), "Rendering report");

        let bytes = self
            .session
            .with_page(|page| async move {
                page.set_content(document.as_str())
                    .await
                    .map_err(render_error)?;
                page.evaluate(SETTLE_SCRIPT).await.map_err(render_error)?;
                page.pdf(&PdfOptions::a4()).await.map_err(render_error)
            })
            .await?;

        write_artifact(output_path, &bytes).await?;
        info!(path = %output_path.display(), bytes = bytes.len(), "Report written");
        Ok(())
    }

    /// Audit `url`, export its report to `output_path`, and return the
    /// figures a caller would persist.
    ///
    /// Both inputs are checked before the browser is touched.
    pub async fn audit_and_render(&self, url: &str, output_path: &Path) -> Result<AuditSummary> {
        validate_url(url)?;
        if output_path.as_os_str().is_empty() {
            return Err(AuditError::MissingOutputPath);
        }
        let result = self.run_audit(url).await?;
        let document = self.render_report(&result);
        self.render_artifact(&document, output_path).await?;
        Ok(summarize(&result, output_path.to_path_buf()))
    }
}

/// Figures from a result plus where its report went.
pub fn summarize(result: &AuditResult, report_path: PathBuf) -> AuditSummary {
    let counts = &result.impact_counts;
    AuditSummary {
        score: result.score,
        critical: counts.critical,
        serious: counts.serious,
        moderate: counts.moderate,
        minor: counts.minor,
        report_path,
    }
}

fn render_error(err: BrowserError) -> AuditError {
    AuditError::Render {
        message: err.to_string(),
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

async fn write_artifact(path: &Path, bytes: &[u8]) -> Result<()> {
    let failed = |stage: &str, e: std::io::Error| AuditError::Render {
        message: format!("cannot {stage} {}: {e}", path.display()),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| failed("create directory for", e))?;
    }

    let partial = partial_path(path);
    let written = match tokio::fs::write(&partial, bytes).await {
        Ok(()) => tokio::fs::rename(&partial, path)
            .await
            .map_err(|e| failed("finalize", e)),
        Err(e) => Err(failed("write", e)),
    };
    if written.is_err() {
        if let Err(e) = tokio::fs::remove_file(&partial).await {
            debug!(path = %partial.display(), error = %e, "No partial file to remove");
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::StaticRuleEngine;
    use crate::browser::{MockBrowser, MockLauncher, MockPage};
    use crate::error::ErrorKind;

    fn auditor_with(page: Arc<MockPage>) -> (Auditor, Arc<MockBrowser>) {
        let browser = Arc::new(MockBrowser::new());
        browser.push_page(page);
        let session = Arc::new(BrowserSession::new(Arc::new(MockLauncher::new(
            browser.clone(),
        ))));
        let auditor = Auditor::new(
            session,
            Arc::new(StaticRuleEngine::new(vec![])),
            &AuditConfig::default(),
        );
        (auditor, browser)
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/path?q=1").is_ok());
        assert!(validate_url("  http://localhost:3000  ").is_ok());

        for bad in ["example.com", "ftp://example.com", "javascript:alert(1)", "", "file:///etc/passwd"] {
            let err = validate_url(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidUrl, "{bad}");
        }
    }

    #[test]
    fn test_partial_path_is_sibling() {
        assert_eq!(
            partial_path(Path::new("/tmp/reports/site/report.pdf")),
            PathBuf::from("/tmp/reports/site/report.pdf.partial")
        );
        assert_eq!(partial_path(Path::new("out.pdf")), PathBuf::from("out.pdf.partial"));
    }

    #[tokio::test]
    async fn test_render_artifact_requires_path() {
        let (auditor, browser) = auditor_with(Arc::new(MockPage::new()));
        let err = auditor
            .render_artifact(&ReportRenderer::new().render(&sample_result()), Path::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::MissingOutputPath));
        assert!(browser.opened_pages().is_empty());
    }

    #[tokio::test]
    async fn test_audit_and_render_checks_inputs_before_launch() {
        let browser = Arc::new(MockBrowser::new());
        let launcher = Arc::new(MockLauncher::new(browser.clone()));
        let session = Arc::new(BrowserSession::new(launcher.clone()));
        let auditor = Auditor::new(
            session,
            Arc::new(StaticRuleEngine::new(vec![])),
            &AuditConfig::default(),
        );

        let err = auditor
            .audit_and_render("https://example.com", Path::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::MissingOutputPath));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = auditor
            .audit_and_render("ftp://example.com", Path::new("report.pdf"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);

        assert_eq!(launcher.launch_count(), 0);
        assert!(browser.opened_pages().is_empty());
    }

    #[tokio::test]
    async fn test_render_artifact_loads_document_and_prints_a4() {
        let page = Arc::new(MockPage::new());
        let (auditor, _browser) = auditor_with(page.clone());
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("report.pdf");

        let doc = auditor.render_report(&sample_result());
        auditor.render_artifact(&doc, &out).await.unwrap();

        assert!(std::fs::read(&out).unwrap().starts_with(b"%PDF"));
        assert!(!partial_path(&out).exists());
        assert_eq!(*page.content.lock().unwrap(), doc.as_str());
        let methods: Vec<String> = page.calls().into_iter().map(|(m, _)| m).collect();
        assert_eq!(methods, vec!["set_content", "evaluate", "pdf", "close"]);
    }

    #[tokio::test]
    async fn test_write_artifact_failure_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        // A directory already sits at the target path, so the rename fails.
        let out = dir.path().join("report.pdf");
        std::fs::create_dir(&out).unwrap();

        let err = write_artifact(&out, b"%PDF-1.7").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RenderFailure);
        assert!(!partial_path(&out).exists());
    }

    fn sample_result() -> AuditResult {
        AuditResult {
            url: "https://example.com/".into(),
            score: 100,
            impact_counts: Default::default(),
            violations: vec![],
            suggestions: Default::default(),
            focus_trap: vec![],
            audited_at: Utc::now(),
        }
    }
}
