//! End-to-end audit and render flows over the mock browser.

use std::sync::Arc;
use std::time::Duration;

use a11ybot_core::audit::heuristics::COLLECT_SIGNALS_SCRIPT;
use a11ybot_core::browser::{BrowserSession, MockBrowser, MockLauncher, MockPage};
use a11ybot_core::config::AuditConfig;
use a11ybot_core::error::{AuditError, AuditStep, BrowserError, ErrorKind};
use a11ybot_core::types::{FocusTrapIssueKind, Impact, Violation};
use a11ybot_core::{Auditor, RuleEngine, StaticRuleEngine};
use pretty_assertions::assert_eq;
use serde_json::json;

struct Harness {
    auditor: Auditor,
    browser: Arc<MockBrowser>,
    launcher: Arc<MockLauncher>,
}

fn harness(rule_engine: Arc<dyn RuleEngine>, config: AuditConfig) -> Harness {
    let browser = Arc::new(MockBrowser::new());
    let launcher = Arc::new(MockLauncher::new(browser.clone()));
    let session = Arc::new(BrowserSession::new(launcher.clone()));
    Harness {
        auditor: Auditor::new(session, rule_engine, &config),
        browser,
        launcher,
    }
}

fn three_violations() -> Vec<Violation> {
    vec![
        Violation::new(Impact::Critical, "Buttons must have discernible text"),
        Violation::new(Impact::Serious, "Images must have alternate text"),
        Violation::new(Impact::Minor, "Lists must be structured correctly"),
    ]
}

fn page_with_signals() -> Arc<MockPage> {
    let page = Arc::new(MockPage::new());
    page.add_js_result(
        COLLECT_SIGNALS_SCRIPT,
        json!({
            "images": [{"alt": "img1", "src": "/hero.png"}],
            "roles": [{"role": "dialog", "tag": "div"}],
            "colors": [{"color": "rgb(153, 153, 153)", "background": "rgb(255, 255, 255)", "tag": "p"}]
        }),
    );
    page
}

#[tokio::test]
async fn audit_combines_all_steps_on_one_page() {
    let h = harness(
        Arc::new(StaticRuleEngine::new(three_violations())),
        AuditConfig::default(),
    );
    let page = page_with_signals();
    h.browser.push_page(page.clone());

    let result = h.auditor.run_audit("https://example.com/signup").await.unwrap();

    assert_eq!(result.url, "https://example.com/signup");
    assert_eq!(result.score, 91);
    assert_eq!(result.impact_counts.critical, 1);
    assert_eq!(result.impact_counts.serious, 1);
    assert_eq!(result.impact_counts.minor, 1);
    assert_eq!(result.impact_counts.total(), result.violations.len());
    assert_eq!(result.suggestions.alt_text.len(), 1);
    assert!(result.suggestions.aria.is_empty());
    assert_eq!(result.suggestions.contrast.len(), 1);
    // No modal on the mock page.
    assert_eq!(result.focus_trap.len(), 1);
    assert_eq!(result.focus_trap[0].kind, FocusTrapIssueKind::NotFound);

    assert_eq!(h.browser.opened_pages().len(), 1);
    assert!(page.is_closed());
    assert_eq!(page.call_count("close"), 1);
    assert_eq!(page.call_count("key_down"), 0);
    assert_eq!(*page.current_url.lock().unwrap(), "https://example.com/signup");
}

#[tokio::test]
async fn invalid_url_fails_before_launch() {
    let h = harness(Arc::new(StaticRuleEngine::new(vec![])), AuditConfig::default());

    for url in ["not a url", "ftp://example.com/file", "mailto:someone@example.com"] {
        let err = h.auditor.run_audit(url).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);
    }
    assert_eq!(h.launcher.launch_count(), 0);
    assert!(!h.auditor.session().is_launched().await);
}

#[tokio::test]
async fn navigation_timeout_closes_page() {
    let config = AuditConfig {
        navigation_timeout_ms: 50,
        ..AuditConfig::default()
    };
    let engine = Arc::new(StaticRuleEngine::new(vec![]));
    let h = harness(engine.clone(), config);
    let page = Arc::new(MockPage::new());
    page.set_goto_delay(Duration::from_secs(5));
    h.browser.push_page(page.clone());

    let err = h.auditor.run_audit("https://slow.example.com").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NavigationTimeout);
    assert!(matches!(
        err,
        AuditError::Browser(BrowserError::NavigationTimeout { timeout_ms: 50 })
    ));
    assert_eq!(engine.call_count(), 0);
    assert!(page.is_closed());
}

#[tokio::test]
async fn navigation_failure_is_browser_failure() {
    let h = harness(Arc::new(StaticRuleEngine::new(vec![])), AuditConfig::default());
    let page = Arc::new(MockPage::new());
    page.set_goto_error(BrowserError::NavigationFailed {
        message: "net::ERR_NAME_NOT_RESOLVED".into(),
    });
    h.browser.push_page(page.clone());

    let err = h.auditor.run_audit("https://nope.invalid").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BrowserFailure);
    assert!(page.is_closed());
}

#[tokio::test]
async fn heuristics_script_failure_is_atomic_evaluation_failure() {
    let h = harness(
        Arc::new(StaticRuleEngine::new(three_violations())),
        AuditConfig::default(),
    );
    let page = page_with_signals();
    page.set_evaluate_error(BrowserError::JsEvalFailed {
        message: "TypeError: cannot read properties of null".into(),
    });
    h.browser.push_page(page.clone());

    let err = h.auditor.run_audit("https://example.com").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EvaluationFailure);
    assert!(matches!(
        err,
        AuditError::Evaluation {
            step: AuditStep::Heuristics,
            ..
        }
    ));
    // The focus trap step never ran.
    assert_eq!(page.call_count("query_selector"), 0);
    assert!(page.is_closed());
}

#[tokio::test]
async fn rule_engine_failure_is_attributed() {
    let h = harness(
        Arc::new(StaticRuleEngine::failing(BrowserError::JsEvalFailed {
            message: "axe is not defined".into(),
        })),
        AuditConfig::default(),
    );
    let page = Arc::new(MockPage::new());
    h.browser.push_page(page.clone());

    let err = h.auditor.run_audit("https://example.com").await.unwrap_err();
    assert!(matches!(
        err,
        AuditError::Evaluation {
            step: AuditStep::RuleEngine,
            ..
        }
    ));
    assert!(page.is_closed());
}

#[tokio::test]
async fn launch_failure_is_reported_and_retried() {
    let h = harness(Arc::new(StaticRuleEngine::new(vec![])), AuditConfig::default());
    h.launcher.fail_next(1);

    let err = h.auditor.run_audit("https://example.com").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LaunchFailure);

    let page = page_with_signals();
    h.browser.push_page(page);
    assert!(h.auditor.run_audit("https://example.com").await.is_ok());
    assert_eq!(h.launcher.launch_count(), 2);
}

#[tokio::test]
async fn concurrent_audits_share_one_browser() {
    let h = harness(Arc::new(StaticRuleEngine::new(vec![])), AuditConfig::default());
    let (first, second) = (page_with_signals(), page_with_signals());
    h.browser.push_page(first.clone());
    h.browser.push_page(second.clone());

    let (a, b) = tokio::join!(
        h.auditor.run_audit("https://example.com/a"),
        h.auditor.run_audit("https://example.com/b"),
    );
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(h.launcher.launch_count(), 1);
    assert!(first.is_closed());
    assert!(second.is_closed());
}

#[tokio::test]
async fn audit_and_render_uses_separate_page_and_writes_report() {
    let h = harness(
        Arc::new(StaticRuleEngine::new(three_violations())),
        AuditConfig::default(),
    );
    let audit_page = page_with_signals();
    let render_page = Arc::new(MockPage::new());
    h.browser.push_page(audit_page.clone());
    h.browser.push_page(render_page.clone());

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("example.com").join("report.pdf");
    let summary = h
        .auditor
        .audit_and_render("https://example.com", &out)
        .await
        .unwrap();

    assert_eq!(summary.score, 91);
    assert_eq!(
        (summary.critical, summary.serious, summary.moderate, summary.minor),
        (1, 1, 0, 1)
    );
    assert_eq!(summary.report_path, out);
    assert!(std::fs::read(&out).unwrap().starts_with(b"%PDF"));

    assert_eq!(h.browser.opened_pages().len(), 2);
    assert!(audit_page.is_closed());
    assert!(render_page.is_closed());
    assert_eq!(audit_page.call_count("pdf"), 0);
    assert_eq!(render_page.call_count("goto"), 0);
    let html = render_page.content.lock().unwrap().clone();
    assert!(html.contains("Buttons must have discernible text"));
    assert!(html.contains("<li><b>Score:</b> 91/100</li>"));
}

#[tokio::test]
async fn render_failure_leaves_no_artifact() {
    let h = harness(Arc::new(StaticRuleEngine::new(vec![])), AuditConfig::default());
    let audit_page = page_with_signals();
    let render_page = Arc::new(MockPage::new());
    render_page.set_pdf_error(BrowserError::PdfFailed {
        message: "Printing failed".into(),
    });
    h.browser.push_page(audit_page);
    h.browser.push_page(render_page.clone());

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("report.pdf");
    let err = h
        .auditor
        .audit_and_render("https://example.com", &out)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RenderFailure);
    assert!(!out.exists());
    assert!(!dir.path().join("report.pdf.partial").exists());
    assert!(render_page.is_closed());
}

#[tokio::test]
async fn shutdown_closes_browser_and_blocks_new_audits() {
    let h = harness(Arc::new(StaticRuleEngine::new(vec![])), AuditConfig::default());
    h.browser.push_page(page_with_signals());
    h.auditor.run_audit("https://example.com").await.unwrap();

    h.auditor.session().shutdown().await.unwrap();
    assert!(h.browser.is_closed());

    let err = h.auditor.run_audit("https://example.com").await.unwrap_err();
    assert!(matches!(err, AuditError::Browser(BrowserError::SessionClosed)));
}
