//! Keyboard focus containment check for modal dialogs.
//!
//! The simulator locates a modal, validates its ARIA metadata, enumerates the
//! keyboard-navigable elements inside it, and drives Tab / Shift+Tab to verify
//! that focus stays inside and wraps between the first and last element.
//!
//! Findings are data: every run that completes returns at least one
//! [`FocusTrapIssue`], with a single `Pass` when nothing was wrong. Errors are
//! reserved for real execution failures such as a script throwing.
//!
//! Element handles acquired along the way are released before `simulate`
//! returns, on success and on error. If the future is dropped mid-run the
//! handles die with the page when its lease closes it.

use crate::browser::{ElementHandle, Key, Page};
use crate::config::{AuditConfig, MAX_TAB_STEPS_CEILING};
use crate::error::BrowserError;
use crate::types::{FocusTrapIssue, FocusTrapIssueKind, ModalMeta};
use serde_json::Value;
use tracing::{debug, warn};

/// Elements that can take sequential keyboard focus.
pub const FOCUSABLE_SELECTOR: &str = concat!(
    "a[href],",
    "area[href],",
    r#"input:not([disabled]):not([type="hidden"]),"#,
    "select:not([disabled]),",
    "textarea:not([disabled]),",
    "button:not([disabled]),",
    "details,",
    "summary,",
    r#"[contenteditable="true"],"#,
    r#"[tabindex]:not([tabindex^="-"])"#
);

macro_rules! navigable_predicate {
    () => {
        r#"(el) => {
  const style = window.getComputedStyle(el);
  const rect = el.getBoundingClientRect();
  return !(
    style.display === 'none' ||
    style.visibility === 'hidden' ||
    rect.width === 0 ||
    rect.height === 0 ||
    el.hasAttribute('disabled') ||
    el.closest('[aria-hidden="true"]') !== null ||
    el.closest('[inert]') !== null
  );
}"#
    };
}

/// Whether the bound element is actually reachable by keyboard.
pub const IS_NAVIGABLE_FN: &str =
    concat!("function() { return (", navigable_predicate!(), ")(this); }");

/// Reads role, raw `aria-modal`, and whether an accessible name exists.
pub const MODAL_META_FN: &str = r#"function() {
  const role = this.getAttribute('role') || '';
  const ariaModal = this.getAttribute('aria-modal');
  const label = this.getAttribute('aria-label');
  const labelledBy = this.getAttribute('aria-labelledby');
  const labelled = labelledBy ? document.getElementById(labelledBy) : null;
  const name = (label && label.trim()) || (labelled && labelled.textContent.trim()) || '';
  return { role, ariaModal, hasAccessibleName: name.length > 0 };
}"#;

const VALID_MODAL_ROLES: [&str; 2] = ["dialog", "alertdialog"];

#[derive(Debug, Clone, Copy)]
enum Edge {
    First,
    Last,
}

/// Page-level probes, parameterized by the modal selector.
#[derive(Debug, Clone)]
struct Probes {
    focus_inside: String,
    background_inert: String,
    active_is_first: String,
    active_is_last: String,
}

impl Probes {
    fn new(modal_selector: &str) -> Self {
        let sel = selector_literal(modal_selector);
        Self {
            focus_inside: format!(
                "(() => {{ const modal = document.querySelector({sel}); \
                 return !!(modal && document.activeElement && modal.contains(document.activeElement)); }})()"
            ),
            background_inert: format!(
                "(() => {{ const modal = document.querySelector({sel}); if (!modal) return false; \
                 const root = document.body || document.documentElement; \
                 return Array.from(root.children) \
                 .filter((n) => n !== modal && !modal.contains(n)) \
                 .some((n) => n.hasAttribute('inert') || n.getAttribute('aria-hidden') === 'true'); }})()"
            ),
            active_is_first: active_is_edge(&sel, Edge::First),
            active_is_last: active_is_edge(&sel, Edge::Last),
        }
    }
}

/// Re-queries the navigable elements and compares one end to the active element.
fn active_is_edge(sel: &str, edge: Edge) -> String {
    let pick = match edge {
        Edge::First => "list[0]",
        Edge::Last => "list[list.length - 1]",
    };
    format!(
        "(() => {{ const modal = document.querySelector({sel}); if (!modal) return false; \
         const isNavigable = {pred}; \
         const list = Array.from(modal.querySelectorAll({focusable})).filter(isNavigable); \
         return list.length > 0 && document.activeElement === {pick}; }})()",
        pred = navigable_predicate!(),
        focusable = selector_literal(FOCUSABLE_SELECTOR),
    )
}

fn selector_literal(selector: &str) -> String {
    serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string())
}

fn expect_bool(value: Value, probe: &str) -> Result<bool, BrowserError> {
    value.as_bool().ok_or_else(|| BrowserError::JsEvalFailed {
        message: format!("{probe} returned {value} instead of a boolean"),
    })
}

/// Simulates keyboard navigation inside a modal dialog.
#[derive(Debug, Clone)]
pub struct FocusTrapSimulator {
    modal_selector: String,
    max_tab_steps: usize,
    probes: Probes,
}

impl FocusTrapSimulator {
    /// `max_tab_steps` is clamped to `1..=50`.
    pub fn new(modal_selector: impl Into<String>, max_tab_steps: usize) -> Self {
        let modal_selector = modal_selector.into();
        let probes = Probes::new(&modal_selector);
        Self {
            modal_selector,
            max_tab_steps: max_tab_steps.clamp(1, MAX_TAB_STEPS_CEILING),
            probes,
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(config.modal_selector.clone(), config.max_tab_steps)
    }

    pub fn modal_selector(&self) -> &str {
        &self.modal_selector
    }

    /// Number of Tab presses for the forward walk over `focusable_count` elements.
    pub fn tab_steps(&self, focusable_count: usize) -> usize {
        (focusable_count + 3).min(self.max_tab_steps)
    }

    /// Run the full check against the page's current document.
    pub async fn simulate(&self, page: &dyn Page) -> Result<Vec<FocusTrapIssue>, BrowserError> {
        let Some(modal) = page.query_selector(&self.modal_selector).await? else {
            debug!(selector = %self.modal_selector, "No modal found");
            return Ok(vec![FocusTrapIssue::new(
                FocusTrapIssueKind::NotFound,
                format!(
                    "No modal dialog found (role=\"dialog\" or \"alertdialog\", selector {}).",
                    self.modal_selector
                ),
            )]);
        };

        let mut focusables = Vec::new();
        let outcome = self.check_modal(page, &modal, &mut focusables).await;

        release_all(page, focusables).await;
        release_all(page, vec![modal]).await;

        outcome
    }

    async fn check_modal(
        &self,
        page: &dyn Page,
        modal: &ElementHandle,
        focusables: &mut Vec<ElementHandle>,
    ) -> Result<Vec<FocusTrapIssue>, BrowserError> {
        let mut issues = Vec::new();

        let meta = page.call_on(modal, MODAL_META_FN).await?;
        let meta: ModalMeta =
            serde_json::from_value(meta).map_err(|e| BrowserError::JsEvalFailed {
                message: format!("unexpected modal metadata: {e}"),
            })?;
        issues.extend(meta_problems(&meta));

        self.enumerate_focusables(page, modal, focusables).await?;
        debug!(count = focusables.len(), "Enumerated focusable elements");
        if focusables.is_empty() {
            issues.push(FocusTrapIssue::new(
                FocusTrapIssueKind::EmptyModal,
                "The modal contains no focusable elements.",
            ));
            return Ok(issues);
        }

        if !self.probe(page, &self.probes.background_inert).await? {
            issues.push(FocusTrapIssue::new(
                FocusTrapIssueKind::BackgroundNotInert,
                "Content outside the modal is still interactive; mark it with [inert] or aria-hidden=\"true\".",
            ));
        }

        let (first, last) = match (focusables.first(), focusables.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Ok(issues),
        };

        page.focus(first).await?;
        if !self.focus_inside(page).await? {
            issues.push(FocusTrapIssue::new(
                FocusTrapIssueKind::InitialFocusFailed,
                "Could not place initial focus inside the modal.",
            ));
        }

        let steps = self.tab_steps(focusables.len());
        let mut escaped = false;
        for step in 0..steps {
            page.press(Key::Tab).await?;
            if !self.focus_inside(page).await? {
                debug!(step = step + 1, "Focus escaped the modal");
                issues.push(FocusTrapIssue::new(
                    FocusTrapIssueKind::Escaped,
                    "Focus escaped the modal while moving with Tab.",
                ));
                escaped = true;
                break;
            }
        }

        // A wrap result after an escape says nothing about the trap.
        if !escaped {
            page.focus(last).await?;
            page.press(Key::Tab).await?;
            if !self.probe(page, &self.probes.active_is_first).await? {
                issues.push(FocusTrapIssue::new(
                    FocusTrapIssueKind::NoForwardWrap,
                    "Tab from the last element does not wrap to the first element of the modal.",
                ));
            }
        }

        page.focus(first).await?;
        page.key_down(Key::Shift).await?;
        let pressed = page.press(Key::Tab).await;
        page.key_up(Key::Shift).await?;
        pressed?;
        if !self.probe(page, &self.probes.active_is_last).await? {
            issues.push(FocusTrapIssue::new(
                FocusTrapIssueKind::NoBackwardWrap,
                "Shift+Tab from the first element does not wrap to the last element of the modal.",
            ));
        }

        if !self.focus_inside(page).await? {
            issues.push(FocusTrapIssue::new(
                FocusTrapIssueKind::FinalContainmentFailed,
                "Focus is not inside the modal after the navigation test.",
            ));
        }

        if issues.is_empty() {
            issues.push(FocusTrapIssue::new(
                FocusTrapIssueKind::Pass,
                "Focus trap works: Tab and Shift+Tab stay inside the modal and wrap between the first and last element.",
            ));
        }
        Ok(issues)
    }

    /// Fill `out` with the navigable elements inside the modal, in document order.
    async fn enumerate_focusables(
        &self,
        page: &dyn Page,
        modal: &ElementHandle,
        out: &mut Vec<ElementHandle>,
    ) -> Result<(), BrowserError> {
        out.extend(page.query_selector_all(modal, FOCUSABLE_SELECTOR).await?);

        let mut navigable = Vec::with_capacity(out.len());
        for handle in out.iter() {
            let value = page.call_on(handle, IS_NAVIGABLE_FN).await?;
            navigable.push(expect_bool(value, "visibility check")?);
        }

        let (keep, hidden): (Vec<_>, Vec<_>) = std::mem::take(out)
            .into_iter()
            .zip(navigable)
            .partition(|(_, ok)| *ok);
        *out = keep.into_iter().map(|(h, _)| h).collect();
        release_all(page, hidden.into_iter().map(|(h, _)| h).collect()).await;
        Ok(())
    }

    async fn focus_inside(&self, page: &dyn Page) -> Result<bool, BrowserError> {
        self.probe(page, &self.probes.focus_inside).await
    }

    async fn probe(&self, page: &dyn Page, script: &str) -> Result<bool, BrowserError> {
        expect_bool(page.evaluate(script).await?, "focus probe")
    }
}

fn meta_problems(meta: &ModalMeta) -> Vec<FocusTrapIssue> {
    let mut problems = Vec::new();
    if !VALID_MODAL_ROLES.contains(&meta.role.as_str()) {
        let found = if meta.role.is_empty() { "none" } else { &meta.role };
        problems.push(FocusTrapIssue::new(
            FocusTrapIssueKind::MetaProblem,
            format!("The modal element has an incorrect role (found: \"{found}\")."),
        ));
    }
    if meta.aria_modal.as_deref() != Some("true") {
        problems.push(FocusTrapIssue::new(
            FocusTrapIssueKind::MetaProblem,
            "Set aria-modal=\"true\" on the modal.",
        ));
    }
    if !meta.has_accessible_name {
        problems.push(FocusTrapIssue::new(
            FocusTrapIssueKind::MetaProblem,
            "The modal is missing an accessible name (aria-label or aria-labelledby).",
        ));
    }
    problems
}

async fn release_all(page: &dyn Page, handles: Vec<ElementHandle>) {
    for handle in handles {
        if let Err(e) = page.release(handle).await {
            warn!(error = %e, "Failed to release element handle");
        }
    }
}
