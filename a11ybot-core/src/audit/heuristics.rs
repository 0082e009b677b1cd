//! Heuristic suggestions: alt-text quality, ARIA role validity, and color
//! contrast.
//!
//! A single self-contained script gathers raw signals from the page in one
//! round trip; classification happens here. If the script throws or returns
//! something other than the expected shape, the whole step fails and no
//! partial suggestions are produced.

use crate::audit::contrast::{contrast_ratio, is_insufficient, parse_opaque_rgb};
use crate::browser::Page;
use crate::error::BrowserError;
use crate::types::{ContrastFinding, SuggestionList};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::debug;

/// Collects image alt/src, explicit roles, and resolved colors for every element.
pub const COLLECT_SIGNALS_SCRIPT: &str = r#"(() => {
  const images = Array.from(document.querySelectorAll('img')).map((img) => ({
    alt: img.getAttribute('alt'),
    src: img.getAttribute('src') || '',
  }));
  const roles = Array.from(document.querySelectorAll('[role]')).map((el) => ({
    role: el.getAttribute('role') || '',
    tag: el.tagName.toLowerCase(),
  }));
  const colors = [];
  for (const el of document.querySelectorAll('*')) {
    const style = window.getComputedStyle(el);
    colors.push({
      color: style.color,
      background: style.backgroundColor,
      tag: el.tagName.toLowerCase(),
    });
  }
  return { images, roles, colors };
})()"#;

static PLACEHOLDER_ALT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(image|img|photo|picture)[0-9]*$").expect("valid regex"));

/// Roles the heuristics accept without comment. Anything else, including
/// valid but less common roles such as `menu` or `tabpanel`, is reported
/// for review.
const RECOGNIZED_ROLES: &[&str] = &[
    "button", "navigation", "main", "dialog", "alert", "checkbox", "tab", "tooltip", "link",
    "list", "listitem", "grid", "gridcell", "row", "table", "banner", "contentinfo",
    "complementary",
];

/// An `<img>` as seen by the collection script.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageSignal {
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub src: String,
}

/// An element carrying an explicit `role` attribute.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleSignal {
    pub role: String,
    pub tag: String,
}

/// Resolved colors of one element.
#[derive(Debug, Clone, Deserialize)]
pub struct ColorSignal {
    pub color: String,
    pub background: String,
    pub tag: String,
}

/// Everything the collection script returns.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageSignals {
    pub images: Vec<ImageSignal>,
    pub roles: Vec<RoleSignal>,
    pub colors: Vec<ColorSignal>,
}

/// Runs the custom heuristics against a page.
#[derive(Debug, Clone, Default)]
pub struct HeuristicSuggestionEngine;

impl HeuristicSuggestionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Collect signals in one evaluation and classify them.
    pub async fn collect(&self, page: &dyn Page) -> Result<SuggestionList, BrowserError> {
        let raw = page.evaluate(COLLECT_SIGNALS_SCRIPT).await?;
        let signals: PageSignals =
            serde_json::from_value(raw).map_err(|e| BrowserError::JsEvalFailed {
                message: format!("unexpected heuristics payload: {}", e),
            })?;
        debug!(
            images = signals.images.len(),
            roles = signals.roles.len(),
            elements = signals.colors.len(),
            "Collected page signals"
        );
        Ok(self.analyze(&signals))
    }

    /// Classify collected signals.
    pub fn analyze(&self, signals: &PageSignals) -> SuggestionList {
        SuggestionList {
            alt_text: alt_text_suggestions(&signals.images),
            aria: aria_suggestions(&signals.roles),
            contrast: contrast_findings(&signals.colors),
        }
    }
}

/// Whether an alt value is missing, empty, or a generic placeholder.
///
/// Matching is on the raw attribute value, so `alt=" "` is left alone.
pub fn is_non_descriptive_alt(alt: Option<&str>) -> bool {
    match alt {
        None | Some("") => true,
        Some(text) => PLACEHOLDER_ALT.is_match(text),
    }
}

/// Whether a role is in the recognized allow-list. Exact match only.
pub fn is_recognized_role(role: &str) -> bool {
    RECOGNIZED_ROLES.contains(&role)
}

fn alt_text_suggestions(images: &[ImageSignal]) -> Vec<String> {
    images
        .iter()
        .enumerate()
        .filter(|(_, img)| is_non_descriptive_alt(img.alt.as_deref()))
        .map(|(i, img)| {
            format!(
                "Image #{}: alt text '{}' is not descriptive. Add meaningful alt text (source: '{}').",
                i + 1,
                img.alt.as_deref().unwrap_or(""),
                img.src
            )
        })
        .collect()
}

fn aria_suggestions(roles: &[RoleSignal]) -> Vec<String> {
    roles
        .iter()
        .filter(|r| !is_recognized_role(&r.role))
        .map(|r| {
            format!(
                "Non-standard ARIA role '{}' on <{}>; make sure it is correct and necessary.",
                r.role, r.tag
            )
        })
        .collect()
}

fn contrast_findings(colors: &[ColorSignal]) -> Vec<ContrastFinding> {
    colors
        .iter()
        .filter_map(|c| {
            let fg = parse_opaque_rgb(&c.color)?;
            let bg = parse_opaque_rgb(&c.background)?;
            let ratio = contrast_ratio(fg, bg);
            is_insufficient(ratio).then(|| ContrastFinding {
                ratio,
                fg: c.color.clone(),
                bg: c.background.clone(),
                tag: c.tag.clone(),
            })
        })
        .collect()
}
