//! Report assembly.
//!
//! Builds a self-contained HTML document from an [`AuditResult`]. Values in
//! the report can come straight from the audited page (selectors, alt text,
//! role names), so every interpolation goes through [`escape_html`].

use crate::types::{AuditResult, FocusTrapIssueKind, Impact, Violation};
use std::fmt::Write;

const STYLE: &str = r#"
  body { font-family: system-ui, -apple-system, "Segoe UI", Roboto, Arial, sans-serif; line-height: 1.5; color: #111; }
  h1, h2, h3 { margin: 0.6em 0 0.35em; }
  h1 { font-size: 22px; }
  h2 { font-size: 18px; margin-top: 1.1em; }
  h3 { font-size: 16px; }
  code { font-family: ui-monospace, SFMono-Regular, Menlo, Consolas, monospace; font-size: 12px; }
  .muted { color: #666; }
  .badge { display: inline-block; font-size: 12px; padding: 2px 6px; border-radius: 6px; margin-left: 8px; }
  .impact-critical { background: #fee2e2; color: #991b1b; }
  .impact-serious { background: #ffedd5; color: #9a3412; }
  .impact-moderate { background: #fef9c3; color: #854d0e; }
  .impact-minor { background: #dcfce7; color: #166534; }
  .impact-unknown { background: #e5e7eb; color: #374151; }
  .box { border: 1px solid #e5e7eb; border-radius: 8px; padding: 12px; margin: 10px 0; }
  .node { background: #fafafa; }
  .pass { color: #166534; }
  ul { margin: 0.3em 0 0.6em 1.2em; }
"#;

/// Escape `& < > " '` and drop C0/C1 control characters.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

/// A rendered, fully escaped HTML report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDocument(String);

impl ReportDocument {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for ReportDocument {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Turns audit results into report documents.
#[derive(Debug, Clone, Default)]
pub struct ReportRenderer;

impl ReportRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, result: &AuditResult) -> ReportDocument {
        let mut html = String::with_capacity(8 * 1024);
        let url = escape_html(&result.url);

        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\" />\n\
             <title>a11ybot report: {url}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
             <h1>Accessibility report: {url}</h1>\n<p class=\"muted\">Generated {}</p>\n",
            result.audited_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        self.summary(&mut html, result);
        self.violations(&mut html, &result.violations);
        self.suggestions(&mut html, result);
        self.focus_trap(&mut html, result);

        html.push_str("</body>\n</html>\n");
        ReportDocument(html)
    }

    fn summary(&self, html: &mut String, result: &AuditResult) {
        let counts = &result.impact_counts;
        let _ = write!(
            html,
            "<div class=\"box\">\n<h2>Summary</h2>\n<ul>\n\
             <li><b>Score:</b> {}/100</li>\n<li><b>Total violations:</b> {}</li>\n",
            result.score,
            result.violations.len()
        );
        for impact in Impact::ALL {
            let _ = writeln!(
                html,
                "<li><b>{}:</b> {}</li>",
                capitalize(impact.as_str()),
                counts.get(impact)
            );
        }
        html.push_str("</ul>\n</div>\n");
    }

    fn violations(&self, html: &mut String, violations: &[Violation]) {
        html.push_str("<h2>Rule engine violations</h2>\n");
        if violations.is_empty() {
            html.push_str("<p class=\"pass\">No rule engine violations found.</p>\n");
            return;
        }
        for (idx, v) in violations.iter().enumerate() {
            let _ = write!(
                html,
                "<div class=\"box\">\n<h3>#{}: {}\
                 <span class=\"badge impact-{}\">{}</span>\
                 <span class=\"muted\"> ({} elements)</span></h3>\n\
                 <p><b>Description:</b> {}</p>\n<p><b>Help:</b> {}</p>\n",
                idx + 1,
                escape_html(&v.help),
                v.impact.as_str(),
                v.impact,
                v.nodes.len(),
                escape_html(&v.description),
                help_link(&v.help_url),
            );
            for node in &v.nodes {
                let _ = write!(
                    html,
                    "<div class=\"box node\">\n<div><b>Selector:</b> <code>{}</code></div>\n",
                    escape_html(&node.selectors.join(", "))
                );
                if let Some(summary) = &node.failure_summary {
                    let _ = write!(
                        html,
                        "<div><b>Summary:</b> {}</div>\n",
                        escape_html(summary)
                    );
                }
                html.push_str("</div>\n");
            }
            html.push_str("</div>\n");
        }
    }

    fn suggestions(&self, html: &mut String, result: &AuditResult) {
        let s = &result.suggestions;
        html.push_str("<h2>Suggestions</h2>\n");
        if s.is_empty() {
            html.push_str("<p class=\"pass\">No additional suggestions.</p>\n");
            return;
        }
        list_section(html, "Alternative text", s.alt_text.iter().map(String::as_str));
        list_section(html, "ARIA roles", s.aria.iter().map(String::as_str));
        let contrast: Vec<String> = s.contrast.iter().map(|c| c.message()).collect();
        list_section(html, "Contrast", contrast.iter().map(String::as_str));
    }

    fn focus_trap(&self, html: &mut String, result: &AuditResult) {
        html.push_str("<h2>Focus trap</h2>\n<ul>\n");
        for issue in &result.focus_trap {
            let class = if issue.kind == FocusTrapIssueKind::Pass {
                " class=\"pass\""
            } else {
                ""
            };
            let _ = writeln!(
                html,
                "<li{class}><b>{:?}:</b> {}</li>",
                issue.kind,
                escape_html(&issue.message)
            );
        }
        html.push_str("</ul>\n");
    }
}

fn list_section<'a>(html: &mut String, title: &str, items: impl Iterator<Item = &'a str>) {
    let mut items = items.peekable();
    if items.peek().is_none() {
        return;
    }
    let _ = write!(html, "<h3>{}</h3>\n<ul>\n", escape_html(title));
    for item in items {
        let _ = writeln!(html, "<li>{}</li>", escape_html(item));
    }
    html.push_str("</ul>\n");
}

/// Links only http(s) targets; anything else is shown as inert text.
fn help_link(url: &str) -> String {
    let escaped = escape_html(url);
    if url.starts_with("https://") || url.starts_with("http://") {
        format!("<a href=\"{escaped}\">{escaped}</a>")
    } else {
        escaped
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
