use a11ybot_core::audit::contrast::{contrast_ratio, parse_opaque_rgb};
use a11ybot_core::audit::{impact_counts, score};
use a11ybot_core::report::{escape_html, ReportRenderer};
use a11ybot_core::types::{
    AuditResult, FocusTrapIssue, FocusTrapIssueKind, Impact, SuggestionList, Violation,
    ViolationNode,
};
use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn violations(n: usize) -> Vec<Violation> {
    (0..n)
        .map(|i| {
            let mut v = Violation::new(Impact::ALL[i % Impact::ALL.len()], format!("Rule {i}"));
            v.description = "Ensures every <img> has a text alternative".into();
            v.nodes = (0..4)
                .map(|j| ViolationNode {
                    selectors: vec![format!("main > section:nth-child({j}) > img")],
                    failure_summary: Some("Fix any of the following: alt is missing".into()),
                })
                .collect();
            v
        })
        .collect()
}

fn bench_scoring(c: &mut Criterion) {
    let many = violations(500);
    c.bench_function("score_500_violations", |b| {
        b.iter(|| score(black_box(&many)))
    });
    c.bench_function("impact_counts_500_violations", |b| {
        b.iter(|| impact_counts(black_box(&many)))
    });
}

fn bench_contrast(c: &mut Criterion) {
    c.bench_function("parse_and_compare_colors", |b| {
        b.iter(|| {
            let fg = parse_opaque_rgb(black_box("rgb(118, 118, 118)"));
            let bg = parse_opaque_rgb(black_box("rgba(255, 255, 255, 1)"));
            fg.zip(bg).map(|(fg, bg)| contrast_ratio(fg, bg))
        })
    });
}

fn bench_report(c: &mut Criterion) {
    let hostile = "<script>alert('x')</script> & \u{1b}[31m".repeat(200);
    c.bench_function("escape_html_hostile_input", |b| {
        b.iter(|| escape_html(black_box(&hostile)))
    });

    let vs = violations(100);
    let result = AuditResult {
        url: "https://example.com/".into(),
        score: score(&vs),
        impact_counts: impact_counts(&vs),
        violations: vs,
        suggestions: SuggestionList::default(),
        focus_trap: vec![FocusTrapIssue::new(FocusTrapIssueKind::Pass, "ok")],
        audited_at: Utc::now(),
    };
    let renderer = ReportRenderer::new();
    c.bench_function("render_report_100_violations", |b| {
        b.iter(|| renderer.render(black_box(&result)))
    });
}

criterion_group!(benches, bench_scoring, bench_contrast, bench_report);
criterion_main!(benches);
