//! Reporters: list output, JSON results and a static HTML page

use std::path::{Path, PathBuf};

use colored::Colorize;
use tracing::info;

use crate::config::{ReporterKind, ResolvedRunnerConfig};
use crate::error::QaResult;
use crate::runner::{CaseResult, CaseStatus, SuiteReport};

/// Run every configured reporter, returning the files written
pub fn write_reports(
    report: &SuiteReport,
    config: &ResolvedRunnerConfig,
    title: &str,
) -> QaResult<Vec<PathBuf>> {
    let mut written = Vec::new();
    for reporter in &config.reporters {
        match reporter {
            ReporterKind::List => print_list(report),
            ReporterKind::Json => written.push(write_json(report, &config.output_dir)?),
            ReporterKind::Html => written.push(write_html(report, &config.report_dir, title)?),
        }
    }
    Ok(written)
}

fn print_list(report: &SuiteReport) {
    println!();
    for result in &report.results {
        println!("{}", list_line(result));
        if let Some(error) = &result.error {
            println!("      {}", error.red());
        }
        for soft in &result.soft_failures {
            println!("      {} {}", "soft:".yellow(), soft);
        }
    }
    println!();
    println!("{}", summary_line(report));
}

fn list_line(result: &CaseResult) -> String {
    let mark = match result.status {
        CaseStatus::Passed => "✓".green(),
        CaseStatus::Flaky => "~".yellow(),
        CaseStatus::Failed | CaseStatus::TimedOut => "✗".red(),
        CaseStatus::Skipped => "-".dimmed(),
    };
    format!(
        "  {} {} ({} ms)",
        mark,
        display_title(result),
        result.duration_ms
    )
}

fn summary_line(report: &SuiteReport) -> String {
    format!(
        "  {} passed, {} flaky, {} failed, {} skipped ({} ms)",
        report.passed, report.flaky, report.failed, report.skipped, report.duration_ms
    )
}

fn display_title(result: &CaseResult) -> String {
    match &result.project {
        Some(project) => format!("[{}] {} > {}", project, result.suite, result.title),
        None => format!("{} > {}", result.suite, result.title),
    }
}

/// Write test results to `results.json`
pub fn write_json(report: &SuiteReport, dir: &Path) -> QaResult<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join("results.json");
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

/// Write a self-contained `index.html`
pub fn write_html(report: &SuiteReport, dir: &Path, title: &str) -> QaResult<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join("index.html");
    std::fs::write(&path, render_html(report, title))?;

    info!("HTML report written to: {}", path.display());
    Ok(path)
}

fn render_html(report: &SuiteReport, title: &str) -> String {
    let mut rows = String::new();
    for result in &report.results {
        let status = serde_json::to_value(result.status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let mut detail = result.error.as_deref().map(escape_html).unwrap_or_default();
        for soft in &result.soft_failures {
            detail.push_str(&format!("<div class=\"soft\">soft: {}</div>", escape_html(soft)));
        }
        rows.push_str(&format!(
            "<tr class=\"{status}\"><td>{status}</td><td>{title}</td><td>{attempts}</td><td>{ms}</td><td>{detail}</td></tr>\n",
            status = status,
            title = escape_html(&display_title(result)),
            attempts = result.attempts,
            ms = result.duration_ms,
            detail = detail,
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; margin: 2em; }}
table {{ border-collapse: collapse; width: 100%; }}
td, th {{ border: 1px solid #ddd; padding: 4px 8px; text-align: left; vertical-align: top; }}
tr.passed td:first-child {{ color: #1a7f37; }}
tr.flaky td:first-child {{ color: #9a6700; }}
tr.failed td:first-child, tr.timed_out td:first-child {{ color: #cf222e; }}
tr.skipped td:first-child {{ color: #6e7781; }}
.soft {{ color: #9a6700; }}
</style>
</head>
<body>
<h1>{title}</h1>
<p>Started {started_at}</p>
<p>{total} tests: {passed} passed, {flaky} flaky, {failed} failed, {skipped} skipped ({ms} ms)</p>
<table>
<tr><th>Status</th><th>Test</th><th>Attempts</th><th>Duration (ms)</th><th>Details</th></tr>
{rows}</table>
</body>
</html>
"#,
        title = escape_html(title),
        started_at = escape_html(&report.started_at),
        total = report.total,
        passed = report.passed,
        flaky = report.flaky,
        failed = report.failed,
        skipped = report.skipped,
        ms = report.duration_ms,
        rows = rows,
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
