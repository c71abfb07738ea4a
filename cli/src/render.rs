//! Plain-text rendering for `--format text`.

use std::fmt::Write;

use chrono::{DateTime, Local, Utc};
use riskcheck_core::{Company, Question, ScanReport};
use riskcheck_probe::DiagnosticEntry;
use riskcheck_sqlite::{AssessmentResults, MigrationStatus, SeedReport};

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

pub(crate) fn scan_report(report: &ScanReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Scan {} ({}): {}",
        report.scan_id(),
        local_time(report.finished_at()),
        report.overall_status()
    );
    for result in report.per_check().values() {
        let _ = writeln!(
            out,
            "  {:<10} {:<8} {}",
            result.check_type.as_str(),
            result.status.as_str(),
            result.message
        );
        for suggestion in &result.suggestions {
            let _ = writeln!(out, "             - {suggestion}");
        }
    }
    out
}

pub(crate) fn companies(companies: &[Company]) -> String {
    if companies.is_empty() {
        return "No companies registered.\n".to_string();
    }
    let mut out = String::new();
    for company in companies {
        let _ = write!(out, "{:>4}  {}", company.id, company.name);
        let extra: Vec<&str> = [company.industry.as_deref(), company.size.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if !extra.is_empty() {
            let _ = write!(out, " ({})", extra.join(", "));
        }
        out.push('\n');
    }
    out
}

pub(crate) fn questions(questions: &[Question]) -> String {
    let mut out = String::new();
    let mut current: Option<&str> = None;
    for question in questions {
        if current != Some(question.category.as_str()) {
            let _ = writeln!(out, "{}", question.category);
            current = Some(question.category.as_str());
        }
        let _ = writeln!(out, "  {:>4}  {}", question.id, question.question);
    }
    out
}

pub(crate) fn seed_report(report: &SeedReport) -> String {
    format!(
        "Seed complete: {} question(s) inserted, {} already present.\n",
        report.inserted, report.existing
    )
}

pub(crate) fn migration_status(status: &MigrationStatus) -> String {
    let mut out = String::from("Migration Status:\n");
    let _ = writeln!(
        out,
        "  Tables exist: {}",
        if status.tables_exist { "yes" } else { "no" }
    );
    if !status.missing_tables.is_empty() {
        let _ = writeln!(out, "  Missing tables: {}", status.missing_tables.join(", "));
    }
    let _ = writeln!(out, "  Companies: {}", status.company_count);
    let _ = writeln!(out, "  Questions: {}", status.question_count);
    let _ = writeln!(out, "  Assessments: {}", status.assessment_count);
    let _ = writeln!(out, "  Responses: {}", status.response_count);
    let _ = writeln!(out, "  Scans: {}", status.scan_count);
    let _ = writeln!(out, "  Scan results: {}", status.scan_result_count);
    out
}

pub(crate) fn assessment_results(results: &AssessmentResults) -> String {
    let mut out = String::new();
    let risk = &results.risk;
    let _ = writeln!(
        out,
        "Assessment {} for {} (started {})",
        results.assessment.id(),
        results.company.name,
        local_time(results.assessment.started_at())
    );
    let _ = writeln!(
        out,
        "Risk: {:.1}% ({}) over {} categor{}",
        risk.percentage,
        risk.level,
        risk.category_count,
        if risk.category_count == 1 { "y" } else { "ies" }
    );
    for (category, count) in &risk.per_category {
        let _ = writeln!(out, "  {category}: {count} \"No\" answer(s)");
    }

    match results.latest_scan() {
        Some(report) => {
            out.push('\n');
            out.push_str(&scan_report(report));
        }
        None => out.push_str("\nNo system scan stored for this assessment.\n"),
    }

    if !results.recommendations.is_empty() {
        out.push_str("\nRecommendations:\n");
        for rec in &results.recommendations {
            let _ = writeln!(out, "  - [{}] {}", rec.category, rec.title);
            if let Some(action) = &rec.action {
                let _ = writeln!(out, "      {action}");
            }
            for suggestion in &rec.suggestions {
                let _ = writeln!(out, "      * {suggestion}");
            }
        }
    }
    out
}

pub(crate) fn diagnostics(entries: &[DiagnosticEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(
            out,
            "  {:<12} {:<8} {}",
            entry.name,
            entry.status.as_str(),
            entry.message
        );
    }
    out
}
