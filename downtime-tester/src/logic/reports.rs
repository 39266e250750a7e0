use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use std::io::Write;
use std::time::Duration;

use super::ScenarioResult;

struct Totals {
    total: usize,
    passed: usize,
    failed: usize,
    success_rate: f64,
}

fn totals(results: &[ScenarioResult]) -> Totals {
    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    #[allow(clippy::cast_precision_loss)]
    let success_rate = if total == 0 {
        0.0
    } else {
        (passed as f64 / total as f64) * 100.0
    };
    Totals {
        total,
        passed,
        failed: total - passed,
        success_rate,
    }
}

fn label(result: &ScenarioResult) -> String {
    if result.seed_label == result.seed.to_string() {
        format!("{} (seed {})", result.scenario_name, result.seed)
    } else {
        format!(
            "{} (seed {} [{}])",
            result.scenario_name, result.seed, result.seed_label
        )
    }
}

pub fn generate_console_report<W: Write + ?Sized>(
    out: &mut W,
    results: &[ScenarioResult],
    total_duration: Duration,
) -> Result<()> {
    let totals = totals(results);

    writeln!(out)?;
    writeln!(out, "{}", "📊 Downtime Scenario Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "============================".cyan())?;
    writeln!(out, "Total runs: {}", totals.total)?;
    writeln!(out, "Passed: {}", totals.passed.to_string().green())?;
    writeln!(out, "Failed: {}", totals.failed.to_string().red())?;
    writeln!(out, "Success rate: {:.1}%", totals.success_rate)?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for result in results {
        let status = if result.passed {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };
        writeln!(out, "{status} {}", label(result).bold())?;
        writeln!(
            out,
            "   Iterations: {}/{} successful",
            result.successful_iterations, result.iterations_run
        )?;
        writeln!(out, "   Average time: {:?}", result.average_duration)?;
        if let Some(summary) = &result.last_summary {
            writeln!(out, "   Last run: {summary}")?;
        }
        if !result.failures.is_empty() {
            writeln!(out, "   Failures:")?;
            for failure in &result.failures {
                writeln!(out, "     • {}", failure.red())?;
            }
        }
        writeln!(out)?;
    }

    let fastest = results.iter().min_by_key(|r| r.average_duration);
    let slowest = results.iter().max_by_key(|r| r.average_duration);
    if let (Some(fastest), Some(slowest)) = (fastest, slowest) {
        writeln!(out, "{}", "⚡ Performance Summary".bright_yellow().bold())?;
        writeln!(out, "{}", "=====================".yellow())?;
        writeln!(
            out,
            "Fastest: {} ({:?})",
            label(fastest).green(),
            fastest.average_duration
        )?;
        writeln!(
            out,
            "Slowest: {} ({:?})",
            label(slowest).yellow(),
            slowest.average_duration
        )?;
    }
    Ok(())
}

pub fn generate_json_report<W: Write + ?Sized>(out: &mut W, results: &[ScenarioResult]) -> Result<()> {
    let json_output = serde_json::to_string_pretty(results)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report<W: Write + ?Sized>(
    out: &mut W,
    results: &[ScenarioResult],
    generated_at: DateTime<Utc>,
) -> Result<()> {
    let totals = totals(results);

    writeln!(out, "# Downtime Scenario Results\n")?;
    writeln!(
        out,
        "_Generated {}_\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total runs**: {}", totals.total)?;
    writeln!(out, "- **Passed**: {}", totals.passed)?;
    writeln!(out, "- **Failed**: {}", totals.failed)?;
    writeln!(out, "- **Success rate**: {:.1}%\n", totals.success_rate)?;

    writeln!(out, "## Detailed Results\n")?;
    for result in results {
        let status = if result.passed { "✅" } else { "❌" };
        writeln!(out, "### {status} {}\n", label(result))?;
        writeln!(
            out,
            "- **Iterations**: {}/{} successful",
            result.successful_iterations, result.iterations_run
        )?;
        writeln!(out, "- **Average time**: {:?}", result.average_duration)?;
        if let Some(summary) = &result.last_summary {
            writeln!(out, "- **Last run**: {summary}")?;
        }
        if !result.failures.is_empty() {
            writeln!(out, "- **Failures**:")?;
            for failure in &result.failures {
                writeln!(out, "  - {failure}")?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn result(name: &str, passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario_name: name.into(),
            seed: 7,
            seed_label: if passed { "7".into() } else { "harbor".into() },
            passed,
            iterations_run: 2,
            successful_iterations: if passed { 2 } else { 1 },
            failures: if passed {
                Vec::new()
            } else {
                vec!["Iteration 2 (seed 8): gate let a request through".into()]
            },
            last_summary: Some("refused before sending".into()),
            average_duration: Duration::from_micros(250),
            performance_data: vec![Duration::from_micros(250)],
        }
    }

    #[test]
    fn markdown_lists_summary_and_failures() {
        let mut buf = Vec::new();
        let stamp = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        generate_markdown_report(
            &mut buf,
            &[result("smoke", true), result("insufficient-gold", false)],
            stamp,
        )
        .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("# Downtime Scenario Results"));
        assert!(text.contains("_Generated 2026-10-19 12:00:00 UTC_"));
        assert!(text.contains("- **Success rate**: 50.0%"));
        assert!(text.contains("### ✅ smoke (seed 7)"));
        assert!(text.contains("### ❌ insufficient-gold (seed 7 [harbor])"));
        assert!(text.contains("  - Iteration 2 (seed 8): gate let a request through"));
    }

    #[test]
    fn console_report_handles_empty_results() {
        colored::control::set_override(false);
        let mut buf = Vec::new();
        generate_console_report(&mut buf, &[], Duration::ZERO).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Total runs: 0"));
        assert!(text.contains("Success rate: 0.0%"));
        assert!(!text.contains("Performance Summary"));
    }

    #[test]
    fn json_report_is_an_array() {
        let mut buf = Vec::new();
        generate_json_report(&mut buf, &[result("smoke", true)]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value[0]["scenario_name"], "smoke");
        assert_eq!(value[0]["passed"], true);
    }
}
