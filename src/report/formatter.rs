//! Text and JSON rendering of pipeline outputs.
//!
//! Undefined values render as `n/a`, never as zero.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::metrics::{MetricsCalculator, MonthlyPnl, PerformanceMetrics};
use crate::pipeline::{BacktestReport, DetailRow, SignalReport, SummaryRow};
use crate::validation::SeriesIntegrityReport;

/// Fixed-width table renderer.
#[derive(Debug, Clone)]
pub struct ReportFormatter {
    precision: usize,
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self { precision: 4 }
    }
}

impl ReportFormatter {
    /// Summary and detail tables of a live run.
    pub fn signal_text(&self, report: &SignalReport) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Signals as of {}", timestamp(report.as_of));
        out.push('\n');
        out.push_str(&self.summary_table(&report.summary));
        out.push('\n');
        out.push_str(&self.detail_table(&report.detail));
        out
    }

    /// Target per traded leg.
    pub fn summary_table(&self, rows: &[SummaryRow]) -> String {
        let p = self.precision;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<14} {:<10} {:>16} {:>16} {:>16}",
            "target", "instrument", "position", "score", "daily $ vol"
        );
        let _ = writeln!(out, "{}", "-".repeat(76));
        for row in rows {
            let _ = writeln!(
                out,
                "{:<14} {:<10} {:>16.p$} {:>16.p$} {:>16.p$}",
                row.kind.label(),
                row.instrument,
                row.target_position,
                row.directional_score,
                row.realized_daily_dollar_vol,
                p = p,
            );
            if let Some(reason) = &row.reason {
                let _ = writeln!(out, "  ! {}", reason);
            }
        }
        out
    }

    /// Latest state per monitored instrument.
    pub fn detail_table(&self, rows: &[DetailRow]) -> String {
        let p = self.precision;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<10} {:<25} {:>14} {:>10} {:>10} {:>14}",
            "instrument", "last timestamp", "last price", "z-score", "ann vol %", "daily vol"
        );
        let _ = writeln!(out, "{}", "-".repeat(88));
        for row in rows {
            let _ = writeln!(
                out,
                "{:<10} {:<25} {:>14.p$} {:>10.2} {:>10.2} {:>14.p$}",
                row.instrument,
                timestamp(row.last_timestamp),
                row.last_price,
                row.z_score,
                row.annualized_pct_volatility,
                row.realized_daily_vol,
                p = p,
            );
        }
        out
    }

    /// Backtest statistics table.
    pub fn backtest_text(&self, report: &BacktestReport) -> String {
        let result = &report.result;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Backtest {} to {} ({} instants, z-score clipping {})",
            timestamp(result.start),
            timestamp(result.end),
            result.grid_points,
            if result.config.clip_zscore { "on" } else { "off" },
        );
        out.push('\n');
        out.push_str(&self.metrics_table(&report.metrics));
        out.push('\n');
        let _ = writeln!(out, "{:<10} {:>16}", "instrument", "total pnl");
        let _ = writeln!(out, "{}", "-".repeat(27));
        for instrument in &result.instruments {
            let _ = writeln!(
                out,
                "{:<10} {:>16.2}",
                instrument,
                result.instrument_total(instrument)
            );
        }
        out.push('\n');
        out.push_str(&self.monthly_table(&MetricsCalculator::monthly_pnl(result)));
        out
    }

    /// Calendar-month PnL of the defined business days.
    pub fn monthly_table(&self, months: &[MonthlyPnl]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:<10} {:>16} {:>6}", "month", "pnl", "days");
        let _ = writeln!(out, "{}", "-".repeat(34));
        for m in months {
            let _ = writeln!(
                out,
                "{:<10} {:>16.2} {:>6}",
                format!("{}-{:02}", m.year, m.month),
                m.pnl,
                m.days
            );
        }
        out
    }

    pub fn metrics_table(&self, metrics: &PerformanceMetrics) -> String {
        let rows: [(&str, String); 10] = [
            ("sample days", metrics.sample_days.to_string()),
            ("pnl mean", format!("{:.2}", metrics.pnl_mean)),
            ("pnl std", format!("{:.2}", metrics.pnl_std)),
            ("information ratio", format!("{:.3}", metrics.information_ratio)),
            ("sortino ratio", format!("{:.3}", metrics.sortino_ratio)),
            (
                "rolling portfolio vol",
                format!("{:.2}", metrics.latest_rolling_portfolio_vol),
            ),
            ("total pnl", format!("{:.2}", metrics.total_pnl)),
            ("hit rate %", format!("{:.1}", metrics.hit_rate * 100.0)),
            ("max drawdown", format!("{:.2}", metrics.max_drawdown)),
            (
                "max drawdown date",
                metrics
                    .max_drawdown_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "n/a".to_string()),
            ),
        ];

        let mut out = String::new();
        for (name, value) in rows {
            let _ = writeln!(out, "{:<22} {:>16}", name, value);
        }
        out
    }

    /// One line per report, failed checks listed beneath.
    pub fn validation_text(&self, reports: &[SeriesIntegrityReport]) -> String {
        let mut out = String::new();
        for report in reports {
            let mark = if report.all_passed() { "ok" } else { "FAIL" };
            let _ = writeln!(out, "[{:<4}] {}", mark, report.summary());
            for check in report.failed_checks() {
                let _ = writeln!(out, "       {}: {}", check.name, check.message);
                if let Some(details) = &check.details {
                    let _ = writeln!(out, "         {}", details);
                }
            }
        }
        out
    }

    /// Pretty JSON of any report.
    pub fn to_json<T: Serialize>(&self, value: &T) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(value)
    }
}

fn timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M:%S%:z").to_string())
        .unwrap_or_else(|| "n/a".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::num::Num;
    use crate::risk::TargetKind;
    use chrono::TimeZone;

    fn report() -> SignalReport {
        let ts = Utc.with_ymd_and_hms(2024, 5, 17, 20, 0, 0).unwrap();
        SignalReport {
            as_of: Some(ts),
            summary: vec![
                SummaryRow {
                    kind: TargetKind::Equity,
                    instrument: "ES=F".to_string(),
                    target_position: Num::new(3.25),
                    directional_score: Num::new(0.65),
                    realized_daily_dollar_vol: Num::new(2000.0),
                    reason: None,
                },
                SummaryRow {
                    kind: TargetKind::FixedIncome,
                    instrument: "ZN=F".to_string(),
                    target_position: Num::UNDEFINED,
                    directional_score: Num::UNDEFINED,
                    realized_daily_dollar_vol: Num::new(350.0),
                    reason: Some("Insufficient data for ZN=F: z-score undefined for CL=F".into()),
                },
            ],
            detail: vec![DetailRow {
                instrument: "CL=F".to_string(),
                last_timestamp: Some(ts),
                last_price: Num::new(78.5),
                z_score: Num::UNDEFINED,
                annualized_pct_volatility: Num::new(31.2),
                realized_daily_vol: Num::new(1.4),
            }],
        }
    }

    #[test]
    fn test_undefined_renders_as_na() {
        let text = ReportFormatter::default().signal_text(&report());
        let bond_line = text.lines().find(|l| l.starts_with("fixed income")).unwrap();
        assert_eq!(bond_line.matches("n/a").count(), 2);
        assert!(bond_line.contains("350.0000"));
        assert!(text.contains("! Insufficient data for ZN=F"));

        let cl_line = text.lines().find(|l| l.starts_with("CL=F")).unwrap();
        assert!(cl_line.contains("n/a"));
        assert!(!cl_line.contains(" 0.00 "));
        assert!(text.starts_with("Signals as of 2024-05-17 20:00:00+00:00"));
    }

    #[test]
    fn test_json_uses_null_for_undefined() {
        let json = ReportFormatter::default().to_json(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["summary"][1]["target_position"].is_null());
        assert_eq!(value["summary"][0]["target_position"], 3.25);
        assert_eq!(value["summary"][1]["kind"], "fixed_income");
        assert!(value["detail"][0]["z_score"].is_null());
    }

    #[test]
    fn test_monthly_table() {
        let months = vec![
            MonthlyPnl {
                year: 2024,
                month: 4,
                pnl: 1250.5,
                days: 22,
            },
            MonthlyPnl {
                year: 2024,
                month: 5,
                pnl: -310.0,
                days: 13,
            },
        ];
        let text = ReportFormatter::default().monthly_table(&months);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("2024-04"));
        assert!(lines[2].contains("1250.50"));
        assert!(lines[3].starts_with("2024-05"));
        assert!(lines[3].trim_end().ends_with("13"));
    }

    #[test]
    fn test_metrics_table_without_sample() {
        let text = ReportFormatter::default().metrics_table(&PerformanceMetrics::default());
        let ir = text.lines().find(|l| l.starts_with("information ratio")).unwrap();
        assert!(ir.trim_end().ends_with("n/a"));
    }
}
