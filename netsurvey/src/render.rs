//! Text and JSON rendering of command results.

use analytics::{DeviceRole, Report, RiskFinding};
use clap::ValueEnum;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Jsonl,
}

impl OutputFormat {
    /// Config-file spelling; anything unrecognised falls back to text.
    pub fn from_name(s: &str) -> Self {
        match s {
            "json" => OutputFormat::Json,
            "jsonl" => OutputFormat::Jsonl,
            _ => OutputFormat::Text,
        }
    }
}

/// Collections: text lines, one JSON array, or one JSON object per line.
pub fn rows<T: Serialize>(format: OutputFormat, items: &[T], text: impl Fn(&T) -> String) -> serde_json::Result<Vec<String>> {
    Ok(match format {
        OutputFormat::Text => items.iter().map(text).collect(),
        OutputFormat::Json => vec![serde_json::to_string(items)?],
        OutputFormat::Jsonl => items.iter().map(serde_json::to_string).collect::<Result<_, _>>()?,
    })
}

/// A single value: text lines or one JSON document.
pub fn one<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce(&T) -> Vec<String>) -> serde_json::Result<Vec<String>> {
    Ok(match format {
        OutputFormat::Text => text(value),
        OutputFormat::Json | OutputFormat::Jsonl => vec![serde_json::to_string(value)?],
    })
}

pub fn rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_default()
}

#[derive(Debug, Serialize)]
pub struct Failure {
    pub ip: String,
    pub cause: String,
}

#[derive(Debug, Serialize)]
pub struct ScanSummary {
    pub range: String,
    pub dataset: String,
    pub discovered: usize,
    pub scanned: usize,
    pub records_written: usize,
    pub skipped: Vec<Failure>,
    pub dropped: Vec<Failure>,
    pub unscheduled: usize,
    pub cancelled: bool,
    /// Partial results were not written because the run was cancelled.
    pub discarded: bool,
    pub duration_ms: u128,
}

pub fn summary_text(s: &ScanSummary) -> Vec<String> {
    let mut out = vec![format!(
        "{}: {} hosts up, {} scanned, {} records written to {} ({} ms)",
        s.range, s.discovered, s.scanned, s.records_written, s.dataset, s.duration_ms
    )];
    for f in &s.skipped {
        out.push(format!("  skipped {}: {}", f.ip, f.cause));
    }
    for f in &s.dropped {
        out.push(format!("  dropped {}: {}", f.ip, f.cause));
    }
    if s.cancelled {
        let fate = if s.discarded { "partial results discarded" } else { "partial results kept" };
        out.push(format!("  cancelled with {} hosts unscheduled, {}", s.unscheduled, fate));
    }
    out
}

#[derive(Debug, Serialize)]
pub struct ClassifiedHost {
    pub ip: String,
    pub timestamp: String,
    pub role: DeviceRole,
}

pub fn classified_text(c: &ClassifiedHost) -> String {
    format!("{:<40} {:<26} {}", c.ip, c.timestamp, c.role)
}

pub fn risk_text(f: &RiskFinding) -> String {
    format!("{:<40} {}", f.ip, f.port)
}

pub fn report_text(r: &Report) -> Vec<String> {
    let mut out = vec![format!("records: {}", r.records), String::new(), "OS distribution:".to_string()];
    for c in &r.os_distribution {
        out.push(format!("  {:<40} {}", display_os(&c.os), c.count));
    }
    out.push("OS distribution (up hosts):".to_string());
    for c in &r.os_distribution_up {
        out.push(format!("  {:<40} {}", display_os(&c.os), c.count));
    }
    out.push("Open ports:".to_string());
    for c in &r.port_distribution {
        out.push(format!("  {:<8} {}", c.port, c.count));
    }
    out.push("Open ports per host (latest scan):".to_string());
    for h in &r.host_port_counts {
        out.push(format!("  {:<40} {:<4} {}", h.ip, h.open_ports, rfc3339(h.timestamp)));
    }
    out.push("Records per hour (UTC):".to_string());
    for b in &r.temporal_series {
        out.push(format!("  {}  {}", rfc3339(b.hour), b.count));
    }
    out.push("Device roles:".to_string());
    for c in &r.role_distribution {
        out.push(format!("  {:<16} {}", c.role, c.count));
    }
    out
}

fn display_os(os: &str) -> &str {
    if os.is_empty() { "(none)" } else { os }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(cancelled: bool) -> ScanSummary {
        ScanSummary {
            range: "10.0.0.0/30".into(),
            dataset: "hosts.csv".into(),
            discovered: 2,
            scanned: 2,
            records_written: 1,
            skipped: vec![Failure { ip: "10.0.0.2".into(), cause: "probe timed out after 60s".into() }],
            dropped: vec![],
            unscheduled: 0,
            cancelled,
            discarded: false,
            duration_ms: 42,
        }
    }

    #[test]
    fn text_summary_lists_skipped_hosts() {
        let lines = summary_text(&summary(false));
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("skipped 10.0.0.2"));
        assert!(summary_text(&summary(true)).last().unwrap().contains("partial results kept"));
    }

    #[test]
    fn jsonl_emits_one_object_per_row() {
        let findings = vec![RiskFinding { ip: "a".into(), port: 22 }, RiskFinding { ip: "b".into(), port: 23 }];
        let lines = rows(OutputFormat::Jsonl, &findings, risk_text).unwrap();
        assert_eq!(lines, vec![r#"{"ip":"a","port":22}"#, r#"{"ip":"b","port":23}"#]);
        let arr = rows(OutputFormat::Json, &findings, risk_text).unwrap();
        assert_eq!(arr.len(), 1);
    }

    #[test]
    fn unknown_format_name_is_text() {
        assert_eq!(OutputFormat::from_name("yaml"), OutputFormat::Text);
        assert_eq!(OutputFormat::from_name("jsonl"), OutputFormat::Jsonl);
    }

    #[test]
    fn report_text_marks_the_empty_os_bucket() {
        let lines = report_text(&Report::build(&[]));
        assert_eq!(lines[0], "records: 0");
        assert_eq!(display_os(""), "(none)");
    }
}
