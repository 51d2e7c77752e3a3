//! Output sinks and formatters for poll cycle reports

use crate::types::PriceReport;
use chrono::SecondsFormat;
use std::io::Write;
use std::sync::Mutex;

/// How a report is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// One human-readable line
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Renders a report as a single line (no trailing newline)
pub fn format_report(report: &PriceReport, format: ReportFormat) -> String {
    match format {
        ReportFormat::Pretty => format_pretty(report),
        ReportFormat::Json => serde_json::to_string(report)
            .unwrap_or_else(|e| format!("{{\"error\":\"unserializable report: {}\"}}", e)),
    }
}

fn format_pretty(report: &PriceReport) -> String {
    let timestamp = report
        .timestamp
        .to_rfc3339_opts(SecondsFormat::Millis, true);

    let quote = match (&report.quote, report.price) {
        (Some(quote), Some(_)) if report.is_ok() => quote,
        _ => {
            return format!(
                "{} [{}] {}: {}",
                timestamp,
                report.source,
                report.status.as_str(),
                report.detail.as_deref().unwrap_or("no detail")
            )
        }
    };

    let mut line = format!(
        "{} [{}] Current SOL/USD Price: ${}",
        timestamp,
        report.source,
        quote.display_price()
    );
    if let Some(conf) = quote.confidence {
        line.push_str(&format!(" ±{:.4}", conf));
    }
    if let Some(change) = quote.price_change_24h {
        line.push_str(&format!(" (24h {:+.2}%)", change));
    }
    if let Some(movement) = report.movement {
        line.push_str(&format!(
            " | step {:+} (index {}, up {}, down {})",
            movement.steps, movement.index, movement.up_streak, movement.down_streak
        ));
    }
    line
}

/// Destination for poll cycle reports
pub trait ReportSink: Send + Sync {
    fn emit(&self, report: &PriceReport);
}

/// Writes formatted reports line by line to any writer
pub struct WriterSink<W> {
    writer: Mutex<W>,
    format: ReportFormat,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W, format: ReportFormat) -> Self {
        Self {
            writer: Mutex::new(writer),
            format,
        }
    }

    /// Returns the wrapped writer
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Console output
pub type ConsoleSink = WriterSink<std::io::Stdout>;

impl ConsoleSink {
    pub fn stdout(format: ReportFormat) -> Self {
        Self::new(std::io::stdout(), format)
    }
}

// Writes block the calling worker. One short line per cycle keeps this
// negligible; slow writers should be wrapped before they reach the poller.
impl<W: Write + Send> ReportSink for WriterSink<W> {
    fn emit(&self, report: &PriceReport) {
        let line = format_report(report, self.format);
        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            tracing::warn!(error = %e, "Failed to write price report");
        }
    }
}

/// Keeps every report in memory
#[derive(Default)]
pub struct MemorySink {
    reports: Mutex<Vec<PriceReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<PriceReport> {
        match self.reports.lock() {
            Ok(reports) => reports.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ReportSink for MemorySink {
    fn emit(&self, report: &PriceReport) {
        match self.reports.lock() {
            Ok(mut reports) => reports.push(report.clone()),
            Err(poisoned) => poisoned.into_inner().push(report.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::movement::PriceMovement;
    use crate::types::PriceObservation;

    #[test]
    fn test_pretty_ok_line() {
        let obs = PriceObservation::new(142.371_234)
            .with_decimals(2)
            .with_change(Some(-1.5));
        let line = format_report(&PriceReport::ok("jupiter", obs), ReportFormat::Pretty);
        assert!(line.contains("[jupiter] Current SOL/USD Price: $142.37"));
        assert!(line.ends_with("(24h -1.50%)"));
    }

    #[test]
    fn test_pretty_line_shows_step_movement() {
        let movement = PriceMovement {
            steps: -2,
            index: 3,
            anchor_price: 141.9,
            up_streak: 0,
            down_streak: 2,
        };
        let report = PriceReport::ok("hermes", PriceObservation::new(141.9))
            .with_movement(Some(movement));
        let line = format_report(&report, ReportFormat::Pretty);
        assert!(line.ends_with("| step -2 (index 3, up 0, down 2)"));
    }

    #[test]
    fn test_pretty_diagnostic_line() {
        let report = PriceReport::failed("jupiter", &SourceError::Http { status: 500 });
        let line = format_report(&report, ReportFormat::Pretty);
        assert!(line.ends_with("[jupiter] error: HTTP 500"));
        assert!(!line.contains('$'));
    }

    #[test]
    fn test_json_line_parses_back() {
        let report = PriceReport::ok("hermes", PriceObservation::from_mantissa(14_237, -2));
        let line = format_report(&report, ReportFormat::Json);
        let parsed: PriceReport = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.status, report.status);
        assert!((parsed.price.unwrap() - report.price.unwrap()).abs() < 1e-9);
        assert_eq!(parsed.quote.unwrap().mantissa, Some(14_237));
    }

    #[test]
    fn test_writer_sink_writes_one_line_per_report() {
        let sink = WriterSink::new(Vec::new(), ReportFormat::Json);
        sink.emit(&PriceReport::ok("mock", PriceObservation::new(1.0)));
        sink.emit(&PriceReport::failed(
            "mock",
            &SourceError::unavailable("price account not found"),
        ));

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"status\":\"unavailable\""));
    }
}
