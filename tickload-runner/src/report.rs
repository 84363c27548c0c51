use serde::Serialize;
use std::fmt;
use std::io::{self, Write};
use tickload_common::RampStage;
use tracing::debug;

use crate::stage::StageRun;
use crate::stats::Summary;

/// Per-stage result as presented to the operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub rate: u32,
    pub duration_secs: u64,
    pub workers: u32,
    pub elapsed_secs: f64,
    #[serde(flatten)]
    pub summary: Summary,
}

impl StageReport {
    pub fn from_run(run: &StageRun) -> Self {
        Self {
            rate: run.stage.rate,
            duration_secs: run.stage.duration_secs,
            workers: run.workers,
            elapsed_secs: run.elapsed.as_secs_f64(),
            summary: run.stats.summary(),
        }
    }

    /// Completed requests per second of wall time.
    pub fn throughput_rps(&self) -> f64 {
        throughput(self.summary.total, self.elapsed_secs)
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub stages: Vec<StageReport>,
    pub elapsed_secs: f64,
    pub overall: Summary,
}

impl RunReport {
    pub fn throughput_rps(&self) -> f64 {
        throughput(self.overall.total, self.elapsed_secs)
    }
}

fn throughput(total: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    total as f64 / elapsed_secs
}

/// Receives progress from the driver as the run unfolds.
pub trait Reporter {
    fn stage_started(&mut self, stage: &RampStage);
    fn stage_finished(&mut self, report: &StageReport);
    fn run_finished(&mut self, report: &RunReport);
}

/// Human-readable lines.
pub struct TextReporter<W: Write> {
    out: W,
}

impl<W: Write> TextReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for TextReporter<W> {
    fn stage_started(&mut self, stage: &RampStage) {
        write_line(
            &mut self.out,
            format_args!("Stage: {} rps for {}s", stage.rate, stage.duration_secs),
        );
    }

    fn stage_finished(&mut self, report: &StageReport) {
        write_line(
            &mut self.out,
            format_args!(
                "{}  throughput={:.1}rps workers={} elapsed={:.1}s",
                report.summary,
                report.throughput_rps(),
                report.workers,
                report.elapsed_secs,
            ),
        );
    }

    fn run_finished(&mut self, report: &RunReport) {
        write_line(
            &mut self.out,
            format_args!(
                "Overall: {}  throughput={:.1}rps error_rate={:.3}%",
                report.overall,
                report.throughput_rps(),
                report.overall.error_rate() * 100.0,
            ),
        );
    }
}

/// One JSON object per line: each finished stage, then the overall summary.
pub struct JsonReporter<W: Write> {
    out: W,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, value: serde_json::Value) {
        write_line(&mut self.out, format_args!("{value}"));
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn stage_started(&mut self, _stage: &RampStage) {}

    fn stage_finished(&mut self, report: &StageReport) {
        let mut value = serde_json::json!({ "kind": "stage" });
        merge_into(&mut value, report);
        self.emit(value);
    }

    fn run_finished(&mut self, report: &RunReport) {
        let mut value = serde_json::json!({
            "kind": "overall",
            "elapsed_secs": report.elapsed_secs,
            "stages": report.stages.len(),
        });
        merge_into(&mut value, &report.overall);
        self.emit(value);
    }
}

/// Write one line and flush. The report is best effort: a failed write (for
/// example a closed pipe) is logged and the run carries on.
fn write_line(out: &mut impl Write, line: fmt::Arguments<'_>) {
    let result: io::Result<()> = writeln!(out, "{line}").and_then(|()| out.flush());
    if let Err(e) = result {
        debug!(error = %e, "failed to write report line");
    }
}

fn merge_into(target: &mut serde_json::Value, source: &impl Serialize) {
    if let (Some(target), Ok(serde_json::Value::Object(fields))) =
        (target.as_object_mut(), serde_json::to_value(source))
    {
        target.extend(fields);
    }
}
