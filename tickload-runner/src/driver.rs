use std::time::Instant;
use tickload_common::Result;
use tracing::info;

use crate::config::LoadConfig;
use crate::report::{Reporter, RunReport, StageReport};
use crate::stage::run_stage;
use crate::stats::StatsAccumulator;

/// Run every stage of the ramp in order, one after the other, reporting each as
/// it finishes and folding its stats into the overall total.
pub async fn run(config: &LoadConfig, reporter: &mut dyn Reporter) -> Result<RunReport> {
    info!(
        base_url = %config.client.base_url,
        shop = %config.client.shop_slug,
        ramp = %config.ramp,
        "starting ramp"
    );

    let run_start = Instant::now();
    let mut overall = StatsAccumulator::new();
    let mut stages = Vec::with_capacity(config.ramp.stages().len());

    for stage in config.ramp.stages() {
        reporter.stage_started(stage);

        let run = run_stage(&config.client, *stage).await?;
        let report = StageReport::from_run(&run);
        reporter.stage_finished(&report);

        overall.merge(run.stats);
        stages.push(report);
    }

    let report = RunReport {
        stages,
        elapsed_secs: run_start.elapsed().as_secs_f64(),
        overall: overall.summary(),
    };
    reporter.run_finished(&report);
    Ok(report)
}
