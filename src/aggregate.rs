use std::collections::HashMap;

use crate::client::SchedulerClient;
use crate::error::{Result, Warning};
use crate::model::{JobRecord, JobState, StatsIndex};

/// The reconciled view model handed to the rendering layer.
#[derive(Debug)]
pub struct DashboardView {
    /// Jobs with their stats attached, sorted by name ascending.
    pub entries: Vec<JobRecord>,
    pub total_count: usize,
    pub failed_count: usize,
    /// Recoverable conditions hit while building this view, in
    /// `Kind:detail` form.
    pub warnings: Vec<String>,
}

/// Join the job registry with the stats index.
///
/// Stats for unknown jobs are dropped; jobs without stats keep an empty
/// mapping. Entries are sorted by name so the view model is deterministic
/// regardless of upstream ordering.
pub fn build_view(
    jobs: HashMap<String, JobRecord>,
    mut stats: StatsIndex,
    warnings: Vec<Warning>,
) -> DashboardView {
    let mut entries: Vec<JobRecord> = jobs
        .into_values()
        .map(|mut job| {
            if let Some(job_stats) = stats.remove(&job.name) {
                job.stats = job_stats;
            }
            job
        })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let failed_count = entries
        .iter()
        .filter(|job| job.state == JobState::Failed)
        .count();

    DashboardView {
        total_count: entries.len(),
        failed_count,
        entries,
        warnings: warnings.iter().map(ToString::to_string).collect(),
    }
}

/// One dashboard render: fetch the registry and the stats concurrently,
/// then merge at the join point.
///
/// Registry failure is fatal; stats failures degrade to warnings.
pub async fn fetch_dashboard(client: &SchedulerClient) -> Result<DashboardView> {
    let (jobs, stats) = tokio::join!(client.fetch_jobs(), client.fetch_stats());
    let (jobs, mut warnings) = jobs?;
    let (stats, stats_warnings) = stats;
    warnings.extend(stats_warnings);
    Ok(build_view(jobs, stats, warnings))
}
