use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::Warning;
use crate::model::schedule::Schedule;
use crate::model::stats::Rank;

/// Display status derived from the last-success/last-failure timestamps.
///
/// Always a pure function of the two timestamps, recomputed from them and
/// never stored independently of its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Fresh,
    Succeeded,
    Failed,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Fresh => write!(f, "fresh"),
            JobState::Succeeded => write!(f, "succeeded"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// Derive the display status. A failure must be strictly newer than the
/// last success to count as failed; ties resolve to succeeded.
pub fn derive_state(
    last_success: Option<DateTime<Utc>>,
    last_error: Option<DateTime<Utc>>,
) -> JobState {
    match (last_success, last_error) {
        (None, None) => JobState::Fresh,
        (Some(_), None) => JobState::Succeeded,
        (None, Some(_)) => JobState::Failed,
        (Some(success), Some(error)) => {
            if error > success {
                JobState::Failed
            } else {
                JobState::Succeeded
            }
        }
    }
}

/// Variant payload: what triggers the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    /// Runs after all named parent jobs complete. A parent name with no
    /// matching record is a dangling parent, not an error; the scheduler
    /// owns referential integrity.
    Dependency { parents: Vec<String> },
    /// Runs on an ISO-8601 repeating interval.
    Scheduled { schedule: Schedule },
}

/// One job as rendered by the dashboard: scheduler metadata, derived
/// status, and whatever percentile stats were available this round.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub name: String,
    pub owner: String,
    pub command: String,
    pub retries: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<DateTime<Utc>>,
    pub success_count: u64,
    pub error_count: u64,
    pub disabled: bool,
    pub state: JobState,
    pub stats: HashMap<Rank, f64>,
    pub kind: JobKind,
}

impl JobRecord {
    /// Classify a raw upstream object. Non-empty `parents` wins over
    /// `schedule`; a record with neither (or with no usable name, or an
    /// unparseable schedule) is malformed and reported, not fatal.
    pub fn from_raw(index: usize, raw: RawJob) -> Result<JobRecord, Warning> {
        let name = match raw.name {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(Warning::MalformedJobRecord {
                    job: format!("#{}", index),
                })
            }
        };

        let kind = match (raw.parents, raw.schedule) {
            (Some(parents), _) if !parents.is_empty() => JobKind::Dependency { parents },
            (_, Some(schedule)) => match schedule.parse::<Schedule>() {
                Ok(schedule) => JobKind::Scheduled { schedule },
                Err(_) => return Err(Warning::MalformedJobRecord { job: name }),
            },
            _ => return Err(Warning::MalformedJobRecord { job: name }),
        };

        let last_success = raw.last_success.as_deref().and_then(parse_timestamp);
        let last_error = raw.last_error.as_deref().and_then(parse_timestamp);

        Ok(JobRecord {
            state: derive_state(last_success, last_error),
            name,
            owner: raw.owner,
            command: raw.command,
            retries: raw.retries,
            last_success,
            last_error,
            success_count: raw.success_count,
            error_count: raw.error_count,
            disabled: raw.disabled,
            stats: HashMap::new(),
            kind,
        })
    }

    pub fn job_type(&self) -> &'static str {
        match self.kind {
            JobKind::Dependency { .. } => "dependent",
            JobKind::Scheduled { .. } => "scheduled",
        }
    }
}

/// Wire shape of one object in the `/scheduler/jobs` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawJob {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub command: String,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default)]
    pub last_success: Option<String>,
    #[serde(default, alias = "lastFailure")]
    pub last_error: Option<String>,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub parents: Option<Vec<String>>,
    #[serde(default)]
    pub schedule: Option<String>,
}

fn default_retries() -> u32 {
    2
}

/// Upstream timestamps arrive as RFC 3339 (with or without fractional
/// seconds) or as `YYYY-MM-DD HH:MM:SS`. Empty means absent; anything
/// unparseable is treated as absent rather than failing the record.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    tracing::warn!(timestamp = raw, "unparseable timestamp, treating as absent");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, secs).unwrap())
    }

    #[test]
    fn state_fresh_when_neither_set() {
        assert_eq!(derive_state(None, None), JobState::Fresh);
    }

    #[test]
    fn state_succeeded_when_only_success() {
        assert_eq!(derive_state(ts(0), None), JobState::Succeeded);
    }

    #[test]
    fn state_failed_when_only_error() {
        assert_eq!(derive_state(None, ts(0)), JobState::Failed);
    }

    #[test]
    fn state_failed_iff_error_strictly_newer() {
        assert_eq!(derive_state(ts(0), ts(1)), JobState::Failed);
        assert_eq!(derive_state(ts(1), ts(0)), JobState::Succeeded);
    }

    #[test]
    fn state_tie_resolves_to_succeeded() {
        assert_eq!(derive_state(ts(5), ts(5)), JobState::Succeeded);
    }

    #[test]
    fn classifies_dependency_job() {
        let raw: RawJob = serde_json::from_str(
            r#"{"name": "report", "owner": "a@b.com", "command": "make report",
                "parents": ["extract", "transform"]}"#,
        )
        .unwrap();
        let job = JobRecord::from_raw(0, raw).unwrap();
        assert_eq!(
            job.kind,
            JobKind::Dependency {
                parents: vec!["extract".to_string(), "transform".to_string()]
            }
        );
        assert_eq!(job.job_type(), "dependent");
        assert_eq!(job.state, JobState::Fresh);
        assert_eq!(job.retries, 2);
    }

    #[test]
    fn classifies_scheduled_job() {
        let raw: RawJob = serde_json::from_str(
            r#"{"name": "extract", "schedule": "R/2024-01-01T00:00:00Z/P1D",
                "lastSuccess": "2024-01-02T00:00:00Z"}"#,
        )
        .unwrap();
        let job = JobRecord::from_raw(0, raw).unwrap();
        assert!(matches!(job.kind, JobKind::Scheduled { .. }));
        assert_eq!(job.job_type(), "scheduled");
        assert_eq!(job.state, JobState::Succeeded);
    }

    #[test]
    fn parents_take_precedence_over_schedule() {
        let raw: RawJob = serde_json::from_str(
            r#"{"name": "both", "parents": ["a"], "schedule": "R/2024-01-01T00:00:00Z/P1D"}"#,
        )
        .unwrap();
        let job = JobRecord::from_raw(0, raw).unwrap();
        assert!(matches!(job.kind, JobKind::Dependency { .. }));
    }

    #[test]
    fn empty_parents_fall_through_to_schedule() {
        let raw: RawJob = serde_json::from_str(
            r#"{"name": "x", "parents": [], "schedule": "R/2024-01-01T00:00:00Z/P1D"}"#,
        )
        .unwrap();
        let job = JobRecord::from_raw(0, raw).unwrap();
        assert!(matches!(job.kind, JobKind::Scheduled { .. }));
    }

    #[test]
    fn record_with_neither_shape_is_malformed() {
        let raw: RawJob = serde_json::from_str(r#"{"name": "orphan", "parents": []}"#).unwrap();
        assert_eq!(
            JobRecord::from_raw(0, raw).unwrap_err(),
            Warning::MalformedJobRecord {
                job: "orphan".to_string()
            }
        );
    }

    #[test]
    fn record_without_name_is_malformed_by_index() {
        let raw: RawJob = serde_json::from_str(r#"{"parents": ["a"]}"#).unwrap();
        assert_eq!(
            JobRecord::from_raw(3, raw).unwrap_err(),
            Warning::MalformedJobRecord {
                job: "#3".to_string()
            }
        );
    }

    #[test]
    fn record_with_bad_schedule_is_malformed() {
        let raw: RawJob =
            serde_json::from_str(r#"{"name": "bad", "schedule": "every day"}"#).unwrap();
        assert!(JobRecord::from_raw(0, raw).is_err());
    }

    #[test]
    fn timestamps_parse_in_both_formats() {
        let rfc = parse_timestamp("2024-01-01T12:00:00.000Z").unwrap();
        let plain = parse_timestamp("2024-01-01 12:00:00").unwrap();
        assert_eq!(rfc, plain);
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("not a time"), None);
    }

    #[test]
    fn null_timestamps_mean_absent() {
        let raw: RawJob = serde_json::from_str(
            r#"{"name": "x", "parents": ["a"], "lastSuccess": null, "lastError": null}"#,
        )
        .unwrap();
        let job = JobRecord::from_raw(0, raw).unwrap();
        assert_eq!(job.state, JobState::Fresh);
    }
}
