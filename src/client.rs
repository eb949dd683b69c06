use std::collections::HashMap;

use serde::Serialize;

use crate::config::SchedulerConfig;
use crate::error::{CronboardError, Result, Warning};
use crate::model::{JobRecord, Rank, RawJob, RawStat, Schedule, StatsIndex};

/// HTTP client for the upstream scheduler's REST API.
///
/// One instance per scheduler; cheap to clone via the inner reqwest pool.
#[derive(Debug, Clone)]
pub struct SchedulerClient {
    config: SchedulerConfig,
    http: reqwest::Client,
}

impl SchedulerClient {
    pub fn new(config: SchedulerConfig) -> Self {
        let http = match reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
        {
            Ok(client) => client,
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    "failed to build scheduler HTTP client with timeouts, falling back to defaults"
                );
                reqwest::Client::new()
            }
        };
        Self { config, http }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// One bounded retry on a transport error. HTTP error statuses are
    /// returned as-is; they are not transient.
    async fn get_with_retry(&self, url: &str) -> reqwest::Result<reqwest::Response> {
        match self.http.get(url).send().await {
            Ok(resp) => Ok(resp),
            Err(error) if self.config.retry_transient => {
                tracing::debug!(url, error = %error, "transient failure, retrying once");
                self.http.get(url).send().await
            }
            Err(error) => Err(error),
        }
    }

    /// Fetch and classify the job registry.
    ///
    /// Total failure (unreachable, timeout, non-2xx, unparseable body) is
    /// fatal. Individual malformed records are skipped and reported.
    pub async fn fetch_jobs(&self) -> Result<(HashMap<String, JobRecord>, Vec<Warning>)> {
        let url = self.url("/scheduler/jobs");
        let resp = self
            .get_with_retry(&url)
            .await
            .map_err(|e| CronboardError::UpstreamUnavailable(format!("GET {}: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CronboardError::UpstreamUnavailable(format!(
                "GET {}: status {}",
                url, status
            )));
        }

        let raw: Vec<RawJob> = resp
            .json()
            .await
            .map_err(|e| CronboardError::UpstreamUnavailable(format!("GET {}: {}", url, e)))?;

        let mut jobs = HashMap::with_capacity(raw.len());
        let mut warnings = Vec::new();
        for (index, entry) in raw.into_iter().enumerate() {
            match JobRecord::from_raw(index, entry) {
                Ok(job) => {
                    jobs.insert(job.name.clone(), job);
                }
                Err(warning) => {
                    tracing::warn!(%warning, "skipping malformed job record");
                    warnings.push(warning);
                }
            }
        }
        Ok((jobs, warnings))
    }

    /// Fetch the four percentile rankings and index them by job name.
    ///
    /// A failed rank degrades to absent data plus a warning; this call
    /// never fails the aggregation.
    pub async fn fetch_stats(&self) -> (StatsIndex, Vec<Warning>) {
        let mut index: StatsIndex = HashMap::new();
        let mut warnings = Vec::new();

        for rank in Rank::ALL {
            let url = self.url(&format!("/scheduler/stats/{}", rank.path_label()));
            match self.fetch_rank(&url).await {
                Ok(stats) => {
                    for stat in stats {
                        index
                            .entry(stat.job_name_label)
                            .or_default()
                            .insert(rank, stat.time);
                    }
                }
                Err(reason) => {
                    tracing::warn!(rank = %rank, reason = %reason, "stats rank unavailable");
                    warnings.push(Warning::StatsUnavailable { rank });
                }
            }
        }
        (index, warnings)
    }

    async fn fetch_rank(&self, url: &str) -> std::result::Result<Vec<RawStat>, String> {
        let resp = self
            .get_with_retry(url)
            .await
            .map_err(|e| e.to_string())?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("status {}", status));
        }
        resp.json().await.map_err(|e| e.to_string())
    }

    pub async fn create_scheduled_job(&self, spec: &ScheduledJobSpec) -> Result<()> {
        self.mutate(self.http.post(self.url("/scheduler/iso8601")).json(spec))
            .await
    }

    pub async fn update_scheduled_job(&self, spec: &ScheduledJobSpec) -> Result<()> {
        self.mutate(self.http.put(self.url("/scheduler/iso8601")).json(spec))
            .await
    }

    pub async fn create_dependency_job(&self, spec: &DependencyJobSpec) -> Result<()> {
        self.mutate(self.http.post(self.url("/scheduler/dependency")).json(spec))
            .await
    }

    pub async fn update_dependency_job(&self, spec: &DependencyJobSpec) -> Result<()> {
        self.mutate(self.http.put(self.url("/scheduler/dependency")).json(spec))
            .await
    }

    pub async fn delete_job(&self, name: &str) -> Result<()> {
        self.mutate(self.http.delete(self.url(&format!("/scheduler/job/{}", name))))
            .await
    }

    /// Kill the running tasks of a job.
    pub async fn kill_tasks(&self, name: &str) -> Result<()> {
        self.mutate(
            self.http
                .delete(self.url(&format!("/scheduler/task/kill/{}", name))),
        )
        .await
    }

    /// Trigger a manual run.
    pub async fn run_job(&self, name: &str) -> Result<()> {
        self.mutate(self.http.put(self.url(&format!("/scheduler/job/{}", name))))
            .await
    }

    /// The scheduler answers every mutating call with 204. Anything else
    /// is a rejection carrying the upstream status and body; the caller
    /// reports it and re-renders.
    async fn mutate(&self, req: reqwest::RequestBuilder) -> Result<()> {
        let resp = req.send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(CronboardError::MutationRejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Request body for creating or editing a time-scheduled job.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledJobSpec {
    pub name: String,
    pub schedule: String,
    pub command: String,
    pub owner: String,
    pub disabled: bool,
    #[serde(rename = "async")]
    pub run_async: bool,
    pub epsilon: String,
    pub executor: String,
}

impl ScheduledJobSpec {
    pub fn new(
        name: impl Into<String>,
        schedule: impl Into<String>,
        command: impl Into<String>,
        owner: impl Into<String>,
    ) -> Result<Self> {
        let schedule = schedule.into();
        schedule
            .parse::<Schedule>()
            .map_err(CronboardError::InvalidJobSpec)?;
        let owner = owner.into();
        validate_owner(&owner)?;
        Ok(Self {
            name: name.into(),
            schedule,
            command: command.into(),
            owner,
            disabled: false,
            run_async: false,
            epsilon: "PT30M".to_string(),
            executor: String::new(),
        })
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// Request body for creating or editing a dependency job.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyJobSpec {
    pub name: String,
    pub parents: Vec<String>,
    pub command: String,
    pub owner: String,
    pub disabled: bool,
    #[serde(rename = "async")]
    pub run_async: bool,
    pub epsilon: String,
    pub executor: String,
}

impl DependencyJobSpec {
    pub fn new(
        name: impl Into<String>,
        parents: Vec<String>,
        command: impl Into<String>,
        owner: impl Into<String>,
    ) -> Result<Self> {
        if parents.is_empty() || parents.iter().any(|p| p.trim().is_empty()) {
            return Err(CronboardError::InvalidJobSpec(
                "dependency job needs at least one non-empty parent".to_string(),
            ));
        }
        let owner = owner.into();
        validate_owner(&owner)?;
        Ok(Self {
            name: name.into(),
            parents,
            command: command.into(),
            owner,
            disabled: false,
            run_async: false,
            epsilon: "PT30M".to_string(),
            executor: String::new(),
        })
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// The owner field is a comma-separated list of notification addresses.
fn validate_owner(owner: &str) -> Result<()> {
    let addresses: Vec<&str> = owner.split(',').map(str::trim).collect();
    if addresses.is_empty() || addresses.iter().any(|a| !is_email(a)) {
        return Err(CronboardError::InvalidJobSpec(format!(
            "owner must be a comma-separated list of email addresses, got {:?}",
            owner
        )));
    }
    Ok(())
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !domain.contains('@')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_must_be_email_list() {
        assert!(validate_owner("a@b.com").is_ok());
        assert!(validate_owner("a@b.com, c@d.org").is_ok());
        assert!(validate_owner("").is_err());
        assert!(validate_owner("not-an-email").is_err());
        assert!(validate_owner("a@b.com, nope").is_err());
        assert!(validate_owner("a@@b.com").is_err());
        assert!(validate_owner("a@nodot").is_err());
    }

    #[test]
    fn scheduled_spec_defaults_match_the_wire_contract() {
        let spec =
            ScheduledJobSpec::new("etl", "R/2024-01-01T00:00:00Z/P1D", "run etl", "a@b.com")
                .unwrap();
        assert!(!spec.run_async);
        assert!(!spec.disabled);
        assert_eq!(spec.epsilon, "PT30M");
        assert_eq!(spec.executor, "");

        let body = serde_json::to_value(&spec).unwrap();
        assert_eq!(body["async"], false);
        assert_eq!(body["schedule"], "R/2024-01-01T00:00:00Z/P1D");
    }

    #[test]
    fn scheduled_spec_rejects_bad_schedule() {
        let err = ScheduledJobSpec::new("etl", "hourly", "run etl", "a@b.com").unwrap_err();
        assert!(matches!(err, CronboardError::InvalidJobSpec(_)));
    }

    #[test]
    fn dependency_spec_requires_parents() {
        let err = DependencyJobSpec::new("report", vec![], "make report", "a@b.com").unwrap_err();
        assert!(matches!(err, CronboardError::InvalidJobSpec(_)));

        let spec = DependencyJobSpec::new(
            "report",
            vec!["etl".to_string()],
            "make report",
            "a@b.com",
        )
        .unwrap();
        let body = serde_json::to_value(&spec).unwrap();
        assert_eq!(body["parents"], serde_json::json!(["etl"]));
    }
}
