use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::aggregate;
use crate::client::{DependencyJobSpec, ScheduledJobSpec, SchedulerClient};
use crate::error::{CronboardError, Result};
use crate::model::{JobKind, JobRecord};

#[derive(Clone)]
pub struct DashboardState {
    pub client: Arc<SchedulerClient>,
}

#[derive(Serialize)]
struct JobEntry {
    name: String,
    owner: String,
    command: String,
    retries: u32,
    last_success: Option<DateTime<Utc>>,
    last_error: Option<DateTime<Utc>>,
    success_count: u64,
    error_count: u64,
    disabled: bool,
    status: String,
    job_type: &'static str,
    parents: Option<Vec<String>>,
    schedule: Option<String>,
    /// Percentile label to whole milliseconds; absent ranks are omitted.
    stats: HashMap<&'static str, u64>,
}

impl JobEntry {
    fn from_record(job: JobRecord) -> Self {
        let job_type = job.job_type();
        let (parents, schedule) = match &job.kind {
            JobKind::Dependency { parents } => (Some(parents.clone()), None),
            JobKind::Scheduled { schedule } => (None, Some(schedule.to_string())),
        };
        Self {
            job_type,
            parents,
            schedule,
            stats: job
                .stats
                .iter()
                .map(|(rank, time)| (rank.path_label(), time.round() as u64))
                .collect(),
            name: job.name,
            owner: job.owner,
            command: job.command,
            retries: job.retries,
            last_success: job.last_success,
            last_error: job.last_error,
            success_count: job.success_count,
            error_count: job.error_count,
            disabled: job.disabled,
            status: job.state.to_string(),
        }
    }
}

#[derive(Serialize)]
struct DashboardResponse {
    jobs: Vec<JobEntry>,
    total_count: usize,
    failed_count: usize,
    warnings: Vec<String>,
}

#[derive(Deserialize)]
struct JobRequest {
    name: String,
    command: String,
    owner: String,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    parents: Option<Vec<String>>,
    #[serde(default)]
    schedule: Option<String>,
}

#[derive(Serialize)]
struct StatusResponse {
    success: bool,
    error: Option<String>,
}

/// Build the dashboard router. Public so tests can drive it without
/// binding a socket.
pub fn router(state: DashboardState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/jobs", get(list_jobs_handler).post(create_job_handler))
        .route(
            "/api/jobs/:name",
            put(update_job_handler).delete(delete_job_handler),
        )
        .route("/api/jobs/:name/tasks", delete(kill_tasks_handler))
        .route("/api/jobs/:name/run", post(run_job_handler))
        .layer(cors)
        .with_state(state)
}

/// Serve the dashboard until the cancellation token fires.
pub async fn serve(addr: SocketAddr, state: DashboardState, shutdown: CancellationToken) {
    let app = router(state);

    tracing::info!(addr = %addr, "starting dashboard server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "failed to bind dashboard server");
            return;
        }
    };

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await });
    if let Err(e) = server.await {
        tracing::error!(error = %e, "dashboard server failed");
    }
}

async fn list_jobs_handler(State(state): State<DashboardState>) -> Response {
    match aggregate::fetch_dashboard(&state.client).await {
        Ok(view) => Json(DashboardResponse {
            total_count: view.total_count,
            failed_count: view.failed_count,
            warnings: view.warnings,
            jobs: view.entries.into_iter().map(JobEntry::from_record).collect(),
        })
        .into_response(),
        Err(error) => {
            tracing::error!(%error, "dashboard aggregation failed");
            reject(StatusCode::BAD_GATEWAY, error).into_response()
        }
    }
}

async fn create_job_handler(
    State(state): State<DashboardState>,
    Json(req): Json<JobRequest>,
) -> Response {
    finish(submit_job(&state.client, req, false).await)
}

async fn update_job_handler(
    State(state): State<DashboardState>,
    Path(name): Path<String>,
    Json(mut req): Json<JobRequest>,
) -> Response {
    req.name = name;
    finish(submit_job(&state.client, req, true).await)
}

async fn delete_job_handler(
    State(state): State<DashboardState>,
    Path(name): Path<String>,
) -> Response {
    finish(state.client.delete_job(&name).await)
}

async fn kill_tasks_handler(
    State(state): State<DashboardState>,
    Path(name): Path<String>,
) -> Response {
    finish(state.client.kill_tasks(&name).await)
}

async fn run_job_handler(
    State(state): State<DashboardState>,
    Path(name): Path<String>,
) -> Response {
    finish(state.client.run_job(&name).await)
}

/// Route a form submission to the right upstream endpoint by shape:
/// non-empty parents means dependency, otherwise a schedule is required.
async fn submit_job(client: &SchedulerClient, req: JobRequest, edit: bool) -> Result<()> {
    match (req.parents, req.schedule) {
        (Some(parents), _) if !parents.is_empty() => {
            let spec = DependencyJobSpec::new(req.name, parents, req.command, req.owner)?
                .disabled(req.disabled);
            if edit {
                client.update_dependency_job(&spec).await
            } else {
                client.create_dependency_job(&spec).await
            }
        }
        (_, Some(schedule)) => {
            let spec = ScheduledJobSpec::new(req.name, schedule, req.command, req.owner)?
                .disabled(req.disabled);
            if edit {
                client.update_scheduled_job(&spec).await
            } else {
                client.create_scheduled_job(&spec).await
            }
        }
        _ => Err(CronboardError::InvalidJobSpec(
            "job needs either parents or a schedule".to_string(),
        )),
    }
}

fn finish(result: Result<()>) -> Response {
    match result {
        Ok(()) => Json(StatusResponse {
            success: true,
            error: None,
        })
        .into_response(),
        Err(error) => {
            tracing::warn!(%error, "mutation rejected");
            let status = match &error {
                CronboardError::InvalidJobSpec(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CronboardError::MutationRejected { status, .. } => {
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
                }
                _ => StatusCode::BAD_GATEWAY,
            };
            reject(status, error).into_response()
        }
    }
}

fn reject(status: StatusCode, error: CronboardError) -> (StatusCode, Json<StatusResponse>) {
    (
        status,
        Json(StatusResponse {
            success: false,
            error: Some(error.to_string()),
        }),
    )
}
