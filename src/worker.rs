//! Background worker runtime
//!
//! Claims jobs from the queue, drives the orchestrator under a wall-clock
//! limit, and always attempts the webhook callback — success, failure, or
//! timeout — before acknowledging the queue. The callback path has a fixed
//! timeout and never retries, so it can never be the reason a job loops.

use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use serde_json::json;
use tracing::{error, info, warn};

use crate::config::WorkerConfig;
use crate::orchestration::{Orchestrator, OrchestratorResponse};
use crate::storage::{ClaimedJob, JobQueue};

const NO_RESPONSE_FALLBACK: &str = "Nenhuma resposta gerada.";
const JOB_FAILED_MESSAGE: &str = "A tarefa falhou após todas as tentativas.";

/// Consumes queued jobs one at a time to completion
pub struct Worker {
    queue: Arc<dyn JobQueue>,
    orchestrator: Arc<Orchestrator>,
    http: reqwest::Client,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        orchestrator: Arc<Orchestrator>,
        config: WorkerConfig,
    ) -> Self {
        Worker {
            queue,
            orchestrator,
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Main worker loop: claim, process, repeat
    pub async fn run(&self) {
        info!("worker started");
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            match self.claim_with_backoff().await {
                Some(job) => self.process_job(job).await,
                None => tokio::time::sleep(poll_interval).await,
            }
        }
    }

    /// Claim the next job, retrying transient queue errors with backoff
    async fn claim_with_backoff(&self) -> Option<ClaimedJob> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::from_secs(30)))
            .build();

        let result = backoff::future::retry(backoff, || async {
            self.queue
                .claim()
                .await
                .map_err(backoff::Error::transient)
        })
        .await;

        match result {
            Ok(job) => job,
            Err(e) => {
                error!("queue claim failed after retries: {}", e);
                None
            }
        }
    }

    /// Process one claimed job end to end
    pub async fn process_job(&self, job: ClaimedJob) {
        let payload = &job.payload;
        info!(
            task_id = %payload.task_id,
            attempt = job.attempts,
            "processing task"
        );

        let time_limit = Duration::from_secs(self.config.job_time_limit_secs);
        let outcome =
            tokio::time::timeout(time_limit, self.orchestrator.process_task(payload)).await;

        let (status, final_output, failed) = match &outcome {
            Ok(Ok(OrchestratorResponse::Completed { response, .. })) => {
                ("completed", response.clone(), false)
            }
            Ok(Ok(_)) => ("completed", NO_RESPONSE_FALLBACK.to_string(), false),
            Ok(Err(e)) => {
                error!(task_id = %payload.task_id, "task failed: {}", e);
                ("failed", JOB_FAILED_MESSAGE.to_string(), true)
            }
            Err(_) => {
                error!(
                    task_id = %payload.task_id,
                    limit_secs = self.config.job_time_limit_secs,
                    "task exceeded wall-clock limit"
                );
                ("failed", JOB_FAILED_MESSAGE.to_string(), true)
            }
        };

        // callback always fires, even on failure, before the queue ack
        self.send_callback(&job, status, &final_output).await;

        let ack = if failed {
            self.queue.fail(job.id).await
        } else {
            self.queue.complete(job.id).await
        };
        if let Err(e) = ack {
            error!(task_id = %payload.task_id, "failed to acknowledge job: {}", e);
        }
    }

    async fn send_callback(&self, job: &ClaimedJob, status: &str, final_output: &str) {
        let details = &job.payload.callback_details;
        let Some(webhook_url) = &details.webhook_url else {
            warn!(task_id = %job.payload.task_id, "no webhook_url for task");
            return;
        };
        let webhook_url = match url::Url::parse(webhook_url) {
            Ok(url) => url,
            Err(e) => {
                error!(task_id = %job.payload.task_id, "invalid webhook_url: {}", e);
                return;
            }
        };

        let callback_payload = json!({
            "task_id": job.payload.task_id,
            "status": status,
            "addressing_info": details.addressing_info,
            "final_output": final_output,
        });

        info!(task_id = %job.payload.task_id, url = %webhook_url, "sending callback");
        let result = self
            .http
            .post(webhook_url)
            .json(&callback_payload)
            .timeout(Duration::from_secs(self.config.callback_timeout_secs))
            .send()
            .await;

        // delivery failures are logged, never re-raised, and never re-queue
        // the job on their own
        if let Err(e) = result {
            error!(task_id = %job.payload.task_id, "callback delivery failed: {}", e);
        }
    }
}
