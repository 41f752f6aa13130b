//! In-process notification queue.
//!
//! Jobs are enqueued by `POST /api/notify` and drained by a single worker
//! task. Delivery is a structured log line; nothing is retried.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::AppError;
use crate::utils::utc_now;
use crate::validation::RequestRules;

pub const NOTIFY_USER: &str = "notify:user";
const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NotifyRequest {
    #[validate(range(min = 1))]
    pub user_id: i64,
    #[schema(example = "Your certificate expires next month")]
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
}

impl RequestRules for NotifyRequest {}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Queued {
    pub queued: bool,
}

#[derive(Debug, Clone)]
pub struct NotifyJob {
    pub kind: &'static str,
    pub payload: NotifyRequest,
    pub enqueued_at: DateTime<Utc>,
}

/// Producer half of the queue.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<NotifyJob>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::Receiver<NotifyJob>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        (Self { tx }, rx)
    }

    /// Fails with `Internal` when the queue is full or the worker is gone.
    pub fn enqueue(&self, payload: NotifyRequest) -> Result<(), AppError> {
        let job = NotifyJob {
            kind: NOTIFY_USER,
            payload,
            enqueued_at: utc_now(),
        };

        self.tx.try_send(job).map_err(|err| {
            tracing::error!(kind = NOTIFY_USER, error = %err, "failed to enqueue notification");
            AppError::internal(format!("notify enqueue failed: {err}"))
        })
    }
}

pub async fn start_notify_worker(mut rx: mpsc::Receiver<NotifyJob>) {
    tracing::info!("notify worker started");

    while let Some(job) = rx.recv().await {
        let waited_ms = (utc_now() - job.enqueued_at).num_milliseconds();
        tracing::info!(
            kind = job.kind,
            user_id = job.payload.user_id,
            message = %job.payload.message,
            waited_ms,
            "notify user"
        );
    }

    tracing::info!("notify queue closed, worker stopping");
}
