use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_xid: Option<String>,
    pub subject_id: String,
    pub severity: Severity,
    pub payload: ActivityPayload,
}

/// Request metadata captured alongside an audit entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl RequestContext {
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        let ip = text("x-forwarded-for")
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .or_else(|| text("x-real-ip").map(String::from));

        Self {
            ip,
            user_agent: text("user-agent").map(String::from),
            request_id: text("x-request-id").map(String::from),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPayload {
    #[serde(rename = "new")]
    pub current: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
}

pub type EventBus = broadcast::Sender<ActivityEvent>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<ActivityEvent>) {
    broadcast::channel(1024)
}

/// Publishes `<entity>.<action>` for `entity`. Never fails the caller: with no
/// listener attached the event is dropped.
pub fn record<T: Loggable>(
    bus: &EventBus,
    action: &str,
    actor_xid: Option<&str>,
    entity: &T,
    old: Option<&T>,
    context: Option<RequestContext>,
) {
    let event = ActivityEvent {
        id: Uuid::new_v4(),
        name: format!("{}.{}", T::entity_type(), action),
        occurred_at: Utc::now(),
        actor_xid: actor_xid.map(String::from),
        subject_id: entity.subject_id(),
        severity: entity.severity_for_action(action),
        payload: ActivityPayload {
            current: serde_json::to_value(entity).unwrap_or_default(),
            old: old.map(|e| serde_json::to_value(e).unwrap_or_default()),
            context,
        },
    };

    if bus.send(event).is_err() {
        tracing::debug!(entity = T::entity_type(), action, "no activity listener attached");
    }
}

fn describe(name: &str) -> String {
    let (entity, action) = name.split_once('.').unwrap_or((name, "changed"));
    let entity = entity.replace('_', " ");
    let mut chars = entity.chars();
    match chars.next() {
        Some(first) => format!("{}{} {}", first.to_uppercase(), chars.as_str(), action.replace('_', " ")),
        None => "System event".to_string(),
    }
}

/// SHA-256 over the previous link's hash followed by the serialized payload.
pub fn chain_hash(prev_hash: Option<&str>, payload: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

pub async fn persist_event(pool: &SqlitePool, event: &ActivityEvent) -> Result<(), sqlx::Error> {
    let properties = serde_json::to_string(event).unwrap_or_default();
    let occurred_at = event.occurred_at.to_rfc3339();
    // The first statement writes, so the transaction takes the write lock
    // before it reads the chain head and never has to upgrade.
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO activity_log (id, event_name, description, actor_xid, subject_id, occurred_at, properties, severity)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(event.id.to_string())
    .bind(&event.name)
    .bind(describe(&event.name))
    .bind(&event.actor_xid)
    .bind(&event.subject_id)
    .bind(&occurred_at)
    .bind(&properties)
    .bind(event.severity.as_str())
    .execute(&mut *tx)
    .await?;

    let prev_hash: Option<String> = sqlx::query_scalar("SELECT hash FROM event_store ORDER BY seq DESC LIMIT 1")
        .fetch_optional(&mut *tx)
        .await?;
    let hash = chain_hash(prev_hash.as_deref(), &properties);

    sqlx::query(
        r#"
        INSERT INTO event_store (id, event_name, occurred_at, actor_xid, subject_id, payload, severity, prev_hash, hash)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&event.name)
    .bind(&occurred_at)
    .bind(&event.actor_xid)
    .bind(&event.subject_id)
    .bind(&properties)
    .bind(event.severity.as_str())
    .bind(&prev_hash)
    .bind(&hash)
    .execute(&mut *tx)
    .await?;

    tx.commit().await
}

pub async fn start_activity_listener(mut rx: broadcast::Receiver<ActivityEvent>, pool: SqlitePool) {
    tracing::info!("activity listener started");
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Err(err) = persist_event(&pool, &event).await {
                    tracing::error!(event = %event.name, error = %err, "failed to persist activity event");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "activity listener lagged; events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    tracing::info!("activity listener stopped");
}
