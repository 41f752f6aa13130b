use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::notify::{NotifyRequest, Queued};
use crate::response::Envelope;
use crate::validation::ValidatedJson;

#[utoipa::path(
    post,
    path = "/api/notify",
    tag = "Notify",
    request_body = NotifyRequest,
    responses(
        (status = 202, description = "Notification queued", body = Queued),
        (status = 400, description = "user_id and message are required"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn notify_user(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(payload): ValidatedJson<NotifyRequest>,
) -> AppResult<(StatusCode, Json<Envelope<Queued>>)> {
    tracing::debug!(requested_by = %auth.xid, user_id = payload.user_id, "queueing notification");
    state.notifier.enqueue(payload)?;

    Ok((StatusCode::ACCEPTED, Json(Envelope::data(Queued { queued: true }))))
}
