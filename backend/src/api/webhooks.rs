use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method};
use tracing::debug;

use crate::api::params::collect_params;
use crate::api::AppState;
use crate::external_services::moneta::response::WebhookReply;
use crate::notification_handler::Outcome;

/// `GET`/`POST /webhook`: Moneta "Pay URL" notifications.
pub async fn moneta_webhook(
    State(state): State<Arc<AppState>>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookReply {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());

    let params = collect_params(query.as_deref(), content_type, &body);

    let outcome = state.handler.handle(&params).await;

    if let Outcome::HealthCheck = outcome {
        debug!(%method, "Health check request");
    }

    state.encoder.encode(&outcome)
}
